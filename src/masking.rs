//! Reversible glossary masking.
//!
//! `apply` swaps glossary sources for their `__MSK_dddd__` tokens in one pass.
//! `restore` swaps tokens back to either the source (key side of a database
//! line) or the target (value side, or a finished translation). Tokens that do
//! not resolve to a glossary entry are left in place.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::encoding::read_text_file;
use crate::error::Result;
use crate::glossary::{Glossary, GlossaryEntry};
use crate::pattern::SearchPattern;

/// `__MSK_dddd__` (more digits past 9999), plus the older `__MASK_ddd__` spelling
pub static MASK_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__MSK_(\d+)__|__MASK_(\d+)__").expect("mask token regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSide {
    /// Put the original-language term back
    Source,
    /// Put the translated term in
    Target,
}

/// Tokens produced while masking one text unit, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct MaskingContext {
    active: IndexMap<String, usize>,
}

impl MaskingContext {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    /// Entries behind the active tokens
    pub fn entries<'g>(&'g self, glossary: &'g Glossary) -> impl Iterator<Item = &'g GlossaryEntry> + 'g {
        self.active.values().filter_map(|index| glossary.get(*index))
    }

    /// Replace only the tokens this context produced
    pub fn restore(&self, text: &str, glossary: &Glossary, side: RestoreSide) -> String {
        if self.active.is_empty() {
            return text.to_string();
        }
        MASK_TOKEN_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let token = &caps[0];
                match self.active.get(token).and_then(|index| glossary.get(*index)) {
                    Some(entry) => side_text(entry, side).to_string(),
                    None => token.to_string(),
                }
            })
            .into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct MaskingEngine {
    glossary: Glossary,
    pattern: Option<SearchPattern>,
}

impl MaskingEngine {
    pub fn new(glossary: Glossary) -> Result<Self> {
        let pattern = glossary.source_pattern()?;
        Ok(Self { glossary, pattern })
    }

    pub fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    /// True when there is at least one term to mask
    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn apply(&self, text: &str) -> String {
        self.apply_with_context(text).0
    }

    /// Mask `text` and report which tokens were used
    pub fn apply_with_context(&self, text: &str) -> (String, MaskingContext) {
        let mut context = MaskingContext::default();
        let Some(pattern) = &self.pattern else {
            return (text.to_string(), context);
        };

        let masked = pattern
            .regex()
            .replace_all(text, |caps: &Captures<'_>| {
                let word = &caps[0];
                match self.glossary.index_of(word).and_then(|i| self.glossary.get(i).map(|e| (i, e))) {
                    Some((index, entry)) => {
                        context.active.entry(entry.mask_id.clone()).or_insert(index);
                        entry.mask_id.clone()
                    }
                    None => word.to_string(),
                }
            })
            .into_owned();

        (masked, context)
    }

    /// Resolve every mask token against the whole glossary
    pub fn restore(&self, text: &str, side: RestoreSide) -> String {
        MASK_TOKEN_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let index = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|digits| digits.as_str().parse::<usize>().ok());
                match index.and_then(|i| self.glossary.get(i)) {
                    Some(entry) => side_text(entry, side).to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Mask both sides of a `key=value` line independently
    pub fn mask_database_line(&self, line: &str) -> String {
        match line.split_once('=') {
            Some((left, right)) => format!("{}={}", self.apply(left), self.apply(right)),
            None => self.apply(line),
        }
    }

    /// Key side back to the source term, value side to the target term.
    /// A line without `=` is a bare value.
    pub fn restore_database_line(&self, line: &str) -> String {
        match line.split_once('=') {
            Some((left, right)) => format!(
                "{}={}",
                self.restore(left, RestoreSide::Source),
                self.restore(right, RestoreSide::Target)
            ),
            None => self.restore(line, RestoreSide::Target),
        }
    }
}

fn side_text(entry: &GlossaryEntry, side: RestoreSide) -> &str {
    match side {
        RestoreSide::Source => &entry.source,
        RestoreSide::Target => &entry.target,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseMaskMode {
    Apply,
    Restore,
}

impl DatabaseMaskMode {
    fn suffix(self) -> &'static str {
        match self {
            Self::Apply => "_MASKED.txt",
            Self::Restore => "_RESTORED.txt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseMaskSummary {
    /// Lines that went through masking or restoring
    pub lines: usize,
    pub output: PathBuf,
}

/// `<dir>/<stem>_MASKED.txt` or `<dir>/<stem>_RESTORED.txt`
pub fn sibling_output_path(database: &Path, mode: DatabaseMaskMode) -> PathBuf {
    let stem = database
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    database.with_file_name(format!("{}{}", stem, mode.suffix()))
}

/// Rewrite a database file through the engine. Blank lines stay blank and
/// `//` comments are copied unchanged.
pub fn process_database_file(
    engine: &MaskingEngine,
    database: &Path,
    mode: DatabaseMaskMode,
) -> Result<DatabaseMaskSummary> {
    let decoded = read_text_file(database)?;
    let mut output = String::with_capacity(decoded.text.len());
    let mut lines = 0usize;

    for raw in decoded.text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            output.push('\n');
            continue;
        }
        if line.starts_with("//") {
            output.push_str(line);
            output.push('\n');
            continue;
        }

        let converted = match mode {
            DatabaseMaskMode::Apply => engine.mask_database_line(line),
            DatabaseMaskMode::Restore => engine.restore_database_line(line),
        };
        output.push_str(&converted);
        output.push('\n');
        lines += 1;
    }

    let out_path = sibling_output_path(database, mode);
    std::fs::write(&out_path, output)?;
    debug!("{:?} wrote {} lines", mode, lines);
    info!("Database {:?} finished: {} lines -> {}", mode, lines, out_path.display());

    Ok(DatabaseMaskSummary {
        lines,
        output: out_path,
    })
}

pub fn mask_database_file(engine: &MaskingEngine, database: &Path) -> Result<DatabaseMaskSummary> {
    process_database_file(engine, database, DatabaseMaskMode::Apply)
}

pub fn restore_database_file(engine: &MaskingEngine, database: &Path) -> Result<DatabaseMaskSummary> {
    process_database_file(engine, database, DatabaseMaskMode::Restore)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(content: &str) -> MaskingEngine {
        MaskingEngine::new(Glossary::parse(content)).unwrap()
    }

    #[test]
    fn test_longest_match_priority() {
        let engine = engine("AB=X\nABC=Y\n");
        let masked = engine.apply("ABC");
        assert_eq!(masked, "__MSK_0000__");
        assert_eq!(engine.restore(&masked, RestoreSide::Target), "Y");
    }

    #[test]
    fn test_round_trip_restores_source() {
        let engine = engine("リン=린\nねこ=고양이\nFire=불\nFireball=화염구\n");
        let text = "リンとねこ: Fireball! Fire? plain filler";
        let masked = engine.apply(text);
        assert!(!masked.contains("リン"));
        assert!(!masked.contains("Fire"));
        assert_eq!(engine.restore(&masked, RestoreSide::Source), text);
    }

    #[test]
    fn test_context_tracks_used_tokens() {
        let engine = engine("ねこ,cat,고양이\nいぬ=개\n");
        let (masked, context) = engine.apply_with_context("ねことねこ");
        assert_eq!(context.len(), 1);
        let entry = context.entries(engine.glossary()).next().unwrap();
        assert_eq!(entry.hint, "cat");
        assert_eq!(
            context.restore(&masked, engine.glossary(), RestoreSide::Target),
            "고양이と고양이"
        );
    }

    #[test]
    fn test_context_restore_ignores_foreign_tokens() {
        let engine = engine("ねこ=고양이\nいぬ=개\n");
        let (_, context) = engine.apply_with_context("ねこ");
        let restored = context.restore("__MSK_0000__ __MSK_0001__", engine.glossary(), RestoreSide::Target);
        assert_eq!(restored, "고양이 __MSK_0001__");
    }

    #[test]
    fn test_unknown_tokens_survive_restore() {
        let engine = engine("ねこ=고양이\n");
        assert_eq!(
            engine.restore("__MSK_0042__ and __MASK_000__", RestoreSide::Target),
            "__MSK_0042__ and 고양이"
        );
    }

    #[test]
    fn test_database_line_asymmetry() {
        let engine = engine("リン=린\n");
        let masked = engine.mask_database_line("リンです=リンだ");
        assert_eq!(masked, "__MSK_0000__です=__MSK_0000__だ");
        assert_eq!(engine.restore_database_line(&masked), "リンです=린だ");
        assert_eq!(engine.restore_database_line("__MSK_0000__!"), "린!");
    }

    #[test]
    fn test_tokens_past_four_digits_restore() {
        let glossary = Glossary::from_entries(
            (0..10_001).map(|i| (format!("w{i:05}"), format!("t{i}"), String::new())),
        );
        let engine = MaskingEngine::new(glossary).unwrap();
        let last = engine.glossary().get(10_000).unwrap().clone();
        assert_eq!(last.mask_id, "__MSK_10000__");

        let masked = engine.apply(&last.source);
        assert_eq!(masked, "__MSK_10000__");
        assert_eq!(engine.restore(&masked, RestoreSide::Target), last.target);
        assert_eq!(engine.restore(&masked, RestoreSide::Source), last.source);
    }

    #[test]
    fn test_empty_glossary_passes_through() {
        let engine = engine("");
        assert!(!engine.is_active());
        assert_eq!(engine.apply("anything"), "anything");
    }

    #[test]
    fn test_process_database_file_writes_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.txt");
        std::fs::write(&db, "// header\n\nリン=\nこんにちはリン=안녕 __MSK_0000__\n").unwrap();
        let engine = engine("リン=린\n");

        let masked = mask_database_file(&engine, &db).unwrap();
        assert_eq!(masked.lines, 2);
        assert_eq!(masked.output, dir.path().join("db_MASKED.txt"));
        let content = std::fs::read_to_string(&masked.output).unwrap();
        assert_eq!(
            content,
            "// header\n\n__MSK_0000__=\nこんにちは__MSK_0000__=안녕 __MSK_0000__\n"
        );

        let restored = restore_database_file(&engine, &masked.output).unwrap();
        assert_eq!(restored.output, dir.path().join("db_MASKED_RESTORED.txt"));
        let content = std::fs::read_to_string(&restored.output).unwrap();
        assert_eq!(content, "// header\n\nリン=\nこんにちはリン=안녕 린\n");
    }
}
