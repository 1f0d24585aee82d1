//! Writes database translations back into dump files.
//!
//! Every file is decoded, substituted in one pass over the compiled database
//! pattern, validated against script mixing and re-encoded as UTF-8. JSON
//! documents are edited node by node; everything else line by line.

pub mod json;
pub mod text;
pub mod value;

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{FormatMode, ReinsertOptions};
use crate::database::TranslationDatabase;
use crate::encoding::decode_bytes;
use crate::error::Result;
use crate::pattern::SearchPattern;

pub use value::{ValueFormatter, ValueTarget};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

const OPENERS: &[char] = &['"', '\'', '`', '(', '[', '{', '<', '>', '「', '『', '“', '‘'];
const CLOSERS: &[char] = &['"', '\'', '`', ')', ']', '}', '>', '<', '」', '』', '”', '’'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    Json,
    Text,
}

#[derive(Debug, Clone)]
pub struct ReinsertOutput {
    pub bytes: Vec<u8>,
    /// Replacements that survived rollback (changed lines in text mode)
    pub replacements: usize,
    /// False when JSON was requested but the file did not parse
    pub as_json: bool,
    pub header_restored: bool,
}

/// Per-file result reported to the batch
#[derive(Debug, Clone, Default)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub replacements: usize,
    pub saved: bool,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn failed(input: &Path, error: impl ToString) -> Self {
        Self {
            input: input.to_path_buf(),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reinserter {
    database: TranslationDatabase,
    pattern: Option<SearchPattern>,
    formatter: ValueFormatter,
    options: ReinsertOptions,
}

impl Reinserter {
    pub fn new(database: TranslationDatabase, options: ReinsertOptions) -> Result<Self> {
        let pattern = database.search_pattern()?;
        let formatter = ValueFormatter::new(&options);
        Ok(Self {
            database,
            pattern,
            formatter,
            options,
        })
    }

    pub fn database(&self) -> &TranslationDatabase {
        &self.database
    }

    pub fn options(&self) -> &ReinsertOptions {
        &self.options
    }

    pub fn processing_mode(&self, path: &Path) -> ProcessingMode {
        match self.options.format {
            FormatMode::Json => ProcessingMode::Json,
            FormatMode::Auto if has_json_extension(path) => ProcessingMode::Json,
            _ => ProcessingMode::Text,
        }
    }

    /// Reinsert into raw file bytes. `path` only selects the processing mode.
    pub fn reinsert(&self, raw: &[u8], path: &Path) -> Result<ReinsertOutput> {
        let decoded = decode_bytes(raw);
        let text = decoded.text;
        let mode = self.processing_mode(path);

        let parsed = match mode {
            ProcessingMode::Json => json::reinsert_json(&text, |node| self.substitute(node, ValueTarget::JsonNode))?,
            ProcessingMode::Text => None,
        };
        if mode == ProcessingMode::Json && parsed.is_none() {
            debug!("{} is not valid JSON, using text substitution", path.display());
        }

        let as_json = parsed.is_some();
        let (final_text, replacements) = match parsed {
            Some(result) => result,
            None => {
                let target = match mode {
                    ProcessingMode::Json => ValueTarget::JsonText,
                    ProcessingMode::Text => ValueTarget::PlainText,
                };
                let (substituted, raw_count) = self.substitute(&text, target);
                if raw_count == 0 {
                    (text.clone(), 0)
                } else {
                    text::rollback_mixed_lines(&text, substituted, raw_count)
                }
            }
        };

        let starts_with_bom = final_text.starts_with('\u{FEFF}');
        let mut bytes = final_text.into_bytes();

        let header_restored = !as_json
            && self.options.header_protection_active()
            && has_binary_header(raw)
            && bytes.len() >= 4;
        if header_restored {
            bytes[..4].copy_from_slice(&raw[..4]);
        }

        if self.options.write_bom && !as_json && !header_restored && !starts_with_bom {
            let mut with_bom = UTF8_BOM.to_vec();
            with_bom.append(&mut bytes);
            bytes = with_bom;
        }

        Ok(ReinsertOutput {
            bytes,
            replacements,
            as_json,
            header_restored,
        })
    }

    /// Process one file. With smart save on, nothing is written when no
    /// replacement survived.
    pub fn reinsert_file(&self, input: &Path, output: &Path) -> Result<FileOutcome> {
        let raw = std::fs::read(input)?;
        let result = self.reinsert(&raw, input)?;

        let mut outcome = FileOutcome {
            input: input.to_path_buf(),
            replacements: result.replacements,
            ..FileOutcome::default()
        };

        if self.options.smart_save && result.replacements == 0 {
            return Ok(outcome);
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, &result.bytes)?;
        outcome.output = Some(output.to_path_buf());
        outcome.saved = true;
        Ok(outcome)
    }

    /// One pass of database replacement over `text`
    pub fn substitute(&self, text: &str, target: ValueTarget) -> (String, usize) {
        let Some(pattern) = &self.pattern else {
            return (text.to_string(), 0);
        };

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        let mut count = 0;

        for m in pattern.regex().find_iter(text) {
            let Some(raw_value) = self.database.lookup(m.as_str()) else {
                continue;
            };
            if self.options.safe_english
                && is_single_ascii_word(m.as_str())
                && !is_guarded(text, m.start(), m.end(), target == ValueTarget::JsonNode)
            {
                continue;
            }

            output.push_str(&text[last..m.start()]);
            output.push_str(&self.formatter.format(raw_value, target));
            last = m.end();
            count += 1;
        }

        if count == 0 {
            return (text.to_string(), 0);
        }
        output.push_str(&text[last..]);
        (output, count)
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// A zero in either of the first two bytes suggests a UTF-16 or
/// length-prefixed header
fn has_binary_header(raw: &[u8]) -> bool {
    raw.len() >= 4 && (raw[0] == 0 || raw[1] == 0)
}

fn is_single_ascii_word(key: &str) -> bool {
    !key.is_empty() && key.is_ascii() && !key.chars().any(char::is_whitespace)
}

/// Quoted or bracketed on both sides and not followed by a `:` key separator.
/// With `edges_are_quotes`, the ends of `text` count as quotes.
fn is_guarded(text: &str, start: usize, end: usize, edges_are_quotes: bool) -> bool {
    let opened = match text[..start].chars().next_back() {
        Some(c) => OPENERS.contains(&c),
        None => edges_are_quotes,
    };
    if !opened {
        return false;
    }

    let mut rest = text[end..].chars();
    match rest.next() {
        Some(c) if CLOSERS.contains(&c) => {}
        Some(_) => return false,
        None => return edges_are_quotes,
    }
    rest.find(|c| !c.is_whitespace()) != Some(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reinserter(db: &str, options: ReinsertOptions) -> Reinserter {
        Reinserter::new(TranslationDatabase::parse(db), options).unwrap()
    }

    #[test]
    fn test_longest_key_wins() {
        let r = reinserter("AB=X\nABC=Y\n", ReinsertOptions::default());
        let out = r.reinsert(b"ABC\n", Path::new("a.txt")).unwrap();
        assert_eq!(out.bytes, b"Y\n");
        assert_eq!(out.replacements, 1);
    }

    #[test]
    fn test_mixed_script_line_rolls_back() {
        let r = reinserter("ねこ=고양이ねこ\n", ReinsertOptions::default());
        let input = "ねこがいる\nother\n".as_bytes();
        let out = r.reinsert(input, Path::new("a.txt")).unwrap();
        assert_eq!(out.bytes, input);
        assert_eq!(out.replacements, 0);
    }

    #[test]
    fn test_header_protection() {
        let r = reinserter("Aねこ=고양이\n", ReinsertOptions::default());
        let mut input = vec![0x00];
        input.extend_from_slice("Aねこ\n".as_bytes());
        let out = r.reinsert(&input, Path::new("a.dat")).unwrap();
        assert!(out.header_restored);
        assert_eq!(out.bytes[..4], input[..4]);
    }

    #[test]
    fn test_header_protection_disabled_with_smart_mode() {
        let options = ReinsertOptions {
            smart_mode: false,
            ..ReinsertOptions::default()
        };
        let r = reinserter("Aねこ=고양이\n", options);
        let mut input = vec![0x00];
        input.extend_from_slice("Aねこ\n".as_bytes());
        let out = r.reinsert(&input, Path::new("a.dat")).unwrap();
        assert!(!out.header_restored);
        let mut expected = vec![0x00];
        expected.extend_from_slice("고양이\n".as_bytes());
        assert_eq!(out.bytes, expected);
    }

    #[test]
    fn test_json_file_edits_nodes_with_real_newlines() {
        let r = reinserter("ねこ=고양이\\n야옹\n", ReinsertOptions::default());
        let out = r
            .reinsert(r#"{"name":"ねこ"}"#.as_bytes(), Path::new("a.json"))
            .unwrap();
        assert!(out.as_json);
        let text = String::from_utf8(out.bytes).unwrap();
        assert_eq!(text, "{\n    \"name\": \"고양이\\n야옹\"\n}");
    }

    #[test]
    fn test_broken_json_falls_back_to_escaped_text() {
        let r = reinserter("ねこ=\"고양이\"\\n야옹\n", ReinsertOptions::default());
        let out = r
            .reinsert(r#"{"name":"ねこ""#.as_bytes(), Path::new("a.json"))
            .unwrap();
        assert!(!out.as_json);
        let text = String::from_utf8(out.bytes).unwrap();
        assert_eq!(text, r#"{"name":"\"고양이\"\n야옹""#);
    }

    #[test]
    fn test_bom_only_for_text_outputs() {
        let options = ReinsertOptions {
            write_bom: true,
            ..ReinsertOptions::default()
        };
        let r = reinserter("ねこ=고양이\n", options);
        let out = r.reinsert("ねこ".as_bytes(), Path::new("a.txt")).unwrap();
        assert_eq!(out.bytes[..3], UTF8_BOM);

        let out = r.reinsert(r#"["ねこ"]"#.as_bytes(), Path::new("a.json")).unwrap();
        assert_ne!(out.bytes[..3], UTF8_BOM);
    }

    #[test]
    fn test_safe_english_requires_quotes() {
        let options = ReinsertOptions {
            safe_english: true,
            ..ReinsertOptions::default()
        };
        let r = reinserter("Fire=불\n", options);
        let (out, count) = r.substitute("Fire \"Fire\" (Fire) \"Fire\": 1", ValueTarget::PlainText);
        assert_eq!(out, "Fire \"불\" (불) \"Fire\": 1");
        assert_eq!(count, 2);

        let (out, _) = r.substitute("Fire", ValueTarget::JsonNode);
        assert_eq!(out, "불");
    }

    #[test]
    fn test_multiline_key_matches_escaped_newlines() {
        let r = reinserter("first\\nsecond=하나\n", ReinsertOptions::default());
        let out = r.reinsert(b"first\\nsecond\n", Path::new("a.txt")).unwrap();
        assert_eq!(out.bytes, "하나\n".as_bytes());
    }

    #[test]
    fn test_smart_save_skips_untouched_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out").join("in.txt");
        std::fs::write(&input, "nothing here").unwrap();

        let r = reinserter("ねこ=고양이\n", ReinsertOptions::default());
        let outcome = r.reinsert_file(&input, &output).unwrap();
        assert!(!outcome.saved);
        assert!(!output.exists());

        let options = ReinsertOptions {
            smart_save: false,
            ..ReinsertOptions::default()
        };
        let r = reinserter("ねこ=고양이\n", options);
        let outcome = r.reinsert_file(&input, &output).unwrap();
        assert!(outcome.saved);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "nothing here");
    }
}
