//! Glossary loading.
//!
//! Two line formats are accepted:
//! - `source,hint,target` (split on the first two commas, the rest belongs to the target)
//! - `source=target`
//!
//! Entries are ordered longest source first and numbered in that order, so the
//! same file always yields the same mask tokens.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::encoding::read_text_file;
use crate::error::Result;
use crate::pattern::SearchPattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub source: String,
    pub target: String,
    /// Free-form meaning note passed to the translator; empty when absent
    pub hint: String,
    /// Stable placeholder, `__MSK_dddd__`
    pub mask_id: String,
}

pub fn mask_id_for(index: usize) -> String {
    format!("__MSK_{index:04}__")
}

#[derive(Debug, Clone, Default)]
pub struct Glossary {
    entries: Vec<GlossaryEntry>,
    by_source: HashMap<String, usize>,
}

impl Glossary {
    /// Load a glossary file. Missing or unreadable files give an empty glossary.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Glossary file not found: {}", path.display());
            return Self::default();
        }

        match read_text_file(path) {
            Ok(decoded) => {
                let glossary = Self::parse(&decoded.text);
                info!("Loaded {} glossary entries from {}", glossary.len(), path.display());
                glossary
            }
            Err(e) => {
                warn!("Failed to read glossary {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load when a path is configured, otherwise empty
    pub fn load_optional(path: Option<&Path>) -> Self {
        path.map(Self::load).unwrap_or_default()
    }

    pub fn parse(content: &str) -> Self {
        let pairs = content.lines().filter_map(parse_line);
        Self::from_entries(pairs)
    }

    /// Build from `(source, target, hint)` triples in authoring order
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let mut raw: Vec<(String, String, String)> = entries
            .into_iter()
            .map(|(source, target, hint)| (source.into(), target.into(), hint.into()))
            .filter(|(source, target, _)| !source.is_empty() && !target.is_empty())
            .collect();

        // Stable sort keeps authoring order among equal lengths
        raw.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let entries: Vec<GlossaryEntry> = raw
            .into_iter()
            .enumerate()
            .map(|(index, (source, target, hint))| GlossaryEntry {
                source,
                target,
                hint,
                mask_id: mask_id_for(index),
            })
            .collect();

        let mut by_source = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_source.entry(entry.source.clone()).or_insert(index);
        }

        Self { entries, by_source }
    }

    pub fn entries(&self) -> &[GlossaryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&GlossaryEntry> {
        self.entries.get(index)
    }

    /// Index of the first entry with exactly this source
    pub fn index_of(&self, source: &str) -> Option<usize> {
        self.by_source.get(source).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Alternation over all sources, longest first
    pub fn source_pattern(&self) -> Result<Option<SearchPattern>> {
        let sources: Vec<&str> = self.entries.iter().map(|e| e.source.as_str()).collect();
        SearchPattern::compile(&sources)
    }
}

fn parse_line(line: &str) -> Option<(String, String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") {
        return None;
    }

    let (source, target, hint) = if line.contains(',') {
        let mut parts = line.splitn(3, ',');
        let source = parts.next().unwrap_or_default().trim();
        let hint = parts.next().unwrap_or_default().trim();
        let target = parts.next().unwrap_or_default().trim();
        (source, target, hint)
    } else if let Some((source, target)) = line.split_once('=') {
        (source.trim(), target.trim(), "")
    } else {
        return None;
    };

    if source.is_empty() || target.is_empty() {
        return None;
    }
    Some((source.to_string(), target.to_string(), hint.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_formats() {
        let glossary = Glossary::parse("ビクン, 몸이 튀는 모양, 움찔\nリン=린\n");
        assert_eq!(glossary.len(), 2);

        let first = glossary.get(0).unwrap();
        assert_eq!(first.source, "ビクン");
        assert_eq!(first.hint, "몸이 튀는 모양");
        assert_eq!(first.target, "움찔");
        assert_eq!(first.mask_id, "__MSK_0000__");

        let second = glossary.get(1).unwrap();
        assert_eq!(second.source, "リン");
        assert_eq!(second.target, "린");
        assert!(second.hint.is_empty());
        assert_eq!(second.mask_id, "__MSK_0001__");
    }

    #[test]
    fn test_comments_blank_and_incomplete_lines_are_dropped() {
        let glossary = Glossary::parse("// note\n\nonly,hint\n=missing\nsource=\nok=fine\n");
        assert_eq!(glossary.len(), 1);
        assert_eq!(glossary.get(0).unwrap().source, "ok");
    }

    #[test]
    fn test_third_field_keeps_remaining_commas() {
        let glossary = Glossary::parse("A,hint,x, y, z\n");
        assert_eq!(glossary.get(0).unwrap().target, "x, y, z");
    }

    #[test]
    fn test_sorted_longest_first_with_stable_ties() {
        let glossary = Glossary::parse("AB=1\nCD=2\nABC=3\n");
        let sources: Vec<&str> = glossary.entries().iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["ABC", "AB", "CD"]);
    }

    #[test]
    fn test_mask_ids_are_stable_across_loads() {
        let content = "ねこ=고양이\nいぬ,dog,개\nたぬき=너구리\n";
        let a = Glossary::parse(content);
        let b = Glossary::parse(content);
        assert_eq!(a.entries(), b.entries());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let glossary = Glossary::load("/definitely/not/here/glossary.txt");
        assert!(glossary.is_empty());
        assert!(glossary.source_pattern().unwrap().is_none());
    }

    #[test]
    fn test_index_of_first_entry() {
        let glossary = Glossary::parse("dup=one\ndup=two\n");
        assert_eq!(glossary.index_of("dup"), Some(0));
        assert_eq!(glossary.get(0).unwrap().target, "one");
    }
}
