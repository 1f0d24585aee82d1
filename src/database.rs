//! The flat `original=translated` mapping that drives reinsertion, plus the
//! writer for freshly extracted (untranslated) databases.

use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, info};

use crate::encoding::read_text_file;
use crate::error::{KasaneError, Result};
use crate::pattern::{LiteralStyle, SearchPattern};

/// Canonical key form: every newline spelling (escaped `\r\n`, `\r`, `\n` or
/// real CR/LF/CRLF) becomes `\n`, each line is trimmed, then the whole key.
pub fn normalize_key(raw: &str) -> String {
    let unified = raw
        .replace("\\r\\n", "\n")
        .replace("\\r", "\n")
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    unified
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Default)]
pub struct TranslationDatabase {
    entries: IndexMap<String, String>,
}

impl TranslationDatabase {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KasaneError::FileNotFound(path.display().to_string()));
        }

        let decoded = read_text_file(path)?;
        let database = Self::parse(&decoded.text);
        info!("Loaded {} database entries from {}", database.len(), path.display());
        Ok(database)
    }

    /// Lines without `=` are ignored; a repeated key keeps its last value
    pub fn parse(content: &str) -> Self {
        let mut entries = IndexMap::new();
        for line in content.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = normalize_key(key);
            if key.is_empty() {
                continue;
            }
            entries.insert(key, value.trim().to_string());
        }
        Self { entries }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (normalize_key(k.as_ref()), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for a span matched in a scanned file, whatever its newline spelling
    pub fn lookup(&self, matched: &str) -> Option<&str> {
        self.get(matched).or_else(|| self.get(&normalize_key(matched)))
    }

    /// Keys ordered longest first (by characters), ties in load order
    pub fn keys_longest_first(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        keys
    }

    /// One alternation over every key; multi-line keys match any newline spelling
    pub fn search_pattern(&self) -> Result<Option<SearchPattern>> {
        let keys = self.keys_longest_first();
        let pattern = SearchPattern::compile_with(&keys, LiteralStyle::FlexibleNewlines)?;
        if let Some(pattern) = &pattern {
            debug!("Compiled database pattern with {} keys", pattern.len());
        }
        Ok(pattern)
    }
}

/// Write extracted lines as `line=` entries ready for translation
pub fn write_extracted<P, I, S>(path: P, lines: I) -> Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut content = String::new();
    let mut count = 0usize;
    for line in lines {
        content.push_str(line.as_ref());
        content.push_str("=\n");
        count += 1;
    }

    std::fs::write(path, content)?;
    Ok(count)
}
