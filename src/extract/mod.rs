//! Candidate text extraction from raw dump files.
//!
//! Bracketed dialogue (`「...」`, `『...』`) is pulled out first and kept whole,
//! then the remaining text is cut into control-free runs that go through the
//! cleaning rules and the acceptance heuristic.

pub mod rules;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

use crate::config::ExtractOptions;
use crate::encoding::read_text_file;
use crate::error::Result;
use crate::masking::MaskingEngine;
use crate::script::strip_control_noise;

pub use rules::{accept_chunk, clean_chunk, CleaningRule, DEFAULT_RULES};

static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"「[^」]+」|『[^』]+』").expect("bracket regex"));

static CHUNK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\x00-\x1f]+").expect("chunk regex"));

#[derive(Debug, Clone)]
pub struct ChunkExtractor {
    protect_brackets: bool,
    masking: Option<Arc<MaskingEngine>>,
    rules: Vec<CleaningRule>,
}

impl ChunkExtractor {
    /// `masking` is used only when `options.apply_masking` is set and the
    /// engine has terms
    pub fn new(options: &ExtractOptions, masking: Option<Arc<MaskingEngine>>) -> Self {
        let masking = masking.filter(|engine| options.apply_masking && engine.is_active());
        Self {
            protect_brackets: options.protect_brackets,
            masking,
            rules: DEFAULT_RULES.clone(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<CleaningRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Accepted lines of one text, first occurrence order, no duplicates
    pub fn extract(&self, content: &str) -> Vec<String> {
        let mut found = IndexSet::new();
        let mut working = strip_control_noise(content);

        if self.protect_brackets {
            let spans: Vec<String> = BRACKET_RE
                .find_iter(&working)
                .map(|m| m.as_str().to_string())
                .collect();

            for span in spans {
                let mut line = clean_chunk(&span, &self.rules);
                if let Some(engine) = &self.masking {
                    line = engine.apply(&line);
                }
                if !line.is_empty() {
                    found.insert(line);
                }
                working = working.replace(&span, "");
            }
        }

        for m in CHUNK_RE.find_iter(&working) {
            let chunk = m.as_str().trim();
            let cleaned = clean_chunk(chunk, &self.rules);
            if accept_chunk(chunk, &cleaned) {
                found.insert(cleaned);
            }
        }

        found.into_iter().collect()
    }

    pub fn extract_file(&self, path: &Path) -> Result<Vec<String>> {
        let decoded = read_text_file(path)?;
        Ok(self.extract(&decoded.text))
    }
}
