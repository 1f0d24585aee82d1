use regex::{Regex, RegexBuilder};

use crate::error::Result;

/// Compiled program budget; large databases produce very wide alternations
const REGEX_SIZE_LIMIT: usize = 512 * (1 << 20);

/// Any line-break spelling: escaped `\r\n`, `\r`, `\n` or the real characters,
/// with horizontal whitespace around it
const FLEXIBLE_NEWLINE: &str = r"[ \t]*(?:\\r\\n|\\r|\\n|\r\n|\r|\n)[ \t]*";

/// How each literal is turned into a pattern branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralStyle {
    /// Every character matches itself
    Exact,
    /// Real newlines inside a literal match any newline spelling in the haystack
    FlexibleNewlines,
}

/// A single-pass alternation over literal strings.
///
/// Branch order is the caller's order. The regex engine uses leftmost-first
/// semantics, so callers pass literals longest-first to make `Fireball`
/// win over `Fire` at the same position.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    regex: Regex,
    branches: usize,
}

impl SearchPattern {
    /// Build an exact-match alternation. Empty literals are skipped; `None`
    /// means there is nothing to search for.
    pub fn compile<S: AsRef<str>>(literals: &[S]) -> Result<Option<Self>> {
        Self::compile_with(literals, LiteralStyle::Exact)
    }

    pub fn compile_with<S: AsRef<str>>(literals: &[S], style: LiteralStyle) -> Result<Option<Self>> {
        let branches: Vec<String> = literals
            .iter()
            .map(|literal| literal.as_ref())
            .filter(|literal| !literal.is_empty())
            .map(|literal| branch_for(literal, style))
            .collect();

        if branches.is_empty() {
            return Ok(None);
        }

        let regex = RegexBuilder::new(&branches.join("|"))
            .size_limit(REGEX_SIZE_LIMIT)
            .dfa_size_limit(REGEX_SIZE_LIMIT)
            .build()?;

        Ok(Some(Self {
            regex,
            branches: branches.len(),
        }))
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Number of literals in the alternation
    pub fn len(&self) -> usize {
        self.branches
    }

    pub fn is_empty(&self) -> bool {
        self.branches == 0
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn branch_for(literal: &str, style: LiteralStyle) -> String {
    match style {
        LiteralStyle::Exact => regex::escape(literal),
        LiteralStyle::FlexibleNewlines => literal
            .split('\n')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(FLEXIBLE_NEWLINE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_literal_wins_when_listed_first() {
        let pattern = SearchPattern::compile(&["Fireball", "Fire"]).unwrap().unwrap();
        let found: Vec<&str> = pattern
            .regex()
            .find_iter("Fireball and Fire")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["Fireball", "Fire"]);
    }

    #[test]
    fn test_special_characters_are_literal() {
        let pattern = SearchPattern::compile(&["a.b", "(x)", "$1"]).unwrap().unwrap();
        assert!(pattern.is_match("see (x) here"));
        assert!(!pattern.is_match("aXb"));
        assert!(pattern.is_match("costs $1"));
    }

    #[test]
    fn test_empty_input_yields_no_pattern() {
        let empty: [&str; 0] = [];
        assert!(SearchPattern::compile(&empty).unwrap().is_none());
        assert!(SearchPattern::compile(&["", ""]).unwrap().is_none());
    }

    #[test]
    fn test_flexible_newlines_match_every_spelling() {
        let pattern = SearchPattern::compile_with(&["first\nsecond"], LiteralStyle::FlexibleNewlines)
            .unwrap()
            .unwrap();
        assert!(pattern.is_match("first\nsecond"));
        assert!(pattern.is_match("first\r\nsecond"));
        assert!(pattern.is_match("first\\nsecond"));
        assert!(pattern.is_match("first\\r\\n  second"));
        assert!(!pattern.is_match("first second"));
    }
}
