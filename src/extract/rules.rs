use once_cell::sync::Lazy;
use regex::Regex;

use crate::script::{has_content_char, has_japanese};

/// A wrapper format whose payload is one capture group
#[derive(Debug, Clone)]
pub struct CleaningRule {
    pub name: &'static str,
    pattern: Regex,
    group: usize,
}

impl CleaningRule {
    pub fn new(name: &'static str, pattern: &str, group: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            group,
        })
    }

    /// Captured payload, trimmed with trailing `=` removed
    pub fn apply(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let payload = caps.get(self.group).map(|m| m.as_str()).unwrap_or_default();
        Some(payload.trim().trim_end_matches('=').to_string())
    }
}

/// Built-in rules, tried in order
pub static DEFAULT_RULES: Lazy<Vec<CleaningRule>> = Lazy::new(|| {
    vec![
        // UABEA text asset dumps: 1 string m_Text = "..."
        CleaningRule::new("m_text", r#"m_Text\s*=\s*"(.*?)""#, 1).expect("m_Text rule"),
        // Script speaker tags: #speaker=name=
        CleaningRule::new("speaker", r"#speaker=(.*)", 1).expect("speaker rule"),
    ]
});

/// First matching rule wins; no match returns the chunk unchanged
pub fn clean_chunk(chunk: &str, rules: &[CleaningRule]) -> String {
    rules
        .iter()
        .find_map(|rule| rule.apply(chunk))
        .unwrap_or_else(|| chunk.to_string())
}

/// Cleaned text with the two-character `\n` / `\r` formatting escapes removed
pub fn validation_view(cleaned: &str) -> String {
    cleaned.replace("\\n", "").replace("\\r", "")
}

/// Two-tier acceptance. Unwrapped text only needs one letter; raw chunks need
/// Japanese and more than one character.
pub fn accept_chunk(original: &str, cleaned: &str) -> bool {
    if cleaned.is_empty() {
        return false;
    }
    let high_confidence = cleaned != original;
    let view = validation_view(cleaned);

    if high_confidence {
        has_content_char(&view)
    } else {
        has_japanese(&view) && view.chars().count() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(chunk: &str) -> bool {
        let cleaned = clean_chunk(chunk, &DEFAULT_RULES);
        accept_chunk(chunk, &cleaned)
    }

    #[test]
    fn test_m_text_rule() {
        let cleaned = clean_chunk(r#"1 string m_Text = "こんにちは""#, &DEFAULT_RULES);
        assert_eq!(cleaned, "こんにちは");
    }

    #[test]
    fn test_speaker_rule_strips_trailing_equals() {
        assert_eq!(clean_chunk("#speaker=リン=", &DEFAULT_RULES), "リン");
        assert_eq!(clean_chunk("#speaker= Girl==", &DEFAULT_RULES), "Girl");
        // trimmed before the `=` run is stripped
        assert_eq!(clean_chunk("#speaker= Girl ==", &DEFAULT_RULES), "Girl ");
    }

    #[test]
    fn test_unmatched_chunk_passes_through() {
        assert_eq!(clean_chunk("ただのテキスト", &DEFAULT_RULES), "ただのテキスト");
    }

    #[test]
    fn test_acceptance_boundaries() {
        assert!(!accepts("002\\n"));
        assert!(!accepts("あ\\n"));
        assert!(accepts("ねこ"));
        assert!(!accepts("12345"));
        assert!(!accepts("hello"));
    }

    #[test]
    fn test_high_confidence_accepts_short_latin() {
        assert!(accepts(r#"m_Text = "OK""#));
        assert!(!accepts(r#"m_Text = "\n002""#));
    }
}
