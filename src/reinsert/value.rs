use crate::config::{FormatMode, ReinsertOptions};

const NBSP: char = '\u{00A0}';

/// Where a formatted value is going to land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTarget {
    /// Raw text file
    PlainText,
    /// JSON source edited as text; values must be escaped by hand
    JsonText,
    /// A parsed JSON string node; the serializer escapes on output
    JsonNode,
}

/// Turns raw database values into replacement text
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    custom: bool,
    newline_marker: String,
    space_marker: String,
    newline_replacement: String,
    space_replacement: String,
    special_chars: bool,
    json_escape: bool,
}

impl ValueFormatter {
    pub fn new(options: &ReinsertOptions) -> Self {
        Self {
            custom: options.format == FormatMode::Custom,
            newline_marker: options.newline_marker.clone(),
            space_marker: options.space_marker.clone(),
            newline_replacement: options.newline_replacement(),
            space_replacement: options.space_replacement(),
            special_chars: options.special_chars_active(),
            json_escape: options.json_escape_active(),
        }
    }

    pub fn format(&self, raw: &str, target: ValueTarget) -> String {
        if self.custom {
            return raw
                .replace(&self.newline_marker, &self.newline_replacement)
                .replace(&self.space_marker, &self.space_replacement);
        }

        let value = if self.special_chars {
            raw.replace(&self.newline_marker, "\n")
                .replace(&self.space_marker, &NBSP.to_string())
        } else {
            raw.replace(&self.newline_marker, "\n")
        };

        if target == ValueTarget::JsonText && self.json_escape {
            value
                .replace('\n', "\\n")
                .replace('"', "\\\"")
                .replace(NBSP, " ")
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_markers() {
        let formatter = ValueFormatter::new(&ReinsertOptions::default());
        assert_eq!(
            formatter.format("안녕\\n세상 끝", ValueTarget::PlainText),
            "안녕\n세상\u{00A0}끝"
        );
    }

    #[test]
    fn test_json_text_is_escaped() {
        let formatter = ValueFormatter::new(&ReinsertOptions::default());
        assert_eq!(
            formatter.format("\"안녕\"\\n세상 끝", ValueTarget::JsonText),
            "\\\"안녕\\\"\\n세상 끝"
        );
    }

    #[test]
    fn test_json_node_keeps_real_characters() {
        let formatter = ValueFormatter::new(&ReinsertOptions::default());
        assert_eq!(formatter.format("a\\nb", ValueTarget::JsonNode), "a\nb");
    }

    #[test]
    fn test_special_chars_off_keeps_spaces() {
        let options = ReinsertOptions {
            special_chars: false,
            ..ReinsertOptions::default()
        };
        let formatter = ValueFormatter::new(&options);
        assert_eq!(formatter.format("a b\\nc", ValueTarget::PlainText), "a b\nc");
    }

    #[test]
    fn test_custom_overrides() {
        let options = ReinsertOptions {
            format: FormatMode::Custom,
            newline_override: "<br>".to_string(),
            space_override: "[NBSP]".to_string(),
            ..ReinsertOptions::default()
        };
        let formatter = ValueFormatter::new(&options);
        assert_eq!(
            formatter.format("a b\\nc", ValueTarget::JsonText),
            "a\u{00A0}b<br>c"
        );
    }
}
