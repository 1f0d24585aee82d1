use once_cell::sync::Lazy;
use regex::Regex;

/// Hiragana, Katakana, CJK ideographs and the CJK/fullwidth punctuation blocks.
pub static JAPANESE_WIDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{3000}-\x{303F}\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{FF00}-\x{FFEF}\x{4E00}-\x{9FAF}\x{3400}-\x{4DBF}]")
        .expect("japanese regex")
});

pub static HANGUL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{AC00}-\x{D7A3}]").expect("hangul regex"));

/// At least one letter: ASCII alphabet, Kana, CJK or Hangul syllable.
pub static CONTENT_CHAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z\x{3040}-\x{30FF}\x{4E00}-\x{9FAF}\x{3400}-\x{4DBF}\x{AC00}-\x{D7A3}]")
        .expect("content char regex")
});

static CONTROL_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x09\x0b\x0c\x0e-\x1f\x7f]").expect("control regex"));

pub fn has_japanese(text: &str) -> bool {
    JAPANESE_WIDE_RE.is_match(text)
}

pub fn has_hangul(text: &str) -> bool {
    HANGUL_RE.is_match(text)
}

pub fn has_content_char(text: &str) -> bool {
    CONTENT_CHAR_RE.is_match(text)
}

/// Hangul next to Japanese means the source leaked into a translation.
pub fn is_mixed_script(text: &str) -> bool {
    has_hangul(text) && has_japanese(text)
}

/// Drop binary-dump control characters, keeping LF and CR.
pub fn strip_control_noise(text: &str) -> String {
    CONTROL_NOISE_RE.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_script_detection() {
        assert!(is_mixed_script("고양이ねこ"));
        assert!(!is_mixed_script("고양이"));
        assert!(!is_mixed_script("ねこ"));
        assert!(!is_mixed_script("cat"));
    }

    #[test]
    fn test_fullwidth_punctuation_counts_as_japanese() {
        assert!(has_japanese("！"));
        assert!(has_japanese("「"));
        assert!(!has_content_char("「」"));
    }

    #[test]
    fn test_strip_control_noise_keeps_newlines() {
        assert_eq!(strip_control_noise("a\x00b\x1fc\nd\re\x7f"), "abc\nd\re");
    }
}
