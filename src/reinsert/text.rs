use crate::script::is_mixed_script;

/// Split after each `\r\n`, `\r` or `\n`, keeping the terminators
pub fn split_lines_keep_ends(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            b'\r' => {
                let end = if bytes.get(i + 1) == Some(&b'\n') { i + 1 } else { i };
                lines.push(&text[start..=end]);
                i = end;
                start = end + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Revert substituted lines that ended up mixing Hangul and Japanese.
///
/// Returns the final text and the number of changed lines that survived. When
/// a replacement changed the line count, lines cannot be paired up and the
/// whole substitution is accepted with `raw_count`.
pub fn rollback_mixed_lines(original: &str, substituted: String, raw_count: usize) -> (String, usize) {
    let before = split_lines_keep_ends(original);
    let after = split_lines_keep_ends(&substituted);

    if before.len() != after.len() {
        return (substituted, raw_count);
    }

    let mut output = String::with_capacity(substituted.len());
    let mut changed = 0usize;
    for (old, new) in before.iter().zip(after.iter()) {
        if old == new {
            output.push_str(new);
        } else if is_mixed_script(new) {
            output.push_str(old);
        } else {
            output.push_str(new);
            changed += 1;
        }
    }
    (output, changed)
}
