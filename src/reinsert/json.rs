use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};

use crate::error::{KasaneError, Result};
use crate::script::is_mixed_script;

/// Substitute inside every string value of a JSON document.
///
/// Object keys are never touched. A node whose result mixes scripts keeps its
/// original value. `Ok(None)` means the text is not JSON.
pub fn reinsert_json<F>(text: &str, substitute: F) -> Result<Option<(String, usize)>>
where
    F: Fn(&str) -> (String, usize),
{
    let body = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut document: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };

    let mut changed = 0usize;
    walk(&mut document, &substitute, &mut changed);

    Ok(Some((to_pretty_string(&document)?, changed)))
}

fn walk<F>(value: &mut Value, substitute: &F, changed: &mut usize)
where
    F: Fn(&str) -> (String, usize),
{
    match value {
        Value::String(s) => {
            let (replaced, count) = substitute(s.as_str());
            if count > 0 && !is_mixed_script(&replaced) {
                *s = replaced;
                *changed += count;
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, substitute, changed);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                walk(item, substitute, changed);
            }
        }
        _ => {}
    }
}

/// Four-space indent, non-ASCII written as-is
pub fn to_pretty_string(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| KasaneError::Encoding(e.to_string()))
}
