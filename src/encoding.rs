use encoding_rs::{BIG5, EUC_KR, Encoding, GBK, SHIFT_JIS, UTF_16BE, UTF_16LE};
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Legacy encodings tried, in order, when a file is not valid UTF-8
const LEGACY_CANDIDATES: [&Encoding; 4] = [SHIFT_JIS, EUC_KR, GBK, BIG5];

/// Bytes inspected by the UTF-16 zero-byte heuristic
const SNIFF_WINDOW: usize = 4096;

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Name of the encoding that produced `text`
    pub encoding: &'static str,
    /// True when undecodable bytes were replaced with U+FFFD
    pub lossy: bool,
}

/// Decode as strict UTF-8, falling back to a detected encoding with replacement.
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding: "UTF-8",
            lossy: false,
        };
    }

    let encoding = detect_encoding(bytes);
    let (text, _, lossy) = encoding.decode(bytes);
    debug!("Decoded with fallback encoding {} (lossy: {})", encoding.name(), lossy);

    DecodedText {
        text: text.into_owned(),
        encoding: encoding.name(),
        lossy,
    }
}

pub fn read_text_file<P: AsRef<Path>>(path: P) -> Result<DecodedText> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(decode_bytes(&bytes))
}

/// Best guess for bytes that failed UTF-8 validation
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    if let Some(encoding) = sniff_utf16(bytes) {
        return encoding;
    }

    LEGACY_CANDIDATES
        .iter()
        .copied()
        .find(|encoding| {
            encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .is_some()
        })
        .unwrap_or(SHIFT_JIS)
}

fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.len() < 4 {
        return None;
    }

    let pairs = window.len() / 2;
    let even_zeros = window.iter().step_by(2).filter(|b| **b == 0).count();
    let odd_zeros = window.iter().skip(1).step_by(2).filter(|b| **b == 0).count();

    // ASCII-heavy UTF-16 puts a zero in every other byte
    if odd_zeros * 10 > pairs * 3 && even_zeros * 10 < pairs {
        Some(UTF_16LE)
    } else if even_zeros * 10 > pairs * 3 && odd_zeros * 10 < pairs {
        Some(UTF_16BE)
    } else {
        None
    }
}
