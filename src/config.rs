use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{KasaneError, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional game translator.\n\
Output must be a JSON array of objects. Format: [{\"id\": 1, \"trans\": \"Korean text\"}, ...]\n\
Do NOT translate tokens like __MSK_XXXX__.\n\
Translate the 'text' field into natural Korean 'trans'.\n";

// Default values shared by serde and Default impls
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_dump_extensions() -> Vec<String> {
    vec!["txt".to_string(), "json".to_string(), "dat".to_string()]
}

fn default_translate_extensions() -> Vec<String> {
    vec!["txt".to_string(), "json".to_string(), "ini".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of files processed concurrently
    pub workers: usize,
    pub extract: ExtractOptions,
    pub reinsert: ReinsertOptions,
    pub translate: TranslateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Extract 「...」 and 『...』 spans as their own lines before chunk scanning
    pub protect_brackets: bool,
    /// Replace glossary terms inside bracket spans with mask tokens
    pub apply_masking: bool,
    /// Descend into subdirectories of the input folder
    pub recursive: bool,
    /// File extensions (without dot, case-insensitive) to scan
    pub extensions: Vec<String>,
    /// File name used when the output target is a directory
    pub output_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    /// JSON for `.json` files, plain text otherwise
    Auto,
    /// Try JSON for every file, falling back to plain text when parsing fails
    Json,
    /// Plain-text substitution for every file
    Text,
    /// Plain text with operator-supplied newline/space substitutes
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReinsertOptions {
    pub format: FormatMode,
    /// Marker inside database values that stands for a line break
    pub newline_marker: String,
    /// Marker inside database values that stands for a protected space
    pub space_marker: String,
    /// Custom mode replacement for the newline marker (`[Enter]` = real newline)
    pub newline_override: String,
    /// Custom mode replacement for the space marker (`[NBSP]` = U+00A0)
    pub space_override: String,
    /// Master switch for header protection, JSON escaping and special characters
    pub smart_mode: bool,
    pub header_protection: bool,
    pub json_escape: bool,
    pub special_chars: bool,
    /// Skip writing files where no replacement survived validation
    pub smart_save: bool,
    /// Only match single ASCII words when they are quoted or bracketed
    pub safe_english: bool,
    /// Prefix plain-text outputs with a UTF-8 byte-order mark
    pub write_bom: bool,
    pub recursive: bool,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    DeepL,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    /// Base URL override, mainly for proxies and local gateways
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Lines per provider request
    pub chunk_size: usize,
    pub temperature: f32,
    /// Ask the provider for a JSON response body
    pub force_json: bool,
    /// Pause between requests (seconds)
    pub request_delay_secs: f64,
    /// Attempts per request before giving up
    pub max_retries: u32,
    pub system_prompt: String,
    /// Mask glossary terms before sending
    pub auto_mask: bool,
    /// Replace mask tokens in responses with glossary targets
    pub auto_restore: bool,
    /// DeepL target language code
    pub target_lang: String,
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            extract: ExtractOptions::default(),
            reinsert: ReinsertOptions::default(),
            translate: TranslateConfig::default(),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            protect_brackets: true,
            apply_masking: false,
            recursive: false,
            extensions: default_dump_extensions(),
            output_name: "_EXTRACTED_DB.txt".to_string(),
        }
    }
}

impl Default for ReinsertOptions {
    fn default() -> Self {
        Self {
            format: FormatMode::Auto,
            newline_marker: "\\n".to_string(),
            space_marker: " ".to_string(),
            newline_override: "[Enter]".to_string(),
            space_override: "[NBSP]".to_string(),
            smart_mode: true,
            header_protection: true,
            json_escape: true,
            special_chars: true,
            smart_save: true,
            safe_english: false,
            write_bom: false,
            recursive: false,
            extensions: default_dump_extensions(),
        }
    }
}

impl ReinsertOptions {
    pub fn header_protection_active(&self) -> bool {
        self.smart_mode && self.header_protection
    }

    pub fn json_escape_active(&self) -> bool {
        self.smart_mode && self.json_escape
    }

    pub fn special_chars_active(&self) -> bool {
        self.smart_mode && self.special_chars
    }

    /// Resolved Custom-mode newline substitute
    pub fn newline_replacement(&self) -> String {
        match self.newline_override.as_str() {
            "[Enter]" => "\n".to_string(),
            other => other.to_string(),
        }
    }

    /// Resolved Custom-mode space substitute
    pub fn space_replacement(&self) -> String {
        match self.space_override.as_str() {
            "[NBSP]" => "\u{00A0}".to_string(),
            other => other.to_string(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            endpoint: None,
            chunk_size: 15,
            temperature: 0.1,
            force_json: true,
            request_delay_secs: 0.5,
            max_retries: 3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            auto_mask: true,
            auto_restore: true,
            target_lang: "KO".to_string(),
            extensions: default_translate_extensions(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KasaneError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| KasaneError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KasaneError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| KasaneError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject configurations that cannot run at all
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(KasaneError::Config("workers must be at least 1".to_string()));
        }
        if self.translate.chunk_size == 0 {
            return Err(KasaneError::Config("translate.chunk_size must be at least 1".to_string()));
        }
        if self.reinsert.newline_marker.is_empty() || self.reinsert.space_marker.is_empty() {
            return Err(KasaneError::Config("reinsert markers must not be empty".to_string()));
        }
        let delay = self.translate.request_delay_secs;
        if !delay.is_finite() || delay < 0.0 {
            return Err(KasaneError::Config(format!(
                "translate.request_delay_secs must be a non-negative number, got {}",
                delay
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.translate.chunk_size, 15);
        assert_eq!(config.reinsert.newline_marker, "\\n");
        assert_eq!(config.reinsert.space_marker, " ");
        assert!(config.extract.protect_brackets);
        assert!(!config.extract.apply_masking);
        assert!(config.reinsert.smart_save);
        assert!(!config.reinsert.safe_english);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[reinsert]\nformat = \"json\"\nsmart_save = false\n").unwrap();
        assert_eq!(config.reinsert.format, FormatMode::Json);
        assert!(!config.reinsert.smart_save);
        assert_eq!(config.reinsert.newline_marker, "\\n");
        assert_eq!(config.translate.chunk_size, 15);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kasane.toml");
        let mut config = Config::default();
        config.translate.provider = ProviderKind::Gemini;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.translate.provider, ProviderKind::Gemini);
    }

    #[test]
    fn test_custom_replacements_resolve_tokens() {
        let mut options = ReinsertOptions::default();
        assert_eq!(options.newline_replacement(), "\n");
        assert_eq!(options.space_replacement(), "\u{00A0}");
        options.newline_override = "<br>".to_string();
        options.space_override = "_".to_string();
        assert_eq!(options.newline_replacement(), "<br>");
        assert_eq!(options.space_replacement(), "_");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_request_delay() {
        for delay in [f64::INFINITY, f64::NAN, -1.0] {
            let mut config = Config::default();
            config.translate.request_delay_secs = delay;
            assert!(config.validate().is_err(), "delay {} accepted", delay);
        }

        let mut config = Config::default();
        config.translate.request_delay_secs = 0.0;
        assert!(config.validate().is_ok());
    }
}
