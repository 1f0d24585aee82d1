use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract translatable text from dump files into a translation database
    Extract {
        /// Directory containing dump files
        #[arg(short, long)]
        input: PathBuf,

        /// Output database file, or a directory to write the default file name into
        #[arg(short, long)]
        output: PathBuf,

        /// Glossary file used for masking
        #[arg(short, long)]
        glossary: Option<PathBuf>,

        /// Do not extract 「」 and 『』 spans as separate lines
        #[arg(long)]
        no_brackets: bool,

        /// Mask glossary terms in extracted bracket spans
        #[arg(long)]
        mask: bool,
    },

    /// Write database translations back into dump files
    Apply {
        /// Directory containing dump files
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory; the input layout is mirrored
        #[arg(short, long)]
        output: PathBuf,

        /// Translation database (`original=translation` per line)
        #[arg(short, long)]
        database: PathBuf,

        /// Processing mode: auto, json, text, custom
        #[arg(short, long)]
        format: Option<String>,

        /// Write files even when nothing was replaced
        #[arg(long)]
        no_smart_save: bool,

        /// Only replace single English words when they are quoted or bracketed
        #[arg(long)]
        safe_english: bool,

        /// Prepend a UTF-8 BOM to written text files
        #[arg(long)]
        bom: bool,
    },

    /// Replace glossary terms in a database with mask tokens
    Mask {
        /// Translation database
        #[arg(short, long)]
        database: PathBuf,

        /// Glossary file
        #[arg(short, long)]
        glossary: PathBuf,
    },

    /// Turn mask tokens in a database back into glossary terms
    Restore {
        /// Masked translation database
        #[arg(short, long)]
        database: PathBuf,

        /// Glossary file
        #[arg(short, long)]
        glossary: PathBuf,
    },

    /// Translate database files with an AI provider
    Translate {
        /// Database file or directory of database files
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (single input) or directory
        #[arg(short, long)]
        output: PathBuf,

        /// Glossary file used for masking
        #[arg(short, long)]
        glossary: Option<PathBuf>,

        /// Provider: openai, anthropic, gemini, deepl
        #[arg(long)]
        provider: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// API key (falls back to the configuration file)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Write the default configuration to a file
    Config {
        /// Output TOML file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}
