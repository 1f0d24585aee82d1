//! Kasane - Game Text Extraction and Reinsertion
//!
//! Pulls translatable Japanese text out of game asset dumps into a flat
//! `original=translation` database, protects glossary terms with mask tokens
//! while the text is translated, and writes the translations back into the
//! dumps without breaking JSON structure or binary headers.

pub mod cli;
pub mod config;
pub mod database;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod files;
pub mod glossary;
pub mod masking;
pub mod pattern;
pub mod progress;
pub mod reinsert;
pub mod script;
pub mod translate;
pub mod workflow;
