//! Kasane - Game Text Extraction and Reinsertion
//!
//! Entry point for the `kasane` command line tool: extract text from game
//! dump files, translate it, and write the translations back.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kasane::cli::{Args, Commands};
use kasane::config::{Config, FormatMode, ProviderKind};
use kasane::error::KasaneError;
use kasane::progress::ConsoleReporter;
use kasane::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Kasane");

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Config { output } => {
            config.save_to_file(&output)?;
            println!("Wrote configuration to {}", output.display());
        }
        Commands::Extract {
            input,
            output,
            glossary,
            no_brackets,
            mask,
        } => {
            if no_brackets {
                config.extract.protect_brackets = false;
            }
            if mask {
                config.extract.apply_masking = true;
            }

            let workflow = build_workflow(config)?;
            let report = workflow.extract(&input, &output, glossary.as_deref()).await?;
            println!(
                "Scanned {} files ({} failed), {} unique lines",
                report.files_scanned,
                report.files_failed,
                report.lines.len()
            );
            if let Some(path) = report.output {
                println!("Database written to {}", path.display());
            }
        }
        Commands::Apply {
            input,
            output,
            database,
            format,
            no_smart_save,
            safe_english,
            bom,
        } => {
            if let Some(format) = format {
                config.reinsert.format = parse_format_mode(&format)?;
            }
            if no_smart_save {
                config.reinsert.smart_save = false;
            }
            if safe_english {
                config.reinsert.safe_english = true;
            }
            if bom {
                config.reinsert.write_bom = true;
            }

            let workflow = build_workflow(config)?;
            let report = workflow.apply(&input, &output, &database).await?;
            println!(
                "Scanned {} files, saved {}, {} failed, {} replacements",
                report.files_scanned, report.files_saved, report.files_failed, report.replacements
            );
        }
        Commands::Mask { database, glossary } => {
            let workflow = build_workflow(config)?;
            if let Some(summary) = workflow.mask_database(&database, &glossary)? {
                println!("Masked {} lines into {}", summary.lines, summary.output.display());
            }
        }
        Commands::Restore { database, glossary } => {
            let workflow = build_workflow(config)?;
            if let Some(summary) = workflow.restore_database(&database, &glossary)? {
                println!("Restored {} lines into {}", summary.lines, summary.output.display());
            }
        }
        Commands::Translate {
            input,
            output,
            glossary,
            provider,
            model,
            api_key,
        } => {
            if let Some(provider) = provider {
                config.translate.provider = parse_provider(&provider)?;
            }
            if let Some(model) = model {
                config.translate.model = model;
            }
            if let Some(api_key) = api_key {
                config.translate.api_key = api_key;
            }

            let workflow = build_workflow(config)?;
            let report = workflow.translate(&input, &output, glossary.as_deref()).await?;
            println!(
                "Translated {}/{} lines in {} files ({} failed chunks)",
                report.translated, report.lines, report.files, report.failed_chunks
            );
        }
    }

    info!("Kasane finished");
    Ok(())
}

fn build_workflow(config: Config) -> Result<Workflow> {
    Ok(Workflow::new(config)?.with_reporter(Arc::new(ConsoleReporter::new())))
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let kasane_dir = std::env::current_dir()?.join(".kasane");
    let log_dir = kasane_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "kasane.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(verbose)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("kasane.log").display()
    );

    Ok(())
}

fn parse_format_mode(mode: &str) -> Result<FormatMode> {
    match mode.to_lowercase().as_str() {
        "auto" => Ok(FormatMode::Auto),
        "json" => Ok(FormatMode::Json),
        "text" => Ok(FormatMode::Text),
        "custom" => Ok(FormatMode::Custom),
        _ => Err(KasaneError::Config(format!(
            "Invalid format '{}'. Valid formats: auto, json, text, custom",
            mode
        ))
        .into()),
    }
}

fn parse_provider(provider: &str) -> Result<ProviderKind> {
    match provider.to_lowercase().as_str() {
        "openai" => Ok(ProviderKind::OpenAi),
        "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
        "gemini" => Ok(ProviderKind::Gemini),
        "deepl" => Ok(ProviderKind::DeepL),
        _ => Err(KasaneError::Config(format!(
            "Invalid provider '{}'. Valid providers: openai, anthropic, gemini, deepl",
            provider
        ))
        .into()),
    }
}
