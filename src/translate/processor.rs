use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::TranslateConfig;
use crate::encoding::read_text_file;
use crate::error::{KasaneError, Result};
use crate::files::has_extension;
use crate::glossary::GlossaryEntry;
use crate::masking::{MaskingContext, MaskingEngine, RestoreSide};
use crate::progress::Reporter;
use super::{translate, Translator};

/// One file scheduled for translation
#[derive(Debug, Clone)]
pub struct TranslationTask {
    pub name: String,
    pub source: PathBuf,
    pub output: PathBuf,
    /// Non-blank, non-comment lines, trimmed
    pub lines: Vec<String>,
    raw_lines: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TranslateReport {
    pub files: usize,
    pub lines: usize,
    pub translated: usize,
    pub failed_chunks: usize,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ChunkItem<'a> {
    id: usize,
    text: &'a str,
}

struct PreparedLine {
    key: String,
    masked: String,
    context: MaskingContext,
}

/// Drives a translator over database-style files, chunk by chunk
pub struct TranslationProcessor {
    translator: Arc<dyn Translator>,
    masking: Option<Arc<MaskingEngine>>,
    config: TranslateConfig,
    reporter: Arc<dyn Reporter>,
}

impl TranslationProcessor {
    /// `masking` is ignored when `config.auto_mask` is off
    pub fn new(
        translator: Arc<dyn Translator>,
        masking: Option<Arc<MaskingEngine>>,
        config: TranslateConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let masking = masking.filter(|engine| config.auto_mask && engine.is_active());
        Self {
            translator,
            masking,
            config,
            reporter,
        }
    }

    pub async fn run(&self, input: &Path, output: &Path) -> Result<TranslateReport> {
        let tasks = self.plan(input, output)?;
        let total: usize = tasks.iter().map(|t| t.lines.len()).sum();

        let mut report = TranslateReport::default();
        if total == 0 {
            self.reporter.log("No translatable lines found");
            return Ok(report);
        }

        self.reporter.log(&format!(
            "Translating {} files, {} lines with {} (chunk {}, temperature {}, JSON {})",
            tasks.len(),
            total,
            self.translator.name(),
            self.config.chunk_size,
            self.config.temperature,
            if self.config.force_json { "on" } else { "off" }
        ));

        let mut processed = 0usize;
        for task in &tasks {
            self.reporter.log(&format!("Processing {}", task.name));
            let (translations, failed) = self.translate_task(task, &mut processed, total).await;

            let content = render_output(&task.raw_lines, &translations);
            if let Some(parent) = task.output.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            match std::fs::write(&task.output, content) {
                Ok(()) => report.outputs.push(task.output.clone()),
                Err(e) => self
                    .reporter
                    .log(&format!("Failed to write {}: {}", task.output.display(), e)),
            }

            report.files += 1;
            report.lines += task.lines.len();
            report.translated += translations.len();
            report.failed_chunks += failed;
        }

        self.reporter.progress(1.0, "done");
        info!(
            "Translation finished: {} files, {}/{} lines translated, {} failed chunks",
            report.files, report.translated, report.lines, report.failed_chunks
        );
        Ok(report)
    }

    /// Resolve input files and their output paths. An output path with an
    /// extension is a file name, but only when there is a single input.
    pub fn plan(&self, input: &Path, output: &Path) -> Result<Vec<TranslationTask>> {
        let sources: Vec<PathBuf> = if input.is_file() {
            vec![input.to_path_buf()]
        } else if input.is_dir() {
            WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_extension(p, &self.config.extensions))
                .collect()
        } else {
            return Err(KasaneError::FileNotFound(input.display().to_string()));
        };

        let single_output = output.extension().is_some();
        let output_dir = if single_output {
            output.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            output.to_path_buf()
        };

        let mut tasks = Vec::new();
        for source in &sources {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let text = match read_text_file(source) {
                Ok(decoded) => decoded.text,
                Err(e) => {
                    self.reporter.log(&format!("Failed to read {}: {}", name, e));
                    continue;
                }
            };

            let raw_lines: Vec<String> = text.lines().map(str::to_string).collect();
            let lines: Vec<String> = raw_lines
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty() && !l.starts_with("//"))
                .map(str::to_string)
                .collect();
            if lines.is_empty() {
                continue;
            }

            let output = if single_output && sources.len() == 1 {
                output.to_path_buf()
            } else {
                output_dir.join(&name)
            };

            tasks.push(TranslationTask {
                name,
                source: source.clone(),
                output,
                lines,
                raw_lines,
            });
        }
        Ok(tasks)
    }

    async fn translate_task(
        &self,
        task: &TranslationTask,
        processed: &mut usize,
        total: usize,
    ) -> (HashMap<String, String>, usize) {
        let mut translations = HashMap::new();
        let mut failed = 0usize;
        let chunk_size = self.config.chunk_size.max(1);
        let delay = Duration::from_secs_f64(self.config.request_delay_secs.max(0.0));

        for (index, chunk) in task.lines.chunks(chunk_size).enumerate() {
            match self.translate_chunk(chunk).await {
                Ok(pairs) => translations.extend(pairs),
                Err(e) => {
                    failed += 1;
                    self.reporter.log(&format!(
                        "Chunk {} of {} failed, keeping originals: {}",
                        index, task.name, e
                    ));
                }
            }

            *processed += chunk.len();
            self.reporter
                .progress(*processed as f32 / total as f32, &task.name);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        (translations, failed)
    }

    /// Translate one chunk of lines; returns `key -> translation` for every
    /// line the provider answered
    pub async fn translate_chunk(&self, chunk: &[String]) -> Result<Vec<(String, String)>> {
        let prepared: Vec<PreparedLine> = chunk.iter().map(|line| self.prepare(line)).collect();
        let items: Vec<ChunkItem<'_>> = prepared
            .iter()
            .enumerate()
            .map(|(i, line)| ChunkItem {
                id: i + 1,
                text: &line.masked,
            })
            .collect();
        let payload = serde_json::to_string(&items)?;
        let system_prompt = self.system_prompt(&prepared);

        let response = translate(self.translator.as_ref(), &system_prompt, &payload).await?;
        debug!("Raw translation response: {}", response);

        let mut pairs = Vec::new();
        for (id, trans) in parse_response(&response)? {
            let Some(line) = id.checked_sub(1).and_then(|i| prepared.get(i)) else {
                continue;
            };
            let translated = match (&self.masking, self.config.auto_restore) {
                (Some(engine), true) => line.context.restore(&trans, engine.glossary(), RestoreSide::Target),
                _ => trans,
            };
            pairs.push((line.key.clone(), translated));
        }
        Ok(pairs)
    }

    fn prepare(&self, line: &str) -> PreparedLine {
        let key = line
            .split_once('=')
            .map(|(left, _)| left)
            .unwrap_or(line)
            .trim()
            .to_string();
        let (masked, context) = match &self.masking {
            Some(engine) => engine.apply_with_context(&key),
            None => (key.clone(), MaskingContext::default()),
        };
        PreparedLine { key, masked, context }
    }

    fn system_prompt(&self, prepared: &[PreparedLine]) -> String {
        let mut prompt = self.config.system_prompt.clone();
        let Some(engine) = &self.masking else {
            return prompt;
        };

        let mut references: IndexMap<&str, &GlossaryEntry> = IndexMap::new();
        for line in prepared {
            for entry in line.context.entries(engine.glossary()) {
                references.entry(entry.mask_id.as_str()).or_insert(entry);
            }
        }

        for (token, entry) in references {
            if entry.hint.is_empty() {
                prompt.push_str(&format!("Reference: {} means {}\n", token, entry.target));
            } else {
                prompt.push_str(&format!(
                    "Reference: {} means {} (Context: {})\n",
                    token, entry.target, entry.hint
                ));
            }
        }
        prompt
    }
}

/// `(id, trans)` pairs from a provider response. Markdown fences are removed
/// and a lone object counts as a one-element array.
pub fn parse_response(response: &str) -> Result<Vec<(usize, String)>> {
    let cleaned = response.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    let items = match serde_json::from_str::<Value>(cleaned)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return Ok(Vec::new()),
    };

    let pairs = items
        .iter()
        .filter_map(|item| {
            let id = match item.get("id")? {
                Value::Number(n) => n.as_u64()? as usize,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let trans = item.get("trans")?.as_str()?;
            (!trans.is_empty()).then(|| (id, trans.to_string()))
        })
        .collect();
    Ok(pairs)
}

/// Blank and comment lines are kept (trimmed); every other line becomes
/// `key=translation`, or `key=key` when nothing came back
pub fn render_output(raw_lines: &[String], translations: &HashMap<String, String>) -> String {
    raw_lines
        .iter()
        .map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                return line.to_string();
            }
            let key = line.split_once('=').map(|(k, _)| k).unwrap_or(line).trim();
            match translations.get(key) {
                Some(translated) => format!("{}={}", key, translated),
                None => format!("{}={}", key, key),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
