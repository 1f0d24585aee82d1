use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{write_extracted, TranslationDatabase};
use crate::error::{KasaneError, Result};
use crate::extract::ChunkExtractor;
use crate::files::{collect_files, mirror_path};
use crate::glossary::Glossary;
use crate::masking::{
    mask_database_file, restore_database_file, DatabaseMaskMode, DatabaseMaskSummary, MaskingEngine,
};
use crate::progress::{Reporter, SilentReporter};
use crate::reinsert::{FileOutcome, Reinserter};
use crate::translate::{TranslateReport, TranslationProcessor, Translator, TranslatorFactory};

/// Completed files between progress log lines
const LOG_EVERY: usize = 100;

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub files_scanned: usize,
    pub files_failed: usize,
    /// Merged unique lines in first-seen order
    pub lines: Vec<String>,
    /// `None` when nothing was extracted or the write failed
    pub output: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub files_scanned: usize,
    pub files_saved: usize,
    pub files_failed: usize,
    pub replacements: usize,
    pub outcomes: Vec<FileOutcome>,
}

pub struct Workflow {
    config: Config,
    reporter: Arc<dyn Reporter>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reporter: Arc::new(SilentReporter),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan every dump file under `input_dir` and write the unique lines to `output`.
    /// When `output` is an existing directory the configured file name is used inside it.
    pub async fn extract(
        &self,
        input_dir: &Path,
        output: &Path,
        glossary: Option<&Path>,
    ) -> Result<ExtractReport> {
        ensure_dir(input_dir)?;
        let options = self.config.extract.clone();

        let masking = if options.apply_masking {
            self.load_masking(glossary)?
        } else {
            None
        };
        let extractor = Arc::new(ChunkExtractor::new(&options, masking));

        let files = collect_files(input_dir, &options.extensions, options.recursive);
        self.reporter
            .log(&format!("Extracting text from {} files in {}", files.len(), input_dir.display()));

        let mut report = ExtractReport::default();
        let mut merged: IndexSet<String> = IndexSet::new();
        let reporter = self.reporter.clone();

        self.run_pool(
            files,
            move |path| extractor.extract_file(path),
            |path, result| match result {
                Ok(lines) => {
                    report.files_scanned += 1;
                    debug!("{}: {} lines", path.display(), lines.len());
                    merged.extend(lines);
                }
                Err(e) => {
                    report.files_failed += 1;
                    reporter.log(&format!("Failed to read {}: {}", path.display(), e));
                }
            },
        )
        .await;

        report.lines = merged.into_iter().collect();
        if report.lines.is_empty() {
            self.reporter.log("No text found to extract");
            self.reporter.finish();
            return Ok(report);
        }

        let save_path = if output.is_dir() {
            output.join(&options.output_name)
        } else {
            output.to_path_buf()
        };

        match write_extracted(&save_path, &report.lines) {
            Ok(count) => {
                self.reporter
                    .log(&format!("Extracted {} unique lines to {}", count, save_path.display()));
                report.output = Some(save_path);
            }
            Err(e) => {
                warn!("Failed to save {}: {}", save_path.display(), e);
                self.reporter.log(&format!("Failed to save {}: {}", save_path.display(), e));
            }
        }

        self.reporter.finish();
        Ok(report)
    }

    /// Substitute database translations into every dump file under `input_dir`,
    /// writing changed files to the mirrored path under `output_dir`
    pub async fn apply(&self, input_dir: &Path, output_dir: &Path, database: &Path) -> Result<ApplyReport> {
        ensure_dir(input_dir)?;
        let options = self.config.reinsert.clone();

        let database = match TranslationDatabase::load(database) {
            Ok(db) => db,
            Err(e) => {
                self.reporter.log(&format!("Failed to load database: {}", e));
                return Ok(ApplyReport::default());
            }
        };
        if database.is_empty() {
            self.reporter.log("Database has no usable entries");
            return Ok(ApplyReport::default());
        }
        self.reporter.log(&format!("Loaded {} database entries", database.len()));

        let files = collect_files(input_dir, &options.extensions, options.recursive);
        let reinserter = Arc::new(Reinserter::new(database, options)?);
        self.reporter
            .log(&format!("Applying translations to {} files", files.len()));

        let input_root = input_dir.to_path_buf();
        let output_root = output_dir.to_path_buf();
        let mut report = ApplyReport::default();
        let reporter = self.reporter.clone();

        self.run_pool(
            files,
            move |path| {
                let output = mirror_path(&input_root, &output_root, path);
                reinserter.reinsert_file(path, &output)
            },
            |path, result| {
                report.files_scanned += 1;
                match result {
                    Ok(outcome) => {
                        if outcome.saved {
                            report.files_saved += 1;
                            report.replacements += outcome.replacements;
                            reporter.log(&format!(
                                "[{}] {}: {} replacements",
                                format_label(&path),
                                display_name(&path),
                                outcome.replacements
                            ));
                        }
                        report.outcomes.push(outcome);
                    }
                    Err(e) => {
                        report.files_failed += 1;
                        reporter.log(&format!("Failed to process {}: {}", path.display(), e));
                        report.outcomes.push(FileOutcome::failed(&path, e));
                    }
                }
            },
        )
        .await;

        self.reporter.log(&format!(
            "Done: {} files scanned, {} saved, {} replacements",
            report.files_scanned, report.files_saved, report.replacements
        ));
        self.reporter.finish();
        Ok(report)
    }

    /// Write `<db>_MASKED.txt` with every glossary term replaced by its token
    pub fn mask_database(&self, database: &Path, glossary: &Path) -> Result<Option<DatabaseMaskSummary>> {
        self.process_database(database, glossary, DatabaseMaskMode::Apply)
    }

    /// Write `<db>_RESTORED.txt` with tokens turned back into glossary terms
    pub fn restore_database(&self, database: &Path, glossary: &Path) -> Result<Option<DatabaseMaskSummary>> {
        self.process_database(database, glossary, DatabaseMaskMode::Restore)
    }

    fn process_database(
        &self,
        database: &Path,
        glossary: &Path,
        mode: DatabaseMaskMode,
    ) -> Result<Option<DatabaseMaskSummary>> {
        if !database.is_file() {
            self.reporter
                .log(&format!("Database file not found: {}", database.display()));
            return Ok(None);
        }

        let glossary = Glossary::load(glossary);
        if glossary.is_empty() {
            self.reporter.log("Glossary is missing or empty, nothing to do");
            return Ok(None);
        }
        let engine = MaskingEngine::new(glossary)?;

        let result = match mode {
            DatabaseMaskMode::Apply => mask_database_file(&engine, database),
            DatabaseMaskMode::Restore => restore_database_file(&engine, database),
        };

        match result {
            Ok(summary) => {
                self.reporter.log(&format!(
                    "Processed {} lines into {}",
                    summary.lines,
                    summary.output.display()
                ));
                Ok(Some(summary))
            }
            Err(e) => {
                self.reporter
                    .log(&format!("Failed to process {}: {}", database.display(), e));
                Ok(None)
            }
        }
    }

    /// Translate database files with the configured provider
    pub async fn translate(&self, input: &Path, output: &Path, glossary: Option<&Path>) -> Result<TranslateReport> {
        let translator: Arc<dyn Translator> = Arc::from(TranslatorFactory::create(&self.config.translate)?);
        self.translate_with(translator, input, output, glossary).await
    }

    pub async fn translate_with(
        &self,
        translator: Arc<dyn Translator>,
        input: &Path,
        output: &Path,
        glossary: Option<&Path>,
    ) -> Result<TranslateReport> {
        let masking = if self.config.translate.auto_mask {
            self.load_masking(glossary)?
        } else {
            None
        };

        info!("Translating with {} ({})", translator.name(), self.config.translate.model);
        let processor = TranslationProcessor::new(
            translator,
            masking,
            self.config.translate.clone(),
            self.reporter.clone(),
        );
        let report = processor.run(input, output).await;
        self.reporter.finish();
        report
    }

    fn load_masking(&self, glossary: Option<&Path>) -> Result<Option<Arc<MaskingEngine>>> {
        let glossary = Glossary::load_optional(glossary);
        if glossary.is_empty() {
            return Ok(None);
        }
        self.reporter
            .log(&format!("Glossary masking enabled ({} terms)", glossary.len()));
        Ok(Some(Arc::new(MaskingEngine::new(glossary)?)))
    }

    /// Run `job` for every file on the blocking pool, at most `workers` at a time.
    /// `on_done` sees results in completion order and is the only serialized step.
    async fn run_pool<T, F, D>(&self, files: Vec<PathBuf>, job: F, mut on_done: D)
    where
        T: Send + 'static,
        F: Fn(&Path) -> Result<T> + Send + Sync + 'static,
        D: FnMut(PathBuf, std::result::Result<T, String>),
    {
        let total = files.len();
        if total == 0 {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let job = Arc::new(job);
        let mut set = JoinSet::new();
        let paths = files.clone();

        for path in files {
            let semaphore = semaphore.clone();
            let job = job.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let label = path.clone();
                let joined = tokio::task::spawn_blocking(move || job(&path)).await;
                let result = match joined {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("worker failed: {}", e)),
                };
                (label, result)
            });
        }

        let mut pending: IndexSet<PathBuf> = IndexSet::with_capacity(total);
        let mut lost: Vec<String> = Vec::new();
        let mut done = 0usize;
        let mut complete = |path: PathBuf, result: std::result::Result<T, String>| {
            done += 1;
            if let Err(e) = &result {
                warn!("{}: {}", path.display(), e);
            }
            self.reporter
                .progress(done as f32 / total as f32, &display_name(&path));
            if done % LOG_EVERY == 0 || done == total {
                info!("({}/{}) files done", done, total);
            }
            on_done(path, result);
        };

        pending.extend(paths);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((path, result)) => {
                    pending.shift_remove(&path);
                    complete(path, result);
                }
                Err(e) => lost.push(e.to_string()),
            }
        }

        // A task that died outside its job cannot name its file; those files are still pending
        for path in pending {
            let reason = lost.pop().unwrap_or_else(|| "task did not report".to_string());
            complete(path, Err(format!("worker failed: {}", reason)));
        }
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(KasaneError::FileNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(KasaneError::Config(format!(
            "Input path is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn format_label(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => "JSON",
        _ => "TXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::RecordingReporter;
    use crate::translate::{MockTranslator, RetryPolicy};
    use std::collections::HashSet;
    use std::fs;

    fn workflow() -> Workflow {
        Workflow::new(Config::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(Workflow::new(config).is_err());
    }

    #[tokio::test]
    async fn test_extract_merges_unique_lines() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a.txt"), "ねこ\nいぬ\n").unwrap();
        fs::write(input.path().join("b.txt"), "いぬ\nとり\n").unwrap();
        fs::write(input.path().join("skip.png"), "さかな\n").unwrap();

        let report = workflow().extract(input.path(), out.path(), None).await.unwrap();

        assert_eq!(report.files_scanned, 2);
        let lines: HashSet<&str> = report.lines.iter().map(String::as_str).collect();
        assert_eq!(lines, HashSet::from(["ねこ", "いぬ", "とり"]));

        let output = report.output.unwrap();
        assert_eq!(output, out.path().join("_EXTRACTED_DB.txt"));
        let written = fs::read_to_string(output).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert!(written.lines().all(|l| l.ends_with('=')));
    }

    #[tokio::test]
    async fn test_extract_with_nothing_found_writes_nothing() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a.txt"), "123\n").unwrap();

        let report = workflow().extract(input.path(), out.path(), None).await.unwrap();
        assert!(report.lines.is_empty());
        assert!(report.output.is_none());
        assert!(!out.path().join("_EXTRACTED_DB.txt").exists());
    }

    #[tokio::test]
    async fn test_extract_missing_input_is_error() {
        let out = tempfile::tempdir().unwrap();
        let result = workflow()
            .extract(&out.path().join("missing"), out.path(), None)
            .await;
        assert!(matches!(result, Err(KasaneError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_counts_unchanged_files_as_scanned() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("db.dat");
        fs::write(&db, "ねこ=고양이\n").unwrap();
        fs::write(input.path().join("hit.txt"), "ねこ\n").unwrap();
        fs::write(input.path().join("miss.txt"), "いぬ\n").unwrap();

        let reporter = Arc::new(RecordingReporter::default());
        let report = workflow()
            .with_reporter(reporter.clone())
            .apply(input.path(), out.path(), &db)
            .await
            .unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_saved, 1);
        assert_eq!(report.replacements, 1);
        assert_eq!(fs::read_to_string(out.path().join("hit.txt")).unwrap(), "고양이\n");
        assert!(!out.path().join("miss.txt").exists());
        assert_eq!(reporter.fractions.lock().unwrap().last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn test_apply_continues_past_failed_file() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("db.txt");
        fs::write(&db, "ねこ=고양이\n").unwrap();
        fs::write(input.path().join("good.txt"), "ねこ\n").unwrap();
        fs::write(input.path().join("blocked.txt"), "ねこ\n").unwrap();
        // a directory where the output file should go makes the write fail
        fs::create_dir(out.path().join("blocked.txt")).unwrap();

        let report = workflow().apply(input.path(), out.path(), &db).await.unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_saved, 1);
        assert_eq!(fs::read_to_string(out.path().join("good.txt")).unwrap(), "고양이\n");

        let failed = report
            .outcomes
            .iter()
            .find(|o| o.input == input.path().join("blocked.txt"))
            .unwrap();
        assert!(!failed.saved);
        assert!(failed.error.is_some());
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_file_name() {
        let files = vec![PathBuf::from("ok.txt"), PathBuf::from("boom.txt")];
        let mut results = Vec::new();

        workflow()
            .run_pool(
                files,
                |path| {
                    if path.ends_with("boom.txt") {
                        panic!("bad file");
                    }
                    Ok(path.display().to_string())
                },
                |path, result| results.push((path, result)),
            )
            .await;

        assert_eq!(results.len(), 2);
        let (_, boom) = results
            .iter()
            .find(|(path, _)| path == &PathBuf::from("boom.txt"))
            .unwrap();
        assert!(boom.as_ref().unwrap_err().starts_with("worker failed"));
        let (_, ok) = results
            .iter()
            .find(|(path, _)| path == &PathBuf::from("ok.txt"))
            .unwrap();
        assert_eq!(ok.as_deref(), Ok("ok.txt"));
    }

    #[tokio::test]
    async fn test_apply_with_missing_database_does_nothing() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a.txt"), "ねこ\n").unwrap();

        let report = workflow()
            .apply(input.path(), out.path(), &input.path().join("none.txt"))
            .await
            .unwrap();
        assert_eq!(report.files_scanned, 0);
        assert!(fs::read_dir(out.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_mask_database_needs_glossary() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.txt");
        fs::write(&db, "リン=린\n").unwrap();

        let summary = workflow()
            .mask_database(&db, &dir.path().join("missing.txt"))
            .unwrap();
        assert!(summary.is_none());

        let glossary = dir.path().join("glossary.txt");
        fs::write(&glossary, "リン=린\n").unwrap();
        let summary = workflow().mask_database(&db, &glossary).unwrap().unwrap();
        assert_eq!(summary.lines, 1);
        assert_eq!(summary.output, dir.path().join("db_MASKED.txt"));
    }

    #[tokio::test]
    async fn test_translate_with_mock_provider() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("db.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "ねこ=\n").unwrap();

        let mut translator = MockTranslator::new();
        translator.expect_name().return_const("mock");
        translator
            .expect_retry_policy()
            .return_const(RetryPolicy::immediate(1));
        translator
            .expect_complete()
            .returning(|_, _| Ok(r#"[{"id":1,"trans":"고양이"}]"#.to_string()));

        let mut config = Config::default();
        config.translate.request_delay_secs = 0.0;
        let report = Workflow::new(config)
            .unwrap()
            .translate_with(Arc::new(translator), &input, &output, None)
            .await
            .unwrap();

        assert_eq!(report.translated, 1);
        assert_eq!(fs::read_to_string(&output).unwrap(), "ねこ=고양이");
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label(Path::new("a.JSON")), "JSON");
        assert_eq!(format_label(Path::new("a.txt")), "TXT");
    }
}
