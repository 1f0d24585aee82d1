use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Steps on the progress bar; fractions are scaled to this
const BAR_RESOLUTION: u64 = 1000;

/// Log-line and progress sink shared by all workers
pub trait Reporter: Send + Sync {
    fn log(&self, message: &str);

    /// `fraction` is clamped to `[0, 1]`
    fn progress(&self, fraction: f32, label: &str);

    fn finish(&self) {}
}

/// Drops progress updates; log lines still go to tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn log(&self, message: &str) {
        info!("{}", message);
    }

    fn progress(&self, _fraction: f32, _label: &str) {}
}

/// Terminal progress bar
pub struct ConsoleReporter {
    bar: ProgressBar,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_RESOLUTION);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn log(&self, message: &str) {
        self.bar.suspend(|| info!("{}", message));
    }

    fn progress(&self, fraction: f32, label: &str) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_RESOLUTION as f32).round() as u64;
        self.bar.set_position(position);
        self.bar.set_message(label.to_string());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    #[test]
    fn test_console_reporter_clamps() {
        let reporter = ConsoleReporter::new();
        reporter.progress(2.0, "done");
        assert_eq!(reporter.bar.position(), BAR_RESOLUTION);
        reporter.progress(-1.0, "start");
        assert_eq!(reporter.bar.position(), 0);
        reporter.finish();
    }

    #[test]
    fn test_recording_reporter_collects() {
        let reporter = RecordingReporter::default();
        reporter.log("hello");
        reporter.progress(0.5, "half");
        assert_eq!(reporter.lines.lock().unwrap().as_slice(), ["hello".to_string()]);
        assert_eq!(reporter.fractions.lock().unwrap().as_slice(), [0.5]);
    }
}
