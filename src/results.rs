//! End-of-job handling: final drain, 100% pin, results log and gallery refresh.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::gallery::{Gallery, GalleryEntry};
use crate::monitor::ProgressMonitor;
use crate::reporter::ProgressReporter;

/// Contents of the results log, or the fallback shown in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsLog {
    Loaded(String),
    Missing { fallback: String },
}

impl ResultsLog {
    pub fn text(&self) -> &str {
        match self {
            ResultsLog::Loaded(text) => text,
            ResultsLog::Missing { fallback } => fallback,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ResultsLog::Missing { .. })
    }
}

/// Reads the whole log verbatim. Any read failure yields the fallback.
pub fn load_results_log(path: &Path, fallback: &str) -> ResultsLog {
    match fs::read(path) {
        Ok(bytes) => ResultsLog::Loaded(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            if err.kind() == ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), "results log not found");
            } else {
                tracing::warn!(path = %path.display(), error = %err, "results log unreadable");
            }
            ResultsLog::Missing {
                fallback: fallback.to_string(),
            }
        }
    }
}

/// What finalization produced for the caller to display.
#[derive(Debug, Clone)]
pub struct FinalReport {
    pub completed: usize,
    pub log: ResultsLog,
    pub gallery: Vec<GalleryEntry>,
}

/// Runs the terminal sequence of a job exactly once per exit.
#[derive(Debug, Clone)]
pub struct ResultsFinalizer {
    results_log: PathBuf,
    fallback_message: String,
}

impl ResultsFinalizer {
    pub fn new(results_log: impl Into<PathBuf>, fallback_message: impl Into<String>) -> Self {
        Self {
            results_log: results_log.into(),
            fallback_message: fallback_message.into(),
        }
    }

    /// None of the steps can fail; each degrades on its own.
    pub fn finalize(
        &self,
        monitor: &mut ProgressMonitor,
        reporter: &mut ProgressReporter,
        ticker: Option<JoinHandle<()>>,
        gallery: &mut dyn Gallery,
        output_dir: &Path,
    ) -> FinalReport {
        if let Some(sample) = monitor.drain() {
            reporter.report(sample);
        }
        let observed = monitor.completed();
        reporter.force_complete();

        if let Some(ticker) = ticker {
            ticker.abort();
        }

        let log = load_results_log(&self.results_log, &self.fallback_message);

        gallery.clear();
        let shown = gallery.refresh(output_dir);

        tracing::info!(
            observed,
            unit_count = reporter.unit_count(),
            log_found = !log.is_missing(),
            artifacts = shown,
            "job finalized"
        );

        FinalReport {
            completed: reporter.completed(),
            log,
            gallery: gallery.entries().to_vec(),
        }
    }
}

/// Copies the results log verbatim to `dest`, returning the bytes written.
pub fn write_detailed_report(results_log: &Path, dest: &Path) -> Result<u64> {
    let contents = fs::read(results_log)
        .with_context(|| format!("could not read {}", results_log.display()))?;
    fs::write(dest, &contents).with_context(|| format!("could not write {}", dest.display()))?;
    Ok(contents.len() as u64)
}
