use std::fs;
use std::path::{Path, PathBuf};

/// Derives progress from how many artifacts the kernel has written so far.
///
/// The kernel writes a fixed number of artifacts per input unit, so the
/// completed count is `artifacts / artifacts_per_unit`, capped at the job's
/// unit count. Directory listings race with the writer; a sample lower than
/// the last one is never reported.
#[derive(Debug)]
pub struct FolderPollMonitor {
    output_dir: PathBuf,
    extension: String,
    artifacts_per_unit: usize,
    unit_count: usize,
    completed: usize,
}

impl FolderPollMonitor {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        artifacts_per_unit: usize,
        unit_count: usize,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            artifacts_per_unit: artifacts_per_unit.max(1),
            unit_count,
            completed: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Samples the output directory once. Returns the new count only when it grew.
    pub fn tick(&mut self) -> Option<usize> {
        if !self.output_dir.is_dir() {
            return None;
        }
        let artifacts = count_with_extension(&self.output_dir, &self.extension);
        let units = (artifacts / self.artifacts_per_unit).min(self.unit_count);
        if units > self.completed {
            self.completed = units;
            Some(units)
        } else {
            None
        }
    }
}

/// Counts regular files in `dir` whose extension matches, ignoring case.
/// Unreadable directories and entries count as zero.
pub fn count_with_extension(dir: &Path, extension: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| has_extension(&entry.path(), extension))
        .count()
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
