use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which folder a job is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderRole {
    Input,
    Output,
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderRole::Input => write!(f, "input"),
            FolderRole::Output => write!(f, "output"),
        }
    }
}

/// Failures surfaced at the job orchestration boundary.
///
/// A missing results log is not one of them: finalization substitutes a
/// fallback text and still completes.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Select both folders: the {0} folder is not set")]
    MissingFolder(FolderRole),

    #[error("No .{extension} images found in {}", .dir.display())]
    EmptyInput { dir: PathBuf, extension: String },

    #[error("A job is already running")]
    JobAlreadyRunning,

    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("External job exited with {}", describe_exit(.code))]
    ProcessExit { code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_folder_display() {
        let err = JobError::MissingFolder(FolderRole::Output);
        assert_eq!(err.to_string(), "Select both folders: the output folder is not set");
    }

    #[test]
    fn empty_input_display() {
        let err = JobError::EmptyInput {
            dir: PathBuf::from("/data/in"),
            extension: "bmp".into(),
        };
        assert_eq!(err.to_string(), "No .bmp images found in /data/in");
    }

    #[test]
    fn launch_error_keeps_cause() {
        let err = JobError::Launch {
            program: "mpirun".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "Failed to launch `mpirun`: not found");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn process_exit_display() {
        assert_eq!(
            JobError::ProcessExit { code: Some(3) }.to_string(),
            "External job exited with status 3"
        );
        assert_eq!(
            JobError::ProcessExit { code: None }.to_string(),
            "External job exited with no status (terminated by signal)"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JobError>();
    }
}
