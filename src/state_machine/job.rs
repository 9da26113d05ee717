use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;

/// Bumps an even kernel size to the next odd value. Odd values pass through.
pub fn normalize_kernel_size(kernel_size: u32) -> u32 {
    kernel_size | 1
}

/// What the caller asks for. Folders may still be unset at this point.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub kernel_size: u32,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Validated, immutable description of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    kernel_size: u32,
    input_dir: PathBuf,
    output_dir: PathBuf,
    unit_count: usize,
}

impl JobSpec {
    /// Builds a spec, normalizing the kernel size to odd.
    pub fn new(kernel_size: u32, input_dir: PathBuf, output_dir: PathBuf, unit_count: usize) -> Self {
        Self {
            kernel_size: normalize_kernel_size(kernel_size),
            input_dir,
            output_dir,
            unit_count,
        }
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Positional arguments handed to the kernel executable, in contract order.
    pub fn positional_args(&self) -> [String; 4] {
        [
            self.kernel_size.to_string(),
            self.input_dir.display().to_string(),
            self.output_dir.display().to_string(),
            self.unit_count.to_string(),
        ]
    }
}

/// Lifecycle record for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub state_history: Vec<JobState>,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            state: JobState::Idle,
            state_history: Vec::new(),
            exit_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, JobState::Running | JobState::Finalizing)
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

/// Structured record printed once a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub spec: JobSpec,
    pub state: JobState,
    pub state_transitions: Vec<JobState>,
    pub exit_code: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobSummary {
    pub fn from_job(job: &Job, spec: &JobSpec) -> Self {
        let now = Utc::now();
        let duration = now - job.created_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state);

        Self {
            job_id: job.id.clone(),
            spec: spec.clone(),
            state: job.state,
            state_transitions: transitions,
            exit_code: job.exit_code,
            started_at: job.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_size_is_bumped_to_odd() {
        assert_eq!(normalize_kernel_size(4), 5);
        assert_eq!(normalize_kernel_size(7), 7);
        assert_eq!(normalize_kernel_size(0), 1);
        assert_eq!(normalize_kernel_size(154), 155);
    }

    #[test]
    fn normalized_kernel_is_smallest_odd_not_below_input() {
        for k in 0..200u32 {
            let n = normalize_kernel_size(k);
            assert_eq!(n % 2, 1);
            assert!(n >= k);
            assert!(n - k <= 1);
        }
    }

    #[test]
    fn spec_normalizes_on_construction() {
        let spec = JobSpec::new(8, "in".into(), "out".into(), 3);
        assert_eq!(spec.kernel_size(), 9);
        assert_eq!(spec.unit_count(), 3);
    }

    #[test]
    fn positional_args_follow_contract_order() {
        let spec = JobSpec::new(5, "/data/in".into(), "/data/out".into(), 12);
        assert_eq!(spec.positional_args(), ["5", "/data/in", "/data/out", "12"]);
    }

    #[test]
    fn job_creation_defaults() {
        let job = Job::new();
        assert_eq!(job.state, JobState::Idle);
        assert!(job.state_history.is_empty());
        assert!(job.exit_code.is_none());
        assert!(!job.is_active());
    }

    #[test]
    fn summary_from_job_appends_current_state() {
        let mut job = Job::new();
        job.state_history.push(JobState::Idle);
        job.state = JobState::Running;
        let spec = JobSpec::new(3, "in".into(), "out".into(), 1);

        let summary = JobSummary::from_job(&job, &spec);
        assert_eq!(summary.job_id, job.id);
        assert_eq!(summary.state_transitions, vec![JobState::Idle, JobState::Running]);
        assert_eq!(summary.spec, spec);
    }

    #[test]
    fn summary_serializes_state_names() {
        let job = Job::new();
        let spec = JobSpec::new(3, "in".into(), "out".into(), 1);
        let json = serde_json::to_string(&JobSummary::from_job(&job, &spec)).unwrap();
        assert!(json.contains(r#""state":"idle""#));
    }
}
