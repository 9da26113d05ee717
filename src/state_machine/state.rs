use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::job::Job;

/// The five states of a filter job.
///
/// Each job flows through: IDLE → RUNNING → FINALIZING → COMPLETED,
/// or drops to FAILED from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Finalizing,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "IDLE"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Finalizing => write!(f, "FINALIZING"),
            JobState::Completed => write!(f, "COMPLETED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Something that happened to a job and may move it to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The external process started.
    Launched,
    /// The external process reported exit.
    ProcessExited,
    /// Results were loaded and the monitor drained.
    Finalized,
    /// A precondition, launch or checked exit failed.
    Failed,
}

/// The result of evaluating a trigger against the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The job moved to this state.
    Next(JobState),
    /// The trigger is not valid in the current state; the job is unchanged.
    Rejected { state: JobState, trigger: Trigger },
}

/// Drives a [`Job`] through its lifecycle.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the transition for `trigger`.
    ///
    /// - `Idle` accepts `Launched` and `Failed`.
    /// - `Running` accepts `ProcessExited` and `Failed`.
    /// - `Finalizing` accepts `Finalized` and `Failed`.
    /// - `Completed` and `Failed` are terminal and reject everything.
    pub fn next(job: &mut Job, trigger: Trigger) -> Transition {
        let target = match (job.state, trigger) {
            (JobState::Idle, Trigger::Launched) => Some(JobState::Running),
            (JobState::Running, Trigger::ProcessExited) => Some(JobState::Finalizing),
            (JobState::Finalizing, Trigger::Finalized) => Some(JobState::Completed),
            (JobState::Idle | JobState::Running | JobState::Finalizing, Trigger::Failed) => {
                Some(JobState::Failed)
            }
            _ => None,
        };

        match target {
            Some(next_state) => {
                job.state_history.push(job.state);
                job.state = next_state;
                job.updated_at = Utc::now();
                Transition::Next(next_state)
            }
            None => Transition::Rejected {
                state: job.state,
                trigger,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_states() {
        let mut job = Job::new();
        assert_eq!(job.state, JobState::Idle);

        let t = StateMachine::next(&mut job, Trigger::Launched);
        assert_eq!(t, Transition::Next(JobState::Running));

        let t = StateMachine::next(&mut job, Trigger::ProcessExited);
        assert_eq!(t, Transition::Next(JobState::Finalizing));

        let t = StateMachine::next(&mut job, Trigger::Finalized);
        assert_eq!(t, Transition::Next(JobState::Completed));
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn failure_is_reachable_from_every_active_state() {
        for steps in [
            &[][..],
            &[Trigger::Launched][..],
            &[Trigger::Launched, Trigger::ProcessExited][..],
        ] {
            let mut job = Job::new();
            for step in steps {
                StateMachine::next(&mut job, *step);
            }
            let t = StateMachine::next(&mut job, Trigger::Failed);
            assert_eq!(t, Transition::Next(JobState::Failed));
        }
    }

    #[test]
    fn terminal_states_reject_triggers() {
        let mut job = Job::new();
        StateMachine::next(&mut job, Trigger::Failed);

        let t = StateMachine::next(&mut job, Trigger::Launched);
        assert_eq!(
            t,
            Transition::Rejected {
                state: JobState::Failed,
                trigger: Trigger::Launched
            }
        );
        assert_eq!(job.state, JobState::Failed);
    }

    #[test]
    fn out_of_order_trigger_leaves_job_unchanged() {
        let mut job = Job::new();
        StateMachine::next(&mut job, Trigger::Launched);

        let t = StateMachine::next(&mut job, Trigger::Finalized);
        assert!(matches!(t, Transition::Rejected { .. }));
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.state_history, vec![JobState::Idle]);
    }

    #[test]
    fn state_history_is_recorded() {
        let mut job = Job::new();
        StateMachine::next(&mut job, Trigger::Launched);
        StateMachine::next(&mut job, Trigger::ProcessExited);
        StateMachine::next(&mut job, Trigger::Finalized);

        assert_eq!(
            job.state_history,
            vec![JobState::Idle, JobState::Running, JobState::Finalizing]
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(JobState::Idle.to_string(), "IDLE");
        assert_eq!(JobState::Running.to_string(), "RUNNING");
        assert_eq!(JobState::Finalizing.to_string(), "FINALIZING");
        assert_eq!(JobState::Completed.to_string(), "COMPLETED");
        assert_eq!(JobState::Failed.to_string(), "FAILED");
    }
}
