mod job;
mod state;

pub use job::{Job, JobRequest, JobSpec, JobSummary};
pub use state::{JobState, StateMachine, Transition, Trigger};
