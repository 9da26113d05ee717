//! Launches the external filter job and drives it to a terminal state.
//!
//! [`JobSupervisor::submit`] validates the request, starts the process and
//! returns at once. Everything that happens afterwards (output chunks, poll
//! ticks, process exit) arrives as a [`JobEvent`] on the job's channel and is
//! applied in arrival order by [`JobSupervisor::handle_event`]. The exit event
//! is always the last one a job produces: the exit watcher joins both output
//! readers before sending it.

use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{DistfilterConfig, ExitPolicy, MonitorStrategy};
use crate::error::{FolderRole, JobError};
use crate::gallery::Gallery;
use crate::monitor::{
    FolderPollMonitor, OutputStream, ProgressMonitor, StreamMarkerMonitor, count_with_extension,
    has_extension,
};
use crate::reporter::{ProgressReporter, ProgressSink};
use crate::results::{FinalReport, ResultsFinalizer};
use crate::state_machine::{
    Job, JobRequest, JobSpec, JobState, JobSummary, StateMachine, Transition, Trigger,
};

const READ_CHUNK: usize = 4096;

// How long the exit watcher waits for both output readers to hit EOF once the
// child is gone. Orphaned grandchildren can keep the pipes open.
const OUTPUT_GRACE: Duration = Duration::from_secs(5);

/// One message on a job's event channel.
#[derive(Debug)]
pub enum JobEvent {
    Output { stream: OutputStream, bytes: Vec<u8> },
    Tick,
    Exited { code: Option<i32> },
}

/// Receiving end of a launched job's events.
pub struct JobHandle {
    job_id: String,
    events: UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }
}

/// Result of a job that went through finalization.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub summary: JobSummary,
    pub results: FinalReport,
}

impl JobReport {
    pub fn exit_code(&self) -> Option<i32> {
        self.summary.exit_code
    }

    /// Exit code 0. A finalized job may still have exited non-zero under
    /// [`ExitPolicy::AlwaysFinalize`].
    pub fn exited_cleanly(&self) -> bool {
        self.summary.exit_code == Some(0)
    }
}

// Runtime pieces that only exist once the process started.
struct ActiveRun {
    spec: JobSpec,
    monitor: ProgressMonitor,
    reporter: ProgressReporter,
    ticker: Option<JoinHandle<()>>,
}

// Everything the supervisor knows about the current (or last) job.
// Replaced wholesale on every submission.
struct JobContext {
    job: Job,
    run: Option<ActiveRun>,
}

/// Owns the external process for one job at a time.
pub struct JobSupervisor {
    config: DistfilterConfig,
    finalizer: ResultsFinalizer,
    sink: Arc<dyn ProgressSink>,
    gallery: Box<dyn Gallery>,
    context: Option<JobContext>,
}

impl JobSupervisor {
    pub fn new(config: DistfilterConfig, sink: Arc<dyn ProgressSink>, gallery: Box<dyn Gallery>) -> Self {
        let finalizer = ResultsFinalizer::new(&config.results_log, &config.fallback_message);
        Self {
            config,
            finalizer,
            sink,
            gallery,
            context: None,
        }
    }

    /// State of the current job, `Idle` before the first submission.
    pub fn state(&self) -> JobState {
        self.context
            .as_ref()
            .map_or(JobState::Idle, |ctx| ctx.job.state)
    }

    /// Summary of the current job, if it got far enough to have a spec.
    pub fn summary(&self) -> Option<JobSummary> {
        let ctx = self.context.as_ref()?;
        let run = ctx.run.as_ref()?;
        Some(JobSummary::from_job(&ctx.job, &run.spec))
    }

    /// Validates `request` and starts the external process without waiting on it.
    ///
    /// Must be called from within a tokio runtime. A rejected submission while
    /// a job is active leaves that job untouched; any other failure marks the
    /// new job `Failed` without starting a process.
    pub fn submit(&mut self, request: JobRequest) -> Result<JobHandle, JobError> {
        if self.context.as_ref().is_some_and(|ctx| ctx.job.is_active()) {
            tracing::warn!("submission rejected: a job is already running");
            return Err(JobError::JobAlreadyRunning);
        }

        let mut job = Job::new();
        match self.launch(&job, request) {
            Ok((run, handle)) => {
                advance(&mut job, Trigger::Launched);
                self.context = Some(JobContext {
                    job,
                    run: Some(run),
                });
                Ok(handle)
            }
            Err(err) => {
                advance(&mut job, Trigger::Failed);
                tracing::error!(job_id = %job.id, error = %err, "job failed before start");
                self.context = Some(JobContext { job, run: None });
                Err(err)
            }
        }
    }

    /// Drives a launched job until it completes or fails.
    pub async fn run(&mut self, mut handle: JobHandle) -> Result<JobReport, JobError> {
        while let Some(event) = handle.next_event().await {
            if let Some(outcome) = self.handle_event(event) {
                return outcome;
            }
        }
        // Every sender is gone without an exit notification.
        if let Some(ctx) = self.context.as_mut() {
            if let Some(ticker) = ctx.run.as_mut().and_then(|run| run.ticker.take()) {
                ticker.abort();
            }
            tracing::error!(job_id = %ctx.job.id, "job events ended without an exit status");
            advance(&mut ctx.job, Trigger::Failed);
        }
        Err(JobError::ProcessExit { code: None })
    }

    /// Applies one event. Returns the outcome once the job is terminal.
    pub fn handle_event(&mut self, event: JobEvent) -> Option<Result<JobReport, JobError>> {
        let Some(ctx) = self.context.as_mut() else {
            tracing::debug!(?event, "event without a job");
            return None;
        };
        if ctx.job.state != JobState::Running {
            tracing::debug!(state = %ctx.job.state, "event ignored outside RUNNING");
            return None;
        }
        let run = ctx.run.as_mut()?;

        match event {
            JobEvent::Output { stream, bytes } => {
                if let Some(sample) = run.monitor.on_bytes(stream, &bytes) {
                    run.reporter.report(sample);
                }
                None
            }
            JobEvent::Tick => {
                if let Some(sample) = run.monitor.tick() {
                    run.reporter.report(sample);
                }
                None
            }
            JobEvent::Exited { code } => Some(finish(
                ctx,
                &self.finalizer,
                self.gallery.as_mut(),
                self.config.exit_policy,
                code,
            )),
        }
    }

    fn launch(&self, job: &Job, request: JobRequest) -> Result<(ActiveRun, JobHandle), JobError> {
        let input_dir = request
            .input_dir
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(JobError::MissingFolder(FolderRole::Input))?;
        let output_dir = request
            .output_dir
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(JobError::MissingFolder(FolderRole::Output))?;

        let unit_count = count_with_extension(&input_dir, &self.config.input_extension);
        if unit_count == 0 {
            return Err(JobError::EmptyInput {
                dir: input_dir,
                extension: self.config.input_extension.clone(),
            });
        }
        let spec = JobSpec::new(request.kernel_size, input_dir, output_dir, unit_count);

        if self.config.purge_stale_artifacts {
            if same_folder(spec.input_dir(), spec.output_dir()) {
                tracing::warn!(
                    job_id = %job.id,
                    dir = %spec.output_dir().display(),
                    "output folder is the input folder; stale artifacts kept"
                );
            } else {
                purge_artifacts(spec.output_dir(), &self.config.artifact_extension);
            }
        }

        let line = command_line(&self.config, &spec);
        let program = line[0].clone();
        fs::create_dir_all(spec.output_dir()).map_err(|source| JobError::Launch {
            program: program.clone(),
            source,
        })?;

        let mut child = Command::new(&program)
            .args(&line[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| JobError::Launch {
                program: program.clone(),
                source,
            })?;

        tracing::info!(
            job_id = %job.id,
            unit_count = spec.unit_count(),
            kernel_size = spec.kernel_size(),
            input_dir = %spec.input_dir().display(),
            command = %line.join(" "),
            "job launched"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| tokio::spawn(forward_output(out, OutputStream::Stdout, tx.clone()))),
            child
                .stderr
                .take()
                .map(|err| tokio::spawn(forward_output(err, OutputStream::Stderr, tx.clone()))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let exit_tx = tx.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    tracing::warn!(%job_id, error = %err, "waiting on job process failed");
                    None
                }
            };
            let drained = tokio::time::timeout(OUTPUT_GRACE, async {
                for reader in readers {
                    let _ = reader.await;
                }
            })
            .await;
            if drained.is_err() {
                tracing::warn!(%job_id, "output still open after exit; stopped reading");
            }
            tracing::info!(%job_id, ?code, "job process exited");
            let _ = exit_tx.send(JobEvent::Exited { code });
        });

        let monitor = match self.config.strategy {
            MonitorStrategy::StreamMarker => ProgressMonitor::StreamMarker(StreamMarkerMonitor::new()),
            MonitorStrategy::FolderPoll => ProgressMonitor::FolderPoll(FolderPollMonitor::new(
                spec.output_dir(),
                self.config.artifact_extension.as_str(),
                self.config.artifacts_per_unit,
                unit_count,
            )),
        };
        let ticker = monitor
            .needs_ticks()
            .then(|| tokio::spawn(tick_every(self.config.poll_interval(), tx)));
        let reporter = ProgressReporter::new(self.sink.clone(), unit_count);

        let handle = JobHandle {
            job_id: job.id.clone(),
            events: rx,
        };
        let run = ActiveRun {
            spec,
            monitor,
            reporter,
            ticker,
        };
        Ok((run, handle))
    }
}

fn advance(job: &mut Job, trigger: Trigger) {
    if let Transition::Rejected { state, trigger } = StateMachine::next(job, trigger) {
        tracing::debug!(job_id = %job.id, %state, ?trigger, "transition rejected");
    }
}

fn finish(
    ctx: &mut JobContext,
    finalizer: &ResultsFinalizer,
    gallery: &mut dyn Gallery,
    policy: ExitPolicy,
    code: Option<i32>,
) -> Result<JobReport, JobError> {
    ctx.job.exit_code = code;
    advance(&mut ctx.job, Trigger::ProcessExited);
    let Some(run) = ctx.run.as_mut() else {
        advance(&mut ctx.job, Trigger::Failed);
        return Err(JobError::ProcessExit { code });
    };

    let clean = code == Some(0);
    if !clean && policy == ExitPolicy::FailOnNonZero {
        if let Some(ticker) = run.ticker.take() {
            ticker.abort();
        }
        advance(&mut ctx.job, Trigger::Failed);
        tracing::error!(job_id = %ctx.job.id, ?code, "job exited with failure; results skipped");
        return Err(JobError::ProcessExit { code });
    }
    if !clean {
        tracing::warn!(job_id = %ctx.job.id, ?code, "job exited with failure; finalizing anyway");
    }

    let results = finalizer.finalize(
        &mut run.monitor,
        &mut run.reporter,
        run.ticker.take(),
        gallery,
        run.spec.output_dir(),
    );
    advance(&mut ctx.job, Trigger::Finalized);

    Ok(JobReport {
        summary: JobSummary::from_job(&ctx.job, &run.spec),
        results,
    })
}

/// Full argv for the launcher, in contract order:
/// launcher, fixed flags, optional `--hostfile`, executable, positional args.
pub fn command_line(config: &DistfilterConfig, spec: &JobSpec) -> Vec<String> {
    let mut line = vec![config.launcher.clone()];
    line.extend(config.launch_flags.iter().cloned());
    if let Some(hostfile) = config.hostfile.as_deref().filter(|h| !h.is_empty()) {
        line.push("--hostfile".to_string());
        line.push(hostfile.to_string());
    }
    line.push(config.executable.clone());
    line.extend(spec.positional_args());
    line
}

// Both paths resolve to the same directory. A missing output folder cannot
// be the (existing) input folder.
fn same_folder(input_dir: &Path, output_dir: &Path) -> bool {
    match (fs::canonicalize(input_dir), fs::canonicalize(output_dir)) {
        (Ok(input), Ok(output)) => input == output,
        _ => false,
    }
}

/// Removes leftover artifacts from an earlier run. Best-effort: failures are
/// logged and skipped. Returns how many files were removed.
pub fn purge_artifacts(dir: &Path, extension: &str) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for path in entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.path())
        .filter(|p| has_extension(p, extension))
    {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not remove stale artifact");
            }
        }
    }
    if removed > 0 {
        tracing::debug!(dir = %dir.display(), removed, "purged stale artifacts");
    }
    removed
}

async fn forward_output<R>(mut reader: R, stream: OutputStream, tx: UnboundedSender<JobEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let event = JobEvent::Output {
                    stream,
                    bytes: buf[..n].to_vec(),
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(err) => {
                tracing::debug!(?stream, error = %err, "reading job output failed");
                break;
            }
        }
    }
}

async fn tick_every(period: Duration, tx: UnboundedSender<JobEvent>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if tx.send(JobEvent::Tick).is_err() {
            break;
        }
    }
}
