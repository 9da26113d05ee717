mod cli;
mod config;
mod error;
mod gallery;
mod monitor;
mod reporter;
mod results;
mod state_machine;
mod supervisor;
mod ui;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::DistfilterConfig;
use gallery::{ArtifactGallery, list_artifacts};
use state_machine::JobRequest;
use supervisor::JobSupervisor;
use ui::{JsonLinesProgress, Presenter, TerminalProgress};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "distfilter=debug"
    } else {
        "distfilter=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = DistfilterConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            input,
            output,
            kernel,
            strategy,
            exit_policy,
            json,
        } => {
            if let Some(strategy) = strategy {
                config.strategy = strategy.into();
            }
            if let Some(policy) = exit_policy {
                config.exit_policy = policy.into();
            }
            let request = JobRequest {
                kernel_size: kernel.unwrap_or(config.default_kernel_size),
                input_dir: input,
                output_dir: output,
            };
            let ok = if json {
                run_job(config, request, Arc::new(JsonLinesProgress)).await
            } else {
                run_job(config, request, Arc::new(TerminalProgress::new(cli.verbose))).await
            };
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Report => {
            let written = results::write_detailed_report(&config.results_log, &config.detailed_report)?;
            tracing::info!(bytes = written, "detailed report written");
            println!("Detailed report saved as '{}'", config.detailed_report.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Gallery { dir } => {
            for entry in list_artifacts(&dir, &config.artifact_extension, config.gallery_order) {
                println!("{}", entry.path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Submits one job and drives it to a terminal state. Returns whether it
/// finalized; failures are reported through the presenter.
async fn run_job<P>(config: DistfilterConfig, request: JobRequest, presenter: Arc<P>) -> bool
where
    P: Presenter + 'static,
{
    let gallery = ArtifactGallery::new(config.artifact_extension.clone(), config.gallery_order);
    let mut supervisor = JobSupervisor::new(config, presenter.clone(), Box::new(gallery));

    let outcome = match supervisor.submit(request) {
        Ok(handle) => {
            tracing::debug!(job_id = handle.job_id(), "driving job");
            supervisor.run(handle).await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(report) => {
            presenter.completed(&report);
            true
        }
        Err(err) => {
            presenter.failed(&err, supervisor.summary().as_ref());
            false
        }
    }
}
