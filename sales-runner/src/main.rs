//! Daily sales ETL job runner.
//!
//! Runs one built-in job for one partition date: loads configuration, resolves the
//! warehouse credentials from the secret store, then extracts, transforms and reloads the
//! day's rows. Any failure ends the process with exit status 1.

use chrono::{FixedOffset, Offset, Utc};
use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;
use sales_config::shared::TimezoneConfig;
use sales_etl::job::{BUILTIN_JOB_NAMES, JobSpec};
use sales_etl::partition::{PartitionDate, utc_offset};
use sales_etl::pipeline::RunReport;
use sales_telemetry::tracing::init_tracing;
use std::process::ExitCode;
use tracing::{error, info};

use crate::config::load_runner_config;
use crate::core::{run_context, run_job};
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

/// Runs a daily sales ETL job.
#[derive(Debug, Parser)]
#[command(name = "sales-runner", version)]
struct Args {
    /// Name of the job to run.
    #[arg(long, required_unless_present = "list_jobs")]
    job: Option<String>,

    /// Partition date to load, as YYYY-MM-DD. Defaults to today in the configured offset.
    #[arg(long)]
    date: Option<PartitionDate>,

    /// Prints the available jobs and exits.
    #[arg(long, conflicts_with_all = ["job", "date"])]
    list_jobs: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return usage_exit_code(&err);
        }
    };

    if args.list_jobs {
        for name in BUILTIN_JOB_NAMES {
            println!("{name}");
        }

        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(report) => {
            info!("✓ {report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("✗ {err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Maps an argument parsing outcome to the process exit status.
///
/// Help and version output succeed. Every usage error fails with status 1, like any other
/// failed run.
fn usage_exit_code(err: &clap::Error) -> ExitCode {
    match err.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Resolves the offset used for log timestamps before configuration is validated.
fn log_offset(hours: i32) -> FixedOffset {
    utc_offset(hours).unwrap_or_else(|_| Utc.fix())
}

fn run(args: Args) -> RunnerResult<RunReport> {
    let config = load_runner_config();

    let hours = config
        .as_ref()
        .map(|config| config.timezone.utc_offset_hours)
        .unwrap_or_else(|_| TimezoneConfig::default().utc_offset_hours);
    init_tracing(log_offset(hours)).map_err(RunnerError::config)?;

    let config = config?;
    let offset = utc_offset(config.timezone.utc_offset_hours)?;

    let job_name = args.job.unwrap_or_default();
    let job = JobSpec::builtin(&job_name)?;
    let ctx = run_context(args.date, offset);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_job(config, job, ctx))
}
