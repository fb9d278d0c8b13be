//! # jobtrace - Main Entry Point
//!
//! Runs a series of jobs under the requested scheduling policy while tracing
//! the scheduler events of this process:
//!
//! ```text
//! preflight → set policy → filter + enable → N × (mark, work, mark, log) → drain → disable
//! ```
//!
//! Every error surfaces here and ends the run with a non-zero status.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::hint::black_box;
use std::time::Duration;

use jobtrace::cli::{Args, SessionConfig};
use jobtrace::domain::{JobNumber, Pid, TraceError};
use jobtrace::events::{EventDescriptor, EventFilters, SchedEvent};
use jobtrace::identifier::session_identifier;
use jobtrace::logger::{drain_trace, log_execution_info, TRACE_OUTPUT_FILE};
use jobtrace::preflight::run_preflight_checks;
use jobtrace::sched::SchedulerController;
use jobtrace::session::{Boundary, TraceSession};
use jobtrace::tracefs::Tracefs;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TraceError>() {
        Some(TraceError::InvalidUsage(_)) => EXIT_USAGE,
        Some(e) if e.is_permission_denied() => EXIT_NOPERM,
        _ if format!("{err:#}").to_lowercase().contains("permission denied") => EXIT_NOPERM,
        _ => EXIT_ERROR,
    }
}

/// The traced workload: an empty loop of `iterations` rounds
fn empty_loop(iterations: i64) {
    for i in 0..iterations {
        black_box(i);
    }
}

fn run(args: &Args) -> Result<()> {
    let quiet = args.quiet;
    let config = SessionConfig::try_from(args)?;

    let tracefs = run_preflight_checks(config.tracefs.as_deref().map(Tracefs::with_root))?;
    let identifier = session_identifier();
    let pid = Pid::this_process();

    if !quiet {
        println!("jobtrace v{}", env!("CARGO_PKG_VERSION"));
        println!("execution: {identifier}");
        println!("tracefs: {}", tracefs.root().display());
        println!("results: {}", config.results_dir.join(identifier.as_str()).display());
    }

    // ── Scheduling policy ───────────────────────────────────────────────
    let scheduler = SchedulerController::new();
    scheduler
        .set_policy(Pid::CURRENT, config.policy, config.priority)
        .context("Failed to apply the requested scheduling policy")?;
    let mut record = scheduler
        .current_record(
            identifier.clone(),
            JobNumber(1),
            config.first_param,
            Some(config.details.clone()),
        )
        .context("Failed to read back the scheduling policy")?;

    if !quiet {
        println!("policy: {} (priority {})", record.policy_name(), record.scheduling_priority);
    }

    // ── Session setup ───────────────────────────────────────────────────
    let mut session = TraceSession::new(&tracefs);
    let events = EventFilters::new(&tracefs);
    let switch = EventDescriptor::from(SchedEvent::Switch);

    session.set_buffer_size_kb(config.buffer_size_kb)?;
    events.set_pid_filter(SchedEvent::Switch, pid)?;
    session.enable_tracing()?;
    events.set_recording(&switch, true)?;

    // ── Jobs ────────────────────────────────────────────────────────────
    for job in 1..=config.jobs {
        record.job_number = JobNumber(job);

        session.mark_job(record.job_number, Boundary::Start)?;
        empty_loop(record.parameter);
        session.mark_job(record.job_number, Boundary::Stop)?;

        log_execution_info(&config.results_dir, identifier, &record)?;
        info!("Job {job}/{} done (parameter {})", config.jobs, record.parameter);

        if config.wait_between_jobs && job < config.jobs {
            std::thread::sleep(Duration::from_secs(1));
        }
        record.parameter = record.parameter.saturating_add(config.step);
    }

    // ── Teardown: drain before disabling ────────────────────────────────
    events.set_recording(&switch, false)?;
    events.clear_filter(&switch)?;
    let bytes = drain_trace(&tracefs, &config.results_dir, identifier, config.drain)?;
    session.disable_tracing()?;

    if !quiet {
        let trace_path = config.results_dir.join(identifier.as_str()).join(TRACE_OUTPUT_FILE);
        println!("jobs: {}", config.jobs);
        println!("saved: {} ({bytes} bytes)", trace_path.display());
    }

    Ok(())
}
