//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::domain::{Result, TraceError};
use crate::logger::DrainMode;
use crate::sched::SchedPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "jobtrace",
    version,
    about = "Trace scheduler events around benchmark jobs run under a chosen scheduling policy",
    after_help = "\
EXAMPLES:
    sudo jobtrace                                   50 jobs under SCHED_OTHER
    sudo jobtrace --policy SCHED_FIFO --priority 10 Real-time jobs at priority 10
    sudo jobtrace --jobs 5 --nowait --drain pipe    Quick run, stream the trace out"
)]
pub struct Args {
    /// Directory receiving one <identifier>/ folder per execution
    #[arg(short, long, env = "JOBTRACE_RESPATH", default_value = "results")]
    pub respath: PathBuf,

    /// tracefs mount point (auto-detected if omitted)
    #[arg(long, env = "JOBTRACE_TRACEFS")]
    pub tracefs: Option<PathBuf>,

    /// Scheduling policy: SCHED_OTHER, SCHED_FIFO, SCHED_RR, SCHED_BATCH or SCHED_IDLE
    #[arg(short = 's', long, env = "JOBTRACE_POLICY", default_value = "SCHED_OTHER")]
    pub policy: SchedPolicy,

    /// Static priority, 1-99 for SCHED_FIFO/SCHED_RR (clamped into the policy's range)
    #[arg(
        short = 'i',
        long,
        env = "JOBTRACE_PRIORITY",
        default_value = "0",
        value_parser = clap::value_parser!(u32).range(0..=99)
    )]
    pub priority: u32,

    /// Number of jobs to run
    #[arg(short, long, env = "JOBTRACE_JOBS", default_value = "50")]
    pub jobs: u32,

    /// Workload parameter of the first job (loop iterations)
    #[arg(
        short,
        long,
        env = "JOBTRACE_PARAM",
        default_value = "10000",
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    pub param: i64,

    /// Parameter increment between jobs
    #[arg(long, env = "JOBTRACE_STEP", default_value = "10000")]
    pub step: i64,

    /// Per-CPU trace ring buffer size in KB
    #[arg(
        long,
        env = "JOBTRACE_BUFFER_SIZE_KB",
        default_value = "1408",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub buffer_size_kb: u32,

    /// Where the final trace is read from
    #[arg(long, env = "JOBTRACE_DRAIN", value_enum, default_value_t = DrainSource::Snapshot)]
    pub drain: DrainSource,

    /// Free text stored with every record
    #[arg(long, env = "JOBTRACE_DETAILS", default_value = "EmptyLoop")]
    pub details: String,

    /// Don't wait one second between jobs
    #[arg(short = 'w', long)]
    pub nowait: bool,

    /// Log progress (RUST_LOG overrides)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

/// `--drain` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DrainSource {
    /// Non-blocking read of trace_pipe
    Pipe,
    /// Copy of trace, then reset the buffer
    Snapshot,
}

impl From<DrainSource> for DrainMode {
    fn from(source: DrainSource) -> Self {
        match source {
            DrainSource::Pipe => DrainMode::LivePipe,
            DrainSource::Snapshot => DrainMode::SnapshotBuffer,
        }
    }
}

/// Everything one run needs, validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub results_dir: PathBuf,
    pub tracefs: Option<PathBuf>,
    pub policy: SchedPolicy,
    pub priority: u32,
    pub jobs: u32,
    pub first_param: i64,
    pub step: i64,
    pub buffer_size_kb: u32,
    pub drain: DrainMode,
    pub details: String,
    pub wait_between_jobs: bool,
}

impl TryFrom<&Args> for SessionConfig {
    type Error = TraceError;

    fn try_from(args: &Args) -> Result<Self> {
        if args.policy == SchedPolicy::Deadline {
            return Err(TraceError::InvalidUsage(
                "SCHED_DEADLINE needs runtime/deadline/period parameters and cannot be selected with --policy"
                    .to_string(),
            ));
        }
        if args.details.contains(['\n', '\r']) {
            return Err(TraceError::InvalidUsage("--details must be a single line".to_string()));
        }
        Ok(Self {
            results_dir: args.respath.clone(),
            tracefs: args.tracefs.clone(),
            policy: args.policy,
            priority: args.priority,
            jobs: args.jobs,
            first_param: args.param,
            step: args.step,
            buffer_size_kb: args.buffer_size_kb,
            drain: args.drain.into(),
            details: args.details.clone(),
            wait_between_jobs: !args.nowait,
        })
    }
}
