//! # jobtrace - Scheduler Trace Sessions around Benchmark Jobs
//!
//! jobtrace correlates scheduler behavior (context switches, wakeups,
//! migrations) with user-defined jobs run under a chosen POSIX scheduling
//! policy. It drives the kernel's tracefs to record a per-execution session
//! and keeps a durable log of which job ran under which policy and priority.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Caller (jobtrace binary, demos)                │
//! │      set policy → enable → mark start → work → mark stop        │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    jobtrace (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  identifier  │   │    sched     │   │    record    │         │
//! │  │ (timestamp)  │   │ (setattr)    │──▶│ (exec line)  │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────▼───────┐         │
//! │  │   events     │   │   session    │   │    logger    │         │
//! │  │ (filter/en.) │   │ (on/off/mark)│   │ (exec/trace) │         │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘         │
//! │         └──────────────────┼──────────────────┘                 │
//! │                            ▼                                    │
//! │                  TracingKernelInterface                         │
//! │                (Tracefs | MemoryTracefs)                        │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ control file writes / trace reads
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  tracefs (/sys/kernel/tracing)                  │
//! │  tracing_on, trace_marker, trace, trace_pipe, events/sched/...  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`identifier`]: `YYYYMMDDHHMMSS` execution identifiers from the local clock
//! - [`sched`]: scheduling policy get/set via `sched_getattr`/`sched_setattr`
//!   - priorities are clamped into the kernel-reported range of the policy
//!   - syscall numbers are resolved per architecture at build time
//! - [`tracefs`]: the injected handle on kernel tracing state
//! - [`events`]: per-event filter expressions and enable flags
//! - [`session`]: tracing on/off, buffer reset and job markers
//! - [`record`]: execution records and pluggable line serializers
//! - [`logger`]: `exec.txt` appends and the final `trace.txt` drain
//! - [`preflight`]: root, kernel version and tracefs checks
//! - [`cli`]: command-line arguments and run configuration
//! - [`domain`]: core domain types (`Pid`, `JobNumber`) and errors
//!
//! ## Session Protocol
//!
//! The kernel tracing state is host-wide, so exactly one session is
//! meaningful at a time. Callers sequence the calls themselves:
//!
//! 1. set the scheduling policy, resize the buffer, install filters
//! 2. `enable_tracing()` (clears stale buffered data)
//! 3. per job: `mark_job(n, Start)`, work, `mark_job(n, Stop)`, append record
//! 4. stop recording, `drain_trace()` once, then `disable_tracing()`
//!
//! Every failure is returned as a [`domain::TraceError`]; nothing is retried
//! and the library never exits the process.
//!
//! ## Output Layout
//!
//! ```text
//! <respath>/<identifier>/exec.txt    <id>, <job>, <param>, <policy>, <prio>, <details>
//! <respath>/<identifier>/trace.txt   raw trace text
//! ```

pub mod cli;
pub mod domain;
pub mod events;
pub mod identifier;
pub mod logger;
pub mod preflight;
pub mod record;
pub mod sched;
pub mod session;
pub mod tracefs;
