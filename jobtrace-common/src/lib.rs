//! # Shared Kernel ABI Definitions
//!
//! Mirrors of the kernel structures and the tracefs file layout that the
//! controller talks to. All structures use `#[repr(C)]` so they can be handed
//! to raw syscalls as-is.
//!
//! ## Key Items
//!
//! - [`SchedAttr`] - `struct sched_attr` for `sched_setattr(2)` / `sched_getattr(2)`
//! - `SCHED_*` - raw scheduling policy values
//! - `TRACEFS_*`, `TRACING_ON`, `TRACE_MARKER`, ... - tracefs control files

#![no_std]

// ============================================================================
// Scheduling Policies
// ============================================================================

/// Default time-sharing policy (CFS / EEVDF)
pub const SCHED_OTHER: u32 = 0;

/// Real-time first-in first-out policy
pub const SCHED_FIFO: u32 = 1;

/// Real-time round-robin policy
pub const SCHED_RR: u32 = 2;

/// Non-interactive, CPU-bound batch policy
pub const SCHED_BATCH: u32 = 3;

/// Very low priority background policy
pub const SCHED_IDLE: u32 = 5;

/// Earliest-deadline-first policy (runtime / deadline / period)
pub const SCHED_DEADLINE: u32 = 6;

/// Size of the first published `sched_attr` layout
///
/// Newer kernels accept this size and zero-extend; older ones reject anything
/// larger with `E2BIG`.
pub const SCHED_ATTR_SIZE_VER0: u32 = 48;

/// Lowest static priority of `SCHED_FIFO` / `SCHED_RR` on Linux
pub const SCHED_RT_PRIORITY_MIN: u32 = 1;

/// Highest static priority of `SCHED_FIFO` / `SCHED_RR` on Linux
pub const SCHED_RT_PRIORITY_MAX: u32 = 99;

// ============================================================================
// Scheduler Attributes
// ============================================================================

/// Scheduler attributes of a thread
///
/// Layout defined by `include/uapi/linux/sched/types.h`. Read and written
/// atomically by a single syscall, so a value is either fully applied or not
/// at all.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedAttr {
    /// Size of this structure, for ABI versioning
    pub size: u32,

    /// Policy (`SCHED_*`)
    pub sched_policy: u32,

    /// `SCHED_FLAG_*` bits
    pub sched_flags: u64,

    /// Nice value (`SCHED_OTHER`, `SCHED_BATCH`)
    pub sched_nice: i32,

    /// Static priority (`SCHED_FIFO`, `SCHED_RR`)
    pub sched_priority: u32,

    /// Runtime budget in nanoseconds (`SCHED_DEADLINE`)
    pub sched_runtime: u64,

    /// Relative deadline in nanoseconds (`SCHED_DEADLINE`)
    pub sched_deadline: u64,

    /// Period in nanoseconds (`SCHED_DEADLINE`)
    pub sched_period: u64,
}

impl SchedAttr {
    /// Attributes for a plain policy/priority change
    #[must_use]
    pub const fn new(policy: u32, priority: u32) -> Self {
        Self {
            size: SCHED_ATTR_SIZE_VER0,
            sched_policy: policy,
            sched_flags: 0,
            sched_nice: 0,
            sched_priority: priority,
            sched_runtime: 0,
            sched_deadline: 0,
            sched_period: 0,
        }
    }

    /// Attributes for `SCHED_DEADLINE` (all values in nanoseconds)
    #[must_use]
    pub const fn deadline(runtime: u64, deadline: u64, period: u64) -> Self {
        Self {
            sched_runtime: runtime,
            sched_deadline: deadline,
            sched_period: period,
            ..Self::new(SCHED_DEADLINE, 0)
        }
    }
}

impl Default for SchedAttr {
    fn default() -> Self {
        Self::new(SCHED_OTHER, 0)
    }
}

const _: () = assert!(core::mem::size_of::<SchedAttr>() == SCHED_ATTR_SIZE_VER0 as usize);

// ============================================================================
// tracefs Layout
// ============================================================================

/// Conventional tracefs mount point
pub const TRACEFS_ROOT: &str = "/sys/kernel/tracing";

/// Legacy location under debugfs, still the only one on some distributions
pub const TRACEFS_LEGACY_ROOT: &str = "/sys/kernel/debug/tracing";

/// Master on/off switch (`"1"` / `"0"`)
pub const TRACING_ON: &str = "tracing_on";

/// In-band marker file, each write becomes one trace line
pub const TRACE_MARKER: &str = "trace_marker";

/// Consuming, streaming read of the ring buffer
pub const TRACE_PIPE: &str = "trace_pipe";

/// Non-consuming snapshot of the ring buffer; opening with `O_TRUNC` clears it
pub const TRACE: &str = "trace";

/// Per-CPU ring buffer size in KB
pub const BUFFER_SIZE_KB: &str = "buffer_size_kb";

/// Root of the per-event directories
pub const EVENTS_DIR: &str = "events";

/// Per-event (or per-subsystem) filter file name
pub const FILTER_FILE: &str = "filter";

/// Per-event (or per-subsystem) enable file name
pub const ENABLE_FILE: &str = "enable";

/// Value written to a filter file to reset it
pub const FILTER_RESET: &str = "0";

/// Subsystem of the predefined scheduler events
pub const SCHED_SUBSYSTEM: &str = "sched";

/// Context switch event
pub const SCHED_SWITCH_EVENT: &str = "sched_switch";

/// Task wakeup event
pub const SCHED_WAKEUP_EVENT: &str = "sched_wakeup";

/// Task CPU migration event
pub const SCHED_MIGRATE_TASK_EVENT: &str = "sched_migrate_task";

/// Ring buffer size the kernel boots with when nothing else is configured
pub const DEFAULT_BUFFER_SIZE_KB: u32 = 1408;

/// Chunk size used when copying trace data out of tracefs
pub const COPY_BUFFER_SIZE: usize = 4096;
