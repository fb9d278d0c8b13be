//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep process ids and job numbers from being mixed
//! up with the other integers that flow into tracefs strings.

use std::fmt;

/// Process (or thread) ID
///
/// `Pid(0)` means "the calling thread" for the scheduler syscalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub i32);

impl Pid {
    /// The calling thread
    pub const CURRENT: Pid = Pid(0);

    /// PID of this process
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // pid_max is at most 2^22
    pub fn this_process() -> Self {
        Pid(std::process::id() as i32)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Pid(pid)
    }
}

impl From<Pid> for i32 {
    fn from(pid: Pid) -> Self {
        pid.0
    }
}

/// Job number within one execution (caller-assigned, starts at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobNumber(pub u32);

impl fmt::Display for JobNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for JobNumber {
    fn from(n: u32) -> Self {
        JobNumber(n)
    }
}
