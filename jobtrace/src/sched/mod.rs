//! Scheduler attribute control
//!
//! Reads and changes the scheduling policy and priority of a thread through
//! the extended scheduler-attribute interface. A change takes effect
//! immediately and affects how the kernel schedules the target from then on,
//! which is what the traced jobs are meant to observe.
//!
//! Priorities are clamped into the kernel-reported range of the policy rather
//! than rejected: `SCHED_FIFO` with priority 0 runs at 1, `SCHED_OTHER` with
//! priority 5 runs at 0.

pub mod syscalls;

use std::fmt;
use std::str::FromStr;

use jobtrace_common::{
    SchedAttr, SCHED_BATCH, SCHED_DEADLINE, SCHED_FIFO, SCHED_IDLE, SCHED_OTHER, SCHED_RR,
};
use log::{info, warn};

use crate::domain::{JobNumber, Pid, Result, TraceError};
use crate::identifier::ExecutionId;
use crate::record::ExecutionRecord;

pub use syscalls::{LinuxSyscalls, SchedulerSyscalls};

/// Name reported for a policy value outside the known set
pub const UNDEFINED_POLICY: &str = "UNDEFINED";

/// Scheduling policies known to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedPolicy {
    Other,
    Fifo,
    RoundRobin,
    Batch,
    Idle,
    Deadline,
}

impl SchedPolicy {
    pub const ALL: [SchedPolicy; 6] = [
        SchedPolicy::Other,
        SchedPolicy::Fifo,
        SchedPolicy::RoundRobin,
        SchedPolicy::Batch,
        SchedPolicy::Idle,
        SchedPolicy::Deadline,
    ];

    /// Raw `SCHED_*` value
    #[must_use]
    pub fn as_raw(self) -> u32 {
        match self {
            SchedPolicy::Other => SCHED_OTHER,
            SchedPolicy::Fifo => SCHED_FIFO,
            SchedPolicy::RoundRobin => SCHED_RR,
            SchedPolicy::Batch => SCHED_BATCH,
            SchedPolicy::Idle => SCHED_IDLE,
            SchedPolicy::Deadline => SCHED_DEADLINE,
        }
    }

    /// Policy for a raw value, `None` for values this build does not know
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_raw() == raw)
    }

    /// Kernel constant name, e.g. `SCHED_FIFO`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SchedPolicy::Other => "SCHED_OTHER",
            SchedPolicy::Fifo => "SCHED_FIFO",
            SchedPolicy::RoundRobin => "SCHED_RR",
            SchedPolicy::Batch => "SCHED_BATCH",
            SchedPolicy::Idle => "SCHED_IDLE",
            SchedPolicy::Deadline => "SCHED_DEADLINE",
        }
    }

    /// Real-time policies are the only ones with a non-zero static priority
    #[must_use]
    pub fn is_realtime(self) -> bool {
        matches!(self, SchedPolicy::Fifo | SchedPolicy::RoundRobin)
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SCHED_").unwrap_or(&upper);
        match bare {
            "OTHER" | "NORMAL" => Ok(SchedPolicy::Other),
            "FIFO" => Ok(SchedPolicy::Fifo),
            "RR" | "ROUND_ROBIN" => Ok(SchedPolicy::RoundRobin),
            "BATCH" => Ok(SchedPolicy::Batch),
            "IDLE" => Ok(SchedPolicy::Idle),
            "DEADLINE" => Ok(SchedPolicy::Deadline),
            _ => Err(format!("unknown scheduling policy '{s}'")),
        }
    }
}

/// Human-readable name of a raw policy value, `UNDEFINED` when unknown
#[must_use]
pub fn policy_name(raw: u32) -> &'static str {
    SchedPolicy::from_raw(raw).map_or(UNDEFINED_POLICY, SchedPolicy::name)
}

/// Reads and applies scheduler attributes
#[derive(Debug, Default)]
pub struct SchedulerController<S = LinuxSyscalls> {
    syscalls: S,
}

impl SchedulerController<LinuxSyscalls> {
    /// Controller for the running kernel
    #[must_use]
    pub fn new() -> Self {
        Self { syscalls: LinuxSyscalls }
    }
}

impl<S: SchedulerSyscalls> SchedulerController<S> {
    /// Controller on top of a custom syscall implementation
    pub fn with_syscalls(syscalls: S) -> Self {
        Self { syscalls }
    }

    /// Current attributes of `pid` (`Pid::CURRENT` for the calling thread)
    ///
    /// # Errors
    /// Returns [`TraceError::SchedulerQuery`] if the kernel rejects the query.
    pub fn get_attributes(&self, pid: Pid) -> Result<SchedAttr> {
        let attr = self
            .syscalls
            .get_attr(pid)
            .map_err(|source| TraceError::SchedulerQuery { pid, source })?;
        if SchedPolicy::from_raw(attr.sched_policy).is_none() {
            warn!("{pid} runs under unknown policy value {}", attr.sched_policy);
        }
        Ok(attr)
    }

    /// Clamp `priority` into the kernel's range for `policy`
    ///
    /// # Errors
    /// Returns [`TraceError::SchedulerSet`] if the range cannot be queried.
    pub fn clamp_priority(&self, pid: Pid, policy: SchedPolicy, priority: u32) -> Result<u32> {
        let (min, max) =
            self.syscalls.priority_range(policy.as_raw()).map_err(|source| {
                TraceError::SchedulerSet { pid, policy: policy.name().to_string(), priority, source }
            })?;
        let clamped = priority.clamp(min, max);
        if clamped != priority {
            info!("Clamped {policy} priority {priority} into [{min}, {max}] -> {clamped}");
        }
        Ok(clamped)
    }

    /// Switch `pid` to `policy` at `priority` (clamped), in one syscall
    ///
    /// Returns the attributes that were applied. `SCHED_DEADLINE` needs its
    /// runtime parameters; use [`Self::set_deadline`] for it.
    ///
    /// # Errors
    /// Returns [`TraceError::SchedulerSet`] if the kernel rejects the change.
    pub fn set_policy(&self, pid: Pid, policy: SchedPolicy, priority: u32) -> Result<SchedAttr> {
        let priority = self.clamp_priority(pid, policy, priority)?;
        let attr = SchedAttr::new(policy.as_raw(), priority);
        self.apply(pid, &attr)?;
        info!("{pid} now runs under {policy} with priority {priority}");
        Ok(attr)
    }

    /// Switch `pid` to `SCHED_DEADLINE` (all values in nanoseconds)
    ///
    /// # Errors
    /// Returns [`TraceError::SchedulerSet`] if the kernel rejects the
    /// parameters (`runtime <= deadline <= period` is required) or the caller
    /// lacks privilege.
    pub fn set_deadline(
        &self,
        pid: Pid,
        runtime: u64,
        deadline: u64,
        period: u64,
    ) -> Result<SchedAttr> {
        let attr = SchedAttr::deadline(runtime, deadline, period);
        self.apply(pid, &attr)?;
        info!("{pid} now runs under SCHED_DEADLINE ({runtime}/{deadline}/{period} ns)");
        Ok(attr)
    }

    /// Build a record for the calling thread from its live attributes
    ///
    /// # Errors
    /// Returns [`TraceError::SchedulerQuery`] if the attributes cannot be read.
    pub fn current_record(
        &self,
        identifier: ExecutionId,
        job_number: JobNumber,
        parameter: i64,
        details: Option<String>,
    ) -> Result<ExecutionRecord> {
        let attr = self.get_attributes(Pid::CURRENT)?;
        Ok(ExecutionRecord::from_attributes(identifier, job_number, parameter, &attr, details))
    }

    fn apply(&self, pid: Pid, attr: &SchedAttr) -> Result<()> {
        self.syscalls.set_attr(pid, attr).map_err(|source| TraceError::SchedulerSet {
            pid,
            policy: policy_name(attr.sched_policy).to_string(),
            priority: attr.sched_priority,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;

    /// In-memory scheduler with the priority ranges Linux reports
    #[derive(Default)]
    struct FakeSyscalls {
        attrs: RefCell<HashMap<i32, SchedAttr>>,
        deny_set: bool,
    }

    impl SchedulerSyscalls for FakeSyscalls {
        fn get_attr(&self, pid: Pid) -> io::Result<SchedAttr> {
            if pid.0 < 0 {
                return Err(io::Error::from_raw_os_error(libc::EINVAL));
            }
            Ok(self.attrs.borrow().get(&pid.0).copied().unwrap_or_default())
        }

        fn set_attr(&self, pid: Pid, attr: &SchedAttr) -> io::Result<()> {
            if self.deny_set {
                return Err(io::Error::from_raw_os_error(libc::EPERM));
            }
            self.attrs.borrow_mut().insert(pid.0, *attr);
            Ok(())
        }

        fn priority_range(&self, policy: u32) -> io::Result<(u32, u32)> {
            match policy {
                SCHED_FIFO | SCHED_RR => Ok((1, 99)),
                SCHED_OTHER | SCHED_BATCH | SCHED_IDLE | SCHED_DEADLINE => Ok((0, 0)),
                _ => Err(io::Error::from_raw_os_error(libc::EINVAL)),
            }
        }
    }

    fn controller() -> SchedulerController<FakeSyscalls> {
        SchedulerController::with_syscalls(FakeSyscalls::default())
    }

    #[test]
    fn test_policy_names_cover_known_values() {
        assert_eq!(policy_name(0), "SCHED_OTHER");
        assert_eq!(policy_name(1), "SCHED_FIFO");
        assert_eq!(policy_name(2), "SCHED_RR");
        assert_eq!(policy_name(3), "SCHED_BATCH");
        assert_eq!(policy_name(5), "SCHED_IDLE");
        assert_eq!(policy_name(6), "SCHED_DEADLINE");
    }

    #[test]
    fn test_unknown_policy_is_undefined() {
        // 4 is the retired SCHED_ISO, 7 is SCHED_EXT on newer kernels
        assert_eq!(policy_name(4), UNDEFINED_POLICY);
        assert_eq!(policy_name(7), UNDEFINED_POLICY);
        assert_eq!(policy_name(u32::MAX), UNDEFINED_POLICY);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("SCHED_FIFO".parse::<SchedPolicy>().unwrap(), SchedPolicy::Fifo);
        assert_eq!("rr".parse::<SchedPolicy>().unwrap(), SchedPolicy::RoundRobin);
        assert_eq!("sched_other".parse::<SchedPolicy>().unwrap(), SchedPolicy::Other);
        assert!("SCHED_ISO".parse::<SchedPolicy>().is_err());
    }

    #[test]
    fn test_set_policy_clamps_for_every_policy() {
        let ctl = controller();
        let pid = Pid(1234);
        for policy in SchedPolicy::ALL {
            for requested in [0, 1, 50, 99, 100, 1000] {
                let applied = ctl.set_policy(pid, policy, requested).unwrap();
                let queried = ctl.get_attributes(pid).unwrap();
                assert_eq!(applied, queried);

                let expected = if policy.is_realtime() { requested.clamp(1, 99) } else { 0 };
                assert_eq!(queried.sched_priority, expected, "{policy} with {requested}");
                assert_eq!(queried.sched_policy, policy.as_raw());
            }
        }
    }

    #[test]
    fn test_fifo_priority_zero_runs_at_minimum() {
        let ctl = controller();
        let attr = ctl.set_policy(Pid::CURRENT, SchedPolicy::Fifo, 0).unwrap();
        assert_eq!(attr.sched_priority, 1);
    }

    #[test]
    fn test_set_policy_failure_is_scheduler_set() {
        let ctl = SchedulerController::with_syscalls(FakeSyscalls {
            deny_set: true,
            ..FakeSyscalls::default()
        });
        let err = ctl.set_policy(Pid(1), SchedPolicy::Fifo, 10).unwrap_err();
        assert!(matches!(err, TraceError::SchedulerSet { priority: 10, .. }));
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_get_attributes_failure_is_scheduler_query() {
        let err = controller().get_attributes(Pid(-5)).unwrap_err();
        assert!(matches!(err, TraceError::SchedulerQuery { pid: Pid(-5), .. }));
    }

    #[test]
    fn test_set_deadline_applies_all_parameters() {
        let ctl = controller();
        ctl.set_deadline(Pid(7), 10_000, 30_000, 100_000).unwrap();
        let attr = ctl.get_attributes(Pid(7)).unwrap();
        assert_eq!(attr.sched_policy, SCHED_DEADLINE);
        assert_eq!((attr.sched_runtime, attr.sched_deadline, attr.sched_period), (10_000, 30_000, 100_000));
        assert_eq!(attr.sched_priority, 0);
    }

    #[test]
    fn test_current_record_priority_invariant() {
        let ctl = controller();
        for policy in SchedPolicy::ALL {
            ctl.set_policy(Pid::CURRENT, policy, 42).unwrap();
            let id = ExecutionId::parse("20240101000000").unwrap();
            let record = ctl.current_record(id, JobNumber(1), 10, None).unwrap();
            assert_eq!(record.scheduling_policy, Some(policy));
            assert_eq!(record.scheduling_priority == 0, !policy.is_realtime());
        }
    }
}
