//! Execution records and their serialization
//!
//! One [`ExecutionRecord`] describes one job of an execution: which policy and
//! priority it ran under and the caller's workload parameter. Records are
//! turned into single log lines by a [`RecordSerializer`]; [`CsvSerializer`]
//! produces the built-in format
//!
//! ```text
//! <id>, <job>, <parameter>, <policy>, <priority>, <details>
//! ```

use jobtrace_common::{SchedAttr, SCHED_RT_PRIORITY_MAX, SCHED_RT_PRIORITY_MIN};

use crate::domain::JobNumber;
use crate::identifier::ExecutionId;
use crate::sched::{SchedPolicy, UNDEFINED_POLICY};

/// Written in place of absent details
pub const NO_DETAILS: &str = "No details";

/// One row of an execution log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub identifier: ExecutionId,
    pub job_number: JobNumber,
    pub parameter: i64,
    /// `None` when the kernel reported a policy outside the known set
    pub scheduling_policy: Option<SchedPolicy>,
    /// Non-zero only for `SCHED_FIFO` / `SCHED_RR`
    pub scheduling_priority: u32,
    pub details: Option<String>,
}

impl ExecutionRecord {
    /// Record for an explicit policy and priority
    ///
    /// Realtime priorities are clamped into 1..=99 like `sched_setattr`
    /// expects; every other policy gets 0.
    #[must_use]
    pub fn new(
        identifier: ExecutionId,
        job_number: JobNumber,
        parameter: i64,
        policy: SchedPolicy,
        priority: u32,
    ) -> Self {
        Self {
            identifier,
            job_number,
            parameter,
            scheduling_policy: Some(policy),
            scheduling_priority: if policy.is_realtime() {
                priority.clamp(SCHED_RT_PRIORITY_MIN, SCHED_RT_PRIORITY_MAX)
            } else {
                0
            },
            details: None,
        }
    }

    /// Record populated from attributes read from the kernel
    #[must_use]
    pub fn from_attributes(
        identifier: ExecutionId,
        job_number: JobNumber,
        parameter: i64,
        attr: &SchedAttr,
        details: Option<String>,
    ) -> Self {
        let mut record = Self {
            identifier,
            job_number,
            parameter,
            scheduling_policy: None,
            scheduling_priority: 0,
            details,
        };
        record.apply_attributes(attr);
        record
    }

    /// Refresh policy and priority after a scheduler change
    pub fn apply_attributes(&mut self, attr: &SchedAttr) {
        self.scheduling_policy = SchedPolicy::from_raw(attr.sched_policy);
        self.scheduling_priority = match self.scheduling_policy {
            Some(policy) if policy.is_realtime() => attr.sched_priority,
            _ => 0,
        };
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Policy name as written to the log, `UNDEFINED` when unknown
    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.scheduling_policy.map_or(UNDEFINED_POLICY, SchedPolicy::name)
    }

    /// Details as written to the log
    #[must_use]
    pub fn details_or_placeholder(&self) -> &str {
        self.details.as_deref().unwrap_or(NO_DETAILS)
    }
}

/// Turns a record into one log line (without the trailing newline)
///
/// Implementations must be pure: no I/O, no line breaks in the output.
/// Any `Fn(&R) -> String` closure is a serializer.
pub trait RecordSerializer<R: ?Sized> {
    fn serialize(&self, record: &R) -> String;
}

impl<R: ?Sized, F> RecordSerializer<R> for F
where
    F: Fn(&R) -> String,
{
    fn serialize(&self, record: &R) -> String {
        self(record)
    }
}

/// Built-in comma separated format
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSerializer;

impl RecordSerializer<ExecutionRecord> for CsvSerializer {
    fn serialize(&self, record: &ExecutionRecord) -> String {
        format!(
            "{}, {}, {}, {}, {}, {}",
            record.identifier,
            record.job_number,
            record.parameter,
            record.policy_name(),
            record.scheduling_priority,
            record.details_or_placeholder()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobtrace_common::{SCHED_FIFO, SCHED_OTHER};

    fn id() -> ExecutionId {
        ExecutionId::parse("20240131120000").unwrap()
    }

    #[test]
    fn test_csv_line_with_details() {
        let record = ExecutionRecord::new(id(), JobNumber(1), 10_000, SchedPolicy::Other, 0)
            .with_details("EmptyLoop");
        assert_eq!(
            CsvSerializer.serialize(&record),
            "20240131120000, 1, 10000, SCHED_OTHER, 0, EmptyLoop"
        );
    }

    #[test]
    fn test_csv_line_placeholders() {
        let mut record = ExecutionRecord::new(id(), JobNumber(3), -7, SchedPolicy::Fifo, 10);
        record.scheduling_policy = None;
        record.scheduling_priority = 0;
        assert_eq!(
            CsvSerializer.serialize(&record),
            "20240131120000, 3, -7, UNDEFINED, 0, No details"
        );
    }

    #[test]
    fn test_new_zeroes_non_realtime_priority() {
        let record = ExecutionRecord::new(id(), JobNumber(1), 0, SchedPolicy::Batch, 50);
        assert_eq!(record.scheduling_priority, 0);
        let record = ExecutionRecord::new(id(), JobNumber(1), 0, SchedPolicy::RoundRobin, 50);
        assert_eq!(record.scheduling_priority, 50);
    }

    #[test]
    fn test_new_clamps_realtime_priority() {
        for policy in [SchedPolicy::Fifo, SchedPolicy::RoundRobin] {
            let low = ExecutionRecord::new(id(), JobNumber(1), 1, policy, 0);
            assert_eq!(low.scheduling_priority, 1);
            let high = ExecutionRecord::new(id(), JobNumber(1), 1, policy, 500);
            assert_eq!(high.scheduling_priority, 99);
        }
        let record = ExecutionRecord::new(id(), JobNumber(1), 1, SchedPolicy::Fifo, 0);
        assert_eq!(
            CsvSerializer.serialize(&record),
            "20240131120000, 1, 1, SCHED_FIFO, 1, No details"
        );
    }

    #[test]
    fn test_apply_attributes_tracks_policy_changes() {
        let mut record =
            ExecutionRecord::from_attributes(id(), JobNumber(1), 0, &SchedAttr::new(SCHED_FIFO, 20), None);
        assert_eq!(record.scheduling_policy, Some(SchedPolicy::Fifo));
        assert_eq!(record.scheduling_priority, 20);

        record.apply_attributes(&SchedAttr::new(SCHED_OTHER, 20));
        assert_eq!(record.scheduling_policy, Some(SchedPolicy::Other));
        assert_eq!(record.scheduling_priority, 0);

        // Unknown policy value (SCHED_EXT)
        record.apply_attributes(&SchedAttr::new(7, 3));
        assert_eq!(record.policy_name(), UNDEFINED_POLICY);
        assert_eq!(record.scheduling_priority, 0);
    }

    #[test]
    fn test_closure_is_a_serializer() {
        let serializer = |r: &ExecutionRecord| format!("job {} took {}", r.job_number, r.parameter);
        let record = ExecutionRecord::new(id(), JobNumber(4), 99, SchedPolicy::Idle, 0);
        assert_eq!(serializer.serialize(&record), "job 4 took 99");
    }
}
