use std::fs;

use jobtrace::domain::{JobNumber, TraceError};
use jobtrace::identifier::{generate_identifier, ExecutionId};
use jobtrace::logger::{append_execution_record, log_execution_info};
use jobtrace::record::{CsvSerializer, ExecutionRecord, RecordSerializer};
use jobtrace::sched::SchedPolicy;

fn append_jobs(root: &std::path::Path, id: &ExecutionId, jobs: std::ops::RangeInclusive<u32>) {
    for job in jobs {
        let record =
            ExecutionRecord::new(id.clone(), JobNumber(job), i64::from(job) * 10_000, SchedPolicy::Fifo, 10)
                .with_details("EmptyLoop");
        log_execution_info(root, id, &record).unwrap();
    }
}

#[test]
fn test_reopened_log_keeps_earlier_lines() {
    let results = tempfile::tempdir().unwrap();
    let id = ExecutionId::parse("20240131120000").unwrap();

    append_jobs(results.path(), &id, 1..=4);
    // A second run of the same execution keeps appending
    append_jobs(results.path(), &id, 5..=7);

    let log = fs::read_to_string(results.path().join("20240131120000/exec.txt")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 7);
    for (n, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split(", ").collect();
        assert_eq!(fields.len(), 6, "{line}");
        assert_eq!(fields[0], "20240131120000");
        assert_eq!(fields[1], (n + 1).to_string());
        assert_eq!(fields[2], ((n + 1) * 10_000).to_string());
        assert_eq!(fields[3], "SCHED_FIFO");
        assert_eq!(fields[4], "10");
        assert_eq!(fields[5], "EmptyLoop");
    }
}

#[test]
fn test_executions_are_separated_by_identifier() {
    let results = tempfile::tempdir().unwrap();
    let first = ExecutionId::parse("20240131120000").unwrap();
    let second = ExecutionId::parse("20240131120105").unwrap();

    append_jobs(results.path(), &first, 1..=2);
    append_jobs(results.path(), &second, 1..=1);

    let count = |id: &str| {
        fs::read_to_string(results.path().join(id).join("exec.txt")).unwrap().lines().count()
    };
    assert_eq!(count("20240131120000"), 2);
    assert_eq!(count("20240131120105"), 1);
}

#[test]
fn test_generated_identifier_names_directory() {
    let results = tempfile::tempdir().unwrap();
    let id = generate_identifier();
    let record = ExecutionRecord::new(id.clone(), JobNumber(1), 0, SchedPolicy::Idle, 0);
    log_execution_info(results.path(), &id, &record).unwrap();
    assert!(results.path().join(id.as_str()).join("exec.txt").is_file());
}

/// Wraps the built-in format with the variable-swap count of a demo job
struct SwapSerializer;

impl RecordSerializer<(ExecutionRecord, u64)> for SwapSerializer {
    fn serialize(&self, (record, swaps): &(ExecutionRecord, u64)) -> String {
        format!("{}, swaps={swaps}", CsvSerializer.serialize(record))
    }
}

#[test]
fn test_pluggable_serializer() {
    let results = tempfile::tempdir().unwrap();
    let id = ExecutionId::parse("20240131120000").unwrap();
    let record = ExecutionRecord::new(id.clone(), JobNumber(2), 5, SchedPolicy::Batch, 0);

    append_execution_record(results.path(), &id, &(record, 12_u64), &SwapSerializer).unwrap();

    let log = fs::read_to_string(results.path().join("20240131120000/exec.txt")).unwrap();
    assert_eq!(log, "20240131120000, 2, 5, SCHED_BATCH, 0, No details, swaps=12\n");
}

#[test]
fn test_identifier_validation() {
    let err = ExecutionId::parse("../escape").unwrap_err();
    assert!(matches!(err, TraceError::InvalidUsage(_)));
}
