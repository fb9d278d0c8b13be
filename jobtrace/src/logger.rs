//! Execution logger
//!
//! Persists one execution under its identifier:
//!
//! ```text
//! <root>/<identifier>/exec.txt    one line per job, append-only
//! <root>/<identifier>/trace.txt   drained trace text, written once
//! ```
//!
//! Trace data is copied as an opaque byte stream; nothing here parses it.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use jobtrace_common::{COPY_BUFFER_SIZE, TRACE, TRACE_PIPE};
use log::{debug, info};

use crate::domain::{Result, TraceError};
use crate::identifier::ExecutionId;
use crate::record::{CsvSerializer, ExecutionRecord, RecordSerializer};
use crate::tracefs::TracingKernelInterface;

/// Per-execution job log
pub const EXEC_LOG_FILE: &str = "exec.txt";

/// Per-execution drained trace
pub const TRACE_OUTPUT_FILE: &str = "trace.txt";

/// Where drained trace data is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainMode {
    /// `trace_pipe`, non-blocking: copy what is available and stop
    LivePipe,
    /// `trace`, then reset the ring buffer
    #[default]
    SnapshotBuffer,
}

impl DrainMode {
    fn source(self) -> &'static str {
        match self {
            DrainMode::LivePipe => TRACE_PIPE,
            DrainMode::SnapshotBuffer => TRACE,
        }
    }
}

/// Create `<root>/<identifier>` (and `root`) if missing
///
/// When run through `sudo`, newly created directories are handed to the
/// invoking user.
///
/// # Errors
/// Returns [`TraceError::FilesystemLayout`] if a directory cannot be created
/// or handed over.
pub fn ensure_execution_dir(root: &Path, identifier: &ExecutionId) -> Result<PathBuf> {
    create_execution_dir(root, identifier, sudo_owner())
}

fn create_execution_dir(
    root: &Path,
    identifier: &ExecutionId,
    owner: Option<(u32, u32)>,
) -> Result<PathBuf> {
    let dir = root.join(identifier.as_str());
    for path in [root, dir.as_path()] {
        if path.is_dir() {
            continue;
        }
        let layout_error =
            |source| TraceError::FilesystemLayout { path: path.to_path_buf(), source };
        fs::create_dir_all(path).map_err(layout_error)?;
        debug!("Created {}", path.display());
        if let Some((uid, gid)) = owner {
            std::os::unix::fs::chown(path, Some(uid), Some(gid)).map_err(layout_error)?;
            debug!("Handed {} to {uid}:{gid}", path.display());
        }
    }
    Ok(dir)
}

/// Append `record` as one line to `<root>/<identifier>/exec.txt`
///
/// # Errors
/// Returns [`TraceError::InvalidUsage`] if the serializer produced more than
/// one line, [`TraceError::FilesystemLayout`] if the directory cannot be
/// created and [`TraceError::RecordIo`] if the log cannot be written.
pub fn append_execution_record<R, S>(
    root: &Path,
    identifier: &ExecutionId,
    record: &R,
    serializer: &S,
) -> Result<()>
where
    R: ?Sized,
    S: RecordSerializer<R> + ?Sized,
{
    let line = serializer.serialize(record);
    if line.contains(['\n', '\r']) {
        return Err(TraceError::InvalidUsage(format!(
            "a serialized record must be a single line, got {line:?}"
        )));
    }

    let path = ensure_execution_dir(root, identifier)?.join(EXEC_LOG_FILE);
    let record_io = |source| TraceError::RecordIo { path: path.clone(), source };
    let mut file = OpenOptions::new().create(true).append(true).open(&path).map_err(record_io)?;
    // One write per line so concurrent appenders never interleave within a line
    file.write_all(format!("{line}\n").as_bytes()).map_err(record_io)?;
    debug!("Appended to {}: {line}", path.display());
    Ok(())
}

/// Append an [`ExecutionRecord`] in the built-in format
///
/// # Errors
/// Returns [`TraceError::InvalidUsage`] if the record belongs to another
/// execution, otherwise the errors of [`append_execution_record`].
pub fn log_execution_info(
    root: &Path,
    identifier: &ExecutionId,
    record: &ExecutionRecord,
) -> Result<()> {
    if record.identifier != *identifier {
        return Err(TraceError::InvalidUsage(format!(
            "record of execution {} cannot be logged under {identifier}",
            record.identifier
        )));
    }
    append_execution_record(root, identifier, record, &CsvSerializer)
}

/// Copy the kernel trace into `<root>/<identifier>/trace.txt`
///
/// Any existing `trace.txt` is replaced. In [`DrainMode::SnapshotBuffer`] the
/// ring buffer is reset afterwards, so a second drain without new activity
/// produces an empty file. Returns the number of bytes copied.
///
/// # Errors
/// Returns [`TraceError::FilesystemLayout`] if the directory cannot be
/// created, [`TraceError::TracingIo`] if the trace cannot be read or reset and
/// [`TraceError::RecordIo`] if `trace.txt` cannot be written.
pub fn drain_trace<K>(
    kernel: &K,
    root: &Path,
    identifier: &ExecutionId,
    mode: DrainMode,
) -> Result<u64>
where
    K: TracingKernelInterface + ?Sized,
{
    let out_path = ensure_execution_dir(root, identifier)?.join(TRACE_OUTPUT_FILE);
    let source_file = Path::new(mode.source());

    let mut source = kernel.open_read(source_file, mode == DrainMode::LivePipe)?;
    let mut out = File::create(&out_path)
        .map_err(|source| TraceError::RecordIo { path: out_path.clone(), source })?;

    let copied = copy_available(&mut source, &mut out).map_err(|e| match e {
        CopyError::Read(source) => {
            TraceError::TracingIo { path: kernel.locate(source_file), source }
        }
        CopyError::Write(source) => TraceError::RecordIo { path: out_path.clone(), source },
    })?;
    drop(source);

    if mode == DrainMode::SnapshotBuffer {
        kernel.clear(source_file)?;
    }
    info!("Saved {copied} bytes of trace data to {}", out_path.display());
    Ok(copied)
}

#[derive(Debug)]
enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

/// Copy until end of data or until the source would block
fn copy_available(source: &mut dyn Read, out: &mut dyn Write) -> std::result::Result<u64, CopyError> {
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => return Err(CopyError::Read(e)),
        };
        out.write_all(&buf[..n]).map_err(CopyError::Write)?;
        copied += n as u64;
    }
    Ok(copied)
}

/// uid/gid of the user who invoked `sudo`, if any
fn sudo_owner() -> Option<(u32, u32)> {
    parse_owner(env::var("SUDO_UID").ok().as_deref(), env::var("SUDO_GID").ok().as_deref())
}

fn parse_owner(uid: Option<&str>, gid: Option<&str>) -> Option<(u32, u32)> {
    Some((uid?.parse().ok()?, gid?.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobNumber;
    use crate::sched::SchedPolicy;
    use crate::tracefs::MemoryTracefs;
    use jobtrace_common::TRACING_ON;

    fn id() -> ExecutionId {
        ExecutionId::parse("20240131120000").unwrap()
    }

    fn record(job: u32) -> ExecutionRecord {
        ExecutionRecord::new(id(), JobNumber(job), 10_000, SchedPolicy::Other, 0)
    }

    /// Source that yields some data and then would block, like an idle `trace_pipe`
    struct PipeLike(Option<Vec<u8>>);

    impl Read for PipeLike {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.take() {
                Some(data) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                None => Err(io::Error::from(ErrorKind::WouldBlock)),
            }
        }
    }

    #[test]
    fn test_append_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("results");
        log_execution_info(&root, &id(), &record(1)).unwrap();

        let log = fs::read_to_string(root.join("20240131120000").join(EXEC_LOG_FILE)).unwrap();
        assert_eq!(log, "20240131120000, 1, 10000, SCHED_OTHER, 0, No details\n");
    }

    #[test]
    fn test_append_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        for job in 1..=3 {
            log_execution_info(dir.path(), &id(), &record(job)).unwrap();
        }
        let log = fs::read_to_string(dir.path().join("20240131120000/exec.txt")).unwrap();
        let jobs: Vec<&str> = log.lines().map(|l| l.split(", ").nth(1).unwrap()).collect();
        assert_eq!(jobs, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_custom_serializer() {
        let dir = tempfile::tempdir().unwrap();
        struct SwapCount {
            swaps: u64,
        }
        let serializer = |r: &SwapCount| format!("swaps={}", r.swaps);
        append_execution_record(dir.path(), &id(), &SwapCount { swaps: 7 }, &serializer).unwrap();
        let log = fs::read_to_string(dir.path().join("20240131120000/exec.txt")).unwrap();
        assert_eq!(log, "swaps=7\n");
    }

    #[test]
    fn test_multiline_serializer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let serializer = |_: &ExecutionRecord| "a\nb".to_string();
        let err = append_execution_record(dir.path(), &id(), &record(1), &serializer).unwrap_err();
        assert!(matches!(err, TraceError::InvalidUsage(_)));
        assert!(!dir.path().join("20240131120000").exists());
    }

    #[test]
    fn test_record_of_other_execution_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = ExecutionId::parse("19991231235959").unwrap();
        let err = log_execution_info(dir.path(), &other, &record(1)).unwrap_err();
        assert!(matches!(err, TraceError::InvalidUsage(_)));
    }

    #[test]
    fn test_root_that_is_a_file_is_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        fs::write(&root, "x").unwrap();
        let err = log_execution_info(&root, &id(), &record(1)).unwrap_err();
        assert!(matches!(err, TraceError::FilesystemLayout { .. }));
    }

    #[test]
    fn test_snapshot_drain_resets_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let tracefs = MemoryTracefs::new();
        tracefs.write(Path::new(TRACING_ON), "1").unwrap();
        tracefs.emit("<idle>-0 [000] sched_switch: prev_pid=0 next_pid=1234");

        let copied = drain_trace(&tracefs, dir.path(), &id(), DrainMode::SnapshotBuffer).unwrap();
        assert!(copied > 0);
        assert_eq!(tracefs.ring_buffer(), "");
        let trace = fs::read_to_string(dir.path().join("20240131120000/trace.txt")).unwrap();
        assert!(trace.contains("next_pid=1234"));
    }

    #[test]
    fn test_pipe_drain_consumes() {
        let dir = tempfile::tempdir().unwrap();
        let tracefs = MemoryTracefs::new();
        tracefs.write(Path::new(TRACING_ON), "1").unwrap();
        tracefs.emit("end_job=1");

        drain_trace(&tracefs, dir.path(), &id(), DrainMode::LivePipe).unwrap();
        let trace = fs::read_to_string(dir.path().join("20240131120000/trace.txt")).unwrap();
        assert_eq!(trace, "end_job=1\n");
        assert_eq!(tracefs.ring_buffer(), "");
    }

    #[test]
    fn test_drain_replaces_previous_trace() {
        let dir = tempfile::tempdir().unwrap();
        let exec_dir = dir.path().join("20240131120000");
        fs::create_dir_all(&exec_dir).unwrap();
        fs::write(exec_dir.join(TRACE_OUTPUT_FILE), "leftover from an earlier drain\n").unwrap();

        let copied = drain_trace(&MemoryTracefs::new(), dir.path(), &id(), DrainMode::SnapshotBuffer)
            .unwrap();
        assert_eq!(copied, 0);
        assert_eq!(fs::read_to_string(exec_dir.join(TRACE_OUTPUT_FILE)).unwrap(), "");
    }

    #[test]
    fn test_copy_stops_on_would_block() {
        let mut source = PipeLike(Some(b"sched_wakeup: pid=1234\n".to_vec()));
        let mut out = Vec::new();
        let copied = copy_available(&mut source, &mut out).unwrap();
        assert_eq!(copied, 23);
        assert_eq!(out, b"sched_wakeup: pid=1234\n");
    }

    #[test]
    fn test_copy_spans_multiple_chunks() {
        let data = vec![b'x'; COPY_BUFFER_SIZE * 2 + 17];
        let mut out = Vec::new();
        let copied = copy_available(&mut data.as_slice(), &mut out).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_created_dirs_are_handed_to_owner() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let meta = fs::metadata(dir.path()).unwrap();
        let root = dir.path().join("results");

        let exec_dir = create_execution_dir(&root, &id(), Some((meta.uid(), meta.gid()))).unwrap();
        assert_eq!(exec_dir, root.join("20240131120000"));
        for path in [&root, &exec_dir] {
            let created = fs::metadata(path).unwrap();
            assert_eq!((created.uid(), created.gid()), (meta.uid(), meta.gid()));
        }
    }

    #[test]
    fn test_failed_hand_over_is_layout_error() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let uid = fs::metadata(dir.path()).unwrap().uid();
        if uid == 0 {
            // root may chown to anyone
            return;
        }
        let err = create_execution_dir(&dir.path().join("results"), &id(), Some((uid + 1, 0)))
            .unwrap_err();
        assert!(matches!(err, TraceError::FilesystemLayout { .. }));
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_parse_owner() {
        assert_eq!(parse_owner(Some("1000"), Some("100")), Some((1000, 100)));
        assert_eq!(parse_owner(Some("1000"), None), None);
        assert_eq!(parse_owner(Some("root"), Some("0")), None);
    }
}
