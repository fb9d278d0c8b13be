//! Structured error types for jobtrace
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Every I/O-backed variant names the file or pid it failed on; the wrapped
//! `io::Error` renders the errno and its description.

use super::types::Pid;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("tracefs I/O failed on {}: {source}", path.display())]
    TracingIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to query scheduler attributes of {pid}: {source}")]
    SchedulerQuery {
        pid: Pid,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set scheduling policy {policy} (priority {priority}) on {pid}: {source}")]
    SchedulerSet {
        pid: Pid,
        policy: String,
        priority: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create results directory {}: {source}", path.display())]
    FilesystemLayout {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    RecordIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl TraceError {
    /// OS error behind this failure, if any
    #[must_use]
    pub fn os_error(&self) -> Option<&io::Error> {
        match self {
            TraceError::TracingIo { source, .. }
            | TraceError::SchedulerQuery { source, .. }
            | TraceError::SchedulerSet { source, .. }
            | TraceError::FilesystemLayout { source, .. }
            | TraceError::RecordIo { source, .. } => Some(source),
            TraceError::InvalidUsage(_) => None,
        }
    }

    /// True when the kernel refused the operation for lack of privilege
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.os_error().is_some_and(|e| {
            e.kind() == io::ErrorKind::PermissionDenied || e.raw_os_error() == Some(libc::EPERM)
        })
    }
}
