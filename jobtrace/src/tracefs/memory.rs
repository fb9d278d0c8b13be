//! In-memory tracefs
//!
//! Models just enough kernel behavior to exercise the controller without
//! root or a tracefs mount:
//!
//! - writes replace file contents and fail for files that do not exist
//! - `trace_marker` writes land in the ring buffer only while `tracing_on` is `1`
//! - reading `trace` is non-consuming, reading `trace_pipe` consumes
//! - clearing `trace` empties the ring buffer
//!
//! Every operation is kept in order so tests can assert on the exact sequence.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use jobtrace_common::{
    BUFFER_SIZE_KB, DEFAULT_BUFFER_SIZE_KB, ENABLE_FILE, EVENTS_DIR, FILTER_FILE,
    SCHED_MIGRATE_TASK_EVENT, SCHED_SUBSYSTEM, SCHED_SWITCH_EVENT, SCHED_WAKEUP_EVENT, TRACE,
    TRACE_MARKER, TRACE_PIPE, TRACING_ON,
};

use super::TracingKernelInterface;
use crate::domain::{Result, TraceError};

const MEMORY_ROOT: &str = "<memory-tracefs>";

/// One recorded operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracefsOp {
    Write { file: PathBuf, contents: String },
    Clear { file: PathBuf },
}

impl TracefsOp {
    #[must_use]
    pub fn write(file: &str, contents: &str) -> Self {
        TracefsOp::Write { file: PathBuf::from(file), contents: contents.to_string() }
    }

    #[must_use]
    pub fn clear(file: &str) -> Self {
        TracefsOp::Clear { file: PathBuf::from(file) }
    }
}

/// tracefs stand-in backed by memory
#[derive(Debug)]
pub struct MemoryTracefs {
    files: RefCell<BTreeMap<PathBuf, String>>,
    ring_buffer: RefCell<String>,
    ops: RefCell<Vec<TracefsOp>>,
}

impl MemoryTracefs {
    /// Fresh tracefs with tracing off and the scheduler events present
    #[must_use]
    pub fn new() -> Self {
        let fs = Self {
            files: RefCell::new(BTreeMap::new()),
            ring_buffer: RefCell::new(String::new()),
            ops: RefCell::new(Vec::new()),
        };
        {
            let mut files = fs.files.borrow_mut();
            files.insert(PathBuf::from(TRACING_ON), "0".to_string());
            files.insert(PathBuf::from(TRACE_MARKER), String::new());
            files.insert(PathBuf::from(TRACE), String::new());
            files.insert(PathBuf::from(TRACE_PIPE), String::new());
            files.insert(PathBuf::from(BUFFER_SIZE_KB), DEFAULT_BUFFER_SIZE_KB.to_string());
            files.insert(Path::new(EVENTS_DIR).join(ENABLE_FILE), "0".to_string());
        }
        for event in [SCHED_SWITCH_EVENT, SCHED_WAKEUP_EVENT, SCHED_MIGRATE_TASK_EVENT] {
            fs.add_event(SCHED_SUBSYSTEM, event);
        }
        fs
    }

    /// Expose `events/<subsystem>/<event>/{filter,enable}`
    pub fn add_event(&self, subsystem: &str, event: &str) {
        let mut files = self.files.borrow_mut();
        let subsystem_dir = Path::new(EVENTS_DIR).join(subsystem);
        files.entry(subsystem_dir.join(ENABLE_FILE)).or_insert_with(|| "0".to_string());
        files.entry(subsystem_dir.join(FILTER_FILE)).or_insert_with(|| "none".to_string());
        let event_dir = subsystem_dir.join(event);
        files.insert(event_dir.join(FILTER_FILE), "none".to_string());
        files.insert(event_dir.join(ENABLE_FILE), "0".to_string());
    }

    /// Current contents of a control file
    pub fn contents(&self, file: impl AsRef<Path>) -> Option<String> {
        self.files.borrow().get(file.as_ref()).cloned()
    }

    /// True while `tracing_on` holds `1`
    #[must_use]
    pub fn is_tracing_on(&self) -> bool {
        self.contents(TRACING_ON).is_some_and(|v| v.trim() == "1")
    }

    /// Text currently held in the ring buffer
    #[must_use]
    pub fn ring_buffer(&self) -> String {
        self.ring_buffer.borrow().clone()
    }

    /// Append a line as the kernel would when an enabled event fires
    ///
    /// Dropped while tracing is off, like real events.
    pub fn emit(&self, line: &str) {
        if self.is_tracing_on() {
            let mut buffer = self.ring_buffer.borrow_mut();
            buffer.push_str(line);
            if !line.ends_with('\n') {
                buffer.push('\n');
            }
        }
    }

    /// Every operation so far, in order
    #[must_use]
    pub fn ops(&self) -> Vec<TracefsOp> {
        self.ops.borrow().clone()
    }

    fn not_found(file: &Path) -> TraceError {
        TraceError::TracingIo {
            path: Path::new(MEMORY_ROOT).join(file),
            source: io::Error::from(io::ErrorKind::NotFound),
        }
    }
}

impl Default for MemoryTracefs {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingKernelInterface for MemoryTracefs {
    fn write(&self, file: &Path, contents: &str) -> Result<()> {
        if !self.files.borrow().contains_key(file) {
            return Err(Self::not_found(file));
        }
        self.ops.borrow_mut().push(TracefsOp::Write {
            file: file.to_path_buf(),
            contents: contents.to_string(),
        });

        if file == Path::new(TRACE_MARKER) {
            self.emit(contents);
        } else if file != Path::new(TRACE) && file != Path::new(TRACE_PIPE) {
            self.files.borrow_mut().insert(file.to_path_buf(), contents.to_string());
        }
        Ok(())
    }

    fn clear(&self, file: &Path) -> Result<()> {
        if !self.files.borrow().contains_key(file) {
            return Err(Self::not_found(file));
        }
        self.ops.borrow_mut().push(TracefsOp::Clear { file: file.to_path_buf() });

        if file == Path::new(TRACE) {
            self.ring_buffer.borrow_mut().clear();
        } else {
            self.files.borrow_mut().insert(file.to_path_buf(), String::new());
        }
        Ok(())
    }

    fn open_read(&self, file: &Path, _nonblocking: bool) -> Result<Box<dyn Read + '_>> {
        let data = if file == Path::new(TRACE) {
            self.ring_buffer.borrow().clone()
        } else if file == Path::new(TRACE_PIPE) {
            std::mem::take(&mut *self.ring_buffer.borrow_mut())
        } else {
            self.contents(file).ok_or_else(|| Self::not_found(file))?
        };
        Ok(Box::new(Cursor::new(data.into_bytes())))
    }

    fn locate(&self, file: &Path) -> PathBuf {
        Path::new(MEMORY_ROOT).join(file)
    }
}
