//! Access to the kernel tracing facility
//!
//! The tracing on/off flag, per-event enables and filters are host-wide
//! kernel state. Components never touch it directly; they go through a
//! [`TracingKernelInterface`] handle that is injected into them:
//!
//! - [`Tracefs`] - the real tracefs mount
//! - [`MemoryTracefs`] - an in-memory stand-in that records every operation
//!
//! Paths handed to the interface are relative to the tracefs root, e.g.
//! `tracing_on` or `events/sched/sched_switch/filter`.

pub mod memory;

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use jobtrace_common::{TRACEFS_LEGACY_ROOT, TRACEFS_ROOT, TRACING_ON};
use log::{debug, info};

use crate::domain::{Result, TraceError};

pub use memory::{MemoryTracefs, TracefsOp};

/// Handle on the kernel tracing state
pub trait TracingKernelInterface {
    /// Replace the contents of a control file
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the file cannot be opened or written.
    fn write(&self, file: &Path, contents: &str) -> Result<()>;

    /// Reset a buffer file, the `echo 0 > file` idiom (open with `O_TRUNC`)
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the file cannot be opened.
    fn clear(&self, file: &Path) -> Result<()>;

    /// Open a file for reading
    ///
    /// With `nonblocking` a read returns `WouldBlock` instead of waiting for
    /// more data, which is how streaming files are drained.
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the file cannot be opened.
    fn open_read(&self, file: &Path, nonblocking: bool) -> Result<Box<dyn Read + '_>>;

    /// Absolute location of `file`, used in diagnostics
    fn locate(&self, file: &Path) -> PathBuf;
}

/// A mounted tracefs
#[derive(Debug, Clone)]
pub struct Tracefs {
    root: PathBuf,
}

impl Tracefs {
    /// tracefs at its conventional mount point
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(TRACEFS_ROOT)
    }

    /// tracefs (or a directory laid out like it) at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First mount point that exposes a `tracing_on` file
    #[must_use]
    pub fn detect() -> Option<Self> {
        [TRACEFS_ROOT, TRACEFS_LEGACY_ROOT]
            .iter()
            .map(Path::new)
            .find(|root| root.join(TRACING_ON).exists())
            .map(|root| {
                info!("Using tracefs at {}", root.display());
                Self::with_root(root)
            })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(&self, file: &Path, source: std::io::Error) -> TraceError {
        TraceError::TracingIo { path: self.locate(file), source }
    }
}

impl Default for Tracefs {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingKernelInterface for Tracefs {
    fn write(&self, file: &Path, contents: &str) -> Result<()> {
        let path = self.locate(file);
        debug!("tracefs write {} <- {contents:?}", path.display());
        // No `create`: a missing file means the event or feature does not exist
        let mut f = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| self.io_error(file, e))?;
        f.write_all(contents.as_bytes()).map_err(|e| self.io_error(file, e))
    }

    fn clear(&self, file: &Path) -> Result<()> {
        debug!("tracefs clear {}", self.locate(file).display());
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.locate(file))
            .map(drop)
            .map_err(|e| self.io_error(file, e))
    }

    fn open_read(&self, file: &Path, nonblocking: bool) -> Result<Box<dyn Read + '_>> {
        let mut options = OpenOptions::new();
        options.read(true);
        if nonblocking {
            options.custom_flags(libc::O_NONBLOCK);
        }
        let f = options.open(self.locate(file)).map_err(|e| self.io_error(file, e))?;
        Ok(Box::new(f))
    }

    fn locate(&self, file: &Path) -> PathBuf {
        self.root.join(file)
    }
}
