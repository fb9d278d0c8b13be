//! Trace session lifecycle
//!
//! ```text
//!            enable_tracing (writes tracing_on=1, clears trace)
//!   Disabled ───────────────────────────────────────────────▶ Enabled
//!       ▲                                                        │
//!       └─────────────── disable_tracing (tracing_on=0) ─────────┘
//! ```
//!
//! The ring buffer survives enable/disable cycles, so enabling always clears
//! it. Job markers are accepted in either state but only reach the trace
//! while Enabled.

use std::fmt;
use std::path::Path;

use jobtrace_common::{BUFFER_SIZE_KB, TRACE, TRACE_MARKER, TRACING_ON};
use log::{debug, info};

use crate::domain::{JobNumber, Result, TraceError};
use crate::tracefs::TracingKernelInterface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disabled,
    Enabled,
}

/// Which end of a job a marker denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    Stop,
}

impl Boundary {
    fn marker(self, job: JobNumber) -> String {
        match self {
            Boundary::Start => format!("start_job={job}"),
            Boundary::Stop => format!("end_job={job}"),
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Boundary::Start => "start",
            Boundary::Stop => "stop",
        })
    }
}

/// The host-wide tracing session
///
/// Only one meaningful session exists per host; two processes driving tracefs
/// at once corrupt each other's data.
#[derive(Debug)]
pub struct TraceSession<'k, K: TracingKernelInterface + ?Sized> {
    kernel: &'k K,
    state: SessionState,
}

impl<'k, K: TracingKernelInterface + ?Sized> TraceSession<'k, K> {
    /// Session handle in the Disabled state
    ///
    /// Nothing is written to tracefs until the first transition.
    pub fn new(kernel: &'k K) -> Self {
        Self { kernel, state: SessionState::Disabled }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Turn tracing on and discard previously buffered data
    ///
    /// Calling it again while Enabled just clears the buffer again.
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if either control file write fails.
    pub fn enable_tracing(&mut self) -> Result<()> {
        self.kernel.write(Path::new(TRACING_ON), "1")?;
        self.state = SessionState::Enabled;
        self.kernel.clear(Path::new(TRACE))?;
        info!("Tracing enabled");
        Ok(())
    }

    /// Turn tracing off; a no-op in effect when already Disabled
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if `tracing_on` cannot be written.
    pub fn disable_tracing(&mut self) -> Result<()> {
        self.kernel.write(Path::new(TRACING_ON), "0")?;
        self.state = SessionState::Disabled;
        info!("Tracing disabled");
        Ok(())
    }

    /// Write `text` into the trace stream as one marker line
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if `trace_marker` cannot be written.
    pub fn mark(&self, text: &str) -> Result<()> {
        if self.state == SessionState::Disabled {
            debug!("Marker '{text}' written while tracing is off, it will not be recorded");
        }
        self.kernel.write(Path::new(TRACE_MARKER), text)
    }

    /// Mark the start or stop of `job`
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if `trace_marker` cannot be written.
    pub fn mark_job(&self, job: JobNumber, boundary: Boundary) -> Result<()> {
        self.mark(&boundary.marker(job))
    }

    /// Resize the per-CPU ring buffer
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidUsage`] while Enabled and
    /// [`TraceError::TracingIo`] if `buffer_size_kb` cannot be written.
    pub fn set_buffer_size_kb(&self, kb: u32) -> Result<()> {
        if self.state == SessionState::Enabled {
            return Err(TraceError::InvalidUsage(
                "the trace buffer can only be resized before tracing is enabled".to_string(),
            ));
        }
        if kb == 0 {
            return Err(TraceError::InvalidUsage("trace buffer size must be at least 1 KB".to_string()));
        }
        self.kernel.write(Path::new(BUFFER_SIZE_KB), &kb.to_string())?;
        info!("Trace buffer set to {kb} KB per CPU");
        Ok(())
    }
}
