//! Event filters and enables
//!
//! Every traceable kernel event owns two control files:
//!
//! ```text
//! events/<subsystem>/<event>/filter
//! events/<subsystem>/<event>/enable
//! ```
//!
//! Writes replace the file contents. A silently unfiltered or unrecorded event
//! would produce a misleading trace, so every failure is returned to the caller.

use std::fmt;
use std::path::PathBuf;

use jobtrace_common::{
    ENABLE_FILE, EVENTS_DIR, FILTER_FILE, FILTER_RESET, SCHED_MIGRATE_TASK_EVENT, SCHED_SUBSYSTEM,
    SCHED_SWITCH_EVENT, SCHED_WAKEUP_EVENT,
};
use log::info;

use crate::domain::{Pid, Result, TraceError};
use crate::tracefs::TracingKernelInterface;

/// Predefined scheduler events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedEvent {
    /// `sched/sched_switch`
    Switch,
    /// `sched/sched_wakeup`
    Wakeup,
    /// `sched/sched_migrate_task`
    MigrateTask,
}

impl SchedEvent {
    pub const ALL: [SchedEvent; 3] = [SchedEvent::Switch, SchedEvent::Wakeup, SchedEvent::MigrateTask];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SchedEvent::Switch => SCHED_SWITCH_EVENT,
            SchedEvent::Wakeup => SCHED_WAKEUP_EVENT,
            SchedEvent::MigrateTask => SCHED_MIGRATE_TASK_EVENT,
        }
    }

    /// Filter expression selecting only events that involve `pid`
    ///
    /// A context switch involves two tasks, so either side may match.
    #[must_use]
    pub fn pid_filter(self, pid: Pid) -> String {
        match self {
            SchedEvent::Switch => format!("prev_pid=={0} || next_pid=={0}", pid.0),
            SchedEvent::Wakeup | SchedEvent::MigrateTask => format!("pid=={}", pid.0),
        }
    }
}

/// A traceable kernel event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventDescriptor {
    Predefined(SchedEvent),
    Custom { subsystem: String, event: String },
}

impl EventDescriptor {
    /// Arbitrary `<subsystem>/<event>` pair
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidUsage`] if either name is empty or not a
    /// single path component.
    pub fn custom(subsystem: &str, event: &str) -> Result<Self> {
        validate_component("subsystem", subsystem)?;
        validate_component("event", event)?;
        Ok(EventDescriptor::Custom { subsystem: subsystem.to_string(), event: event.to_string() })
    }

    #[must_use]
    pub fn subsystem(&self) -> &str {
        match self {
            EventDescriptor::Predefined(_) => SCHED_SUBSYSTEM,
            EventDescriptor::Custom { subsystem, .. } => subsystem,
        }
    }

    #[must_use]
    pub fn event(&self) -> &str {
        match self {
            EventDescriptor::Predefined(e) => e.name(),
            EventDescriptor::Custom { event, .. } => event,
        }
    }

    /// `events/<subsystem>/<event>/filter`
    #[must_use]
    pub fn filter_path(&self) -> PathBuf {
        self.event_dir().join(FILTER_FILE)
    }

    /// `events/<subsystem>/<event>/enable`
    #[must_use]
    pub fn enable_path(&self) -> PathBuf {
        self.event_dir().join(ENABLE_FILE)
    }

    fn event_dir(&self) -> PathBuf {
        [EVENTS_DIR, self.subsystem(), self.event()].iter().collect()
    }
}

impl From<SchedEvent> for EventDescriptor {
    fn from(event: SchedEvent) -> Self {
        EventDescriptor::Predefined(event)
    }
}

impl fmt::Display for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subsystem(), self.event())
    }
}

fn validate_component(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(TraceError::InvalidUsage(format!(
            "{what} name must be a single non-empty path component, got '{name}'"
        )));
    }
    Ok(())
}

fn flag(enabled: bool) -> &'static str {
    if enabled {
        "1"
    } else {
        "0"
    }
}

/// Filter and enable management on top of a tracefs handle
#[derive(Debug)]
pub struct EventFilters<'k, K: TracingKernelInterface + ?Sized> {
    kernel: &'k K,
}

impl<'k, K: TracingKernelInterface + ?Sized> EventFilters<'k, K> {
    pub fn new(kernel: &'k K) -> Self {
        Self { kernel }
    }

    /// Replace the filter expression of `event`
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the filter file cannot be written.
    pub fn set_filter(&self, event: &EventDescriptor, expression: &str) -> Result<()> {
        self.kernel.write(&event.filter_path(), expression)?;
        info!("Filter on {event}: {expression}");
        Ok(())
    }

    /// Restrict a predefined event to `pid`
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the filter file cannot be written.
    pub fn set_pid_filter(&self, event: SchedEvent, pid: Pid) -> Result<()> {
        self.set_filter(&event.into(), &event.pid_filter(pid))
    }

    /// Reset the filter of `event`
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the filter file cannot be written.
    pub fn clear_filter(&self, event: &EventDescriptor) -> Result<()> {
        self.kernel.write(&event.filter_path(), FILTER_RESET)?;
        info!("Filter on {event} cleared");
        Ok(())
    }

    /// Turn recording of `event` on or off
    ///
    /// # Errors
    /// Returns [`TraceError::TracingIo`] if the enable file cannot be written.
    pub fn set_recording(&self, event: &EventDescriptor, enabled: bool) -> Result<()> {
        self.kernel.write(&event.enable_path(), flag(enabled))?;
        info!("Recording of {event} {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Turn recording of every event in `subsystem` on or off
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidUsage`] for a malformed subsystem name and
    /// [`TraceError::TracingIo`] if the enable file cannot be written.
    pub fn set_subsystem_recording(&self, subsystem: &str, enabled: bool) -> Result<()> {
        validate_component("subsystem", subsystem)?;
        let path: PathBuf = [EVENTS_DIR, subsystem, ENABLE_FILE].iter().collect();
        self.kernel.write(&path, flag(enabled))?;
        info!("Recording of {subsystem}/* {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }
}
