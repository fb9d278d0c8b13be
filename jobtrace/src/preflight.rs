//! Pre-flight checks for jobtrace
//!
//! Validates system requirements before touching tracefs or the scheduler.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use jobtrace_common::TRACING_ON;

use crate::tracefs::Tracefs;

/// First kernel with `sched_setattr(2)`
const MIN_KERNEL_VERSION: (u32, u32) = (3, 14);

/// Run all pre-flight checks, returning the tracefs to use
///
/// An explicit `tracefs` root skips auto-detection.
pub fn run_preflight_checks(tracefs: Option<Tracefs>) -> Result<Tracefs> {
    check_privileges()?;
    check_kernel_version()?;
    check_tracefs(tracefs)
}

/// tracefs control files are writable by root only
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: jobtrace requires root privileges to control tracefs \
         and real-time scheduling policies.\n\n\
         Run with: sudo jobtrace ..."
    );
}

/// Check that the kernel provides `sched_setattr`
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 6.1.0-arch1-1 (...)"
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");

    let Some(version) = parse_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if version < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {}.{} is too old.\n\n\
             jobtrace requires Linux {}.{} or newer for sched_setattr.\n\
             Current kernel: {}",
            version.0,
            version.1,
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
            release
        );
    }

    Ok(())
}

/// `(major, minor)` of a release string such as `5.15.0-91-generic`
fn parse_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Check that tracefs is mounted and usable
fn check_tracefs(explicit: Option<Tracefs>) -> Result<Tracefs> {
    let tracefs = match explicit {
        Some(tracefs) => tracefs,
        None => Tracefs::detect().context(
            "tracefs not found at /sys/kernel/tracing or /sys/kernel/debug/tracing\n\n\
             Mount it with: sudo mount -t tracefs nodev /sys/kernel/tracing",
        )?,
    };

    let control = tracefs.root().join(TRACING_ON);
    if !control.is_file() {
        bail!(
            "Not a tracefs: {} has no {TRACING_ON} file\n\n\
             --tracefs must point to a mounted tracefs.",
            tracefs.root().display()
        );
    }
    Ok(tracefs)
}
