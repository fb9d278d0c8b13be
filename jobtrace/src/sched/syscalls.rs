//! Raw scheduler syscalls
//!
//! glibc ships no wrapper for `sched_setattr(2)` / `sched_getattr(2)`, so they
//! are issued by number. The numbers differ per architecture and are resolved
//! at build time; an unsupported target fails to compile.

#![allow(unsafe_code)] // raw syscalls

use std::io;

use jobtrace_common::{SchedAttr, SCHED_ATTR_SIZE_VER0};
use log::debug;

use crate::domain::Pid;

#[cfg(not(target_os = "linux"))]
compile_error!("jobtrace drives the Linux scheduler and tracefs and only builds for Linux");

#[cfg(target_arch = "x86_64")]
mod nr {
    pub const SCHED_SETATTR: libc::c_long = 314;
    pub const SCHED_GETATTR: libc::c_long = 315;
}

#[cfg(target_arch = "x86")]
mod nr {
    pub const SCHED_SETATTR: libc::c_long = 351;
    pub const SCHED_GETATTR: libc::c_long = 352;
}

#[cfg(target_arch = "arm")]
mod nr {
    pub const SCHED_SETATTR: libc::c_long = 380;
    pub const SCHED_GETATTR: libc::c_long = 381;
}

// Architectures on the generic syscall table
#[cfg(any(target_arch = "aarch64", target_arch = "riscv64", target_arch = "loongarch64"))]
mod nr {
    pub const SCHED_SETATTR: libc::c_long = 274;
    pub const SCHED_GETATTR: libc::c_long = 275;
}

#[cfg(target_arch = "powerpc64")]
mod nr {
    pub const SCHED_SETATTR: libc::c_long = 355;
    pub const SCHED_GETATTR: libc::c_long = 356;
}

#[cfg(target_arch = "s390x")]
mod nr {
    pub const SCHED_SETATTR: libc::c_long = 345;
    pub const SCHED_GETATTR: libc::c_long = 346;
}

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "arm",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "loongarch64",
    target_arch = "powerpc64",
    target_arch = "s390x",
)))]
compile_error!("sched_setattr/sched_getattr syscall numbers are not known for this architecture");

/// Platform capability used by [`super::SchedulerController`]
///
/// Implemented by [`LinuxSyscalls`] for the running kernel; tests substitute
/// their own implementation.
pub trait SchedulerSyscalls {
    /// `sched_getattr(pid, attr, sizeof(attr), 0)`
    ///
    /// # Errors
    /// Returns the OS error reported by the kernel.
    fn get_attr(&self, pid: Pid) -> io::Result<SchedAttr>;

    /// `sched_setattr(pid, attr, 0)`
    ///
    /// # Errors
    /// Returns the OS error reported by the kernel.
    fn set_attr(&self, pid: Pid, attr: &SchedAttr) -> io::Result<()>;

    /// `(sched_get_priority_min(policy), sched_get_priority_max(policy))`
    ///
    /// # Errors
    /// Returns the OS error reported by the kernel (`EINVAL` for an unknown policy).
    fn priority_range(&self, policy: u32) -> io::Result<(u32, u32)>;
}

/// Scheduler syscalls of the running Linux kernel
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxSyscalls;

impl SchedulerSyscalls for LinuxSyscalls {
    fn get_attr(&self, pid: Pid) -> io::Result<SchedAttr> {
        let mut attr = SchedAttr::default();
        // SAFETY: attr is a live, properly sized `struct sched_attr` and the
        // size argument matches its layout.
        let ret = unsafe {
            libc::syscall(
                nr::SCHED_GETATTR,
                libc::pid_t::from(pid),
                std::ptr::addr_of_mut!(attr),
                SCHED_ATTR_SIZE_VER0,
                0u32,
            )
        };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        debug!(
            "sched_getattr({pid}) -> policy {} priority {}",
            attr.sched_policy, attr.sched_priority
        );
        Ok(attr)
    }

    fn set_attr(&self, pid: Pid, attr: &SchedAttr) -> io::Result<()> {
        debug!(
            "sched_setattr({pid}, policy {} priority {})",
            attr.sched_policy, attr.sched_priority
        );
        // SAFETY: the kernel only reads `attr.size` bytes from the pointer,
        // which is exactly the size of the referenced structure.
        let ret = unsafe {
            libc::syscall(nr::SCHED_SETATTR, libc::pid_t::from(pid), std::ptr::from_ref(attr), 0u32)
        };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn priority_range(&self, policy: u32) -> io::Result<(u32, u32)> {
        let policy = libc::c_int::try_from(policy)
            .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
        // SAFETY: plain integer syscalls with no memory arguments
        let (min, max) =
            unsafe { (libc::sched_get_priority_min(policy), libc::sched_get_priority_max(policy)) };
        if min == -1 || max == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok((min.unsigned_abs(), max.unsigned_abs()))
    }
}
