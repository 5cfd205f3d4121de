//! Memory locking and CPU pinning for the pulse-train thread.

use nix::sched::{CpuSet, sched_setaffinity};
use nix::sys::mman::{MlockAllFlags, mlockall};
use nix::unistd::Pid;

use crate::error::{HwError, Result};

/// Lock resident pages, and with `include_future` every page mapped later,
/// so page faults cannot stall a move.
pub fn lock_memory(include_future: bool) -> Result<()> {
    let mut flags = MlockAllFlags::MCL_CURRENT;
    if include_future {
        flags |= MlockAllFlags::MCL_FUTURE;
    }
    mlockall(flags).map_err(|e| HwError::Io(std::io::Error::from(e)))
}

/// Pin the calling process to `cpu`.
pub fn pin_to_cpu(cpu: usize) -> Result<()> {
    let mut set = CpuSet::new();
    set.set(cpu)
        .map_err(|e| HwError::Io(std::io::Error::from(e)))?;
    sched_setaffinity(Pid::from_raw(0), &set).map_err(|e| HwError::Io(std::io::Error::from(e)))
}
