//! Real-time scheduling helpers (Linux SCHED_FIFO, CPU pinning, mlockall).
//!
//! Priority goes through `libc`; memory locking and pinning go through
//! `focus_hardware::rt` and need the `rt` feature. Every step is best
//! effort: failures are reported as warnings and the run continues.

use crate::cli::RtArgs;
#[cfg(target_os = "linux")]
use crate::cli::RtLock;

#[cfg(target_os = "linux")]
pub fn setup_rt_once(args: RtArgs) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !args.rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "rt memory lock applied"),
            Err(err) => tracing::warn!(error = %err, ?lock, "mlockall failed"),
        }
        if let Err(err) = apply_fifo_priority(args.rt_prio) {
            tracing::warn!(error = %err, prio = ?args.rt_prio, "SCHED_FIFO not applied");
        }
        if let Err(err) = apply_affinity(args.rt_cpu.unwrap_or(0)) {
            tracing::warn!(error = %err, "affinity not applied");
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(args: RtArgs) {
    if args.rt {
        tracing::warn!("real-time mode is only supported on Linux; ignoring --rt");
    }
}

#[cfg(all(target_os = "linux", feature = "rt"))]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    match lock {
        RtLock::None => Ok(()),
        RtLock::Current => Ok(focus_hardware::rt::lock_memory(false)?),
        RtLock::All => match focus_hardware::rt::lock_memory(true) {
            Ok(()) => Ok(()),
            Err(e) => {
                // future pages may exceed the memlock limit; keep what is resident
                tracing::warn!(error = %e, "mlockall(current|future) failed; trying current");
                Ok(focus_hardware::rt::lock_memory(false)?)
            }
        },
    }
}

#[cfg(all(target_os = "linux", not(feature = "rt")))]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    if lock == RtLock::None {
        return Ok(());
    }
    eyre::bail!("memory locking needs a build with the `rt` feature")
}

#[cfg(all(target_os = "linux", feature = "rt"))]
fn apply_affinity(cpu: usize) -> eyre::Result<()> {
    Ok(focus_hardware::rt::pin_to_cpu(cpu)?)
}

#[cfg(all(target_os = "linux", not(feature = "rt")))]
fn apply_affinity(cpu: usize) -> eyre::Result<()> {
    eyre::bail!("pinning to CPU {cpu} needs a build with the `rt` feature")
}

#[cfg(target_os = "linux")]
fn has_sys_nice() -> bool {
    const CAP_SYS_NICE: u64 = 1 << 23;
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status
        .lines()
        .filter(|l| l.starts_with("CapEff:"))
        .filter_map(|l| l.split_whitespace().nth(1))
        .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
        .any(|caps| caps & CAP_SYS_NICE != 0)
}

/// SCHED_FIFO at `prio`, clamped to the system range (default: max).
#[cfg(target_os = "linux")]
fn apply_fifo_priority(prio: Option<i32>) -> eyre::Result<()> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    let euid = unsafe { libc::geteuid() };
    if euid != 0 && !has_sys_nice() {
        eyre::bail!(
            "insufficient privileges for SCHED_FIFO (euid {euid}); run as root or \
             grant CAP_SYS_NICE: 'sudo setcap cap_sys_nice=ep /path/to/focus'"
        );
    }
    let (min, max) = unsafe {
        let min = sched_get_priority_min(SCHED_FIFO);
        let max = sched_get_priority_max(SCHED_FIFO);
        if min < 0 || max < 0 { (1, 99) } else { (min, max) }
    };
    let param = sched_param {
        sched_priority: prio.unwrap_or(max).clamp(min, max),
    };
    let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    tracing::info!(prio = param.sched_priority, "SCHED_FIFO applied");
    Ok(())
}
