use std::time::{Duration, Instant};

use focus_traits::Clock;

use crate::error::{HwError, Result};

/// Poll `ready` until it returns true or `timeout` expires, sleeping
/// `poll_interval` between checks.
pub fn wait_until(
    mut ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(HwError::Timeout(timeout));
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Clock for step trains: sleeps through the bulk of a delay and spins
/// the last `spin` of it, so sub-millisecond edges stay close to nominal.
#[derive(Debug, Clone, Copy)]
pub struct PrecisionClock {
    spin: Duration,
}

impl Default for PrecisionClock {
    fn default() -> Self {
        Self {
            spin: Duration::from_micros(200),
        }
    }
}

impl PrecisionClock {
    pub fn new(spin: Duration) -> Self {
        Self { spin }
    }
}

impl Clock for PrecisionClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        let deadline = Instant::now() + d;
        if d > self.spin {
            std::thread::sleep(d - self.spin);
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}
