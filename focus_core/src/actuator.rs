//! Step/direction/enable stepper driver on a lead screw.
//!
//! Line conventions: enable is active low; direction low moves forward
//! (away from home). A move is a blocking pulse train; the driver is
//! disabled again on every exit path, including errors and unwinding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use focus_traits::clock::Clock;
use focus_traits::{BoxError, Direction, Motion, OutputLine};

use crate::config::ActuatorCfg;
use crate::error::{BuildError, FocusError, Result};
use crate::util::edge_delay;

type Line = Box<dyn OutputLine + Send>;

pub struct StepperActuator {
    step: Line,
    dir: Line,
    enable: Line,
    cfg: ActuatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl core::fmt::Debug for StepperActuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepperActuator")
            .field("cfg", &self.cfg)
            .field("interruptible", &self.interrupt.is_some())
            .finish_non_exhaustive()
    }
}

/// Disables the driver when dropped unless `finish` already did.
struct DisableOnDrop<'a> {
    line: Option<&'a mut (dyn OutputLine + Send)>,
}

impl DisableOnDrop<'_> {
    fn finish(mut self) -> std::result::Result<(), BoxError> {
        match self.line.take() {
            Some(line) => line.set_high(),
            None => Ok(()),
        }
    }
}

impl Drop for DisableOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(line) = self.line.take() {
            if let Err(e) = line.set_high() {
                tracing::error!(error = %e, "failed to disable stepper driver");
            }
        }
    }
}

fn apply_direction(line: &mut Line, dir: Direction) -> std::result::Result<(), BoxError> {
    match dir {
        Direction::Forward => line.set_low(),
        Direction::Reverse => line.set_high(),
    }
}

impl StepperActuator {
    pub fn new(
        step: Line,
        dir: Line,
        enable: Line,
        cfg: ActuatorCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        if cfg.steps_per_rev == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "steps_per_rev must be >= 1",
            )));
        }
        if cfg.progress_interval.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "progress_interval must be > 0",
            )));
        }
        Ok(Self {
            step,
            dir,
            enable,
            cfg,
            clock,
            interrupt: None,
        })
    }

    /// Abort moves at the next pulse boundary once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn cfg(&self) -> &ActuatorCfg {
        &self.cfg
    }
}

impl Motion for StepperActuator {
    fn enable(&mut self) -> std::result::Result<(), BoxError> {
        self.enable.set_low()
    }

    fn disable(&mut self) -> std::result::Result<(), BoxError> {
        self.enable.set_high()
    }

    fn set_direction(&mut self, dir: Direction) -> std::result::Result<(), BoxError> {
        apply_direction(&mut self.dir, dir)
    }

    fn steps_per_rev(&self) -> u32 {
        self.cfg.steps_per_rev
    }

    fn move_mm(
        &mut self,
        distance_mm: f64,
        lead_mm: f64,
        speed_rps: f64,
        mut on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> std::result::Result<u64, BoxError> {
        // NaN lead falls in here as well.
        if !(lead_mm > 0.0) {
            tracing::debug!(lead_mm, "non-positive lead; move ignored");
            return Ok(0);
        }
        if !speed_rps.is_finite() || speed_rps <= 0.0 {
            return Err(Box::new(FocusError::Config(format!(
                "speed_rps must be > 0 (got {speed_rps})"
            ))));
        }
        if !distance_mm.is_finite() {
            return Err(Box::new(FocusError::Config(format!(
                "distance_mm must be finite (got {distance_mm})"
            ))));
        }

        let spr = f64::from(self.cfg.steps_per_rev);
        let rotations = distance_mm / lead_mm;
        let total_steps = (rotations.abs() * spr).round() as u64;
        let direction = Direction::of(rotations);
        let delay = edge_delay(self.cfg.steps_per_rev, speed_rps, self.cfg.min_edge_delay);
        let per_pulse_mm = lead_mm / spr * direction.sign();

        let Self {
            step,
            dir,
            enable,
            cfg,
            clock,
            interrupt,
        } = self;

        apply_direction(dir, direction)?;
        enable.set_low()?;
        let guard = DisableOnDrop {
            line: Some(&mut **enable),
        };
        clock.sleep(cfg.settle);

        tracing::trace!(
            distance_mm,
            total_steps,
            delay_ns = delay.as_nanos() as u64,
            "pulse train start"
        );

        let mut moved_mm = 0.0;
        let mut issued: u64 = 0;
        let mut last_report = clock.now();
        for _ in 0..total_steps {
            if interrupt
                .as_ref()
                .is_some_and(|f| f.load(Ordering::Relaxed))
            {
                guard.finish()?;
                tracing::warn!(issued, total_steps, "move interrupted");
                return Err(Box::new(FocusError::Interrupted { steps: issued }));
            }
            step.set_high()?;
            clock.sleep(delay);
            step.set_low()?;
            clock.sleep(delay);
            issued += 1;
            moved_mm += per_pulse_mm;

            if let Some(cb) = on_progress.as_deref_mut() {
                let now = clock.now();
                if now.saturating_duration_since(last_report) >= cfg.progress_interval {
                    cb(moved_mm);
                    last_report = now;
                }
            }
        }

        guard.finish()?;
        Ok(issued)
    }
}
