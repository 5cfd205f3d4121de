#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
pub mod error;
pub mod frames;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(all(feature = "rt", target_os = "linux"))]
pub mod rt;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use focus_traits::{BoxError, InputLine, OutputLine, PositionSensor};

pub use error::HwError;
pub use frames::FileFrameGrabber;
pub use util::PrecisionClock;

/// Peak intensity of the simulated spot, in volts.
pub const SIM_PEAK_VOLTS: f64 = 4.5;
/// Gaussian width of the simulated focus curve, in mm.
pub const SIM_WIDTH_MM: f64 = 40.0;
/// Distance past the end of travel at which the simulated limit switch closes.
pub const SIM_LIMIT_MARGIN_MM: f64 = 2.0;

#[derive(Debug)]
struct StageState {
    position_mm: f64,
    forward: bool,
    enabled: bool,
    step_high: bool,
    pulses: u64,
}

/// Lead-screw stage driven by step/dir/enable lines, with endstops and an
/// intensity sensor that read its position.
///
/// Lines follow the driver conventions: enable active low, direction low
/// forward. Only rising step edges with the driver enabled move the carriage.
#[derive(Debug, Clone)]
pub struct SimulatedStage {
    state: Arc<Mutex<StageState>>,
    mm_per_pulse: f64,
    max_travel_mm: f64,
}

impl SimulatedStage {
    pub fn new(lead_mm: f64, steps_per_rev: u32, max_travel_mm: f64, start_mm: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(StageState {
                position_mm: start_mm,
                forward: true,
                enabled: false,
                step_high: false,
                pulses: 0,
            })),
            mm_per_pulse: lead_mm / f64::from(steps_per_rev.max(1)),
            max_travel_mm,
        }
    }

    fn state(&self) -> MutexGuard<'_, StageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn position_mm(&self) -> f64 {
        self.state().position_mm
    }

    /// Step pulses that moved the carriage.
    pub fn pulses(&self) -> u64 {
        self.state().pulses
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn step_line(&self) -> SimLine {
        SimLine {
            stage: self.clone(),
            role: LineRole::Step,
        }
    }

    pub fn dir_line(&self) -> SimLine {
        SimLine {
            stage: self.clone(),
            role: LineRole::Dir,
        }
    }

    pub fn enable_line(&self) -> SimLine {
        SimLine {
            stage: self.clone(),
            role: LineRole::Enable,
        }
    }

    /// Home switch input: closes at or below 0 mm.
    pub fn home_input(&self, normally_open: bool) -> SimSwitch {
        SimSwitch {
            stage: self.clone(),
            at_home: true,
            normally_open,
        }
    }

    /// Limit switch input: closes a little past the end of travel.
    pub fn limit_input(&self, normally_open: bool) -> SimSwitch {
        SimSwitch {
            stage: self.clone(),
            at_home: false,
            normally_open,
        }
    }

    /// Gaussian spot intensity peaking at `peak_mm`.
    pub fn sensor(&self, peak_mm: f64) -> SimulatedSensor {
        SimulatedSensor {
            stage: self.clone(),
            peak_mm,
            running: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LineRole {
    Step,
    Dir,
    Enable,
}

#[derive(Debug, Clone)]
pub struct SimLine {
    stage: SimulatedStage,
    role: LineRole,
}

impl SimLine {
    fn write(&self, high: bool) {
        let mm = self.stage.mm_per_pulse;
        let mut s = self.stage.state();
        match self.role {
            LineRole::Step => {
                if high && !s.step_high && s.enabled {
                    s.position_mm += if s.forward { mm } else { -mm };
                    s.pulses += 1;
                }
                s.step_high = high;
            }
            LineRole::Dir => s.forward = !high,
            LineRole::Enable => s.enabled = !high,
        }
    }
}

impl OutputLine for SimLine {
    fn set_high(&mut self) -> Result<(), BoxError> {
        self.write(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), BoxError> {
        self.write(false);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SimSwitch {
    stage: SimulatedStage,
    at_home: bool,
    normally_open: bool,
}

impl InputLine for SimSwitch {
    fn is_high(&self) -> bool {
        let p = self.stage.position_mm();
        let triggered = if self.at_home {
            p <= 0.0
        } else {
            p >= self.stage.max_travel_mm + SIM_LIMIT_MARGIN_MM
        };
        // pull-up wiring: a triggered NO switch reads low
        triggered ^ self.normally_open
    }
}

/// Noise-free intensity sensor over a `SimulatedStage`.
#[derive(Debug)]
pub struct SimulatedSensor {
    stage: SimulatedStage,
    peak_mm: f64,
    running: bool,
}

impl SimulatedSensor {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn intensity_at(&self, position_mm: f64) -> f64 {
        let z = (position_mm - self.peak_mm) / SIM_WIDTH_MM;
        SIM_PEAK_VOLTS * (-z * z).exp()
    }
}

impl PositionSensor for SimulatedSensor {
    fn start(&mut self) -> Result<(), BoxError> {
        self.running = true;
        tracing::debug!(peak_mm = self.peak_mm, "simulated sensor started");
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn get_value(&self) -> f64 {
        self.intensity_at(self.stage.position_mm())
    }

    fn get_value_mean(&self) -> f64 {
        self.get_value()
    }

    fn set_window_size(&self, _n: usize) {}
}
