//! Configuration types for the focus engine.
//!
//! These are the runtime configuration structs used by the controller,
//! actuator and samplers. They are separate from the TOML-deserialized
//! config in `focus_config`.

use std::time::Duration;

/// Stage geometry.
#[derive(Debug, Clone, Copy)]
pub struct StageCfg {
    /// Lead of the threaded rod (mm per revolution).
    pub lead_mm: f64,
    /// Usable travel measured from the home switch.
    pub max_travel_mm: f64,
    /// Laser emitter position relative to home (mm, usually negative).
    pub laser_offset_mm: f64,
    /// Sensor distance beyond the far end of travel (mm).
    pub sensor_offset_mm: f64,
}

impl Default for StageCfg {
    fn default() -> Self {
        Self {
            lead_mm: 8.0,
            max_travel_mm: 280.0,
            laser_offset_mm: -32.0,
            sensor_offset_mm: 135.0,
        }
    }
}

/// When the non-improving step counter is forgiven.
///
/// `OnReversal` is the historical bench behavior. With it, steps counted
/// while drifting away from the peak are still counted after the search
/// turns back and climbs again, so it reverses early and can settle short
/// of a sharp peak. `OnLocalImprovement` forgives them
/// as soon as the signal rises again and is the default for that reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StuckReset {
    /// Only on a direction reversal.
    OnReversal,
    /// On a reversal and whenever a reading exceeds the previous reading.
    #[default]
    OnLocalImprovement,
}

/// Hill-climb and homing parameters.
#[derive(Debug, Clone, Copy)]
pub struct SearchCfg {
    pub coarse_step_mm: f64,
    pub fine_step_mm: f64,
    pub max_swings: u32,
    /// Drop below the best value that marks a step as non-improving.
    pub hysteresis: f64,
    /// Non-improving steps before a reversal.
    pub steps_threshold: u32,
    pub scan_speed_rps: f64,
    pub home_increment_mm: f64,
    pub home_speed_rps: f64,
    /// Minimum wall time between remote polls.
    pub poll_interval: Duration,
    /// Pause between the end of a move and the sensor read.
    pub read_settle: Duration,
    pub stuck_reset: StuckReset,
}

impl Default for SearchCfg {
    fn default() -> Self {
        Self {
            coarse_step_mm: 3.0,
            fine_step_mm: 0.2,
            max_swings: 5,
            hysteresis: 0.05,
            steps_threshold: 5,
            scan_speed_rps: 2.0,
            home_increment_mm: 1.0,
            home_speed_rps: 1.0,
            poll_interval: Duration::from_millis(500),
            read_settle: Duration::from_millis(50),
            stuck_reset: StuckReset::default(),
        }
    }
}

/// Stepper driver timing.
#[derive(Debug, Clone, Copy)]
pub struct ActuatorCfg {
    /// Full steps times microsteps.
    pub steps_per_rev: u32,
    /// Pause after enabling the driver.
    pub settle: Duration,
    /// Floor on the step edge delay.
    pub min_edge_delay: Duration,
    /// Minimum spacing of progress callbacks.
    pub progress_interval: Duration,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            steps_per_rev: 200 * 8,
            settle: Duration::from_millis(50),
            min_edge_delay: Duration::from_micros(2),
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// Background sampling loop timing.
#[derive(Debug, Clone, Copy)]
pub struct SamplerCfg {
    /// Rolling window capacity.
    pub window: usize,
    /// Pause after every cycle.
    pub idle: Duration,
    /// Extra pause after a failed read.
    pub backoff: Duration,
    /// Bound on waiting for the worker in `stop()`.
    pub join_timeout: Duration,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            window: 50,
            idle: Duration::from_millis(10),
            backoff: Duration::ZERO,
            join_timeout: Duration::from_secs(1),
        }
    }
}
