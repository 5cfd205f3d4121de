//! Type-state builder for `FocusController`.
//!
//! Sensor and motion are type parameters, so `build()` only exists once
//! both are provided. Endstops and configuration are checked at build
//! time and reported as `BuildError`.

use std::sync::Arc;

use focus_traits::clock::{Clock, MonotonicClock};
use focus_traits::{Interlock, Motion, PositionSensor};

use crate::config::{SearchCfg, StageCfg};
use crate::controller::FocusController;
use crate::error::{BuildError, Result};
use crate::remote::{Offline, Remote};
use crate::status::Phase;

/// Placeholder for a slot that has not been filled yet.
pub struct Missing;

pub struct ControllerBuilder<S, M> {
    sensor: S,
    motion: M,
    home_switch: Option<Box<dyn Interlock + Send>>,
    limit_switch: Option<Box<dyn Interlock + Send>>,
    remote: Option<Box<dyn Remote + Send>>,
    stage: StageCfg,
    search: SearchCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: Missing,
            motion: Missing,
            home_switch: None,
            limit_switch: None,
            remote: None,
            stage: StageCfg::default(),
            search: SearchCfg::default(),
            clock: None,
        }
    }
}

impl ControllerBuilder<Missing, Missing> {
    /// Start building a controller.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S, M> ControllerBuilder<S, M> {
    pub fn with_sensor<S2: PositionSensor>(self, sensor: S2) -> ControllerBuilder<S2, M> {
        ControllerBuilder {
            sensor,
            motion: self.motion,
            home_switch: self.home_switch,
            limit_switch: self.limit_switch,
            remote: self.remote,
            stage: self.stage,
            search: self.search,
            clock: self.clock,
        }
    }

    pub fn with_motion<M2: Motion>(self, motion: M2) -> ControllerBuilder<S, M2> {
        ControllerBuilder {
            sensor: self.sensor,
            motion,
            home_switch: self.home_switch,
            limit_switch: self.limit_switch,
            remote: self.remote,
            stage: self.stage,
            search: self.search,
            clock: self.clock,
        }
    }

    pub fn with_home_switch(mut self, sw: impl Interlock + Send + 'static) -> Self {
        self.home_switch = Some(Box::new(sw));
        self
    }

    pub fn with_limit_switch(mut self, sw: impl Interlock + Send + 'static) -> Self {
        self.limit_switch = Some(Box::new(sw));
        self
    }

    /// Remote link; defaults to `Offline`.
    pub fn with_remote(mut self, remote: impl Remote + Send + 'static) -> Self {
        self.remote = Some(Box::new(remote));
        self
    }

    pub fn with_stage(mut self, stage: StageCfg) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_search(mut self, search: SearchCfg) -> Self {
        self.search = search;
        self
    }

    /// Clock for settle pauses and poll pacing; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<S: PositionSensor, M: Motion> ControllerBuilder<S, M> {
    pub fn build(self) -> Result<FocusController<S, M>> {
        let home_switch = self
            .home_switch
            .ok_or_else(|| eyre::Report::new(BuildError::MissingHomeSwitch))?;
        let limit_switch = self
            .limit_switch
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLimitSwitch))?;
        validate(&self.stage, &self.search)?;

        Ok(FocusController {
            sensor: self.sensor,
            motion: self.motion,
            home_switch,
            limit_switch,
            remote: self.remote.unwrap_or_else(|| Box::new(Offline)),
            stage: self.stage,
            search: self.search,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            position_mm: 0.0,
            phase: Phase::Idle,
            homed: false,
        })
    }
}

fn invalid(msg: &'static str) -> Result<()> {
    Err(eyre::Report::new(BuildError::InvalidConfig(msg)))
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn validate(stage: &StageCfg, search: &SearchCfg) -> Result<()> {
    if !positive(stage.lead_mm) {
        return invalid("lead_mm must be > 0");
    }
    if !positive(stage.max_travel_mm) {
        return invalid("max_travel_mm must be > 0");
    }
    if !stage.laser_offset_mm.is_finite() || !stage.sensor_offset_mm.is_finite() {
        return invalid("stage offsets must be finite");
    }
    if !positive(search.fine_step_mm) || !positive(search.coarse_step_mm) {
        return invalid("step sizes must be > 0");
    }
    if search.fine_step_mm > search.coarse_step_mm {
        return invalid("fine_step_mm must be <= coarse_step_mm");
    }
    if search.max_swings == 0 {
        return invalid("max_swings must be >= 1");
    }
    if search.steps_threshold == 0 {
        return invalid("steps_threshold must be >= 1");
    }
    if !search.hysteresis.is_finite() || search.hysteresis < 0.0 {
        return invalid("hysteresis must be >= 0");
    }
    if !positive(search.scan_speed_rps) || !positive(search.home_speed_rps) {
        return invalid("speeds must be > 0");
    }
    if !positive(search.home_increment_mm) {
        return invalid("home_increment_mm must be > 0");
    }
    if search.poll_interval.is_zero() {
        return invalid("poll_interval must be > 0");
    }
    Ok(())
}
