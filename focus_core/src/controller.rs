//! Homing and adaptive peak search.
//!
//! The controller owns the sensor, the motion, both endstops and the
//! remote link, and runs on a single thread. Remote commands are observed
//! by polling between moves, so a `stop` takes effect within one move.

use std::sync::Arc;

use eyre::WrapErr;
use focus_traits::clock::Clock;
use focus_traits::{Direction, Interlock, Motion, PositionSensor};

use crate::config::{SearchCfg, StageCfg, StuckReset};
use crate::error::{AbortReason, FocusError, Result};
use crate::hw_error::map_hw_error;
use crate::remote::{Remote, RemoteCommand, StatusUpdate};
use crate::status::Phase;
use crate::util::PollTimer;

/// Best value before the first reading; any real reading replaces it.
const BEST_SENTINEL: f64 = -1.0;

/// Why the search loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `max_swings` reversals done.
    SwingsExhausted,
    /// Position reached the end of travel.
    TravelEnd,
    /// The next step would have left `[0, max_travel_mm]`.
    Boundary,
    /// The travel-limit switch tripped.
    LimitSwitch,
    /// A remote `stop` was observed.
    Stopped,
    /// The motion was interrupted locally (Ctrl-C).
    Interrupted,
}

impl Termination {
    /// True for terminations that cut the search short.
    pub fn is_abort(self) -> bool {
        matches!(
            self,
            Termination::LimitSwitch | Termination::Stopped | Termination::Interrupted
        )
    }
}

/// Result of one `search_peak()` run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    pub best_position_mm: f64,
    pub best_value: f64,
    pub final_position_mm: f64,
    pub swings: u32,
    pub step_mm: f64,
    pub moves: u32,
    pub termination: Termination,
}

impl SearchOutcome {
    /// `(best_position_mm, best_value)`
    pub fn best(&self) -> (f64, f64) {
        (self.best_position_mm, self.best_value)
    }
}

/// Result of one `home()` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeOutcome {
    Homed,
    Aborted(AbortReason),
}

/// Thin-lens focal length for a lens at `lens_pos_mm` between the laser
/// (`laser_offset_mm` from home) and the sensor (`sensor_offset_mm` past
/// the end of travel).
pub fn focal_length(
    laser_offset_mm: f64,
    sensor_offset_mm: f64,
    max_travel_mm: f64,
    lens_pos_mm: f64,
) -> std::result::Result<f64, FocusError> {
    let d1 = lens_pos_mm - laser_offset_mm;
    let d2 = max_travel_mm - lens_pos_mm + sensor_offset_mm;
    let sum = d1 + d2;
    if sum == 0.0 {
        return Err(FocusError::DegenerateGeometry { d1, d2 });
    }
    let f = d1 * d2 / sum;
    if !f.is_finite() {
        return Err(FocusError::DegenerateGeometry { d1, d2 });
    }
    Ok(f)
}

enum MoveError {
    /// The position has already been advanced by the pulses issued.
    Interrupted,
    Failed(eyre::Report),
}

pub struct FocusController<S: PositionSensor, M: Motion> {
    pub(crate) sensor: S,
    pub(crate) motion: M,
    pub(crate) home_switch: Box<dyn Interlock + Send>,
    pub(crate) limit_switch: Box<dyn Interlock + Send>,
    pub(crate) remote: Box<dyn Remote + Send>,
    pub(crate) stage: StageCfg,
    pub(crate) search: SearchCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) position_mm: f64,
    pub(crate) phase: Phase,
    pub(crate) homed: bool,
}

impl<S: PositionSensor, M: Motion> core::fmt::Debug for FocusController<S, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FocusController")
            .field("position_mm", &self.position_mm)
            .field("phase", &self.phase)
            .field("homed", &self.homed)
            .finish_non_exhaustive()
    }
}

impl<S: PositionSensor, M: Motion> FocusController<S, M> {
    pub fn position_mm(&self) -> f64 {
        self.position_mm
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    pub fn stage(&self) -> &StageCfg {
        &self.stage
    }

    pub fn search_cfg(&self) -> &SearchCfg {
        &self.search
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn motion_mut(&mut self) -> &mut M {
        &mut self.motion
    }

    pub fn home_switch(&self) -> &dyn Interlock {
        self.home_switch.as_ref()
    }

    pub fn limit_switch(&self) -> &dyn Interlock {
        self.limit_switch.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn poll_command(&mut self) -> Option<RemoteCommand> {
        self.remote.poll_command()
    }

    pub fn push_status(&mut self, update: &StatusUpdate) {
        self.remote.push_status(update);
    }

    pub fn start_sensor(&mut self) -> Result<()> {
        self.sensor
            .start()
            .map_err(|e| eyre::Report::new(map_hw_error(e.as_ref())))
            .wrap_err("failed to start position sensor")
    }

    pub fn stop_sensor(&mut self) {
        self.sensor.stop();
    }

    /// Distance covered by `steps` whole pulses in `direction`.
    fn stepped_mm(&self, steps: u64, direction: Direction) -> f64 {
        let spr = f64::from(self.motion.steps_per_rev().max(1));
        direction.sign() * steps as f64 * self.stage.lead_mm / spr
    }

    /// Pulses the driver will issue for a move of `distance_mm`.
    fn pulses_for(&self, distance_mm: f64) -> u64 {
        let spr = f64::from(self.motion.steps_per_rev().max(1));
        (distance_mm.abs() / self.stage.lead_mm * spr).round() as u64
    }

    /// Move by a signed distance and advance the position by the pulses
    /// actually issued, which may differ from `distance_mm` by rounding or
    /// an interruption. The remote sees the live position through the
    /// progress callback.
    fn travel(&mut self, distance_mm: f64, speed_rps: f64) -> std::result::Result<u64, MoveError> {
        let start_mm = self.position_mm;
        let lead_mm = self.stage.lead_mm;
        let direction = Direction::of(distance_mm);
        let remote = &mut self.remote;
        let mut report = |moved_mm: f64| {
            remote.push_status(&StatusUpdate {
                current_pos_mm: Some(start_mm + moved_mm),
                ..StatusUpdate::default()
            });
        };
        let result = self
            .motion
            .move_mm(distance_mm, lead_mm, speed_rps, Some(&mut report));
        match result {
            Ok(steps) => {
                self.position_mm = start_mm + self.stepped_mm(steps, direction);
                Ok(steps)
            }
            Err(e) => match map_hw_error(e.as_ref()) {
                FocusError::Interrupted { steps } => {
                    self.position_mm = start_mm + self.stepped_mm(steps, direction);
                    tracing::warn!(steps, position_mm = self.position_mm, "move interrupted");
                    Err(MoveError::Interrupted)
                }
                other => Err(MoveError::Failed(eyre::Report::new(other))),
            },
        }
    }

    /// Drive towards the home switch until it is pressed.
    ///
    /// The switch is checked before every increment so no move is issued
    /// once it reads pressed. A remote `stop` aborts without zeroing.
    pub fn home(&mut self) -> Result<HomeOutcome> {
        self.phase = Phase::Homing;
        self.push_status(&StatusUpdate {
            is_homing: Some(true),
            clear_command: true,
            ..StatusUpdate::default()
        });
        tracing::info!(increment_mm = self.search.home_increment_mm, "homing start");

        let mut poll = PollTimer::new(self.clock.now(), self.search.poll_interval);
        let mut increments: u64 = 0;
        while !self.home_switch.is_pressed() {
            if poll.due(self.clock.now()) && self.poll_command() == Some(RemoteCommand::Stop) {
                tracing::warn!(increments, "stop command received during homing");
                return Ok(self.abort_homing(AbortReason::StopCommand));
            }
            let step = -self.search.home_increment_mm;
            match self.travel(step, self.search.home_speed_rps) {
                Ok(_) => increments += 1,
                Err(MoveError::Interrupted) => {
                    return Ok(self.abort_homing(AbortReason::Interrupted));
                }
                Err(MoveError::Failed(e)) => {
                    self.mark_homing_aborted();
                    return Err(e.wrap_err("homing move failed"));
                }
            }
        }

        self.position_mm = 0.0;
        self.homed = true;
        self.phase = Phase::Done;
        self.push_status(&StatusUpdate {
            current_pos_mm: Some(0.0),
            is_homing: Some(false),
            ..StatusUpdate::default()
        });
        tracing::info!(increments, "homed");
        Ok(HomeOutcome::Homed)
    }

    fn mark_homing_aborted(&mut self) {
        self.phase = Phase::Aborted;
        self.push_status(&StatusUpdate {
            is_homing: Some(false),
            ..StatusUpdate::default()
        });
    }

    fn abort_homing(&mut self, reason: AbortReason) -> HomeOutcome {
        self.mark_homing_aborted();
        HomeOutcome::Aborted(reason)
    }

    /// Adaptive bidirectional hill climb from the home position.
    ///
    /// Starts forward with the coarse step. Every step that reads more
    /// than `hysteresis` below the best value counts as non-improving;
    /// after `steps_threshold` of them the direction flips and the step
    /// halves, floored at the fine step. Ends after `max_swings` reversals,
    /// at the end of travel, at the limit switch, or on a remote `stop`,
    /// always keeping the best reading seen.
    pub fn search_peak(&mut self) -> Result<SearchOutcome> {
        if !self.homed {
            tracing::warn!("searching without homing; current position taken as 0");
        }
        self.phase = Phase::Searching;

        let cfg = self.search;
        let max_mm = self.stage.max_travel_mm;
        self.position_mm = 0.0;
        let mut direction = Direction::Forward;
        let mut step = cfg.coarse_step_mm;
        let mut best_value = BEST_SENTINEL;
        let mut best_position = 0.0;
        let mut swings: u32 = 0;
        let mut stuck: u32 = 0;
        let mut moves: u32 = 0;
        let mut previous: Option<f64> = None;
        let mut poll = PollTimer::new(self.clock.now(), cfg.poll_interval);

        tracing::info!(
            coarse_step_mm = cfg.coarse_step_mm,
            fine_step_mm = cfg.fine_step_mm,
            max_swings = cfg.max_swings,
            "search start"
        );

        let termination = loop {
            if swings >= cfg.max_swings {
                break Termination::SwingsExhausted;
            }
            if self.position_mm >= max_mm {
                break Termination::TravelEnd;
            }
            // Bounds are checked on the whole-pulse distance actually driven.
            let next = self.position_mm + self.stepped_mm(self.pulses_for(step), direction);
            if next < 0.0 || next > max_mm {
                break Termination::Boundary;
            }

            match self.travel(direction.sign() * step, cfg.scan_speed_rps) {
                Ok(_) => moves += 1,
                Err(MoveError::Interrupted) => break Termination::Interrupted,
                Err(MoveError::Failed(e)) => {
                    self.phase = Phase::Aborted;
                    return Err(e.wrap_err("search move failed"));
                }
            }

            if self.limit_switch.is_pressed() {
                tracing::warn!(position_mm = self.position_mm, "limit switch pressed during scan");
                break Termination::LimitSwitch;
            }

            self.clock.sleep(cfg.read_settle);
            let v = self.sensor.get_value();
            if v > best_value {
                best_value = v;
                best_position = self.position_mm;
            }
            if cfg.stuck_reset == StuckReset::OnLocalImprovement
                && previous.is_some_and(|p| v > p)
            {
                stuck = 0;
            }
            previous = Some(v);
            if best_value - v > cfg.hysteresis {
                stuck += 1;
            }
            tracing::trace!(position_mm = self.position_mm, value = v, stuck, "scan step");

            if stuck >= cfg.steps_threshold {
                stuck = 0;
                direction = direction.flipped();
                swings += 1;
                step = (step / 2.0).max(cfg.fine_step_mm);
                tracing::debug!(step_mm = step, swings, "reversing");
            }

            if poll.due(self.clock.now()) {
                if self.poll_command() == Some(RemoteCommand::Stop) {
                    tracing::warn!("stop command received during search");
                    break Termination::Stopped;
                }
                let update = StatusUpdate {
                    is_running: Some(true),
                    current_pos_mm: Some(self.position_mm),
                    current_voltage: Some(v),
                    best_pos_mm: Some(best_position),
                    best_voltage: Some(best_value),
                    ..StatusUpdate::default()
                };
                self.push_status(&update);
            }
        };

        self.phase = if termination.is_abort() {
            Phase::Aborted
        } else {
            Phase::Done
        };
        let outcome = SearchOutcome {
            best_position_mm: best_position,
            best_value,
            final_position_mm: self.position_mm,
            swings,
            step_mm: step,
            moves,
            termination,
        };
        self.push_status(&StatusUpdate {
            current_pos_mm: Some(self.position_mm),
            best_pos_mm: Some(best_position),
            best_voltage: Some(best_value),
            ..StatusUpdate::default()
        });
        tracing::info!(
            best_position_mm = best_position,
            best_value,
            swings,
            moves,
            ?termination,
            "search finished"
        );
        Ok(outcome)
    }

    /// Focal length for explicit offsets; travel comes from the stage.
    pub fn compute_focal_length(
        &self,
        laser_offset_mm: f64,
        sensor_offset_mm: f64,
        lens_pos_mm: f64,
    ) -> Result<f64> {
        focal_length(
            laser_offset_mm,
            sensor_offset_mm,
            self.stage.max_travel_mm,
            lens_pos_mm,
        )
        .map_err(eyre::Report::new)
    }

    /// Focal length for a lens position using the configured offsets.
    pub fn focal_length_at(&self, lens_pos_mm: f64) -> Result<f64> {
        self.compute_focal_length(
            self.stage.laser_offset_mm,
            self.stage.sensor_offset_mm,
            lens_pos_mm,
        )
    }
}
