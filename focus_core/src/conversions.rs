//! `From` implementations bridging `focus_config` types to `focus_core` types.

use std::time::Duration;

use crate::adc::{AdcCfg, Resolution};
use crate::camera::BlobCfg;
use crate::config::{ActuatorCfg, SamplerCfg, SearchCfg, StageCfg, StuckReset};

// ── StageCfg ─────────────────────────────────────────────────────────────────

impl From<&focus_config::StageCfg> for StageCfg {
    fn from(c: &focus_config::StageCfg) -> Self {
        Self {
            lead_mm: c.lead_mm,
            max_travel_mm: c.max_travel_mm,
            laser_offset_mm: c.laser_offset_mm,
            sensor_offset_mm: c.sensor_offset_mm,
        }
    }
}

// ── SearchCfg ────────────────────────────────────────────────────────────────

impl From<focus_config::StuckReset> for StuckReset {
    fn from(c: focus_config::StuckReset) -> Self {
        match c {
            focus_config::StuckReset::OnReversal => StuckReset::OnReversal,
            focus_config::StuckReset::OnLocalImprovement => StuckReset::OnLocalImprovement,
        }
    }
}

impl From<&focus_config::SearchCfg> for SearchCfg {
    fn from(c: &focus_config::SearchCfg) -> Self {
        Self {
            coarse_step_mm: c.coarse_step_mm,
            fine_step_mm: c.fine_step_mm,
            max_swings: c.max_swings,
            hysteresis: c.hysteresis,
            steps_threshold: c.steps_threshold,
            scan_speed_rps: c.scan_speed_rps,
            home_increment_mm: c.home_increment_mm,
            home_speed_rps: c.home_speed_rps,
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            read_settle: Duration::from_millis(c.read_settle_ms),
            stuck_reset: c.stuck_reset.into(),
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

/// Built from two sections: step resolution lives under `[stage]`.
impl From<(&focus_config::StageCfg, &focus_config::MotionCfg)> for ActuatorCfg {
    fn from((stage, motion): (&focus_config::StageCfg, &focus_config::MotionCfg)) -> Self {
        Self {
            steps_per_rev: stage.full_steps.saturating_mul(stage.microsteps),
            settle: Duration::from_millis(motion.settle_ms),
            min_edge_delay: Duration::from_micros(motion.min_edge_delay_us),
            progress_interval: Duration::from_millis(motion.progress_interval_ms),
        }
    }
}

// ── Sensor backends ──────────────────────────────────────────────────────────

impl From<&focus_config::SensorCfg> for SamplerCfg {
    fn from(c: &focus_config::SensorCfg) -> Self {
        let (idle_ms, backoff_ms) = match c.backend {
            focus_config::SensorBackend::Voltage => (c.adc.idle_ms, 0),
            focus_config::SensorBackend::Camera => (c.camera.idle_ms, c.camera.backoff_ms),
        };
        Self {
            window: c.window,
            idle: Duration::from_millis(idle_ms),
            backoff: Duration::from_millis(backoff_ms),
            join_timeout: Duration::from_millis(c.join_timeout_ms),
        }
    }
}

impl TryFrom<&focus_config::AdcCfg> for AdcCfg {
    type Error = crate::error::FocusError;

    fn try_from(c: &focus_config::AdcCfg) -> Result<Self, Self::Error> {
        let resolution = Resolution::from_bits(c.resolution_bits).ok_or_else(|| {
            crate::error::FocusError::Config(format!(
                "unsupported ADC resolution: {} bits",
                c.resolution_bits
            ))
        })?;
        Ok(Self {
            address: c.address,
            channel: c.channel,
            resolution,
            vref: c.vref,
            board_scale: c.board_scale,
        })
    }
}

impl From<&focus_config::CameraCfg> for BlobCfg {
    fn from(c: &focus_config::CameraCfg) -> Self {
        Self {
            low_hue_max: c.low_hue_max,
            high_hue_min: c.high_hue_min,
            sat_min: c.sat_min,
            val_min: c.val_min,
            normalize: c.normalize,
            resize_to: c.resize_to,
        }
    }
}
