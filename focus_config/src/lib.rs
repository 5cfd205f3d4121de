#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the focal-length bench.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` has defaults matching the bench as built,
//!   so a config file only needs to list what differs.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub motor_step: u8,
    pub motor_dir: u8,
    pub motor_en: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StageCfg {
    /// Lead of the threaded rod (mm per revolution)
    pub lead_mm: f64,
    /// Usable travel from the home switch (mm)
    pub max_travel_mm: f64,
    /// Laser position relative to the home switch (mm)
    pub laser_offset_mm: f64,
    /// Sensor distance beyond the end of travel (mm)
    pub sensor_offset_mm: f64,
    pub full_steps: u32,
    pub microsteps: u32,
}

impl Default for StageCfg {
    fn default() -> Self {
        Self {
            lead_mm: 8.0,
            max_travel_mm: 280.0,
            laser_offset_mm: -32.0,
            sensor_offset_mm: 135.0,
            full_steps: 200,
            microsteps: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MotionCfg {
    /// Pause after enabling the driver before the first pulse
    pub settle_ms: u64,
    /// Lower bound on the step edge delay (driver limit)
    pub min_edge_delay_us: u64,
    /// Minimum spacing between progress callbacks
    pub progress_interval_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            settle_ms: 50,
            min_edge_delay_us: 2,
            progress_interval_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StuckReset {
    /// Forgive non-improving steps only when the direction flips.
    OnReversal,
    /// Also forgive them when a reading climbs above the previous one.
    #[default]
    OnLocalImprovement,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchCfg {
    pub coarse_step_mm: f64,
    pub fine_step_mm: f64,
    pub max_swings: u32,
    /// Drop below the best reading that counts a step as non-improving
    pub hysteresis: f64,
    /// Non-improving steps before reversing
    pub steps_threshold: u32,
    pub scan_speed_rps: f64,
    pub home_increment_mm: f64,
    pub home_speed_rps: f64,
    /// Remote command poll interval
    pub poll_interval_ms: u64,
    /// Pause between a move and the sensor read
    pub read_settle_ms: u64,
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
            poll_interval_ms: 500,
            read_settle_ms: 50,
            stuck_reset: StuckReset::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    #[default]
    Voltage,
    Camera,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdcCfg {
    /// I2C bus number (/dev/i2c-N)
    pub bus: u8,
    pub address: u8,
    pub channel: u8,
    /// 12, 14, 16 or 18
    pub resolution_bits: u8,
    pub vref: f64,
    /// Divider ratio of the front-end board (true input / ADC input)
    pub board_scale: f64,
    pub idle_ms: u64,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x68,
            channel: 0,
            resolution_bits: 12,
            vref: 2.048,
            board_scale: 5.06 / 2.048,
            idle_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CameraCfg {
    /// Image file refreshed by the capture tool
    pub frame_path: String,
    pub sat_min: u8,
    pub val_min: u8,
    /// Upper bound of the low red hue range (0..=low_hue_max)
    pub low_hue_max: u8,
    /// Lower bound of the high red hue range (high_hue_min..=179)
    pub high_hue_min: u8,
    /// Report the blob as a fraction of the frame instead of a pixel count
    pub normalize: bool,
    pub resize_to: Option<(u32, u32)>,
    pub idle_ms: u64,
    pub backoff_ms: u64,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            frame_path: "/run/focus/frame.png".to_string(),
            sat_min: 100,
            val_min: 60,
            low_hue_max: 10,
            high_hue_min: 160,
            normalize: true,
            resize_to: None,
            idle_ms: 10,
            backoff_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    pub backend: SensorBackend,
    /// Rolling mean window (samples)
    pub window: usize,
    /// Bound on waiting for the sampling thread in stop()
    pub join_timeout_ms: u64,
    pub adc: AdcCfg,
    pub camera: CameraCfg,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            backend: SensorBackend::Voltage,
            window: 50,
            join_timeout_ms: 1000,
            adc: AdcCfg::default(),
            camera: CameraCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct EndstopCfg {
    pub pin: u8,
    /// Normally-open switch to ground with pull-up: low level means pressed
    #[serde(default = "default_true")]
    pub normally_open: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Endstops {
    /// Far end of travel
    pub limit: EndstopCfg,
    pub home: EndstopCfg,
}

impl Default for Endstops {
    fn default() -> Self {
        Self {
            limit: EndstopCfg {
                pin: 14,
                normally_open: true,
            },
            home: EndstopCfg {
                pin: 15,
                normally_open: true,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteCfg {
    /// JSON state file shared with the web front end
    pub mailbox: String,
    /// Idle period between mailbox polls in serve mode
    pub idle_ms: u64,
}

impl Default for RemoteCfg {
    fn default() -> Self {
        Self {
            mailbox: "/run/focus/state.json".to_string(),
            idle_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub stage: StageCfg,
    #[serde(default)]
    pub motion: MotionCfg,
    #[serde(default)]
    pub search: SearchCfg,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub endstops: Endstops,
    #[serde(default)]
    pub remote: RemoteCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {:?}: {}", path, e))
}

fn positive_finite(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stage
        if !positive_finite(self.stage.lead_mm) {
            eyre::bail!("stage.lead_mm must be > 0");
        }
        if !positive_finite(self.stage.max_travel_mm) {
            eyre::bail!("stage.max_travel_mm must be > 0");
        }
        if !self.stage.laser_offset_mm.is_finite() || !self.stage.sensor_offset_mm.is_finite() {
            eyre::bail!("stage offsets must be finite");
        }
        if self.stage.full_steps == 0 || self.stage.microsteps == 0 {
            eyre::bail!("stage.full_steps and stage.microsteps must be >= 1");
        }

        // Motion
        if self.motion.progress_interval_ms == 0 {
            eyre::bail!("motion.progress_interval_ms must be >= 1");
        }
        if self.motion.settle_ms > 10_000 {
            eyre::bail!("motion.settle_ms is unreasonably large (>10s)");
        }

        // Search
        let s = &self.search;
        if !positive_finite(s.fine_step_mm) {
            eyre::bail!("search.fine_step_mm must be > 0");
        }
        if !positive_finite(s.coarse_step_mm) {
            eyre::bail!("search.coarse_step_mm must be > 0");
        }
        if s.fine_step_mm > s.coarse_step_mm {
            eyre::bail!("search.fine_step_mm must be <= search.coarse_step_mm");
        }
        if s.coarse_step_mm > self.stage.max_travel_mm {
            eyre::bail!("search.coarse_step_mm must not exceed stage.max_travel_mm");
        }
        if s.max_swings == 0 {
            eyre::bail!("search.max_swings must be >= 1");
        }
        if !s.hysteresis.is_finite() || s.hysteresis < 0.0 {
            eyre::bail!("search.hysteresis must be >= 0");
        }
        if s.steps_threshold == 0 {
            eyre::bail!("search.steps_threshold must be >= 1");
        }
        if !positive_finite(s.scan_speed_rps) || !positive_finite(s.home_speed_rps) {
            eyre::bail!("search speeds must be > 0");
        }
        if !positive_finite(s.home_increment_mm) {
            eyre::bail!("search.home_increment_mm must be > 0");
        }
        if s.poll_interval_ms == 0 {
            eyre::bail!("search.poll_interval_ms must be >= 1");
        }

        // Sensor
        if self.sensor.window == 0 {
            eyre::bail!("sensor.window must be >= 1");
        }
        if self.sensor.join_timeout_ms == 0 {
            eyre::bail!("sensor.join_timeout_ms must be >= 1");
        }
        let adc = &self.sensor.adc;
        if !matches!(adc.resolution_bits, 12 | 14 | 16 | 18) {
            eyre::bail!("sensor.adc.resolution_bits must be one of 12, 14, 16, 18");
        }
        if adc.channel > 3 {
            eyre::bail!("sensor.adc.channel must be in 0..=3");
        }
        if adc.address > 0x7f {
            eyre::bail!("sensor.adc.address must be a 7-bit address");
        }
        if !positive_finite(adc.vref) || !positive_finite(adc.board_scale) {
            eyre::bail!("sensor.adc.vref and sensor.adc.board_scale must be > 0");
        }
        let cam = &self.sensor.camera;
        if cam.low_hue_max > 179 || cam.high_hue_min > 179 {
            eyre::bail!("sensor.camera hue bounds must be in 0..=179");
        }
        if matches!(cam.resize_to, Some((0, _)) | Some((_, 0))) {
            eyre::bail!("sensor.camera.resize_to must have non-zero dimensions");
        }

        // Endstops
        if self.endstops.home.pin == self.endstops.limit.pin {
            eyre::bail!("endstops.home and endstops.limit must use different pins");
        }

        // Remote
        if self.remote.idle_ms == 0 {
            eyre::bail!("remote.idle_ms must be >= 1");
        }

        Ok(())
    }
}
