//! Bench assembly: lines, endstops, sensor and clocks wired into a
//! controller, either on the Pi (`hardware` feature) or on the simulated
//! stage.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use focus_config::Config;
use focus_core::{ActuatorCfg, ControllerBuilder, Endstop, FocusController, Remote, StepperActuator};
use focus_traits::clock::Clock;
use focus_traits::{InputLine, OutputLine, PositionSensor};

pub type Controller = FocusController<Box<dyn PositionSensor + Send>, StepperActuator>;

type Line = Box<dyn OutputLine + Send>;
type Input = Box<dyn InputLine + Send>;

/// How the controller's own waits (settle, poll pacing) are timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One-shot commands: the simulated stage runs in virtual time.
    Virtual,
    /// Long-running loops that wait on a remote: always wall-clock time.
    WallClock,
}

struct Parts {
    step: Line,
    dir: Line,
    enable: Line,
    home: Input,
    limit: Input,
    sensor: Box<dyn PositionSensor + Send>,
    motion_clock: Arc<dyn Clock + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
}

/// Short label of the backend this binary drives.
pub fn backend_name() -> &'static str {
    if cfg!(all(feature = "hardware", target_os = "linux")) {
        "hardware"
    } else {
        "sim"
    }
}

pub fn build(
    cfg: &Config,
    remote: impl Remote + Send + 'static,
    interrupt: Arc<AtomicBool>,
    pacing: Pacing,
) -> eyre::Result<Controller> {
    let parts = parts(cfg, pacing)
        .wrap_err_with(|| format!("failed to assemble {} bench", backend_name()))?;
    let actuator = StepperActuator::new(
        parts.step,
        parts.dir,
        parts.enable,
        ActuatorCfg::from((&cfg.stage, &cfg.motion)),
        parts.motion_clock,
    )?
    .with_interrupt(interrupt);
    let home = Endstop::new("home", parts.home, cfg.endstops.home.normally_open);
    let limit = Endstop::new("limit", parts.limit, cfg.endstops.limit.normally_open);
    tracing::debug!(home = %home.describe(), limit = %limit.describe(), "endstops");

    ControllerBuilder::new()
        .with_sensor(parts.sensor)
        .with_motion(actuator)
        .with_home_switch(home)
        .with_limit_switch(limit)
        .with_remote(remote)
        .with_stage((&cfg.stage).into())
        .with_search((&cfg.search).into())
        .with_clock(parts.clock)
        .build()
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn parts(cfg: &Config, pacing: Pacing) -> eyre::Result<Parts> {
    sim::parts(cfg, pacing)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn parts(cfg: &Config, _pacing: Pacing) -> eyre::Result<Parts> {
    pi::parts(cfg)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
mod sim {
    use std::sync::Arc;

    use focus_config::Config;
    use focus_core::{SampleReader, SampleSource, Sampler, SamplerCfg};
    use focus_hardware::{SimulatedSensor, SimulatedStage};
    use focus_traits::clock::{Clock, ManualClock, MonotonicClock};
    use focus_traits::{BoxError, PositionSensor};

    use super::{Pacing, Parts};

    pub const PEAK_ENV: &str = "FOCUS_SIM_PEAK_MM";
    pub const START_ENV: &str = "FOCUS_SIM_START_MM";
    const DEFAULT_PEAK_MM: f64 = 150.0;
    const DEFAULT_START_MM: f64 = 25.0;

    /// Gaussian spot of the simulated stage, read through the background
    /// sampler like the ADC and camera backends.
    struct SimSource {
        stage: SimulatedStage,
        peak_mm: f64,
    }

    struct SimReader(SimulatedSensor);

    impl SampleReader for SimReader {
        fn read(&mut self) -> Result<f64, BoxError> {
            Ok(self.0.get_value())
        }
    }

    impl SampleSource for SimSource {
        type Reader = SimReader;

        fn open(&self) -> Result<SimReader, BoxError> {
            Ok(SimReader(self.stage.sensor(self.peak_mm)))
        }
    }

    fn env_mm(key: &str, default: f64) -> f64 {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    pub(super) fn parts(cfg: &Config, pacing: Pacing) -> eyre::Result<Parts> {
        let peak_mm = env_mm(PEAK_ENV, DEFAULT_PEAK_MM);
        let start_mm = env_mm(START_ENV, DEFAULT_START_MM);
        let stage = SimulatedStage::new(
            cfg.stage.lead_mm,
            cfg.stage.full_steps * cfg.stage.microsteps,
            cfg.stage.max_travel_mm,
            start_mm,
        );
        tracing::info!(
            peak_mm,
            start_mm,
            backend = ?cfg.sensor.backend,
            "using simulated stage"
        );

        let motion_clock: Arc<dyn Clock + Send + Sync> = Arc::new(ManualClock::new());
        type Sensor = Box<dyn PositionSensor + Send>;
        let (clock, sensor): (Arc<dyn Clock + Send + Sync>, Sensor) = match pacing {
            // Virtual-time moves finish before a sampler thread could see
            // them, so one-shot commands read the spot directly.
            Pacing::Virtual => (Arc::clone(&motion_clock), Box::new(stage.sensor(peak_mm))),
            Pacing::WallClock => {
                let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
                let source = SimSource {
                    stage: stage.clone(),
                    peak_mm,
                };
                let sampler = Sampler::new(source, SamplerCfg::from(&cfg.sensor), Arc::clone(&clock));
                (clock, Box::new(sampler))
            }
        };
        Ok(Parts {
            step: Box::new(stage.step_line()),
            dir: Box::new(stage.dir_line()),
            enable: Box::new(stage.enable_line()),
            home: Box::new(stage.home_input(cfg.endstops.home.normally_open)),
            limit: Box::new(stage.limit_input(cfg.endstops.limit.normally_open)),
            sensor,
            motion_clock,
            clock,
        })
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod pi {
    use std::sync::Arc;
    use std::time::Duration;

    use eyre::WrapErr;
    use focus_config::{Config, SensorBackend};
    use focus_core::adc::{AdcCfg, VoltageSource};
    use focus_core::camera::{BlobCfg, CameraSource, FrameGrabber, RgbImage};
    use focus_core::{SamplerCfg, Sampler};
    use focus_hardware::FileFrameGrabber;
    use focus_hardware::gpio::{PiI2c, PiInput, PiOutput};
    use focus_hardware::PrecisionClock;
    use focus_traits::clock::{Clock, MonotonicClock};
    use focus_traits::{BoxError, I2cBus, PositionSensor};

    use super::Parts;

    const FIRST_FRAME_WAIT: Duration = Duration::from_secs(2);

    struct FileFrames(FileFrameGrabber);

    impl FrameGrabber for FileFrames {
        fn grab(&mut self) -> Result<RgbImage, BoxError> {
            Ok(self.0.grab()?)
        }
    }

    pub(super) fn parts(cfg: &Config) -> eyre::Result<Parts> {
        let motion_clock: Arc<dyn Clock + Send + Sync> = Arc::new(PrecisionClock::default());
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());

        let step = PiOutput::open(cfg.pins.motor_step).wrap_err("open motor pins")?;
        let dir = PiOutput::open(cfg.pins.motor_dir).wrap_err("open motor pins")?;
        let mut enable = PiOutput::open(cfg.pins.motor_en).wrap_err("open motor pins")?;
        // driver off until the first move
        focus_traits::OutputLine::set_high(&mut enable)
            .map_err(|e| eyre::eyre!("disable driver: {e}"))?;
        let home = PiInput::open(cfg.endstops.home.pin).wrap_err("open endstop pins")?;
        let limit = PiInput::open(cfg.endstops.limit.pin).wrap_err("open endstop pins")?;

        let sampler_cfg = SamplerCfg::from(&cfg.sensor);
        let sensor: Box<dyn PositionSensor + Send> = match cfg.sensor.backend {
            SensorBackend::Voltage => {
                let adc = AdcCfg::try_from(&cfg.sensor.adc)?;
                let bus = cfg.sensor.adc.bus;
                let source = VoltageSource::new(
                    adc,
                    move || -> Result<Box<dyn I2cBus + Send>, BoxError> {
                        Ok(Box::new(PiI2c::open(bus)?))
                    },
                    Arc::clone(&clock),
                );
                Box::new(Sampler::new(source, sampler_cfg, Arc::clone(&clock)))
            }
            SensorBackend::Camera => {
                let path = cfg.sensor.camera.frame_path.clone();
                let source = CameraSource::new(
                    BlobCfg::from(&cfg.sensor.camera),
                    move || -> Result<FileFrames, BoxError> {
                        Ok(FileFrames(FileFrameGrabber::open(&path, FIRST_FRAME_WAIT)?))
                    },
                );
                Box::new(Sampler::new(source, sampler_cfg, Arc::clone(&clock)))
            }
        };

        Ok(Parts {
            step: Box::new(step),
            dir: Box::new(dir),
            enable: Box::new(enable),
            home: Box::new(home),
            limit: Box::new(limit),
            sensor,
            motion_clock,
            clock,
        })
    }
}
