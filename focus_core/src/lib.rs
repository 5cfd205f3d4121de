#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core focal-length bench logic (hardware-agnostic).
//!
//! All hardware goes through the `focus_traits` seams: `Motion`,
//! `Interlock`, `PositionSensor`, plus `OutputLine`/`InputLine`/`I2cBus`
//! for the drivers implemented here.
//!
//! ## Architecture
//!
//! - **Motion**: step/dir/enable stepper on a lead screw (`actuator`)
//! - **Sensing**: background sampler with a rolling window (`sampler`,
//!   `window`) fed by a bus ADC (`adc`) or a camera blob detector (`camera`)
//! - **Safety**: polarity-corrected endstops (`interlock`)
//! - **Control**: homing, adaptive hill-climb search and thin-lens focal
//!   length (`controller`), assembled by a type-state builder (`builder`)
//! - **Remote**: polled command mailbox and status sink contract (`remote`)
//! - **Orchestration**: one-shot measurement and remote serve loop (`runner`)
//!
//! Positions are millimetres from the home switch, positive away from it.

pub mod actuator;
pub mod adc;
pub mod builder;
pub mod camera;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod interlock;
pub mod mocks;
pub mod remote;
pub mod runner;
pub mod sampler;
pub mod status;
pub mod util;
pub mod window;

pub use actuator::StepperActuator;
pub use builder::{ControllerBuilder, Missing};
pub use config::{ActuatorCfg, SamplerCfg, SearchCfg, StageCfg, StuckReset};
pub use controller::{FocusController, HomeOutcome, SearchOutcome, Termination, focal_length};
pub use error::{AbortReason, BuildError, FocusError, Result};
pub use interlock::Endstop;
pub use remote::{CommandSource, Offline, Remote, RemoteCommand, StatusSink, StatusUpdate};
pub use runner::{MeasureOpts, Measurement, measure, serve};
pub use sampler::{SampleReader, SampleSource, Sampler};
pub use status::Phase;
pub use window::RollingWindow;
