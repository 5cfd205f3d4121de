//! Command bodies: measure, home, serve and self-check.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use focus_config::Config;
use focus_core::{
    AbortReason, FocusError, HomeOutcome, MeasureOpts, Measurement, Offline, Termination,
};
use focus_traits::clock::Clock;
use focus_traits::{Interlock, PositionSensor};
use serde_json::json;

use crate::bench::{self, Pacing};
use crate::cli::RtArgs;
use crate::error_fmt::abort_reason_name;
use crate::mailbox::FileMailbox;
use crate::rt::setup_rt_once;

pub const LASER_WARNING: &str = "WARNING: the bench laser is about to be powered. \
Never look into the beam or its reflections; keep the enclosure closed.";

/// Flags raised by Ctrl-C.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    /// Aborts the current move at the next pulse.
    pub interrupt: Arc<AtomicBool>,
    /// Ends the serve loop.
    pub shutdown: Arc<AtomicBool>,
}

fn warn_laser(json: bool) {
    if json {
        tracing::warn!("{LASER_WARNING}");
    } else {
        eprintln!("{LASER_WARNING}");
    }
}

pub fn termination_name(t: Termination) -> &'static str {
    match t {
        Termination::SwingsExhausted => "swings_exhausted",
        Termination::TravelEnd => "travel_end",
        Termination::Boundary => "boundary",
        Termination::LimitSwitch => "limit_switch",
        Termination::Stopped => "stopped",
        Termination::Interrupted => "interrupted",
    }
}

fn abort_of(t: Termination) -> Option<AbortReason> {
    match t {
        Termination::LimitSwitch => Some(AbortReason::LimitSwitch),
        Termination::Stopped => Some(AbortReason::StopCommand),
        Termination::Interrupted => Some(AbortReason::Interrupted),
        Termination::SwingsExhausted | Termination::TravelEnd | Termination::Boundary => None,
    }
}

fn print_measurement(m: &Measurement, json: bool) {
    let s = &m.search;
    if json {
        println!(
            "{}",
            json!({
                "focal_length_mm": m.focal_length_mm,
                "best_position_mm": s.best_position_mm,
                "best_value": s.best_value,
                "final_position_mm": s.final_position_mm,
                "swings": s.swings,
                "moves": s.moves,
                "termination": termination_name(s.termination),
            })
        );
    } else {
        println!("Focal length: {:.3} mm", m.focal_length_mm);
        println!(
            "Best lens position: {:.2} mm (signal {:.4})",
            s.best_position_mm, s.best_value
        );
        println!(
            "Search: {} moves, {} reversals, ended: {}",
            s.moves,
            s.swings,
            termination_name(s.termination)
        );
    }
}

/// Home (unless `no_home`), search and print the result. A search cut
/// short still prints the best reading, then fails with the abort reason.
pub fn measure(cfg: &Config, no_home: bool, rt: RtArgs, signals: &Signals, json: bool) -> eyre::Result<()> {
    setup_rt_once(rt);
    warn_laser(json);
    let mut ctrl = bench::build(cfg, Offline, Arc::clone(&signals.interrupt), Pacing::Virtual)?;
    let m = focus_core::measure(&mut ctrl, MeasureOpts { home_first: !no_home })?;
    print_measurement(&m, json);
    match abort_of(m.search.termination) {
        Some(reason) => Err(eyre::Report::new(FocusError::Aborted(reason))),
        None => Ok(()),
    }
}

pub fn home(cfg: &Config, rt: RtArgs, signals: &Signals, json: bool) -> eyre::Result<()> {
    setup_rt_once(rt);
    warn_laser(json);
    let mut ctrl = bench::build(cfg, Offline, Arc::clone(&signals.interrupt), Pacing::Virtual)?;
    match ctrl.home()? {
        HomeOutcome::Homed => {
            if json {
                println!("{}", json!({ "homed": true, "position_mm": ctrl.position_mm() }));
            } else {
                println!("Homed.");
            }
            Ok(())
        }
        HomeOutcome::Aborted(reason) => Err(eyre::Report::new(FocusError::Aborted(reason))),
    }
}

pub fn serve(
    cfg: &Config,
    mailbox: Option<std::path::PathBuf>,
    rt: RtArgs,
    signals: &Signals,
    json: bool,
) -> eyre::Result<()> {
    setup_rt_once(rt);
    warn_laser(json);
    let mailbox = FileMailbox::new(mailbox.unwrap_or_else(|| cfg.remote.mailbox.clone().into()));
    tracing::info!(mailbox = %mailbox.path().display(), "remote mailbox");
    let mut ctrl = bench::build(
        cfg,
        mailbox,
        Arc::clone(&signals.interrupt),
        Pacing::WallClock,
    )?;
    let completed = focus_core::serve(
        &mut ctrl,
        &signals.shutdown,
        Duration::from_millis(cfg.remote.idle_ms),
    )?;
    if json {
        println!("{}", json!({ "completed": completed }));
    } else {
        println!("Served {completed} measurement(s).");
    }
    Ok(())
}

/// Report endstop states and one sensor reading without moving.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let mut ctrl = bench::build(
        cfg,
        Offline,
        Arc::new(AtomicBool::new(false)),
        Pacing::WallClock,
    )?;
    let home = ctrl.home_switch().is_pressed();
    let limit = ctrl.limit_switch().is_pressed();
    ctrl.start_sensor().wrap_err("sensor check failed")?;
    let idle = match cfg.sensor.backend {
        focus_config::SensorBackend::Voltage => cfg.sensor.adc.idle_ms,
        focus_config::SensorBackend::Camera => cfg.sensor.camera.idle_ms,
    };
    // give the sampler a few cycles to fill
    ctrl.clock().sleep(Duration::from_millis(idle.saturating_mul(5).max(20)));
    let value = ctrl.sensor().get_value();
    let mean = ctrl.sensor().get_value_mean();
    ctrl.stop_sensor();

    let pressed = |p: bool| if p { "pressed" } else { "open" };
    if json {
        println!(
            "{}",
            json!({
                "backend": bench::backend_name(),
                "home_switch": pressed(home),
                "limit_switch": pressed(limit),
                "value": value,
                "value_mean": mean,
                "ok": !limit,
            })
        );
    } else {
        println!("Backend: {}", bench::backend_name());
        println!("Home switch: {}", pressed(home));
        println!("Limit switch: {}", pressed(limit));
        println!("Sensor: {value:.4} (mean {mean:.4})");
    }
    if limit {
        eyre::bail!("limit switch reads pressed at rest; check wiring and normally_open");
    }
    if !json {
        println!("Self-check OK");
    }
    Ok(())
}
