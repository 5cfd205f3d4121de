//! Measurement orchestration: a one-shot run and the remote-driven loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use focus_traits::{Motion, PositionSensor};

use crate::controller::{FocusController, HomeOutcome, SearchOutcome};
use crate::error::{FocusError, Result};
use crate::remote::{RemoteCommand, StatusUpdate};

#[derive(Debug, Clone, Copy)]
pub struct MeasureOpts {
    /// Home before searching. Skipping assumes the stage already sits at 0.
    pub home_first: bool,
}

impl Default for MeasureOpts {
    fn default() -> Self {
        Self { home_first: true }
    }
}

/// Outcome of a completed measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub search: SearchOutcome,
    pub focal_length_mm: f64,
}

fn idle_update() -> StatusUpdate {
    StatusUpdate {
        is_running: Some(false),
        is_homing: Some(false),
        ..StatusUpdate::default()
    }
}

fn run_measurement<S, M>(ctrl: &mut FocusController<S, M>, opts: MeasureOpts) -> Result<Measurement>
where
    S: PositionSensor,
    M: Motion,
{
    if opts.home_first {
        if let HomeOutcome::Aborted(reason) = ctrl.home()? {
            return Err(eyre::Report::new(FocusError::Aborted(reason)));
        }
    }
    ctrl.push_status(&StatusUpdate {
        is_running: Some(true),
        clear_command: true,
        ..StatusUpdate::default()
    });
    let search = ctrl.search_peak()?;
    let focal_length_mm = ctrl.focal_length_at(search.best_position_mm)?;
    ctrl.push_status(&StatusUpdate {
        best_pos_mm: Some(search.best_position_mm),
        best_voltage: Some(search.best_value),
        focal_length: Some(focal_length_mm),
        ..StatusUpdate::default()
    });
    tracing::info!(
        best_position_mm = search.best_position_mm,
        best_value = search.best_value,
        focal_length_mm,
        "measurement complete"
    );
    Ok(Measurement {
        search,
        focal_length_mm,
    })
}

/// Home (optionally), search and compute the focal length.
///
/// The sensor runs for the duration of the call and the remote is told
/// the bench is idle afterwards, whatever the result.
pub fn measure<S, M>(ctrl: &mut FocusController<S, M>, opts: MeasureOpts) -> Result<Measurement>
where
    S: PositionSensor,
    M: Motion,
{
    ctrl.start_sensor()?;
    let result = run_measurement(ctrl, opts);
    ctrl.stop_sensor();
    ctrl.push_status(&idle_update());
    if let Err(e) = &result {
        tracing::error!(error = %e, "measurement failed");
    }
    result
}

/// Serve remote commands until `shutdown` is set.
///
/// - `home`: home the stage.
/// - `start`: home, then search and publish the result.
/// - `stop`: report idle and clear the command.
///
/// Failures of a single command are logged and reported as idle; the loop
/// keeps serving. Returns the number of completed measurements.
pub fn serve<S, M>(
    ctrl: &mut FocusController<S, M>,
    shutdown: &AtomicBool,
    idle: Duration,
) -> Result<u64>
where
    S: PositionSensor,
    M: Motion,
{
    ctrl.start_sensor()?;
    let clock = std::sync::Arc::clone(ctrl.clock());
    let mut completed: u64 = 0;
    tracing::info!(idle_ms = idle.as_millis() as u64, "serving remote commands");

    while !shutdown.load(Ordering::Relaxed) {
        match ctrl.poll_command() {
            Some(RemoteCommand::Home) => {
                tracing::info!("remote: home");
                if let Err(e) = ctrl.home() {
                    tracing::error!(error = %e, "homing failed");
                    ctrl.push_status(&idle_update());
                }
            }
            Some(RemoteCommand::Start) => {
                tracing::info!("remote: start");
                match run_measurement(ctrl, MeasureOpts { home_first: true }) {
                    Ok(_) => completed += 1,
                    Err(e) => tracing::error!(error = %e, "measurement failed"),
                }
                ctrl.push_status(&idle_update());
            }
            Some(RemoteCommand::Stop) => {
                tracing::info!("remote: stop");
                ctrl.push_status(&StatusUpdate {
                    clear_command: true,
                    ..idle_update()
                });
            }
            None => {}
        }
        clock.sleep(idle);
    }

    ctrl.stop_sensor();
    ctrl.push_status(&idle_update());
    tracing::info!(completed, "serve loop stopped");
    Ok(completed)
}
