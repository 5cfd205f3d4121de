use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use focus_core::mocks::{MockMotion, PositionFnSensor, PositionSwitch, RecordingRemote, SharedPosition};
use focus_core::{
    AbortReason, ControllerBuilder, FocusController, FocusError, MeasureOpts, RemoteCommand,
    SearchCfg, focal_length, measure, serve,
};
use focus_traits::clock::ManualClock;

fn ramp(x: f64) -> f64 {
    1.0 - 0.01 * (x - 120.0).abs()
}

fn bench(
    start_mm: f64,
    remote: RecordingRemote,
    clock: ManualClock,
    search: SearchCfg,
) -> (FocusController<PositionFnSensor<fn(f64) -> f64>, MockMotion>, SharedPosition) {
    let pos = SharedPosition::new(start_mm);
    let motion = MockMotion::new(pos.clone()).with_move_time(clock.clone(), Duration::from_millis(200));
    let ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), ramp as fn(f64) -> f64))
        .with_motion(motion)
        .with_home_switch(PositionSwitch::at_or_below(pos.clone(), 0.0))
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), 280.0))
        .with_remote(remote)
        .with_search(search)
        .with_clock(Arc::new(clock))
        .build()
        .expect("valid bench");
    (ctrl, pos)
}

#[test]
fn measure_homes_searches_and_reports_focal_length() {
    let remote = RecordingRemote::scripted(vec![]);
    let updates = remote.updates();
    let (mut ctrl, _pos) = bench(12.0, remote, ManualClock::new(), SearchCfg::default());

    let m = measure(&mut ctrl, MeasureOpts::default()).expect("measure");
    let expected = focal_length(-32.0, 135.0, 280.0, m.search.best_position_mm).expect("finite");
    assert_eq!(m.focal_length_mm, expected);
    assert!((m.search.best_position_mm - 120.0).abs() <= 0.2);
    assert!(ctrl.is_homed());
    assert!(!ctrl.sensor().is_running());

    let updates = updates.lock().expect("updates");
    assert!(updates.iter().any(|u| u.focal_length == Some(expected)));
    let last = updates.last().expect("idle update");
    assert_eq!(last.is_running, Some(false));
    assert_eq!(last.is_homing, Some(false));
}

#[test]
fn measure_fails_when_homing_is_stopped() {
    let remote = RecordingRemote::from_fn(|| Some(RemoteCommand::Stop));
    let (mut ctrl, pos) = bench(100.0, remote, ManualClock::new(), SearchCfg::default());

    let err = measure(&mut ctrl, MeasureOpts::default()).expect_err("stopped");
    assert!(matches!(
        err.downcast_ref::<FocusError>(),
        Some(FocusError::Aborted(AbortReason::StopCommand))
    ));
    assert!(pos.get() > 0.0);
    assert!(!ctrl.sensor().is_running());
}

#[test]
fn measure_without_homing_searches_from_current_position() {
    let remote = RecordingRemote::scripted(vec![]);
    let (mut ctrl, _pos) = bench(0.0, remote, ManualClock::new(), SearchCfg::default());
    let m = measure(&mut ctrl, MeasureOpts { home_first: false }).expect("measure");
    assert!(!ctrl.is_homed());
    assert!(m.search.moves > 0);
}

#[test]
fn serve_dispatches_commands_until_shutdown() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let polls = Arc::new(AtomicUsize::new(0));
    let script = [
        Some(RemoteCommand::Home),
        None,
        Some(RemoteCommand::Start),
        Some(RemoteCommand::Stop),
    ];
    let remote = {
        let shutdown = Arc::clone(&shutdown);
        let polls = Arc::clone(&polls);
        RecordingRemote::from_fn(move || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            script.get(n).copied().unwrap_or_else(|| {
                shutdown.store(true, Ordering::SeqCst);
                None
            })
        })
    };
    let updates = remote.updates();
    // Keep the in-run polls out of the script.
    let search = SearchCfg {
        poll_interval: Duration::from_secs(3600),
        ..SearchCfg::default()
    };
    let (mut ctrl, _pos) = bench(5.0, remote, ManualClock::new(), search);

    let completed = serve(&mut ctrl, &shutdown, Duration::from_millis(500)).expect("serve");
    assert_eq!(completed, 1);
    assert_eq!(polls.load(Ordering::SeqCst), 5);
    assert!(ctrl.is_homed());
    assert!(!ctrl.sensor().is_running());

    let updates = updates.lock().expect("updates");
    assert!(updates.iter().any(|u| u.focal_length.is_some()));
    assert!(updates.iter().any(|u| u.clear_command && u.is_running == Some(false)));
    let last = updates.last().expect("idle update");
    assert_eq!(last.is_running, Some(false));
}
