use std::sync::Arc;
use std::time::Duration;

use focus_core::mocks::{MockMotion, PositionFnSensor, PositionSwitch, RecordingRemote, SharedPosition};
use focus_core::{AbortReason, ControllerBuilder, HomeOutcome, Phase, RemoteCommand};
use focus_traits::Interlock;
use focus_traits::clock::ManualClock;
use rstest::rstest;

#[rstest]
#[case(10.3, 11)]
#[case(0.5, 1)]
#[case(0.0, 0)]
#[case(-2.0, 0)]
fn homes_exactly_when_switch_closes(#[case] start_mm: f64, #[case] expected_moves: usize) {
    let pos = SharedPosition::new(start_mm);
    let motion = MockMotion::new(pos.clone());
    let remote = RecordingRemote::scripted(vec![]);
    let updates = remote.updates();
    let home = PositionSwitch::at_or_below(pos.clone(), 0.0);
    let mut ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), |_| 0.0))
        .with_motion(motion.clone())
        .with_home_switch(home.clone())
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), 280.0))
        .with_remote(remote)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("bench");

    assert_eq!(ctrl.home().expect("home"), HomeOutcome::Homed);
    let moves = motion.moves();
    assert_eq!(moves.len(), expected_moves);
    assert!(moves.iter().all(|&d| d == -1.0));
    assert!(home.is_pressed());
    assert!(ctrl.is_homed());
    assert_eq!(ctrl.position_mm(), 0.0);
    assert_eq!(ctrl.phase(), Phase::Done);

    let updates = updates.lock().expect("updates");
    let first = updates.first().expect("start update");
    assert_eq!(first.is_homing, Some(true));
    assert!(first.clear_command);
    let last = updates.last().expect("final update");
    assert_eq!(last.is_homing, Some(false));
    assert_eq!(last.current_pos_mm, Some(0.0));
}

#[test]
fn stop_aborts_homing_without_zeroing() {
    let clock = ManualClock::new();
    let pos = SharedPosition::new(100.0);
    let motion = MockMotion::new(pos.clone()).with_move_time(clock.clone(), Duration::from_millis(200));
    let remote = RecordingRemote::from_fn(|| Some(RemoteCommand::Stop));
    let updates = remote.updates();
    let mut ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), |_| 0.0))
        .with_motion(motion.clone())
        .with_home_switch(PositionSwitch::at_or_below(pos.clone(), 0.0))
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), 280.0))
        .with_remote(remote)
        .with_clock(Arc::new(clock))
        .build()
        .expect("bench");

    let outcome = ctrl.home().expect("home");
    assert_eq!(outcome, HomeOutcome::Aborted(AbortReason::StopCommand));
    // 200 ms per move, polled every 500 ms: the third move crosses the interval
    assert_eq!(motion.move_count(), 3);
    assert_eq!(pos.get(), 97.0);
    assert!(!ctrl.is_homed());
    assert_eq!(ctrl.phase(), Phase::Aborted);
    let last = updates.lock().expect("updates").last().cloned().expect("update");
    assert_eq!(last.is_homing, Some(false));
}

#[test]
fn homing_motion_failure_is_reported() {
    let pos = SharedPosition::new(5.0);
    let motion = MockMotion::new(pos.clone());
    motion.fail_moves(true);
    let mut ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), |_| 0.0))
        .with_motion(motion)
        .with_home_switch(PositionSwitch::at_or_below(pos.clone(), 0.0))
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), 280.0))
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("bench");
    let err = ctrl.home().expect_err("failure");
    assert!(format!("{err:#}").contains("homing move failed"));
    assert_eq!(ctrl.phase(), Phase::Aborted);
}
