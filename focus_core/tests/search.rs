//! Peak search behaviour against position-driven mock hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use focus_core::mocks::{MockMotion, PositionFnSensor, PositionSwitch, RecordingRemote, SharedPosition};
use focus_core::{
    ControllerBuilder, FocusController, Phase, RemoteCommand, SearchCfg, StageCfg, StuckReset,
    Termination,
};
use focus_traits::clock::ManualClock;
use proptest::prelude::*;
use rstest::rstest;

type Bench<F> = FocusController<PositionFnSensor<F>, MockMotion>;

fn triangle(peak: f64) -> impl Fn(f64) -> f64 {
    move |x| 1.0 - 0.01 * (x - peak).abs()
}

struct Parts {
    pos: SharedPosition,
    motion: MockMotion,
}

fn bench<F: Fn(f64) -> f64>(
    f: F,
    stage: StageCfg,
    search: SearchCfg,
    remote: RecordingRemote,
    limit_at: f64,
) -> (Bench<F>, Parts) {
    let pos = SharedPosition::new(0.0);
    let motion = MockMotion::new(pos.clone());
    let ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), f))
        .with_motion(motion.clone())
        .with_home_switch(PositionSwitch::at_or_below(pos.clone(), 0.0))
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), limit_at))
        .with_remote(remote)
        .with_stage(stage)
        .with_search(search)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("valid bench");
    (ctrl, Parts { pos, motion })
}

fn visited(moves: &[f64]) -> Vec<f64> {
    moves
        .iter()
        .scan(0.0, |p, d| {
            *p += d;
            Some(*p)
        })
        .collect()
}

#[test]
fn converges_on_triangular_peak() {
    let (mut ctrl, parts) = bench(
        triangle(100.0),
        StageCfg::default(),
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    let out = ctrl.search_peak().expect("search");
    let (best_pos, _) = out.best();
    assert!((99.8..=100.2).contains(&best_pos), "best at {best_pos}");
    assert_eq!(out.termination, Termination::SwingsExhausted);
    assert_eq!(out.swings, 5);
    assert_eq!(out.step_mm, 0.2);
    assert_eq!(ctrl.phase(), Phase::Done);
    assert_eq!(parts.pos.get(), out.final_position_mm);
}

#[test]
fn reversal_only_counter_stops_short_of_peak() {
    let search = SearchCfg {
        stuck_reset: StuckReset::OnReversal,
        ..SearchCfg::default()
    };
    let (mut ctrl, _parts) = bench(
        triangle(100.0),
        StageCfg::default(),
        search,
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    let out = ctrl.search_peak().expect("search");
    assert!((out.best_position_mm - 99.0).abs() < 1e-9, "{}", out.best_position_mm);
}

#[test]
fn default_policy_forgives_on_local_improvement() {
    assert_eq!(SearchCfg::default().stuck_reset, StuckReset::OnLocalImprovement);
}

#[rstest]
#[case(StuckReset::OnLocalImprovement)]
#[case(StuckReset::OnReversal)]
fn best_value_is_max_of_readings_and_positions_stay_in_travel(#[case] policy: StuckReset) {
    let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let peak = triangle(151.1);
    let sensor = move |x: f64| {
        let v = peak(x);
        log.lock().expect("log").push(v);
        v
    };
    let search = SearchCfg {
        stuck_reset: policy,
        ..SearchCfg::default()
    };
    let remote = RecordingRemote::scripted(vec![]);
    let updates = remote.updates();
    let (mut ctrl, parts) = bench(sensor, StageCfg::default(), search, remote, 1000.0);
    let out = ctrl.search_peak().expect("search");

    let values = seen.lock().expect("values").clone();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(out.best_value, max);
    for p in visited(&parts.motion.moves()) {
        assert!((0.0..=280.0).contains(&p), "position {p} out of travel");
    }

    // best values reported during the run never go down
    let bests: Vec<f64> = updates
        .lock()
        .expect("updates")
        .iter()
        .filter_map(|u| u.best_voltage)
        .collect();
    assert!(!bests.is_empty());
    assert!(bests.windows(2).all(|w| w[1] >= w[0]));
}

#[test]
fn stop_command_returns_within_one_move() {
    let pos = SharedPosition::new(0.0);
    let motion = MockMotion::new(pos.clone());
    let counted = motion.clone();
    let stopped_after = Arc::new(AtomicUsize::new(0));
    let mark = Arc::clone(&stopped_after);
    let remote = RecordingRemote::from_fn(move || {
        let n = counted.move_count();
        if n >= 25 {
            let _ = mark.compare_exchange(0, n, Ordering::SeqCst, Ordering::SeqCst);
            Some(RemoteCommand::Stop)
        } else {
            None
        }
    });
    let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let peak = triangle(100.0);
    let mut ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), move |x: f64| {
            let v = peak(x);
            log.lock().expect("log").push(v);
            v
        }))
        .with_motion(motion.clone())
        .with_home_switch(PositionSwitch::at_or_below(pos.clone(), 0.0))
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), 1000.0))
        .with_remote(remote)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("bench");

    let out = ctrl.search_peak().expect("search");
    assert_eq!(out.termination, Termination::Stopped);
    let at_stop = stopped_after.load(Ordering::SeqCst);
    assert!(at_stop >= 25);
    assert_eq!(motion.move_count(), at_stop, "no move after the stop was seen");
    let max = seen
        .lock()
        .expect("values")
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(out.best_value, max);
    assert_eq!(ctrl.phase(), Phase::Aborted);
}

#[test]
fn limit_switch_ends_search_and_keeps_best() {
    let (mut ctrl, _parts) = bench(
        triangle(100.0),
        StageCfg::default(),
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        50.0,
    );
    let out = ctrl.search_peak().expect("search");
    assert_eq!(out.termination, Termination::LimitSwitch);
    assert_eq!(out.final_position_mm, 51.0);
    assert_eq!(out.best_position_mm, 48.0);
    assert_eq!(ctrl.phase(), Phase::Aborted);
}

#[test]
fn rising_signal_runs_to_end_of_travel() {
    let stage = StageCfg {
        max_travel_mm: 30.0,
        ..StageCfg::default()
    };
    let (mut ctrl, _parts) = bench(
        |x| x,
        stage,
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    let out = ctrl.search_peak().expect("search");
    assert_eq!(out.termination, Termination::TravelEnd);
    assert_eq!(out.best(), (30.0, 30.0));
}

#[test]
fn rising_signal_stops_before_leaving_travel() {
    let stage = StageCfg {
        max_travel_mm: 31.0,
        ..StageCfg::default()
    };
    let (mut ctrl, _parts) = bench(
        |x| x,
        stage,
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    let out = ctrl.search_peak().expect("search");
    assert_eq!(out.termination, Termination::Boundary);
    assert_eq!(out.final_position_mm, 30.0);
}

#[test]
fn falling_signal_returns_home_and_stops_at_zero() {
    let (mut ctrl, _parts) = bench(
        |x| -x,
        StageCfg::default(),
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    let out = ctrl.search_peak().expect("search");
    assert_eq!(out.termination, Termination::Boundary);
    assert_eq!(out.best_position_mm, 0.0);
    assert_eq!(out.final_position_mm, 0.0);
}

#[test]
fn interrupted_motion_ends_search_gracefully() {
    let (mut ctrl, parts) = bench(
        triangle(100.0),
        StageCfg::default(),
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    parts.motion.interrupt_moves(true);
    let out = ctrl.search_peak().expect("graceful");
    assert_eq!(out.termination, Termination::Interrupted);
    assert_eq!(out.moves, 0);
    assert_eq!(out.best_value, -1.0);
}

#[test]
fn interrupt_mid_move_keeps_pulses_already_issued() {
    let (mut ctrl, parts) = bench(
        triangle(100.0),
        StageCfg::default(),
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    // 100 of the 600 pulses of the first coarse step
    parts.motion.interrupt_after(100);
    let out = ctrl.search_peak().expect("graceful");
    assert_eq!(out.termination, Termination::Interrupted);
    assert_eq!(out.final_position_mm, 0.5);
    assert_eq!(parts.pos.get(), 0.5);
    assert_eq!(ctrl.position_mm(), 0.5);
    assert_eq!(ctrl.phase(), Phase::Aborted);
}

#[test]
fn position_follows_whole_pulses_for_uneven_steps() {
    // 0.013 mm is 1.625 pulses at 8 mm / 1000 steps and rounds to 2
    let search = SearchCfg {
        fine_step_mm: 0.013,
        max_swings: 9,
        ..SearchCfg::default()
    };
    let pos = SharedPosition::new(0.0);
    let motion = MockMotion::new(pos.clone()).with_steps_per_rev(1000);
    let mut ctrl = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), triangle(104.3)))
        .with_motion(motion)
        .with_home_switch(PositionSwitch::at_or_below(pos.clone(), 0.0))
        .with_limit_switch(PositionSwitch::at_or_above(pos.clone(), 1000.0))
        .with_search(search)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
        .expect("valid bench");
    let out = ctrl.search_peak().expect("search");
    assert_eq!(out.step_mm, 0.013);
    assert_eq!(out.final_position_mm, pos.get());
    // every position lies on the pulse grid
    let pulses = out.best_position_mm / 0.008;
    assert!((pulses - pulses.round()).abs() < 1e-6, "{pulses}");
}

#[test]
fn motion_failure_is_an_error() {
    let (mut ctrl, parts) = bench(
        triangle(100.0),
        StageCfg::default(),
        SearchCfg::default(),
        RecordingRemote::scripted(vec![]),
        1000.0,
    );
    parts.motion.fail_moves(true);
    let err = ctrl.search_peak().expect_err("hardware failure");
    assert!(format!("{err:#}").contains("search move failed"));
    assert_eq!(ctrl.phase(), Phase::Aborted);
}

#[test]
fn progress_is_published_at_poll_interval() {
    let remote = RecordingRemote::scripted(vec![]);
    let updates = remote.updates();
    let search = SearchCfg {
        poll_interval: Duration::from_millis(500),
        read_settle: Duration::from_millis(50),
        ..SearchCfg::default()
    };
    let (mut ctrl, _parts) = bench(triangle(100.0), StageCfg::default(), search, remote, 1000.0);
    let out = ctrl.search_peak().expect("search");
    let running = updates
        .lock()
        .expect("updates")
        .iter()
        .filter(|u| u.is_running == Some(true))
        .count();
    // one poll per ten 50 ms settles
    assert_eq!(running as u32, out.moves / 10);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn finds_any_interior_peak(peak in 20.0f64..260.0) {
        let (mut ctrl, parts) = bench(
            triangle(peak),
            StageCfg::default(),
            SearchCfg::default(),
            RecordingRemote::scripted(vec![]),
            1000.0,
        );
        let out = ctrl.search_peak().expect("search");
        prop_assert!((out.best_position_mm - peak).abs() <= 0.2,
            "peak {} found at {}", peak, out.best_position_mm);
        for p in visited(&parts.motion.moves()) {
            prop_assert!((0.0..=280.0).contains(&p));
        }
    }
}
