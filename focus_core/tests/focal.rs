use std::sync::Arc;

use focus_core::mocks::{FlagSwitch, MockMotion, PositionFnSensor, SharedPosition};
use focus_core::{BuildError, ControllerBuilder, FocusError, SearchCfg, StageCfg, focal_length};
use focus_traits::clock::ManualClock;
use rstest::rstest;

#[test]
fn reference_geometry() {
    let f = focal_length(-32.0, 135.0, 280.0, 140.0).expect("finite");
    let expected = (172.0 * 275.0) / (172.0 + 275.0);
    assert!((f - expected).abs() < 1e-12, "{f}");
}

#[rstest]
#[case(0.0)]
#[case(100.0)]
#[case(280.0)]
fn focal_length_is_symmetric_in_conjugates(#[case] lens: f64) {
    let d1 = lens + 32.0;
    let d2 = 280.0 - lens + 135.0;
    let f = focal_length(-32.0, 135.0, 280.0, lens).expect("finite");
    assert!((1.0 / f - (1.0 / d1 + 1.0 / d2)).abs() < 1e-12);
}

#[test]
fn degenerate_geometry_is_reported() {
    // d1 + d2 = max - laser + sensor = 280 - 300 + 20 = 0
    let err = focal_length(300.0, 20.0, 280.0, 100.0).expect_err("degenerate");
    assert!(matches!(err, FocusError::DegenerateGeometry { .. }));
}

fn controller(
    stage: StageCfg,
    search: SearchCfg,
) -> focus_core::Result<
    focus_core::FocusController<PositionFnSensor<fn(f64) -> f64>, MockMotion>,
> {
    let pos = SharedPosition::new(0.0);
    ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), (|_| 0.0) as fn(f64) -> f64))
        .with_motion(MockMotion::new(pos))
        .with_home_switch(FlagSwitch::new(true))
        .with_limit_switch(FlagSwitch::new(false))
        .with_stage(stage)
        .with_search(search)
        .with_clock(Arc::new(ManualClock::new()))
        .build()
}

#[test]
fn controller_uses_stage_geometry() {
    let ctrl = controller(StageCfg::default(), SearchCfg::default()).expect("bench");
    let a = ctrl.focal_length_at(140.0).expect("finite");
    let b = ctrl.compute_focal_length(-32.0, 135.0, 140.0).expect("finite");
    assert_eq!(a, b);
    let degenerate = ctrl.compute_focal_length(280.0, 0.0, 10.0);
    let err = degenerate.expect_err("degenerate");
    assert!(matches!(
        err.downcast_ref::<FocusError>(),
        Some(FocusError::DegenerateGeometry { .. })
    ));
}

#[test]
fn missing_home_switch_is_a_build_error() {
    let pos = SharedPosition::new(0.0);
    let err = ControllerBuilder::new()
        .with_sensor(PositionFnSensor::new(pos.clone(), |_| 0.0))
        .with_motion(MockMotion::new(pos))
        .with_limit_switch(FlagSwitch::new(false))
        .build()
        .expect_err("no home switch");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingHomeSwitch)
    ));
}

#[rstest]
#[case(StageCfg { lead_mm: 0.0, ..StageCfg::default() }, SearchCfg::default(), "lead_mm")]
#[case(StageCfg::default(), SearchCfg { fine_step_mm: 4.0, ..SearchCfg::default() }, "fine_step_mm")]
#[case(StageCfg::default(), SearchCfg { max_swings: 0, ..SearchCfg::default() }, "max_swings")]
#[case(StageCfg::default(), SearchCfg { hysteresis: -0.1, ..SearchCfg::default() }, "hysteresis")]
fn invalid_config_is_a_build_error(
    #[case] stage: StageCfg,
    #[case] search: SearchCfg,
    #[case] field: &str,
) {
    let err = controller(stage, search).expect_err("invalid");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains(field), "{msg}"),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}
