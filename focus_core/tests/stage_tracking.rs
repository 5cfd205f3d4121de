//! Controller position against a pulse-counting simulated stage.

use std::sync::Arc;

use focus_core::{
    ActuatorCfg, ControllerBuilder, Endstop, FocusController, HomeOutcome, SearchCfg, StageCfg,
    StepperActuator,
};
use focus_hardware::{SimulatedSensor, SimulatedStage};
use focus_traits::clock::ManualClock;
use rstest::rstest;

type Bench = FocusController<SimulatedSensor, StepperActuator>;

fn bench(stage: &SimulatedStage, peak_mm: f64, search: SearchCfg) -> Bench {
    let clock = ManualClock::new();
    let actuator = StepperActuator::new(
        Box::new(stage.step_line()),
        Box::new(stage.dir_line()),
        Box::new(stage.enable_line()),
        ActuatorCfg::default(),
        Arc::new(clock.clone()),
    )
    .expect("valid actuator");
    ControllerBuilder::new()
        .with_sensor(stage.sensor(peak_mm))
        .with_motion(actuator)
        .with_home_switch(Endstop::new("home", Box::new(stage.home_input(true)), true))
        .with_limit_switch(Endstop::new("limit", Box::new(stage.limit_input(true)), true))
        .with_stage(StageCfg::default())
        .with_search(search)
        .with_clock(Arc::new(clock))
        .build()
        .expect("valid bench")
}

#[rstest]
#[case(0.2, 5)]
#[case(0.013, 9)]
#[case(0.0625, 7)]
fn search_position_matches_stage(#[case] fine_step_mm: f64, #[case] max_swings: u32) {
    let stage = SimulatedStage::new(8.0, 1600, 280.0, 0.0);
    let search = SearchCfg {
        fine_step_mm,
        max_swings,
        ..SearchCfg::default()
    };
    let mut ctrl = bench(&stage, 104.3, search);
    assert_eq!(ctrl.home().expect("home"), HomeOutcome::Homed);

    let out = ctrl.search_peak().expect("search");
    let drift = (out.final_position_mm - stage.position_mm()).abs();
    assert!(
        drift < 1e-6,
        "controller {} vs stage {}",
        out.final_position_mm,
        stage.position_mm()
    );
    assert!((out.best_position_mm - 104.3).abs() < 0.5, "{}", out.best_position_mm);
}

#[test]
fn homing_from_fractional_start_ends_on_switch() {
    let stage = SimulatedStage::new(8.0, 1600, 280.0, 10.3);
    let mut ctrl = bench(&stage, 150.0, SearchCfg::default());
    assert_eq!(ctrl.home().expect("home"), HomeOutcome::Homed);
    assert_eq!(ctrl.position_mm(), 0.0);
    // the last whole increment overshoots the switch by less than one increment
    assert!((-1.0..=0.0).contains(&stage.position_mm()), "{}", stage.position_mm());
}
