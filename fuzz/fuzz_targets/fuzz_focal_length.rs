#![no_main]
use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Debug, arbitrary::Arbitrary)]
struct Geometry {
    laser_offset_mm: f64,
    sensor_offset_mm: f64,
    max_travel_mm: f64,
    lens_pos_mm: f64,
}

fuzz_target!(|g: Geometry| {
    match focus_core::focal_length(
        g.laser_offset_mm,
        g.sensor_offset_mm,
        g.max_travel_mm,
        g.lens_pos_mm,
    ) {
        Ok(f) => assert!(f.is_finite()),
        Err(focus_core::FocusError::DegenerateGeometry { .. }) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
});
