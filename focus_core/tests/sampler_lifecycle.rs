//! Background sampler lifecycle: start/stop idempotence, handle release,
//! transient failures and window behaviour.

use std::sync::Arc;
use std::time::{Duration, Instant};

use focus_core::SamplerCfg;
use focus_core::mocks::CountingSource;
use focus_core::sampler::Sampler;
use focus_traits::PositionSensor;
use focus_traits::clock::MonotonicClock;

fn cfg(window: usize) -> SamplerCfg {
    SamplerCfg {
        window,
        idle: Duration::from_millis(1),
        backoff: Duration::ZERO,
        join_timeout: Duration::from_secs(2),
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

#[test]
fn reads_zero_before_first_sample() {
    let sampler = Sampler::new(
        CountingSource::new(|n| n as f64),
        cfg(4),
        Arc::new(MonotonicClock::new()),
    );
    assert_eq!(sampler.get_value(), 0.0);
    assert_eq!(sampler.get_value_mean(), 0.0);
}

#[test]
fn start_is_idempotent_and_stop_releases_handle() {
    let source = CountingSource::new(|n| n as f64);
    let mut sampler = Sampler::new(source.clone(), cfg(4), Arc::new(MonotonicClock::new()));

    sampler.start().expect("start");
    sampler.start().expect("second start is a no-op");
    assert_eq!(source.opened(), 1);
    assert!(wait_until(|| sampler.get_value() > 0.0));

    sampler.stop();
    sampler.stop();
    assert!(!sampler.is_running());
    assert_eq!(source.released(), 1);

    // Value survives stop; restart opens a fresh handle.
    assert!(sampler.get_value() > 0.0);
    sampler.start().expect("restart");
    assert_eq!(source.opened(), 2);
    drop(sampler);
    assert_eq!(source.released(), 2);
}

#[test]
fn open_failure_surfaces_and_leaves_sampler_stopped() {
    let source = CountingSource::new(|_| 1.0).failing_open();
    let mut sampler = Sampler::new(source.clone(), cfg(4), Arc::new(MonotonicClock::new()));
    assert!(sampler.start().is_err());
    assert!(!sampler.is_running());
    assert_eq!(source.opened(), 0);
}

#[test]
fn failed_reads_keep_last_good_value() {
    // every second read fails; good reads produce odd counters
    let source = CountingSource::new(|n| n as f64).failing_every(2);
    let mut sampler = Sampler::new(source, cfg(8), Arc::new(MonotonicClock::new()));
    sampler.start().expect("start");
    assert!(wait_until(|| sampler.get_value() >= 9.0));
    sampler.stop();
    let v = sampler.get_value();
    assert_eq!(v % 2.0, 1.0, "latest value must come from a good read");
}

#[test]
fn window_mean_and_resize() {
    let source = CountingSource::new(|_| 2.5);
    let mut sampler = Sampler::new(source, cfg(10), Arc::new(MonotonicClock::new()));
    sampler.start().expect("start");
    assert!(wait_until(|| sampler.window_len() == 10));
    sampler.stop();

    assert_eq!(sampler.get_value_mean(), 2.5);
    sampler.set_window_size(0);
    assert_eq!(sampler.window_len(), 10);
    sampler.set_window_size(3);
    assert_eq!(sampler.window_len(), 3);
    assert_eq!(sampler.get_value_mean(), 2.5);
}

#[test]
fn many_samplers_dont_leak_threads() {
    let source = CountingSource::new(|n| n as f64);
    for _ in 0..10 {
        let mut sampler = Sampler::new(source.clone(), cfg(4), Arc::new(MonotonicClock::new()));
        sampler.start().expect("start");
        std::thread::sleep(Duration::from_millis(3));
        drop(sampler);
    }
    assert_eq!(source.opened(), 10);
    assert_eq!(source.released(), 10);
}
