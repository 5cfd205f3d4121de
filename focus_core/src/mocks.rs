//! Test and helper mocks for focus_core.
//!
//! All handles are `Clone` and share state through `Arc`, so a test can
//! keep one copy for inspection after moving another into the controller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use focus_traits::clock::{Clock, ManualClock};
use focus_traits::{BoxError, Direction, InputLine, Interlock, Motion, OutputLine, PositionSensor};

use crate::error::FocusError;
use crate::remote::{CommandSource, RemoteCommand, StatusSink, StatusUpdate};
use crate::sampler::{SampleReader, SampleSource};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Stage position shared between a mock motion and position-driven mocks.
#[derive(Debug, Clone, Default)]
pub struct SharedPosition(Arc<Mutex<f64>>);

impl SharedPosition {
    pub fn new(mm: f64) -> Self {
        Self(Arc::new(Mutex::new(mm)))
    }

    pub fn get(&self) -> f64 {
        *lock(&self.0)
    }

    pub fn set(&self, mm: f64) {
        *lock(&self.0) = mm;
    }
}

/// Motion that teleports a `SharedPosition` and records every move.
#[derive(Debug, Clone)]
pub struct MockMotion {
    pos: SharedPosition,
    steps_per_rev: u32,
    moves: Arc<Mutex<Vec<f64>>>,
    fail: Arc<AtomicBool>,
    interrupt: Arc<AtomicBool>,
    interrupt_after: Arc<Mutex<Option<u64>>>,
    move_time: Option<(ManualClock, Duration)>,
}

impl MockMotion {
    pub fn new(pos: SharedPosition) -> Self {
        Self {
            pos,
            steps_per_rev: 1600,
            moves: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
            interrupt: Arc::new(AtomicBool::new(false)),
            interrupt_after: Arc::new(Mutex::new(None)),
            move_time: None,
        }
    }

    /// Advance `clock` by `per_move` on every move, as a real pulse train would.
    pub fn with_move_time(mut self, clock: ManualClock, per_move: Duration) -> Self {
        self.move_time = Some((clock, per_move));
        self
    }

    /// Signed distances of all moves so far.
    pub fn moves(&self) -> Vec<f64> {
        lock(&self.moves).clone()
    }

    pub fn move_count(&self) -> usize {
        lock(&self.moves).len()
    }

    /// Make the next moves fail with a hardware error.
    pub fn fail_moves(&self, on: bool) {
        self.fail.store(on, Ordering::Relaxed);
    }

    pub fn with_steps_per_rev(mut self, steps_per_rev: u32) -> Self {
        self.steps_per_rev = steps_per_rev;
        self
    }

    /// Make the next moves report an interruption before the first pulse.
    pub fn interrupt_moves(&self, on: bool) {
        self.interrupt.store(on, Ordering::Relaxed);
    }

    /// Interrupt the next move once `steps` pulses have moved the stage.
    pub fn interrupt_after(&self, steps: u64) {
        *lock(&self.interrupt_after) = Some(steps);
    }
}

impl Motion for MockMotion {
    fn enable(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn set_direction(&mut self, _dir: Direction) -> Result<(), BoxError> {
        Ok(())
    }

    fn steps_per_rev(&self) -> u32 {
        self.steps_per_rev
    }

    fn move_mm(
        &mut self,
        distance_mm: f64,
        lead_mm: f64,
        _speed_rps: f64,
        on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<u64, BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("mock motion failure")));
        }
        if self.interrupt.load(Ordering::Relaxed) {
            return Err(Box::new(FocusError::Interrupted { steps: 0 }));
        }
        if lead_mm <= 0.0 {
            return Ok(0);
        }
        // Whole pulses only, like the real driver.
        let spr = f64::from(self.steps_per_rev);
        let total = (distance_mm.abs() / lead_mm * spr).round() as u64;
        let stepped = |steps: u64| distance_mm.signum() * steps as f64 * lead_mm / spr;
        if let Some(n) = lock(&self.interrupt_after).take() {
            let steps = n.min(total);
            self.pos.set(self.pos.get() + stepped(steps));
            lock(&self.moves).push(distance_mm);
            return Err(Box::new(FocusError::Interrupted { steps }));
        }
        if let Some((clock, per_move)) = &self.move_time {
            clock.sleep(*per_move);
        }
        let moved_mm = stepped(total);
        self.pos.set(self.pos.get() + moved_mm);
        lock(&self.moves).push(distance_mm);
        if let Some(cb) = on_progress {
            cb(moved_mm);
        }
        Ok(total)
    }
}

/// Sensor whose reading is a function of the shared stage position.
pub struct PositionFnSensor<F> {
    pos: SharedPosition,
    f: F,
    running: bool,
}

impl<F: Fn(f64) -> f64> PositionFnSensor<F> {
    pub fn new(pos: SharedPosition, f: F) -> Self {
        Self {
            pos,
            f,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl<F: Fn(f64) -> f64> PositionSensor for PositionFnSensor<F> {
    fn start(&mut self) -> Result<(), BoxError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn get_value(&self) -> f64 {
        (self.f)(self.pos.get())
    }

    fn get_value_mean(&self) -> f64 {
        self.get_value()
    }

    fn set_window_size(&self, _n: usize) {}
}

/// Interlock pressed when the shared position crosses a threshold.
#[derive(Debug, Clone)]
pub struct PositionSwitch {
    pos: SharedPosition,
    threshold_mm: f64,
    at_or_above: bool,
}

impl PositionSwitch {
    /// Home-style switch: pressed at or below `threshold_mm`.
    pub fn at_or_below(pos: SharedPosition, threshold_mm: f64) -> Self {
        Self {
            pos,
            threshold_mm,
            at_or_above: false,
        }
    }

    /// Limit-style switch: pressed at or above `threshold_mm`.
    pub fn at_or_above(pos: SharedPosition, threshold_mm: f64) -> Self {
        Self {
            pos,
            threshold_mm,
            at_or_above: true,
        }
    }
}

impl Interlock for PositionSwitch {
    fn is_pressed(&self) -> bool {
        let p = self.pos.get();
        if self.at_or_above {
            p >= self.threshold_mm
        } else {
            p <= self.threshold_mm
        }
    }
}

/// Interlock driven directly by a flag.
#[derive(Debug, Clone, Default)]
pub struct FlagSwitch(Arc<AtomicBool>);

impl FlagSwitch {
    pub fn new(pressed: bool) -> Self {
        Self(Arc::new(AtomicBool::new(pressed)))
    }

    pub fn set(&self, pressed: bool) {
        self.0.store(pressed, Ordering::Relaxed);
    }
}

impl Interlock for FlagSwitch {
    fn is_pressed(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Input line driven by a flag.
#[derive(Debug, Clone, Default)]
pub struct FlagInput(Arc<AtomicBool>);

impl FlagInput {
    pub fn new(high: bool) -> Self {
        Self(Arc::new(AtomicBool::new(high)))
    }

    pub fn set(&self, high: bool) {
        self.0.store(high, Ordering::Relaxed);
    }
}

impl InputLine for FlagInput {
    fn is_high(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Output line that records every level written (true = high).
#[derive(Debug, Clone, Default)]
pub struct RecordingLine {
    levels: Arc<Mutex<Vec<bool>>>,
    fail_high_after: Arc<Mutex<Option<usize>>>,
}

impl RecordingLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        lock(&self.levels).clone()
    }

    pub fn last(&self) -> Option<bool> {
        lock(&self.levels).last().copied()
    }

    /// Number of low-to-high transitions written.
    pub fn rising_edges(&self) -> usize {
        let levels = lock(&self.levels);
        let mut prev = false;
        let mut n = 0;
        for &l in levels.iter() {
            if l && !prev {
                n += 1;
            }
            prev = l;
        }
        n
    }

    /// Fail `set_high` once `n` high writes have succeeded.
    pub fn fail_high_after(&self, n: usize) {
        *lock(&self.fail_high_after) = Some(n);
    }

    fn write(&self, level: bool) -> Result<(), BoxError> {
        let mut levels = lock(&self.levels);
        if level {
            if let Some(n) = *lock(&self.fail_high_after) {
                if levels.iter().filter(|&&l| l).count() >= n {
                    return Err(Box::new(std::io::Error::other("line write failed")));
                }
            }
        }
        levels.push(level);
        Ok(())
    }
}

impl OutputLine for RecordingLine {
    fn set_high(&mut self) -> Result<(), BoxError> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), BoxError> {
        self.write(false)
    }
}

type CommandFn = Box<dyn FnMut() -> Option<RemoteCommand> + Send>;

/// Remote with a scripted command stream that records every status push.
pub struct RecordingRemote {
    next: CommandFn,
    updates: Arc<Mutex<Vec<StatusUpdate>>>,
}

impl RecordingRemote {
    /// Replay `script` one entry per poll, then report no command.
    pub fn scripted(script: Vec<Option<RemoteCommand>>) -> Self {
        let mut queue: VecDeque<_> = script.into();
        Self::from_fn(move || queue.pop_front().flatten())
    }

    pub fn from_fn(f: impl FnMut() -> Option<RemoteCommand> + Send + 'static) -> Self {
        Self {
            next: Box::new(f),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle on the recorded updates.
    pub fn updates(&self) -> Arc<Mutex<Vec<StatusUpdate>>> {
        Arc::clone(&self.updates)
    }
}

impl CommandSource for RecordingRemote {
    fn poll_command(&mut self) -> Option<RemoteCommand> {
        (self.next)()
    }
}

impl StatusSink for RecordingRemote {
    fn push_status(&mut self, update: &StatusUpdate) {
        lock(&self.updates).push(update.clone());
    }
}

/// Sample source producing `f(n)` for the n-th read of each reader, with
/// every `fail_every`-th read failing. Counts opened and released readers.
#[derive(Clone)]
pub struct CountingSource {
    f: Arc<dyn Fn(u64) -> f64 + Send + Sync>,
    fail_every: u64,
    fail_open: bool,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(f: impl Fn(u64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            f: Arc::new(f),
            fail_every: 0,
            fail_open: false,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_every(mut self, k: u64) -> Self {
        self.fail_every = k;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub struct CountingReader {
    f: Arc<dyn Fn(u64) -> f64 + Send + Sync>,
    fail_every: u64,
    n: u64,
    released: Arc<AtomicUsize>,
}

impl SampleReader for CountingReader {
    fn read(&mut self) -> Result<f64, BoxError> {
        self.n += 1;
        if self.fail_every > 0 && self.n % self.fail_every == 0 {
            return Err(Box::new(std::io::Error::other("transient read failure")));
        }
        Ok((self.f)(self.n))
    }
}

impl Drop for CountingReader {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl SampleSource for CountingSource {
    type Reader = CountingReader;

    fn open(&self) -> Result<CountingReader, BoxError> {
        if self.fail_open {
            return Err(Box::new(std::io::Error::other("device not found")));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(CountingReader {
            f: Arc::clone(&self.f),
            fail_every: self.fail_every,
            n: 0,
            released: Arc::clone(&self.released),
        })
    }
}
