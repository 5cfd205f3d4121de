//! Hardware seams shared by the focus bench crates.
//!
//! Everything that touches a pin, a bus or a sensor goes through one of
//! these traits so the controller can run against real hardware, the
//! simulated stage or a test double.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at trait boundaries; mapped to typed errors by callers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A digital output (step, direction, enable).
pub trait OutputLine {
    fn set_high(&mut self) -> Result<(), BoxError>;
    fn set_low(&mut self) -> Result<(), BoxError>;
}

/// A digital input (endstop switch).
pub trait InputLine {
    fn is_high(&self) -> bool;
}

/// Minimal I2C master used by the ADC backend.
pub trait I2cBus {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BoxError>;
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), BoxError>;
}

/// Travel direction along the stage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// +1, away from the home switch.
    #[default]
    Forward,
    /// -1, towards the home switch.
    Reverse,
}

impl Direction {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }

    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Direction of a signed distance; zero counts as reverse.
    #[inline]
    pub fn of(distance: f64) -> Self {
        if distance > 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

/// Stepper-driven linear motion.
pub trait Motion {
    fn enable(&mut self) -> Result<(), BoxError>;
    fn disable(&mut self) -> Result<(), BoxError>;
    fn set_direction(&mut self, dir: Direction) -> Result<(), BoxError>;
    /// Microsteps per screw revolution; one pulse moves `lead / steps_per_rev`.
    fn steps_per_rev(&self) -> u32;
    /// Blocking move of `distance_mm` (signed). Returns the number of step
    /// pulses issued. `on_progress` receives the distance covered so far.
    fn move_mm(
        &mut self,
        distance_mm: f64,
        lead_mm: f64,
        speed_rps: f64,
        on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<u64, BoxError>;
}

/// A polarity-corrected limit switch.
pub trait Interlock {
    fn is_pressed(&self) -> bool;

    fn is_open(&self) -> bool {
        !self.is_pressed()
    }
}

/// Background-sampled scalar signal with a denoised rolling mean.
pub trait PositionSensor {
    /// Launch sampling. No-op when already running.
    fn start(&mut self) -> Result<(), BoxError>;
    /// Stop sampling and release the hardware handle. No-op when stopped.
    fn stop(&mut self);
    /// Latest sample, 0.0 before the first one.
    fn get_value(&self) -> f64;
    /// Mean of the rolling window, 0.0 when empty.
    fn get_value_mean(&self) -> f64;
    /// Resize the rolling window keeping the newest samples. 0 is ignored.
    fn set_window_size(&self, n: usize);
}

impl<T: OutputLine + ?Sized> OutputLine for Box<T> {
    fn set_high(&mut self) -> Result<(), BoxError> {
        (**self).set_high()
    }
    fn set_low(&mut self) -> Result<(), BoxError> {
        (**self).set_low()
    }
}

impl<T: InputLine + ?Sized> InputLine for Box<T> {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

impl<T: I2cBus + ?Sized> I2cBus for Box<T> {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BoxError> {
        (**self).write(addr, bytes)
    }
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), BoxError> {
        (**self).read(addr, buf)
    }
}

impl<T: Motion + ?Sized> Motion for Box<T> {
    fn enable(&mut self) -> Result<(), BoxError> {
        (**self).enable()
    }
    fn disable(&mut self) -> Result<(), BoxError> {
        (**self).disable()
    }
    fn set_direction(&mut self, dir: Direction) -> Result<(), BoxError> {
        (**self).set_direction(dir)
    }
    fn steps_per_rev(&self) -> u32 {
        (**self).steps_per_rev()
    }
    fn move_mm(
        &mut self,
        distance_mm: f64,
        lead_mm: f64,
        speed_rps: f64,
        on_progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<u64, BoxError> {
        (**self).move_mm(distance_mm, lead_mm, speed_rps, on_progress)
    }
}

impl<T: Interlock + ?Sized> Interlock for Box<T> {
    fn is_pressed(&self) -> bool {
        (**self).is_pressed()
    }
}

impl<T: PositionSensor + ?Sized> PositionSensor for Box<T> {
    fn start(&mut self) -> Result<(), BoxError> {
        (**self).start()
    }
    fn stop(&mut self) {
        (**self).stop();
    }
    fn get_value(&self) -> f64 {
        (**self).get_value()
    }
    fn get_value_mean(&self) -> f64 {
        (**self).get_value_mean()
    }
    fn set_window_size(&self, n: usize) {
        (**self).set_window_size(n);
    }
}
