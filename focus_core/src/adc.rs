//! Bus-ADC backend for the photodiode front end.
//!
//! One conversion per cycle: write the configuration byte (one-shot,
//! channel, rate), wait the conversion time, read two data bytes plus the
//! status byte and scale the signed code to volts at the board input.

use std::sync::Arc;
use std::time::Duration;

use focus_traits::clock::Clock;
use focus_traits::{BoxError, I2cBus};

use crate::sampler::{SampleReader, SampleSource};

/// Conversion resolution. Higher resolution trades rate for noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bits12,
    Bits14,
    Bits16,
    Bits18,
}

impl Resolution {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            12 => Some(Self::Bits12),
            14 => Some(Self::Bits14),
            16 => Some(Self::Bits16),
            18 => Some(Self::Bits18),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Bits12 => 12,
            Self::Bits14 => 14,
            Self::Bits16 => 16,
            Self::Bits18 => 18,
        }
    }

    /// Sample-rate selection field of the configuration byte.
    pub fn rate_bits(self) -> u8 {
        match self {
            Self::Bits12 => 0,
            Self::Bits14 => 1,
            Self::Bits16 => 2,
            Self::Bits18 => 3,
        }
    }

    /// Conversion time plus 1 ms of margin.
    pub fn settle(self) -> Duration {
        let ms = match self {
            Self::Bits12 => 5,
            Self::Bits14 => 20,
            Self::Bits16 => 70,
            Self::Bits18 => 300,
        };
        Duration::from_millis(ms + 1)
    }

    /// Positive full-scale code.
    pub fn divisor(self) -> f64 {
        f64::from((1u32 << (self.bits() - 1)) - 1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdcCfg {
    pub address: u8,
    pub channel: u8,
    pub resolution: Resolution,
    pub vref: f64,
    /// True input voltage per ADC input volt.
    pub board_scale: f64,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            address: 0x68,
            channel: 0,
            resolution: Resolution::Bits12,
            vref: 2.048,
            board_scale: 5.06 / 2.048,
        }
    }
}

/// Start a one-shot conversion on `channel` at `res`.
#[inline]
pub fn config_byte(channel: u8, res: Resolution) -> u8 {
    0x80 | ((channel & 0x03) << 5) | (res.rate_bits() << 2)
}

/// Sign-extend the big-endian data word from the first two bytes.
#[inline]
pub fn decode_raw(bytes: [u8; 3]) -> i32 {
    i32::from(i16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn raw_to_volts(raw: i32, cfg: &AdcCfg) -> f64 {
    f64::from(raw) / cfg.resolution.divisor() * cfg.vref * cfg.board_scale
}

type BusOpener = Box<dyn Fn() -> Result<Box<dyn I2cBus + Send>, BoxError> + Send + Sync>;

/// Opens the bus on `start()`; the bus is released when sampling stops.
pub struct VoltageSource {
    cfg: AdcCfg,
    open_bus: BusOpener,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl VoltageSource {
    pub fn new<F>(cfg: AdcCfg, open_bus: F, clock: Arc<dyn Clock + Send + Sync>) -> Self
    where
        F: Fn() -> Result<Box<dyn I2cBus + Send>, BoxError> + Send + Sync + 'static,
    {
        Self {
            cfg,
            open_bus: Box::new(open_bus),
            clock,
        }
    }

    pub fn cfg(&self) -> &AdcCfg {
        &self.cfg
    }
}

pub struct VoltageReader {
    cfg: AdcCfg,
    bus: Box<dyn I2cBus + Send>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SampleReader for VoltageReader {
    fn read(&mut self) -> Result<f64, BoxError> {
        let cfg = config_byte(self.cfg.channel, self.cfg.resolution);
        self.bus.write(self.cfg.address, &[cfg])?;
        self.clock.sleep(self.cfg.resolution.settle());
        let mut buf = [0u8; 3];
        self.bus.read(self.cfg.address, &mut buf)?;
        let raw = decode_raw(buf);
        let volts = raw_to_volts(raw, &self.cfg);
        tracing::trace!(raw, volts, "adc sample");
        Ok(volts)
    }
}

impl SampleSource for VoltageSource {
    type Reader = VoltageReader;

    fn open(&self) -> Result<VoltageReader, BoxError> {
        let bus = (self.open_bus)()?;
        tracing::debug!(
            address = self.cfg.address,
            channel = self.cfg.channel,
            bits = self.cfg.resolution.bits(),
            "adc bus opened"
        );
        Ok(VoltageReader {
            cfg: self.cfg,
            bus,
            clock: Arc::clone(&self.clock),
        })
    }
}
