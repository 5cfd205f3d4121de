//! Raspberry Pi lines and I2C bus on top of `rppal`.

use focus_traits::{BoxError, I2cBus, InputLine, OutputLine};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::i2c::I2c;

use crate::error::{HwError, Result};

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

pub struct PiOutput(OutputPin);

impl PiOutput {
    /// Claim `pin` as an output, driven low.
    pub fn open(pin: u8) -> Result<Self> {
        let mut out = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
            .into_output();
        out.set_low();
        Ok(Self(out))
    }
}

impl OutputLine for PiOutput {
    fn set_high(&mut self) -> std::result::Result<(), BoxError> {
        self.0.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> std::result::Result<(), BoxError> {
        self.0.set_low();
        Ok(())
    }
}

pub struct PiInput(InputPin);

impl PiInput {
    /// Claim `pin` as an input with the internal pull-up enabled.
    pub fn open(pin: u8) -> Result<Self> {
        let input = gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
            .into_input_pullup();
        Ok(Self(input))
    }
}

impl InputLine for PiInput {
    fn is_high(&self) -> bool {
        self.0.is_high()
    }
}

/// I2C master; the slave address is set per transfer.
pub struct PiI2c {
    bus: I2c,
    addr: Option<u8>,
}

impl PiI2c {
    pub fn open(bus: u8) -> Result<Self> {
        let bus = I2c::with_bus(bus).map_err(|e| HwError::I2c(format!("bus {bus}: {e}")))?;
        Ok(Self { bus, addr: None })
    }

    fn select(&mut self, addr: u8) -> Result<()> {
        if self.addr != Some(addr) {
            self.bus
                .set_slave_address(u16::from(addr))
                .map_err(|e| HwError::I2c(format!("address {addr:#04x}: {e}")))?;
            self.addr = Some(addr);
        }
        Ok(())
    }
}

impl I2cBus for PiI2c {
    fn write(&mut self, addr: u8, bytes: &[u8]) -> std::result::Result<(), BoxError> {
        self.select(addr)?;
        let n = self.bus.write(bytes).map_err(|e| HwError::I2c(e.to_string()))?;
        if n != bytes.len() {
            return Err(Box::new(HwError::I2c(format!(
                "short write: {n} of {} bytes",
                bytes.len()
            ))));
        }
        Ok(())
    }

    fn read(&mut self, addr: u8, buf: &mut [u8]) -> std::result::Result<(), BoxError> {
        self.select(addr)?;
        let n = self.bus.read(buf).map_err(|e| HwError::I2c(e.to_string()))?;
        if n != buf.len() {
            return Err(Box::new(HwError::I2c(format!(
                "short read: {n} of {} bytes",
                buf.len()
            ))));
        }
        Ok(())
    }
}
