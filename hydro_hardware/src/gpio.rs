//! Raspberry Pi capability implementations behind the `hardware` feature.

use std::thread;
use std::time::{Duration, Instant};

use hydro_traits::{Actuator, AnalogSensor, Positioner};
use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;

use crate::error::HwError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const ADS1115_ADDR: u16 = 0x48;
const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;
// PGA ±4.096 V full scale.
const FULL_SCALE_VOLTS: f64 = 4.096;
const SUPPLY_VOLTS: f64 = 3.3;

/// Active-high relay on one GPIO output.
pub struct RelayActuator {
    pin: OutputPin,
    label: &'static str,
}

impl RelayActuator {
    pub fn new(bcm_pin: u8, label: &'static str) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        pin.set_low();
        Ok(Self { pin, label })
    }
}

impl Actuator for RelayActuator {
    fn energize(&mut self) -> Result<(), BoxError> {
        tracing::debug!(actuator = self.label, "relay on");
        self.pin.set_high();
        Ok(())
    }

    fn deenergize(&mut self) -> Result<(), BoxError> {
        tracing::debug!(actuator = self.label, "relay off");
        self.pin.set_low();
        Ok(())
    }
}

impl Drop for RelayActuator {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}

/// Hobby servo on software PWM: 20 ms period, 500-2500 us pulse across
/// 0-180 degrees. PWM is stopped after the move to avoid hold jitter.
pub struct ServoPositioner {
    pin: OutputPin,
}

impl ServoPositioner {
    pub fn new(bcm_pin: u8) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        Ok(Self { pin })
    }
}

impl Positioner for ServoPositioner {
    fn move_to(&mut self, angle_deg: f32) -> Result<(), BoxError> {
        let angle = angle_deg.clamp(0.0, 180.0);
        let pulse_us = 500.0 + (angle / 180.0) * 2000.0;
        tracing::debug!(angle, pulse_us, "servo move");
        self.pin
            .set_pwm(
                Duration::from_millis(20),
                Duration::from_micros(pulse_us as u64),
            )
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        // Give the horn time to travel, then drop the signal.
        thread::sleep(Duration::from_millis(400));
        self.pin
            .clear_pwm()
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(())
    }
}

/// pH probe behind one single-ended ADS1115 channel.
///
/// Board maps 3.3 V to pH 0 and 0 V to pH 14, matching the amplifier's
/// inverted output.
pub struct Ads1115Sensor {
    i2c: I2c,
    channel: u8,
}

impl Ads1115Sensor {
    pub fn new(channel: u8) -> Result<Self, HwError> {
        if channel > 3 {
            return Err(HwError::BadChannel(channel));
        }
        let mut i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(ADS1115_ADDR)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self { i2c, channel })
    }

    fn start_conversion(&mut self) -> Result<(), HwError> {
        // OS=1 single shot, MUX=single-ended channel, PGA ±4.096 V,
        // 128 SPS, comparator disabled.
        let msb = 0x83 | ((0x04 | self.channel) << 4);
        let lsb = 0x83;
        self.i2c
            .write(&[REG_CONFIG, msb, lsb])
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(())
    }

    fn conversion_ready(&mut self) -> Result<bool, HwError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(&[REG_CONFIG], &mut buf)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(buf[0] & 0x80 != 0)
    }

    fn read_raw(&mut self) -> Result<i16, HwError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(&[REG_CONVERSION], &mut buf)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(i16::from_be_bytes(buf))
    }
}

impl AnalogSensor for Ads1115Sensor {
    fn sample(&mut self, timeout: Duration) -> Result<f64, BoxError> {
        self.start_conversion()?;
        let deadline = Instant::now() + timeout;
        while !self.conversion_ready()? {
            if Instant::now() >= deadline {
                return Err(HwError::ConversionTimeout.into());
            }
            thread::sleep(Duration::from_millis(1));
        }
        let raw = self.read_raw()?;
        let volts = f64::from(raw.max(0)) * FULL_SCALE_VOLTS / 32768.0;
        let value = 14.0 - volts * 14.0 / SUPPLY_VOLTS;
        tracing::trace!(raw, volts, value, "adc sample");
        Ok(value.clamp(0.0, 14.0))
    }
}
