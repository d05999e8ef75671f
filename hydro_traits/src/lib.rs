pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// A scalar analog input (e.g., a pH probe behind an ADC channel).
pub trait AnalogSensor {
    fn sample(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;
}

/// A binary actuator (dosing pump, circulation pump, relay).
/// Timed activation is the caller's job; implementations only switch state.
pub trait Actuator {
    fn energize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn deenergize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A position actuator (servo) that moves to an absolute angle in degrees.
pub trait Positioner {
    fn move_to(&mut self, angle_deg: f32)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: AnalogSensor + ?Sized> AnalogSensor for Box<T> {
    fn sample(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        (**self).sample(timeout)
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn energize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).energize()
    }
    fn deenergize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).deenergize()
    }
}

impl<T: Positioner + ?Sized> Positioner for Box<T> {
    fn move_to(
        &mut self,
        angle_deg: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).move_to(angle_deg)
    }
}
