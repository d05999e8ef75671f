pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hydro_traits::{Actuator, AnalogSensor, Positioner};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared reservoir state backing the simulated capability set.
#[derive(Debug, Clone)]
pub struct SimulatedTank {
    value: Arc<Mutex<f64>>,
}

impl SimulatedTank {
    pub fn new(initial: f64) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn value(&self) -> f64 {
        self.value.lock().map(|v| *v).unwrap_or(f64::NAN)
    }

    fn shift(&self, delta: f64) {
        if let Ok(mut v) = self.value.lock() {
            *v = (*v + delta).clamp(0.0, 14.0);
        }
    }
}

/// Simulated probe: reads the tank plus a small deterministic dither so
/// stability logic sees realistic sample-to-sample noise.
pub struct SimulatedSensor {
    tank: SimulatedTank,
    lcg: u32,
}

impl SimulatedSensor {
    pub fn new(tank: SimulatedTank) -> Self {
        Self { tank, lcg: 0x2545_f491 }
    }

    fn dither(&mut self) -> f64 {
        self.lcg = self.lcg.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        // Uniform in [-0.05, 0.05], well inside the default 0.3 threshold.
        (f64::from(self.lcg >> 8) / f64::from(1u32 << 24) - 0.5) * 0.1
    }
}

impl AnalogSensor for SimulatedSensor {
    fn sample(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        let v = self.tank.value() + self.dither();
        tracing::trace!(value = v, "simulated sample");
        Ok(v)
    }
}

/// Simulated pump or relay. Each energize/deenergize cycle shifts the tank
/// by `step` (zero for the mix pump).
pub struct SimulatedActuator {
    tank: SimulatedTank,
    label: &'static str,
    step: f64,
    on: bool,
}

impl SimulatedActuator {
    pub fn new(tank: SimulatedTank, label: &'static str, step: f64) -> Self {
        Self {
            tank,
            label,
            step,
            on: false,
        }
    }
}

impl Actuator for SimulatedActuator {
    fn energize(&mut self) -> Result<(), BoxError> {
        tracing::info!(actuator = self.label, "energized (simulated)");
        self.on = true;
        Ok(())
    }

    fn deenergize(&mut self) -> Result<(), BoxError> {
        if self.on {
            self.tank.shift(self.step);
        }
        self.on = false;
        tracing::info!(actuator = self.label, tank = self.tank.value(), "deenergized (simulated)");
        Ok(())
    }
}

/// Simulated servo; remembers the last commanded angle.
#[derive(Debug, Default)]
pub struct SimulatedPositioner {
    angle: f32,
}

impl SimulatedPositioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl Positioner for SimulatedPositioner {
    fn move_to(&mut self, angle_deg: f32) -> Result<(), BoxError> {
        tracing::info!(angle = angle_deg, "servo moved (simulated)");
        self.angle = angle_deg;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn simulated_sensor_tracks_the_tank() {
        let tank = SimulatedTank::new(6.8);
        let mut sensor = SimulatedSensor::new(tank.clone());
        for _ in 0..20 {
            let v = sensor.sample(Duration::from_millis(10)).unwrap();
            assert!((v - 6.8).abs() <= 0.05 + 1e-9);
        }
    }

    #[rstest]
    #[case(0.4, 7.2)]
    #[case(-0.4, 6.4)]
    fn simulated_actuator_steps_on_deenergize(#[case] step: f64, #[case] expected: f64) {
        let tank = SimulatedTank::new(6.8);
        let mut pump = SimulatedActuator::new(tank.clone(), "dose", step);
        pump.energize().unwrap();
        pump.deenergize().unwrap();
        assert!((tank.value() - expected).abs() < 1e-9);
        // Deenergize without a preceding energize must not dose again.
        pump.deenergize().unwrap();
        assert!((tank.value() - expected).abs() < 1e-9);
    }

    #[test]
    fn tank_clamps_to_scale_bounds() {
        let tank = SimulatedTank::new(13.9);
        let mut pump = SimulatedActuator::new(tank.clone(), "dose", 1.0);
        pump.energize().unwrap();
        pump.deenergize().unwrap();
        assert!((tank.value() - 14.0).abs() < 1e-9);
    }
}
