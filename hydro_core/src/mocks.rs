//! Capability mocks for tests and the self-check path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hydro_traits::{Actuator, AnalogSensor, Positioner};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn err(msg: &str) -> BoxError {
    Box::new(std::io::Error::other(msg.to_string()))
}

/// Replays a fixed script of sample outcomes, then repeats the final value.
pub struct ScriptedSensor {
    script: VecDeque<Result<f64, String>>,
    last: f64,
}

impl ScriptedSensor {
    pub fn new(script: Vec<Result<f64, String>>) -> Self {
        Self {
            script: script.into(),
            last: 7.0,
        }
    }

    pub fn from_values(values: &[f64]) -> Self {
        Self::new(values.iter().map(|v| Ok(*v)).collect())
    }
}

impl AnalogSensor for ScriptedSensor {
    fn sample(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        match self.script.pop_front() {
            Some(Ok(v)) => {
                self.last = v;
                Ok(v)
            }
            Some(Err(msg)) => Err(err(&msg)),
            None => Ok(self.last),
        }
    }
}

/// Always fails; for sensor-unavailable paths.
pub struct FailingSensor;

impl AnalogSensor for FailingSensor {
    fn sample(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        Err(err("sensor offline"))
    }
}

/// Shared reservoir value that `TankSensor` reads and `StepActuator`
/// shifts, for closed-loop tests without hardware.
#[derive(Debug, Clone, Default)]
pub struct Tank {
    value: Arc<Mutex<f64>>,
}

impl Tank {
    pub fn new(initial: f64) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self) -> f64 {
        self.value.lock().map(|v| *v).unwrap_or(f64::NAN)
    }

    pub fn set(&self, v: f64) {
        if let Ok(mut g) = self.value.lock() {
            *g = v;
        }
    }
}

/// Reads the shared tank value exactly.
pub struct TankSensor {
    tank: Tank,
}

impl TankSensor {
    pub fn new(tank: Tank) -> Self {
        Self { tank }
    }
}

impl AnalogSensor for TankSensor {
    fn sample(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        Ok(self.tank.get())
    }
}

/// Applies a fixed step to the tank on each deenergize, with a floor and
/// ceiling so exhaustion scenarios can stall short of the band.
pub struct StepActuator {
    tank: Tank,
    step: f64,
    clamp: (f64, f64),
    on: bool,
}

impl StepActuator {
    pub fn new(tank: Tank, step: f64) -> Self {
        Self {
            tank,
            step,
            clamp: (0.0, 14.0),
            on: false,
        }
    }

    pub fn clamped(tank: Tank, step: f64, low: f64, high: f64) -> Self {
        Self {
            tank,
            step,
            clamp: (low, high),
            on: false,
        }
    }
}

impl Actuator for StepActuator {
    fn energize(&mut self) -> Result<(), BoxError> {
        self.on = true;
        Ok(())
    }

    fn deenergize(&mut self) -> Result<(), BoxError> {
        if self.on {
            let next = (self.tank.get() + self.step).clamp(self.clamp.0, self.clamp.1);
            self.tank.set(next);
        }
        self.on = false;
        Ok(())
    }
}

/// Records on/off transitions into a shared log.
pub struct RecordingActuator {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    energized: Arc<AtomicBool>,
}

impl RecordingActuator {
    pub fn new(label: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label,
            log,
            energized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle observing whether the actuator is currently energized.
    pub fn energized_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.energized)
    }

    fn record(&self, state: &str) {
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("{} {}", self.label, state));
        }
    }
}

impl Actuator for RecordingActuator {
    fn energize(&mut self) -> Result<(), BoxError> {
        self.energized.store(true, Ordering::SeqCst);
        self.record("on");
        Ok(())
    }

    fn deenergize(&mut self) -> Result<(), BoxError> {
        self.energized.store(false, Ordering::SeqCst);
        self.record("off");
        Ok(())
    }
}

/// Fails on energize; for fault-path tests.
pub struct FailingActuator;

impl Actuator for FailingActuator {
    fn energize(&mut self) -> Result<(), BoxError> {
        Err(err("relay stuck"))
    }

    fn deenergize(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Positioner that records every commanded angle.
#[derive(Default)]
pub struct RecordingPositioner {
    angles: Arc<Mutex<Vec<f32>>>,
}

impl RecordingPositioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angles_handle(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.angles)
    }
}

impl Positioner for RecordingPositioner {
    fn move_to(&mut self, angle_deg: f32) -> Result<(), BoxError> {
        if let Ok(mut a) = self.angles.lock() {
            a.push(angle_deg);
        }
        Ok(())
    }
}

/// Positioner that ignores all commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPositioner;

impl Positioner for NoopPositioner {
    fn move_to(&mut self, _angle_deg: f32) -> Result<(), BoxError> {
        Ok(())
    }
}
