//! Bounded dose-mix-recheck correction loop.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use hydro_traits::{Actuator, AnalogSensor, Clock, Positioner};
use tracing::{info, warn};

use crate::arbiter::ResourceArbiter;
use crate::error::{ControlError, Result};
use crate::reader::{Reading, StableReader};
use crate::util::sleep_interruptible;

/// Dosing direction, chosen once per correction call from the initial
/// reading and never alternated within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Raise,
    Lower,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raise => f.write_str("raise"),
            Self::Lower => f.write_str("lower"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CorrectorCfg {
    pub band_low: f64,
    pub band_high: f64,
    pub max_attempts: u32,
    pub dose: Duration,
    pub mix: Duration,
    pub settle: Duration,
    pub recheck_primary: Duration,
    pub recheck_retry: Duration,
}

/// Terminal state of one correction call. Exhaustion is an outcome, not an
/// error; only shutdown aborts with an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionOutcome {
    /// The value entered the band. `attempts = 0` means it already was
    /// in band and nothing was dosed.
    Converged { attempts: u32 },
    Exhausted {
        attempts: u32,
        last_reading: f64,
        /// Populated when an actuator or sensor fault cut the sequence short.
        fault: Option<String>,
    },
}

/// Runs bounded corrections against a shared mix pump.
///
/// Owns the reader and all three actuators so hardware access stays on one
/// thread; the mix lease only guards against other arbiter clients.
pub struct BoundedCorrector<S: AnalogSensor, P: Positioner> {
    reader: StableReader<S, P>,
    dose_up: Box<dyn Actuator + Send>,
    dose_down: Box<dyn Actuator + Send>,
    mixer: Box<dyn Actuator + Send>,
    arbiter: ResourceArbiter,
    cfg: CorrectorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
}

impl<S: AnalogSensor, P: Positioner> BoundedCorrector<S, P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: StableReader<S, P>,
        dose_up: Box<dyn Actuator + Send>,
        dose_down: Box<dyn Actuator + Send>,
        mixer: Box<dyn Actuator + Send>,
        arbiter: ResourceArbiter,
        cfg: CorrectorCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            reader,
            dose_up,
            dose_down,
            mixer,
            arbiter,
            cfg,
            clock,
            shutdown,
        }
    }

    pub fn in_band(&self, value: f64) -> bool {
        (self.cfg.band_low..=self.cfg.band_high).contains(&value)
    }

    /// Acquire a reading through the owned reader.
    pub fn acquire(&mut self, primary: Duration, retry: Duration) -> Result<Reading> {
        self.reader.acquire(primary, retry)
    }

    /// Move the probe servo (remote override).
    pub fn position_probe(&mut self, angle: f32) -> Result<()> {
        self.reader.position_probe(angle)
    }

    /// Replace the mix and settle durations for subsequent cycles.
    pub fn set_timing(&mut self, mix: Duration, settle: Duration) {
        info!(mix_ms = mix.as_millis() as u64, settle_ms = settle.as_millis() as u64,
            "mix/settle timing updated");
        self.cfg.mix = mix;
        self.cfg.settle = settle;
    }

    /// Drive the value toward the band, at most `max_attempts` dose cycles.
    ///
    /// A degraded (unstable) re-measurement still consumes an attempt.
    /// Faults abort the sequence and land in `Exhausted::fault`; only
    /// shutdown surfaces as `Err`.
    pub fn correct(&mut self, initial: Reading) -> Result<CorrectionOutcome> {
        if self.in_band(initial.value) {
            return Ok(CorrectionOutcome::Converged { attempts: 0 });
        }
        let direction = if initial.value < self.cfg.band_low {
            Direction::Raise
        } else {
            Direction::Lower
        };
        info!(value = initial.value, %direction, stable = initial.stable, "starting correction");

        let mut last = initial.value;
        for attempt in 1..=self.cfg.max_attempts {
            match self.dose_and_mix(direction, self.cfg.dose) {
                Ok(()) => {}
                Err(ControlError::Shutdown) => return Err(ControlError::Shutdown.into()),
                Err(fault) => {
                    warn!(attempt, error = %fault, "correction aborted by fault");
                    return Ok(CorrectionOutcome::Exhausted {
                        attempts: attempt,
                        last_reading: last,
                        fault: Some(fault.to_string()),
                    });
                }
            }

            if sleep_interruptible(&*self.clock, self.cfg.settle, &self.shutdown) {
                return Err(ControlError::Shutdown.into());
            }

            match self
                .reader
                .acquire(self.cfg.recheck_primary, self.cfg.recheck_retry)
            {
                Ok(r) => {
                    info!(attempt, value = r.value, stable = r.stable, "re-check complete");
                    last = r.value;
                    if self.in_band(r.value) {
                        return Ok(CorrectionOutcome::Converged { attempts: attempt });
                    }
                }
                Err(report) => {
                    if matches!(
                        report.downcast_ref::<ControlError>(),
                        Some(ControlError::Shutdown)
                    ) {
                        return Err(report);
                    }
                    warn!(attempt, error = %report, "re-check failed, aborting correction");
                    return Ok(CorrectionOutcome::Exhausted {
                        attempts: attempt,
                        last_reading: last,
                        fault: Some(report.to_string()),
                    });
                }
            }
        }

        Ok(CorrectionOutcome::Exhausted {
            attempts: self.cfg.max_attempts,
            last_reading: last,
            fault: None,
        })
    }

    /// Single dose + mix under a fresh lease, bypassing the convergence
    /// loop. Used for remote adjust commands.
    pub fn one_shot(&mut self, direction: Direction, dose: Option<Duration>) -> Result<()> {
        let dose = dose.unwrap_or(self.cfg.dose);
        info!(%direction, dose_ms = dose.as_millis() as u64, "one-shot dose");
        self.dose_and_mix(direction, dose)
            .map_err(std::convert::Into::into)
    }

    /// One dose-then-mix sequence under the mix lease. The lease covers both
    /// actuations; the settle period runs outside it.
    fn dose_and_mix(&mut self, direction: Direction, dose: Duration) -> StdResult {
        let lease = match self.arbiter.acquire(None) {
            Ok(l) => l,
            // An unbounded wait can only be denied by shutdown.
            Err(_) => return Err(ControlError::Shutdown),
        };
        let pump = match direction {
            Direction::Raise => self.dose_up.as_mut(),
            Direction::Lower => self.dose_down.as_mut(),
        };
        run_actuator(&*self.clock, &self.shutdown, pump, dose, "dose pump")?;
        run_actuator(
            &*self.clock,
            &self.shutdown,
            self.mixer.as_mut(),
            self.cfg.mix,
            "mix pump",
        )?;
        drop(lease);
        Ok(())
    }
}

type StdResult = std::result::Result<(), ControlError>;

/// Energize, hold for `on_for`, then deenergize. Deenergize always runs,
/// also when the hold was interrupted by shutdown.
fn run_actuator(
    clock: &dyn Clock,
    shutdown: &Arc<AtomicBool>,
    actuator: &mut dyn Actuator,
    on_for: Duration,
    label: &str,
) -> StdResult {
    actuator
        .energize()
        .map_err(|e| ControlError::ActuatorFault(format!("{label} energize: {e}")))?;
    let interrupted = sleep_interruptible(clock, on_for, shutdown);
    actuator
        .deenergize()
        .map_err(|e| ControlError::ActuatorFault(format!("{label} deenergize: {e}")))?;
    if interrupted {
        return Err(ControlError::Shutdown);
    }
    Ok(())
}
