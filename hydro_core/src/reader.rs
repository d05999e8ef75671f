//! Budgeted stable-reading acquisition.
//!
//! A reading is "stable" when the rolling window is full and its population
//! standard deviation is within the configured threshold; the reading value
//! is then the window mean. When the primary and retry budgets both run out
//! without stability, the mean over every collected sample is returned with
//! `stable = false` so a correction decision can still be made.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hydro_traits::{AnalogSensor, Clock, Positioner};
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::util::sleep_interruptible;
use crate::window::{Sample, StabilityVerdict, Window};

#[derive(Debug, Clone, Copy)]
pub struct ReaderCfg {
    pub window_size: usize,
    pub stddev_threshold: f64,
    pub sample_interval: Duration,
    /// Delay between probe engagement and the first sample.
    pub probe_settle: Duration,
    /// Per-sample capability timeout.
    pub sample_timeout: Duration,
    pub engage_angle: f32,
    pub withdraw_angle: f32,
}

/// An acquired reading. `stable` is false for the degraded budget-exhausted
/// fallback value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub stable: bool,
}

/// Acquires readings from an analog sensor behind a retractable probe.
///
/// The probe is engaged before the first sample and withdrawn on every exit
/// path, including errors and shutdown.
pub struct StableReader<S: AnalogSensor, P: Positioner> {
    sensor: S,
    probe: P,
    cfg: ReaderCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
}

impl<S: AnalogSensor, P: Positioner> StableReader<S, P> {
    pub fn new(
        sensor: S,
        probe: P,
        cfg: ReaderCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sensor,
            probe,
            cfg,
            clock,
            shutdown,
        }
    }

    /// Move the probe servo to an explicit angle (remote override).
    pub fn position_probe(&mut self, angle: f32) -> Result<()> {
        self.probe
            .move_to(angle)
            .map_err(|e| ControlError::ActuatorFault(format!("probe move: {e}")).into())
    }

    /// Acquire one reading within `primary + retry`.
    ///
    /// Early-exits with the window mean as soon as the window stabilizes.
    /// Per-sample errors are logged and skipped without resetting the
    /// window; if not a single sample succeeded, this is
    /// `ControlError::SensorUnavailable`.
    pub fn acquire(&mut self, primary: Duration, retry: Duration) -> Result<Reading> {
        self.probe
            .move_to(self.cfg.engage_angle)
            .map_err(|e| ControlError::ActuatorFault(format!("probe engage: {e}")))?;

        let out = self.sample_loop(primary, retry);

        // Withdraw on every path; a withdraw failure only overrides success.
        let withdrawn = self.probe.move_to(self.cfg.withdraw_angle);
        match (out, withdrawn) {
            (Ok(_), Err(e)) => {
                Err(ControlError::ActuatorFault(format!("probe withdraw: {e}")).into())
            }
            (out, Err(e)) => {
                warn!(error = %e, "probe withdraw failed during abort");
                out
            }
            (out, Ok(())) => out,
        }
    }

    fn sample_loop(&mut self, primary: Duration, retry: Duration) -> Result<Reading> {
        if sleep_interruptible(&*self.clock, self.cfg.probe_settle, &self.shutdown) {
            return Err(ControlError::Shutdown.into());
        }

        let epoch = self.clock.now();
        let primary_ms = primary.as_millis() as u64;
        let budget_ms = primary_ms.saturating_add(retry.as_millis() as u64);

        let mut window = Window::new(self.cfg.window_size);
        let mut sum_all = 0.0_f64;
        let mut count_all = 0_u64;
        let mut in_retry = false;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(ControlError::Shutdown.into());
            }
            let elapsed = self.clock.ms_since(epoch);
            if elapsed >= budget_ms {
                break;
            }
            if !in_retry && elapsed >= primary_ms {
                in_retry = true;
                info!(elapsed_ms = elapsed, "primary budget spent, entering retry phase");
            }

            match self.sensor.sample(self.cfg.sample_timeout) {
                Ok(v) => {
                    sum_all += v;
                    count_all += 1;
                    window.push(Sample {
                        value: v,
                        taken_at_ms: elapsed,
                    });
                    if let StabilityVerdict::Stable { mean, stddev } =
                        window.verdict(self.cfg.stddev_threshold)
                    {
                        debug!(mean, stddev, samples = count_all, "window stabilized");
                        return Ok(Reading {
                            value: mean,
                            stable: true,
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, elapsed_ms = elapsed, "sample failed, skipping");
                }
            }

            if sleep_interruptible(&*self.clock, self.cfg.sample_interval, &self.shutdown) {
                return Err(ControlError::Shutdown.into());
            }
        }

        if count_all == 0 {
            return Err(ControlError::SensorUnavailable.into());
        }
        let mean = sum_all / count_all as f64;
        warn!(
            mean,
            samples = count_all,
            "budgets exhausted without stability, returning degraded mean"
        );
        Ok(Reading {
            value: mean,
            stable: false,
        })
    }
}
