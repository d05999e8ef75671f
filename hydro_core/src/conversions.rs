//! Conversions from the TOML-facing config structs to core types.

use std::time::Duration;

use crate::corrector::CorrectorCfg;
use crate::reader::ReaderCfg;
use crate::schedule::ScheduleRule;

impl From<&hydro_config::Correction> for CorrectorCfg {
    fn from(c: &hydro_config::Correction) -> Self {
        Self {
            band_low: c.band_low,
            band_high: c.band_high,
            max_attempts: c.max_attempts,
            dose: Duration::from_millis(c.dose_ms),
            mix: Duration::from_millis(c.mix_ms),
            settle: Duration::from_millis(c.settle_ms),
            recheck_primary: Duration::from_millis(c.recheck_primary_budget_ms),
            recheck_retry: Duration::from_millis(c.recheck_retry_budget_ms),
        }
    }
}

impl ReaderCfg {
    pub fn from_config(
        s: &hydro_config::Stability,
        p: &hydro_config::Probe,
        hw: &hydro_config::Hardware,
    ) -> Self {
        Self {
            window_size: s.window_size,
            stddev_threshold: s.stddev_threshold,
            sample_interval: Duration::from_millis(s.sample_interval_ms),
            probe_settle: Duration::from_millis(s.probe_settle_ms),
            sample_timeout: Duration::from_millis(hw.sensor_read_timeout_ms),
            engage_angle: p.engage_angle,
            withdraw_angle: p.withdraw_angle,
        }
    }
}

impl From<&hydro_config::RuleCfg> for ScheduleRule {
    fn from(r: &hydro_config::RuleCfg) -> Self {
        match *r {
            hydro_config::RuleCfg::Interval { seconds } => Self::Interval {
                every: Duration::from_secs(seconds),
            },
            hydro_config::RuleCfg::TimeOfDay {
                hour,
                minute_window,
            } => Self::TimeOfDay {
                hour,
                minute_window,
            },
            hydro_config::RuleCfg::Periodic { every_n_hours } => {
                Self::PeriodicBucket { every_n_hours }
            }
        }
    }
}
