#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the hydroponic controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every timing knob carries the domain default so a minimal file (pins
//!   plus telemetry endpoints) is a runnable config.
use serde::Deserialize;
use serde::de::Deserializer;

/// Stable-reading acquisition knobs.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Stability {
    /// Rolling window length in samples.
    pub window_size: usize,
    /// Population standard deviation at or below which the window is stable.
    pub stddev_threshold: f64,
    /// Sampling cadence in milliseconds.
    pub sample_interval_ms: u64,
    /// Primary acquisition budget (ms) before the retry phase starts.
    pub primary_budget_ms: u64,
    /// Additional retry budget (ms); after this the degraded mean is returned.
    pub retry_budget_ms: u64,
    /// Settle delay after the probe engages, before the first sample.
    pub probe_settle_ms: u64,
}

impl Default for Stability {
    fn default() -> Self {
        Self {
            window_size: 10,
            stddev_threshold: 0.3,
            sample_interval_ms: 1000,
            primary_budget_ms: 300_000,
            retry_budget_ms: 60_000,
            probe_settle_ms: 2000,
        }
    }
}

/// Bounded-correction knobs.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Correction {
    /// Lower edge of the acceptable band.
    pub band_low: f64,
    /// Upper edge of the acceptable band.
    pub band_high: f64,
    /// Maximum dose attempts per correction call.
    pub max_attempts: u32,
    /// Dosing actuator on-time per attempt (ms).
    pub dose_ms: u64,
    /// Mix actuator on-time per attempt (ms).
    pub mix_ms: u64,
    /// Quiet period after mixing before the re-check (ms).
    pub settle_ms: u64,
    /// Primary budget for the post-dose re-check (ms); shorter than the
    /// initial acquisition on purpose.
    pub recheck_primary_budget_ms: u64,
    /// Retry budget for the post-dose re-check (ms).
    pub recheck_retry_budget_ms: u64,
}

impl Default for Correction {
    fn default() -> Self {
        Self {
            band_low: 6.5,
            band_high: 7.5,
            max_attempts: 5,
            dose_ms: 5000,
            mix_ms: 10_000,
            settle_ms: 60_000,
            recheck_primary_budget_ms: 120_000,
            recheck_retry_budget_ms: 30_000,
        }
    }
}

/// Probe servo positions in degrees.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Probe {
    pub engage_angle: f32,
    pub withdraw_angle: f32,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            engage_angle: 80.0,
            withdraw_angle: 20.0,
        }
    }
}

/// One schedule entry. Accepts either the tagged table form
/// `{ kind = "interval", seconds = 1800 }` or a bare seconds count, which
/// is shorthand for an interval rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCfg {
    Interval { seconds: u64 },
    TimeOfDay { hour: u32, minute_window: u32 },
    Periodic { every_n_hours: u32 },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RuleToml {
    Interval {
        seconds: u64,
    },
    TimeOfDay {
        hour: u32,
        #[serde(default = "default_minute_window")]
        minute_window: u32,
    },
    Periodic {
        every_n_hours: u32,
    },
}

fn default_minute_window() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleTomlOrSeconds {
    Seconds(u64),
    Rule(RuleToml),
}

fn de_rules<'de, D>(deserializer: D) -> Result<Vec<RuleCfg>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<RuleTomlOrSeconds>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for r in items {
            out.push(match r {
                RuleTomlOrSeconds::Seconds(seconds) => RuleCfg::Interval { seconds },
                RuleTomlOrSeconds::Rule(RuleToml::Interval { seconds }) => {
                    RuleCfg::Interval { seconds }
                }
                RuleTomlOrSeconds::Rule(RuleToml::TimeOfDay {
                    hour,
                    minute_window,
                }) => RuleCfg::TimeOfDay {
                    hour,
                    minute_window,
                },
                RuleTomlOrSeconds::Rule(RuleToml::Periodic { every_n_hours }) => {
                    RuleCfg::Periodic { every_n_hours }
                }
            });
        }
    }
    Ok(out)
}

/// Scheduler configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Scheduler evaluation cadence (ms).
    pub tick_ms: u64,
    #[serde(deserialize_with = "de_rules")]
    pub rules: Vec<RuleCfg>,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            tick_ms: 60_000,
            // 30-minute correction cycle when the file specifies nothing.
            rules: vec![RuleCfg::Interval { seconds: 1800 }],
        }
    }
}

/// Telemetry transport configuration. Endpoints absent means telemetry is
/// disabled and the runner uses the no-op port.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Telemetry {
    /// POST target for cycle reports.
    pub endpoint: Option<String>,
    /// GET target polled for remote commands.
    pub command_endpoint: Option<String>,
    pub device_id: String,
    /// Attempts per push, including the first.
    pub push_attempts: u32,
    /// Initial backoff between push attempts (ms); doubles per attempt.
    pub backoff_ms: u64,
    /// Hard cap on cumulative backoff per push (ms).
    pub max_total_wait_ms: u64,
    /// Per-request timeout (ms).
    pub request_timeout_ms: u64,
    /// Command polling cadence (ms).
    pub poll_interval_ms: u64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            endpoint: None,
            command_endpoint: None,
            device_id: "hydro_rig_1".to_string(),
            push_attempts: 3,
            backoff_ms: 500,
            max_total_wait_ms: 5000,
            request_timeout_ms: 10_000,
            poll_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for one ADC conversion before failing the sample
    pub sensor_read_timeout_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
        }
    }
}

/// BCM pin assignments; only consulted by hardware builds.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    /// ADS1115 input channel carrying the pH probe (0..=3).
    pub sensor_channel: u8,
    pub dose_up: u8,
    pub dose_down: u8,
    pub mix: u8,
    pub probe_servo: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            sensor_channel: 0,
            dose_up: 17,
            dose_down: 27,
            mix: 22,
            probe_servo: 18,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub stability: Stability,
    pub correction: Correction,
    pub probe: Probe,
    pub schedule: ScheduleCfg,
    pub telemetry: Telemetry,
    pub logging: Logging,
    pub hardware: Hardware,
    pub pins: Pins,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stability
        if self.stability.window_size < 2 {
            eyre::bail!("stability.window_size must be >= 2");
        }
        if !(self.stability.stddev_threshold > 0.0) {
            eyre::bail!("stability.stddev_threshold must be > 0");
        }
        if self.stability.sample_interval_ms == 0 {
            eyre::bail!("stability.sample_interval_ms must be >= 1");
        }
        if self.stability.primary_budget_ms == 0 {
            eyre::bail!("stability.primary_budget_ms must be >= 1");
        }
        if self.stability.primary_budget_ms
            < self.stability.sample_interval_ms * self.stability.window_size as u64
        {
            eyre::bail!(
                "stability.primary_budget_ms too small to ever fill a {}-sample window",
                self.stability.window_size
            );
        }

        // Correction
        if !(self.correction.band_low < self.correction.band_high) {
            eyre::bail!("correction.band_low must be < correction.band_high");
        }
        if self.correction.max_attempts == 0 {
            eyre::bail!("correction.max_attempts must be >= 1");
        }
        if self.correction.dose_ms == 0 {
            eyre::bail!("correction.dose_ms must be >= 1");
        }
        if self.correction.dose_ms > 60_000 {
            eyre::bail!("correction.dose_ms is unreasonably large (>60s)");
        }
        if self.correction.recheck_primary_budget_ms == 0 {
            eyre::bail!("correction.recheck_primary_budget_ms must be >= 1");
        }

        // Probe
        for (name, angle) in [
            ("probe.engage_angle", self.probe.engage_angle),
            ("probe.withdraw_angle", self.probe.withdraw_angle),
        ] {
            if !(0.0..=180.0).contains(&angle) {
                eyre::bail!("{name} must be in [0, 180] degrees");
            }
        }

        // Schedule
        if self.schedule.tick_ms == 0 {
            eyre::bail!("schedule.tick_ms must be >= 1");
        }
        for (i, rule) in self.schedule.rules.iter().enumerate() {
            match *rule {
                RuleCfg::Interval { seconds } => {
                    if seconds == 0 {
                        eyre::bail!("schedule.rules[{i}]: interval seconds must be >= 1");
                    }
                }
                RuleCfg::TimeOfDay {
                    hour,
                    minute_window,
                } => {
                    if hour > 23 {
                        eyre::bail!("schedule.rules[{i}]: hour must be in [0, 23]");
                    }
                    if minute_window == 0 || minute_window > 60 {
                        eyre::bail!("schedule.rules[{i}]: minute_window must be in [1, 60]");
                    }
                }
                RuleCfg::Periodic { every_n_hours } => {
                    if every_n_hours == 0 || every_n_hours > 24 {
                        eyre::bail!("schedule.rules[{i}]: every_n_hours must be in [1, 24]");
                    }
                }
            }
        }

        // Telemetry
        if self.telemetry.device_id.is_empty() {
            eyre::bail!("telemetry.device_id must not be empty");
        }
        if self.telemetry.push_attempts == 0 {
            eyre::bail!("telemetry.push_attempts must be >= 1");
        }
        if self.telemetry.request_timeout_ms == 0 {
            eyre::bail!("telemetry.request_timeout_ms must be >= 1");
        }
        if self.telemetry.poll_interval_ms == 0 {
            eyre::bail!("telemetry.poll_interval_ms must be >= 1");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }
        if self.pins.sensor_channel > 3 {
            eyre::bail!("pins.sensor_channel must be in [0, 3]");
        }

        Ok(())
    }
}
