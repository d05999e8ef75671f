#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! HTTP transport for the telemetry boundary.
//!
//! Pushes cycle reports with bounded retries and polls the backend for
//! remote commands. Transport trouble never propagates into control flow:
//! pushes surface as `TelemetryUnreachable` for the caller to log, polls
//! degrade to `None`.

use std::thread;
use std::time::Duration;

use eyre::WrapErr;
use hydro_core::command::RemoteCommand;
use hydro_core::error::ControlError;
use hydro_core::telemetry::{CycleReport, TelemetryPort};
use serde_json::{Value, json};
use tracing::{debug, warn};

pub struct HttpTelemetry {
    client: reqwest::blocking::Client,
    endpoint: Option<String>,
    command_endpoint: Option<String>,
    device_id: String,
    push_attempts: u32,
    backoff: Duration,
    max_total_wait: Duration,
}

impl HttpTelemetry {
    pub fn new(cfg: &hydro_config::Telemetry) -> eyre::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .wrap_err("building telemetry HTTP client")?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            command_endpoint: cfg.command_endpoint.clone(),
            device_id: cfg.device_id.clone(),
            push_attempts: cfg.push_attempts.max(1),
            backoff: Duration::from_millis(cfg.backoff_ms),
            max_total_wait: Duration::from_millis(cfg.max_total_wait_ms),
        })
    }

    fn post_once(&self, endpoint: &str, body: &Value) -> Result<(), String> {
        match self.client.post(endpoint).json(body).send() {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(format!("backend returned {}", resp.status())),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl TelemetryPort for HttpTelemetry {
    fn push(&mut self, report: &CycleReport) -> Result<(), ControlError> {
        let Some(endpoint) = self.endpoint.clone() else {
            return Ok(());
        };
        let body = json!({
            "timestamp": report.timestamp,
            "ph_value": report.value,
            "stable": report.stable,
            "adjustment_made": report.adjustment_made,
            "device_id": report.device_id,
        });

        let mut waited = Duration::ZERO;
        let mut backoff = self.backoff;
        let mut last_err = String::new();
        for attempt in 1..=self.push_attempts {
            match self.post_once(&endpoint, &body) {
                Ok(()) => {
                    debug!(attempt, "cycle report pushed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "report push failed");
                    last_err = e;
                }
            }
            if attempt < self.push_attempts {
                let budget = self.max_total_wait.saturating_sub(waited);
                let pause = backoff.min(budget);
                if pause.is_zero() {
                    last_err = format!("{last_err} (backoff budget exhausted)");
                    break;
                }
                thread::sleep(pause);
                waited += pause;
                backoff = backoff.saturating_mul(2);
            }
        }
        Err(ControlError::TelemetryUnreachable(last_err))
    }

    fn poll_commands(&mut self) -> Option<RemoteCommand> {
        let endpoint = self.command_endpoint.as_ref()?;
        let resp = self
            .client
            .get(endpoint)
            .query(&[("device_id", self.device_id.as_str())])
            .send();
        let resp = match resp {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "command poll rejected");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "command poll failed");
                return None;
            }
        };
        let value: Value = match resp.json() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "command payload is not JSON");
                return None;
            }
        };
        parse_command(&value)
    }
}

/// Map a backend payload onto a command. Four shapes are understood:
///
/// - `{"action": "adjust_up" | "adjust_down"}`
/// - `{"on_duration": secs, "off_duration": secs}`
/// - `{"pump": "ph_up" | "ph_down", "pwm": _, "duration": ms}`
/// - `{"servo": name, "angle": degrees}`
///
/// Anything else yields `None`.
pub fn parse_command(v: &Value) -> Option<RemoteCommand> {
    if let Some(action) = v.get("action").and_then(Value::as_str) {
        return match action {
            "adjust_up" => Some(RemoteCommand::AdjustUp { dose: None }),
            "adjust_down" => Some(RemoteCommand::AdjustDown { dose: None }),
            other => {
                warn!(action = other, "unknown action, ignoring");
                None
            }
        };
    }
    if let (Some(on), Some(off)) = (
        v.get("on_duration").and_then(Value::as_f64),
        v.get("off_duration").and_then(Value::as_f64),
    ) {
        // try_from rejects negatives, NaN, and anything Duration cannot hold.
        let (Ok(on), Ok(off)) = (
            Duration::try_from_secs_f64(on),
            Duration::try_from_secs_f64(off),
        ) else {
            warn!(on, off, "timing values out of range, ignoring");
            return None;
        };
        return Some(RemoteCommand::SetTiming { on, off });
    }
    if let Some(pump) = v.get("pump").and_then(Value::as_str) {
        let dose = v
            .get("duration")
            .and_then(Value::as_u64)
            .map(Duration::from_millis);
        return match pump {
            "ph_up" => Some(RemoteCommand::AdjustUp { dose }),
            "ph_down" => Some(RemoteCommand::AdjustDown { dose }),
            other => {
                warn!(pump = other, "unknown pump, ignoring");
                None
            }
        };
    }
    if let (Some(servo), Some(angle)) = (
        v.get("servo").and_then(Value::as_str),
        v.get("angle").and_then(Value::as_f64),
    ) {
        return Some(RemoteCommand::SetServoAngle {
            target: servo.to_string(),
            angle: angle as f32,
        });
    }
    if !v.is_null() {
        warn!(payload = %v, "unrecognized command payload");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_config::Telemetry;
    use serde_json::json;

    fn cfg(server: &mockito::ServerGuard) -> Telemetry {
        Telemetry {
            endpoint: Some(format!("{}/report", server.url())),
            command_endpoint: Some(format!("{}/commands", server.url())),
            device_id: "rig_test".into(),
            push_attempts: 3,
            backoff_ms: 1,
            max_total_wait_ms: 10,
            request_timeout_ms: 2000,
            poll_interval_ms: 1000,
        }
    }

    fn report() -> CycleReport {
        CycleReport {
            timestamp: "2026-03-01T08:00:00+00:00".into(),
            value: 6.9,
            stable: true,
            adjustment_made: false,
            device_id: "rig_test".into(),
        }
    }

    #[test]
    fn push_posts_the_report_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/report")
            .match_body(mockito::Matcher::PartialJson(json!({
                "ph_value": 6.9,
                "adjustment_made": false,
                "device_id": "rig_test",
            })))
            .with_status(200)
            .create();

        let mut port = HttpTelemetry::new(&cfg(&server)).unwrap();
        port.push(&report()).unwrap();
        mock.assert();
    }

    #[test]
    fn push_retries_then_reports_unreachable() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/report")
            .with_status(500)
            .expect(3)
            .create();

        let mut port = HttpTelemetry::new(&cfg(&server)).unwrap();
        let err = port.push(&report()).unwrap_err();
        assert!(matches!(err, ControlError::TelemetryUnreachable(_)));
        mock.assert();
    }

    #[test]
    fn poll_parses_action_shape() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/commands")
            .match_query(mockito::Matcher::UrlEncoded(
                "device_id".into(),
                "rig_test".into(),
            ))
            .with_status(200)
            .with_body(r#"{"action": "adjust_up"}"#)
            .create();

        let mut port = HttpTelemetry::new(&cfg(&server)).unwrap();
        assert_eq!(
            port.poll_commands(),
            Some(RemoteCommand::AdjustUp { dose: None })
        );
    }

    #[test]
    fn poll_degrades_to_none_on_transport_failure() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/commands")
            .with_status(503)
            .create();

        let mut port = HttpTelemetry::new(&cfg(&server)).unwrap();
        assert_eq!(port.poll_commands(), None);
    }

    #[test]
    fn parse_understands_all_shapes() {
        assert_eq!(
            parse_command(&json!({"action": "adjust_down"})),
            Some(RemoteCommand::AdjustDown { dose: None })
        );
        assert_eq!(
            parse_command(&json!({"on_duration": 120, "off_duration": 60})),
            Some(RemoteCommand::SetTiming {
                on: Duration::from_secs(120),
                off: Duration::from_secs(60),
            })
        );
        assert_eq!(
            parse_command(&json!({"pump": "ph_down", "pwm": 255, "duration": 3000})),
            Some(RemoteCommand::AdjustDown {
                dose: Some(Duration::from_millis(3000)),
            })
        );
        assert_eq!(
            parse_command(&json!({"servo": "probe", "angle": 45.0})),
            Some(RemoteCommand::SetServoAngle {
                target: "probe".into(),
                angle: 45.0,
            })
        );
    }

    #[test]
    fn parse_rejects_unrecognized_shapes() {
        assert_eq!(parse_command(&json!({"action": "explode"})), None);
        assert_eq!(parse_command(&json!({"pump": "nutrient"})), None);
        assert_eq!(parse_command(&json!({"on_duration": -5, "off_duration": 1})), None);
        assert_eq!(parse_command(&json!({"on_duration": 1e300, "off_duration": 1})), None);
        assert_eq!(parse_command(&json!({"on_duration": 1, "off_duration": 1e300})), None);
        assert_eq!(parse_command(&json!({"unrelated": true})), None);
        assert_eq!(parse_command(&Value::Null), None);
    }
}
