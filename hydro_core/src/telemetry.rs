//! Telemetry boundary: outbound cycle reports and inbound remote commands.

use crate::command::RemoteCommand;
use crate::error::ControlError;

/// One control cycle summarized for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Wall-clock timestamp, RFC 3339.
    pub timestamp: String,
    pub value: f64,
    /// Whether this reading came out of the stability window (false for the
    /// degraded budget-exhausted mean).
    pub stable: bool,
    /// True when the cycle ran at least one dose.
    pub adjustment_made: bool,
    pub device_id: String,
}

/// Transport boundary for reports and commands. Implementations must never
/// panic on transport failure; pushes fail with `TelemetryUnreachable` and
/// polls degrade to `None`.
pub trait TelemetryPort {
    fn push(&mut self, report: &CycleReport) -> Result<(), ControlError>;

    /// Poll the backend for one pending command. Transport failures and
    /// unrecognized payload shapes yield `None`.
    fn poll_commands(&mut self) -> Option<RemoteCommand>;
}

/// No-op port used when no endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetry;

impl TelemetryPort for NoTelemetry {
    fn push(&mut self, _report: &CycleReport) -> Result<(), ControlError> {
        Ok(())
    }

    fn poll_commands(&mut self) -> Option<RemoteCommand> {
        None
    }
}
