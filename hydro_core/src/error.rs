use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ControlError {
    #[error("sensor unavailable: no reading obtained within the budget")]
    SensorUnavailable,
    #[error("actuator fault: {0}")]
    ActuatorFault(String),
    #[error("telemetry unreachable: {0}")]
    TelemetryUnreachable(String),
    #[error("malformed remote command: {0}")]
    CommandMalformed(String),
    #[error("shutdown requested")]
    Shutdown,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
