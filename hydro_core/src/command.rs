//! Remote commands accepted from the telemetry backend.

use std::time::Duration;

/// A command polled from the backend. Executed on the control thread
/// between cycles so actuator ownership stays single-threaded.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    /// One-shot upward dose; `None` uses the configured dose duration.
    AdjustUp { dose: Option<Duration> },
    /// One-shot downward dose.
    AdjustDown { dose: Option<Duration> },
    /// Replace the mix (on) and settle (off) durations for later cycles.
    SetTiming { on: Duration, off: Duration },
    /// Move a named servo to an absolute angle.
    SetServoAngle { target: String, angle: f32 },
}
