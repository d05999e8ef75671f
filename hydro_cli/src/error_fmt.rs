//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use hydro_core::error::ControlError;

    // Typed matches first
    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::SensorUnavailable => {
                "What happened: No sensor reading succeeded within the acquisition budget.\nLikely causes: Probe unplugged, ADC wiring/power issue, or sensor_read_timeout_ms too low.\nHow to fix: Check the probe and [pins] wiring, and consider raising hardware.sensor_read_timeout_ms.".to_string()
            }
            ControlError::ActuatorFault(msg) => format!(
                "What happened: An actuator failed ({msg}).\nLikely causes: Relay wiring fault, insufficient GPIO permissions, or a stuck pump.\nHow to fix: Check the [pins] values and relay wiring; ensure the process can access GPIO."
            ),
            ControlError::TelemetryUnreachable(msg) => format!(
                "What happened: The telemetry backend could not be reached ({msg}).\nLikely causes: Backend down, wrong endpoint URL, or network trouble.\nHow to fix: Verify telemetry.endpoint and that the backend is running. Control continues without it."
            ),
            ControlError::CommandMalformed(msg) => format!(
                "What happened: A remote command could not be understood ({msg}).\nLikely causes: Backend and controller disagree on the command schema.\nHow to fix: Update whichever side is behind; unrecognized commands are ignored."
            ),
            ControlError::Shutdown => {
                "What happened: The run was interrupted by a shutdown request.\nHow to fix: Nothing; this is the normal Ctrl-C path.".to_string()
            }
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("i2c") || lower.contains("adc") {
        return "What happened: The ADC did not respond.\nLikely causes: ADS1115 not on the I2C bus, wrong channel, or bus disabled.\nHow to fix: Check wiring and pins.sensor_channel, and enable I2C on the Pi.".to_string();
    }

    if lower.contains("must be") || lower.contains("invalid config") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/hydro_config.toml for a sample."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error class; generic failures return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    use hydro_core::error::ControlError;
    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::SensorUnavailable => 3,
            ControlError::ActuatorFault(_) => 4,
            ControlError::TelemetryUnreachable(_) => 5,
            ControlError::CommandMalformed(_) => 6,
            ControlError::Shutdown => 130,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use hydro_core::error::ControlError;
    use serde_json::json;

    let reason = match err.downcast_ref::<ControlError>() {
        Some(ControlError::SensorUnavailable) => "SensorUnavailable",
        Some(ControlError::ActuatorFault(_)) => "ActuatorFault",
        Some(ControlError::TelemetryUnreachable(_)) => "TelemetryUnreachable",
        Some(ControlError::CommandMalformed(_)) => "CommandMalformed",
        Some(ControlError::Shutdown) => "Shutdown",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydro_core::error::ControlError;
    use rstest::rstest;

    #[rstest]
    #[case(ControlError::SensorUnavailable, 3)]
    #[case(ControlError::ActuatorFault("relay stuck".into()), 4)]
    #[case(ControlError::TelemetryUnreachable("backend down".into()), 5)]
    #[case(ControlError::CommandMalformed("bad shape".into()), 6)]
    #[case(ControlError::Shutdown, 130)]
    fn control_errors_map_to_stable_exit_codes(#[case] err: ControlError, #[case] code: u8) {
        assert_eq!(exit_code_for_error(&eyre::Report::new(err)), code);
    }

    #[test]
    fn assembly_and_generic_errors_exit_one() {
        let err = eyre::eyre!("opening dose-up relay");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("How to fix"));
    }

    #[test]
    fn wrapped_control_error_is_still_matched() {
        use eyre::WrapErr;
        let err = Err::<(), _>(ControlError::SensorUnavailable)
            .wrap_err("cycle acquisition failed")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("acquisition budget"));
    }
}
