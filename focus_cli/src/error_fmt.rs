//! Human-readable error descriptions, exit codes and structured JSON errors.

use focus_core::{AbortReason, BuildError, FocusError};

/// First error of type `E` anywhere in the report's chain.
fn find<'a, E: std::error::Error + 'static>(err: &'a eyre::Report) -> Option<&'a E> {
    err.chain().find_map(|e| e.downcast_ref::<E>())
}

pub fn abort_reason_name(r: AbortReason) -> &'static str {
    match r {
        AbortReason::StopCommand => "StopCommand",
        AbortReason::LimitSwitch => "LimitSwitch",
        AbortReason::Interrupted => "Interrupted",
    }
}

fn abort_reason(err: &eyre::Report) -> Option<AbortReason> {
    match find::<FocusError>(err)? {
        FocusError::Aborted(reason) => Some(*reason),
        FocusError::Interrupted { .. } => Some(AbortReason::Interrupted),
        _ => None,
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::MissingHomeSwitch | BuildError::MissingLimitSwitch => format!(
                "What happened: The bench was assembled without an endstop ({be}).\nLikely causes: Endstop input failed to initialize.\nHow to fix: Check [endstops] pins and wiring."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(reason) = abort_reason(err) {
        return match reason {
            AbortReason::StopCommand => "What happened: A remote stop command ended the run.\nLikely causes: Stop pressed in the web front end.\nHow to fix: Start a new measurement when ready.".to_string(),
            AbortReason::LimitSwitch => "What happened: The travel limit switch was pressed during the scan.\nLikely causes: Wrong stage.max_travel_mm, lost steps, or a miswired limit switch.\nHow to fix: Home the stage, check [stage] and [endstops.limit], then rerun.".to_string(),
            AbortReason::Interrupted => "What happened: The run was interrupted (Ctrl-C); the driver was disabled.\nHow to fix: Home the stage before the next measurement.".to_string(),
        };
    }

    if let Some(fe) = find::<FocusError>(err) {
        return match fe {
            FocusError::DegenerateGeometry { .. } => format!(
                "What happened: The focal length is undefined for this geometry ({fe}).\nLikely causes: laser/sensor offsets and max travel cancel out.\nHow to fix: Check [stage] laser_offset_mm, sensor_offset_mm and max_travel_mm."
            ),
            FocusError::Hardware(_) | FocusError::HardwareFault(_) => format!(
                "What happened: {fe}.\nLikely causes: Wiring, power, or missing device permissions.\nHow to fix: Run `focus self-check` and verify [pins], [sensor.adc] and the camera frame path."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Heuristics on the full chain for init and config failures
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open motor pins") || lower.contains("open endstop pins") {
        return format!(
            "What happened: Failed to initialize GPIO pins ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix [pins]/[endstops] in the config; ensure the process may access GPIO."
        );
    }
    if lower.contains("i2c error") {
        return format!(
            "What happened: The ADC could not be reached on the I2C bus ({msg}).\nLikely causes: Wrong bus or address, or I2C disabled.\nHow to fix: Check [sensor.adc] bus/address and run `i2cdetect`."
        );
    }
    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Pass --config with the path to a readable TOML file."
        );
    }
    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [pins] or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 stopped remotely, 4 limit switch, 130 interrupted,
/// 1 for every other error.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    match abort_reason(err) {
        Some(AbortReason::StopCommand) => 3,
        Some(AbortReason::LimitSwitch) => 4,
        Some(AbortReason::Interrupted) => 130,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = abort_reason(err).map_or("Error", abort_reason_name);
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn abort_reason_survives_context() {
        let err = Err::<(), _>(FocusError::Aborted(AbortReason::LimitSwitch))
            .wrap_err("measurement failed")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("limit switch"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "LimitSwitch");
    }

    #[test]
    fn generic_errors_exit_with_one() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("boom"));
    }
}
