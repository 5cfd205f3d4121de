//! Maps `Box<dyn Error>` from trait boundaries to typed `FocusError`.
//!
//! The traits in `focus_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `focus_hardware::HwError` downcasting.

use crate::error::FocusError;

/// Map a trait-boundary error to a typed `FocusError`.
///
/// Errors that already are a `FocusError` (raised by core-side trait
/// implementations such as the stepper actuator) pass through unchanged.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FocusError {
    if let Some(fe) = e.downcast_ref::<FocusError>() {
        return fe.clone();
    }

    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<focus_hardware::error::HwError>() {
            return FocusError::HardwareFault(hw.to_string());
        }
    }

    FocusError::Hardware(e.to_string())
}
