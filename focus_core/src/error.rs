use thiserror::Error;

/// Why a homing or search phase ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    StopCommand,
    LimitSwitch,
    Interrupted,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::StopCommand => "stop command received",
            AbortReason::LimitSwitch => "travel limit switch pressed",
            AbortReason::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone)]
pub enum FocusError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// Pulses already issued have moved the carriage.
    #[error("motion interrupted after {steps} steps")]
    Interrupted { steps: u64 },
    #[error("degenerate geometry: d1={d1} mm, d2={d2} mm")]
    DegenerateGeometry { d1: f64, d2: f64 },
    #[error("aborted: {0}")]
    Aborted(AbortReason),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing home switch")]
    MissingHomeSwitch,
    #[error("missing limit switch")]
    MissingLimitSwitch,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
