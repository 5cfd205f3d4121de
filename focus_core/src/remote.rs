//! Remote control contract: a polled command mailbox and a best-effort
//! status sink. Transports live outside the core.

/// Command requested by the remote front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Start,
    Stop,
    Home,
}

impl RemoteCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "home" => Some(Self::Home),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Home => "home",
        }
    }
}

/// Partial status record; `None` fields are left untouched by the sink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub is_running: Option<bool>,
    pub is_homing: Option<bool>,
    pub current_pos_mm: Option<f64>,
    pub current_voltage: Option<f64>,
    pub best_pos_mm: Option<f64>,
    pub best_voltage: Option<f64>,
    pub focal_length: Option<f64>,
    /// Reset the pending command so it is not seen twice.
    pub clear_command: bool,
}

pub trait CommandSource {
    /// Pending command, if any. Transport failures read as `None`.
    fn poll_command(&mut self) -> Option<RemoteCommand>;
}

pub trait StatusSink {
    /// Best effort; delivery failures are the sink's business.
    fn push_status(&mut self, update: &StatusUpdate);
}

/// Both halves of a remote link.
pub trait Remote: CommandSource + StatusSink {}

impl<T: CommandSource + StatusSink + ?Sized> Remote for T {}

impl<T: CommandSource + ?Sized> CommandSource for Box<T> {
    fn poll_command(&mut self) -> Option<RemoteCommand> {
        (**self).poll_command()
    }
}

impl<T: StatusSink + ?Sized> StatusSink for Box<T> {
    fn push_status(&mut self, update: &StatusUpdate) {
        (**self).push_status(update);
    }
}

/// No remote attached: never commands, discards status.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl CommandSource for Offline {
    fn poll_command(&mut self) -> Option<RemoteCommand> {
        None
    }
}

impl StatusSink for Offline {
    fn push_status(&mut self, _update: &StatusUpdate) {}
}
