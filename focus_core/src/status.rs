//! Controller phase.

/// Where the controller is in its homing/search cycle.
///
/// `Done` and `Aborted` are terminal for one invocation; the next call to
/// `home()` or `search_peak()` starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Homing,
    Searching,
    Done,
    Aborted,
}
