//! Endstop switches.

use focus_traits::{InputLine, Interlock};

/// A switch on a pulled-up input.
///
/// Normally open switches short the line to ground when actuated, so low
/// means pressed. Normally closed switches open the loop, so high means
/// pressed.
pub struct Endstop {
    name: &'static str,
    input: Box<dyn InputLine + Send>,
    normally_open: bool,
}

impl Endstop {
    pub fn new(name: &'static str, input: Box<dyn InputLine + Send>, normally_open: bool) -> Self {
        Self {
            name,
            input,
            normally_open,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// One-line state for diagnostics.
    pub fn describe(&self) -> String {
        let level = if self.input.is_high() { "high" } else { "low" };
        let kind = if self.normally_open { "NO" } else { "NC" };
        let state = if self.is_pressed() { "pressed" } else { "open" };
        format!("{} endstop ({kind}): line {level}, {state}", self.name)
    }
}

impl Interlock for Endstop {
    fn is_pressed(&self) -> bool {
        self.input.is_high() ^ self.normally_open
    }
}
