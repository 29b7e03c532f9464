//! Activity detection: the output window, pattern classification, and the debounce that
//! decides when the indicator actually changes.

mod classifier;
mod debounce;
mod strip;
mod window;

use std::fmt;

pub use classifier::Classifier;
pub use debounce::{request_transition, DebounceClock, MIN_STATE_DWELL};
pub use window::{OutputWindow, OUTPUT_WINDOW_BYTES};

/// What the supervised CLI appears to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityState {
    Idle,
    Thinking,
    Waiting,
}

impl ActivityState {
    pub fn label(self) -> &'static str {
        match self {
            ActivityState::Idle => "idle",
            ActivityState::Thinking => "thinking",
            ActivityState::Waiting => "waiting",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
