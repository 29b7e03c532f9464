//! Indicator output.
//!
//! The indicator is cosmetic: every implementation swallows its own failures so a broken
//! LED never takes the supervised CLI down with it.

mod command;

pub use command::{state_args, IndicatorCommand, CLEAR_ARGS};

use crate::activity::ActivityState;
#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Instant;

/// Something that can display an [`ActivityState`].
pub trait IndicatorSink {
    fn set_state(&mut self, state: ActivityState);

    /// Turn the indicator off.
    fn clear(&mut self);
}

impl<S: IndicatorSink + ?Sized> IndicatorSink for Box<S> {
    fn set_state(&mut self, state: ActivityState) {
        (**self).set_state(state);
    }

    fn clear(&mut self) {
        (**self).clear();
    }
}

/// Used with `--no-indicator`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndicator;

impl IndicatorSink for NoopIndicator {
    fn set_state(&mut self, _state: ActivityState) {}

    fn clear(&mut self) {}
}

/// Owns the sink for one run and turns it off exactly once when dropped.
pub struct IndicatorGuard<S: IndicatorSink> {
    sink: S,
}

impl<S: IndicatorSink> IndicatorGuard<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: IndicatorSink> Drop for IndicatorGuard<S> {
    fn drop(&mut self) {
        self.sink.clear();
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndicatorEvent {
    Set(ActivityState, Instant),
    Clear(Instant),
}

/// Test sink that remembers every call; clones share the same log.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingIndicator {
    events: Arc<Mutex<Vec<IndicatorEvent>>>,
}

#[cfg(test)]
impl RecordingIndicator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<IndicatorEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn states(&self) -> Vec<ActivityState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                IndicatorEvent::Set(state, _) => Some(state),
                IndicatorEvent::Clear(_) => None,
            })
            .collect()
    }

    pub(crate) fn clear_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, IndicatorEvent::Clear(_)))
            .count()
    }
}

#[cfg(test)]
impl IndicatorSink for RecordingIndicator {
    fn set_state(&mut self, state: ActivityState) {
        self.events
            .lock()
            .unwrap()
            .push(IndicatorEvent::Set(state, Instant::now()));
    }

    fn clear(&mut self) {
        self.events
            .lock()
            .unwrap()
            .push(IndicatorEvent::Clear(Instant::now()));
    }
}
