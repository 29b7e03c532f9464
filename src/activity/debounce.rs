use std::time::{Duration, Instant};

use super::ActivityState;
use crate::indicator::IndicatorSink;
use crate::log_debug;

/// Minimum time between two visible indicator changes.
pub const MIN_STATE_DWELL: Duration = Duration::from_millis(200);

/// Last state shown on the indicator and when it was shown.
#[derive(Debug, Clone)]
pub struct DebounceClock {
    last_state: Option<ActivityState>,
    last_change_at: Option<Instant>,
    min_dwell: Duration,
}

impl Default for DebounceClock {
    fn default() -> Self {
        Self::new(MIN_STATE_DWELL)
    }
}

impl DebounceClock {
    pub fn new(min_dwell: Duration) -> Self {
        Self {
            last_state: None,
            last_change_at: None,
            min_dwell,
        }
    }

    pub fn last_state(&self) -> Option<ActivityState> {
        self.last_state
    }

    pub fn last_change_at(&self) -> Option<Instant> {
        self.last_change_at
    }

    pub fn min_dwell(&self) -> Duration {
        self.min_dwell
    }

    /// Whether `candidate` may be shown at `now`. Nothing is recorded.
    pub fn admits(&self, candidate: ActivityState, now: Instant) -> bool {
        if self.last_state == Some(candidate) {
            return false;
        }
        match self.last_change_at {
            Some(changed_at) => now.saturating_duration_since(changed_at) > self.min_dwell,
            None => true,
        }
    }

    fn record(&mut self, state: ActivityState, now: Instant) {
        self.last_state = Some(state);
        self.last_change_at = Some(now);
    }
}

/// Show `candidate` on the indicator if the clock admits it. Rejected candidates are
/// dropped, not queued. Returns whether the indicator was called.
pub fn request_transition<S>(
    clock: &mut DebounceClock,
    sink: &mut S,
    candidate: ActivityState,
    now: Instant,
) -> bool
where
    S: IndicatorSink + ?Sized,
{
    if !clock.admits(candidate, now) {
        return false;
    }
    let previous = clock.last_state;
    sink.set_state(candidate);
    clock.record(candidate, now);
    log_debug(&format!(
        "state {} -> {candidate}",
        previous.map(ActivityState::label).unwrap_or("unset")
    ));
    tracing::info!(
        target: "statuslight::activity",
        from = previous.map(ActivityState::label).unwrap_or("unset"),
        to = candidate.label(),
        "indicator transition"
    );
    true
}
