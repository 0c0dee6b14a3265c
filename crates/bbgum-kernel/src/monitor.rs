//! Per-element bookkeeping
//!
//! A [`Monitor`] belongs to exactly one element. Read accessors are public;
//! mutators are only reachable through the call-scoped
//! [`FlowMut`](crate::element::FlowMut) a controller receives while an event
//! is being delivered.

use crate::action::Action;
use crate::error::StateMachineError;
use crate::script::ExpectedStep;
use crate::state_machine;
use crate::types::{Direction, FlowState, Timestamp, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of actions retained in a monitor's history.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Why a flow deviated from its model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mismatch {
    /// Observed event does not match the expected step
    Unexpected {
        /// Position in the model
        position: usize,
        /// Step that was expected, if any remained
        expected: Option<ExpectedStep>,
        /// Direction actually observed
        observed: Direction,
    },
    /// A deadline elapsed before the expected step arrived
    TimedOut {
        /// Position in the model
        position: usize,
    },
}

/// Mutable progress record of one flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    state: FlowState,
    conclusion: Option<Verdict>,
    position: usize,
    counts: [u64; 3],
    last_seen: [Option<Timestamp>; 3],
    retries_used: u32,
    late_events: u64,
    mismatch: Option<Mismatch>,
    terminated_at: Option<Timestamp>,
    history: VecDeque<Action>,
    history_limit: usize,
}

impl Monitor {
    /// Fresh monitor in [`FlowState::Running`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Fresh monitor retaining at most `limit` actions.
    #[must_use]
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            state: FlowState::Running,
            conclusion: None,
            position: 0,
            counts: [0; 3],
            last_seen: [None; 3],
            retries_used: 0,
            late_events: 0,
            mismatch: None,
            terminated_at: None,
            history: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            history_limit: limit,
        }
    }

    /// Running, nothing observed yet and no progress or outcome recorded.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.state == FlowState::Running
            && self.conclusion.is_none()
            && self.position == 0
            && self.total_observed() == 0
            && self.last_seen.iter().all(Option::is_none)
            && self.retries_used == 0
            && self.late_events == 0
            && self.mismatch.is_none()
            && self.terminated_at.is_none()
            && self.history.is_empty()
    }

    /// Current flow state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Whether the flow reached a terminal state.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Verdict fixed at the terminal transition.
    #[inline]
    #[must_use]
    pub fn conclusion(&self) -> Option<Verdict> {
        self.conclusion
    }

    /// Number of expected steps matched so far.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Events observed in `direction` while running.
    #[inline]
    #[must_use]
    pub fn observed(&self, direction: Direction) -> u64 {
        self.counts[direction.index()]
    }

    /// Events observed in any direction while running.
    #[must_use]
    pub fn total_observed(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Timestamp of the last event observed in `direction`.
    #[inline]
    #[must_use]
    pub fn last_seen(&self, direction: Direction) -> Option<Timestamp> {
        self.last_seen[direction.index()]
    }

    /// Retries consumed so far.
    #[inline]
    #[must_use]
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// Events delivered after termination.
    #[inline]
    #[must_use]
    pub fn late_events(&self) -> u64 {
        self.late_events
    }

    /// Recorded deviation, if the flow failed on one.
    #[inline]
    #[must_use]
    pub fn mismatch(&self) -> Option<&Mismatch> {
        self.mismatch.as_ref()
    }

    /// When the flow terminated.
    #[inline]
    #[must_use]
    pub fn terminated_at(&self) -> Option<Timestamp> {
        self.terminated_at
    }

    /// Retained actions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Action> {
        self.history.iter()
    }

    pub(crate) fn observe(&mut self, action: &Action) {
        let index = action.direction().index();
        self.counts[index] += 1;
        self.last_seen[index] = Some(action.observed_at());
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(action.clone());
    }

    pub(crate) fn record_late(&mut self) {
        self.late_events += 1;
    }

    pub(crate) fn advance(&mut self) -> usize {
        self.position += 1;
        self.position
    }

    pub(crate) fn rewind(&mut self) {
        self.position = 0;
        self.retries_used += 1;
    }

    pub(crate) fn record_mismatch(&mut self, mismatch: Mismatch) {
        self.mismatch.get_or_insert(mismatch);
    }

    /// Move to the terminal state for `verdict`, fixing the conclusion.
    pub(crate) fn conclude(
        &mut self,
        verdict: Verdict,
        at: Timestamp,
    ) -> Result<(), StateMachineError> {
        let to = verdict.terminal_state();
        state_machine::validate_transition(self.state, to)?;
        self.state = to;
        self.conclusion = Some(verdict);
        self.terminated_at = Some(at);
        Ok(())
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;

    #[test]
    fn fresh_monitor_is_running() {
        let monitor = Monitor::new();
        assert!(monitor.is_fresh());
        assert_eq!(monitor.state(), FlowState::Running);
        assert_eq!(monitor.conclusion(), None);
    }

    #[test]
    fn observe_tracks_counts_and_last_seen() {
        let mut monitor = Monitor::new();
        monitor.observe(&Action::incoming("a").at(Timestamp(5)));
        monitor.observe(&Action::incoming("b").at(Timestamp(9)));
        assert_eq!(monitor.observed(Direction::In), 2);
        assert_eq!(monitor.observed(Direction::Out), 0);
        assert_eq!(monitor.last_seen(Direction::In), Some(Timestamp(9)));
        assert!(!monitor.is_fresh());
    }

    #[test]
    fn history_is_bounded() {
        let mut monitor = Monitor::with_history_limit(2);
        for i in 0..5u8 {
            monitor.observe(&Action::incoming(vec![i]));
        }
        let kept: Vec<_> = monitor.history().map(|a| a.payload().cloned()).collect();
        assert_eq!(kept, vec![Some(Payload::from(vec![3u8])), Some(Payload::from(vec![4u8]))]);
        assert_eq!(monitor.total_observed(), 5);
    }

    #[test]
    fn recorded_progress_is_not_fresh() {
        let mut monitor = Monitor::new();
        monitor.advance();
        assert!(!monitor.is_fresh());

        let mut monitor = Monitor::new();
        monitor.record_mismatch(Mismatch::TimedOut { position: 0 });
        assert!(!monitor.is_fresh());

        let mut monitor = Monitor::new();
        monitor.rewind();
        assert!(!monitor.is_fresh());
    }

    #[test]
    fn conclusion_is_fixed() {
        let mut monitor = Monitor::new();
        monitor.conclude(Verdict::Pass, Timestamp(1)).unwrap();
        assert!(monitor.conclude(Verdict::Fail, Timestamp(2)).is_err());
        assert_eq!(monitor.conclusion(), Some(Verdict::Pass));
        assert_eq!(monitor.terminated_at(), Some(Timestamp(1)));
    }

    #[test]
    fn first_mismatch_wins() {
        let mut monitor = Monitor::new();
        monitor.record_mismatch(Mismatch::TimedOut { position: 0 });
        monitor.record_mismatch(Mismatch::TimedOut { position: 3 });
        assert_eq!(monitor.mismatch(), Some(&Mismatch::TimedOut { position: 0 }));
    }
}
