//! Default controller: compares flows against their models and keeps the
//! cross-flow tally and journal.

use super::{ControllerConfig, EventController, FlowHandler};
use crate::action::Action;
use crate::element::{BlackBox, Element, Exchange, ExchangePhase, FlowMut, Quiescence, Variant};
use crate::error::FlowError;
use crate::journal::Journal;
use crate::monitor::{Mismatch, Monitor};
use crate::tally::VerdictTally;
use crate::types::{Direction, Verdict};
use std::sync::Arc;

/// Controller handling every element variant.
///
/// Per-flow progress lives on each element's monitor, so one controller can
/// serve any number of flows from any number of threads. The tally and
/// journal are the only shared state and are lock-guarded.
#[derive(Debug, Clone)]
pub struct ConformanceController {
    config: ControllerConfig,
    tally: Arc<VerdictTally>,
    journal: Option<Arc<Journal>>,
}

impl ConformanceController {
    /// Controller with its own empty tally and no journal.
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            tally: Arc::new(VerdictTally::new()),
            journal: None,
        }
    }

    /// Share an existing tally, e.g. across several controllers.
    #[must_use]
    pub fn with_tally(mut self, tally: Arc<VerdictTally>) -> Self {
        self.tally = tally;
        self
    }

    /// Attach a verdict journal.
    #[must_use]
    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Shared verdict counters.
    #[inline]
    #[must_use]
    pub fn tally(&self) -> &Arc<VerdictTally> {
        &self.tally
    }

    /// Attached journal, if any.
    #[inline]
    #[must_use]
    pub fn journal(&self) -> Option<&Arc<Journal>> {
        self.journal.as_ref()
    }

    /// Fresh monitor honouring the configured history limit.
    #[must_use]
    pub fn new_monitor(&self) -> Monitor {
        Monitor::with_history_limit(self.config.history_limit)
    }

    /// Construct an element around a monitor from [`Self::new_monitor`].
    #[must_use]
    pub fn element<V: Variant>(&self, variant: V) -> Element<V> {
        Element::with_fresh_monitor(variant, self.new_monitor())
    }

    /// Record `action` on a running flow. Returns `false` for a late event,
    /// which is counted but otherwise ignored.
    fn admit<V: Variant>(&self, flow: &mut FlowMut<'_, V>, action: &Action) -> bool {
        if flow.monitor().is_terminal() {
            flow.record_late();
            if self.config.trace_late_events {
                tracing::warn!(
                    element = %flow.id(),
                    variant = %V::TAG,
                    direction = ?action.direction(),
                    late = flow.monitor().late_events(),
                    "event after termination ignored"
                );
            }
            return false;
        }
        flow.observe(action);
        true
    }

    fn conclude<V: Variant>(
        &self,
        flow: &mut FlowMut<'_, V>,
        verdict: Verdict,
        action: &Action,
    ) -> Result<(), FlowError> {
        flow.conclude(verdict, action.observed_at())?;
        self.tally.record(verdict);
        if self.config.journal_verdicts {
            if let Some(journal) = &self.journal {
                let detail = flow.monitor().mismatch().map(|m| format!("{m:?}"));
                journal.append(flow.id(), V::TAG, verdict, action.observed_at(), detail);
            }
        }
        tracing::info!(
            element = %flow.id(),
            variant = %V::TAG,
            %verdict,
            observed = flow.monitor().total_observed(),
            "flow terminated"
        );
        Ok(())
    }

    fn fail<V: Variant>(
        &self,
        flow: &mut FlowMut<'_, V>,
        mismatch: Mismatch,
        action: &Action,
    ) -> Result<(), FlowError> {
        flow.record_mismatch(mismatch);
        self.conclude(flow, Verdict::Fail, action)
    }

    fn black_box_step(
        &self,
        mut flow: FlowMut<'_, BlackBox>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        let script = flow.variant().script();
        let position = flow.monitor().position();
        match script.step(position) {
            Some(step) if step.matches(action) => {
                if flow.advance() == script.len() {
                    self.conclude(&mut flow, Verdict::Pass, action)?;
                }
                Ok(())
            }
            expected => {
                let mismatch = Mismatch::Unexpected {
                    position,
                    expected: expected.cloned(),
                    observed: action.direction(),
                };
                self.fail(&mut flow, mismatch, action)
            }
        }
    }
}

impl Default for ConformanceController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl EventController for ConformanceController {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn black_box(&self) -> Option<&dyn FlowHandler<BlackBox>> {
        Some(self)
    }

    fn exchange(&self) -> Option<&dyn FlowHandler<Exchange>> {
        Some(self)
    }

    fn quiescence(&self) -> Option<&dyn FlowHandler<Quiescence>> {
        Some(self)
    }
}

impl FlowHandler<BlackBox> for ConformanceController {
    fn on_incoming(&self, flow: FlowMut<'_, BlackBox>, action: &Action) -> Result<(), FlowError> {
        self.black_box_step(flow, action)
    }

    fn on_outgoing(&self, flow: FlowMut<'_, BlackBox>, action: &Action) -> Result<(), FlowError> {
        self.black_box_step(flow, action)
    }

    fn on_timeout(
        &self,
        mut flow: FlowMut<'_, BlackBox>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        let verdict = flow.variant().timeout_verdict();
        if verdict != Verdict::Pass {
            let position = flow.monitor().position();
            flow.record_mismatch(Mismatch::TimedOut { position });
        }
        self.conclude(&mut flow, verdict, action)
    }
}

impl FlowHandler<Exchange> for ConformanceController {
    fn on_incoming(
        &self,
        mut flow: FlowMut<'_, Exchange>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        let position = flow.monitor().position();
        let phase = Exchange::phase(position);
        let expected = flow.variant().expected(phase);
        if phase == ExchangePhase::AwaitReply && expected.matches(action) {
            flow.advance();
            return self.conclude(&mut flow, Verdict::Pass, action);
        }
        let mismatch = Mismatch::Unexpected {
            position,
            expected: Some(expected),
            observed: Direction::In,
        };
        self.fail(&mut flow, mismatch, action)
    }

    fn on_outgoing(
        &self,
        mut flow: FlowMut<'_, Exchange>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        let position = flow.monitor().position();
        let phase = Exchange::phase(position);
        let expected = flow.variant().expected(phase);
        if phase == ExchangePhase::AwaitRequest && expected.matches(action) {
            flow.advance();
            return Ok(());
        }
        let mismatch = Mismatch::Unexpected {
            position,
            expected: Some(expected),
            observed: Direction::Out,
        };
        self.fail(&mut flow, mismatch, action)
    }

    fn on_timeout(
        &self,
        mut flow: FlowMut<'_, Exchange>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        let position = flow.monitor().position();
        match Exchange::phase(position) {
            // The request never went out: the SUT was not exercised.
            ExchangePhase::AwaitRequest => {
                flow.record_mismatch(Mismatch::TimedOut { position });
                self.conclude(&mut flow, Verdict::Inconclusive, action)
            }
            ExchangePhase::AwaitReply if flow.monitor().retries_used() < flow.variant().retries() => {
                flow.rewind_for_retry();
                tracing::debug!(
                    element = %flow.id(),
                    retries_used = flow.monitor().retries_used(),
                    "reply timed out, awaiting retransmission"
                );
                Ok(())
            }
            ExchangePhase::AwaitReply => {
                self.fail(&mut flow, Mismatch::TimedOut { position }, action)
            }
        }
    }
}

impl FlowHandler<Quiescence> for ConformanceController {
    fn on_incoming(
        &self,
        mut flow: FlowMut<'_, Quiescence>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        let mismatch = Mismatch::Unexpected {
            position: 0,
            expected: None,
            observed: Direction::In,
        };
        self.fail(&mut flow, mismatch, action)
    }

    fn on_outgoing(
        &self,
        mut flow: FlowMut<'_, Quiescence>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) || !flow.variant().is_strict() {
            return Ok(());
        }
        let mismatch = Mismatch::Unexpected {
            position: 0,
            expected: None,
            observed: Direction::Out,
        };
        self.fail(&mut flow, mismatch, action)
    }

    fn on_timeout(
        &self,
        mut flow: FlowMut<'_, Quiescence>,
        action: &Action,
    ) -> Result<(), FlowError> {
        if !self.admit(&mut flow, action) {
            return Ok(());
        }
        self.conclude(&mut flow, Verdict::Pass, action)
    }
}
