//! Controller side of the dispatch protocol
//!
//! - [`FlowHandler`]: the per-variant handler set (incoming, outgoing,
//!   timeout, terminal query, conclusion query)
//! - [`EventController`]: one accessor per variant; a controller registers a
//!   variant by returning its handler, and rejects it by keeping the default
//! - [`ConformanceController`]: the shipped controller, handling every variant
//!   and feeding a shared tally and journal
//!
//! Adding a variant adds one defaulted accessor here. Controllers written
//! before it keep compiling and report
//! [`FlowError::UnsupportedVariant`] for it.

mod conformance;

pub use conformance::ConformanceController;

use crate::action::Action;
use crate::element::{BlackBox, Exchange, FlowMut, FlowRef, Quiescence};
use crate::error::FlowError;
use crate::monitor::DEFAULT_HISTORY_LIMIT;
use crate::types::Verdict;
use serde::{Deserialize, Serialize};

/// Handlers for one element variant
///
/// Delivery handlers receive exclusive, call-scoped access to the flow's
/// monitor. Query handlers receive a read-only view and therefore cannot
/// mutate it.
pub trait FlowHandler<V>: Send + Sync {
    /// Event emitted by the SUT.
    ///
    /// # Errors
    /// Only programming errors; mismatches are recorded as verdicts.
    fn on_incoming(&self, flow: FlowMut<'_, V>, action: &Action) -> Result<(), FlowError>;

    /// Event sent to the SUT.
    ///
    /// # Errors
    /// Only programming errors; mismatches are recorded as verdicts.
    fn on_outgoing(&self, flow: FlowMut<'_, V>, action: &Action) -> Result<(), FlowError>;

    /// Deadline notification.
    ///
    /// # Errors
    /// Only programming errors; timeouts are recorded as verdicts.
    fn on_timeout(&self, flow: FlowMut<'_, V>, action: &Action) -> Result<(), FlowError>;

    /// Whether the flow left [`FlowState::Running`](crate::FlowState::Running).
    fn is_flow_term(&self, flow: FlowRef<'_, V>) -> bool {
        flow.monitor().is_terminal()
    }

    /// Verdict of the terminal state the flow reached.
    ///
    /// # Errors
    /// [`FlowError::PrematureConclusion`] while the flow is running.
    fn conclusion(&self, flow: FlowRef<'_, V>) -> Result<Verdict, FlowError> {
        flow.monitor()
            .state()
            .verdict()
            .ok_or(FlowError::PrematureConclusion { element: flow.id() })
    }
}

/// Dispatcher holding the verdict logic for every supported variant
pub trait EventController: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Handler for [`BlackBox`] elements.
    fn black_box(&self) -> Option<&dyn FlowHandler<BlackBox>> {
        None
    }

    /// Handler for [`Exchange`] elements.
    fn exchange(&self) -> Option<&dyn FlowHandler<Exchange>> {
        None
    }

    /// Handler for [`Quiescence`] elements.
    fn quiescence(&self) -> Option<&dyn FlowHandler<Quiescence>> {
        None
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Name reported in diagnostics
    pub name: String,
    /// Append terminal transitions to the journal, when one is attached
    pub journal_verdicts: bool,
    /// Emit a warning for every event delivered after termination
    pub trace_late_events: bool,
    /// History retained by monitors this controller creates
    pub history_limit: usize,
}

impl ControllerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With diagnostic name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// With monitor history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// With journaling switched on or off
    #[inline]
    #[must_use]
    pub fn with_journal_verdicts(mut self, enabled: bool) -> Self {
        self.journal_verdicts = enabled;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: "conformance".to_string(),
            journal_verdicts: true,
            trace_late_events: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}
