//! Test elements and the element side of the dispatch protocol
//!
//! An element never decides anything itself. Each delivery operation looks up
//! the controller's handler for the element's own variant and passes it a
//! call-scoped view of the element's monitor. Verdict logic therefore lives
//! in one place (the controller) while routing needs no central type switch.
//!
//! ```rust,ignore
//! use bbgum_kernel::prelude::*;
//!
//! let controller = ConformanceController::new(ControllerConfig::default());
//! let script = Script::single(ExpectedStep::incoming(PayloadMatch::Any));
//! let mut element = Element::fresh(BlackBox::new(script));
//!
//! element.incoming(&controller, &Action::incoming("HELLO"))?;
//! assert!(element.is_flow_term(&controller)?);
//! assert_eq!(element.conclusion(&controller)?, Verdict::Pass);
//! ```

mod black_box;
mod exchange;
mod quiescence;

pub use black_box::BlackBox;
pub use exchange::{Exchange, ExchangePhase};
pub use quiescence::Quiescence;

use crate::action::Action;
use crate::controller::{EventController, FlowHandler};
use crate::error::FlowError;
use crate::monitor::{Mismatch, Monitor};
use crate::types::{Direction, ElementId, Timestamp, VariantTag, Verdict};
use std::fmt;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Variant-specific data of an element.
///
/// Implemented by the closed set of variants this crate ships. Each variant
/// knows its tag and which controller accessor serves it; that selection is
/// the first half of the double dispatch.
pub trait Variant: sealed::Sealed + Sized + Send + Sync + fmt::Debug + 'static {
    /// Tag used in diagnostics and journal records.
    const TAG: VariantTag;

    /// Handler the controller registers for this variant, if any.
    fn handler(controller: &dyn EventController) -> Option<&dyn FlowHandler<Self>>;
}

/// Dispatch contract every element exposes to the driver.
///
/// Deliveries for one element must be made in observation order;
/// `&mut self` keeps them from overlapping.
pub trait EventElement: Send + fmt::Debug {
    /// Element identity.
    fn id(&self) -> ElementId;

    /// Variant of this element.
    fn tag(&self) -> VariantTag;

    /// Deliver an event emitted by the SUT.
    ///
    /// # Errors
    /// [`FlowError::UnsupportedVariant`] if `controller` does not handle this
    /// variant, [`FlowError::MisroutedAction`] if `action` is not incoming.
    fn incoming(&mut self, controller: &dyn EventController, action: &Action)
        -> Result<(), FlowError>;

    /// Deliver an event sent to the SUT.
    ///
    /// # Errors
    /// As for [`EventElement::incoming`].
    fn outgoing(&mut self, controller: &dyn EventController, action: &Action)
        -> Result<(), FlowError>;

    /// Deliver a deadline notification.
    ///
    /// # Errors
    /// As for [`EventElement::incoming`].
    fn timeout(&mut self, controller: &dyn EventController, action: &Action)
        -> Result<(), FlowError>;

    /// Whether the flow reached a terminal state. Never mutates the monitor.
    ///
    /// # Errors
    /// [`FlowError::UnsupportedVariant`].
    fn is_flow_term(&self, controller: &dyn EventController) -> Result<bool, FlowError>;

    /// Verdict fixed when the flow terminated. Never mutates the monitor.
    ///
    /// # Errors
    /// [`FlowError::PrematureConclusion`] while the flow is still running,
    /// [`FlowError::UnsupportedVariant`].
    fn conclusion(&self, controller: &dyn EventController) -> Result<Verdict, FlowError>;
}

/// One interaction point with the SUT, owning its monitor.
#[derive(Debug)]
pub struct Element<V: Variant> {
    id: ElementId,
    variant: V,
    monitor: Monitor,
}

/// Element comparing the whole SUT against a script.
pub type BlackBoxElement = Element<BlackBox>;
/// Element tracking one request/reply exchange.
pub type ExchangeElement = Element<Exchange>;
/// Element requiring the SUT to stay silent.
pub type QuiescenceElement = Element<Quiescence>;

impl<V: Variant> Element<V> {
    /// Build an element around a supplied monitor.
    ///
    /// # Errors
    /// [`FlowError::MonitorNotFresh`] if the monitor already observed events
    /// or left [`FlowState::Running`](crate::FlowState::Running).
    pub fn new(variant: V, monitor: Monitor) -> Result<Self, FlowError> {
        if !monitor.is_fresh() {
            return Err(FlowError::MonitorNotFresh {
                state: monitor.state(),
                observed: monitor.total_observed() + monitor.late_events(),
            });
        }
        Ok(Self {
            id: ElementId::new(),
            variant,
            monitor,
        })
    }

    /// Build an element with a default monitor.
    #[must_use]
    pub fn fresh(variant: V) -> Self {
        Self::with_fresh_monitor(variant, Monitor::new())
    }

    pub(crate) fn with_fresh_monitor(variant: V, monitor: Monitor) -> Self {
        debug_assert!(monitor.is_fresh());
        Self {
            id: ElementId::new(),
            variant,
            monitor,
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: ElementId) -> Self {
        self.id = id;
        self
    }

    /// Variant data.
    #[inline]
    #[must_use]
    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Read-only snapshot of the monitor, for reporting.
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    fn flow_mut(&mut self) -> FlowMut<'_, V> {
        FlowMut {
            id: self.id,
            variant: &self.variant,
            monitor: &mut self.monitor,
        }
    }

    fn flow_ref(&self) -> FlowRef<'_, V> {
        FlowRef {
            id: self.id,
            variant: &self.variant,
            monitor: &self.monitor,
        }
    }

    fn handler<'c>(
        &self,
        controller: &'c dyn EventController,
    ) -> Result<&'c dyn FlowHandler<V>, FlowError> {
        V::handler(controller).ok_or_else(|| {
            tracing::error!(
                element = %self.id,
                variant = %V::TAG,
                controller = controller.name(),
                "no handler registered for variant"
            );
            FlowError::unsupported(V::TAG, controller.name())
        })
    }
}

fn check_route(expected: Direction, action: &Action) -> Result<(), FlowError> {
    if action.direction() == expected {
        Ok(())
    } else {
        Err(FlowError::MisroutedAction {
            expected,
            actual: action.direction(),
        })
    }
}

impl<V: Variant> EventElement for Element<V> {
    fn id(&self) -> ElementId {
        self.id
    }

    fn tag(&self) -> VariantTag {
        V::TAG
    }

    fn incoming(
        &mut self,
        controller: &dyn EventController,
        action: &Action,
    ) -> Result<(), FlowError> {
        let handler = self.handler(controller)?;
        check_route(Direction::In, action)?;
        tracing::debug!(element = %self.id, variant = %V::TAG, "incoming event");
        handler.on_incoming(self.flow_mut(), action)
    }

    fn outgoing(
        &mut self,
        controller: &dyn EventController,
        action: &Action,
    ) -> Result<(), FlowError> {
        let handler = self.handler(controller)?;
        check_route(Direction::Out, action)?;
        tracing::debug!(element = %self.id, variant = %V::TAG, "outgoing event");
        handler.on_outgoing(self.flow_mut(), action)
    }

    fn timeout(
        &mut self,
        controller: &dyn EventController,
        action: &Action,
    ) -> Result<(), FlowError> {
        let handler = self.handler(controller)?;
        check_route(Direction::Timeout, action)?;
        tracing::debug!(element = %self.id, variant = %V::TAG, "timeout");
        handler.on_timeout(self.flow_mut(), action)
    }

    fn is_flow_term(&self, controller: &dyn EventController) -> Result<bool, FlowError> {
        Ok(self.handler(controller)?.is_flow_term(self.flow_ref()))
    }

    fn conclusion(&self, controller: &dyn EventController) -> Result<Verdict, FlowError> {
        self.handler(controller)?.conclusion(self.flow_ref())
    }
}

/// Mutable, call-scoped view of one flow handed to a controller handler.
///
/// The only way to mutate a [`Monitor`]; it cannot outlive the delivery
/// that created it.
#[derive(Debug)]
pub struct FlowMut<'a, V> {
    id: ElementId,
    variant: &'a V,
    monitor: &'a mut Monitor,
}

impl<'a, V> FlowMut<'a, V> {
    /// Element identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Variant data, borrowed for the whole call.
    #[inline]
    #[must_use]
    pub fn variant(&self) -> &'a V {
        self.variant
    }

    /// Current monitor contents.
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &*self.monitor
    }

    /// Read-only view of the same flow.
    #[must_use]
    pub fn view(&self) -> FlowRef<'_, V> {
        FlowRef {
            id: self.id,
            variant: self.variant,
            monitor: &*self.monitor,
        }
    }

    /// Record an action observed while running.
    pub fn observe(&mut self, action: &Action) {
        self.monitor.observe(action);
    }

    /// Count an event delivered after termination.
    pub fn record_late(&mut self) {
        self.monitor.record_late();
    }

    /// Mark the current expected step as matched; returns the new position.
    pub fn advance(&mut self) -> usize {
        self.monitor.advance()
    }

    /// Restart the model from its first step, consuming one retry.
    pub fn rewind_for_retry(&mut self) {
        self.monitor.rewind();
    }

    /// Record why the flow deviated. Only the first deviation is kept.
    pub fn record_mismatch(&mut self, mismatch: Mismatch) {
        self.monitor.record_mismatch(mismatch);
    }

    /// Terminate the flow with `verdict`.
    ///
    /// # Errors
    /// [`FlowError::StateMachine`] if the flow is already terminal.
    pub fn conclude(&mut self, verdict: Verdict, at: Timestamp) -> Result<(), FlowError> {
        self.monitor.conclude(verdict, at)?;
        Ok(())
    }
}

/// Read-only view of one flow handed to the query handlers.
#[derive(Debug)]
pub struct FlowRef<'a, V> {
    id: ElementId,
    variant: &'a V,
    monitor: &'a Monitor,
}

impl<V> Clone for FlowRef<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for FlowRef<'_, V> {}

impl<'a, V> FlowRef<'a, V> {
    /// Element identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Variant data.
    #[inline]
    #[must_use]
    pub fn variant(&self) -> &'a V {
        self.variant
    }

    /// Monitor contents.
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &'a Monitor {
        self.monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ExpectedStep, PayloadMatch, Script};

    #[derive(Debug)]
    struct Silent;

    impl EventController for Silent {
        fn name(&self) -> &str {
            "silent"
        }
    }

    fn element() -> BlackBoxElement {
        Element::fresh(BlackBox::new(Script::single(ExpectedStep::incoming(
            PayloadMatch::Any,
        ))))
    }

    #[test]
    fn rejects_used_monitor() {
        let mut monitor = Monitor::new();
        monitor.observe(&Action::incoming("x"));
        let variant = BlackBox::new(Script::single(ExpectedStep::incoming(PayloadMatch::Any)));
        let err = Element::new(variant, monitor).unwrap_err();
        assert_eq!(
            err,
            FlowError::MonitorNotFresh {
                state: crate::FlowState::Running,
                observed: 1
            }
        );
    }

    #[test]
    fn unsupported_variant_is_fatal() {
        let mut element = element();
        let err = element.incoming(&Silent, &Action::incoming("x")).unwrap_err();
        assert_eq!(err, FlowError::unsupported(VariantTag::BlackBox, "silent"));
        assert!(element.is_flow_term(&Silent).is_err());
        assert!(element.conclusion(&Silent).is_err());
        assert!(element.monitor().is_fresh());
    }

    #[test]
    fn dyn_element_reports_tag() {
        let boxed: Box<dyn EventElement> = Box::new(element());
        assert_eq!(boxed.tag(), VariantTag::BlackBox);
    }
}
