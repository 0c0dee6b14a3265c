//! Error types for the flow kernel
//!
//! Only programming and configuration errors surface here. Testing-domain
//! outcomes (protocol mismatches, timeouts, completion) are verdicts recorded
//! on the monitor and never travel through `Err`.

use crate::types::{Direction, ElementId, FlowState, VariantTag};

/// Fault raised by element construction, dispatch or queries
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// The controller registers no handler for this element variant
    #[error("controller `{controller}` has no handler for {variant} elements")]
    UnsupportedVariant {
        /// Variant of the element that was dispatched
        variant: VariantTag,
        /// Name of the controller that rejected it
        controller: String,
    },

    /// Conclusion requested while the flow is still running
    #[error("conclusion of element {element} requested while its flow is still running")]
    PrematureConclusion {
        /// Element that was queried
        element: ElementId,
    },

    /// A monitor that already observed events was handed to a new element
    #[error("monitor is not fresh: state {state:?}, {observed} events observed")]
    MonitorNotFresh {
        /// State found on the monitor
        state: FlowState,
        /// Events already recorded
        observed: u64,
    },

    /// Action delivered through the wrong operation
    #[error("{actual:?} action delivered through the {expected:?} operation")]
    MisroutedAction {
        /// Direction implied by the delivery operation
        expected: Direction,
        /// Direction carried by the action
        actual: Direction,
    },

    /// Expected-behaviour model rejected at construction
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Monitor refused a state change
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),
}

impl FlowError {
    /// Whether the driver must abort the run.
    ///
    /// Everything except script validation is a wiring defect in the driver
    /// or controller.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidScript(_))
    }

    /// Build an [`FlowError::UnsupportedVariant`].
    #[inline]
    pub fn unsupported(variant: VariantTag, controller: impl Into<String>) -> Self {
        Self::UnsupportedVariant {
            variant,
            controller: controller.into(),
        }
    }
}

/// Rejected flow-state transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not in the allowed matrix
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: FlowState,
        /// Requested state
        to: FlowState,
    },
}

/// Verdict journal failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JournalError {
    /// Hash chain broken at the given sequence number
    #[error("journal integrity violation at record {seq}")]
    IntegrityViolation {
        /// First record failing verification
        seq: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_variant_display() {
        let err = FlowError::unsupported(VariantTag::Exchange, "partial");
        assert_eq!(
            err.to_string(),
            "controller `partial` has no handler for exchange elements"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn invalid_script_is_not_fatal() {
        assert!(!FlowError::InvalidScript("empty".into()).is_fatal());
    }

    #[test]
    fn state_machine_error_converts() {
        let err: FlowError = StateMachineError::IllegalTransition {
            from: FlowState::TerminatedPass,
            to: FlowState::TerminatedFail,
        }
        .into();
        assert!(matches!(err, FlowError::StateMachine(_)));
    }
}
