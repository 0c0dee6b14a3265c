use crate::error::StateMachineError;
use crate::types::FlowState;

/// Validates a flow-state transition.
///
/// Terminal states have no outgoing transitions, so once a flow concluded
/// every further request is rejected. With the `strict-debug` feature an
/// illegal transition panics instead.
pub fn validate_transition(from: FlowState, to: FlowState) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal flow transition attempted: {from:?} -> {to:?}");

        #[allow(unreachable_code)]
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step.
#[must_use]
pub fn allowed_transitions(from: FlowState) -> Vec<FlowState> {
    use FlowState::*;
    match from {
        Running => vec![TerminatedPass, TerminatedFail, TerminatedInconclusive],
        TerminatedPass | TerminatedFail | TerminatedInconclusive => vec![],
    }
}

fn allowed(from: FlowState, to: FlowState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
