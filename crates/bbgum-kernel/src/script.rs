//! Expected-behaviour model consumed by the controller
//!
//! A [`Script`] is the ordered list of events a flow must observe. It is
//! produced by the model generator and handed to elements at construction;
//! the kernel only compares against it.

use crate::action::Action;
use crate::error::FlowError;
use crate::types::{Direction, Payload};
use serde::{Deserialize, Serialize};

/// Constraint on an observed payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PayloadMatch {
    /// Any payload, including none
    #[default]
    Any,
    /// No payload at all
    Absent,
    /// Byte-for-byte equality
    Exact(Payload),
    /// Payload starts with these bytes
    Prefix(Payload),
}

impl PayloadMatch {
    /// Whether `payload` satisfies the constraint.
    #[must_use]
    pub fn matches(&self, payload: Option<&Payload>) -> bool {
        match (self, payload) {
            (Self::Any, _) => true,
            (Self::Absent, None) => true,
            (Self::Absent, Some(_)) => false,
            (Self::Exact(expected), Some(actual)) => expected == actual,
            (Self::Prefix(prefix), Some(actual)) => actual.starts_with(prefix),
            (Self::Exact(_) | Self::Prefix(_), None) => false,
        }
    }
}

/// One expected event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedStep {
    /// Either [`Direction::In`] or [`Direction::Out`]
    pub direction: Direction,
    /// Payload constraint
    pub payload: PayloadMatch,
}

impl ExpectedStep {
    /// Expect an event from the SUT.
    #[inline]
    #[must_use]
    pub fn incoming(payload: PayloadMatch) -> Self {
        Self {
            direction: Direction::In,
            payload,
        }
    }

    /// Expect an event sent to the SUT.
    #[inline]
    #[must_use]
    pub fn outgoing(payload: PayloadMatch) -> Self {
        Self {
            direction: Direction::Out,
            payload,
        }
    }

    /// Whether `action` is the event this step predicts.
    #[must_use]
    pub fn matches(&self, action: &Action) -> bool {
        self.direction == action.direction() && self.payload.matches(action.payload())
    }
}

/// Non-empty ordered sequence of expected steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ExpectedStep>", into = "Vec<ExpectedStep>")]
pub struct Script {
    steps: Vec<ExpectedStep>,
}

impl Script {
    /// Validate and build a script.
    ///
    /// # Errors
    /// [`FlowError::InvalidScript`] when `steps` is empty or a step expects a
    /// timeout, which is a notification rather than an observable event.
    pub fn new(steps: Vec<ExpectedStep>) -> Result<Self, FlowError> {
        if steps.is_empty() {
            return Err(FlowError::InvalidScript("script has no steps".to_string()));
        }
        if let Some(index) = steps.iter().position(|s| s.direction == Direction::Timeout) {
            return Err(FlowError::InvalidScript(format!(
                "step {index} expects a timeout"
            )));
        }
        Ok(Self { steps })
    }

    /// Single-step script.
    #[must_use]
    pub fn single(step: ExpectedStep) -> Self {
        Self { steps: vec![step] }
    }

    /// Step at `position`, `None` once the script is exhausted.
    #[inline]
    #[must_use]
    pub fn step(&self, position: usize) -> Option<&ExpectedStep> {
        self.steps.get(position)
    }

    /// Number of steps.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// All steps in order.
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[ExpectedStep] {
        &self.steps
    }
}

impl TryFrom<Vec<ExpectedStep>> for Script {
    type Error = FlowError;

    fn try_from(steps: Vec<ExpectedStep>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<Script> for Vec<ExpectedStep> {
    fn from(script: Script) -> Self {
        script.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_script() {
        assert!(matches!(Script::new(vec![]), Err(FlowError::InvalidScript(_))));
    }

    #[test]
    fn rejects_timeout_step() {
        let step = ExpectedStep {
            direction: Direction::Timeout,
            payload: PayloadMatch::Any,
        };
        let err = Script::new(vec![ExpectedStep::incoming(PayloadMatch::Any), step]).unwrap_err();
        assert_eq!(err, FlowError::InvalidScript("step 1 expects a timeout".into()));
    }

    #[test]
    fn payload_constraints() {
        let hello = Payload::from("HELLO");
        assert!(PayloadMatch::Any.matches(None));
        assert!(PayloadMatch::Absent.matches(None));
        assert!(!PayloadMatch::Absent.matches(Some(&hello)));
        assert!(PayloadMatch::Exact(hello.clone()).matches(Some(&hello)));
        assert!(PayloadMatch::Prefix(Payload::from("HE")).matches(Some(&hello)));
        assert!(!PayloadMatch::Exact(hello).matches(None));
    }

    #[test]
    fn step_checks_direction() {
        let step = ExpectedStep::incoming(PayloadMatch::Any);
        assert!(step.matches(&Action::incoming("x")));
        assert!(!step.matches(&Action::outgoing("x")));
    }

    #[test]
    fn deserialize_validates() {
        let err = serde_json::from_str::<Script>("[]");
        assert!(err.is_err());
        let script: Script =
            serde_json::from_str(r#"[{"direction":"In","payload":"Any"}]"#).unwrap();
        assert_eq!(script.len(), 1);
    }
}
