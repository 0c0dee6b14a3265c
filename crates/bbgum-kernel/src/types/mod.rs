//! Value types shared by every layer of the flow kernel.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Raw millisecond value.
    #[inline]
    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0
    }
}

/// Identity of one element, used for diagnostics and journaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
    /// Fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque payload carried by an [`Action`](crate::Action).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    /// Borrow the raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the payload starts with `prefix`.
    #[inline]
    #[must_use]
    pub fn starts_with(&self, prefix: &Payload) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Direction of an observed event, relative to the system under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Emitted by the SUT.
    In,
    /// Sent to the SUT.
    Out,
    /// A deadline elapsed.
    Timeout,
}

impl Direction {
    /// Dense index, used for per-direction bookkeeping arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Direction::In => 0,
            Direction::Out => 1,
            Direction::Timeout => 2,
        }
    }
}

/// Which element variant a flow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantTag {
    /// The whole SUT compared against a script.
    BlackBox,
    /// A single request/reply interaction.
    Exchange,
    /// The SUT must stay silent until a deadline.
    Quiescence,
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantTag::BlackBox => "black-box",
            VariantTag::Exchange => "exchange",
            VariantTag::Quiescence => "quiescence",
        };
        f.write_str(name)
    }
}

/// Final classification of a terminated flow.
///
/// Codes are stable and part of the reporting contract:
/// `Pass = 0`, `Fail = 1`, `Inconclusive = 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Verdict {
    /// Observed behaviour matched the model to completion.
    Pass = 0,
    /// Observed behaviour deviated from the model.
    Fail = 1,
    /// The flow ended without enough evidence either way.
    Inconclusive = 2,
}

impl Verdict {
    /// Integer code of this verdict.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Decode an integer verdict code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Verdict::Pass),
            1 => Some(Verdict::Fail),
            2 => Some(Verdict::Inconclusive),
            _ => None,
        }
    }

    /// Terminal flow state carrying this verdict.
    #[inline]
    #[must_use]
    pub const fn terminal_state(self) -> FlowState {
        match self {
            Verdict::Pass => FlowState::TerminatedPass,
            Verdict::Fail => FlowState::TerminatedFail,
            Verdict::Inconclusive => FlowState::TerminatedInconclusive,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a flow, tracked on its monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowState {
    /// Still accepting events.
    #[default]
    Running,
    /// Terminated with [`Verdict::Pass`].
    TerminatedPass,
    /// Terminated with [`Verdict::Fail`].
    TerminatedFail,
    /// Terminated with [`Verdict::Inconclusive`].
    TerminatedInconclusive,
}

impl FlowState {
    /// Whether no further transition is possible.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, FlowState::Running)
    }

    /// Verdict carried by a terminal state.
    #[must_use]
    pub const fn verdict(self) -> Option<Verdict> {
        match self {
            FlowState::Running => None,
            FlowState::TerminatedPass => Some(Verdict::Pass),
            FlowState::TerminatedFail => Some(Verdict::Fail),
            FlowState::TerminatedInconclusive => Some(Verdict::Inconclusive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_codes_round_trip() {
        for verdict in [Verdict::Pass, Verdict::Fail, Verdict::Inconclusive] {
            assert_eq!(Verdict::from_code(verdict.code()), Some(verdict));
            assert_eq!(verdict.terminal_state().verdict(), Some(verdict));
        }
        assert_eq!(Verdict::from_code(7), None);
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!FlowState::Running.is_terminal());
        assert!(FlowState::TerminatedFail.is_terminal());
        assert_eq!(FlowState::Running.verdict(), None);
    }

    #[test]
    fn payload_prefix() {
        let payload = Payload::from("HELLO world");
        assert!(payload.starts_with(&Payload::from("HELLO")));
        assert!(!payload.starts_with(&Payload::from("world")));
    }
}
