//! Observed events handed to elements by the driver.

use crate::types::{Direction, Payload, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One observed event: direction, optional payload and observation time.
///
/// Immutable once built; handlers only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    direction: Direction,
    payload: Option<Payload>,
    observed_at: Timestamp,
}

impl Action {
    /// Build an action from all of its parts.
    #[must_use]
    pub fn new(direction: Direction, payload: Option<Payload>, observed_at: Timestamp) -> Self {
        Self {
            direction,
            payload,
            observed_at,
        }
    }

    /// Event emitted by the SUT, observed now.
    #[must_use]
    pub fn incoming(payload: impl Into<Payload>) -> Self {
        Self::new(Direction::In, Some(payload.into()), Timestamp::now())
    }

    /// Event sent to the SUT, observed now.
    #[must_use]
    pub fn outgoing(payload: impl Into<Payload>) -> Self {
        Self::new(Direction::Out, Some(payload.into()), Timestamp::now())
    }

    /// Deadline notification. The elapsed time travels as a little-endian
    /// millisecond payload.
    #[must_use]
    pub fn timeout(elapsed: Option<Duration>) -> Self {
        let payload = elapsed.map(|d| {
            let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
            Payload(millis.to_le_bytes().to_vec())
        });
        Self::new(Direction::Timeout, payload, Timestamp::now())
    }

    /// Same action, re-stamped.
    #[must_use]
    pub fn at(mut self, observed_at: Timestamp) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// Direction of the event.
    #[inline]
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Payload, if any.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// When the event was observed.
    #[inline]
    #[must_use]
    pub fn observed_at(&self) -> Timestamp {
        self.observed_at
    }

    /// Elapsed duration carried by a timeout action.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        if self.direction != Direction::Timeout {
            return None;
        }
        let bytes: [u8; 8] = self.payload.as_ref()?.as_bytes().try_into().ok()?;
        Some(Duration::from_millis(u64::from_le_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_carries_elapsed() {
        let action = Action::timeout(Some(Duration::from_millis(1500)));
        assert_eq!(action.direction(), Direction::Timeout);
        assert_eq!(action.elapsed(), Some(Duration::from_millis(1500)));
        assert_eq!(Action::timeout(None).elapsed(), None);
    }

    #[test]
    fn elapsed_only_for_timeouts() {
        let action = Action::incoming(vec![0u8; 8]);
        assert_eq!(action.elapsed(), None);
    }

    #[test]
    fn restamp_keeps_fields() {
        let action = Action::outgoing("PING").at(Timestamp(42));
        assert_eq!(action.observed_at(), Timestamp(42));
        assert_eq!(action.payload(), Some(&Payload::from("PING")));
    }
}
