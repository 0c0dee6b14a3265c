//! Cross-flow verdict counters shared by every flow under a controller.

use crate::types::Verdict;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySnapshot {
    /// Flows concluded with [`Verdict::Pass`]
    pub pass: u64,
    /// Flows concluded with [`Verdict::Fail`]
    pub fail: u64,
    /// Flows concluded with [`Verdict::Inconclusive`]
    pub inconclusive: u64,
}

impl TallySnapshot {
    /// Count for one verdict.
    #[must_use]
    pub fn get(&self, verdict: Verdict) -> u64 {
        match verdict {
            Verdict::Pass => self.pass,
            Verdict::Fail => self.fail,
            Verdict::Inconclusive => self.inconclusive,
        }
    }

    /// All concluded flows.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.pass + self.fail + self.inconclusive
    }

    fn bump(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.pass += 1,
            Verdict::Fail => self.fail += 1,
            Verdict::Inconclusive => self.inconclusive += 1,
        }
    }
}

/// Lock-guarded verdict counters, injected into controllers via `Arc`
#[derive(Debug, Default)]
pub struct VerdictTally {
    inner: Mutex<TallySnapshot>,
}

impl VerdictTally {
    /// Empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one concluded flow.
    pub fn record(&self, verdict: Verdict) {
        self.inner.lock().bump(verdict);
    }

    /// Copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> TallySnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_per_verdict() {
        let tally = VerdictTally::new();
        tally.record(Verdict::Pass);
        tally.record(Verdict::Pass);
        tally.record(Verdict::Inconclusive);
        let snap = tally.snapshot();
        assert_eq!(snap.get(Verdict::Pass), 2);
        assert_eq!(snap.get(Verdict::Fail), 0);
        assert_eq!(snap.total(), 3);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let tally = Arc::new(VerdictTally::new());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let tally = Arc::clone(&tally);
                scope.spawn(move || {
                    for _ in 0..1_000 {
                        tally.record(Verdict::Fail);
                    }
                });
            }
        });
        assert_eq!(tally.snapshot().fail, 8_000);
    }
}
