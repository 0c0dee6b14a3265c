use super::{sealed, Variant};
use crate::controller::{EventController, FlowHandler};
use crate::script::Script;
use crate::types::{VariantTag, Verdict};
use std::sync::Arc;

/// The SUT as a black box, compared step by step against a [`Script`].
///
/// Every incoming or outgoing event must match the step at the current
/// position. The flow passes on the last match, fails on the first
/// deviation and ends with [`BlackBox::timeout_verdict`] on a deadline.
#[derive(Debug, Clone)]
pub struct BlackBox {
    script: Arc<Script>,
    timeout_verdict: Verdict,
}

impl BlackBox {
    /// Black box expecting `script`; a timeout is [`Verdict::Inconclusive`].
    #[must_use]
    pub fn new(script: impl Into<Arc<Script>>) -> Self {
        Self {
            script: script.into(),
            timeout_verdict: Verdict::Inconclusive,
        }
    }

    /// Verdict recorded when a deadline elapses before the script completes.
    #[must_use]
    pub fn with_timeout_verdict(mut self, verdict: Verdict) -> Self {
        self.timeout_verdict = verdict;
        self
    }

    /// Expected-step model.
    #[inline]
    #[must_use]
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Verdict used on timeout.
    #[inline]
    #[must_use]
    pub fn timeout_verdict(&self) -> Verdict {
        self.timeout_verdict
    }
}

impl sealed::Sealed for BlackBox {}

impl Variant for BlackBox {
    const TAG: VariantTag = VariantTag::BlackBox;

    fn handler(controller: &dyn EventController) -> Option<&dyn FlowHandler<Self>> {
        controller.black_box()
    }
}
