use super::{sealed, Variant};
use crate::controller::{EventController, FlowHandler};
use crate::script::{ExpectedStep, PayloadMatch};
use crate::types::VariantTag;

/// Where an exchange flow stands, derived from the monitor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Waiting for the request to be sent to the SUT
    AwaitRequest,
    /// Request sent, waiting for the SUT's reply
    AwaitReply,
}

/// One request/reply interaction with the SUT.
///
/// Expects an outgoing request followed by an incoming reply. A timeout
/// while awaiting the reply consumes a retry and rewinds the flow to await a
/// retransmitted request.
#[derive(Debug, Clone)]
pub struct Exchange {
    request: PayloadMatch,
    reply: PayloadMatch,
    retries: u32,
}

impl Exchange {
    /// Exchange without retries.
    #[must_use]
    pub fn new(request: PayloadMatch, reply: PayloadMatch) -> Self {
        Self {
            request,
            reply,
            retries: 0,
        }
    }

    /// Allow `retries` reply timeouts before failing.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Retry budget.
    #[inline]
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Phase corresponding to a monitor position.
    #[inline]
    #[must_use]
    pub fn phase(position: usize) -> ExchangePhase {
        if position == 0 {
            ExchangePhase::AwaitRequest
        } else {
            ExchangePhase::AwaitReply
        }
    }

    /// Step expected in `phase`.
    #[must_use]
    pub fn expected(&self, phase: ExchangePhase) -> ExpectedStep {
        match phase {
            ExchangePhase::AwaitRequest => ExpectedStep::outgoing(self.request.clone()),
            ExchangePhase::AwaitReply => ExpectedStep::incoming(self.reply.clone()),
        }
    }
}

impl sealed::Sealed for Exchange {}

impl Variant for Exchange {
    const TAG: VariantTag = VariantTag::Exchange;

    fn handler(controller: &dyn EventController) -> Option<&dyn FlowHandler<Self>> {
        controller.exchange()
    }
}
