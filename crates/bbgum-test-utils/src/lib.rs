//! Testing utilities for the BbGum workspace
//!
//! Shared fixtures, a partial controller and delivery helpers.

#![allow(missing_docs)]

use bbgum_kernel::{
    Action, BlackBox, ConformanceController, ControllerConfig, Direction, EventController,
    EventElement, ExpectedStep, FlowError, FlowHandler, FlowMut, Payload, PayloadMatch, Script,
    Timestamp, Verdict,
};

/// Install a test-writer subscriber once per process; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn exact(payload: &str) -> PayloadMatch {
    PayloadMatch::Exact(Payload::from(payload))
}

pub fn prefix(payload: &str) -> PayloadMatch {
    PayloadMatch::Prefix(Payload::from(payload))
}

/// Script from `(direction, exact payload)` pairs.
pub fn script(steps: &[(Direction, &str)]) -> Script {
    let steps = steps
        .iter()
        .map(|(direction, payload)| ExpectedStep {
            direction: *direction,
            payload: exact(payload),
        })
        .collect();
    Script::new(steps).unwrap()
}

/// `OUT REQ` followed by `IN ACK`.
pub fn request_ack_script() -> Script {
    script(&[(Direction::Out, "REQ"), (Direction::In, "ACK")])
}

pub fn request_ack() -> BlackBox {
    BlackBox::new(request_ack_script())
}

/// Controller with default config and no journal.
pub fn setup_controller() -> ConformanceController {
    ConformanceController::new(ControllerConfig::new().with_name("test"))
}

/// Action stamped with a fixed time so test runs are reproducible.
pub fn stamped(direction: Direction, payload: Option<&str>, millis: u64) -> Action {
    Action::new(direction, payload.map(Payload::from), Timestamp(millis))
}

/// Deliver `action` through the operation matching its direction.
pub fn deliver(
    element: &mut dyn EventElement,
    controller: &dyn EventController,
    action: &Action,
) -> Result<(), FlowError> {
    match action.direction() {
        Direction::In => element.incoming(controller, action),
        Direction::Out => element.outgoing(controller, action),
        Direction::Timeout => element.timeout(controller, action),
    }
}

/// Deliver every action, stopping at the first error.
pub fn deliver_all(
    element: &mut dyn EventElement,
    controller: &dyn EventController,
    actions: &[Action],
) -> Result<(), FlowError> {
    actions
        .iter()
        .try_for_each(|action| deliver(&mut *element, controller, action))
}

/// Controller that only registers black-box elements and passes a flow on
/// the first incoming event. Exchange and quiescence elements are rejected.
#[derive(Debug, Default)]
pub struct FirstReplyController;

impl FirstReplyController {
    fn step(
        &self,
        mut flow: FlowMut<'_, BlackBox>,
        action: &Action,
        verdict: Option<Verdict>,
    ) -> Result<(), FlowError> {
        if flow.monitor().is_terminal() {
            flow.record_late();
            return Ok(());
        }
        flow.observe(action);
        match verdict {
            Some(verdict) => flow.conclude(verdict, action.observed_at()),
            None => Ok(()),
        }
    }
}

impl EventController for FirstReplyController {
    fn name(&self) -> &str {
        "first-reply"
    }

    fn black_box(&self) -> Option<&dyn FlowHandler<BlackBox>> {
        Some(self)
    }
}

impl FlowHandler<BlackBox> for FirstReplyController {
    fn on_incoming(&self, flow: FlowMut<'_, BlackBox>, action: &Action) -> Result<(), FlowError> {
        self.step(flow, action, Some(Verdict::Pass))
    }

    fn on_outgoing(&self, flow: FlowMut<'_, BlackBox>, action: &Action) -> Result<(), FlowError> {
        self.step(flow, action, None)
    }

    fn on_timeout(&self, flow: FlowMut<'_, BlackBox>, action: &Action) -> Result<(), FlowError> {
        self.step(flow, action, Some(Verdict::Inconclusive))
    }
}
