//! BbGum flow kernel
//!
//! Event dispatch and verdict determination for black-box conformance
//! testing. A driver turns observations of the system under test into
//! [`Action`]s and delivers them to test elements; each element routes the
//! delivery to the controller handler for its own variant (double dispatch),
//! which updates the element's [`Monitor`] and decides when the flow ends and
//! with which [`Verdict`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use bbgum_kernel::prelude::*;
//!
//! let controller = ConformanceController::new(ControllerConfig::default());
//! let script = Script::new(vec![
//!     ExpectedStep::outgoing(PayloadMatch::Exact("REQ".into())),
//!     ExpectedStep::incoming(PayloadMatch::Prefix("ACK".into())),
//! ])?;
//! let mut element = controller.element(BlackBox::new(script));
//!
//! element.outgoing(&controller, &Action::outgoing("REQ"))?;
//! element.incoming(&controller, &Action::incoming("ACK 1"))?;
//!
//! assert!(element.is_flow_term(&controller)?);
//! assert_eq!(element.conclusion(&controller)?, Verdict::Pass);
//! ```

// Core modules
pub mod action;
pub mod controller;
pub mod element;
pub mod error;
pub mod journal;
pub mod monitor;
pub mod script;
pub mod state_machine;
pub mod tally;
pub mod types;

// Test harness
pub mod test_harness;

// Re-exports
pub use action::Action;
pub use controller::{ConformanceController, ControllerConfig, EventController, FlowHandler};
pub use element::{
    BlackBox, BlackBoxElement, Element, EventElement, Exchange, ExchangeElement, ExchangePhase,
    FlowMut, FlowRef, Quiescence, QuiescenceElement, Variant,
};
pub use error::*;
pub use journal::{Journal, VerdictRecord};
pub use monitor::{Mismatch, Monitor};
pub use script::{ExpectedStep, PayloadMatch, Script};
pub use tally::{TallySnapshot, VerdictTally};
pub use types::*;

/// Everything a driver needs in one import
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::controller::{ConformanceController, ControllerConfig, EventController, FlowHandler};
    pub use crate::element::{BlackBox, Element, EventElement, Exchange, Quiescence};
    pub use crate::error::FlowError;
    pub use crate::monitor::Monitor;
    pub use crate::script::{ExpectedStep, PayloadMatch, Script};
    pub use crate::types::{Direction, FlowState, Payload, Verdict};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if running with strict debugging enabled
pub const fn strict_debug() -> bool {
    cfg!(feature = "strict-debug")
}
