use super::{sealed, Variant};
use crate::controller::{EventController, FlowHandler};
use crate::types::VariantTag;

/// The SUT must stay silent until the deadline.
///
/// Any incoming event fails the flow; the timeout passes it. Outgoing
/// traffic is recorded and tolerated unless the element is strict.
#[derive(Debug, Clone, Default)]
pub struct Quiescence {
    strict: bool,
}

impl Quiescence {
    /// Quiescence tolerating outgoing traffic.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quiescence failing on any traffic at all.
    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Whether outgoing traffic fails the flow.
    #[inline]
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl sealed::Sealed for Quiescence {}

impl Variant for Quiescence {
    const TAG: VariantTag = VariantTag::Quiescence;

    fn handler(controller: &dyn EventController) -> Option<&dyn FlowHandler<Self>> {
        controller.quiescence()
    }
}
