/// Caller-supplied state carried unchanged through one run.
///
/// The runtime only ever holds `&C`, so guardrails, enablement policies, and
/// tools observe the same snapshot for the whole run, handoffs included.
pub trait Context: Send + Sync + 'static {}

impl<T> Context for T where T: Send + Sync + 'static {}
