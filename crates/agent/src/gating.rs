//! Context-gated exposure of tools and handoffs.
//!
//! A capability is advertised to the model only when its [`EnablementPolicy`]
//! says so for the live context. Policy failures close the gate: an error while
//! inspecting the context never exposes a capability.

use anyhow::Result;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::context::Context;

pub trait EnablementPolicy<C: Context>: Send + Sync {
    fn evaluate(&self, context: &C, agent: &Agent<C>) -> Result<bool>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysEnabled;

impl<C: Context> EnablementPolicy<C> for AlwaysEnabled {
    fn evaluate(&self, _context: &C, _agent: &Agent<C>) -> Result<bool> {
        Ok(true)
    }
}

/// Enablement backed by a closure over the context and the owning agent.
#[derive(Clone, Copy, Debug)]
pub struct Predicate<F> {
    check: F,
}

pub fn predicate<C, F>(check: F) -> Predicate<F>
where
    C: Context,
    F: Fn(&C, &Agent<C>) -> Result<bool> + Send + Sync,
{
    Predicate { check }
}

impl<C, F> EnablementPolicy<C> for Predicate<F>
where
    C: Context,
    F: Fn(&C, &Agent<C>) -> Result<bool> + Send + Sync,
{
    fn evaluate(&self, context: &C, agent: &Agent<C>) -> Result<bool> {
        (self.check)(context, agent)
    }
}

/// Evaluate `policy` for `capability`, treating any failure as disabled.
pub fn is_enabled<C: Context>(
    policy: &dyn EnablementPolicy<C>,
    capability: &str,
    context: &C,
    agent: &Agent<C>,
) -> bool {
    match policy.evaluate(context, agent) {
        Ok(true) => true,
        Ok(false) => {
            debug!(
                event_name = "agent.gating.denied",
                agent = %agent.name(),
                capability,
                "capability hidden for this context"
            );
            false
        }
        Err(error) => {
            warn!(
                event_name = "agent.gating.policy_failed",
                agent = %agent.name(),
                capability,
                error = %error,
                "enablement policy failed; capability disabled"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::{is_enabled, predicate, AlwaysEnabled};
    use crate::agent::Agent;

    struct Session {
        verified: Option<bool>,
    }

    #[test]
    fn always_enabled_opens_the_gate() {
        let agent = Agent::<Session>::new("Desk", "help");
        assert!(is_enabled(&AlwaysEnabled, "lookup", &Session { verified: None }, &agent));
    }

    #[test]
    fn predicate_reads_the_live_context() {
        let agent = Agent::<Session>::new("Desk", "help");
        let policy = predicate(|session: &Session, _agent: &Agent<Session>| {
            Ok(session.verified == Some(true))
        });

        assert!(is_enabled(&policy, "lookup", &Session { verified: Some(true) }, &agent));
        assert!(!is_enabled(&policy, "lookup", &Session { verified: Some(false) }, &agent));
    }

    #[test]
    fn failing_predicate_fails_closed() {
        let agent = Agent::<Session>::new("Desk", "help");
        let policy = predicate(|session: &Session, _agent: &Agent<Session>| {
            session.verified.ok_or_else(|| anyhow!("session has no verification state"))
        });

        assert!(!is_enabled(&policy, "lookup", &Session { verified: None }, &agent));
    }
}
