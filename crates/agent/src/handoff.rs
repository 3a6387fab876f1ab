//! Delegation from one agent to a more specialized one.
//!
//! Each declared [`Handoff`] is advertised to the model as a
//! [`HandoffTarget`]. When the model delegates, the [`HandoffRouter`] maps its
//! choice back to an advertised target and the runner re-enters orchestration
//! there. [`HopBudget`] bounds the chain so mutual delegation cannot recurse
//! without end.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::Agent;
use crate::context::Context;
use crate::errors::RunError;
use crate::gating::{self, AlwaysEnabled, EnablementPolicy};

pub struct Handoff<C: Context> {
    agent: Arc<Agent<C>>,
    tool_name: String,
    description: String,
    enablement: Arc<dyn EnablementPolicy<C>>,
}

impl<C: Context> Handoff<C> {
    pub fn to(agent: Arc<Agent<C>>) -> Self {
        let tool_name = format!("transfer_to_{}", snake_case(agent.name()));
        let description = format!(
            "Handoff to the {} agent to handle the request. {}",
            agent.name(),
            agent.instructions()
        );
        Self { agent, tool_name, description, enablement: Arc::new(AlwaysEnabled) }
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_enablement<P>(mut self, enablement: P) -> Self
    where
        P: EnablementPolicy<C> + 'static,
    {
        self.enablement = Arc::new(enablement);
        self
    }

    pub fn agent(&self) -> &Arc<Agent<C>> {
        &self.agent
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    fn target(&self) -> HandoffTarget {
        HandoffTarget {
            agent: self.agent.name().to_string(),
            tool_name: self.tool_name.clone(),
            description: self.description.clone(),
        }
    }
}

impl<C: Context> From<Arc<Agent<C>>> for Handoff<C> {
    fn from(agent: Arc<Agent<C>>) -> Self {
        Self::to(agent)
    }
}

impl<C: Context> Clone for Handoff<C> {
    fn clone(&self) -> Self {
        Self {
            agent: Arc::clone(&self.agent),
            tool_name: self.tool_name.clone(),
            description: self.description.clone(),
            enablement: Arc::clone(&self.enablement),
        }
    }
}

impl<C: Context> fmt::Debug for Handoff<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("agent", &self.agent.name())
            .field("tool_name", &self.tool_name)
            .finish()
    }
}

/// How a handoff is presented to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffTarget {
    pub agent: String,
    pub tool_name: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HandoffRouter;

impl HandoffRouter {
    /// Targets of `agent` that are enabled for `context` on this turn.
    pub fn advertised<C: Context>(&self, agent: &Agent<C>, context: &C) -> Vec<HandoffTarget> {
        agent
            .handoffs()
            .iter()
            .filter(|handoff| {
                gating::is_enabled(handoff.enablement.as_ref(), &handoff.tool_name, context, agent)
            })
            .map(Handoff::target)
            .collect()
    }

    /// Map the model's delegation choice to a target advertised this turn.
    ///
    /// The model may name either the handoff tool or the target agent.
    pub fn resolve<C: Context>(
        &self,
        agent: &Agent<C>,
        advertised: &[HandoffTarget],
        requested: &str,
    ) -> Result<Arc<Agent<C>>, RunError> {
        let requested = requested.trim();
        let target = advertised
            .iter()
            .find(|target| target.tool_name == requested || target.agent == requested)
            .and_then(|target| {
                agent.handoffs().iter().find(|handoff| handoff.tool_name == target.tool_name)
            });

        target.map(|handoff| Arc::clone(&handoff.agent)).ok_or_else(|| {
            RunError::ModelBehavior(format!(
                "agent `{}` delegated to `{requested}`, which is not an available handoff target",
                agent.name()
            ))
        })
    }
}

/// Counts handoffs within one run.
#[derive(Clone, Debug)]
pub struct HopBudget {
    max_hops: usize,
    chain: Vec<String>,
}

impl HopBudget {
    pub fn new(max_hops: usize, origin: &str) -> Self {
        Self { max_hops, chain: vec![origin.to_string()] }
    }

    /// Record a handoff to `target`, failing once the limit would be exceeded.
    pub fn advance(&mut self, target: &str, correlation_id: &str) -> Result<(), RunError> {
        let hops = self.chain.len();
        self.chain.push(target.to_string());
        if hops > self.max_hops {
            return Err(RunError::DelegationDepthExceeded {
                max_hops: self.max_hops,
                chain: self.chain.clone(),
            });
        }

        info!(
            event_name = "agent.handoff.accepted",
            correlation_id,
            from = %self.chain[hops - 1],
            to = %target,
            hop = hops,
            "delegating to handoff target"
        );
        Ok(())
    }

    pub fn hops(&self) -> usize {
        self.chain.len() - 1
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn into_chain(self) -> Vec<String> {
        self.chain
    }
}

fn snake_case(name: &str) -> String {
    let mut output = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            output.push(ch.to_ascii_lowercase());
        } else if !output.is_empty() && !output.ends_with('_') {
            output.push('_');
        }
    }
    output.trim_end_matches('_').to_string()
}
