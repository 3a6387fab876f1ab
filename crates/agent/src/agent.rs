use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::gating::EnablementPolicy;
use crate::guardrails::Guardrail;
use crate::handoff::Handoff;
use crate::output::OutputShape;
use crate::tools::{Tool, ToolRegistry};

/// A named bundle of instructions, tools, handoff targets, and guardrails.
///
/// Agents are assembled with the `with_*` methods and then shared behind an
/// [`Arc`]; nothing mutates them once a run starts.
pub struct Agent<C: Context> {
    name: String,
    instructions: String,
    tools: ToolRegistry<C>,
    handoffs: Vec<Handoff<C>>,
    input_guardrails: Vec<Guardrail<C>>,
    output_guardrails: Vec<Guardrail<C>>,
    output_shape: Option<OutputShape>,
}

impl<C: Context> Agent<C> {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: ToolRegistry::default(),
            handoffs: Vec::new(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            output_shape: None,
        }
    }

    pub fn with_tool<T>(mut self, tool: T) -> Self
    where
        T: Tool<C> + 'static,
    {
        self.tools.register(tool);
        self
    }

    pub fn with_gated_tool<T, P>(mut self, tool: T, enablement: P) -> Self
    where
        T: Tool<C> + 'static,
        P: EnablementPolicy<C> + 'static,
    {
        self.tools.register_gated(tool, enablement);
        self
    }

    pub fn with_handoff(mut self, handoff: impl Into<Handoff<C>>) -> Self {
        self.handoffs.push(handoff.into());
        self
    }

    pub fn with_input_guardrail(mut self, guardrail: Guardrail<C>) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    pub fn with_output_guardrail(mut self, guardrail: Guardrail<C>) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    pub fn with_output_shape(mut self, shape: OutputShape) -> Self {
        self.output_shape = Some(shape);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tools(&self) -> &ToolRegistry<C> {
        &self.tools
    }

    pub fn handoffs(&self) -> &[Handoff<C>] {
        &self.handoffs
    }

    pub fn input_guardrails(&self) -> &[Guardrail<C>] {
        &self.input_guardrails
    }

    pub fn output_guardrails(&self) -> &[Guardrail<C>] {
        &self.output_guardrails
    }

    pub fn output_shape(&self) -> Option<&OutputShape> {
        self.output_shape.as_ref()
    }
}

impl<C: Context> fmt::Debug for Agent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .field(
                "handoffs",
                &self.handoffs.iter().map(|handoff| handoff.agent().name()).collect::<Vec<_>>(),
            )
            .field("input_guardrails", &self.input_guardrails.len())
            .field("output_guardrails", &self.output_guardrails.len())
            .field("output_shape", &self.output_shape.as_ref().map(OutputShape::name))
            .finish()
    }
}
