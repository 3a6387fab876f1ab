use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agent::Agent;
use crate::context::Context;
use crate::gating::{self, AlwaysEnabled, EnablementPolicy};

#[async_trait]
pub trait Tool<C: Context>: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object the model must send.
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, context: &C, arguments: Value) -> Result<String>;
}

/// What the model is told about a tool for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    fn of<C: Context>(tool: &dyn Tool<C>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        }
    }
}

/// A tool built from a synchronous closure.
pub struct FunctionTool<C, F> {
    name: String,
    description: String,
    parameters: Value,
    call: F,
    _context: PhantomData<fn(&C)>,
}

impl<C, F> FunctionTool<C, F>
where
    C: Context,
    F: Fn(&C, &Value) -> Result<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, call: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({ "type": "object", "properties": {} }),
            call,
            _context: PhantomData,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl<C, F> Tool<C> for FunctionTool<C, F>
where
    C: Context,
    F: Fn(&C, &Value) -> Result<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(&self, context: &C, arguments: Value) -> Result<String> {
        (self.call)(context, &arguments)
    }
}

struct RegisteredTool<C: Context> {
    tool: Arc<dyn Tool<C>>,
    enablement: Arc<dyn EnablementPolicy<C>>,
}

impl<C: Context> Clone for RegisteredTool<C> {
    fn clone(&self) -> Self {
        Self { tool: Arc::clone(&self.tool), enablement: Arc::clone(&self.enablement) }
    }
}

/// Tools owned by one agent, in registration order.
pub struct ToolRegistry<C: Context> {
    tools: Vec<RegisteredTool<C>>,
}

impl<C: Context> Default for ToolRegistry<C> {
    fn default() -> Self {
        Self { tools: Vec::new() }
    }
}

impl<C: Context> Clone for ToolRegistry<C> {
    fn clone(&self) -> Self {
        Self { tools: self.tools.clone() }
    }
}

impl<C: Context> ToolRegistry<C> {
    /// Registers an always-enabled tool. A tool with the same name replaces
    /// the earlier registration.
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool<C> + 'static,
    {
        self.register_gated(tool, AlwaysEnabled);
    }

    pub fn register_gated<T, P>(&mut self, tool: T, enablement: P)
    where
        T: Tool<C> + 'static,
        P: EnablementPolicy<C> + 'static,
    {
        let entry = RegisteredTool { tool: Arc::new(tool), enablement: Arc::new(enablement) };
        match self.tools.iter_mut().find(|existing| existing.tool.name() == entry.tool.name()) {
            Some(existing) => *existing = entry,
            None => self.tools.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool<C>>> {
        self.tools
            .iter()
            .find(|entry| entry.tool.name() == name)
            .map(|entry| Arc::clone(&entry.tool))
    }

    /// Definitions of every tool whose policy admits `context` right now.
    pub fn enabled_for(&self, context: &C, agent: &Agent<C>) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|entry| {
                gating::is_enabled(entry.enablement.as_ref(), entry.tool.name(), context, agent)
            })
            .map(|entry| ToolDefinition::of(entry.tool.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
