use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handoff::HandoffTarget;
use crate::output::OutputShape;
use crate::tools::ToolDefinition;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { content: String },
    ToolCall { call_id: String, name: String, arguments: Value },
    ToolResult { call_id: String, name: String, output: String },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Everything the model sees for one turn of one agent.
#[derive(Clone, Copy, Debug)]
pub struct InferenceRequest<'a> {
    pub model: &'a str,
    pub agent: &'a str,
    pub instructions: &'a str,
    pub tools: &'a [ToolDefinition],
    pub handoffs: &'a [HandoffTarget],
    pub conversation: &'a [Message],
    pub output_shape: Option<&'a OutputShape>,
}

impl InferenceRequest<'_> {
    /// Text of the most recent user message in the conversation.
    pub fn latest_user_text(&self) -> Option<&str> {
        self.conversation.iter().rev().find_map(|message| match message {
            Message::User { content } => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn has_tool_results(&self) -> bool {
        self.conversation.iter().any(|message| matches!(message, Message::ToolResult { .. }))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferenceOutcome {
    /// Raw final output, validated against the agent's output shape by the runner.
    Final { output: Value },
    /// Transfer control to one of the advertised handoff targets.
    Delegate { target: String, input: Option<String> },
    ToolCalls { calls: Vec<ToolCall> },
}

impl InferenceOutcome {
    pub fn final_output(output: impl Into<Value>) -> Self {
        Self::Final { output: output.into() }
    }

    pub fn delegate(target: impl Into<String>, input: Option<String>) -> Self {
        Self::Delegate { target: target.into(), input }
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self::ToolCalls {
            calls: vec![ToolCall { call_id: call_id.into(), name: name.into(), arguments }],
        }
    }
}

#[async_trait]
pub trait ModelInference: Send + Sync {
    async fn infer(&self, request: InferenceRequest<'_>) -> Result<InferenceOutcome>;
}
