//! Agent orchestration runtime.
//!
//! A caller hands [`Runner::run`] a starting [`Agent`], the user's text, and
//! its own context value. The runner then:
//! - checks the input against the agent's guardrails before the model sees it
//! - advertises only the tools and handoffs whose enablement policy admits
//!   the context on that turn
//! - follows delegations to specialist agents, bounded by a hop limit
//! - validates the finishing agent's output against its shape and its output
//!   guardrails before anything is returned
//!
//! # Key Types
//!
//! - [`Agent`] - instructions, tools, handoffs, guardrails, output shape
//! - [`ModelInference`] - pluggable model collaborator
//! - [`Guardrail`] / [`PolicyEvaluator`] - pass/trip checks on text
//! - [`EnablementPolicy`] - fail-closed gating of tools and handoffs
//! - [`RunError`] - every way a run can stop short
//!
//! # Safety Principle
//!
//! Gating fails closed: a policy that errors hides its capability. A tripped
//! guardrail stops the run with no partial output.

pub mod agent;
pub mod context;
pub mod errors;
pub mod fixtures;
pub mod gating;
pub mod guardrails;
pub mod handoff;
pub mod llm;
pub mod output;
pub mod runner;
pub mod tools;

pub use agent::Agent;
pub use context::Context;
pub use errors::RunError;
pub use gating::{predicate, AlwaysEnabled, EnablementPolicy};
pub use guardrails::{
    rule, CheckingAgentPolicy, Guardrail, GuardrailResult, GuardrailVerdict, OutputSubject,
    PolicyDecision, PolicyEvaluator,
};
pub use handoff::{Handoff, HandoffRouter, HandoffTarget};
pub use llm::{InferenceOutcome, InferenceRequest, Message, ModelInference, ToolCall};
pub use output::{FieldKind, OutputFormatError, OutputShape};
pub use runner::{RunConfig, RunResult, Runner};
pub use tools::{FunctionTool, Tool, ToolDefinition};
