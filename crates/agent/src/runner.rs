//! The single orchestration entry point.
//!
//! One call to [`Runner::run`] executes one user turn:
//!
//! 1. input guardrails of the current agent, in order
//! 2. model inference with the tools and handoffs enabled for the context
//! 3. tool calls are executed and fed back until the model either delegates
//!    or finishes
//! 4. a delegation re-enters step 1 with the target agent
//! 5. the finishing agent's output is coerced into its shape and checked by
//!    its output guardrails
//!
//! Every model and guardrail call is awaited in sequence. The runner holds no
//! state between calls, so independent runs may execute concurrently.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use steward_core::config::AppConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::context::Context;
use crate::errors::RunError;
use crate::guardrails::{self, Guardrail, GuardrailResult};
use crate::handoff::{HandoffRouter, HopBudget};
use crate::llm::{InferenceOutcome, InferenceRequest, Message, ModelInference, ToolCall};
use crate::tools::ToolDefinition;

/// Per-call settings threaded through every run.
pub struct RunConfig<C: Context> {
    pub model: Arc<dyn ModelInference>,
    pub model_name: String,
    pub max_handoffs: usize,
    pub max_turns: usize,
    pub workflow_name: String,
    /// Checked against the input before the first agent's own guardrails.
    pub input_guardrails: Vec<Guardrail<C>>,
    /// Checked against the final output after the finishing agent's own guardrails.
    pub output_guardrails: Vec<Guardrail<C>>,
    /// Reused by the run instead of a fresh id. Nested checking-agent runs
    /// inherit the parent's id through this field.
    pub correlation_id: Option<String>,
}

impl<C: Context> RunConfig<C> {
    pub fn new(model: Arc<dyn ModelInference>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            max_handoffs: 5,
            max_turns: 10,
            workflow_name: "Agent workflow".to_string(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            correlation_id: None,
        }
    }

    pub fn from_app_config(config: &AppConfig, model: Arc<dyn ModelInference>) -> Self {
        Self::new(model, config.llm.model.clone())
            .with_max_handoffs(config.runtime.max_handoffs as usize)
            .with_max_turns(config.runtime.max_turns as usize)
            .with_workflow_name(config.runtime.workflow_name.clone())
    }

    pub fn with_max_handoffs(mut self, max_handoffs: usize) -> Self {
        self.max_handoffs = max_handoffs;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_workflow_name(mut self, workflow_name: impl Into<String>) -> Self {
        self.workflow_name = workflow_name.into();
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

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Same model, limits and correlation id, without run-level guardrails.
    pub fn without_guardrails(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            model_name: self.model_name.clone(),
            max_handoffs: self.max_handoffs,
            max_turns: self.max_turns,
            workflow_name: self.workflow_name.clone(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

impl<C: Context> Clone for RunConfig<C> {
    fn clone(&self) -> Self {
        Self {
            input_guardrails: self.input_guardrails.clone(),
            output_guardrails: self.output_guardrails.clone(),
            ..self.without_guardrails()
        }
    }
}

impl<C: Context> fmt::Debug for RunConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("model_name", &self.model_name)
            .field("max_handoffs", &self.max_handoffs)
            .field("max_turns", &self.max_turns)
            .field("workflow_name", &self.workflow_name)
            .field("input_guardrails", &self.input_guardrails)
            .field("output_guardrails", &self.output_guardrails)
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResult {
    pub final_output: Value,
    pub last_agent: String,
    pub agents_visited: Vec<String>,
    pub input_guardrail_results: Vec<GuardrailResult>,
    pub output_guardrail_results: Vec<GuardrailResult>,
    pub correlation_id: String,
}

impl RunResult {
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.final_output)
    }

    /// The `response` text of a structured output, or the output itself when
    /// the agent answered in plain text.
    pub fn final_text(&self) -> Option<&str> {
        match &self.final_output {
            Value::String(text) => Some(text),
            other => other.get("response").and_then(Value::as_str),
        }
    }
}

enum AgentStep<C: Context> {
    Finished(Value),
    Delegated { target: Arc<Agent<C>>, input: Option<String> },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Runner;

impl Runner {
    /// Execute one turn starting at `agent`.
    ///
    /// Returns the finishing agent's validated output, or the first error: a
    /// tripped guardrail, an exhausted handoff or turn budget, malformed model
    /// output, or a failure from the model collaborator. Nothing is retried.
    pub async fn run<C: Context>(
        agent: &Arc<Agent<C>>,
        input: &str,
        context: &C,
        config: &RunConfig<C>,
    ) -> Result<RunResult, RunError> {
        let config = match &config.correlation_id {
            Some(_) => Cow::Borrowed(config),
            None => Cow::Owned(config.clone().with_correlation_id(Uuid::new_v4().to_string())),
        };
        let correlation_id = config.correlation_id.clone().unwrap_or_default();
        info!(
            event_name = "agent.run.started",
            correlation_id = %correlation_id,
            workflow = %config.workflow_name,
            agent = %agent.name(),
            "agent run started"
        );

        let result = Self::orchestrate(agent, input, context, &config, &correlation_id).await;
        match &result {
            Ok(result) => info!(
                event_name = "agent.run.completed",
                correlation_id = %correlation_id,
                last_agent = %result.last_agent,
                handoffs = result.agents_visited.len() - 1,
                "agent run completed"
            ),
            Err(error) => warn!(
                event_name = "agent.run.failed",
                correlation_id = %correlation_id,
                tripwire = error.is_tripwire(),
                error = %error,
                "agent run failed"
            ),
        }
        result
    }

    async fn orchestrate<C: Context>(
        agent: &Arc<Agent<C>>,
        input: &str,
        context: &C,
        config: &RunConfig<C>,
        correlation_id: &str,
    ) -> Result<RunResult, RunError> {
        let router = HandoffRouter;
        let mut budget = HopBudget::new(config.max_handoffs, agent.name());
        let mut agent = Arc::clone(agent);
        let mut input = input.to_string();
        let mut input_guardrail_results = Vec::new();

        loop {
            let run_level: &[Guardrail<C>] =
                if budget.hops() == 0 { &config.input_guardrails } else { &[] };
            let checks = run_level.iter().chain(agent.input_guardrails()).collect::<Vec<_>>();
            let passed = guardrails::check_input(
                &checks,
                agent.name(),
                context,
                config,
                &input,
                correlation_id,
            )
            .await?;
            input_guardrail_results.extend(passed);

            match Self::run_agent(&agent, &input, context, config, &router, correlation_id).await? {
                AgentStep::Delegated { target, input: delegated } => {
                    budget.advance(target.name(), correlation_id)?;
                    if let Some(delegated) = delegated {
                        input = delegated;
                    }
                    agent = target;
                }
                AgentStep::Finished(candidate) => {
                    let checks = agent
                        .output_guardrails()
                        .iter()
                        .chain(&config.output_guardrails)
                        .collect::<Vec<_>>();
                    let output_guardrail_results = guardrails::check_output(
                        &checks,
                        agent.name(),
                        context,
                        config,
                        &candidate,
                        correlation_id,
                    )
                    .await?;

                    return Ok(RunResult {
                        final_output: candidate,
                        last_agent: agent.name().to_string(),
                        agents_visited: budget.into_chain(),
                        input_guardrail_results,
                        output_guardrail_results,
                        correlation_id: correlation_id.to_string(),
                    });
                }
            }
        }
    }

    /// Drive one agent until it finishes or delegates.
    async fn run_agent<C: Context>(
        agent: &Agent<C>,
        input: &str,
        context: &C,
        config: &RunConfig<C>,
        router: &HandoffRouter,
        correlation_id: &str,
    ) -> Result<AgentStep<C>, RunError> {
        let mut conversation = vec![Message::user(input)];

        for turn in 1..=config.max_turns {
            // Enablement is re-evaluated every turn; nothing is cached.
            let tools = agent.tools().enabled_for(context, agent);
            let handoffs = router.advertised(agent, context);
            debug!(
                event_name = "agent.turn.started",
                correlation_id,
                agent = %agent.name(),
                turn,
                tools = tools.len(),
                handoffs = handoffs.len(),
                "requesting model inference"
            );

            let request = InferenceRequest {
                model: &config.model_name,
                agent: agent.name(),
                instructions: agent.instructions(),
                tools: &tools,
                handoffs: &handoffs,
                conversation: &conversation,
                output_shape: agent.output_shape(),
            };
            let outcome = config.model.infer(request).await.map_err(|source| {
                RunError::Inference { agent: agent.name().to_string(), source }
            })?;

            match outcome {
                InferenceOutcome::Final { output } => {
                    let candidate = match agent.output_shape() {
                        Some(shape) => shape.coerce(output).map_err(|source| {
                            RunError::OutputFormat { agent: agent.name().to_string(), source }
                        })?,
                        None => output,
                    };
                    return Ok(AgentStep::Finished(candidate));
                }
                InferenceOutcome::Delegate { target, input } => {
                    let target = router.resolve(agent, &handoffs, &target)?;
                    return Ok(AgentStep::Delegated { target, input });
                }
                InferenceOutcome::ToolCalls { calls } if calls.is_empty() => {
                    return Err(RunError::ModelBehavior(format!(
                        "agent `{}` requested tool calls but named no tools",
                        agent.name()
                    )));
                }
                InferenceOutcome::ToolCalls { calls } => {
                    for call in calls {
                        let message =
                            Self::invoke_tool(agent, &tools, &call, context, correlation_id)
                                .await?;
                        conversation.push(Message::ToolCall {
                            call_id: call.call_id,
                            name: call.name,
                            arguments: call.arguments,
                        });
                        conversation.push(message);
                    }
                }
            }
        }

        Err(RunError::MaxTurnsExceeded {
            agent: agent.name().to_string(),
            max_turns: config.max_turns,
        })
    }

    async fn invoke_tool<C: Context>(
        agent: &Agent<C>,
        advertised: &[ToolDefinition],
        call: &ToolCall,
        context: &C,
        correlation_id: &str,
    ) -> Result<Message, RunError> {
        let tool = advertised
            .iter()
            .any(|definition| definition.name == call.name)
            .then(|| agent.tools().get(&call.name))
            .flatten()
            .ok_or_else(|| {
                RunError::ModelBehavior(format!(
                    "agent `{}` called tool `{}`, which is not available this turn",
                    agent.name(),
                    call.name
                ))
            })?;

        let output = match tool.invoke(context, call.arguments.clone()).await {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    correlation_id,
                    agent = %agent.name(),
                    tool = %call.name,
                    error = %error,
                    "tool invocation failed; reporting error to the model"
                );
                format!(
                    "An error occurred while running the tool. Please try again. Error: {error:#}"
                )
            }
        };

        Ok(Message::ToolResult { call_id: call.call_id.clone(), name: call.name.clone(), output })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use steward_core::config::AppConfig;

    use super::{RunConfig, RunResult, Runner};
    use crate::agent::Agent;
    use crate::errors::RunError;
    use crate::fixtures::ScriptedModel;
    use crate::gating::{predicate, EnablementPolicy};
    use crate::guardrails::{rule, Guardrail, PolicyDecision, PolicyEvaluator};
    use crate::llm::{InferenceOutcome, Message};
    use crate::output::{FieldKind, OutputShape};
    use crate::tools::FunctionTool;

    struct Shopper {
        member: bool,
    }

    fn message_shape() -> OutputShape {
        OutputShape::new("MessageOutput").required("response", FieldKind::String)
    }

    fn members_only() -> impl EnablementPolicy<Shopper> {
        predicate(|shopper: &Shopper, _agent: &Agent<Shopper>| Ok(shopper.member))
    }

    fn reject_all(name: &str) -> Guardrail<Shopper> {
        Guardrail::new(name, rule(|_shopper: &Shopper, _text: &str| PolicyDecision::reject("no")))
    }

    #[tokio::test]
    async fn plain_text_agent_returns_model_output() {
        let agent = Agent::<Shopper>::new("Greeter", "Say hello").build();
        let model = ScriptedModel::new()
            .on("Greeter", |_request| Ok(InferenceOutcome::final_output(json!("hello there"))));
        let config = RunConfig::new(Arc::new(model), "test-model");

        let result = Runner::run(&agent, "hi", &Shopper { member: false }, &config)
            .await
            .expect("run succeeds");

        assert_eq!(result.final_text(), Some("hello there"));
        assert_eq!(result.agents_visited, vec!["Greeter".to_string()]);
        assert!(!result.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn tool_calls_loop_until_final_output() {
        let agent = Agent::<Shopper>::new("Store", "Answer stock questions")
            .with_gated_tool(
                FunctionTool::new("stock", "Units in stock", |_shopper: &Shopper, args: &Value| {
                    Ok(format!("{} units", args["sku"].as_str().unwrap_or("?").len()))
                }),
                members_only(),
            )
            .with_output_shape(message_shape())
            .build();
        let model = Arc::new(ScriptedModel::new().on("Store", |request| {
            let result = request.conversation.iter().find_map(|message| match message {
                Message::ToolResult { output, .. } => Some(output.clone()),
                _ => None,
            });
            Ok(match result {
                Some(output) => InferenceOutcome::final_output(json!({ "response": output })),
                None => InferenceOutcome::tool_call("call-1", "stock", json!({ "sku": "ABCD" })),
            })
        }));
        let config = RunConfig::new(model.clone(), "test-model");

        let result = Runner::run(&agent, "how many?", &Shopper { member: true }, &config)
            .await
            .expect("run succeeds");
        assert_eq!(result.final_text(), Some("4 units"));

        let calls = model.calls_for("Store");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tools, vec!["stock".to_string()]);
    }

    #[tokio::test]
    async fn calling_a_gated_off_tool_is_model_misbehavior() {
        let agent = Agent::<Shopper>::new("Store", "Answer stock questions")
            .with_gated_tool(
                FunctionTool::new("stock", "Units in stock", |_shopper: &Shopper, _args: &Value| {
                    Ok("12 units".to_string())
                }),
                members_only(),
            )
            .build();
        let model = Arc::new(ScriptedModel::new().on("Store", |_request| {
            Ok(InferenceOutcome::tool_call("call-1", "stock", json!({})))
        }));
        let config = RunConfig::new(model.clone(), "test-model");

        let error = Runner::run(&agent, "how many?", &Shopper { member: false }, &config)
            .await
            .expect_err("tool was not advertised");

        assert!(matches!(error, RunError::ModelBehavior(ref message) if message.contains("stock")));
        assert!(model.calls_for("Store")[0].tools.is_empty());
    }

    #[tokio::test]
    async fn failing_tool_is_reported_back_to_the_model() {
        let agent = Agent::<Shopper>::new("Store", "Answer stock questions")
            .with_tool(FunctionTool::new(
                "stock",
                "Units in stock",
                |_shopper: &Shopper, _args: &Value| Err(anyhow!("inventory service down")),
            ))
            .build();
        let model = ScriptedModel::new().on("Store", |request| {
            if !request.has_tool_results() {
                return Ok(InferenceOutcome::tool_call("call-1", "stock", json!({})));
            }
            let failure = request.conversation.iter().find_map(|message| match message {
                Message::ToolResult { output, .. } => Some(output.clone()),
                _ => None,
            });
            Ok(InferenceOutcome::final_output(json!(failure)))
        });
        let config = RunConfig::new(Arc::new(model), "test-model");

        let result = Runner::run(&agent, "how many?", &Shopper { member: true }, &config)
            .await
            .expect("tool failure is not fatal");

        assert!(result.final_text().is_some_and(|text| text.contains("inventory service down")));
    }

    #[tokio::test]
    async fn turn_budget_bounds_endless_tool_loops() {
        let agent = Agent::<Shopper>::new("Store", "Loop forever")
            .with_tool(FunctionTool::new("noop", "Does nothing", |_: &Shopper, _: &Value| {
                Ok(String::new())
            }))
            .build();
        let model = ScriptedModel::new()
            .on("Store", |_request| Ok(InferenceOutcome::tool_call("call", "noop", json!({}))));
        let config = RunConfig::new(Arc::new(model), "test-model").with_max_turns(3);

        let error = Runner::run(&agent, "go", &Shopper { member: true }, &config)
            .await
            .expect_err("never finishes");

        assert!(matches!(error, RunError::MaxTurnsExceeded { max_turns: 3, .. }));
    }

    #[tokio::test]
    async fn empty_tool_call_list_is_model_misbehavior() {
        let agent = Agent::<Shopper>::new("Store", "Reply").build();
        let model = Arc::new(ScriptedModel::new().on("Store", |_request| {
            Ok(InferenceOutcome::ToolCalls { calls: Vec::new() })
        }));
        let config = RunConfig::new(model.clone(), "test-model");

        let error = Runner::run(&agent, "hi", &Shopper { member: true }, &config)
            .await
            .expect_err("no tools named");

        assert!(matches!(error, RunError::ModelBehavior(ref message) if message.contains("Store")));
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn first_tripped_output_guardrail_skips_the_rest() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&later_calls);
        let agent = Agent::<Shopper>::new("Store", "Reply")
            .with_output_guardrail(reject_all("agent_output"))
            .with_output_guardrail(Guardrail::new(
                "agent_output_later",
                rule(move |_shopper: &Shopper, _text: &str| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    PolicyDecision::accept()
                }),
            ))
            .build();
        let model = ScriptedModel::new()
            .on("Store", |_request| Ok(InferenceOutcome::final_output(json!("ok"))));
        let config = RunConfig::new(Arc::new(model), "test-model")
            .with_output_guardrail(reject_all("run_output"));

        let error = Runner::run(&agent, "hi", &Shopper { member: true }, &config)
            .await
            .expect_err("agent output guardrail trips");

        assert!(matches!(
            error,
            RunError::OutputGuardrailTripwireTriggered { ref guardrail, .. }
                if guardrail == "agent_output"
        ));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    struct SeenCorrelation {
        seen: Arc<Mutex<Vec<Option<String>>>>,
    }

    #[async_trait]
    impl PolicyEvaluator<Shopper> for SeenCorrelation {
        async fn evaluate(
            &self,
            _context: &Shopper,
            config: &RunConfig<Shopper>,
            _subject: &str,
        ) -> anyhow::Result<PolicyDecision> {
            let mut seen = self.seen.lock().map_err(|_| anyhow!("lock poisoned"))?;
            seen.push(config.correlation_id.clone());
            Ok(PolicyDecision::accept())
        }
    }

    #[tokio::test]
    async fn guardrails_share_the_run_correlation_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let agent = Agent::<Shopper>::new("Store", "Reply")
            .with_input_guardrail(Guardrail::new("input", SeenCorrelation { seen: seen.clone() }))
            .with_output_guardrail(Guardrail::new("output", SeenCorrelation { seen: seen.clone() }))
            .build();
        let model = ScriptedModel::new()
            .on("Store", |_request| Ok(InferenceOutcome::final_output(json!("ok"))));
        let config = RunConfig::new(Arc::new(model), "test-model");

        let result = Runner::run(&agent, "hi", &Shopper { member: true }, &config)
            .await
            .expect("run succeeds");

        let expected = Some(result.correlation_id.clone());
        let seen = seen.lock().expect("lock").clone();
        assert_eq!(seen, vec![expected.clone(), expected]);
        assert!(config.correlation_id.is_none());
    }

    #[tokio::test]
    async fn caller_supplied_correlation_id_is_reused() {
        let agent = Agent::<Shopper>::new("Store", "Reply").build();
        let model = ScriptedModel::new()
            .on("Store", |_request| Ok(InferenceOutcome::final_output(json!("ok"))));
        let config = RunConfig::new(Arc::new(model), "test-model")
            .with_correlation_id("req-42")
            .with_output_guardrail(reject_all("unused"));

        let unguarded = config.without_guardrails();
        assert_eq!(unguarded.correlation_id.as_deref(), Some("req-42"));
        assert!(unguarded.output_guardrails.is_empty());

        let result = Runner::run(&agent, "hi", &Shopper { member: true }, &unguarded)
            .await
            .expect("run succeeds");
        assert_eq!(result.correlation_id, "req-42");
    }

    #[tokio::test]
    async fn malformed_structured_output_is_a_format_error() {
        let agent = Agent::<Shopper>::new("Store", "Reply in JSON")
            .with_output_shape(message_shape())
            .build();
        let model = ScriptedModel::new()
            .on("Store", |_request| Ok(InferenceOutcome::final_output(json!("not json at all"))));
        let config = RunConfig::new(Arc::new(model), "test-model");

        let error = Runner::run(&agent, "hi", &Shopper { member: true }, &config)
            .await
            .expect_err("format failure");

        assert!(matches!(error, RunError::OutputFormat { .. }));
        assert!(!error.is_tripwire());
    }

    #[tokio::test]
    async fn inference_failure_propagates_without_retry() {
        let agent = Agent::<Shopper>::new("Store", "Reply").build();
        let model = Arc::new(
            ScriptedModel::new().on("Store", |_request| Err(anyhow!("upstream timeout"))),
        );
        let config = RunConfig::new(model.clone(), "test-model");

        let error = Runner::run(&agent, "hi", &Shopper { member: true }, &config)
            .await
            .expect_err("inference fails");

        assert!(matches!(error, RunError::Inference { ref agent, .. } if agent == "Store"));
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn run_level_guardrails_wrap_the_whole_run() {
        let agent = Agent::<Shopper>::new("Store", "Reply").build();
        let model = Arc::new(
            ScriptedModel::new()
                .on("Store", |_request| Ok(InferenceOutcome::final_output(json!("ok")))),
        );

        let blocked_input = RunConfig::new(model.clone(), "test-model")
            .with_input_guardrail(reject_all("run_input"));
        let error = Runner::run(&agent, "hi", &Shopper { member: true }, &blocked_input)
            .await
            .expect_err("run-level input guardrail trips");
        assert!(matches!(
            error,
            RunError::InputGuardrailTripwireTriggered { ref guardrail, .. }
                if guardrail == "run_input"
        ));
        assert!(model.calls().is_empty());

        let blocked_output = RunConfig::new(model.clone(), "test-model")
            .with_output_guardrail(reject_all("run_output"));
        let error = Runner::run(&agent, "hi", &Shopper { member: true }, &blocked_output)
            .await
            .expect_err("run-level output guardrail trips");
        assert!(matches!(error, RunError::OutputGuardrailTripwireTriggered { .. }));
    }

    #[test]
    fn run_config_takes_limits_from_app_config() {
        let mut app = AppConfig::default();
        app.llm.model = "gemini-2.0-flash".to_string();
        app.runtime.max_handoffs = 2;
        app.runtime.max_turns = 4;

        let config = RunConfig::<Shopper>::from_app_config(&app, Arc::new(ScriptedModel::new()));

        assert_eq!(config.model_name, "gemini-2.0-flash");
        assert_eq!(config.max_handoffs, 2);
        assert_eq!(config.max_turns, 4);
        assert_eq!(config.workflow_name, "Agent workflow");
    }

    #[test]
    fn final_output_deserializes_into_caller_types() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct MessageOutput {
            response: String,
        }

        let result = RunResult {
            final_output: json!({ "response": "Your balance is $100,000" }),
            last_agent: "Bank Agent".to_string(),
            agents_visited: vec!["Bank Agent".to_string()],
            input_guardrail_results: Vec::new(),
            output_guardrail_results: Vec::new(),
            correlation_id: "corr".to_string(),
        };

        let typed = result.final_output_as::<MessageOutput>().expect("deserializes");
        assert_eq!(typed, MessageOutput { response: "Your balance is $100,000".to_string() });
    }
}
