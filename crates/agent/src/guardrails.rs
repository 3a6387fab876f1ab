//! Guardrail engine: turns a piece of text into a pass/trip decision.
//!
//! The decision itself is delegated to a [`PolicyEvaluator`], so a guardrail
//! can be backed by a dedicated checking agent ([`CheckingAgentPolicy`]), a
//! plain rule ([`RulePolicy`]), or a stub in tests. The engine only ever looks
//! at the evaluator's `acceptable` flag: the tripwire is its negation.
//!
//! Guardrails run strictly in declaration order. The first trip aborts the
//! turn and later guardrails are never evaluated.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::context::Context;
use crate::errors::RunError;
use crate::runner::{RunConfig, Runner};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub output_info: Value,
    pub tripwire_triggered: bool,
}

/// A verdict together with the guardrail that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardrailResult {
    pub guardrail: String,
    pub verdict: GuardrailVerdict,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PolicyDecision {
    pub acceptable: bool,
    pub rationale: Option<String>,
    pub output_info: Value,
}

impl PolicyDecision {
    pub fn accept() -> Self {
        Self { acceptable: true, rationale: None, output_info: Value::Null }
    }

    pub fn reject(rationale: impl Into<String>) -> Self {
        let rationale = rationale.into();
        Self {
            acceptable: false,
            output_info: Value::String(rationale.clone()),
            rationale: Some(rationale),
        }
    }
}

#[async_trait]
pub trait PolicyEvaluator<C: Context>: Send + Sync {
    async fn evaluate(
        &self,
        context: &C,
        config: &RunConfig<C>,
        subject: &str,
    ) -> Result<PolicyDecision>;
}

/// Which text of a candidate output an output guardrail inspects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputSubject {
    Field(String),
    WholeOutput,
}

impl Default for OutputSubject {
    fn default() -> Self {
        Self::Field("response".to_string())
    }
}

impl OutputSubject {
    fn extract(&self, output: &Value) -> String {
        match (self, output) {
            (_, Value::String(text)) => text.clone(),
            (Self::Field(field), Value::Object(object)) => match object.get(field) {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => output.to_string(),
            },
            _ => output.to_string(),
        }
    }
}

pub struct Guardrail<C: Context> {
    name: String,
    evaluator: Arc<dyn PolicyEvaluator<C>>,
    subject: OutputSubject,
}

impl<C: Context> Guardrail<C> {
    pub fn new<E>(name: impl Into<String>, evaluator: E) -> Self
    where
        E: PolicyEvaluator<C> + 'static,
    {
        Self {
            name: name.into(),
            evaluator: Arc::new(evaluator),
            subject: OutputSubject::default(),
        }
    }

    pub fn with_subject(mut self, subject: OutputSubject) -> Self {
        self.subject = subject;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn verdict(
        &self,
        context: &C,
        config: &RunConfig<C>,
        subject: &str,
    ) -> Result<GuardrailVerdict, RunError> {
        let decision =
            self.evaluator.evaluate(context, config, subject).await.map_err(|source| {
                RunError::GuardrailEvaluation { guardrail: self.name.clone(), source }
            })?;

        Ok(GuardrailVerdict {
            output_info: decision.output_info,
            tripwire_triggered: !decision.acceptable,
        })
    }
}

impl<C: Context> Clone for Guardrail<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            evaluator: Arc::clone(&self.evaluator),
            subject: self.subject.clone(),
        }
    }
}

impl<C: Context> fmt::Debug for Guardrail<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardrail")
            .field("name", &self.name)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

pub async fn run_input_guardrail<C: Context>(
    guardrail: &Guardrail<C>,
    context: &C,
    config: &RunConfig<C>,
    raw_input: &str,
) -> Result<GuardrailVerdict, RunError> {
    guardrail.verdict(context, config, raw_input).await
}

pub async fn run_output_guardrail<C: Context>(
    guardrail: &Guardrail<C>,
    context: &C,
    config: &RunConfig<C>,
    candidate: &Value,
) -> Result<GuardrailVerdict, RunError> {
    let subject = guardrail.subject.extract(candidate);
    guardrail.verdict(context, config, &subject).await
}

/// Run input guardrails in order, stopping at the first trip.
pub(crate) async fn check_input<C: Context>(
    guardrails: &[&Guardrail<C>],
    agent: &str,
    context: &C,
    config: &RunConfig<C>,
    raw_input: &str,
    correlation_id: &str,
) -> Result<Vec<GuardrailResult>, RunError> {
    let mut results = Vec::with_capacity(guardrails.len());
    for guardrail in guardrails {
        let verdict = run_input_guardrail(guardrail, context, config, raw_input).await?;
        if verdict.tripwire_triggered {
            warn!(
                event_name = "agent.guardrail.input_tripped",
                correlation_id,
                agent,
                guardrail = %guardrail.name,
                output_info = %verdict.output_info,
                "input guardrail tripped"
            );
            return Err(RunError::InputGuardrailTripwireTriggered {
                guardrail: guardrail.name.clone(),
                agent: agent.to_string(),
                verdict,
            });
        }

        info!(
            event_name = "agent.guardrail.input_passed",
            correlation_id,
            agent,
            guardrail = %guardrail.name,
            "input guardrail passed"
        );
        results.push(GuardrailResult { guardrail: guardrail.name.clone(), verdict });
    }
    Ok(results)
}

/// Run output guardrails in order against a candidate, stopping at the first trip.
pub(crate) async fn check_output<C: Context>(
    guardrails: &[&Guardrail<C>],
    agent: &str,
    context: &C,
    config: &RunConfig<C>,
    candidate: &Value,
    correlation_id: &str,
) -> Result<Vec<GuardrailResult>, RunError> {
    let mut results = Vec::with_capacity(guardrails.len());
    for guardrail in guardrails {
        let verdict = run_output_guardrail(guardrail, context, config, candidate).await?;
        if verdict.tripwire_triggered {
            warn!(
                event_name = "agent.guardrail.output_tripped",
                correlation_id,
                agent,
                guardrail = %guardrail.name,
                output_info = %verdict.output_info,
                "output guardrail tripped"
            );
            return Err(RunError::OutputGuardrailTripwireTriggered {
                guardrail: guardrail.name.clone(),
                agent: agent.to_string(),
                verdict,
            });
        }

        info!(
            event_name = "agent.guardrail.output_passed",
            correlation_id,
            agent,
            guardrail = %guardrail.name,
            "output guardrail passed"
        );
        results.push(GuardrailResult { guardrail: guardrail.name.clone(), verdict });
    }
    Ok(results)
}

/// Policy decided by running a dedicated checking agent over the subject text.
///
/// The checking agent must finish with an object carrying a boolean
/// `verdict_field`; its whole output becomes the verdict's `output_info`.
pub struct CheckingAgentPolicy<C: Context> {
    agent: Arc<Agent<C>>,
    verdict_field: String,
    rationale_field: Option<String>,
}

impl<C: Context> CheckingAgentPolicy<C> {
    pub fn new(agent: Arc<Agent<C>>, verdict_field: impl Into<String>) -> Self {
        Self {
            agent,
            verdict_field: verdict_field.into(),
            rationale_field: Some("reasoning".to_string()),
        }
    }

    pub fn with_rationale_field(mut self, field: Option<String>) -> Self {
        self.rationale_field = field;
        self
    }
}

#[async_trait]
impl<C: Context> PolicyEvaluator<C> for CheckingAgentPolicy<C> {
    async fn evaluate(
        &self,
        context: &C,
        config: &RunConfig<C>,
        subject: &str,
    ) -> Result<PolicyDecision> {
        // Run-level guardrails would otherwise re-enter this policy.
        let check_config = config.without_guardrails();
        let result = Runner::run(&self.agent, subject, context, &check_config).await?;

        let acceptable =
            result.final_output.get(&self.verdict_field).and_then(Value::as_bool).ok_or_else(
                || {
                    anyhow!(
                        "checking agent `{}` did not report boolean field `{}`",
                        self.agent.name(),
                        self.verdict_field
                    )
                },
            )?;
        let rationale = self
            .rationale_field
            .as_ref()
            .and_then(|field| result.final_output.get(field))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(PolicyDecision { acceptable, rationale, output_info: result.final_output })
    }
}

/// Policy decided by a synchronous rule over the context and subject text.
pub struct RulePolicy<F> {
    rule: F,
}

pub fn rule<C, F>(rule: F) -> RulePolicy<F>
where
    C: Context,
    F: Fn(&C, &str) -> PolicyDecision + Send + Sync,
{
    RulePolicy { rule }
}

#[async_trait]
impl<C, F> PolicyEvaluator<C> for RulePolicy<F>
where
    C: Context,
    F: Fn(&C, &str) -> PolicyDecision + Send + Sync,
{
    async fn evaluate(
        &self,
        context: &C,
        _config: &RunConfig<C>,
        subject: &str,
    ) -> Result<PolicyDecision> {
        Ok((self.rule)(context, subject))
    }
}
