//! Deterministic model doubles for exercising agent flows without a provider.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::{InferenceOutcome, InferenceRequest, Message, ModelInference};

type Responder = Box<dyn Fn(&InferenceRequest<'_>) -> Result<InferenceOutcome> + Send + Sync>;

/// What the model was shown on one inference call.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub agent: String,
    pub model: String,
    /// Latest user text of the conversation.
    pub input: String,
    pub tools: Vec<String>,
    pub handoffs: Vec<String>,
    pub conversation: Vec<Message>,
}

/// A [`ModelInference`] that answers from per-agent closures and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedModel {
    responders: HashMap<String, Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the replies for `agent`. A later script for the same agent wins.
    pub fn on<F>(mut self, agent: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&InferenceRequest<'_>) -> Result<InferenceOutcome> + Send + Sync + 'static,
    {
        self.responders.insert(agent.into(), Box::new(responder));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.recorded().clone()
    }

    pub fn calls_for(&self, agent: &str) -> Vec<RecordedCall> {
        self.recorded().iter().filter(|call| call.agent == agent).cloned().collect()
    }

    /// Agent names in the order the model was consulted.
    pub fn agents_called(&self) -> Vec<String> {
        self.recorded().iter().map(|call| call.agent.clone()).collect()
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ModelInference for ScriptedModel {
    async fn infer(&self, request: InferenceRequest<'_>) -> Result<InferenceOutcome> {
        self.recorded().push(RecordedCall {
            agent: request.agent.to_string(),
            model: request.model.to_string(),
            input: request.latest_user_text().unwrap_or_default().to_string(),
            tools: request.tools.iter().map(|tool| tool.name.clone()).collect(),
            handoffs: request.handoffs.iter().map(|target| target.tool_name.clone()).collect(),
            conversation: request.conversation.to_vec(),
        });

        let responder = self
            .responders
            .get(request.agent)
            .ok_or_else(|| anyhow!("no scripted response for agent `{}`", request.agent))?;
        responder(&request)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ScriptedModel;
    use crate::llm::{InferenceOutcome, InferenceRequest, Message, ModelInference};

    fn request<'a>(agent: &'a str, conversation: &'a [Message]) -> InferenceRequest<'a> {
        InferenceRequest {
            model: "test-model",
            agent,
            instructions: "",
            tools: &[],
            handoffs: &[],
            conversation,
            output_shape: None,
        }
    }

    #[tokio::test]
    async fn answers_scripted_agents_and_records_requests() {
        let model = ScriptedModel::new().on("Echo", |request| {
            Ok(InferenceOutcome::final_output(json!(request.latest_user_text())))
        });
        let conversation = [Message::user("ping")];

        let outcome = model.infer(request("Echo", &conversation)).await.expect("scripted");

        assert_eq!(outcome, InferenceOutcome::final_output(json!("ping")));
        let calls = model.calls_for("Echo");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input, "ping");
        assert_eq!(calls[0].model, "test-model");
    }

    #[tokio::test]
    async fn unscripted_agents_fail_but_are_still_recorded() {
        let model = ScriptedModel::new();
        let conversation = [Message::user("hello")];

        let error = model.infer(request("Ghost", &conversation)).await.expect_err("unscripted");

        assert!(error.to_string().contains("Ghost"));
        assert_eq!(model.agents_called(), vec!["Ghost".to_string()]);
    }
}
