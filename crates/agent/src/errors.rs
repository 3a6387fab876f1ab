use thiserror::Error;

use crate::guardrails::GuardrailVerdict;
use crate::output::OutputFormatError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("input guardrail `{guardrail}` tripped for agent `{agent}`")]
    InputGuardrailTripwireTriggered {
        guardrail: String,
        agent: String,
        verdict: GuardrailVerdict,
    },
    #[error("output guardrail `{guardrail}` tripped for agent `{agent}`")]
    OutputGuardrailTripwireTriggered {
        guardrail: String,
        agent: String,
        verdict: GuardrailVerdict,
    },
    #[error("delegation exceeded {max_hops} handoffs: {}", .chain.join(" -> "))]
    DelegationDepthExceeded { max_hops: usize, chain: Vec<String> },
    #[error("agent `{agent}` did not finish within {max_turns} model turns")]
    MaxTurnsExceeded { agent: String, max_turns: usize },
    #[error("agent `{agent}` produced malformed output: {source}")]
    OutputFormat {
        agent: String,
        #[source]
        source: OutputFormatError,
    },
    #[error("model behaved unexpectedly: {0}")]
    ModelBehavior(String),
    #[error("guardrail `{guardrail}` could not be evaluated: {source:#}")]
    GuardrailEvaluation {
        guardrail: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("model inference failed for agent `{agent}`: {source:#}")]
    Inference {
        agent: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    pub fn is_tripwire(&self) -> bool {
        matches!(
            self,
            Self::InputGuardrailTripwireTriggered { .. }
                | Self::OutputGuardrailTripwireTriggered { .. }
        )
    }

    /// The verdict behind a tripped guardrail, including the checker's reasoning.
    pub fn verdict(&self) -> Option<&GuardrailVerdict> {
        match self {
            Self::InputGuardrailTripwireTriggered { verdict, .. }
            | Self::OutputGuardrailTripwireTriggered { verdict, .. } => Some(verdict),
            _ => None,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InputGuardrailTripwireTriggered { .. } => {
                "That request is outside what this assistant can help with."
            }
            Self::OutputGuardrailTripwireTriggered { .. } => {
                "The assistant could not produce a response that meets its content policy."
            }
            Self::DelegationDepthExceeded { .. } | Self::MaxTurnsExceeded { .. } => {
                "The request could not be completed. Please rephrase and try again."
            }
            Self::OutputFormat { .. } | Self::ModelBehavior(_) | Self::Inference { .. } => {
                "The assistant is temporarily unavailable. Please retry shortly."
            }
            Self::GuardrailEvaluation { .. } => "An unexpected internal error occurred.",
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use serde_json::json;

    use super::RunError;
    use crate::guardrails::GuardrailVerdict;
    use crate::output::OutputFormatError;

    fn tripped() -> GuardrailVerdict {
        GuardrailVerdict {
            output_info: json!({ "is_bank_related": false, "reasoning": "math homework" }),
            tripwire_triggered: true,
        }
    }

    #[test]
    fn tripwires_expose_their_verdict() {
        let error = RunError::InputGuardrailTripwireTriggered {
            guardrail: "check_bank_related".to_string(),
            agent: "Bank Agent".to_string(),
            verdict: tripped(),
        };

        assert!(error.is_tripwire());
        let reasoning = error.verdict().map(|verdict| verdict.output_info["reasoning"].clone());
        assert_eq!(reasoning, Some(json!("math homework")));
        assert_eq!(
            error.to_string(),
            "input guardrail `check_bank_related` tripped for agent `Bank Agent`"
        );
    }

    #[test]
    fn inference_failures_are_not_tripwires() {
        let error = RunError::Inference {
            agent: "Bank Agent".to_string(),
            source: anyhow!("connection reset").context("calling provider"),
        };

        assert!(!error.is_tripwire());
        assert!(error.verdict().is_none());
        assert!(error.to_string().contains("calling provider: connection reset"));
        assert_eq!(
            error.user_message(),
            "The assistant is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn depth_error_lists_the_chain() {
        let error = RunError::DelegationDepthExceeded {
            max_hops: 1,
            chain: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };

        assert_eq!(error.to_string(), "delegation exceeded 1 handoffs: A -> B -> A");
    }

    #[test]
    fn format_errors_keep_their_source() {
        let error = RunError::OutputFormat {
            agent: "Bank Agent".to_string(),
            source: OutputFormatError::MissingField {
                shape: "MessageOutput".to_string(),
                field: "response".to_string(),
            },
        };

        let source = std::error::Error::source(&error).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("`MessageOutput` output is missing required field `response`")
        );
    }
}
