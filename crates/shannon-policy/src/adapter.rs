//! Adapts `PolicyEngine` to `shannon_harness::ports::PolicyEvaluatorPort`,
//! the shape the workflow engine actually depends on.

use async_trait::async_trait;

use shannon_core::error::{ShannonError, ShannonResult};
use shannon_harness::ports::{PolicyDecision, PolicyEvaluatorPort, PolicyObligations};

use crate::input::PolicyInput;
use crate::PolicyEngine;

#[async_trait]
impl PolicyEvaluatorPort for PolicyEngine {
    async fn evaluate(&self, input: serde_json::Value) -> ShannonResult<PolicyDecision> {
        let input: PolicyInput = serde_json::from_value(input)
            .map_err(|e| ShannonError::Validation(format!("invalid policy input: {e}")))?;
        let decision = PolicyEngine::evaluate(self, input).await;
        Ok(PolicyDecision {
            allow: decision.allow,
            reason: decision.reason,
            obligations: decision.obligations.map(|o| PolicyObligations {
                max_tokens: o.max_tokens,
                allowed_models: if o.allowed_models.is_empty() {
                    None
                } else {
                    Some(o.allowed_models)
                },
                tool_restrictions: if o.tool_restrictions.is_empty() {
                    None
                } else {
                    Some(o.tool_restrictions)
                },
            }),
            require_approval: decision.require_approval,
            confidence: decision.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;

    #[tokio::test]
    async fn port_rejects_malformed_input() {
        let engine = PolicyEngine::from_config(PolicyConfig::enforce_defaults());
        let err = PolicyEvaluatorPort::evaluate(&engine, serde_json::json!({"bogus": true}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn port_round_trips_allow_decision() {
        let mut config = PolicyConfig::enforce_defaults();
        config.rules.allowlisted_users.insert("alice".to_string());
        let engine = PolicyEngine::from_config(config);

        let input = serde_json::json!({
            "user_id": "alice",
            "environment": "staging",
            "token_budget": 10,
            "complexity_score": 0.1,
        });
        let decision = PolicyEvaluatorPort::evaluate(&engine, input).await.unwrap();
        assert!(decision.allow);
    }
}
