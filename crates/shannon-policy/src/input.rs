//! Policy input record and decision (spec §4.2 "Contract").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The record a caller evaluates a request against. Signals that require
/// history (burst counts, similarity scores) are computed by the caller
/// (typically the workflow engine, consulting C5/C6) and passed in already
/// resolved, keeping the policy engine itself a pure function of its input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyInput {
    pub user_id: String,
    #[serde(default)]
    pub team: Option<String>,
    pub environment: String,
    pub token_budget: u64,
    pub complexity_score: f64,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    /// Set when an operator has explicitly approved a production+complex
    /// request ahead of time.
    #[serde(default)]
    pub approved: bool,
    /// Requests from this user/session within the rule set's burst window.
    #[serde(default)]
    pub recent_request_count: u32,
    /// Highest similarity to a prior *denied* query, if known.
    #[serde(default)]
    pub similarity_to_prior_denied: Option<f64>,
    /// Highest similarity to prior *successful* queries, plus how many
    /// distinct prior successes crossed that similarity.
    #[serde(default)]
    pub similarity_to_prior_successful: Option<(f64, u32)>,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// Restrictions attached to an allow decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Obligations {
    pub max_tokens: Option<u64>,
    pub allowed_models: Vec<String>,
    pub tool_restrictions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: String,
    /// Stable label for the `policy_evaluations_total{reason}` metric,
    /// distinct from `reason` (free text meant for logs/operators).
    pub reason_code: &'static str,
    pub obligations: Option<Obligations>,
    pub require_approval: bool,
    pub confidence: Option<f64>,
}

impl Decision {
    pub fn allow(reason_code: &'static str, reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
            reason_code,
            obligations: None,
            require_approval: false,
            confidence: None,
        }
    }

    pub fn deny(reason_code: &'static str, reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            reason_code,
            obligations: None,
            require_approval: false,
            confidence: None,
        }
    }

    pub fn with_obligations(mut self, obligations: Obligations) -> Self {
        self.obligations = Some(obligations);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.require_approval = true;
        self
    }
}
