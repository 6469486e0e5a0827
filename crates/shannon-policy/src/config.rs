//! Declarative policy configuration (spec §4.2/§6 "Policy rule files").

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// `off` always allows and emits nothing; `dry-run` evaluates for real but
/// always returns allow to the caller, counting divergence; `enforce`
/// returns the real decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    Off,
    DryRun,
    Enforce,
}

impl Default for PolicyMode {
    fn default() -> Self {
        PolicyMode::Enforce
    }
}

impl PolicyMode {
    /// Label used on the `policy_evaluations_total{mode}` metric.
    pub fn label(&self) -> &'static str {
        match self {
            PolicyMode::Off => "off",
            PolicyMode::DryRun => "dry-run",
            PolicyMode::Enforce => "enforce",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObligationRule {
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub tool_restrictions: Vec<String>,
}

/// Rule categories, evaluated in order; denies override allows; a
/// default-deny applies when no allow fires (spec §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    /// Hard denies (category 1).
    #[serde(default)]
    pub dangerous_query_substrings: Vec<String>,
    #[serde(default)]
    pub blocked_users: HashSet<String>,
    #[serde(default)]
    pub blocked_ip_prefixes: Vec<String>,
    /// `environment -> max token_budget`; tiers above this are denied
    /// unless `AgentTask` carries an approval flag.
    #[serde(default)]
    pub tier_token_budgets: HashMap<String, u64>,
    /// Environments considered "production" for the complex+approval rule.
    #[serde(default)]
    pub production_environments: HashSet<String>,

    /// Contextual denies (category 2).
    pub burst_window_seconds: u64,
    pub burst_max_requests: u32,
    pub prior_denied_similarity_threshold: f64,

    /// Allows (category 3).
    #[serde(default)]
    pub allowlisted_users: HashSet<String>,
    #[serde(default)]
    pub allowlisted_teams: HashSet<String>,
    #[serde(default)]
    pub team_model_allow: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub team_tool_allow: HashMap<String, Vec<String>>,
    pub prior_successful_similarity_threshold: f64,
    pub prior_successful_similarity_min_count: u32,

    /// Obligations (category 4), keyed by team.
    #[serde(default)]
    pub team_obligations: HashMap<String, ObligationRule>,
}

impl Default for PolicyRuleSet {
    fn default() -> Self {
        Self {
            dangerous_query_substrings: Vec::new(),
            blocked_users: HashSet::new(),
            blocked_ip_prefixes: Vec::new(),
            tier_token_budgets: HashMap::new(),
            production_environments: HashSet::from(["production".to_string()]),
            burst_window_seconds: 300,
            burst_max_requests: 100,
            prior_denied_similarity_threshold: 0.9,
            allowlisted_users: HashSet::new(),
            allowlisted_teams: HashSet::new(),
            team_model_allow: HashMap::new(),
            team_tool_allow: HashMap::new(),
            prior_successful_similarity_threshold: 0.8,
            prior_successful_similarity_min_count: 3,
            team_obligations: HashMap::new(),
        }
    }
}

/// Root policy configuration document: mode, failure behavior, and the
/// rule set, held together behind one `ArcSwap` snapshot so a reload never
/// lets a reader observe a mode from one generation paired with rules from
/// another.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub mode: PolicyMode,
    /// Behavior when the rule store fails to load: `true` denies every
    /// request, `false` allows with an error metric (spec §4.2).
    #[serde(default = "default_fail_closed")]
    pub fail_closed: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    #[serde(default)]
    pub rules: PolicyRuleSet,
}

fn default_fail_closed() -> bool {
    true
}

impl PolicyConfig {
    pub fn enforce_defaults() -> Self {
        Self {
            mode: PolicyMode::Enforce,
            fail_closed: true,
            cache_ttl_seconds: 30,
            cache_max_entries: 10_000,
            rules: PolicyRuleSet::default(),
        }
    }
}
