//! Policy engine (spec §4.2, C2): ordered allow/deny rules, off/dry-run/
//! enforce modes, a hot-reloadable rule set, and a bounded TTL'd decision
//! cache.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod engine;
pub mod input;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use shannon_core::config::ConfigHandle;

pub use cache::{CacheMetricsSnapshot, DecisionCache};
pub use config::{ObligationRule, PolicyConfig, PolicyMode, PolicyRuleSet};
pub use input::{Decision, Obligations, PolicyInput};

/// `policy_evaluations_total{decision,mode,reason}` and
/// `policy_dry_run_divergence_total{divergence_type}` (spec §6), kept as
/// plain atomics in a `DashMap` keyed by label tuple — the same shape
/// `shannon-harness::circuit_breaker`'s registry uses for per-key state.
#[derive(Debug, Default)]
pub struct PolicyMetrics {
    evaluations: DashMap<(bool, &'static str, &'static str), AtomicU64>,
    dry_run_divergence: AtomicU64,
    evaluation_duration: DashMap<&'static str, (AtomicU64, AtomicU64)>, // (count, total_micros)
}

impl PolicyMetrics {
    fn record_evaluation(&self, allow: bool, mode: &'static str, reason: &'static str) {
        self.evaluations
            .entry((allow, mode, reason))
            .or_insert_with(AtomicU64::default)
            .fetch_add(1, Ordering::Relaxed);
    }

    fn record_would_deny(&self) {
        self.dry_run_divergence.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, mode: &'static str, elapsed: Duration) {
        let entry = self
            .evaluation_duration
            .entry(mode)
            .or_insert_with(|| (AtomicU64::new(0), AtomicU64::new(0)));
        entry.0.fetch_add(1, Ordering::Relaxed);
        entry
            .1
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn evaluations_total(&self, allow: bool, mode: &str, reason: &str) -> u64 {
        self.evaluations
            .iter()
            .find(|entry| entry.key() == &(allow, mode_label_to_static(mode), reason_to_static(reason)))
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn would_deny_total(&self) -> u64 {
        self.dry_run_divergence.load(Ordering::Relaxed)
    }
}

// Reason codes are always `&'static str` literals produced by `engine.rs`;
// these helpers only exist so callers can look a count up by an owned
// `String` in tests without unsafe leaking.
fn mode_label_to_static(mode: &str) -> &'static str {
    match mode {
        "off" => "off",
        "dry-run" => "dry-run",
        _ => "enforce",
    }
}

fn reason_to_static(reason: &str) -> &'static str {
    match reason {
        "allowlisted_user" => "allowlisted_user",
        "allowlisted_team" => "allowlisted_team",
        "similar_to_prior_successful" => "similar_to_prior_successful",
        "default_deny" => "default_deny",
        "dangerous_query" => "dangerous_query",
        "blocked_user" => "blocked_user",
        "blocked_ip" => "blocked_ip",
        "tier_budget_exceeded" => "tier_budget_exceeded",
        "production_complex_requires_approval" => "production_complex_requires_approval",
        "burst_limit_exceeded" => "burst_limit_exceeded",
        "similar_to_prior_denied" => "similar_to_prior_denied",
        "mode_off" => "mode_off",
        _ => "unknown",
    }
}

/// Ties the rule set, mode, and cache together behind one evaluate() call.
pub struct PolicyEngine {
    config: ConfigHandle<PolicyConfig>,
    cache: DecisionCache,
    metrics: PolicyMetrics,
}

impl PolicyEngine {
    pub fn load_or_default(path: impl Into<std::path::PathBuf>) -> Self {
        let config: ConfigHandle<PolicyConfig> = ConfigHandle::load_or_default(path);
        let snapshot = config.snapshot();
        let cache = DecisionCache::new(
            Duration::from_secs(snapshot.cache_ttl_seconds.max(1)),
            snapshot.cache_max_entries.max(1),
        );
        Self {
            config,
            cache,
            metrics: PolicyMetrics::default(),
        }
    }

    pub fn from_config(config: PolicyConfig) -> Self {
        let path = std::env::temp_dir().join(format!(
            "shannon-policy-inmem-{}.toml",
            uuid::Uuid::new_v4()
        ));
        let handle: ConfigHandle<PolicyConfig> = ConfigHandle::load_or_default(&path);
        let cache = DecisionCache::new(
            Duration::from_secs(config.cache_ttl_seconds.max(1)),
            config.cache_max_entries.max(1),
        );
        handle.set(config);
        Self {
            config: handle,
            cache,
            metrics: PolicyMetrics::default(),
        }
    }

    pub fn reload(&self) -> shannon_core::error::ShannonResult<()> {
        self.config.reload()
    }

    pub fn metrics(&self) -> &PolicyMetrics {
        &self.metrics
    }

    pub fn cache_metrics(&self) -> CacheMetricsSnapshot {
        self.cache.metrics()
    }

    /// Evaluate `input` against the live rule set.
    ///
    /// `off` short-circuits before touching the cache or rule set. `dry-run`
    /// always evaluates for real, always returns allow to the caller, and
    /// increments `would_deny` whenever the real decision disagrees.
    /// `enforce` returns the real decision.
    pub async fn evaluate(&self, input: PolicyInput) -> Decision {
        let started = Instant::now();
        let snapshot = self.config.snapshot();

        if snapshot.mode == PolicyMode::Off {
            let decision = Decision::allow("mode_off", "policy evaluation disabled");
            self.metrics.record_evaluation(true, "off", "mode_off");
            self.metrics.record_duration("off", started.elapsed());
            return decision;
        }

        let key = DecisionCache::key_for(&input);
        let real_decision = match self.cache.get(key).await {
            Some(cached) => cached,
            None => {
                let computed = engine::evaluate_rules(&snapshot.rules, &input);
                self.cache.insert(key, computed.clone()).await;
                computed
            }
        };

        let mode_label = snapshot.mode.label();
        self.metrics
            .record_evaluation(real_decision.allow, mode_label, real_decision.reason_code);
        self.metrics.record_duration(mode_label, started.elapsed());

        match snapshot.mode {
            PolicyMode::Enforce => real_decision,
            PolicyMode::DryRun => {
                if !real_decision.allow {
                    self.metrics.record_would_deny();
                }
                Decision::allow(real_decision.reason_code, real_decision.reason.clone())
            }
            PolicyMode::Off => unreachable!("handled above"),
        }
    }
}
