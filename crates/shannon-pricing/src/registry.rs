//! Pricing & rate-limit registry (C1): cost calculation and inter-call
//! delay, backed by a hot-reloadable `ArcSwap` snapshot.
//!
//! Built on the `ConfigHandle`/`ArcSwap` snapshot pattern
//! (`shannon-core::config`) generalized with crate-local fallback
//! counters, since pricing is the component spec §9 names as the concrete
//! instance of "global mutable config singletons replaced by a snapshot
//! holder".

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use shannon_core::config::ConfigHandle;
use shannon_core::error::ShannonResult;

use crate::config::PricingConfig;
use crate::provider::detect_provider;

/// Counters for pricing fallbacks, labeled by reason (spec §6
/// `pricing_fallbacks_total{reason}`).
#[derive(Debug, Default)]
pub struct PricingMetrics {
    missing_model: AtomicU64,
    unknown_model: AtomicU64,
}

impl PricingMetrics {
    pub fn snapshot(&self) -> PricingMetricsSnapshot {
        PricingMetricsSnapshot {
            missing_model: self.missing_model.load(Ordering::Relaxed),
            unknown_model: self.unknown_model.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricingMetricsSnapshot {
    pub missing_model: u64,
    pub unknown_model: u64,
}

/// Answers "how much does N tokens on model M cost?" and "how long must I
/// wait before issuing the next call?" (spec §4.1).
pub struct PricingRegistry {
    config: ConfigHandle<PricingConfig>,
    metrics: PricingMetrics,
}

impl PricingRegistry {
    pub fn load_or_default(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            config: ConfigHandle::load_or_default(path),
            metrics: PricingMetrics::default(),
        }
    }

    pub fn from_config(config: PricingConfig) -> ShannonResult<Self> {
        config.validate()?;
        let path = std::env::temp_dir().join(format!(
            "shannon-pricing-inmem-{}.toml",
            uuid_like_suffix()
        ));
        let handle: ConfigHandle<PricingConfig> = ConfigHandle::load_or_default(&path);
        handle.set(config);
        Ok(Self {
            config: handle,
            metrics: PricingMetrics::default(),
        })
    }

    pub fn reload(&self) -> ShannonResult<()> {
        self.config.reload()
    }

    pub fn metrics(&self) -> PricingMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// `detect_provider(model)`: catalog lookup then pattern match (§4.1).
    pub fn detect_provider(&self, model: &str) -> String {
        detect_provider(&self.config.snapshot(), model)
    }

    /// `cost_for_split(model, in, out) -> usd` (§4.1).
    ///
    /// Uses per-direction prices if both present; falls back to combined;
    /// falls back to `default * (in+out)` for an unknown model. Increments
    /// a fallback counter labeled `missing_model` (model cataloged but
    /// direction/combined price absent) or `unknown_model` (model not in
    /// the catalog at all).
    pub fn cost_for_split(&self, model: &str, input_tokens: i64, output_tokens: i64) -> f64 {
        let input_tokens = input_tokens.max(0) as f64;
        let output_tokens = output_tokens.max(0) as f64;
        let snapshot = self.config.snapshot();

        match snapshot.find_model(model) {
            Some((_, price)) => {
                if let (Some(inp), Some(out)) = (price.input_per_1k, price.output_per_1k) {
                    return (input_tokens / 1000.0) * inp + (output_tokens / 1000.0) * out;
                }
                if let Some(combined) = price.combined_per_1k {
                    return ((input_tokens + output_tokens) / 1000.0) * combined;
                }
                self.metrics.missing_model.fetch_add(1, Ordering::Relaxed);
                ((input_tokens + output_tokens) / 1000.0) * snapshot.defaults.combined_per_1k
            }
            None => {
                self.metrics.unknown_model.fetch_add(1, Ordering::Relaxed);
                ((input_tokens + output_tokens) / 1000.0) * snapshot.defaults.combined_per_1k
            }
        }
    }

    /// `cost_for_tokens(model, total) -> usd` (§4.1), symmetrical to
    /// `cost_for_split` with the whole total treated as combined usage.
    pub fn cost_for_tokens(&self, model: &str, total_tokens: i64) -> f64 {
        let total_tokens = total_tokens.max(0) as f64;
        let snapshot = self.config.snapshot();

        match snapshot.find_model(model) {
            Some((_, price)) => {
                if let Some(combined) = price.combined_per_1k {
                    return (total_tokens / 1000.0) * combined;
                }
                if let (Some(inp), Some(out)) = (price.input_per_1k, price.output_per_1k) {
                    // No split is known for this call; average the two
                    // per-direction prices as the best available estimate.
                    let avg = (inp + out) / 2.0;
                    return (total_tokens / 1000.0) * avg;
                }
                self.metrics.missing_model.fetch_add(1, Ordering::Relaxed);
                (total_tokens / 1000.0) * snapshot.defaults.combined_per_1k
            }
            None => {
                self.metrics.unknown_model.fetch_add(1, Ordering::Relaxed);
                (total_tokens / 1000.0) * snapshot.defaults.combined_per_1k
            }
        }
    }

    /// `delay_for_request(provider, tier, est_tokens) -> duration` (§4.1).
    ///
    /// Combines tier and provider limits by taking the smaller positive
    /// bound per dimension; required delay is
    /// `max(60_000/rpm, 60_000/tpm * est_tokens)` ms, clamped to <= 60s.
    pub fn delay_for_request(&self, provider: &str, tier: &str, estimated_tokens: u64) -> Duration {
        let snapshot = self.config.snapshot();
        let limits = &snapshot.rate_limits;

        let rpm = smaller_positive_bound(
            limits.tier_overrides.get(tier).and_then(|o| o.rpm),
            limits.provider_overrides.get(provider).and_then(|o| o.rpm),
            limits.default_rpm,
        );
        let tpm = smaller_positive_bound(
            limits.tier_overrides.get(tier).and_then(|o| o.tpm),
            limits.provider_overrides.get(provider).and_then(|o| o.tpm),
            limits.default_tpm,
        );

        let rpm_delay_ms = if rpm > 0.0 { 60_000.0 / rpm } else { 0.0 };
        let tpm_delay_ms = if tpm > 0.0 {
            (60_000.0 / tpm) * estimated_tokens as f64
        } else {
            0.0
        };

        let delay_ms = rpm_delay_ms.max(tpm_delay_ms).min(60_000.0).max(0.0);
        Duration::from_millis(delay_ms.round() as u64)
    }
}

/// The smaller of the two overrides that are actually set (treating a
/// missing override as "no bound"), falling back to `default` when neither
/// override applies.
fn smaller_positive_bound(tier: Option<f64>, provider: Option<f64>, default: f64) -> f64 {
    match (tier, provider) {
        (Some(t), Some(p)) => t.min(p),
        (Some(t), None) => t,
        (None, Some(p)) => p,
        (None, None) => default,
    }
}

fn uuid_like_suffix() -> String {
    use std::sync::atomic::AtomicU64 as Counter;
    static COUNTER: Counter = Counter::new(0);
    format!(
        "{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}
