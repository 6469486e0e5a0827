//! Pricing & rate registry: cost estimation and inter-provider pacing for
//! agent calls.
//!
//! Configuration is a TOML document (`PricingConfig`) held behind an
//! `ArcSwap` snapshot (`shannon_core::config::ConfigHandle`) so reloads
//! never tear a concurrent read. `PricingRegistry` is the public entry
//! point: `cost_for_split`/`cost_for_tokens` estimate spend, and
//! `delay_for_request` paces calls against provider/tier rate limits.

pub mod adapter;
pub mod config;
pub mod provider;
pub mod registry;

pub use config::{ModelPrice, PricingConfig, PricingDefaults, RateLimitsConfig, TierOverride};
pub use provider::detect_provider;
pub use registry::{PricingMetrics, PricingMetricsSnapshot, PricingRegistry};
