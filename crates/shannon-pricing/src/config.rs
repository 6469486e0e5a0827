//! Declarative pricing & rate-limit configuration (spec §4.1/§6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use shannon_core::error::{ShannonError, ShannonResult};

/// Per-direction (or combined) pricing for a single model, USD per 1k tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: Option<f64>,
    pub output_per_1k: Option<f64>,
    pub combined_per_1k: Option<f64>,
}

impl ModelPrice {
    fn validate(&self, provider: &str, model: &str) -> ShannonResult<()> {
        for (label, v) in [
            ("input_per_1k", self.input_per_1k),
            ("output_per_1k", self.output_per_1k),
            ("combined_per_1k", self.combined_per_1k),
        ] {
            if let Some(v) = v {
                if v < 0.0 {
                    return Err(ShannonError::Validation(format!(
                        "pricing.models.{provider}.{model}.{label} is negative: {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingDefaults {
    pub combined_per_1k: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierOverride {
    pub rpm: Option<f64>,
    pub tpm: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    pub default_rpm: f64,
    pub default_tpm: f64,
    #[serde(default)]
    pub tier_overrides: HashMap<String, TierOverride>,
    #[serde(default)]
    pub provider_overrides: HashMap<String, TierOverride>,
}

impl RateLimitsConfig {
    fn validate(&self) -> ShannonResult<()> {
        if self.default_rpm < 0.0 || self.default_tpm < 0.0 {
            return Err(ShannonError::Validation(
                "rate_limits defaults must not be negative".into(),
            ));
        }
        for (tier, o) in &self.tier_overrides {
            if o.rpm.is_some_and(|v| v < 0.0) || o.tpm.is_some_and(|v| v < 0.0) {
                return Err(ShannonError::Validation(format!(
                    "rate_limits.tier_overrides.{tier} must not be negative"
                )));
            }
        }
        for (provider, o) in &self.provider_overrides {
            if o.rpm.is_some_and(|v| v < 0.0) || o.tpm.is_some_and(|v| v < 0.0) {
                return Err(ShannonError::Validation(format!(
                    "rate_limits.provider_overrides.{provider} must not be negative"
                )));
            }
        }
        Ok(())
    }
}

/// Root pricing/rate-limit configuration document (spec §6 "Configuration
/// file"). Deserialized from TOML, validated at load, held behind an
/// `ArcSwap` snapshot by `PricingRegistry`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub defaults: PricingDefaults,
    /// `models[provider][name]`
    #[serde(default)]
    pub models: HashMap<String, HashMap<String, ModelPrice>>,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
}

impl PricingConfig {
    /// Validate the whole document; negative numerics anywhere are rejected
    /// at load (spec §4.1 "Negative values are rejected at load").
    pub fn validate(&self) -> ShannonResult<()> {
        if self.defaults.combined_per_1k < 0.0 {
            return Err(ShannonError::Validation(
                "pricing.defaults.combined_per_1k must not be negative".into(),
            ));
        }
        for (provider, models) in &self.models {
            for (model, price) in models {
                price.validate(provider, model)?;
            }
        }
        self.rate_limits.validate()
    }

    pub fn find_model(&self, model: &str) -> Option<(&str, &ModelPrice)> {
        for (provider, models) in &self.models {
            if let Some(price) = models.get(model) {
                return Some((provider.as_str(), price));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_default_rejected() {
        let cfg = PricingConfig {
            defaults: PricingDefaults {
                combined_per_1k: -1.0,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_model_price_rejected() {
        let mut models = HashMap::new();
        let mut anthropic = HashMap::new();
        anthropic.insert(
            "claude-haiku".to_string(),
            ModelPrice {
                input_per_1k: Some(-0.1),
                ..Default::default()
            },
        );
        models.insert("anthropic".to_string(), anthropic);
        let cfg = PricingConfig {
            models,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn well_formed_config_validates() {
        let mut models = HashMap::new();
        let mut anthropic = HashMap::new();
        anthropic.insert(
            "claude-haiku".to_string(),
            ModelPrice {
                input_per_1k: Some(0.25),
                output_per_1k: Some(1.25),
                combined_per_1k: None,
            },
        );
        models.insert("anthropic".to_string(), anthropic);
        let cfg = PricingConfig {
            defaults: PricingDefaults {
                combined_per_1k: 1.0,
            },
            models,
            rate_limits: RateLimitsConfig {
                default_rpm: 60.0,
                default_tpm: 100_000.0,
                ..Default::default()
            },
        };
        assert!(cfg.validate().is_ok());
    }
}
