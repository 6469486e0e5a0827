//! Adapts `PricingRegistry` to `shannon_harness::ports::RateGate`, the
//! shape DISPATCHING consults before issuing a downstream agent call
//! (spec §4.8 step 2: "consult C1 for the required delay given
//! provider/tier; sleep or defer accordingly").

use async_trait::async_trait;
use std::time::Duration;

use shannon_harness::ports::RateGate;

use crate::registry::PricingRegistry;

#[async_trait]
impl RateGate for PricingRegistry {
    async fn delay_for_request(
        &self,
        provider: &str,
        tier: &str,
        estimated_tokens: u64,
    ) -> Duration {
        self.delay_for_request(provider, tier, estimated_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingConfig;

    #[tokio::test]
    async fn port_delegates_to_registry() {
        let registry = PricingRegistry::from_config(PricingConfig::default()).unwrap();
        let direct = registry.delay_for_request("anthropic", "small", 1000);
        let via_port: Duration = RateGate::delay_for_request(&registry, "anthropic", "small", 1000).await;
        assert_eq!(direct, via_port);
    }
}
