//! Two-step provider detection: catalog lookup then pattern match (spec
//! §4.1/§9 — "replaces monkey-patched/duck-typed provider detection with a
//! two-step strategy function... with an explicit override table enumerated
//! in one place").

use crate::config::PricingConfig;

/// Detect the provider for `model`, preferring an explicit catalog entry
/// (spec §4.1). Falls back to canonical prefix matching, case-insensitively.
/// Llama-family names normalize to `"local"` even when cataloged under a
/// vendor; Groq-specific names take precedence over the llama override.
pub fn detect_provider(config: &PricingConfig, model: &str) -> String {
    if let Some((provider, _)) = config.find_model(model) {
        return provider.to_string();
    }
    pattern_match_provider(model)
}

fn pattern_match_provider(model: &str) -> String {
    let m = model.to_lowercase();

    // Groq-hosted names take precedence over the llama->local override.
    if m.contains("groq") {
        return "groq".to_string();
    }
    if m.contains("gpt-") || m.starts_with("gpt") || m.contains("o1") || m.contains("o3") {
        return "openai".to_string();
    }
    if m.contains("claude") || m.contains("opus") || m.contains("sonnet") || m.contains("haiku") {
        return "anthropic".to_string();
    }
    if m.contains("gemini") || m.contains("palm") {
        return "google".to_string();
    }
    if m.contains("deepseek") {
        return "deepseek".to_string();
    }
    if m.contains("qwen") {
        return "qwen".to_string();
    }
    if m.contains("grok") {
        return "xai".to_string();
    }
    if m.contains("mistral") || m.contains("mixtral") || m.contains("codestral") {
        return "mistral".to_string();
    }
    if m.contains("glm") {
        return "zhipu".to_string();
    }
    if m.contains("command") || m.contains("cohere") {
        return "cohere".to_string();
    }
    // llama / codellama family normalizes to "local" regardless of catalog vendor.
    if m.contains("llama") {
        return "local".to_string();
    }
    "unknown".to_string()
}
