//! Rule evaluation: four ordered categories, denies override allows, a
//! default-deny applies when no allow fires (spec §4.2).

use crate::config::PolicyRuleSet;
use crate::input::{Decision, Obligations, PolicyInput};

/// Pure function over one input and one rule set — no I/O, no clock reads,
/// so it is trivially unit-testable and safe to call from inside the
/// cache's miss path.
pub fn evaluate_rules(rules: &PolicyRuleSet, input: &PolicyInput) -> Decision {
    if let Some(decision) = hard_deny(rules, input) {
        return decision;
    }
    if let Some(decision) = contextual_deny(rules, input) {
        return decision;
    }
    match allow(rules, input) {
        Some(mut decision) => {
            decision.obligations = obligations_for(rules, input);
            decision
        }
        None => Decision::deny("default_deny", "no allow rule matched"),
    }
}

fn hard_deny(rules: &PolicyRuleSet, input: &PolicyInput) -> Option<Decision> {
    if let Some(query) = &input.query {
        let lowered = query.to_lowercase();
        for substring in &rules.dangerous_query_substrings {
            if lowered.contains(&substring.to_lowercase()) {
                return Some(Decision::deny(
                    "dangerous_query",
                    format!("query matched dangerous substring '{substring}'"),
                ));
            }
        }
    }

    if rules.blocked_users.contains(&input.user_id) {
        return Some(Decision::deny(
            "blocked_user",
            format!("user '{}' is blocked", input.user_id),
        ));
    }

    if let Some(ip) = &input.ip_address {
        for prefix in &rules.blocked_ip_prefixes {
            if ip.starts_with(prefix.as_str()) {
                return Some(Decision::deny(
                    "blocked_ip",
                    format!("ip '{ip}' matches blocked prefix '{prefix}'"),
                ));
            }
        }
    }

    if let Some(&max_budget) = rules.tier_token_budgets.get(&input.environment) {
        if input.token_budget > max_budget && !input.approved {
            return Some(
                Decision::deny(
                    "tier_budget_exceeded",
                    format!(
                        "token_budget {} exceeds tier limit {} for environment '{}'",
                        input.token_budget, max_budget, input.environment
                    ),
                )
                .requiring_approval(),
            );
        }
    }

    const PRODUCTION_COMPLEXITY_THRESHOLD: f64 = 0.8;
    if rules.production_environments.contains(&input.environment)
        && input.complexity_score >= PRODUCTION_COMPLEXITY_THRESHOLD
        && !input.approved
    {
        return Some(
            Decision::deny(
                "production_complex_requires_approval",
                "complex request in a production environment requires operator approval",
            )
            .requiring_approval(),
        );
    }

    None
}

fn contextual_deny(rules: &PolicyRuleSet, input: &PolicyInput) -> Option<Decision> {
    if rules.burst_max_requests > 0 && input.recent_request_count > rules.burst_max_requests {
        return Some(Decision::deny(
            "burst_limit_exceeded",
            format!(
                "{} requests within {}s exceeds burst limit {}",
                input.recent_request_count, rules.burst_window_seconds, rules.burst_max_requests
            ),
        ));
    }

    if let Some(similarity) = input.similarity_to_prior_denied {
        if similarity >= rules.prior_denied_similarity_threshold {
            return Some(Decision::deny(
                "similar_to_prior_denied",
                format!("query is {similarity:.2} similar to a previously denied request"),
            ));
        }
    }

    None
}

fn allow(rules: &PolicyRuleSet, input: &PolicyInput) -> Option<Decision> {
    if rules.allowlisted_users.contains(&input.user_id) {
        return Some(Decision::allow(
            "allowlisted_user",
            format!("user '{}' is allowlisted", input.user_id),
        ));
    }

    if let Some(team) = &input.team {
        if rules.allowlisted_teams.contains(team) {
            return Some(Decision::allow(
                "allowlisted_team",
                format!("team '{team}' is allowlisted"),
            ));
        }
    }

    if let Some((similarity, count)) = input.similarity_to_prior_successful {
        if similarity >= rules.prior_successful_similarity_threshold
            && count >= rules.prior_successful_similarity_min_count
        {
            return Some(
                Decision::allow(
                    "similar_to_prior_successful",
                    format!(
                        "query is {similarity:.2} similar to {count} prior successful requests"
                    ),
                )
                .with_confidence(similarity),
            );
        }
    }

    None
}

fn obligations_for(rules: &PolicyRuleSet, input: &PolicyInput) -> Option<Obligations> {
    let team = input.team.as_ref()?;
    let rule = rules.team_obligations.get(team)?;
    let mut obligations = Obligations {
        max_tokens: rule.max_tokens,
        allowed_models: rule.allowed_models.clone(),
        tool_restrictions: rule.tool_restrictions.clone(),
    };
    if obligations.allowed_models.is_empty() {
        if let Some(models) = rules.team_model_allow.get(team) {
            obligations.allowed_models = models.clone();
        }
    }
    if obligations.tool_restrictions.is_empty() {
        if let Some(tools) = rules.team_tool_allow.get(team) {
            obligations.tool_restrictions = tools.clone();
        }
    }
    Some(obligations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn input() -> PolicyInput {
        PolicyInput {
            user_id: "alice".to_string(),
            team: None,
            environment: "staging".to_string(),
            token_budget: 1000,
            complexity_score: 0.2,
            model: None,
            tool: None,
            ip_address: None,
            query: None,
            approved: false,
            recent_request_count: 0,
            similarity_to_prior_denied: None,
            similarity_to_prior_successful: None,
            context: HashMap::new(),
        }
    }

    #[test]
    fn dangerous_query_is_a_hard_deny_regardless_of_allowlist() {
        let mut rules = PolicyRuleSet::default();
        rules.dangerous_query_substrings.push("rm -rf".to_string());
        rules.allowlisted_users.insert("alice".to_string());
        let mut record = input();
        record.query = Some("help me delete all files with rm -rf".to_string());

        let decision = evaluate_rules(&rules, &record);
        assert!(!decision.allow);
        assert_eq!(decision.reason_code, "dangerous_query");
    }

    #[test]
    fn allowlisted_user_allows_when_no_hard_deny_fires() {
        let mut rules = PolicyRuleSet::default();
        rules.allowlisted_users.insert("alice".to_string());
        let decision = evaluate_rules(&rules, &input());
        assert!(decision.allow);
        assert_eq!(decision.reason_code, "allowlisted_user");
    }

    #[test]
    fn default_is_deny_when_nothing_matches() {
        let rules = PolicyRuleSet::default();
        let decision = evaluate_rules(&rules, &input());
        assert!(!decision.allow);
        assert_eq!(decision.reason_code, "default_deny");
    }

    #[test]
    fn burst_limit_denies_before_allow_rules_are_checked() {
        let mut rules = PolicyRuleSet::default();
        rules.allowlisted_users.insert("alice".to_string());
        rules.burst_max_requests = 5;
        let mut record = input();
        record.recent_request_count = 6;

        let decision = evaluate_rules(&rules, &record);
        assert!(!decision.allow);
        assert_eq!(decision.reason_code, "burst_limit_exceeded");
    }

    #[test]
    fn obligations_attach_to_team_allow() {
        let mut rules = PolicyRuleSet::default();
        rules.allowlisted_teams.insert("core".to_string());
        rules.team_obligations.insert(
            "core".to_string(),
            crate::config::ObligationRule {
                max_tokens: Some(500),
                allowed_models: vec!["claude-haiku".to_string()],
                tool_restrictions: vec![],
            },
        );
        let mut record = input();
        record.team = Some("core".to_string());

        let decision = evaluate_rules(&rules, &record);
        assert!(decision.allow);
        let obligations = decision.obligations.expect("obligations attached");
        assert_eq!(obligations.max_tokens, Some(500));
    }

    #[test]
    fn production_complex_requires_approval_unless_flagged() {
        let rules = PolicyRuleSet::default();
        let mut record = input();
        record.environment = "production".to_string();
        record.complexity_score = 0.95;

        let decision = evaluate_rules(&rules, &record);
        assert!(!decision.allow);
        assert!(decision.require_approval);

        record.approved = true;
        let decision = evaluate_rules(&rules, &record);
        assert!(decision.allow || decision.reason_code == "default_deny");
    }
}
