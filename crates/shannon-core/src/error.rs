//! Top-level error kind shared across components (spec §7).

use thiserror::Error;

/// The eight error kinds every component surfaces, wrapped so the workflow
/// engine can match on `kind()` without depending on any one component's
/// crate.
#[derive(Debug, Error)]
pub enum ShannonError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("plan invalid: {0}")]
    PlanInvalid(String),

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ShannonError {
    /// Stable machine-readable kind, matching the `error_kind` metric label
    /// in spec §7/§6.
    pub fn kind(&self) -> &'static str {
        match self {
            ShannonError::Validation(_) => "validation",
            ShannonError::NotFound(_) => "not_found",
            ShannonError::Conflict(_) => "conflict",
            ShannonError::DependencyUnavailable(_) => "dependency_unavailable",
            ShannonError::RateLimited { .. } => "rate_limited",
            ShannonError::PolicyDenied(_) => "policy_denied",
            ShannonError::PlanInvalid(_) => "plan_invalid",
            ShannonError::BudgetExceeded(_) => "budget_exceeded",
            ShannonError::Cancelled(_) => "cancelled",
            ShannonError::Timeout(_) => "timeout",
            ShannonError::Internal(_) => "internal",
        }
    }

    /// Whether a caller should retry this operation after backing off.
    ///
    /// Spec §7: transient errors (dependency unavailable, rate limited,
    /// timeout) are retried with backoff; permanent errors (policy,
    /// validation, plan, budget, cancellation) are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShannonError::DependencyUnavailable(_)
                | ShannonError::RateLimited { .. }
                | ShannonError::Timeout(_)
        )
    }

    /// Distinct terminal-state marker (spec property 9: cancellation is a
    /// terminal state distinct from failure).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ShannonError::Cancelled(_))
    }
}

pub type ShannonResult<T> = std::result::Result<T, ShannonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ShannonError::Validation("x".into()).kind(), "validation");
        assert_eq!(
            ShannonError::RateLimited { retry_after_ms: 10 }.kind(),
            "rate_limited"
        );
    }

    #[test]
    fn retryable_kinds() {
        assert!(ShannonError::Timeout("x".into()).is_retryable());
        assert!(!ShannonError::Validation("x".into()).is_retryable());
    }
}
