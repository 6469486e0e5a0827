use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError {
    #[error("circuit is open – refusing call")]
    Open,
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("inner error: {0}")]
    Inner(String),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation – all calls pass through.
    Closed,
    /// Too many failures – calls are rejected immediately.
    Open,
    /// Testing recovery – limited calls are allowed through.
    HalfOpen,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Number of consecutive successes in half-open before closing.
    pub success_threshold: u32,
    /// How long the circuit stays open before transitioning to half-open.
    pub timeout: Duration,
    /// Maximum duration for an individual call.
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Inner state (behind Mutex)
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct InnerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    total_requests: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

/// Point-in-time counters exposed per `(component, subsystem)` label
/// (spec §4.4/§6 `circuit_breaker_state{dep,subsystem}`).
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

// ---------------------------------------------------------------------------
// CircuitBreaker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<InnerState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(InnerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                total_requests: 0,
                total_successes: 0,
                total_failures: 0,
                total_rejections: 0,
            })),
        }
    }

    /// Snapshot of the request/success/failure/rejection counters alongside
    /// the current state.
    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        let guard = self.inner.lock().await;
        CircuitBreakerMetrics {
            state: guard.state,
            total_requests: guard.total_requests,
            total_successes: guard.total_successes,
            total_failures: guard.total_failures,
            total_rejections: guard.total_rejections,
        }
    }

    /// Returns the current state of the circuit breaker.
    pub async fn state(&self) -> CircuitState {
        let guard = self.inner.lock().await;
        guard.state
    }

    /// Returns the current failure count.
    pub async fn failure_count(&self) -> u32 {
        let guard = self.inner.lock().await;
        guard.failure_count
    }

    /// Returns the current success count (relevant in half-open).
    pub async fn success_count(&self) -> u32 {
        let guard = self.inner.lock().await;
        guard.success_count
    }

    /// Execute `f` through the circuit breaker.
    ///
    /// If the circuit is **Open** and the timeout has not elapsed the call is
    /// rejected immediately.  If the timeout *has* elapsed the circuit moves
    /// to **HalfOpen** and the call is allowed through.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.call_classified(f, |_: &E| true).await
    }

    /// Execute `f` through the circuit breaker, using `is_failure` to decide
    /// whether an `Err` outcome should count against the breaker.
    ///
    /// Spec §4.4: a "not-found"-style result from the dependency is not a
    /// failure (e.g. a missing key in a key-value store) — pass a classifier
    /// that returns `false` for that case so it passes through as `Err`
    /// without tripping the breaker.
    pub async fn call_classified<F, Fut, T, E>(
        &self,
        f: F,
        is_failure: impl FnOnce(&E) -> bool,
    ) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        // --- pre-flight check ---
        {
            let mut guard = self.inner.lock().await;
            guard.total_requests += 1;
            match guard.state {
                CircuitState::Open => {
                    // Check whether the timeout has elapsed.
                    if let Some(last) = guard.last_failure_time {
                        if last.elapsed() >= self.config.timeout {
                            info!("circuit breaker transitioning Open -> HalfOpen");
                            guard.state = CircuitState::HalfOpen;
                            guard.success_count = 0;
                        } else {
                            guard.total_rejections += 1;
                            return Err(CircuitBreakerError::Open);
                        }
                    } else {
                        guard.total_rejections += 1;
                        return Err(CircuitBreakerError::Open);
                    }
                }
                CircuitState::Closed | CircuitState::HalfOpen => { /* allow */ }
            }
        }

        // --- execute with timeout ---
        let result = tokio::time::timeout(self.config.call_timeout, f()).await;

        match result {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(e)) => {
                if is_failure(&e) {
                    self.record_failure().await;
                } else {
                    self.record_not_failure().await;
                }
                Err(CircuitBreakerError::Inner(e.to_string()))
            }
            Err(_elapsed) => {
                self.record_failure().await;
                Err(CircuitBreakerError::Timeout(self.config.call_timeout))
            }
        }
    }

    /// Run `f` without going through the breaker at all — for rollback/close
    /// operations that must never be rejected by an open circuit (spec
    /// §4.4 "Rollback/close operations must bypass the breaker").
    pub async fn bypass<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        f().await
    }

    async fn record_not_failure(&self) {
        let mut guard = self.inner.lock().await;
        guard.total_successes += 1;
    }

    // ----- helpers -----

    async fn record_success(&self) {
        let mut guard = self.inner.lock().await;
        guard.total_successes += 1;
        match guard.state {
            CircuitState::HalfOpen => {
                guard.success_count += 1;
                if guard.success_count >= self.config.success_threshold {
                    info!("circuit breaker transitioning HalfOpen -> Closed");
                    guard.state = CircuitState::Closed;
                    guard.failure_count = 0;
                    guard.success_count = 0;
                }
            }
            CircuitState::Closed => {
                // Reset failure streak on success.
                guard.failure_count = 0;
            }
            CircuitState::Open => { /* shouldn't happen */ }
        }
    }

    async fn record_failure(&self) {
        let mut guard = self.inner.lock().await;
        guard.total_failures += 1;
        guard.failure_count += 1;
        guard.last_failure_time = Some(Instant::now());

        match guard.state {
            CircuitState::Closed => {
                if guard.failure_count >= self.config.failure_threshold {
                    warn!(
                        failures = guard.failure_count,
                        "circuit breaker transitioning Closed -> Open"
                    );
                    guard.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker transitioning HalfOpen -> Open (failure during probe)");
                guard.state = CircuitState::Open;
                guard.success_count = 0;
            }
            CircuitState::Open => { /* already open */ }
        }
    }

    /// Manually reset the circuit breaker to the **Closed** state.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.state = CircuitState::Closed;
        guard.failure_count = 0;
        guard.success_count = 0;
        guard.last_failure_time = None;
    }
}

// ---------------------------------------------------------------------------
// CircuitBreakerRegistry — one breaker per (component, subsystem)
// ---------------------------------------------------------------------------

/// Addresses an external dependency by the label pair the `circuit_breaker_state`
/// metric carries (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakerKey {
    pub component: String,
    pub subsystem: String,
}

impl BreakerKey {
    pub fn new(component: impl Into<String>, subsystem: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            subsystem: subsystem.into(),
        }
    }
}

/// Lazily creates and hands out one `CircuitBreaker` per `(component,
/// subsystem)` pair, so every dependency call site shares state with every
/// other call site addressing the same dependency.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<BreakerKey, CircuitBreaker>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
        }
    }

    /// Get (creating on first use with the registry's default config) the
    /// breaker for `key`.
    pub fn get(&self, key: BreakerKey) -> CircuitBreaker {
        self.breakers
            .entry(key)
            .or_insert_with(|| CircuitBreaker::new(self.default_config.clone()))
            .clone()
    }

    /// Get or create a breaker for `key` with an explicit config, used when
    /// a dependency needs different thresholds than the registry default.
    pub fn get_with_config(&self, key: BreakerKey, config: CircuitBreakerConfig) -> CircuitBreaker {
        self.breakers
            .entry(key)
            .or_insert_with(|| CircuitBreaker::new(config))
            .clone()
    }
}
