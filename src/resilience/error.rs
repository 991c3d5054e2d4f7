//! Failure kinds produced by the resilience layer.

use thiserror::Error;

/// Result of a call made under a resilience policy.
pub type CallResult<T> = Result<T, CallError>;

/// Errors that can occur while calling a dependency.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    /// Malformed input. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The policy name was never registered.
    #[error("no resilience policy registered under '{0}'")]
    NotConfigured(String),

    /// Breaker is open; the operation was not invoked.
    #[error("circuit breaker '{policy}' is open")]
    CircuitOpen { policy: String },

    /// Concurrency limit reached and no permit freed in time.
    #[error("bulkhead '{policy}' is full")]
    BulkheadFull { policy: String },

    /// No rate-limit permit available within the wait budget.
    #[error("rate limit for '{policy}' exceeded")]
    RateLimited { policy: String },

    /// Timeout or transport failure. Retried per policy.
    #[error("transient dependency failure: {0}")]
    Transient(String),

    /// The dependency reported a definitive failure. Not retried.
    #[error(
        "dependency rejected the call{}: {}",
        .status.map(|s| format!(" with status {}", s)).unwrap_or_default(),
        .message
    )]
    Terminal {
        status: Option<u16>,
        message: String,
    },

    /// The caller-supplied deadline expired before the call completed.
    #[error("deadline exceeded for '{policy}'")]
    DeadlineExceeded { policy: String },
}

impl CallError {
    pub fn transient(reason: impl std::fmt::Display) -> Self {
        CallError::Transient(reason.to_string())
    }

    pub fn terminal(status: Option<u16>, message: impl Into<String>) -> Self {
        CallError::Terminal {
            status,
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }

    /// Rejected before the wrapped operation ran.
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            CallError::CircuitOpen { .. }
                | CallError::BulkheadFull { .. }
                | CallError::RateLimited { .. }
        )
    }

    /// Whether a cached degraded result may stand in for this failure.
    ///
    /// Definitive negatives and misconfiguration never fall back.
    pub fn allows_fallback(&self) -> bool {
        self.is_admission_rejection()
            || matches!(
                self,
                CallError::Transient(_) | CallError::DeadlineExceeded { .. }
            )
    }

    /// Whether the failure counts against the dependency's health.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            CallError::Transient(_) | CallError::DeadlineExceeded { .. }
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Validation(_) => "validation",
            CallError::NotConfigured(_) => "not_configured",
            CallError::CircuitOpen { .. } => "circuit_open",
            CallError::BulkheadFull { .. } => "bulkhead_full",
            CallError::RateLimited { .. } => "rate_limited",
            CallError::Transient(_) => "transient",
            CallError::Terminal { .. } => "terminal",
            CallError::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CallError::terminal(None, format!("undecodable response: {}", e))
        } else if e.is_builder() {
            CallError::Validation(e.to_string())
        } else if let Some(status) = e.status() {
            classify_status(status.as_u16(), e.to_string())
        } else {
            // Connect failures, timeouts and broken bodies.
            CallError::transient(e)
        }
    }
}

impl From<std::io::Error> for CallError {
    fn from(e: std::io::Error) -> Self {
        CallError::transient(e)
    }
}

/// Map a non-success HTTP status onto the taxonomy.
///
/// 408, 429 and 5xx are worth retrying; every other 4xx is definitive.
pub fn classify_status(status: u16, message: impl Into<String>) -> CallError {
    match status {
        408 | 429 | 500..=599 => CallError::Transient(format!("status {}: {}", status, message.into())),
        _ => CallError::terminal(Some(status), message),
    }
}
