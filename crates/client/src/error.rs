//! Facade error taxonomy.

use thiserror::Error;

/// The external system a call is addressed to.
///
/// Breaker state is tracked per target so an ERP outage never blocks calls
/// to the context store, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Erp,
    ContextStore,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Erp => "erp",
            Target::ContextStore => "context-store",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors surfaced by the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level or 5xx failure; retried until the budget is exhausted.
    #[error("transient {target} failure: {message}")]
    Transient { target: Target, message: String },

    /// The target's circuit breaker is open; the call was not issued.
    #[error("circuit open for {target}")]
    CircuitOpen { target: Target },

    /// 4xx-class or validation failure; never retried.
    #[error("permanent {target} failure: {message}")]
    Permanent { target: Target, message: String },
}

impl ClientError {
    pub fn transient(target: Target, message: impl Into<String>) -> Self {
        ClientError::Transient {
            target,
            message: message.into(),
        }
    }

    pub fn permanent(target: Target, message: impl Into<String>) -> Self {
        ClientError::Permanent {
            target,
            message: message.into(),
        }
    }

    /// Returns true if retrying this call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ClientError::CircuitOpen { .. })
    }
}
