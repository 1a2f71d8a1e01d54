use thiserror::Error;

/// Errors surfaced by the agent. Each variant carries a stable programmatic
/// code via [`AgentError::code`].
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("facilitator error: {0}")]
    Facilitator(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid 402 response")]
    Invalid402Response,

    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("per-request limit exceeded: {0}")]
    PerRequestLimit(String),

    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl AgentError {
    /// Stable identifier for programmatic error handling.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::PaymentFailed(_) => "PAYMENT_FAILED",
            AgentError::Facilitator(_) => "FACILITATOR_ERROR",
            AgentError::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            AgentError::Signing(_) => "SIGNING_FAILED",
            AgentError::Invalid402Response => "INVALID_402_RESPONSE",
            AgentError::BudgetExceeded(_) => "BUDGET_EXCEEDED",
            AgentError::PerRequestLimit(_) => "PER_REQUEST_LIMIT",
            AgentError::DomainNotAllowed(_) => "DOMAIN_NOT_ALLOWED",
            AgentError::Network(_) => "NETWORK_ERROR",
            AgentError::Rpc(_) => "RPC_ERROR",
            AgentError::Timeout(_) => "TIMEOUT",
        }
    }

    /// Whether the facilitator submission may be retried. Only
    /// facilitator-side failures are; transport, payment, and budget
    /// errors surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Facilitator(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AgentError::Invalid402Response.code(), "INVALID_402_RESPONSE");
        assert_eq!(
            AgentError::PerRequestLimit("x".into()).code(),
            "PER_REQUEST_LIMIT"
        );
    }

    #[test]
    fn only_facilitator_class_retries() {
        assert!(AgentError::Facilitator("x".into()).is_retryable());
        assert!(!AgentError::Network("x".into()).is_retryable());
        assert!(!AgentError::Timeout("x".into()).is_retryable());
        assert!(!AgentError::PaymentFailed("x".into()).is_retryable());
        assert!(!AgentError::BudgetExceeded("x".into()).is_retryable());
        assert!(!AgentError::PerRequestLimit("x".into()).is_retryable());
        assert!(!AgentError::DomainNotAllowed("x".into()).is_retryable());
    }
}
