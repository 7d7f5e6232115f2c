//! Error types for the submission flow
//!
//! One taxonomy covers the whole lifecycle: pre-build validation, fee
//! estimation, and ledger submission. Signer abstention is deliberately
//! absent — declining to sign is not an error anywhere in this crate.

use thiserror::Error;

use crate::client::ClientError;

/// Errors a submission attempt can terminate with
#[derive(Debug, Error)]
pub enum FlowError {
    /// Rejected before any build was attempted (bad destination,
    /// non-positive amount, over-limit transfer)
    #[error("validation failed: {0}")]
    Validation(String),

    /// The remote fee estimator was unreachable or rejected the intent
    #[error("fee estimation failed: {0}")]
    FeeEstimation(String),

    /// The ledger rejected the signed payload
    #[error("submission rejected: {0}")]
    Submission(String),

    /// Transport-level RPC failure outside estimation/submission
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Internal invariant violation; indicates a bug
    #[error("internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Whether re-running the full flow might succeed
    ///
    /// Retry is always a deliberate user action; this only controls
    /// whether the retry affordance is offered.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::FeeEstimation(_) => true,
            Self::Submission(_) => true,
            Self::Rpc(_) => true,
            Self::Validation(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::FeeEstimation(_) => "estimation",
            Self::Submission(_) => "submission",
            Self::Rpc(_) => "rpc",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<ClientError> for FlowError {
    fn from(err: ClientError) -> Self {
        Self::Rpc(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlowError::FeeEstimation("endpoint unreachable".to_string());
        assert_eq!(err.to_string(), "fee estimation failed: endpoint unreachable");

        let err = FlowError::Validation("amount exceeds maximum".to_string());
        assert_eq!(err.to_string(), "validation failed: amount exceeds maximum");
    }

    #[test]
    fn test_retryability() {
        assert!(FlowError::FeeEstimation("x".into()).is_retryable());
        assert!(FlowError::Submission("x".into()).is_retryable());
        assert!(FlowError::Rpc("x".into()).is_retryable());

        assert!(!FlowError::Validation("x".into()).is_retryable());
        assert!(!FlowError::Internal("x".into()).is_retryable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(FlowError::Validation("x".into()).category(), "validation");
        assert_eq!(FlowError::FeeEstimation("x".into()).category(), "estimation");
        assert_eq!(FlowError::Submission("x".into()).category(), "submission");
    }
}
