//! Error types for the submission pipeline
//!
//! One taxonomy covers the whole lifecycle, from funding through
//! confirmation. Each variant knows whether the orchestrator may retry it and
//! which metrics category it belongs to. Ledger-supplied diagnostics (program
//! logs, rejection reasons) are carried verbatim so callers can report them.

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::types::TransactionId;

/// Comprehensive error type for all pipeline operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The faucet refused the airdrop (rate limit, disabled faucet, ...)
    #[error("Funding unavailable: {0}")]
    FundingUnavailable(String),

    /// A message was built with no instructions
    #[error("Transaction message has no instructions")]
    EmptyInstructionSet,

    /// A required signer has no matching key holder
    #[error("Missing signer for required account {0}")]
    MissingSigner(Pubkey),

    /// Preflight simulation failed, the transaction was not forwarded
    #[error("Simulation failed: {reason}")]
    SimulationFailed {
        /// Ledger error returned by the simulation
        reason: String,
        /// Program logs captured during simulation
        logs: Vec<String>,
    },

    /// The validity window passed before the transaction was processed
    ///
    /// Retrying the same signed bytes can never succeed; the message has to
    /// be rebuilt against a fresh blockhash.
    #[error("Blockhash expired (last valid height {last_valid_block_height}, observed {observed_block_height})")]
    AnchorExpired {
        /// Transaction stamped with the stale blockhash, if it was signed
        signature: Option<TransactionId>,
        last_valid_block_height: u64,
        observed_block_height: u64,
    },

    /// The requested commitment was not reached in time
    #[error("Confirmation timed out after {elapsed_ms}ms (signature: {signature:?})")]
    ConfirmationTimeout {
        signature: Option<TransactionId>,
        elapsed_ms: u64,
    },

    /// The ledger executed or validated the transaction and refused it
    #[error("Ledger rejected transaction {signature}: {reason}")]
    LedgerRejected {
        signature: TransactionId,
        reason: String,
    },

    /// Transport-level RPC failure
    #[error("RPC error: {message} (code: {code:?})")]
    Rpc { message: String, code: Option<i64> },

    /// Push subscription could not be established
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Another tracker already owns this signature
    #[error("Transaction {0} is already being tracked")]
    AlreadyTracked(TransactionId),

    /// Invalid configuration or caller input
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Check if retrying within the overall deadline might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AnchorExpired { .. } => true,
            Self::ConfirmationTimeout { .. } => true,
            Self::Rpc { code, .. } => match code {
                // JSON-RPC server errors and rate limits are transient
                Some(c) => *c == 429 || (*c >= 500 && *c < 600) || *c == -32005,
                None => true,
            },

            Self::FundingUnavailable(_) => false,
            Self::EmptyInstructionSet => false,
            Self::MissingSigner(_) => false,
            Self::SimulationFailed { .. } => false,
            Self::LedgerRejected { .. } => false,
            Self::Subscription(_) => false,
            Self::AlreadyTracked(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Whether recovery requires a fresh blockhash rather than a rebroadcast
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, Self::AnchorExpired { .. })
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::FundingUnavailable(_) => "funding",
            Self::EmptyInstructionSet => "build",
            Self::MissingSigner(_) => "signing",
            Self::SimulationFailed { .. } => "simulation",
            Self::AnchorExpired { .. } => "expired",
            Self::ConfirmationTimeout { .. } => "timeout",
            Self::LedgerRejected { .. } => "rejected",
            Self::Rpc { .. } => "rpc",
            Self::Subscription(_) => "subscription",
            Self::AlreadyTracked(_) => "tracking",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Program logs attached to the failure, if any
    pub fn logs(&self) -> &[String] {
        match self {
            Self::SimulationFailed { logs, .. } => logs,
            _ => &[],
        }
    }

    /// Classify a client error by its message
    pub fn from_client_error(err: ClientError) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();

        if lowered.contains("blockhash not found") || lowered.contains("block height exceeded") {
            PipelineError::AnchorExpired {
                signature: None,
                last_valid_block_height: 0,
                observed_block_height: 0,
            }
        } else if lowered.contains("rate limit")
            || lowered.contains("too many requests")
            || lowered.contains("429")
        {
            PipelineError::Rpc {
                message,
                code: Some(429),
            }
        } else {
            let code = match err.kind() {
                ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) => Some(*code),
                _ => None,
            };
            PipelineError::Rpc { message, code }
        }
    }
}

impl From<ClientError> for PipelineError {
    fn from(err: ClientError) -> Self {
        Self::from_client_error(err)
    }
}

// Convenience constructors
impl PipelineError {
    pub fn simulation_failed(reason: impl Into<String>, logs: Vec<String>) -> Self {
        Self::SimulationFailed {
            reason: reason.into(),
            logs,
        }
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            message: message.into(),
            code: None,
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signature;

    #[test]
    fn test_error_display() {
        let err = PipelineError::simulation_failed(
            "InstructionError(0, Custom(6000))",
            vec!["Program log: boom".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Simulation failed: InstructionError(0, Custom(6000))"
        );
        assert_eq!(err.logs(), ["Program log: boom".to_string()]);

        let err = PipelineError::EmptyInstructionSet;
        assert_eq!(err.to_string(), "Transaction message has no instructions");
    }

    #[test]
    fn test_error_retryability() {
        assert!(PipelineError::AnchorExpired {
            signature: None,
            last_valid_block_height: 10,
            observed_block_height: 11,
        }
        .is_retryable());
        assert!(PipelineError::ConfirmationTimeout {
            signature: None,
            elapsed_ms: 30_000,
        }
        .is_retryable());
        assert!(PipelineError::rpc("connection reset").is_retryable());

        let id = TransactionId::new(Signature::default());
        assert!(!PipelineError::LedgerRejected {
            signature: id,
            reason: "InsufficientFundsForFee".to_string(),
        }
        .is_retryable());
        assert!(!PipelineError::simulation_failed("x", vec![]).is_retryable());
        assert!(!PipelineError::EmptyInstructionSet.is_retryable());
        assert!(!PipelineError::MissingSigner(Pubkey::new_unique()).is_retryable());
        assert!(!PipelineError::FundingUnavailable("rate limited".to_string()).is_retryable());
    }

    #[test]
    fn test_rpc_code_retryability() {
        let server = PipelineError::Rpc {
            message: "bad gateway".to_string(),
            code: Some(502),
        };
        assert!(server.is_retryable());

        let invalid = PipelineError::Rpc {
            message: "invalid params".to_string(),
            code: Some(-32602),
        };
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn test_only_expiry_requires_rebuild() {
        assert!(PipelineError::AnchorExpired {
            signature: None,
            last_valid_block_height: 1,
            observed_block_height: 2,
        }
        .requires_rebuild());
        assert!(!PipelineError::ConfirmationTimeout {
            signature: None,
            elapsed_ms: 1,
        }
        .requires_rebuild());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(PipelineError::EmptyInstructionSet.category(), "build");
        assert_eq!(
            PipelineError::simulation_failed("x", vec![]).category(),
            "simulation"
        );
        assert_eq!(PipelineError::internal("x").category(), "internal");
    }
}
