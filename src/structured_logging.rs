//! Structured logging and pipeline context

use std::time::Duration;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::types::{Commitment, ConfirmationState, TransactionId, ValidityAnchor};

/// Structured logger for one `send_and_confirm` call
///
/// Every event carries the same `context_id`, so rebuilds and rebroadcasts of
/// one logical action can be followed across signatures.
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    context_id: String,
}

impl PipelineLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_attempt(&self, attempt: u32, signature: &TransactionId, anchor: &ValidityAnchor) {
        tracing::info!(
            context_id = %self.context_id,
            attempt = %attempt,
            signature = %signature,
            blockhash = %anchor.blockhash,
            last_valid_block_height = %anchor.last_valid_block_height,
            "Submitting transaction"
        );
    }

    pub fn log_rebuild(&self, previous: Option<&TransactionId>, anchor: &ValidityAnchor) {
        tracing::info!(
            context_id = %self.context_id,
            previous = ?previous.map(ToString::to_string),
            blockhash = %anchor.blockhash,
            last_valid_block_height = %anchor.last_valid_block_height,
            "Rebuilding against fresh blockhash"
        );
    }

    pub fn log_rebroadcast(&self, signature: &TransactionId, reason: &PipelineError) {
        tracing::debug!(
            context_id = %self.context_id,
            signature = %signature,
            reason = %reason,
            "Rebroadcasting transaction"
        );
    }

    pub fn log_confirmed(
        &self,
        signature: &TransactionId,
        state: &ConfirmationState,
        commitment: Commitment,
        latency: Duration,
    ) {
        tracing::info!(
            context_id = %self.context_id,
            signature = %signature,
            state = %state,
            commitment = %commitment,
            latency_ms = %latency.as_millis(),
            "Transaction confirmed"
        );
    }

    pub fn log_failure(&self, error: &PipelineError, latency: Duration) {
        tracing::warn!(
            context_id = %self.context_id,
            category = %error.category(),
            error = %error,
            latency_ms = %latency.as_millis(),
            "Transaction failed"
        );
    }
}

/// Correlation context for one logical action
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Unique request ID
    pub request_id: String,

    /// Operation name
    pub operation: String,

    pub logger: PipelineLogger,
}

impl PipelineContext {
    pub fn new(operation: &str) -> Self {
        let request_id = Uuid::new_v4().to_string();
        Self {
            request_id: request_id.clone(),
            operation: operation.to_string(),
            logger: PipelineLogger::new(request_id),
        }
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new("send_and_confirm")
    }
}
