//! Submission channel
//!
//! Forwards signed transactions to the ledger's ingress. With preflight
//! enabled the transaction is simulated first and a failing simulation stops
//! it before any fee is spent. The ledger's own preflight is always disabled
//! on forward, since the check already ran here (or was skipped on purpose).

use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::ledger::LedgerRpc;
use crate::metrics::metrics;
use crate::tx_builder::SignedTx;
use crate::types::{SubmitOptions, TransactionId};

/// Stateless forwarder for signed transactions
#[derive(Clone)]
pub struct SubmissionChannel {
    ledger: Arc<dyn LedgerRpc>,
}

impl SubmissionChannel {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    /// Submit `tx`, optionally after a preflight simulation
    ///
    /// Resubmitting identical bytes returns the same id and is not a new
    /// logical action.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::SimulationFailed`] with the program logs when the
    ///   preflight fails; nothing is forwarded
    /// - [`PipelineError::AnchorExpired`] when the simulation no longer
    ///   recognises the blockhash
    /// - [`PipelineError::Internal`] when the ledger echoes a different id
    ///
    /// A simulation answering `AlreadyProcessed` means these bytes are on the
    /// ledger already: the id is returned and nothing is forwarded.
    pub async fn submit(
        &self,
        tx: &SignedTx,
        options: SubmitOptions,
    ) -> Result<TransactionId, PipelineError> {
        let expected = tx.id();

        if !options.skip_preflight {
            let report = self
                .ledger
                .simulate_transaction(tx.transaction(), options.preflight_commitment)
                .await?;

            if let Some(err) = report.err {
                if err.contains("AlreadyProcessed") {
                    debug!(signature = %expected, "Already processed, not forwarding");
                    return Ok(expected);
                }
                if err.contains("BlockhashNotFound") {
                    let anchor = tx.message().anchor();
                    return Err(PipelineError::AnchorExpired {
                        signature: Some(expected),
                        last_valid_block_height: anchor.last_valid_block_height,
                        observed_block_height: anchor.last_valid_block_height,
                    });
                }
                warn!(
                    signature = %expected,
                    error = %err,
                    log_lines = report.logs.len(),
                    "Preflight simulation failed"
                );
                metrics().simulation_failures.inc();
                return Err(PipelineError::SimulationFailed {
                    reason: err,
                    logs: report.logs,
                });
            }
            debug!(
                signature = %expected,
                units_consumed = ?report.units_consumed,
                "Preflight simulation passed"
            );
        }

        let id = self.ledger.send_transaction(tx.transaction()).await?;
        if id != expected {
            return Err(PipelineError::internal(format!(
                "ledger returned signature {} for transaction {}",
                id, expected
            )));
        }

        metrics().submissions_total.inc();
        debug!(signature = %id, "Transaction forwarded");
        Ok(id)
    }
}
