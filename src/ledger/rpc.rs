//! JSON-RPC ledger implementation backed by the nonblocking `RpcClient`

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::Transaction};
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{LedgerRpc, LedgerStatus, SimulationReport};
use crate::errors::PipelineError;
use crate::metrics::{metrics, Timer};
use crate::types::{Commitment, TransactionId, ValidityAnchor};

/// Ledger access over HTTP JSON-RPC
#[derive(Clone)]
pub struct SolanaRpcLedger {
    client: Arc<RpcClient>,
}

impl std::fmt::Debug for SolanaRpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpcLedger")
            .field("url", &self.client.url())
            .finish()
    }
}

impl SolanaRpcLedger {
    /// Create a ledger client for `url`
    pub fn new(url: impl Into<String>, timeout: Duration, commitment: Commitment) -> Self {
        let client = RpcClient::new_with_timeout_and_commitment(
            url.into(),
            timeout,
            commitment.to_config(),
        );
        Self {
            client: Arc::new(client),
        }
    }

    /// Wrap an existing client
    pub fn from_client(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }
}

fn status_commitment(
    confirmation_status: Option<&TransactionConfirmationStatus>,
    confirmations: Option<usize>,
) -> Commitment {
    match confirmation_status {
        Some(TransactionConfirmationStatus::Processed) => Commitment::Processed,
        Some(TransactionConfirmationStatus::Confirmed) => Commitment::Confirmed,
        Some(TransactionConfirmationStatus::Finalized) => Commitment::Finalized,
        // Nodes that omit the status report rooted slots as `confirmations: null`
        None if confirmations.is_none() => Commitment::Finalized,
        None => Commitment::Confirmed,
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpcLedger {
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<ValidityAnchor, PipelineError> {
        let timer = Timer::start(&metrics().rpc_latency);
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(commitment.to_config())
            .await?;
        timer.finish();
        debug!(%blockhash, last_valid_block_height, %commitment, "Fetched latest blockhash");
        Ok(ValidityAnchor::new(blockhash, last_valid_block_height))
    }

    async fn block_height(&self, commitment: Commitment) -> Result<u64, PipelineError> {
        let height = self
            .client
            .get_block_height_with_commitment(commitment.to_config())
            .await?;
        Ok(height)
    }

    async fn simulate_transaction(
        &self,
        tx: &Transaction,
        commitment: Commitment,
    ) -> Result<SimulationReport, PipelineError> {
        let timer = Timer::start(&metrics().rpc_latency);
        let response = self
            .client
            .simulate_transaction_with_config(
                tx,
                RpcSimulateTransactionConfig {
                    sig_verify: true,
                    commitment: Some(commitment.to_config()),
                    encoding: Some(UiTransactionEncoding::Base64),
                    ..RpcSimulateTransactionConfig::default()
                },
            )
            .await?;
        timer.finish();

        let result = response.value;
        Ok(SimulationReport {
            err: result.err.map(|e| format!("{:?}", e)),
            logs: result.logs.unwrap_or_default(),
            units_consumed: result.units_consumed,
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<TransactionId, PipelineError> {
        let timer = Timer::start(&metrics().rpc_latency);
        let signature = self
            .client
            .send_transaction_with_config(
                tx,
                RpcSendTransactionConfig {
                    skip_preflight: true,
                    encoding: Some(UiTransactionEncoding::Base64),
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await?;
        timer.finish();
        Ok(TransactionId::new(signature))
    }

    async fn signature_statuses(
        &self,
        ids: &[TransactionId],
    ) -> Result<Vec<Option<LedgerStatus>>, PipelineError> {
        let signatures: Vec<Signature> = ids.iter().map(|id| *id.signature()).collect();
        let response = self.client.get_signature_statuses(&signatures).await?;

        Ok(response
            .value
            .into_iter()
            .map(|status| {
                status.map(|status| LedgerStatus {
                    slot: status.slot,
                    commitment: status_commitment(
                        status.confirmation_status.as_ref(),
                        status.confirmations,
                    ),
                    err: status.err.map(|e| format!("{:?}", e)),
                })
            })
            .collect())
    }

    async fn request_airdrop(
        &self,
        recipient: &Pubkey,
        lamports: u64,
    ) -> Result<TransactionId, PipelineError> {
        let signature = self
            .client
            .request_airdrop(recipient, lamports)
            .await
            .map_err(|e| PipelineError::FundingUnavailable(e.to_string()))?;
        Ok(TransactionId::new(signature))
    }
}
