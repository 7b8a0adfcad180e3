//! Ledger boundary
//!
//! Everything the pipeline needs from a Solana cluster sits behind two
//! traits: [`LedgerRpc`] for request/response calls and
//! [`SignatureSubscriber`] for push notifications. The RPC-backed
//! implementations live in [`rpc`] and [`pubsub`]; tests swap in in-memory
//! doubles.

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, transaction::Transaction};
use tokio::sync::mpsc;

use crate::errors::PipelineError;
use crate::types::{Commitment, TransactionId, ValidityAnchor};

pub mod pubsub;
pub mod rpc;

pub use pubsub::PubsubSignatureSubscriber;
pub use rpc::SolanaRpcLedger;

/// Status of one signature as reported by `getSignatureStatuses`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    /// Slot the transaction was processed in
    pub slot: u64,
    /// Highest commitment the transaction has reached
    pub commitment: Commitment,
    /// Execution error, if the transaction failed
    pub err: Option<String>,
}

/// Result of a preflight simulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Execution error, `None` when the simulation succeeded
    pub err: Option<String>,
    /// Program logs emitted during simulation
    pub logs: Vec<String>,
    /// Compute units consumed, when reported
    pub units_consumed: Option<u64>,
}

impl SimulationReport {
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

/// Notification delivered by a signature subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureNotification {
    /// The node has seen the transaction (not yet processed)
    Received,
    /// The transaction reached the subscribed commitment
    Processed { slot: u64, err: Option<String> },
}

/// Request/response calls against the ledger
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// `getLatestBlockhash`
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<ValidityAnchor, PipelineError>;

    /// `getBlockHeight`
    async fn block_height(&self, commitment: Commitment) -> Result<u64, PipelineError>;

    /// `simulateTransaction` with signature verification
    async fn simulate_transaction(
        &self,
        tx: &Transaction,
        commitment: Commitment,
    ) -> Result<SimulationReport, PipelineError>;

    /// `sendTransaction` with node-side preflight disabled
    async fn send_transaction(&self, tx: &Transaction) -> Result<TransactionId, PipelineError>;

    /// `getSignatureStatuses`, one entry per requested id
    async fn signature_statuses(
        &self,
        ids: &[TransactionId],
    ) -> Result<Vec<Option<LedgerStatus>>, PipelineError>;

    /// `requestAirdrop`
    async fn request_airdrop(
        &self,
        recipient: &Pubkey,
        lamports: u64,
    ) -> Result<TransactionId, PipelineError>;
}

/// Push notifications keyed by signature and commitment
#[async_trait]
pub trait SignatureSubscriber: Send + Sync {
    /// Subscribe to status updates for `id` at `commitment`
    ///
    /// Dropping the returned receiver ends the subscription.
    async fn subscribe(
        &self,
        id: TransactionId,
        commitment: Commitment,
    ) -> Result<mpsc::UnboundedReceiver<SignatureNotification>, PipelineError>;
}
