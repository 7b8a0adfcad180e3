//! Funding source
//!
//! Credits an account from the cluster faucet (local validator or devnet)
//! and waits until the airdrop reaches the requested commitment. Airdrops
//! carry no blockhash of ours, so they are tracked without an anchor.

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::confirm::ConfirmationTracker;
use crate::errors::PipelineError;
use crate::ledger::LedgerRpc;
use crate::metrics::metrics;
use crate::types::{Commitment, TransactionId};

/// Faucet-backed funding
#[derive(Clone)]
pub struct FundingSource {
    ledger: Arc<dyn LedgerRpc>,
    tracker: ConfirmationTracker,
}

impl FundingSource {
    pub fn new(ledger: Arc<dyn LedgerRpc>, tracker: ConfirmationTracker) -> Self {
        Self { ledger, tracker }
    }

    /// Airdrop `lamports` to `recipient` and wait for `commitment`
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Configuration`] for a zero amount; nothing is requested
    /// - [`PipelineError::FundingUnavailable`] when the faucet refuses
    /// - [`PipelineError::ConfirmationTimeout`] when the airdrop does not
    ///   reach `commitment` within `timeout`
    pub async fn request_funding(
        &self,
        recipient: &Pubkey,
        lamports: u64,
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<TransactionId, PipelineError> {
        if lamports == 0 {
            return Err(PipelineError::Configuration(
                "airdrop amount must be greater than zero".to_string(),
            ));
        }

        let deadline = Instant::now() + timeout;
        let id = match self.ledger.request_airdrop(recipient, lamports).await {
            Ok(id) => id,
            Err(PipelineError::FundingUnavailable(reason)) => {
                warn!(%recipient, lamports, %reason, "Faucet refused airdrop");
                return Err(PipelineError::FundingUnavailable(reason));
            }
            Err(e) => return Err(e),
        };
        metrics().airdrops_total.inc();
        info!(%recipient, lamports, signature = %id, "Airdrop requested");

        self.tracker.track(id, None, commitment, deadline).await?;
        info!(%recipient, signature = %id, %commitment, "Airdrop confirmed");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;

    fn funding(ledger: &Arc<MockLedger>) -> FundingSource {
        let tracker = ConfirmationTracker::new(ledger.clone(), None, Duration::from_millis(5));
        FundingSource::new(ledger.clone(), tracker)
    }

    #[tokio::test]
    async fn test_airdrop_confirms() {
        let ledger = Arc::new(MockLedger::new());
        let recipient = Pubkey::new_unique();

        funding(&ledger)
            .request_funding(&recipient, 1_000_000_000, Commitment::Confirmed, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(ledger.airdrops(), 1);
    }

    #[tokio::test]
    async fn test_zero_amount_makes_no_request() {
        let ledger = Arc::new(MockLedger::new());

        let err = funding(&ledger)
            .request_funding(&Pubkey::new_unique(), 0, Commitment::Confirmed, Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(ledger.rpc_calls(), 0);
    }

    #[tokio::test]
    async fn test_faucet_refusal_surfaces() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_airdrops("airdrop request limit reached");

        let err = funding(&ledger)
            .request_funding(&Pubkey::new_unique(), 5, Commitment::Confirmed, Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PipelineError::FundingUnavailable("airdrop request limit reached".to_string())
        );
    }
}
