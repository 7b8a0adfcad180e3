//! Blockhash window provider
//!
//! Fetches the validity anchor a message is stamped with and checks whether
//! an anchor has gone stale. Anchors are read fresh for every submission and
//! never cached; the last valid block height reported by the node is only a
//! promise, so staleness is always checked against the ledger's height.

use std::sync::Arc;
use tracing::debug;

use crate::errors::PipelineError;
use crate::ledger::LedgerRpc;
use crate::types::{Commitment, ValidityAnchor};

/// Stateless source of validity anchors
#[derive(Clone)]
pub struct BlockhashWindow {
    ledger: Arc<dyn LedgerRpc>,
}

impl BlockhashWindow {
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    /// Fetch the current blockhash and its last valid block height
    pub async fn fetch_anchor(&self, commitment: Commitment) -> Result<ValidityAnchor, PipelineError> {
        self.ledger.latest_blockhash(commitment).await
    }

    /// Current block height observed at `commitment`
    pub async fn block_height(&self, commitment: Commitment) -> Result<u64, PipelineError> {
        self.ledger.block_height(commitment).await
    }

    /// Check `anchor` against the ledger's current block height
    ///
    /// Returns the observed height when the anchor has expired.
    pub async fn check_stale(
        &self,
        anchor: &ValidityAnchor,
        commitment: Commitment,
    ) -> Result<Option<u64>, PipelineError> {
        let height = self.ledger.block_height(commitment).await?;
        if anchor.is_expired_at(height) {
            debug!(
                blockhash = %anchor.blockhash,
                last_valid_block_height = anchor.last_valid_block_height,
                observed_block_height = height,
                "Validity anchor is stale"
            );
            Ok(Some(height))
        } else {
            Ok(None)
        }
    }

    /// Whether `anchor` has expired
    pub async fn is_stale(
        &self,
        anchor: &ValidityAnchor,
        commitment: Commitment,
    ) -> Result<bool, PipelineError> {
        Ok(self.check_stale(anchor, commitment).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;

    #[tokio::test]
    async fn test_fetch_anchor_is_fresh_each_call() {
        let ledger = Arc::new(MockLedger::new());
        let window = BlockhashWindow::new(ledger.clone());

        let first = window.fetch_anchor(Commitment::Confirmed).await.unwrap();
        let second = window.fetch_anchor(Commitment::Confirmed).await.unwrap();

        assert_ne!(first.blockhash, second.blockhash);
        assert_eq!(ledger.blockhash_requests(), 2);
    }

    #[tokio::test]
    async fn test_staleness_follows_ledger_height() {
        let ledger = Arc::new(MockLedger::new());
        let window = BlockhashWindow::new(ledger.clone());

        let anchor = window.fetch_anchor(Commitment::Confirmed).await.unwrap();
        assert!(!window.is_stale(&anchor, Commitment::Confirmed).await.unwrap());

        ledger.set_block_height(anchor.last_valid_block_height + 1);
        assert_eq!(
            window.check_stale(&anchor, Commitment::Confirmed).await.unwrap(),
            Some(anchor.last_valid_block_height + 1)
        );
    }
}
