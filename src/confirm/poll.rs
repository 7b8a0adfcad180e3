//! Poll observation path

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::{Observation, ObservationPath};
use crate::errors::PipelineError;
use crate::ledger::LedgerRpc;
use crate::types::{Commitment, ConfirmationState, TransactionId, ValidityAnchor};

pub(super) struct PollPath {
    pub ledger: Arc<dyn LedgerRpc>,
    pub id: TransactionId,
    pub anchor: Option<ValidityAnchor>,
    pub commitment: Commitment,
    pub interval: Duration,
}

impl PollPath {
    /// Poll until a terminal state is reported or the receiver goes away
    ///
    /// Observations are folded through [`ConfirmationState::advance`], so only
    /// transitions the tracker accepts are reported. The one exception is an
    /// expiry after `Processed`: the transaction was dropped with its fork and
    /// the tracker turns that into a rebuild.
    ///
    /// RPC failures are transient here; the next tick retries.
    pub(super) async fn run(self, tx: mpsc::UnboundedSender<Observation>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reported = ConfirmationState::Pending;

        loop {
            ticker.tick().await;

            let observation = match self.observe().await {
                Ok(Some(observation)) => observation,
                Ok(None) => continue,
                Err(e) => {
                    debug!(signature = %self.id, error = %e, "Status poll failed");
                    continue;
                }
            };

            let dropped = reported == ConfirmationState::Processed
                && observation.state == ConfirmationState::Expired;
            let folded = reported.clone().advance(observation.state.clone());
            if folded == reported && !dropped {
                continue;
            }
            if !dropped {
                reported = folded;
            }
            let last = dropped || reported.is_terminal();

            trace!(signature = %self.id, state = %observation.state, "Poll observed state");
            let state = if dropped {
                ConfirmationState::Expired
            } else {
                reported.clone()
            };
            let observation = Observation { state, ..observation };
            if tx.send(observation).is_err() || last {
                return;
            }
        }
    }

    async fn observe(&self) -> Result<Option<Observation>, PipelineError> {
        if let Some(state) = self.status().await? {
            return Ok(Some(self.observation(state, None)));
        }

        let Some(anchor) = self.anchor else {
            return Ok(None);
        };
        let height = self.ledger.block_height(self.commitment).await?;
        if !anchor.is_expired_at(height) {
            return Ok(None);
        }

        // It may have landed between the two reads
        if let Some(state) = self.status().await? {
            return Ok(Some(self.observation(state, None)));
        }
        Ok(Some(self.observation(ConfirmationState::Expired, Some(height))))
    }

    async fn status(&self) -> Result<Option<ConfirmationState>, PipelineError> {
        super::ledger_state(self.ledger.as_ref(), self.id).await
    }

    fn observation(&self, state: ConfirmationState, block_height: Option<u64>) -> Observation {
        Observation {
            path: ObservationPath::Poll,
            state,
            block_height,
        }
    }
}
