//! Confirmation tracker
//!
//! Decides when a submitted transaction has reached the requested
//! commitment, or that it never will.
//!
//! ## Observation paths
//!
//! Two independent tasks watch the same signature:
//! - **subscription**: a `signatureSubscribe` push notification at the target
//!   commitment
//! - **poll**: periodic `getSignatureStatuses`, plus a block height check
//!   against the validity anchor while the signature is still unseen
//!
//! Push channels can silently drop or lag, so neither path is trusted alone.
//! Both send [`Observation`]s into one channel; the tracker folds them into a
//! [`ConfirmationState`] and returns on the first decisive one. Both tasks are
//! aborted when `track` returns or is cancelled.
//!
//! ## Outcomes
//! - requested commitment reached: `Ok(state)`
//! - `Expired`: [`PipelineError::AnchorExpired`], the message must be rebuilt
//! - seen `Processed`, then unknown past the anchor's window (its fork was
//!   abandoned): also [`PipelineError::AnchorExpired`]; the state itself stays
//!   `Processed`
//! - `Rejected`: [`PipelineError::LedgerRejected`] with the ledger's reason
//! - deadline: [`PipelineError::ConfirmationTimeout`]

use dashmap::DashSet;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::PipelineError;
use crate::ledger::{LedgerRpc, SignatureSubscriber};
use crate::metrics::metrics;
use crate::types::{Commitment, ConfirmationState, TransactionId, ValidityAnchor};

mod poll;
mod subscription;

/// Signatures tracked anywhere in this process
static IN_FLIGHT: Lazy<Arc<DashSet<TransactionId>>> = Lazy::new(|| Arc::new(DashSet::new()));

/// Which path produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationPath {
    Subscription,
    Poll,
}

/// One status report from an observation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub path: ObservationPath,
    pub state: ConfirmationState,
    /// Block height that proved expiry, for `Expired` observations
    pub block_height: Option<u64>,
}

/// Spawned observation tasks, aborted on drop
#[derive(Default)]
struct ObservationPaths {
    handles: Vec<JoinHandle<()>>,
}

impl ObservationPaths {
    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }
}

impl Drop for ObservationPaths {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Exclusive claim on a signature, released on drop
struct Registration {
    id: TransactionId,
    registry: Arc<DashSet<TransactionId>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        metrics().active_trackers.dec();
    }
}

/// Tracks submitted transactions to a terminal outcome
#[derive(Clone)]
pub struct ConfirmationTracker {
    ledger: Arc<dyn LedgerRpc>,
    subscriber: Option<Arc<dyn SignatureSubscriber>>,
    poll_interval: Duration,
    registry: Arc<DashSet<TransactionId>>,
}

impl ConfirmationTracker {
    /// Create a tracker; without a subscriber only the poll path runs
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        subscriber: Option<Arc<dyn SignatureSubscriber>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            subscriber,
            poll_interval,
            registry: Arc::clone(&IN_FLIGHT),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether `id` is currently being tracked
    pub fn is_tracking(&self, id: &TransactionId) -> bool {
        self.registry.contains(id)
    }

    /// Current ledger state of `id`, `None` while the ledger does not know it
    pub async fn lookup(&self, id: TransactionId) -> Result<Option<ConfirmationState>, PipelineError> {
        ledger_state(self.ledger.as_ref(), id).await
    }

    fn register(&self, id: TransactionId) -> Result<Registration, PipelineError> {
        if !self.registry.insert(id) {
            return Err(PipelineError::AlreadyTracked(id));
        }
        metrics().active_trackers.inc();
        Ok(Registration {
            id,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Wait until `id` reaches `commitment`, expires, is rejected, or
    /// `deadline` passes
    ///
    /// Without an `anchor` (faucet airdrops) no expiry check is made.
    pub async fn track(
        &self,
        id: TransactionId,
        anchor: Option<ValidityAnchor>,
        commitment: Commitment,
        deadline: Instant,
    ) -> Result<ConfirmationState, PipelineError> {
        let _registration = self.register(id)?;
        let started = Instant::now();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut paths = ObservationPaths::default();

        paths.push(tokio::spawn(
            poll::PollPath {
                ledger: Arc::clone(&self.ledger),
                id,
                anchor,
                commitment,
                interval: self.poll_interval,
            }
            .run(tx.clone()),
        ));
        if let Some(subscriber) = &self.subscriber {
            paths.push(tokio::spawn(subscription::run(
                Arc::clone(subscriber),
                id,
                commitment,
                tx.clone(),
            )));
        }
        drop(tx);

        let mut state = ConfirmationState::Pending;
        loop {
            let observation = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(observation)) => observation,
                Ok(None) => {
                    return Err(PipelineError::internal(format!(
                        "all observation paths for {} closed in state {}",
                        id, state
                    )));
                }
                Err(_) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    metrics().timeouts_total.inc();
                    warn!(signature = %id, %state, elapsed_ms, "Confirmation deadline reached");
                    return Err(PipelineError::ConfirmationTimeout {
                        signature: Some(id),
                        elapsed_ms,
                    });
                }
            };

            if observation.state == ConfirmationState::Expired
                && state == ConfirmationState::Processed
            {
                warn!(signature = %id, "Processed transaction dropped and its blockhash expired");
                return Err(expired(id, anchor, observation.block_height));
            }

            let previous = state.clone();
            state = state.advance(observation.state);
            if state != previous {
                debug!(
                    signature = %id,
                    path = ?observation.path,
                    from = %previous,
                    to = %state,
                    "Confirmation state advanced"
                );
            }

            match &state {
                ConfirmationState::Expired => {
                    info!(
                        signature = %id,
                        observed_block_height = ?observation.block_height,
                        "Blockhash expired before processing"
                    );
                    return Err(expired(id, anchor, observation.block_height));
                }
                ConfirmationState::Rejected(reason) => {
                    metrics().rejections_total.inc();
                    warn!(signature = %id, reason = %reason, "Ledger rejected transaction");
                    return Err(PipelineError::LedgerRejected {
                        signature: id,
                        reason: reason.clone(),
                    });
                }
                reached if reached.satisfies(commitment) => {
                    metrics().confirmations_total.inc();
                    metrics()
                        .confirmation_latency
                        .observe(started.elapsed().as_secs_f64());
                    return Ok(state.clone());
                }
                _ => {}
            }
        }
    }
}

/// Status of `id` as the ledger reports it
async fn ledger_state(
    ledger: &dyn LedgerRpc,
    id: TransactionId,
) -> Result<Option<ConfirmationState>, PipelineError> {
    let statuses = ledger.signature_statuses(&[id]).await?;
    Ok(statuses
        .into_iter()
        .next()
        .flatten()
        .map(|status| match status.err {
            Some(err) => ConfirmationState::Rejected(err),
            None => ConfirmationState::from_commitment(status.commitment),
        }))
}

fn expired(
    id: TransactionId,
    anchor: Option<ValidityAnchor>,
    observed_block_height: Option<u64>,
) -> PipelineError {
    metrics().expirations_total.inc();
    PipelineError::AnchorExpired {
        signature: Some(id),
        last_valid_block_height: anchor.map(|a| a.last_valid_block_height).unwrap_or_default(),
        observed_block_height: observed_block_height.unwrap_or_default(),
    }
}
