//! Subscription observation path

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{Observation, ObservationPath};
use crate::ledger::{SignatureNotification, SignatureSubscriber};
use crate::types::{Commitment, ConfirmationState, TransactionId};

/// Forward the first decisive notification for `id`
///
/// A subscription that cannot be opened or closes early is not an error; the
/// poll path keeps running.
pub(super) async fn run(
    subscriber: Arc<dyn SignatureSubscriber>,
    id: TransactionId,
    commitment: Commitment,
    tx: mpsc::UnboundedSender<Observation>,
) {
    let mut notifications = match subscriber.subscribe(id, commitment).await {
        Ok(notifications) => notifications,
        Err(e) => {
            warn!(signature = %id, error = %e, "Signature subscription unavailable, polling only");
            return;
        }
    };

    while let Some(notification) = notifications.recv().await {
        match notification {
            SignatureNotification::Received => {
                trace!(signature = %id, "Signature received by node");
            }
            SignatureNotification::Processed { slot, err } => {
                let state = match err {
                    Some(err) => ConfirmationState::Rejected(err),
                    None => ConfirmationState::from_commitment(commitment),
                };
                trace!(signature = %id, slot, %state, "Subscription observed state");
                let _ = tx.send(Observation {
                    path: ObservationPath::Subscription,
                    state,
                    block_height: None,
                });
                return;
            }
        }
    }

    debug!(signature = %id, "Signature subscription closed without a result");
}
