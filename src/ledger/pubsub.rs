//! WebSocket signature subscriptions
//!
//! Uses the native `signatureSubscribe` PubSub method. Each subscription runs
//! in its own task that forwards notifications into an unbounded channel and
//! unsubscribes as soon as the receiving side is dropped.

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_rpc_client_api::config::RpcSignatureSubscribeConfig;
use solana_rpc_client_api::response::{ProcessedSignatureResult, RpcSignatureResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{SignatureNotification, SignatureSubscriber};
use crate::errors::PipelineError;
use crate::types::{Commitment, TransactionId};

/// Signature subscriber over a shared PubSub connection
pub struct PubsubSignatureSubscriber {
    ws_url: String,
    client: Arc<PubsubClient>,
}

impl std::fmt::Debug for PubsubSignatureSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubsubSignatureSubscriber")
            .field("ws_url", &self.ws_url)
            .finish()
    }
}

impl PubsubSignatureSubscriber {
    /// Connect to the websocket endpoint
    pub async fn connect(ws_url: impl Into<String>) -> Result<Self, PipelineError> {
        let ws_url = ws_url.into();
        info!(ws_url = %ws_url, "Connecting to PubSub endpoint");

        let client = PubsubClient::new(&ws_url)
            .await
            .map_err(|e| PipelineError::Subscription(format!("connect {}: {}", ws_url, e)))?;

        info!("PubSub connected");
        Ok(Self {
            ws_url,
            client: Arc::new(client),
        })
    }
}

fn to_notification(slot: u64, result: RpcSignatureResult) -> SignatureNotification {
    match result {
        RpcSignatureResult::ProcessedSignature(ProcessedSignatureResult { err }) => {
            SignatureNotification::Processed {
                slot,
                err: err.map(|e| format!("{:?}", e)),
            }
        }
        RpcSignatureResult::ReceivedSignature(_) => SignatureNotification::Received,
    }
}

#[async_trait]
impl SignatureSubscriber for PubsubSignatureSubscriber {
    async fn subscribe(
        &self,
        id: TransactionId,
        commitment: Commitment,
    ) -> Result<mpsc::UnboundedReceiver<SignatureNotification>, PipelineError> {
        debug!(signature = %id, %commitment, "Subscribing to signature");

        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::clone(&self.client);
        let signature = *id.signature();

        tokio::spawn(async move {
            let (mut notifications, unsubscribe) = match client
                .signature_subscribe(
                    &signature,
                    Some(RpcSignatureSubscribeConfig {
                        commitment: Some(commitment.to_config()),
                        enable_received_notification: Some(false),
                    }),
                )
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(%signature, error = %e, "Failed to subscribe to signature");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!(%signature, "Receiver dropped, unsubscribing");
                        break;
                    }
                    next = notifications.next() => {
                        let Some(response) = next else { break };
                        let notification = to_notification(response.context.slot, response.value);
                        let done = matches!(notification, SignatureNotification::Processed { .. });
                        if tx.send(notification).is_err() || done {
                            break;
                        }
                    }
                }
            }
            unsubscribe().await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_rpc_client_api::response::ReceivedSignatureResult;

    #[test]
    fn test_to_notification() {
        let processed = to_notification(
            42,
            RpcSignatureResult::ProcessedSignature(ProcessedSignatureResult { err: None }),
        );
        assert_eq!(
            processed,
            SignatureNotification::Processed { slot: 42, err: None }
        );

        let received = to_notification(
            7,
            RpcSignatureResult::ReceivedSignature(ReceivedSignatureResult::ReceivedSignature),
        );
        assert_eq!(received, SignatureNotification::Received);
    }
}
