//! Submit-and-confirm orchestration
//!
//! [`TransactionPipeline::send_and_confirm`] drives one logical action to a
//! terminal outcome:
//!
//! 1. check the message's anchor is still valid
//! 2. sign
//! 3. submit (with preflight unless disabled)
//! 4. track until the requested commitment, or expiry, rejection or the
//!    per-attempt timeout
//!
//! An expired anchor means the signed bytes can never land, so the message is
//! re-stamped with a fresh blockhash and signed again under a new id. A
//! per-attempt timeout or transient RPC failure rebroadcasts the identical
//! bytes instead, without preflight, and only when the ledger does not already
//! know them. Everything is bounded by one overall deadline.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::confirm::ConfirmationTracker;
use crate::errors::PipelineError;
use crate::funding::FundingSource;
use crate::ledger::{LedgerRpc, SignatureSubscriber};
use crate::metrics::{metrics, Timer};
use crate::structured_logging::{PipelineContext, PipelineLogger};
use crate::submit::SubmissionChannel;
use crate::tx_builder::{sign, KeyHolder, TxMessage};
use crate::types::{Commitment, ConfirmationState, SubmitOptions, TransactionId, ValidityAnchor};
use crate::window::BlockhashWindow;

/// Attempt bound and backoff between attempts of one `send_and_confirm`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per logical action, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Upper bound before jitter
    pub max_delay_ms: u64,
    /// Fraction of the delay randomised either way, in `0.0..=1.0`
    pub jitter_factor: f64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Pause after `failed` attempts, `None` when no attempt is left
    pub fn calculate_delay(&self, failed: u32) -> Option<Duration> {
        if failed >= self.max_attempts {
            return None;
        }

        let backoff_ms = (self.base_delay_ms as f64 * self.multiplier.powi(failed as i32))
            .min(self.max_delay_ms as f64);
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * self.jitter_factor;

        Some(Duration::from_millis((backoff_ms * (1.0 + jitter)).max(0.0) as u64))
    }
}

/// Terminal success of [`TransactionPipeline::send_and_confirm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Id of the attempt that landed
    pub signature: TransactionId,
    /// Commitment reached, at least the requested one
    pub state: ConfirmationState,
    pub attempts: u32,
    pub rebuilds: u32,
    pub elapsed: Duration,
}

/// Submit-and-confirm pipeline over one ledger
#[derive(Clone)]
pub struct TransactionPipeline {
    ledger: Arc<dyn LedgerRpc>,
    window: BlockhashWindow,
    channel: SubmissionChannel,
    tracker: ConfirmationTracker,
    submit_options: SubmitOptions,
    attempt_timeout: Duration,
    policy: RetryPolicy,
}

impl TransactionPipeline {
    /// Pipeline with default submit options and retry policy
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        subscriber: Option<Arc<dyn SignatureSubscriber>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            window: BlockhashWindow::new(Arc::clone(&ledger)),
            channel: SubmissionChannel::new(Arc::clone(&ledger)),
            tracker: ConfirmationTracker::new(Arc::clone(&ledger), subscriber, poll_interval),
            ledger,
            submit_options: SubmitOptions::default(),
            attempt_timeout: Duration::from_secs(15),
            policy: RetryPolicy::default(),
        }
    }

    pub fn from_config(
        ledger: Arc<dyn LedgerRpc>,
        subscriber: Option<Arc<dyn SignatureSubscriber>>,
        config: &Config,
    ) -> Self {
        Self::new(ledger, subscriber, config.confirmation.poll_interval())
            .with_submit_options(config.submit)
            .with_attempt_timeout(config.confirmation.attempt_timeout())
            .with_retry_policy(config.retry.clone())
    }

    pub fn with_submit_options(mut self, options: SubmitOptions) -> Self {
        self.submit_options = options;
        self
    }

    /// Wait per attempt before rebroadcasting
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn window(&self) -> &BlockhashWindow {
        &self.window
    }

    pub fn tracker(&self) -> &ConfirmationTracker {
        &self.tracker
    }

    /// Faucet funding sharing this pipeline's ledger and tracker
    pub fn funding_source(&self) -> FundingSource {
        FundingSource::new(Arc::clone(&self.ledger), self.tracker.clone())
    }

    /// Sign, submit and confirm `message`, rebuilding or rebroadcasting as
    /// needed until `commitment` is reached or `timeout` elapses
    ///
    /// # Errors
    ///
    /// - [`PipelineError::MissingSigner`] and [`PipelineError::SimulationFailed`]
    ///   surface at once
    /// - [`PipelineError::LedgerRejected`] is never retried
    /// - [`PipelineError::AnchorExpired`] once attempts are exhausted
    /// - [`PipelineError::ConfirmationTimeout`] once `timeout` elapses
    pub async fn send_and_confirm(
        &self,
        message: TxMessage,
        key_holders: &[KeyHolder],
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<Confirmation, PipelineError> {
        let context = PipelineContext::default();
        let logger = &context.logger;
        let started = Instant::now();
        let deadline = started + timeout;

        let mut message = message;
        let mut progress = Progress::default();
        let mut next = NextSend::Fresh;

        loop {
            progress.attempts += 1;
            let outcome = async {
                if next == NextSend::Rebuild {
                    // A finalized blockhash would leave a shorter window
                    let anchor = bounded(
                        deadline,
                        started,
                        progress.last_id,
                        self.window.fetch_anchor(Commitment::Confirmed),
                    )
                    .await?;
                    logger.log_rebuild(progress.last_id.as_ref(), &anchor);
                    message = message.with_anchor(anchor);
                    progress.rebuilds += 1;
                    metrics().rebuilds_total.inc();
                    next = NextSend::Fresh;
                }
                self.attempt(&message, key_holders, commitment, deadline, next, &mut progress, logger)
                    .await
            }
            .await;

            let err = match outcome {
                Ok((signature, state)) => {
                    let elapsed = started.elapsed();
                    logger.log_confirmed(&signature, &state, commitment, elapsed);
                    return Ok(Confirmation {
                        signature,
                        state,
                        attempts: progress.attempts,
                        rebuilds: progress.rebuilds,
                        elapsed,
                    });
                }
                Err(err) => err,
            };

            let now = Instant::now();
            let retry_delay = if err.is_retryable() && now < deadline {
                self.policy.calculate_delay(progress.attempts)
            } else {
                None
            };
            let Some(delay) = retry_delay else {
                let err = match err {
                    PipelineError::ConfirmationTimeout { signature, .. } => {
                        PipelineError::ConfirmationTimeout {
                            signature,
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        }
                    }
                    other => other,
                };
                logger.log_failure(&err, started.elapsed());
                return Err(err);
            };

            // A failed rebuild fetch leaves the rebuild pending
            next = if err.requires_rebuild() || next == NextSend::Rebuild {
                NextSend::Rebuild
            } else if progress.forwarded {
                if let Some(id) = &progress.last_id {
                    logger.log_rebroadcast(id, &err);
                }
                metrics().rebroadcasts_total.inc();
                NextSend::Rebroadcast
            } else {
                NextSend::Fresh
            };
            tokio::time::sleep_until((now + delay).min(deadline)).await;
        }
    }

    /// One sign/submit/track round for `message`
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        message: &TxMessage,
        key_holders: &[KeyHolder],
        commitment: Commitment,
        deadline: Instant,
        send: NextSend,
        progress: &mut Progress,
        logger: &PipelineLogger,
    ) -> Result<(TransactionId, ConfirmationState), PipelineError> {
        let started = Instant::now();
        let anchor = *message.anchor();

        // Bytes the ledger already holds are only tracked, never resent
        if send == NextSend::Rebroadcast {
            if let Some(id) = progress.last_id {
                let known = bounded(deadline, started, Some(id), self.tracker.lookup(id)).await?;
                if let Some(state) = known {
                    debug!(signature = %id, %state, "Already on the ledger, tracking again");
                    return self.track(id, anchor, commitment, deadline).await;
                }
            }
        }

        // Signing never makes a stale anchor valid again
        let stale = bounded(
            deadline,
            started,
            progress.last_id,
            self.window.check_stale(&anchor, commitment),
        )
        .await?;
        if let Some(observed_block_height) = stale {
            return Err(PipelineError::AnchorExpired {
                signature: progress.last_id,
                last_valid_block_height: anchor.last_valid_block_height,
                observed_block_height,
            });
        }

        let timer = Timer::start(&metrics().sign_latency);
        let signed = sign(message, key_holders)?;
        timer.finish();

        let id = signed.id();
        if progress.last_id != Some(id) {
            progress.forwarded = false;
        }
        progress.last_id = Some(id);
        logger.log_attempt(progress.attempts, &id, &anchor);

        // The first forward already passed preflight
        let options = SubmitOptions {
            skip_preflight: self.submit_options.skip_preflight || send == NextSend::Rebroadcast,
            ..self.submit_options
        };
        bounded(deadline, started, Some(id), self.channel.submit(&signed, options)).await?;
        progress.forwarded = true;

        self.track(id, anchor, commitment, deadline).await
    }

    async fn track(
        &self,
        id: TransactionId,
        anchor: ValidityAnchor,
        commitment: Commitment,
        deadline: Instant,
    ) -> Result<(TransactionId, ConfirmationState), PipelineError> {
        let attempt_deadline = (Instant::now() + self.attempt_timeout).min(deadline);
        let state = self
            .tracker
            .track(id, Some(anchor), commitment, attempt_deadline)
            .await?;
        Ok((id, state))
    }
}

/// How the next attempt treats the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextSend {
    /// Sign and submit with preflight
    Fresh,
    /// Resend the same bytes unless the ledger already knows them
    Rebroadcast,
    /// Re-stamp with a fresh anchor first
    Rebuild,
}

/// Bookkeeping across the attempts of one `send_and_confirm`
#[derive(Debug, Default)]
struct Progress {
    attempts: u32,
    rebuilds: u32,
    /// Id of the most recently signed bytes
    last_id: Option<TransactionId>,
    /// Whether the ledger accepted `last_id` at least once
    forwarded: bool,
}

/// Run `fut` under `deadline`, mapping expiry to a confirmation timeout
async fn bounded<T, F>(
    deadline: Instant,
    started: Instant,
    signature: Option<TransactionId>,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::ConfirmationTimeout {
            signature,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    }
}
