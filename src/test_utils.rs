//! Test Utilities Module
//!
//! In-memory doubles for the ledger boundary, used to drive the pipeline
//! deterministically without a validator.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::PipelineError;
use crate::ledger::{LedgerRpc, LedgerStatus, SignatureNotification, SignatureSubscriber, SimulationReport};
use crate::tx_builder::{hello_instruction, kasbah_program_id, sign, KeyHolder, SignedTx, TxMessage};
use crate::types::{Commitment, TransactionId, ValidityAnchor};

/// Blocks a blockhash stays valid for on the mock ledger
pub const MOCK_VALIDITY_WINDOW: u64 = 150;

/// Starting block height of a fresh mock ledger
pub const MOCK_START_HEIGHT: u64 = 1_000;

/// What happens to a transaction after it reaches the mock ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// Processed, then confirmed, then finalized on successive status polls
    Success,
    /// Processed with an execution error
    Rejected(String),
    /// Never included; the signature stays unknown
    Never,
    /// Stays processed for this many polls, then confirms and finalizes
    Lagging(u32),
    /// Processed on the first poll, then forgotten with its fork
    Dropped,
}

#[derive(Debug)]
struct Landed {
    landing: Landing,
    polls: u32,
}

impl Landed {
    fn status(&mut self) -> Option<LedgerStatus> {
        self.polls += 1;
        let processed = |slot: u32| LedgerStatus {
            slot: u64::from(slot),
            commitment: Commitment::Processed,
            err: None,
        };
        match &self.landing {
            Landing::Never => None,
            Landing::Dropped if self.polls == 1 => Some(processed(self.polls)),
            Landing::Dropped => None,
            Landing::Lagging(lag) if self.polls <= *lag => Some(processed(self.polls)),
            Landing::Lagging(lag) => Some(LedgerStatus {
                slot: u64::from(self.polls),
                commitment: if self.polls == lag + 1 {
                    Commitment::Confirmed
                } else {
                    Commitment::Finalized
                },
                err: None,
            }),
            Landing::Rejected(reason) => Some(LedgerStatus {
                slot: 1,
                commitment: Commitment::Processed,
                err: Some(reason.clone()),
            }),
            Landing::Success => {
                let commitment = match self.polls {
                    1 => Commitment::Processed,
                    2 => Commitment::Confirmed,
                    _ => Commitment::Finalized,
                };
                Some(LedgerStatus {
                    slot: u64::from(self.polls),
                    commitment,
                    err: None,
                })
            }
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    height: u64,
    height_step: u64,
    anchors: HashMap<Hash, u64>,
    landings: VecDeque<Landing>,
    landed: HashMap<TransactionId, Landed>,
    simulation_failure: Option<(String, Vec<String>)>,
    already_processed_on_resimulate: bool,
    airdrop_failure: Option<String>,
    failing_sends: u32,
    failing_blockhash_requests: u32,

    blockhash_requests: usize,
    simulations: usize,
    sent: Vec<TransactionId>,
    status_polls: usize,
    airdrops: usize,
    rpc_calls: usize,
}

/// In-memory ledger
///
/// Every `latest_blockhash` call issues a new unique blockhash valid for
/// [`MOCK_VALIDITY_WINDOW`] blocks. Each `block_height` call advances the
/// height by the configured step (zero by default).
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                height: MOCK_START_HEIGHT,
                ..LedgerState::default()
            }),
        }
    }

    /// Advance the block height by `step` on every height read
    pub fn with_height_step(self, step: u64) -> Self {
        self.state.lock().height_step = step;
        self
    }

    pub fn set_block_height(&self, height: u64) {
        self.state.lock().height = height;
    }

    pub fn set_height_step(&self, step: u64) {
        self.state.lock().height_step = step;
    }

    /// Anchor valid from the current height, without counting a request
    pub fn current_anchor(&self) -> ValidityAnchor {
        let mut state = self.state.lock();
        let anchor = ValidityAnchor::new(Hash::new_unique(), state.height + MOCK_VALIDITY_WINDOW);
        state.anchors.insert(anchor.blockhash, anchor.last_valid_block_height);
        anchor
    }

    /// Queue the fate of the next distinct transaction sent
    ///
    /// Unqueued transactions land with [`Landing::Success`].
    pub fn push_landing(&self, landing: Landing) {
        self.state.lock().landings.push_back(landing);
    }

    /// Make `id` known to the ledger as if it had been sent
    pub fn land(&self, id: TransactionId, landing: Landing) {
        self.state.lock().landed.insert(id, Landed { landing, polls: 0 });
    }

    /// Make every simulation fail
    pub fn fail_simulation(&self, reason: impl Into<String>, logs: Vec<String>) {
        self.state.lock().simulation_failure = Some((reason.into(), logs));
    }

    /// Fail simulations of already sent transactions with `AlreadyProcessed`,
    /// as a cluster does once the signature is in its status cache
    pub fn simulate_already_processed(&self) {
        self.state.lock().already_processed_on_resimulate = true;
    }

    pub fn fail_airdrops(&self, reason: impl Into<String>) {
        self.state.lock().airdrop_failure = Some(reason.into());
    }

    /// Fail the next `count` sends with a transient RPC error
    pub fn fail_next_sends(&self, count: u32) {
        self.state.lock().failing_sends = count;
    }

    /// Fail the next `count` blockhash fetches with a transient RPC error
    pub fn fail_next_blockhash_requests(&self, count: u32) {
        self.state.lock().failing_blockhash_requests = count;
    }

    pub fn blockhash_requests(&self) -> usize {
        self.state.lock().blockhash_requests
    }

    pub fn simulations(&self) -> usize {
        self.state.lock().simulations
    }

    /// Every successful send, in order, including rebroadcasts
    pub fn sent(&self) -> Vec<TransactionId> {
        self.state.lock().sent.clone()
    }

    pub fn distinct_sent(&self) -> usize {
        self.state.lock().sent.iter().collect::<HashSet<_>>().len()
    }

    pub fn status_polls(&self) -> usize {
        self.state.lock().status_polls
    }

    pub fn airdrops(&self) -> usize {
        self.state.lock().airdrops
    }

    /// Total calls made through [`LedgerRpc`]
    pub fn rpc_calls(&self) -> usize {
        self.state.lock().rpc_calls
    }

    fn is_expired(state: &LedgerState, blockhash: &Hash) -> bool {
        state
            .anchors
            .get(blockhash)
            .map(|last_valid| state.height > *last_valid)
            .unwrap_or(false)
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn latest_blockhash(&self, _commitment: Commitment) -> Result<ValidityAnchor, PipelineError> {
        let mut state = self.state.lock();
        state.rpc_calls += 1;
        state.blockhash_requests += 1;
        if state.failing_blockhash_requests > 0 {
            state.failing_blockhash_requests -= 1;
            return Err(PipelineError::rpc("connection reset by peer"));
        }
        let anchor = ValidityAnchor::new(Hash::new_unique(), state.height + MOCK_VALIDITY_WINDOW);
        state.anchors.insert(anchor.blockhash, anchor.last_valid_block_height);
        Ok(anchor)
    }

    async fn block_height(&self, _commitment: Commitment) -> Result<u64, PipelineError> {
        let mut state = self.state.lock();
        state.rpc_calls += 1;
        let height = state.height;
        state.height += state.height_step;
        Ok(height)
    }

    async fn simulate_transaction(
        &self,
        tx: &Transaction,
        _commitment: Commitment,
    ) -> Result<SimulationReport, PipelineError> {
        let mut state = self.state.lock();
        state.rpc_calls += 1;
        state.simulations += 1;

        if Self::is_expired(&state, &tx.message.recent_blockhash) {
            return Ok(SimulationReport {
                err: Some("BlockhashNotFound".to_string()),
                ..SimulationReport::default()
            });
        }
        let already_sent = tx
            .signatures
            .first()
            .map(|sig| state.sent.contains(&TransactionId::new(*sig)))
            .unwrap_or(false);
        if state.already_processed_on_resimulate && already_sent {
            return Ok(SimulationReport {
                err: Some("AlreadyProcessed".to_string()),
                ..SimulationReport::default()
            });
        }
        Ok(match &state.simulation_failure {
            Some((reason, logs)) => SimulationReport {
                err: Some(reason.clone()),
                logs: logs.clone(),
                units_consumed: None,
            },
            None => SimulationReport {
                err: None,
                logs: vec!["Program log: Instruction: Hello".to_string()],
                units_consumed: Some(1_200),
            },
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<TransactionId, PipelineError> {
        let mut state = self.state.lock();
        state.rpc_calls += 1;

        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(PipelineError::rpc("connection reset by peer"));
        }

        let id = tx
            .signatures
            .first()
            .copied()
            .map(TransactionId::new)
            .ok_or_else(|| PipelineError::internal("unsigned transaction"))?;
        state.sent.push(id);

        if !state.landed.contains_key(&id) {
            let landing = if Self::is_expired(&state, &tx.message.recent_blockhash) {
                Landing::Never
            } else {
                state.landings.pop_front().unwrap_or(Landing::Success)
            };
            state.landed.insert(id, Landed { landing, polls: 0 });
        }
        Ok(id)
    }

    async fn signature_statuses(
        &self,
        ids: &[TransactionId],
    ) -> Result<Vec<Option<LedgerStatus>>, PipelineError> {
        let mut state = self.state.lock();
        state.rpc_calls += 1;
        state.status_polls += 1;
        Ok(ids
            .iter()
            .map(|id| state.landed.get_mut(id).and_then(Landed::status))
            .collect())
    }

    async fn request_airdrop(
        &self,
        _recipient: &Pubkey,
        _lamports: u64,
    ) -> Result<TransactionId, PipelineError> {
        let mut state = self.state.lock();
        state.rpc_calls += 1;
        state.airdrops += 1;
        if let Some(reason) = &state.airdrop_failure {
            return Err(PipelineError::FundingUnavailable(reason.clone()));
        }
        let id = TransactionId::new(Signature::new_unique());
        state.landed.insert(
            id,
            Landed {
                landing: Landing::Success,
                polls: 0,
            },
        );
        Ok(id)
    }
}

#[derive(Debug, Clone)]
enum SubscriberMode {
    Silent,
    Dropping,
    Notifying(Option<String>),
}

/// In-memory signature subscriber
pub struct MockSubscriber {
    mode: SubscriberMode,
    senders: Mutex<Vec<mpsc::UnboundedSender<SignatureNotification>>>,
    subscriptions: Mutex<usize>,
}

impl MockSubscriber {
    fn with_mode(mode: SubscriberMode) -> Self {
        Self {
            mode,
            senders: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(0),
        }
    }

    /// Accepts subscriptions and never notifies
    pub fn silent() -> Self {
        Self::with_mode(SubscriberMode::Silent)
    }

    /// Accepts subscriptions and closes them immediately
    pub fn dropping() -> Self {
        Self::with_mode(SubscriberMode::Dropping)
    }

    /// Notifies at once with the given execution error
    pub fn notifying(err: Option<String>) -> Self {
        Self::with_mode(SubscriberMode::Notifying(err))
    }

    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.lock()
    }

    /// Every subscription has been released by its consumer
    pub fn all_closed(&self) -> bool {
        self.senders.lock().iter().all(|tx| tx.is_closed())
    }
}

#[async_trait]
impl SignatureSubscriber for MockSubscriber {
    async fn subscribe(
        &self,
        _id: TransactionId,
        _commitment: Commitment,
    ) -> Result<mpsc::UnboundedReceiver<SignatureNotification>, PipelineError> {
        *self.subscriptions.lock() += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        match &self.mode {
            SubscriberMode::Silent => self.senders.lock().push(tx),
            SubscriberMode::Dropping => drop(tx),
            SubscriberMode::Notifying(err) => {
                let _ = tx.send(SignatureNotification::Received);
                let _ = tx.send(SignatureNotification::Processed {
                    slot: 42,
                    err: err.clone(),
                });
                self.senders.lock().push(tx);
            }
        }
        Ok(rx)
    }
}

/// `hello` message paid for and signed by `payer`
pub async fn hello_message(ledger: &MockLedger, payer: &Keypair) -> TxMessage {
    let anchor = ledger
        .latest_blockhash(Commitment::Confirmed)
        .await
        .expect("mock blockhash");
    TxMessage::build(
        payer.pubkey(),
        anchor,
        vec![hello_instruction(&kasbah_program_id(), &payer.pubkey(), 1)],
    )
    .expect("non-empty instructions")
}

/// A fresh payer and a signed `hello` transaction
pub async fn signed_hello(ledger: &MockLedger) -> (KeyHolder, SignedTx) {
    let payer = Keypair::new();
    let message = hello_message(ledger, &payer).await;
    let holder: KeyHolder = Arc::new(payer);
    let tx = sign(&message, &[holder.clone()]).expect("payer signs");
    (holder, tx)
}
