//! End-to-end scenarios for `send_and_confirm`

use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::PipelineError;
use crate::ledger::{LedgerRpc, SignatureSubscriber};
use crate::pipeline::{RetryPolicy, TransactionPipeline};
use crate::test_utils::{hello_message, Landing, MockLedger, MockSubscriber};
use crate::tx_builder::{
    hello_instruction, kasbah_program_id, sign, transaction_id_from_wire, KeyHolder, TxMessage,
};
use crate::types::{sol_to_lamports, Commitment, ConfirmationState};
use crate::wallet::Wallet;

const DEADLINE: Duration = Duration::from_secs(30);

fn pipeline(ledger: &Arc<MockLedger>) -> TransactionPipeline {
    TransactionPipeline::new(ledger.clone(), None, Duration::from_millis(5)).with_retry_policy(
        RetryPolicy {
            base_delay_ms: 1,
            ..RetryPolicy::default()
        },
    )
}

#[tokio::test]
async fn test_funded_key_sends_hello_at_confirmed() {
    let ledger = Arc::new(MockLedger::new());
    let pipeline = pipeline(&ledger);
    let wallet = Wallet::ephemeral();

    pipeline
        .funding_source()
        .request_funding(&wallet.pubkey(), sol_to_lamports(1), Commitment::Confirmed, DEADLINE)
        .await
        .unwrap();

    let anchor = pipeline.window().fetch_anchor(Commitment::Confirmed).await.unwrap();
    let message = TxMessage::build(
        wallet.pubkey(),
        anchor,
        vec![hello_instruction(&kasbah_program_id(), &wallet.pubkey(), 1)],
    )
    .unwrap();

    let confirmation = pipeline
        .send_and_confirm(message, &[wallet.key_holder()], Commitment::Confirmed, DEADLINE)
        .await
        .unwrap();
    assert_eq!(confirmation.state, ConfirmationState::Confirmed);

    let statuses = ledger.signature_statuses(&[confirmation.signature]).await.unwrap();
    assert!(statuses[0].is_some());
}

#[tokio::test]
async fn test_expired_anchor_gets_exactly_one_rebuild() {
    let ledger = Arc::new(MockLedger::new());
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    ledger.set_block_height(message.anchor().last_valid_block_height + 10);
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let confirmation = pipeline(&ledger)
        .send_and_confirm(message, &holders, Commitment::Confirmed, DEADLINE)
        .await
        .unwrap();

    assert_eq!(confirmation.rebuilds, 1);
    // One anchor for the original message, one for the rebuild
    assert_eq!(ledger.blockhash_requests(), 2);
    assert_eq!(ledger.distinct_sent(), 1);
}

#[tokio::test]
async fn test_empty_instructions_make_no_calls() {
    let ledger = Arc::new(MockLedger::new());
    let anchor = ledger.current_anchor();

    let err = TxMessage::build(Keypair::new().pubkey(), anchor, vec![]).unwrap_err();

    assert_eq!(err, PipelineError::EmptyInstructionSet);
    assert_eq!(ledger.rpc_calls(), 0);
}

#[tokio::test]
async fn test_same_message_signs_to_same_id() {
    let ledger = Arc::new(MockLedger::new());
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let first = sign(&message, &holders).unwrap();
    let second = sign(&message, &holders).unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(
        transaction_id_from_wire(&first.wire_bytes().unwrap()).unwrap(),
        second.id()
    );
}

#[tokio::test]
async fn test_failing_instruction_never_reaches_ledger() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_simulation(
        "InstructionError(0, Custom(6000))",
        vec![
            "Program ksb1AcDWRRawr7Amf9H7wCGtYvyVGNfbMvBPVAV6BJT invoke [1]".to_string(),
            "Program log: AnchorError occurred. Error Code: InvalidId.".to_string(),
        ],
    );
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let err = pipeline(&ledger)
        .send_and_confirm(message, &holders, Commitment::Confirmed, DEADLINE)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SimulationFailed { .. }));
    assert_eq!(err.logs().len(), 2);
    assert!(ledger.sent().is_empty());
}

#[tokio::test]
async fn test_finalized_is_never_premature() {
    let ledger = Arc::new(MockLedger::new());
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let confirmation = pipeline(&ledger)
        .send_and_confirm(message, &holders, Commitment::Finalized, DEADLINE)
        .await
        .unwrap();

    assert_eq!(confirmation.state, ConfirmationState::Finalized);
}

#[tokio::test]
async fn test_push_notification_confirms_before_poll() {
    let ledger = Arc::new(MockLedger::new());
    ledger.push_landing(Landing::Never);
    let subscriber = Arc::new(MockSubscriber::notifying(None));
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let pipeline = TransactionPipeline::new(
        ledger.clone(),
        Some(subscriber.clone() as Arc<dyn SignatureSubscriber>),
        Duration::from_secs(60),
    );
    let confirmation = pipeline
        .send_and_confirm(message, &holders, Commitment::Confirmed, DEADLINE)
        .await
        .unwrap();

    assert_eq!(confirmation.state, ConfirmationState::Confirmed);
    assert_eq!(subscriber.subscriptions(), 1);
}

#[tokio::test]
async fn test_rejected_transaction_reports_reason() {
    let ledger = Arc::new(MockLedger::new());
    ledger.push_landing(Landing::Rejected("InsufficientFundsForFee".to_string()));
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let err = pipeline(&ledger)
        .send_and_confirm(message, &holders, Commitment::Confirmed, DEADLINE)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "rejected");
    assert!(err.to_string().contains("InsufficientFundsForFee"));
    assert_eq!(ledger.sent().len(), 1);
}

#[tokio::test]
async fn test_processed_transaction_lost_with_its_fork_is_rebuilt() {
    let ledger = Arc::new(MockLedger::new().with_height_step(100));
    ledger.push_landing(Landing::Dropped);
    let payer = Keypair::new();
    let message = hello_message(&ledger, &payer).await;
    let holders: Vec<KeyHolder> = vec![Arc::new(payer)];

    let confirmation = pipeline(&ledger)
        .send_and_confirm(message, &holders, Commitment::Confirmed, DEADLINE)
        .await
        .unwrap();

    assert_eq!(confirmation.state, ConfirmationState::Confirmed);
    assert_eq!(confirmation.rebuilds, 1);
    let sent = ledger.sent();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0], sent[1]);
    assert_eq!(confirmation.signature, sent[1]);
}
