//! Runs the hello scenario against a local test validator
//!
//! Requires `solana-test-validator` with the kasbah program deployed:
//!
//! ```text
//! cargo test --test live_validator_test -- --ignored
//! ```

#[cfg(test)]
mod live_validator_tests {
    use kasbah_harness::ledger::{LedgerRpc, PubsubSignatureSubscriber, SignatureSubscriber, SolanaRpcLedger};
    use kasbah_harness::scenario::{run_hello, HelloScenario};
    use kasbah_harness::wallet::Wallet;
    use kasbah_harness::{Config, ConfirmationState, TransactionPipeline};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    #[ignore = "needs a local validator at 127.0.0.1:8899"]
    async fn test_hello_on_local_validator() {
        let config = Config::default();
        let ledger = Arc::new(SolanaRpcLedger::new(
            config.rpc.http_url.clone(),
            Duration::from_secs(config.rpc.timeout_secs),
            config.confirmation.commitment,
        ));
        let subscriber: Arc<dyn SignatureSubscriber> = Arc::new(
            PubsubSignatureSubscriber::connect(config.rpc.ws_url.clone())
                .await
                .unwrap(),
        );
        let pipeline = TransactionPipeline::from_config(ledger.clone(), Some(subscriber), &config);

        let report = run_hello(&pipeline, &Wallet::ephemeral(), &HelloScenario::default())
            .await
            .unwrap();

        assert_eq!(report.confirmation.state, ConfirmationState::Confirmed);
        let statuses = ledger
            .signature_statuses(&[report.confirmation.signature])
            .await
            .unwrap();
        assert!(statuses[0].is_some());
    }
}
