//! Public API tests for the submit-and-confirm pipeline

#[cfg(test)]
mod pipeline_integration_tests {
    use kasbah_harness::scenario::{run_hello, HelloScenario};
    use kasbah_harness::test_utils::{Landing, MockLedger, MockSubscriber};
    use kasbah_harness::wallet::Wallet;
    use kasbah_harness::{
        Commitment, Config, ConfirmationState, PipelineError, RetryPolicy, TransactionPipeline,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_pipeline(ledger: &Arc<MockLedger>) -> TransactionPipeline {
        let mut config = Config::default();
        config.confirmation.poll_interval_ms = 5;
        config.retry = RetryPolicy {
            base_delay_ms: 1,
            ..RetryPolicy::default()
        };
        TransactionPipeline::from_config(ledger.clone(), None, &config)
    }

    #[tokio::test]
    async fn test_hello_scenario_confirms() {
        let ledger = Arc::new(MockLedger::new());
        let wallet = Wallet::ephemeral();

        let report = run_hello(&fast_pipeline(&ledger), &wallet, &HelloScenario::default())
            .await
            .unwrap();

        assert_eq!(report.confirmation.state, ConfirmationState::Confirmed);
        assert_eq!(report.confirmation.attempts, 1);
        assert!(report.funding_signature.is_some());
        assert!(report.explorer_url.starts_with("https://explorer.solana.com/tx/"));
    }

    #[tokio::test]
    async fn test_hello_scenario_survives_expiry() {
        let ledger = Arc::new(MockLedger::new());
        ledger.push_landing(Landing::Never);
        let wallet = Wallet::ephemeral();
        let scenario = HelloScenario {
            fund: false,
            ..HelloScenario::default()
        };
        let pipeline = fast_pipeline(&ledger).with_attempt_timeout(Duration::from_secs(5));
        ledger.set_height_step(40);

        let report = run_hello(&pipeline, &wallet, &scenario).await.unwrap();

        assert_eq!(report.confirmation.rebuilds, 1);
        assert_eq!(ledger.distinct_sent(), 2);
    }

    #[tokio::test]
    async fn test_faucet_refusal_stops_scenario() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_airdrops("faucet disabled");

        let err = run_hello(&fast_pipeline(&ledger), &Wallet::ephemeral(), &HelloScenario::default())
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::FundingUnavailable("faucet disabled".to_string()));
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_subscription_still_confirms() {
        let ledger = Arc::new(MockLedger::new());
        let pipeline = TransactionPipeline::new(
            ledger.clone(),
            Some(Arc::new(MockSubscriber::dropping())),
            Duration::from_millis(5),
        );
        let scenario = HelloScenario {
            fund: false,
            commitment: Commitment::Finalized,
            ..HelloScenario::default()
        };

        let report = run_hello(&pipeline, &Wallet::ephemeral(), &scenario)
            .await
            .unwrap();

        assert_eq!(report.confirmation.state, ConfirmationState::Finalized);
    }
}
