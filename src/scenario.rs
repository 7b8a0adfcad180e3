//! The `hello` scenario
//!
//! Funds the payer from the faucet, invokes the kasbah program's `hello`
//! instruction through [`TransactionPipeline::send_and_confirm`] and reports
//! the confirmed signature with an explorer link.

use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::errors::PipelineError;
use crate::explorer::explorer_local_url;
use crate::pipeline::{Confirmation, TransactionPipeline};
use crate::tx_builder::{hello_instruction, kasbah_program_id, TxMessage};
use crate::types::{Commitment, TransactionId, LAMPORTS_PER_SOL};
use crate::wallet::Wallet;

/// Parameters of one `hello` run
#[derive(Debug, Clone)]
pub struct HelloScenario {
    pub program_id: Pubkey,
    pub hello_id: u8,
    /// Airdrop before sending; off for pre-funded keypairs
    pub fund: bool,
    pub funding_lamports: u64,
    pub funding_commitment: Commitment,
    pub commitment: Commitment,
    pub deadline: Duration,
}

impl Default for HelloScenario {
    fn default() -> Self {
        Self {
            program_id: kasbah_program_id(),
            hello_id: 1,
            fund: true,
            funding_lamports: LAMPORTS_PER_SOL,
            funding_commitment: Commitment::Confirmed,
            commitment: Commitment::Confirmed,
            deadline: Duration::from_secs(30),
        }
    }
}

impl HelloScenario {
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let program_id = config.program.program_id.parse::<Pubkey>().map_err(|e| {
            PipelineError::Configuration(format!(
                "invalid program id {}: {}",
                config.program.program_id, e
            ))
        })?;
        Ok(Self {
            program_id,
            hello_id: config.program.hello_id,
            fund: config.wallet.keypair_path.is_none(),
            funding_lamports: config.funding.lamports,
            funding_commitment: config.funding.commitment,
            commitment: config.confirmation.commitment,
            deadline: config.confirmation.deadline(),
        })
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub payer: Pubkey,
    pub funding_signature: Option<TransactionId>,
    pub confirmation: Confirmation,
    pub explorer_url: String,
}

/// Fund `wallet` (when requested) and confirm one `hello` instruction
pub async fn run_hello(
    pipeline: &TransactionPipeline,
    wallet: &Wallet,
    scenario: &HelloScenario,
) -> Result<ScenarioReport, PipelineError> {
    let payer = wallet.pubkey();

    let funding_signature = if scenario.fund {
        let id = pipeline
            .funding_source()
            .request_funding(
                &payer,
                scenario.funding_lamports,
                scenario.funding_commitment,
                scenario.deadline,
            )
            .await?;
        Some(id)
    } else {
        None
    };

    let anchor = pipeline.window().fetch_anchor(Commitment::Confirmed).await?;
    let message = TxMessage::build(
        payer,
        anchor,
        vec![hello_instruction(&scenario.program_id, &payer, scenario.hello_id)],
    )?;

    let confirmation = pipeline
        .send_and_confirm(
            message,
            &[wallet.key_holder()],
            scenario.commitment,
            scenario.deadline,
        )
        .await?;

    let explorer_url = explorer_local_url(&confirmation.signature);
    info!(signature = %confirmation.signature, "hello confirmed");
    info!(url = %explorer_url, "explorer url");

    Ok(ScenarioReport {
        payer,
        funding_signature,
        confirmation,
        explorer_url,
    })
}
