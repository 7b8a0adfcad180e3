//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;

use crate::tx_builder::KeyHolder;

/// Owner of the fee payer keypair
#[derive(Clone)]
pub struct Wallet {
    keypair: Arc<Keypair>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

impl Wallet {
    /// Fresh random keypair, never persisted
    pub fn ephemeral() -> Self {
        Self::from_keypair(Keypair::new())
    }

    /// Load a keypair file, either the CLI's JSON array or 64 raw bytes
    pub fn from_file(path: &str) -> Result<Self> {
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let bytes = if keypair_bytes.len() == 64 {
            keypair_bytes
        } else {
            serde_json::from_slice::<Vec<u8>>(&keypair_bytes)
                .context("Failed to parse keypair JSON")?
        };
        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }
        let keypair = Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")?;

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Signing capability for the pipeline
    pub fn key_holder(&self) -> KeyHolder {
        self.keypair.clone()
    }
}
