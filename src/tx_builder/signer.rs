//! Signing messages with a set of key holders

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::Transaction,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::message::TxMessage;
use crate::errors::PipelineError;
use crate::types::TransactionId;

/// A signing capability
pub type KeyHolder = Arc<dyn Signer + Send + Sync>;

/// A message together with every required signature
#[derive(Debug, Clone)]
pub struct SignedTx {
    message: TxMessage,
    transaction: Transaction,
}

impl SignedTx {
    /// Correlation id: the fee payer's signature
    pub fn id(&self) -> TransactionId {
        // The compiled message always places the fee payer in slot 0
        TransactionId::new(self.transaction.signatures[0])
    }

    pub fn message(&self) -> &TxMessage {
        &self.message
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// Signatures keyed by signer address
    pub fn signatures(&self) -> HashMap<Pubkey, Signature> {
        let required = self.transaction.message.header.num_required_signatures as usize;
        self.transaction.message.account_keys[..required]
            .iter()
            .copied()
            .zip(self.transaction.signatures.iter().copied())
            .collect()
    }

    /// Every required signer has a signature entry
    pub fn is_fully_signed(&self) -> bool {
        let signatures = self.signatures();
        self.message
            .required_signers()
            .iter()
            .all(|signer| signatures.contains_key(signer))
            && self.transaction.is_signed()
    }

    /// Serialized wire bytes
    pub fn wire_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        bincode::serialize(&self.transaction)
            .map_err(|e| PipelineError::internal(format!("serialize transaction: {}", e)))
    }
}

/// Recompute the transaction id from serialized wire bytes
pub fn transaction_id_from_wire(bytes: &[u8]) -> Result<TransactionId, PipelineError> {
    let transaction: Transaction = bincode::deserialize(bytes)
        .map_err(|e| PipelineError::internal(format!("deserialize transaction: {}", e)))?;
    transaction
        .signatures
        .first()
        .copied()
        .map(TransactionId::new)
        .ok_or_else(|| PipelineError::internal("transaction carries no signatures"))
}

/// Sign `message` with the matching key holders
///
/// Holders that are not required by the message are ignored.
///
/// # Errors
///
/// - [`PipelineError::MissingSigner`] if a required signer has no holder
/// - [`PipelineError::Internal`] if a holder fails to produce a signature
pub fn sign(message: &TxMessage, key_holders: &[KeyHolder]) -> Result<SignedTx, PipelineError> {
    let compiled = message.compile();
    let required = compiled.header.num_required_signatures as usize;
    let message_bytes = compiled.serialize();

    let mut signatures = Vec::with_capacity(required);
    for key in &compiled.account_keys[..required] {
        let holder = key_holders
            .iter()
            .find(|holder| holder.pubkey() == *key)
            .ok_or(PipelineError::MissingSigner(*key))?;
        let signature = holder
            .try_sign_message(&message_bytes)
            .map_err(|e| PipelineError::internal(format!("signer {} failed: {}", key, e)))?;
        signatures.push(signature);
    }

    Ok(SignedTx {
        message: message.clone(),
        transaction: Transaction {
            signatures,
            message: compiled,
        },
    })
}
