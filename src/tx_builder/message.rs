//! Unsigned transaction messages

use solana_sdk::{instruction::Instruction, message::Message, pubkey::Pubkey};

use crate::errors::PipelineError;
use crate::types::ValidityAnchor;

/// Unsigned message: fee payer, validity anchor and ordered instructions
///
/// Immutable once built. A rebuild against a fresh anchor produces a new
/// message through [`TxMessage::with_anchor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMessage {
    fee_payer: Pubkey,
    anchor: ValidityAnchor,
    instructions: Vec<Instruction>,
}

impl TxMessage {
    /// Assemble a message
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInstructionSet`] when `instructions` is
    /// empty; a transaction without effect is never built.
    pub fn build(
        fee_payer: Pubkey,
        anchor: ValidityAnchor,
        instructions: Vec<Instruction>,
    ) -> Result<Self, PipelineError> {
        if instructions.is_empty() {
            return Err(PipelineError::EmptyInstructionSet);
        }
        Ok(Self {
            fee_payer,
            anchor,
            instructions,
        })
    }

    /// Same fee payer and instructions, stamped with a new anchor
    pub fn with_anchor(&self, anchor: ValidityAnchor) -> Self {
        Self {
            fee_payer: self.fee_payer,
            anchor,
            instructions: self.instructions.clone(),
        }
    }

    pub fn fee_payer(&self) -> &Pubkey {
        &self.fee_payer
    }

    pub fn anchor(&self) -> &ValidityAnchor {
        &self.anchor
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Accounts that must sign: the fee payer, then every `is_signer`
    /// account in order of first appearance
    pub fn required_signers(&self) -> Vec<Pubkey> {
        let mut signers = vec![self.fee_payer];
        for meta in self.instructions.iter().flat_map(|ix| ix.accounts.iter()) {
            if meta.is_signer && !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }

    /// Compile into the ledger's message format
    pub fn compile(&self) -> Message {
        Message::new_with_blockhash(
            &self.instructions,
            Some(&self.fee_payer),
            &self.anchor.blockhash,
        )
    }
}
