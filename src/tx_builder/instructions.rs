//! Typed instruction builders for the kasbah program
//!
//! These mirror what the IDL client generator emits: an 8-byte Anchor
//! discriminator (`sha256("global:<name>")[..8]`) followed by the
//! borsh-encoded arguments, plus the instruction's account list in IDL order.
//! The pipeline treats the resulting [`Instruction`] as opaque.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

/// Deployed kasbah program id
pub const KASBAH_PROGRAM_ID: &str = "ksb1AcDWRRawr7Amf9H7wCGtYvyVGNfbMvBPVAV6BJT";

/// Length of an Anchor instruction discriminator
pub const DISCRIMINATOR_LEN: usize = 8;

pub fn kasbah_program_id() -> Pubkey {
    Pubkey::from_str_const(KASBAH_PROGRAM_ID)
}

/// Anchor discriminator for a global instruction
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("global:{}", name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// Arguments of the `hello` instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloArgs {
    pub id: u8,
}

impl HelloArgs {
    fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + 1);
        data.extend_from_slice(&instruction_discriminator("hello"));
        data.push(self.id);
        data
    }
}

/// Build the `hello` instruction
///
/// Accounts, in IDL order:
/// 1. `signer` (signer, read-only)
/// 2. `system_program` (read-only)
pub fn hello_instruction(program_id: &Pubkey, signer: &Pubkey, id: u8) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*signer, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: HelloArgs { id }.encode(),
    }
}
