//! Transaction building
//!
//! Turns opaque program instructions into a signed, wire-ready transaction:
//! - **message**: assembles fee payer, validity anchor and ordered
//!   instructions into an immutable [`TxMessage`]
//! - **signer**: signs a message with a set of key holders into a [`SignedTx`]
//! - **instructions**: typed instruction builders for the kasbah program
//!
//! Instruction order is execution order. Nothing in this module reorders,
//! deduplicates or merges instructions.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use kasbah_harness::tx_builder::{hello_instruction, kasbah_program_id, sign, KeyHolder, TxMessage};
//! use kasbah_harness::types::ValidityAnchor;
//! use solana_sdk::{hash::Hash, signature::{Keypair, Signer}};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), kasbah_harness::PipelineError> {
//! let payer = Keypair::new();
//! let anchor = ValidityAnchor::new(Hash::new_unique(), 1_000);
//! let ix = hello_instruction(&kasbah_program_id(), &payer.pubkey(), 1);
//!
//! let message = TxMessage::build(payer.pubkey(), anchor, vec![ix])?;
//! let holders: Vec<KeyHolder> = vec![Arc::new(payer)];
//! let signed = sign(&message, &holders)?;
//! println!("transaction id: {}", signed.id());
//! # Ok(())
//! # }
//! ```

pub mod instructions;
mod message;
mod signer;

pub use instructions::{hello_instruction, kasbah_program_id, HelloArgs, KASBAH_PROGRAM_ID};
pub use message::TxMessage;
pub use signer::{sign, transaction_id_from_wire, KeyHolder, SignedTx};
