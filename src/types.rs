//! Common types used throughout the pipeline

use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, hash::Hash, signature::Signature};
use std::fmt;
use std::str::FromStr;

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert a whole-SOL amount into lamports
pub fn sol_to_lamports(sol: u64) -> u64 {
    sol.saturating_mul(LAMPORTS_PER_SOL)
}

/// Durability threshold a caller waits for
///
/// Ordered: `Processed < Confirmed < Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    /// Map onto the RPC commitment config
    pub fn to_config(self) -> CommitmentConfig {
        match self {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl Default for Commitment {
    fn default() -> Self {
        Commitment::Confirmed
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level '{}'", other)),
        }
    }
}

/// Validity window a transaction is stamped with
///
/// The transaction stays eligible for inclusion until the ledger's block
/// height passes `last_valid_block_height`. That height is a promise from the
/// RPC node, not a guarantee, so staleness has to be observed on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidityAnchor {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl ValidityAnchor {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
        }
    }

    /// True once `block_height` has moved past the window
    pub fn is_expired_at(&self, block_height: u64) -> bool {
        block_height > self.last_valid_block_height
    }
}

/// Correlation key for a submitted transaction
///
/// This is the fee payer's signature. ed25519 signatures are deterministic,
/// so re-signing identical message bytes yields the same id, while a new
/// blockhash always yields a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(Signature);

impl TransactionId {
    pub fn new(signature: Signature) -> Self {
        Self(signature)
    }

    pub fn signature(&self) -> &Signature {
        &self.0
    }
}

impl From<Signature> for TransactionId {
    fn from(signature: Signature) -> Self {
        Self(signature)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::from_str(s)
            .map(Self)
            .map_err(|e| format!("invalid transaction id '{}': {}", s, e))
    }
}

/// Where a submitted transaction stands on the ledger
///
/// Progress is monotonic. `Expired` and `Rejected` are absorbing and only
/// reachable before the transaction has been confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Processed,
    Confirmed,
    Finalized,
    Expired,
    Rejected(String),
}

impl ConfirmationState {
    fn rank(&self) -> u8 {
        match self {
            ConfirmationState::Pending => 0,
            ConfirmationState::Processed => 1,
            ConfirmationState::Confirmed => 2,
            ConfirmationState::Finalized => 3,
            ConfirmationState::Expired | ConfirmationState::Rejected(_) => 4,
        }
    }

    /// Fold a new observation into the current state
    ///
    /// Observations that would move the state backwards, or that are not
    /// reachable from the current state, are ignored.
    pub fn advance(self, observed: ConfirmationState) -> ConfirmationState {
        if self.is_terminal() {
            return self;
        }
        match observed {
            ConfirmationState::Expired | ConfirmationState::Rejected(_) => {
                let reachable = self == ConfirmationState::Pending
                    || (self == ConfirmationState::Processed
                        && matches!(observed, ConfirmationState::Rejected(_)));
                if reachable {
                    observed
                } else {
                    self
                }
            }
            _ if observed.rank() > self.rank() => observed,
            _ => self,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConfirmationState::Finalized
                | ConfirmationState::Expired
                | ConfirmationState::Rejected(_)
        )
    }

    /// Whether this state meets the requested commitment
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        match self {
            ConfirmationState::Processed => commitment == Commitment::Processed,
            ConfirmationState::Confirmed => commitment <= Commitment::Confirmed,
            ConfirmationState::Finalized => true,
            _ => false,
        }
    }

    /// The state a ledger reports once it has reached `commitment`
    pub fn from_commitment(commitment: Commitment) -> Self {
        match commitment {
            Commitment::Processed => ConfirmationState::Processed,
            Commitment::Confirmed => ConfirmationState::Confirmed,
            Commitment::Finalized => ConfirmationState::Finalized,
        }
    }
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationState::Pending => f.write_str("pending"),
            ConfirmationState::Processed => f.write_str("processed"),
            ConfirmationState::Confirmed => f.write_str("confirmed"),
            ConfirmationState::Finalized => f.write_str("finalized"),
            ConfirmationState::Expired => f.write_str("expired"),
            ConfirmationState::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

/// Options for forwarding a signed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    /// Skip the local simulation before forwarding
    #[serde(default)]
    pub skip_preflight: bool,

    /// Commitment the simulation runs against
    #[serde(default)]
    pub preflight_commitment: Commitment,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}
