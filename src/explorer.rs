//! Block explorer links for confirmed transactions

use crate::types::TransactionId;

/// RPC endpoint of a local test validator
pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";

/// Solana Explorer link on a public cluster (`devnet`, `testnet`, `mainnet-beta`)
pub fn explorer_url(id: &TransactionId, cluster: &str) -> String {
    format!("https://explorer.solana.com/tx/{}?cluster={}", id, cluster)
}

/// Solana Explorer link against the local validator
pub fn explorer_local_url(id: &TransactionId) -> String {
    format!(
        "https://explorer.solana.com/tx/{}?cluster=custom&customUrl={}",
        id, LOCAL_RPC_URL
    )
}

pub fn solscan_local_url(id: &TransactionId) -> String {
    format!(
        "https://solscan.io/tx/{}?cluster=custom&customUrl={}",
        id, LOCAL_RPC_URL
    )
}

pub fn solana_fm_local_url(id: &TransactionId) -> String {
    format!("https://solana.fm/tx/{}?cluster=localnet-solana", id)
}
