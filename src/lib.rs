//! Kasbah harness library
//!
//! Transaction submission and confirmation for a blockhash-windowed ledger:
//! fund a key, stamp a message with a validity anchor, sign, submit, and race
//! a signature subscription against status polling until the transaction is
//! confirmed, rejected, or its blockhash expires (in which case it is rebuilt).

pub mod config;
pub mod confirm;
pub mod errors;
pub mod explorer;
pub mod funding;
pub mod ledger;
pub mod metrics;
pub mod pipeline;
pub mod scenario;
pub mod structured_logging;
pub mod submit;
pub mod test_utils;
pub mod tx_builder;
pub mod types;
pub mod wallet;
pub mod window;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::Config;
pub use errors::PipelineError;
pub use pipeline::{Confirmation, RetryPolicy, TransactionPipeline};
pub use types::{Commitment, ConfirmationState, SubmitOptions, TransactionId, ValidityAnchor};
