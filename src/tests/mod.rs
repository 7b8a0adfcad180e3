//! Pipeline-level tests against the in-memory ledger

mod error_conversion_tests;
mod pipeline_scenario_tests;
