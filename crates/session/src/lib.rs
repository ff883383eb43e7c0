//! # boardroom-session
//!
//! Per-session state shared by every run in a session: a bounded window of
//! prior conversational turns and a per-model ledger of token usage with
//! its cost.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod memory;
pub mod pricing;
pub mod usage;

pub use error::{Error, Result};
pub use memory::{ChatMemoryStore, MemoryWindow};
pub use pricing::{Cost, PricingEntry, PricingTable};
pub use usage::{ModelCost, ModelUsage, UsageAccountant};
