//! Spaces Client - Transaction Construction and Submission Engine
//!
//! Client-side library for the spaces VM: cost previews, address and
//! space-name validation, fee estimation, signing, and tracked submission
//! of ledger transactions.

pub mod address;
pub mod client;
pub mod config;
pub mod cost;
pub mod endpoints;
pub mod metrics;
pub mod observability;
pub mod session;
pub mod types;

// Submission flow supercomponent
pub mod tx_flow;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use client::{ClientError, LedgerRpc, VmClient};
pub use session::WalletSession;
pub use tx_flow::{
    AttemptEvent, AttemptSnapshot, FlowError, LocalSigner, PayloadSigner, SubmitEngine, TxBuilder,
};
pub use types::{Address, AttemptId, AttemptState, Intent, SpaceId, SpaceInfo};
