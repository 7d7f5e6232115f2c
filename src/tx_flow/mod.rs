//! Submission flow supercomponent
//!
//! Everything between a confirmed user intent and a terminal outcome on
//! the ledger:
//! - **errors**: flow error taxonomy with retryability classification
//! - **builder**: intent → canonical signable payload via remote fee
//!   estimation
//! - **signer**: the external signing gateway and a local deterministic
//!   implementation
//! - **engine**: the per-attempt state machine
//!   (`Idle → Building → AwaitingSignature → Submitting → Done | Failed`)
//!   with explicit, user-driven retry

pub mod builder;
pub mod engine;
pub mod errors;
pub mod signer;

pub use builder::TxBuilder;
pub use engine::{AttemptEvent, AttemptSnapshot, RefreshFn, SubmitEngine};
pub use errors::FlowError;
pub use signer::{LocalSigner, PayloadSigner};
