//! Wallet session context
//!
//! The connected address is an explicit value threaded into every flow
//! that needs it, never ambient global state. A session is created on
//! connect and replaced wholesale on account change, so stale flows can
//! detect they were built against a superseded session.

use chrono::{DateTime, Utc};

use crate::types::Address;

/// One wallet connection: the current address plus when it was established
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    address: Address,
    connected_at: DateTime<Utc>,
}

impl WalletSession {
    /// Establish a session for a freshly connected address
    pub fn connect(address: Address) -> Self {
        Self {
            address,
            connected_at: Utc::now(),
        }
    }

    /// The address every flow in this session acts as
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Replace this session after an account-change notification
    ///
    /// Returns a new session; the old value is invalid and must not be
    /// threaded into further flows.
    pub fn switch_account(self, address: Address) -> Self {
        Self::connect(address)
    }
}
