//! Transaction builder: intent → canonical signable payload
//!
//! The remote fee estimator is authoritative over the payload's byte
//! layout and the recommended fee; this builder only brokers the call and
//! classifies failures. It holds no mutable state, so `build` and
//! `preview_cost` are safe to invoke repeatedly and concurrently.

use std::sync::Arc;

use tracing::debug;

use crate::client::LedgerRpc;
use crate::tx_flow::errors::FlowError;
use crate::types::{Intent, SignablePayload, SuggestedFee};

/// Stateless bridge between a confirmed intent and the fee estimator
#[derive(Clone)]
pub struct TxBuilder {
    rpc: Arc<dyn LedgerRpc>,
}

impl TxBuilder {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    /// Fetch the canonical payload and suggested fee for `intent`
    pub async fn estimate(&self, intent: &Intent) -> Result<SuggestedFee, FlowError> {
        let fee = self
            .rpc
            .suggested_fee(intent)
            .await
            .map_err(|e| FlowError::FeeEstimation(e.to_string()))?;
        debug!(
            kind = intent.kind(),
            total_cost = fee.total_cost,
            "fee estimate obtained"
        );
        Ok(fee)
    }

    /// Build the signable payload for `intent`
    ///
    /// No local side effects; a fresh estimate is requested on every call
    /// so the payload always reflects the current recommended fee.
    pub async fn build(&self, intent: &Intent) -> Result<SignablePayload, FlowError> {
        Ok(self.estimate(intent).await?.typed_data)
    }

    /// Suggested total cost for `intent`, for UI preview
    ///
    /// Idempotent while the ledger state is unchanged.
    pub async fn preview_cost(&self, intent: &Intent) -> Result<u64, FlowError> {
        Ok(self.estimate(intent).await?.total_cost)
    }
}
