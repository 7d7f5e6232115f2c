//! Ledger JSON-RPC client
//!
//! Thin typed wrapper over the spaces VM's public JSON-RPC endpoint:
//! fee estimation, signed submission, and the read-only snapshot/balance
//! queries. All flows talk to it through the [`LedgerRpc`] trait so tests
//! can substitute a deterministic stub.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::debug;

use crate::metrics::metrics;
use crate::types::{
    Address, Intent, SignablePayload, SpaceId, SpaceInfo, SubmissionResult, SuggestedFee,
    TxSignature,
};

/// Errors from the ledger RPC transport and protocol layer
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed ledger response: {0}")]
    Protocol(String),
}

/// Remote collaborator contract consumed by the submission flows
///
/// `suggested_fee` is authoritative over the canonical payload bytes and
/// the currently recommended fee; the client never invents either.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Ask the ledger for the canonical signable payload and suggested fee
    async fn suggested_fee(&self, intent: &Intent) -> Result<SuggestedFee, ClientError>;

    /// Submit a signed payload; `accepted == false` is a clean rejection
    async fn issue_tx(
        &self,
        payload: &SignablePayload,
        signature: &TxSignature,
    ) -> Result<SubmissionResult, ClientError>;

    /// Fetch the current snapshot of a space; `None` means unclaimed
    async fn space_info(&self, space: &SpaceId) -> Result<Option<SpaceInfo>, ClientError>;

    /// Fetch the spendable balance of an address
    async fn balance(&self, address: &Address) -> Result<u64, ClientError>;
}

/// HTTP JSON-RPC 2.0 client for the spaces VM
pub struct VmClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl VmClient {
    /// Build a client for `endpoint` with the given request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, ClientError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "ledger RPC call");
        let started = Instant::now();
        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        let envelope: RpcEnvelope<R> = response.json().await?;
        metrics().rpc_latency.observe(started.elapsed().as_secs_f64());

        if let Some(err) = envelope.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| ClientError::Protocol("missing result field".to_string()))
    }
}

#[async_trait]
impl LedgerRpc for VmClient {
    async fn suggested_fee(&self, intent: &Intent) -> Result<SuggestedFee, ClientError> {
        let result: SuggestedFeeResult = self
            .call("spacesvm.suggestedFee", &serde_json::json!({ "input": intent }))
            .await?;
        Ok(SuggestedFee {
            // RawValue keeps the estimator's exact bytes; the signature
            // will cover them verbatim
            typed_data: SignablePayload::from_raw(result.typed_data.get().to_string()),
            total_cost: result.total_cost,
        })
    }

    async fn issue_tx(
        &self,
        payload: &SignablePayload,
        signature: &TxSignature,
    ) -> Result<SubmissionResult, ClientError> {
        let typed_data = RawValue::from_string(payload.raw().to_string())?;
        let params = IssueTxParams {
            typed_data: &typed_data,
            signature: signature.to_hex(),
        };
        let result: IssueTxResult = self.call("spacesvm.issueTx", &params).await?;
        let accepted = result.success || result.tx_id.is_some();
        Ok(SubmissionResult {
            accepted,
            tx_id: result.tx_id,
        })
    }

    async fn space_info(&self, space: &SpaceId) -> Result<Option<SpaceInfo>, ClientError> {
        let result: Result<InfoResult, ClientError> = self
            .call("spacesvm.info", &serde_json::json!({ "space": space }))
            .await;
        match result {
            Ok(info) => Ok(info.info),
            // the VM reports unclaimed spaces as an RPC-level error
            Err(ClientError::Rpc { message, .. }) if message.contains("not found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn balance(&self, address: &Address) -> Result<u64, ClientError> {
        let result: BalanceResult = self
            .call("spacesvm.balance", &serde_json::json!({ "address": address }))
            .await?;
        Ok(result.balance)
    }
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestedFeeResult {
    typed_data: Box<RawValue>,
    total_cost: u64,
}

#[derive(Serialize)]
struct IssueTxParams<'a> {
    #[serde(rename = "typedData")]
    typed_data: &'a RawValue,
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueTxResult {
    #[serde(default)]
    tx_id: Option<String>,
    #[serde(default)]
    success: bool,
}

#[derive(Deserialize)]
struct InfoResult {
    #[serde(default)]
    info: Option<SpaceInfo>,
}

#[derive(Deserialize)]
struct BalanceResult {
    balance: u64,
}
