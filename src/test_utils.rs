//! Deterministic stand-ins for the remote collaborators
//!
//! `MockLedger` and `MockSigner` implement the same traits the production
//! client and signer do, with scriptable outcomes and call counters so
//! tests can assert exactly what reached the wire. Compiled only for
//! tests or with the `test_utils` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{ClientError, LedgerRpc};
use crate::tx_flow::signer::PayloadSigner;
use crate::types::{
    Address, Intent, SignablePayload, SpaceId, SpaceInfo, SubmissionResult, SuggestedFee,
    TxSignature,
};

/// Scriptable in-memory ledger
///
/// Defaults: every estimate succeeds with `total_cost = 250`, every
/// submission is accepted, every balance query returns 1_000_000, and no
/// space is claimed.
pub struct MockLedger {
    total_cost: AtomicU64,
    balance: AtomicU64,
    balance_delay: Mutex<Option<Duration>>,
    estimate_fails: AtomicBool,
    /// Per-call acceptance outcomes; once exhausted, submissions are
    /// accepted
    issue_plan: Mutex<VecDeque<bool>>,
    spaces: Mutex<Vec<(SpaceId, SpaceInfo)>>,
    estimate_calls: AtomicUsize,
    issue_calls: AtomicUsize,
    balance_calls: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            total_cost: AtomicU64::new(250),
            balance: AtomicU64::new(1_000_000),
            balance_delay: Mutex::new(None),
            estimate_fails: AtomicBool::new(false),
            issue_plan: Mutex::new(VecDeque::new()),
            spaces: Mutex::new(Vec::new()),
            estimate_calls: AtomicUsize::new(0),
            issue_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_total_cost(self, total_cost: u64) -> Self {
        self.total_cost.store(total_cost, Ordering::SeqCst);
        self
    }

    pub fn with_balance(self, balance: u64) -> Self {
        self.balance.store(balance, Ordering::SeqCst);
        self
    }

    /// Delay every balance response, for races around abandonment
    pub fn with_balance_delay(self, delay: Duration) -> Self {
        *self.balance_delay.lock() = Some(delay);
        self
    }

    pub fn with_estimate_failure(self) -> Self {
        self.estimate_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_issue_plan(self, accepted: Vec<bool>) -> Self {
        *self.issue_plan.lock() = accepted.into();
        self
    }

    pub fn with_space(self, space: SpaceId, info: SpaceInfo) -> Self {
        self.spaces.lock().push((space, info));
        self
    }

    pub fn estimate_calls(&self) -> usize {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub fn issue_calls(&self) -> usize {
        self.issue_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn suggested_fee(&self, intent: &Intent) -> Result<SuggestedFee, ClientError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        if self.estimate_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Protocol("estimator unavailable".to_string()));
        }
        let total_cost = self.total_cost.load(Ordering::SeqCst);
        // byte layout mimics the real estimator: the intent embedded in a
        // typed-data envelope with the fee baked in
        let message = serde_json::to_string(intent).expect("intent serializes");
        let raw = format!(r#"{{"message":{message},"fee":{total_cost}}}"#);
        Ok(SuggestedFee {
            typed_data: SignablePayload::from_raw(raw),
            total_cost,
        })
    }

    async fn issue_tx(
        &self,
        _payload: &SignablePayload,
        _signature: &TxSignature,
    ) -> Result<SubmissionResult, ClientError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        let accepted = self.issue_plan.lock().pop_front().unwrap_or(true);
        Ok(SubmissionResult {
            accepted,
            tx_id: accepted.then(|| "mock-tx".to_string()),
        })
    }

    async fn space_info(&self, space: &SpaceId) -> Result<Option<SpaceInfo>, ClientError> {
        Ok(self
            .spaces
            .lock()
            .iter()
            .find(|(s, _)| s == space)
            .map(|(_, info)| info.clone()))
    }

    async fn balance(&self, _address: &Address) -> Result<u64, ClientError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.balance_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.balance.load(Ordering::SeqCst))
    }
}

/// Scriptable signer: signs with a fixed byte pattern, declines on demand
pub struct MockSigner {
    decline: AtomicBool,
    delay: Mutex<Option<Duration>>,
    sign_calls: AtomicUsize,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            decline: AtomicBool::new(false),
            delay: Mutex::new(None),
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// A signer whose user always dismisses the request
    pub fn declining() -> Self {
        let signer = Self::new();
        signer.decline.store(true, Ordering::SeqCst);
        signer
    }

    /// Delay every response, for races around abandonment
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayloadSigner for MockSigner {
    async fn sign(&self, _payload: &SignablePayload) -> Option<TxSignature> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.decline.load(Ordering::SeqCst) {
            None
        } else {
            Some(TxSignature::from_bytes(vec![0x42; 64]))
        }
    }
}
