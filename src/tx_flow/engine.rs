//! Submission engine: the per-attempt state machine
//!
//! Sequences validate → build → sign → submit for one intent at a time
//! and reports every state change to subscribers. Failures are terminal
//! until the user explicitly retries; a retry re-runs the whole sequence
//! from scratch so no stale payload or fee is ever resubmitted. Late
//! results from superseded runs are gated on a per-run epoch, never on
//! payload equality.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::client::LedgerRpc;
use crate::cost;
use crate::metrics::metrics;
use crate::observability::CorrelationId;
use crate::session::WalletSession;
use crate::tx_flow::builder::TxBuilder;
use crate::tx_flow::errors::FlowError;
use crate::tx_flow::signer::PayloadSigner;
use crate::types::{Address, AttemptId, AttemptState, Intent};

/// Caller-supplied refresh hook, run exactly once on acceptance
pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// One state change of one attempt
#[derive(Debug, Clone)]
pub struct AttemptEvent {
    pub id: AttemptId,
    pub state: AttemptState,
    /// Present only when `state == Failed`
    pub error: Option<String>,
}

/// Point-in-time view of an attempt
#[derive(Debug, Clone)]
pub struct AttemptSnapshot {
    pub id: AttemptId,
    pub intent: Intent,
    pub state: AttemptState,
    pub last_error: Option<String>,
    /// Whether the last failure may be retried; `false` while no failure
    /// is recorded
    pub retryable: bool,
    pub correlation: CorrelationId,
}

struct Attempt {
    intent: Intent,
    from: Address,
    state: AttemptState,
    last_error: Option<String>,
    retryable: bool,
    refresh: Option<RefreshFn>,
    /// Bumped on every retry/abandon; transitions carrying a stale epoch
    /// are dropped
    epoch: u64,
    correlation: CorrelationId,
    started: Instant,
}

/// Drives confirmed intents through the ledger submission lifecycle
pub struct SubmitEngine {
    builder: TxBuilder,
    rpc: Arc<dyn LedgerRpc>,
    signer: Arc<dyn PayloadSigner>,
    attempts: DashMap<AttemptId, Attempt>,
    events: broadcast::Sender<AttemptEvent>,
}

impl SubmitEngine {
    pub fn new(rpc: Arc<dyn LedgerRpc>, signer: Arc<dyn PayloadSigner>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            builder: TxBuilder::new(Arc::clone(&rpc)),
            rpc,
            signer,
            attempts: DashMap::new(),
            events,
        })
    }

    /// Subscribe to attempt state changes
    ///
    /// Subscribe before calling [`submit`](Self::submit) to observe the
    /// full lifecycle.
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.events.subscribe()
    }

    /// Suggested total cost for an intent, for preview display
    ///
    /// Repeated calls with unchanged ledger state return identical fees.
    pub async fn preview_cost(&self, intent: &Intent) -> Result<u64, FlowError> {
        self.builder.preview_cost(intent).await
    }

    /// Confirm an intent and start a submission attempt
    ///
    /// Returns immediately; progress is reported through the event
    /// channel. `refresh` runs exactly once if the ledger accepts.
    pub fn submit(
        self: &Arc<Self>,
        session: &WalletSession,
        intent: Intent,
        refresh: Option<RefreshFn>,
    ) -> AttemptId {
        let id = AttemptId::new();
        let correlation = CorrelationId::new();
        debug!(attempt = %id, correlation = %correlation, kind = intent.kind(), "attempt confirmed");
        self.attempts.insert(
            id,
            Attempt {
                intent,
                from: session.address().clone(),
                state: AttemptState::Idle,
                last_error: None,
                retryable: false,
                refresh,
                epoch: 0,
                correlation,
                started: Instant::now(),
            },
        );
        metrics().attempts_started.inc();
        self.spawn_run(id, 0);
        id
    }

    /// Explicit user retry of a failed attempt
    ///
    /// Re-runs the full validate→build→sign→submit sequence with a fresh
    /// fee estimate. Never automatic; errors if the attempt is not in
    /// `Failed` or its failure was classified non-retryable.
    pub fn retry(self: &Arc<Self>, id: AttemptId) -> Result<(), FlowError> {
        let epoch = {
            let mut entry = self
                .attempts
                .get_mut(&id)
                .ok_or_else(|| FlowError::Validation(format!("unknown attempt {id}")))?;
            if entry.state != AttemptState::Failed {
                return Err(FlowError::Validation(format!(
                    "attempt {id} is not in a failed state"
                )));
            }
            if !entry.retryable {
                return Err(FlowError::Validation(format!(
                    "attempt {id} failed with a non-retryable error"
                )));
            }
            entry.epoch += 1;
            entry.last_error = None;
            entry.retryable = false;
            entry.started = Instant::now();
            entry.epoch
        };
        metrics().attempts_retried.inc();
        self.spawn_run(id, epoch);
        Ok(())
    }

    /// Abandon an attempt that has not reached a terminal state (host
    /// dialog dismissed)
    ///
    /// An already-issued signer request cannot be cancelled, but its late
    /// result is suppressed: the epoch is bumped so the stale run can no
    /// longer transition this attempt. Covers `Idle` too, so a dismissal
    /// racing the spawned run is not lost.
    pub fn abandon(&self, id: AttemptId) {
        let abandoned = {
            match self.attempts.get_mut(&id) {
                Some(mut entry)
                    if !matches!(entry.state, AttemptState::Done | AttemptState::Failed) =>
                {
                    entry.epoch += 1;
                    entry.state = AttemptState::Idle;
                    true
                }
                _ => false,
            }
        };
        if abandoned {
            debug!(attempt = %id, "attempt abandoned");
            let _ = self.events.send(AttemptEvent {
                id,
                state: AttemptState::Idle,
                error: None,
            });
        }
    }

    /// Current view of an attempt, if it exists
    pub fn attempt(&self, id: AttemptId) -> Option<AttemptSnapshot> {
        self.attempts.get(&id).map(|a| AttemptSnapshot {
            id,
            intent: a.intent.clone(),
            state: a.state,
            last_error: a.last_error.clone(),
            retryable: a.retryable,
            correlation: a.correlation.clone(),
        })
    }

    fn spawn_run(self: &Arc<Self>, id: AttemptId, epoch: u64) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run(id, epoch).await;
        });
    }

    async fn run(&self, id: AttemptId, epoch: u64) {
        let (intent, from) = match self.attempts.get(&id) {
            Some(a) if a.epoch == epoch => (a.intent.clone(), a.from.clone()),
            _ => return,
        };

        // Enter Building before any remote call so the attempt reads as
        // in flight for the whole validate-and-build span
        if !self.transition(id, epoch, AttemptState::Building) {
            return;
        }

        // Local validation against the freshest ledger figures; nothing
        // invalid ever reaches a build
        if let Err(err) = self.validate(&from, &intent).await {
            self.fail(id, epoch, err);
            return;
        }
        if !self.is_current(id, epoch) {
            return;
        }
        let payload = match self.builder.build(&intent).await {
            Ok(p) => p,
            Err(err) => {
                self.fail(id, epoch, err);
                return;
            }
        };

        if !self.transition(id, epoch, AttemptState::AwaitingSignature) {
            return;
        }
        let Some(signature) = self.signer.sign(&payload).await else {
            // Silent abandonment: not a failure, no notification beyond
            // the return to Idle
            metrics().signer_declines.inc();
            self.transition(id, epoch, AttemptState::Idle);
            return;
        };

        if !self.transition(id, epoch, AttemptState::Submitting) {
            return;
        }
        match self.rpc.issue_tx(&payload, &signature).await {
            Ok(result) if result.accepted => {
                if self.transition(id, epoch, AttemptState::Done) {
                    metrics().attempts_accepted.inc();
                    let refresh = self.attempts.get(&id).and_then(|a| a.refresh.clone());
                    if let Some(refresh) = refresh {
                        refresh();
                    }
                }
            }
            Ok(_) => self.fail(
                id,
                epoch,
                FlowError::Submission("ledger rejected the transaction".to_string()),
            ),
            Err(err) => self.fail(id, epoch, FlowError::Submission(err.to_string())),
        }
    }

    async fn validate(&self, from: &Address, intent: &Intent) -> Result<(), FlowError> {
        match intent {
            Intent::Transfer { units, .. } => {
                if *units == 0 {
                    return Err(FlowError::Validation(
                        "transfer amount must be positive".to_string(),
                    ));
                }
                // Re-derive the maximum from a fresh balance; preview-time
                // figures may be stale by now
                let balance = self.rpc.balance(from).await.map_err(FlowError::from)?;
                let max = cost::max_transfer_amount(balance);
                if *units > max {
                    return Err(FlowError::Validation(format!(
                        "amount {units} exceeds the spendable maximum {max}"
                    )));
                }
                Ok(())
            }
            Intent::Lifeline { units, .. } => {
                if *units == 0 {
                    return Err(FlowError::Validation(
                        "lifeline must add at least one unit".to_string(),
                    ));
                }
                Ok(())
            }
            Intent::Set { key, .. } | Intent::Delete { key, .. } => {
                if key.is_empty() {
                    return Err(FlowError::Validation("key must not be empty".to_string()));
                }
                Ok(())
            }
            Intent::Claim { .. } | Intent::Move { .. } => Ok(()),
        }
    }

    /// Whether a run still owns its attempt
    fn is_current(&self, id: AttemptId, epoch: u64) -> bool {
        self.attempts
            .get(&id)
            .map(|a| a.epoch == epoch)
            .unwrap_or(false)
    }

    /// Apply a state change if the run is still current; returns false
    /// when the transition was suppressed as stale
    fn transition(&self, id: AttemptId, epoch: u64, state: AttemptState) -> bool {
        let elapsed = {
            let mut entry = match self.attempts.get_mut(&id) {
                Some(e) => e,
                None => return false,
            };
            if entry.epoch != epoch {
                debug!(attempt = %id, ?state, "suppressed late transition");
                return false;
            }
            entry.state = state;
            entry.started.elapsed()
        };
        if state == AttemptState::Done {
            metrics().attempt_latency.observe(elapsed.as_secs_f64());
        }
        debug!(attempt = %id, ?state, "attempt state change");
        let _ = self.events.send(AttemptEvent {
            id,
            state,
            error: None,
        });
        true
    }

    fn fail(&self, id: AttemptId, epoch: u64, err: FlowError) {
        let message = err.to_string();
        {
            let mut entry = match self.attempts.get_mut(&id) {
                Some(e) => e,
                None => return,
            };
            if entry.epoch != epoch {
                debug!(attempt = %id, "suppressed late failure");
                return;
            }
            entry.state = AttemptState::Failed;
            entry.last_error = Some(message.clone());
            entry.retryable = err.is_retryable();
        }
        warn!(attempt = %id, category = err.category(), error = %message, "attempt failed");
        metrics().attempts_failed.inc();
        let _ = self.events.send(AttemptEvent {
            id,
            state: AttemptState::Failed,
            error: Some(message),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockLedger, MockSigner};
    use crate::types::SpaceId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn session() -> WalletSession {
        WalletSession::connect(
            Address::parse("0x32aE588dEB2ea3acfEcB1E702c0Eb10108f5a7D8").unwrap(),
        )
    }

    fn transfer(units: u64) -> Intent {
        Intent::Transfer {
            to: Address::parse("0x0000000000000000000000000000000000000001").unwrap(),
            units,
        }
    }

    /// Collect events for `id` until a non-in-flight state arrives
    async fn collect_until_settled(
        rx: &mut broadcast::Receiver<AttemptEvent>,
        id: AttemptId,
    ) -> Vec<AttemptEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for attempt event")
                .expect("event channel closed");
            if event.id != id {
                continue;
            }
            let state = event.state;
            seen.push(event);
            if !state.is_in_flight() {
                return seen;
            }
        }
    }

    fn states(events: &[AttemptEvent]) -> Vec<AttemptState> {
        events.iter().map(|e| e.state).collect()
    }

    #[tokio::test]
    async fn test_happy_path_runs_refresh_exactly_once() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&refreshes);
        let id = engine.submit(
            &session(),
            transfer(1_000),
            Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(
            states(&events),
            vec![
                AttemptState::Building,
                AttemptState::AwaitingSignature,
                AttemptState::Submitting,
                AttemptState::Done,
            ]
        );
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.issue_calls(), 1);
    }

    #[tokio::test]
    async fn test_signer_decline_returns_to_idle_silently() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigner::declining());
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(1_000), None);
        let events = collect_until_settled(&mut rx, id).await;

        assert_eq!(
            states(&events),
            vec![
                AttemptState::Building,
                AttemptState::AwaitingSignature,
                AttemptState::Idle,
            ]
        );
        // no failure was reported and nothing reached the ledger
        assert!(events.iter().all(|e| e.error.is_none()));
        assert_eq!(ledger.issue_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_then_retry_requests_fresh_estimate() {
        let ledger = Arc::new(MockLedger::new().with_issue_plan(vec![false, true]));
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(1_000), None);
        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(events.last().unwrap().state, AttemptState::Failed);
        assert!(events.last().unwrap().error.is_some());
        assert_eq!(ledger.estimate_calls(), 1);

        engine.retry(id).unwrap();
        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(events.last().unwrap().state, AttemptState::Done);
        // retry rebuilt from scratch instead of reusing the stale payload
        assert_eq!(ledger.estimate_calls(), 2);
        assert_eq!(ledger.issue_calls(), 2);
    }

    #[tokio::test]
    async fn test_over_limit_transfer_never_reaches_build() {
        let ledger = Arc::new(MockLedger::new().with_balance(5_000));
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer.clone());
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(10_000), None);
        let events = collect_until_settled(&mut rx, id).await;

        assert_eq!(events.last().unwrap().state, AttemptState::Failed);
        assert_eq!(ledger.estimate_calls(), 0);
        assert_eq!(signer.sign_calls(), 0);
        let snapshot = engine.attempt(id).unwrap();
        assert!(snapshot.last_error.unwrap().contains("spendable maximum"));
    }

    #[tokio::test]
    async fn test_amount_within_fresh_maximum_is_allowed() {
        let ledger = Arc::new(MockLedger::new().with_balance(5_000));
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(5_000 - cost::TRANSFER_COST), None);
        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(events.last().unwrap().state, AttemptState::Done);
    }

    #[tokio::test]
    async fn test_retry_requires_failed_state() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger, signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(1_000), None);
        let _ = collect_until_settled(&mut rx, id).await;

        // Done is terminal for this attempt
        assert!(engine.retry(id).is_err());
        assert!(engine.retry(AttemptId::new()).is_err());
    }

    #[tokio::test]
    async fn test_abandon_during_validation_never_submits() {
        // balance check is still pending when the dialog is dismissed
        let ledger = Arc::new(MockLedger::new().with_balance_delay(Duration::from_millis(100)));
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer.clone());
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(1_000), None);
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if event.id == id && event.state == AttemptState::Building {
                break;
            }
        }

        engine.abandon(id);
        // give the stale run time to finish its balance call
        tokio::time::sleep(Duration::from_millis(300)).await;

        let snapshot = engine.attempt(id).unwrap();
        assert_eq!(snapshot.state, AttemptState::Idle);
        assert_eq!(ledger.estimate_calls(), 0);
        assert_eq!(signer.sign_calls(), 0);
        assert_eq!(ledger.issue_calls(), 0);
    }

    #[tokio::test]
    async fn test_abandon_before_first_transition_never_submits() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer);

        // abandon in the same tick as submit, before the spawned run has
        // had a chance to leave Idle
        let id = engine.submit(&session(), transfer(1_000), None);
        engine.abandon(id);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = engine.attempt(id).unwrap();
        assert_eq!(snapshot.state, AttemptState::Idle);
        assert_eq!(ledger.issue_calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_retryable() {
        let ledger = Arc::new(MockLedger::new().with_balance(5_000));
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(10_000), None);
        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(events.last().unwrap().state, AttemptState::Failed);

        let snapshot = engine.attempt(id).unwrap();
        assert!(!snapshot.retryable);
        assert!(engine.retry(id).is_err());
        // the refused retry spawned nothing
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ledger.estimate_calls(), 0);
    }

    #[tokio::test]
    async fn test_abandon_suppresses_late_signature() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigner::new().with_delay(Duration::from_millis(50)));
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(&session(), transfer(1_000), None);
        // wait until the flow is parked on the signer
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if event.id == id && event.state == AttemptState::AwaitingSignature {
                break;
            }
        }

        engine.abandon(id);
        // give the stale run time to receive its signature
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = engine.attempt(id).unwrap();
        assert_eq!(snapshot.state, AttemptState::Idle);
        assert_eq!(ledger.issue_calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_failures_for_other_intents() {
        let ledger = Arc::new(MockLedger::new());
        let signer = Arc::new(MockSigner::new());
        let engine = SubmitEngine::new(ledger.clone(), signer);
        let mut rx = engine.subscribe();

        let id = engine.submit(
            &session(),
            Intent::Lifeline {
                space: SpaceId::parse("demo").unwrap(),
                units: 0,
            },
            None,
        );
        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(events.last().unwrap().state, AttemptState::Failed);
        assert_eq!(ledger.estimate_calls(), 0);

        let id = engine.submit(
            &session(),
            Intent::Set {
                space: SpaceId::parse("demo").unwrap(),
                key: String::new(),
                value: "v".to_string(),
            },
            None,
        );
        let events = collect_until_settled(&mut rx, id).await;
        assert_eq!(events.last().unwrap().state, AttemptState::Failed);
    }
}
