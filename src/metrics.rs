//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub attempts_started: IntCounter,
    pub attempts_accepted: IntCounter,
    pub attempts_failed: IntCounter,
    pub attempts_retried: IntCounter,
    pub signer_declines: IntCounter,

    // Histograms
    pub rpc_latency: Histogram,
    pub attempt_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let attempts_started = IntCounter::with_opts(Opts::new(
            "attempts_started",
            "Submission attempts started",
        ))?;

        let attempts_accepted = IntCounter::with_opts(Opts::new(
            "attempts_accepted",
            "Submission attempts accepted by the ledger",
        ))?;

        let attempts_failed = IntCounter::with_opts(Opts::new(
            "attempts_failed",
            "Submission attempts that ended in a retryable failure",
        ))?;

        let attempts_retried = IntCounter::with_opts(Opts::new(
            "attempts_retried",
            "Explicit user retries of failed attempts",
        ))?;

        let signer_declines = IntCounter::with_opts(Opts::new(
            "signer_declines",
            "Attempts silently abandoned because no signature was obtained",
        ))?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "Ledger RPC call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let attempt_latency = Histogram::with_opts(
            HistogramOpts::new(
                "attempt_latency_seconds",
                "Confirm-to-terminal latency of submission attempts",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0]),
        )?;

        registry.register(Box::new(attempts_started.clone()))?;
        registry.register(Box::new(attempts_accepted.clone()))?;
        registry.register(Box::new(attempts_failed.clone()))?;
        registry.register(Box::new(attempts_retried.clone()))?;
        registry.register(Box::new(signer_declines.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(attempt_latency.clone()))?;

        Ok(Self {
            registry,
            attempts_started,
            attempts_accepted,
            attempts_failed,
            attempts_retried,
            signer_declines,
            rpc_latency,
            attempt_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}
