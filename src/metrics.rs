//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub confirmations_total: IntCounter,
    pub expirations_total: IntCounter,
    pub rejections_total: IntCounter,
    pub timeouts_total: IntCounter,
    pub rebuilds_total: IntCounter,
    pub rebroadcasts_total: IntCounter,
    pub simulation_failures: IntCounter,
    pub airdrops_total: IntCounter,

    // Gauges
    pub active_trackers: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
    pub sign_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Transactions forwarded to the ledger",
        ))?;

        let confirmations_total = IntCounter::with_opts(Opts::new(
            "confirmations_total",
            "Transactions that reached the requested commitment",
        ))?;

        let expirations_total = IntCounter::with_opts(Opts::new(
            "expirations_total",
            "Transactions whose blockhash expired before processing",
        ))?;

        let rejections_total = IntCounter::with_opts(Opts::new(
            "rejections_total",
            "Transactions rejected by the ledger",
        ))?;

        let timeouts_total = IntCounter::with_opts(Opts::new(
            "timeouts_total",
            "Confirmation waits that hit their deadline",
        ))?;

        let rebuilds_total = IntCounter::with_opts(Opts::new(
            "rebuilds_total",
            "Messages rebuilt against a fresh blockhash",
        ))?;

        let rebroadcasts_total = IntCounter::with_opts(Opts::new(
            "rebroadcasts_total",
            "Identical transactions resent after a per-attempt timeout",
        ))?;

        let simulation_failures = IntCounter::with_opts(Opts::new(
            "simulation_failures_total",
            "Preflight simulations that failed",
        ))?;

        let airdrops_total =
            IntCounter::with_opts(Opts::new("airdrops_total", "Faucet airdrops requested"))?;

        let active_trackers = IntGauge::with_opts(Opts::new(
            "active_trackers",
            "Signatures currently being tracked",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to requested commitment",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let sign_latency = Histogram::with_opts(
            HistogramOpts::new("sign_latency_seconds", "Message compile and sign latency")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01]),
        )?;

        // Register all metrics
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(confirmations_total.clone()))?;
        registry.register(Box::new(expirations_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(timeouts_total.clone()))?;
        registry.register(Box::new(rebuilds_total.clone()))?;
        registry.register(Box::new(rebroadcasts_total.clone()))?;
        registry.register(Box::new(simulation_failures.clone()))?;
        registry.register(Box::new(airdrops_total.clone()))?;
        registry.register(Box::new(active_trackers.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(sign_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            confirmations_total,
            expirations_total,
            rejections_total,
            timeouts_total,
            rebuilds_total,
            rebroadcasts_total,
            simulation_failures,
            airdrops_total,
            active_trackers,
            confirmation_latency,
            rpc_latency,
            sign_latency,
        })
    }

    /// Render all metrics in the prometheus text format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Records the time until `finish` into one histogram
pub struct Timer {
    start: Instant,
    histogram: &'static Histogram,
}

impl Timer {
    pub fn start(histogram: &'static Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn finish(self) {
        self.histogram.observe(self.elapsed_secs());
    }
}
