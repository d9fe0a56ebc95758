//! Prometheus metrics for executor operations
//!
//! # Available Metrics
//!
//! - `brickops_operations_total{operation, status}` - Counter of executor operations
//! - `brickops_operation_duration_seconds{operation}` - Histogram of operation durations
//! - `brickops_commands_total{host, status}` - Counter of command batches sent to nodes
//! - `brickops_active_operations` - Gauge of operations in flight
//!
//! # Example
//!
//! ```
//! use brickops::metrics::ExecutorMetrics;
//! use std::time::Duration;
//!
//! let metrics = ExecutorMetrics::new()?;
//! metrics.record_operation("volume_create", true, Duration::from_millis(1500));
//!
//! let text = metrics.render()?;
//! assert!(text.contains("brickops_operations_total"));
//! # Ok::<(), anyhow::Error>(())
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Histogram bucket boundaries for operation durations (in seconds)
///
/// Volume creation across many bricks and gluster's own CLI timeout put the
/// upper end in minutes.
const OPERATION_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0];

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failed"
    }
}

/// Metrics shared by every executor instance of a process
pub struct ExecutorMetrics {
    registry: Registry,
    operations: CounterVec,
    operation_duration: HistogramVec,
    commands: CounterVec,
    active_operations: Gauge,
}

impl ExecutorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations = CounterVec::new(
            Opts::new(
                "brickops_operations_total",
                "Total number of executor operations",
            ),
            &["operation", "status"],
        )?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "brickops_operation_duration_seconds",
                "Executor operation duration in seconds",
            )
            .buckets(OPERATION_DURATION_BUCKETS.to_vec()),
            &["operation"],
        )?;

        let commands = CounterVec::new(
            Opts::new(
                "brickops_commands_total",
                "Total number of command batches run on storage nodes",
            ),
            &["host", "status"],
        )?;

        let active_operations = Gauge::with_opts(Opts::new(
            "brickops_active_operations",
            "Executor operations in flight",
        ))?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(operation_duration.clone()))?;
        registry.register(Box::new(commands.clone()))?;
        registry.register(Box::new(active_operations.clone()))?;

        Ok(Self {
            registry,
            operations,
            operation_duration,
            commands,
            active_operations,
        })
    }

    /// Record a finished operation
    pub fn record_operation(&self, operation: &str, success: bool, duration: Duration) {
        self.operations
            .with_label_values(&[operation, status_label(success)])
            .inc();
        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record one command batch sent to `host`
    pub fn record_command(&self, host: &str, success: bool) {
        self.commands
            .with_label_values(&[host, status_label(success)])
            .inc();
    }

    pub fn inc_active_operations(&self) {
        self.active_operations.inc();
    }

    pub fn dec_active_operations(&self) {
        self.active_operations.dec();
    }

    /// Encode every metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
