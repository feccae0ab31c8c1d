//! Prometheus metrics for secrets-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "secrets_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for catalog operations by operation and status.
pub static CATALOG_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "secrets_catalog_operations_total",
        "Total number of catalog operations",
        &["operation", "status"]
    )
    .expect("Failed to register CATALOG_OPERATIONS")
});

/// Counter for reconciled import pairs by outcome.
pub static IMPORT_PAIRS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "secrets_import_pairs_total",
        "Total number of import pairs reconciled",
        &["outcome"]  // inserted, updated, skipped
    )
    .expect("Failed to register IMPORT_PAIRS")
});

/// Counter for import runs by status.
pub static IMPORT_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "secrets_import_runs_total",
        "Total number of import runs",
        &["status"]
    )
    .expect("Failed to register IMPORT_RUNS")
});

/// Counter for errors by type.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "secrets_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&CATALOG_OPERATIONS);
    Lazy::force(&IMPORT_PAIRS);
    Lazy::force(&IMPORT_RUNS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a catalog operation.
pub fn record_catalog_operation(operation: &str, status: &str) {
    CATALOG_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}

/// Record a reconciled import pair.
pub fn record_import_pair(outcome: &str) {
    IMPORT_PAIRS.with_label_values(&[outcome]).inc();
}

/// Record an import run.
pub fn record_import_run(status: &str) {
    IMPORT_RUNS.with_label_values(&[status]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
