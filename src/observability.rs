use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: operation, status.
pub const REQUESTS_TOTAL: &str = "deskspace_requests_total";

/// Histogram: request latency in seconds. Labels: operation.
pub const REQUEST_DURATION_SECONDS: &str = "deskspace_request_duration_seconds";

/// Counter: rejected requests. Labels: kind (see `EngineError::kind`).
pub const REJECTIONS_TOTAL: &str = "deskspace_rejections_total";

/// Counter: reservations confirmed (single or batch slots).
pub const RESERVATIONS_CONFIRMED_TOTAL: &str = "deskspace_reservations_confirmed_total";

/// Counter: bookings refused because the room was already taken.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "deskspace_reservation_conflicts_total";

/// Counter: token verification failures.
pub const AUTH_FAILURES_TOTAL: &str = "deskspace_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of loaded companies.
pub const COMPANIES_ACTIVE: &str = "deskspace_companies_active";

/// Histogram: journal group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "deskspace_wal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "deskspace_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record the outcome of one service operation.
pub fn record<T>(operation: &'static str, started: std::time::Instant, result: &Result<T, crate::engine::EngineError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => {
            metrics::counter!(REJECTIONS_TOTAL, "kind" => e.kind()).increment(1);
            "error"
        }
    };
    metrics::counter!(REQUESTS_TOTAL, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
