// src/telemetry.rs
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "tender_watch=info,notify_check=info,warn";

/// Install the global tracing subscriber. `LOG_FORMAT=json` switches to
/// one JSON object per line; anything else gives the compact formatter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// One-time metric descriptions, so series carry help text once scraped.
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tender_fetch_total", "Listing fetch attempts.");
        describe_counter!("tender_fetch_errors_total", "Failed listing fetches.");
        describe_histogram!("tender_fetch_ms", "Successful fetch duration in milliseconds.");
        describe_counter!("tender_cycles_total", "Listings processed by the dispatcher.");
        describe_counter!(
            "tender_new_matches_total",
            "Keyword-matching tenders seen for the first time."
        );
        describe_counter!(
            "tender_notifications_sent_total",
            "Messages delivered, per channel."
        );
        describe_counter!(
            "tender_notifications_failed_total",
            "Messages a channel failed to deliver."
        );
        describe_gauge!("tender_seen_total", "Size of the in-memory seen set.");
        describe_gauge!("tender_last_cycle_ts", "Unix ts of the last processed cycle.");
    });
}

/// Serve Prometheus metrics on `addr`. Must run inside a tokio runtime.
pub fn install_prometheus(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter on {addr}: {e}"))?;
    describe_metrics();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}
