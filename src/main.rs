//! tender-watch — binary entrypoint.
//! Polls the tender listing, announces new keyword matches, and stops
//! cleanly on Ctrl+C or once the retry budget is exhausted.

use anyhow::Context;
use tender_watch::config::AppConfig;
use tender_watch::ingest::MercadoPublicoClient;
use tender_watch::{telemetry, Dispatcher, NotifierMux, PollLoop, StopReason};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;

    match cfg.metrics_addr {
        Some(addr) => telemetry::install_prometheus(addr)?,
        None => telemetry::describe_metrics(),
    }

    let source = MercadoPublicoClient::new(cfg.api_base_url.clone(), cfg.http_timeout)
        .context("building HTTP client")?;
    let mut poller = PollLoop::new(source, cfg.query_params(), cfg.poll);
    let mut dispatcher = Dispatcher::new(cfg.keywords.clone(), NotifierMux::from_config(&cfg));

    let stop = poller.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal, stopping gracefully...");
                stop.stop();
            }
            Err(e) => tracing::error!(error = %e, "cannot listen for Ctrl+C"),
        }
    });

    tracing::info!(
        period_secs = cfg.poll.period.as_secs(),
        max_retries = cfg.poll.max_retries,
        status = %cfg.tender_status,
        "tender-watch starting"
    );

    match dispatcher.run(&mut poller).await {
        StopReason::Cancelled => tracing::info!(
            cycles = dispatcher.cycle(),
            seen = dispatcher.seen().len(),
            "tender-watch stopped on request"
        ),
        StopReason::RetriesExhausted { attempts } => tracing::warn!(
            attempts,
            cycles = dispatcher.cycle(),
            "tender-watch gave up after consecutive fetch failures"
        ),
    }
    Ok(())
}
