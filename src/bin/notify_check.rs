//! Sends one test message through every configured channel and reports
//! per-channel results. Exits non-zero if any channel failed.

use anyhow::{bail, Context};
use chrono::Utc;
use tender_watch::config::AppConfig;
use tender_watch::{telemetry, Notification, NotifierMux};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    let mux = NotifierMux::from_config(&cfg);
    if mux.is_empty() {
        bail!("no notification channels configured");
    }

    let message = Notification::text(format!(
        "Mensaje de prueba de tender-watch ({})",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let d = mux.broadcast(&message).await;

    println!("delivered: {}/{}", d.delivered, mux.len());
    for (channel, err) in &d.failed {
        println!("  {channel}: {err}");
    }
    if !d.failed.is_empty() {
        bail!("{} channel(s) failed", d.failed.len());
    }
    Ok(())
}
