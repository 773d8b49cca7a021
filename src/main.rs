use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use enigma_adapters::http::ApiClient;
use enigma_adapters::ws::WsTransport;
use enigma_sync::{Session, SessionSnapshot, TokioScheduler};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use enigma_watch::data::duration::format_duration;
use enigma_watch::{export_to_file, Overview, Settings};

#[derive(Parser, Debug)]
#[command(name = "enigma-watch")]
#[command(about = "Headless live client for the Enigma situation-analysis stream")]
struct Args {
    /// Settings file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// REST API base URL (overrides ENIGMA_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Dashboard stream URL (overrides ENIGMA_WS_URL)
    #[arg(long)]
    ws_url: Option<String>,

    /// Upgrade ws:// to wss:// before connecting
    #[arg(long)]
    secure: bool,

    /// Seconds between overview summaries (0 disables)
    #[arg(short, long, default_value = "30")]
    summary_interval: u64,

    /// Write the final overview and snapshot to a JSON file on exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(url) = args.api_url.clone() {
        settings.api_url = url;
    }
    if let Some(url) = args.ws_url.clone() {
        settings.ws_url = url;
    }
    if args.secure {
        settings.secure_context = true;
    }

    // Build a tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(settings, args))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(settings: Settings, args: Args) -> Result<()> {
    let api = ApiClient::builder()
        .endpoint(settings.api_url.as_str())
        .timeout(settings.request_timeout()?)
        .build()
        .context("Invalid API endpoint")?;

    let session = Session::new(
        settings.session_config()?,
        Arc::new(WsTransport::new()),
        Arc::new(api),
        Arc::new(TokioScheduler::new()),
    );

    info!(
        stream = %session.connection().url(),
        api = %settings.api_url,
        "Starting session"
    );
    session.start();

    let summary_every =
        (args.summary_interval > 0).then(|| Duration::from_secs(args.summary_interval));
    let mut ticker = tokio::time::interval(summary_every.unwrap_or(Duration::from_secs(3600)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(err) = result {
                    warn!(error = %err, "Failed to listen for Ctrl-C");
                }
                break;
            }
            _ = ticker.tick(), if summary_every.is_some() => {
                log_summary(&session.snapshot());
            }
        }
    }

    info!("Shutting down");
    let last = session.snapshot();
    session.shutdown();
    log_summary(&last);

    if let Some(path) = args.export {
        export_to_file(&last, &path)?;
        println!("Exported {} subjects to {}", last.store.len(), path.display());
    }

    Ok(())
}

fn log_summary(snapshot: &SessionSnapshot) {
    let overview = Overview::from_snapshot(&snapshot.store);
    let latency = snapshot
        .health
        .latency_ms
        .map(|ms| format_duration(Duration::from_millis(ms)))
        .unwrap_or_else(|| "-".to_string());
    let backend = snapshot
        .health
        .health
        .as_ref()
        .map(|h| h.status.as_str())
        .unwrap_or("unknown");

    info!(
        connection = snapshot.connection.state.label(),
        backend,
        latency = %latency,
        subjects = overview.subjects,
        fresh = overview.fresh,
        feed = overview.feed_len,
        critical = overview.threats.critical,
        escalating = overview.escalating,
        avg_confidence = %format!("{:.2}", overview.avg_confidence),
        "Overview"
    );

    for ranked in overview.top_by_anomaly.iter().take(3) {
        info!(
            subject = %ranked.label,
            anomaly = %format!("{:.2}", ranked.value),
            "{} {}",
            ranked.threat.symbol(),
            ranked.subject
        );
    }
}
