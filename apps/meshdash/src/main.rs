use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::{debug, info, warn, LevelFilter};
use meshdash_probe::{
    discover, launch, load_relay_table, SamplerSettings, TailscaleCli, DEFAULT_DERP_MAP_URL,
};
use meshdash_render::{Dashboard, RenderOutcome};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PAINT_INTERVAL: Duration = Duration::from_millis(200);
const RELAY_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "meshdash",
    version,
    about = "Live latency and path dashboard for online Tailscale peers"
)]
struct Cli {
    /// Path to the tailscale client binary
    #[arg(long, default_value = "tailscale")]
    tailscale: PathBuf,

    /// Where relay region names are looked up
    #[arg(long, default_value = DEFAULT_DERP_MAP_URL)]
    derp_map_url: String,

    /// Disable colors
    #[arg(long)]
    plain: bool,

    #[arg(
        long,
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug"]
    )]
    loglevel: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.loglevel);

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("could not install interrupt handler: {err}");
    }

    let relays = Arc::new(load_relay_table(&cli.derp_map_url, RELAY_FETCH_TIMEOUT));
    let client = Arc::new(TailscaleCli::new(cli.tailscale));

    let discovery = discover(client.as_ref());
    info!("sampling {} online peers", discovery.peers.len());

    let campaign = launch(&discovery, client, relays, SamplerSettings::default())?;

    let mut dashboard = Dashboard::new(io::stdout().lock(), cli.plain);
    let outcome = dashboard.run(campaign.store(), &interrupt, PAINT_INTERVAL)?;
    drop(dashboard);

    match outcome {
        RenderOutcome::Completed => {
            let store = campaign.join();
            info!(
                "sampled {} peers, finished at {}",
                store.len(),
                Local::now().format("%H:%M:%S")
            );
        }
        RenderOutcome::Interrupted => {
            debug!(
                "interrupted, leaving {} samplers behind",
                campaign.worker_count()
            );
        }
    }

    Ok(())
}

/// Logs go to stderr, on the same screen as the table.
fn init_logging(level: &str) {
    let level = level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}
