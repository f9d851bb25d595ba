//! discord-signal-relay — Binary Entrypoint
//! Loads configuration, wires the engine and drives the poll loop until
//! Ctrl-C. Startup failures print a diagnostic chain and exit non-zero;
//! steady-state failures are logged and never terminate the process.

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use discord_signal_relay::config::Config;
use discord_signal_relay::dispatch::{build_destinations, Dispatcher};
use discord_signal_relay::engine::Engine;
use discord_signal_relay::ingest::discord::DiscordChannel;
use discord_signal_relay::state::CursorStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("discord_signal_relay=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the vars come from the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::from_env().context("startup configuration")?;

    info!(
        quote = %cfg.trade.quote,
        poll_base_secs = cfg.poll.base_secs,
        jitter_max_secs = cfg.poll.jitter_max_secs,
        cooldown_secs = cfg.cooldown_secs,
        destinations = cfg.destinations.len(),
        "discord-signal-relay starting"
    );
    if cfg.dry_run {
        warn!("DRY_RUN active: payloads are built but never delivered");
    }

    let source = DiscordChannel::new(cfg.channel.token.clone(), cfg.channel.channel_id.clone());
    let destinations = build_destinations(&cfg);
    let dispatcher = Dispatcher::new(cfg.dry_run);
    let store = CursorStore::new(&cfg.state_file);

    let mut engine = Engine::new(
        source,
        destinations,
        dispatcher,
        store,
        cfg.cooldown_secs,
        cfg.fetch_limit,
    );
    engine.seed_baseline().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    engine.run(shutdown_rx, cfg.poll).await;
    Ok(())
}
