//! DICEBET: single-die betting service
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the store from its snapshot (or starts empty), serves the
//! API and persists the store again on shutdown.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use dicebet::api::{self, AppContext};
use dicebet::config;
use dicebet::game;
use dicebet::storage::{self, MemoryStore};

const BANNER: &str = r#"
 ____ ___ ____ _____ ____  _____ _____
|  _ \_ _/ ___| ____| __ )| ____|_   _|
| | | | | |   |  _| |  _ \|  _|   | |
| |_| | | |___| |___| |_) | |___  | |
|____/___\____|_____|____/|_____| |_|

  Small / large / exact-number dice, one die per bet
"#;

/// How often expired sessions are pruned and the snapshot refreshed.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load_with_env("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        host = %cfg.server.host,
        port = cfg.server.port,
        client_url = %cfg.server.client_url,
        min_bet = %cfg.game.min_bet,
        max_bet = %cfg.game.max_bet,
        seeded = cfg.game.dice_seed.is_some(),
        admin_enabled = cfg.accounts.admin_token.is_some(),
        "DICEBET starting up"
    );

    // -- Restore or create the store -------------------------------------

    let snapshot_path = cfg.storage.snapshot_path.clone();
    let store = match snapshot_path.as_deref() {
        Some(path) => match storage::load_snapshot(path)? {
            Some(snapshot) => Arc::new(MemoryStore::from_snapshot(snapshot)),
            None => Arc::new(MemoryStore::new()),
        },
        None => {
            info!("No snapshot path configured, state is in-memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let roller = game::roller_for(cfg.game.dice_seed);
    let state = Arc::new(AppContext::new(&cfg, store.clone(), roller)?);

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("Invalid server host/port")?;

    // -- Serve -----------------------------------------------------------

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(api::serve(state.clone(), addr, async move {
        let _ = stop_rx.await;
    }));

    let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Serving. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let pruned = state.accounts.prune_sessions().await;
                if pruned > 0 {
                    info!(pruned, "Expired sessions pruned");
                }
                if let Some(path) = snapshot_path.as_deref() {
                    if let Err(e) = storage::save_snapshot(&store.snapshot().await, path) {
                        error!(error = %e, "Failed to save snapshot");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = stop_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "API server exited with error"),
        Err(e) => error!(error = %e, "API server task panicked"),
    }

    if let Some(path) = snapshot_path.as_deref() {
        storage::save_snapshot(&store.snapshot().await, path)?;
        info!(path, "Final snapshot saved");
    }

    info!("DICEBET stopped");
    Ok(())
}

/// Initialise the tracing subscriber.
///
/// `RUST_LOG` overrides the default `dicebet=info` filter. Set
/// `DICEBET_LOG_JSON` for JSON lines.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dicebet=info"));

    if std::env::var("DICEBET_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
