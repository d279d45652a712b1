mod cli;
mod server;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Amount};
use clap::Parser;
use eyre::{eyre, WrapErr};
use tokio::sync::{watch, RwLock};

use infinod_core::chain::{ChainView, HttpChainClient};
use infinod_core::types::{BlockHeight, RewardSchedule, COIN};
use infinod_core::{snapshot, ConsensusParams, CoreError, Registry, TipHook};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Consensus parameters around the configured sink address.
    let sink = args
        .sink_address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| eyre!("invalid sink address: {e}"))?
        .require_network(args.network)
        .map_err(|e| eyre!("sink address does not match --network {}: {e}", args.network))?;

    let mut params = ConsensusParams::new(args.network, sink);
    params.infinity_begin_height = BlockHeight(args.begin_height);
    params.genesis_statement_height = BlockHeight(args.genesis_statement_height);
    params.limit_lil = args.limit_lil;
    params.limit_mid = args.limit_mid;
    params.limit_big = args.limit_big;

    let rewards = RewardSchedule {
        lil: Amount::from_sat(args.reward_lil * COIN),
        mid: Amount::from_sat(args.reward_mid * COIN),
        big: Amount::from_sat(args.reward_big * COIN),
    };

    // Connect to the chain daemon and verify the connection succeeds
    // before starting the server.
    let chain: Arc<dyn ChainView> = Arc::new(HttpChainClient::new(
        &args.rpc_url,
        args.rpc_user.as_deref(),
        args.rpc_pass.as_deref(),
        rewards,
    ));

    let tip = chain.best_height().await.map_err(|err| {
        eyre!("could not connect to chain RPC endpoint `{}`: {err}", args.rpc_url)
            .wrap_err("while attempting to connect to the chain daemon")
    })?;
    tracing::info!(%tip, network = %args.network, "connected to chain daemon");

    // Restore the registry snapshot if one exists; a stale version means a
    // cold start on the first tip check.
    let mut registry = Registry::new(params);
    if let Some(path) = &args.snapshot_path {
        match snapshot::restore(&mut registry, path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "{}", registry.summary());
            }
            Err(CoreError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot yet; will cold-start");
            }
            Err(err) => {
                tracing::warn!(error = %err, "snapshot unusable; cold-starting");
                registry.clear();
            }
        }
    }

    let registry = Arc::new(RwLock::new(registry));
    let tip_hook = Arc::new(TipHook::new(
        chain.clone(),
        registry.clone(),
        args.snapshot_path.clone(),
    ));

    // Shutdown flag: flipped on ctrl-c, polled by in-flight scans.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    tokio::spawn(worker::run_scan_loop(
        chain.clone(),
        tip_hook.clone(),
        Duration::from_secs(args.scan_interval_secs),
        shutdown_rx.clone(),
    ));

    let state = server::AppState {
        chain,
        registry,
        tip_hook,
        snapshot_path: args.snapshot_path.clone(),
        shutdown: shutdown_rx.clone(),
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin);

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 — it is accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    let mut shutdown_rx = shutdown_rx;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .context("run HTTP server")?;

    Ok(())
}
