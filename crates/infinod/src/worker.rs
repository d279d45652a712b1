//! Background scan loop.
//!
//! Polls the chain tip on an interval, records it on the tip hook, and
//! runs the registry maintenance pass. Scan failures are transient chain
//! conditions; they are logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use infinod_core::chain::ChainView;
use infinod_core::TipHook;

pub async fn run_scan_loop(
    chain: Arc<dyn ChainView>,
    tip_hook: Arc<TipHook>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match chain.best_height().await {
                    Ok(height) => {
                        tip_hook.updated_block_tip(height);
                        if let Err(err) = tip_hook.check_and_remove(&shutdown).await {
                            warn!(error = %err, "tip check failed; retrying next tick");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "could not fetch chain tip");
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("scan loop stopping");
                return;
            }
        }
    }
}
