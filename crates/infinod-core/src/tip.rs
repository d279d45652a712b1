//! Block tip hook — the control point the host calls on every new tip.
//!
//! `updated_block_tip` just records the height; `check_and_remove` runs
//! from the background scan task and drives cold-start / incremental scans
//! plus statement maintenance. The hook owns shared handles rather than
//! global state; the host decides how it is scheduled.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::chain::ChainView;
use crate::error::CoreError;
use crate::registry::Registry;
use crate::scanner;
use crate::types::{BlockHeight, Tier};

pub struct TipHook {
    chain: Arc<dyn ChainView>,
    registry: Arc<RwLock<Registry>>,
    snapshot_path: Option<PathBuf>,
    cached_height: AtomicU32,
}

impl TipHook {
    pub fn new(
        chain: Arc<dyn ChainView>,
        registry: Arc<RwLock<Registry>>,
        snapshot_path: Option<PathBuf>,
    ) -> Self {
        Self {
            chain,
            registry,
            snapshot_path,
            cached_height: AtomicU32::new(0),
        }
    }

    /// Record the new best height. Called by the host on every tip change.
    pub fn updated_block_tip(&self, height: BlockHeight) {
        self.cached_height.store(height.0, Ordering::Relaxed);
    }

    pub fn cached_height(&self) -> BlockHeight {
        BlockHeight(self.cached_height.load(Ordering::Relaxed))
    }

    /// Reconcile registry and statements with the cached tip.
    ///
    /// Cold-starts the scan when nothing has been scanned yet, otherwise
    /// scans incrementally; then rebuilds any tier whose last statement
    /// ends within the maturity horizon of the tip and refreshes its ranks.
    pub async fn check_and_remove(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        let tip = self.cached_height();
        if tip.0 == 0 {
            return Ok(());
        }

        let mut registry = self.registry.write().await;
        let begin = registry.params().infinity_begin_height;
        let matured_limit = registry.params().matured_limit;
        let snapshot_path = self.snapshot_path.as_deref();

        debug!(%tip, last_scan = %registry.last_scan_height(), "tip check");

        if registry.last_scan_height().0 == 0 && tip > begin {
            scanner::build_list(
                self.chain.as_ref(),
                &mut registry,
                tip,
                begin,
                snapshot_path,
                shutdown,
            )
            .await?;
            return Ok(());
        }

        if registry.last_scan_height().0 > 0 && tip > registry.last_scan_height() {
            let low = registry.last_scan_height();
            scanner::build_list(
                self.chain.as_ref(),
                &mut registry,
                tip,
                low,
                snapshot_path,
                shutdown,
            )
            .await?;
        }

        for tier in Tier::ALL {
            let (start, size) = registry.last_statement(tier);
            let stm_end = start.0 as i64 + size as i64;
            if stm_end - (tip.0 as i64) < matured_limit as i64 {
                registry.rebuild_statements(tier, tip);
                let (new_start, _) = registry.last_statement(tier);
                registry.rank_at(new_start, tier, true);
            }
        }

        Ok(())
    }
}
