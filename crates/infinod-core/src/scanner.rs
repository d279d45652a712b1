//! Chain scanner — reconciles the registry with the chain's contents.
//!
//! Walks the chain backwards from the tip through prev-hashes, ingesting
//! burn transactions into the registry and matching coinbase outputs
//! against expected node payments. The walk is strictly sequential and a
//! pure function of chain content, so every participant converges on the
//! same registry state.

use std::path::Path;

use bitcoin::{Address, OutPoint};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::FundingTxCache;
use crate::chain::ChainView;
use crate::error::CoreError;
use crate::registry::Registry;
use crate::snapshot;
use crate::types::{BlockHeight, NodeRecord, Tier, TxView};

/// How a scan ended. A cancelled scan leaves previously matured state in
/// place but updates no bookkeeping and persists nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Cancelled,
}

/// Incremental entry point: resume from the last scan height, or cold-start
/// from the activation height when nothing has been scanned yet.
pub async fn update_list(
    chain: &dyn ChainView,
    registry: &mut Registry,
    tip: BlockHeight,
    snapshot_path: Option<&Path>,
    shutdown: &watch::Receiver<bool>,
) -> Result<ScanOutcome, CoreError> {
    let begin = registry.params().infinity_begin_height;
    let last_scan = registry.last_scan_height();

    if last_scan.0 == 0 {
        return build_list(chain, registry, tip, begin, snapshot_path, shutdown).await;
    }
    if tip < last_scan {
        return Err(CoreError::InvalidScanWindow {
            tip,
            low: last_scan,
        });
    }
    build_list(chain, registry, tip, last_scan, snapshot_path, shutdown).await
}

/// Reconcile the registry with chain contents for heights `[low, tip]`.
///
/// `low == infinity_begin_height` is a cold start and clears the registry
/// first; otherwise the scan resumes from the stored last scan height. The
/// non-matured shadow set is wiped unconditionally and rebuilt from the
/// scanned window.
///
/// On success the last scan height is set to `tip − matured_limit`, so the
/// next incremental scan re-examines the maturity window; duplicate
/// rejection in [`Registry::add`] makes that overlap idempotent.
pub async fn build_list(
    chain: &dyn ChainView,
    registry: &mut Registry,
    tip: BlockHeight,
    low: BlockHeight,
    snapshot_path: Option<&Path>,
    shutdown: &watch::Receiver<bool>,
) -> Result<ScanOutcome, CoreError> {
    let begin = registry.params().infinity_begin_height;
    if tip < low || low < begin {
        return Err(CoreError::InvalidScanWindow { tip, low });
    }

    registry.clear_non_matured();

    let mut low = low;
    if low == begin {
        registry.clear();
    } else if registry.last_scan_height().0 > 0 {
        low = registry.last_scan_height();
    }

    let Some(tip_hash) = chain.block_hash_at(tip).await? else {
        return Err(CoreError::BlockNotFound(tip));
    };

    let params = registry.params().clone();
    let matured_floor = tip.0.saturating_sub(params.matured_limit);
    let paid_floor = tip.0.saturating_sub(params.last_paid_scan_depth());
    let mut funding_cache = FundingTxCache::new();

    info!(%tip, %low, "building infinity node list");

    let mut hash = tip_hash;
    loop {
        if *shutdown.borrow() {
            info!(%tip, "scan cancelled by shutdown");
            return Ok(ScanOutcome::Cancelled);
        }

        let block = chain.read_block(&hash).await?;

        for tx in &block.txs {
            if tx.is_coinbase() {
                if block.height.0 >= paid_floor {
                    ingest_coinbase(chain, registry, tx, block.height);
                }
                continue;
            }

            for (vout, output) in tx.outputs.iter().enumerate() {
                let Some(tier) = params.classify_burn(output.value) else {
                    continue;
                };
                if output.script_pub_key != params.sink_script {
                    continue;
                }

                let outpoint = OutPoint::new(tx.txid, vout as u32);
                match resolve_payee(chain, &mut funding_cache, tx, outpoint, &params.network).await
                {
                    Ok((payee_address, payee_script)) => {
                        let record = NodeRecord::new(
                            outpoint,
                            block.height,
                            output.value,
                            tier,
                            payee_address,
                            payee_script,
                        );
                        if block.height.0 < matured_floor {
                            if !registry.add(record) {
                                debug!(%outpoint, "burn already registered");
                            }
                        } else {
                            registry.add_non_matured(record);
                        }
                    }
                    Err(CoreError::MalformedBurn { outpoint, reason }) => {
                        warn!(%outpoint, %reason, "skipping malformed burn");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if block.height <= low {
            break;
        }
        let Some(prev) = block.prev else { break };
        hash = prev;
    }

    registry.last_scan_height = BlockHeight(tip.0.saturating_sub(params.matured_limit));
    registry.update_last_paid_from_index();
    registry.refresh_ranks_at_last_statements();

    if let Some(path) = snapshot_path {
        snapshot::save(registry, path)?;
        debug!(path = %path.display(), "registry snapshot written");
    }

    info!(
        nodes = registry.count(),
        last_scan = %registry.last_scan_height(),
        "infinity node list built"
    );
    Ok(ScanOutcome::Completed)
}

/// Match coinbase outputs against the expected per-tier payment amounts
/// and fold hits into the payee index.
fn ingest_coinbase(
    chain: &dyn ChainView,
    registry: &mut Registry,
    coinbase: &TxView,
    height: BlockHeight,
) {
    for output in &coinbase.outputs {
        let matched = Tier::ALL
            .iter()
            .any(|tier| output.value == chain.reward_at(height, *tier));
        if matched {
            registry.update_last_paid(output.script_pub_key.clone(), height);
        }
    }
}

/// Resolve the payee of a burn: the destination of the first input's
/// previous output.
///
/// A missing funding transaction is missing chain data and aborts the scan;
/// anything that makes the destination unextractable is a malformed burn
/// the caller skips.
async fn resolve_payee(
    chain: &dyn ChainView,
    cache: &mut FundingTxCache,
    burn_tx: &TxView,
    burn_outpoint: OutPoint,
    network: &bitcoin::Network,
) -> Result<(String, bitcoin::ScriptBuf), CoreError> {
    let malformed = |reason: &str| CoreError::MalformedBurn {
        outpoint: burn_outpoint,
        reason: reason.to_string(),
    };

    let first_input = burn_tx.inputs.first().ok_or_else(|| malformed("no inputs"))?;
    let prevout = first_input
        .prevout
        .ok_or_else(|| malformed("coinbase-style funding input"))?;

    let funding = match cache.get(&prevout.txid) {
        Some(tx) => tx,
        None => {
            let tx = chain.get_transaction(&prevout.txid).await?;
            cache.insert(prevout.txid, tx.clone());
            tx
        }
    };

    let funding_output = funding
        .outputs
        .get(prevout.vout as usize)
        .ok_or_else(|| malformed("funding vout out of range"))?;

    let address = Address::from_script(&funding_output.script_pub_key, *network)
        .map_err(|_| malformed("no destination in funding script"))?;

    Ok((address.to_string(), funding_output.script_pub_key.clone()))
}
