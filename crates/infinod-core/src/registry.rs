//! `Registry` — the central in-memory store of infinity nodes.
//!
//! Holds the matured node map keyed by burn outpoint, the non-matured
//! shadow map for records inside the re-org horizon, the payee last-paid
//! index, the per-tier statement state, and the last scan height.
//!
//! The registry itself is a plain struct; the host owns it behind
//! `Arc<tokio::sync::RwLock<Registry>>`. The scanner holds the write guard
//! for a whole scan, readers take read guards and receive copies.

use std::collections::{BTreeMap, HashMap};

use bitcoin::{Amount, OutPoint, ScriptBuf};

use crate::types::{BlockHeight, ConsensusParams, NodeRecord, Tier, COIN};

/// Statement partition state for one tier: the ordered start-height → size
/// map plus the most recent statement.
#[derive(Debug, Default, Clone)]
pub(crate) struct TierStatements {
    pub(crate) map: BTreeMap<BlockHeight, u32>,
    pub(crate) last_start: BlockHeight,
    pub(crate) last_size: u32,
}

pub struct Registry {
    params: ConsensusParams,
    /// Records safely beyond the re-org horizon, keyed by burn outpoint.
    pub(crate) matured: BTreeMap<OutPoint, NodeRecord>,
    /// Records inside the horizon; wiped and rebuilt on every scan.
    pub(crate) non_matured: BTreeMap<OutPoint, NodeRecord>,
    /// Payee script → highest coinbase-matched height, shared across tiers.
    pub(crate) payee_index: HashMap<ScriptBuf, BlockHeight>,
    /// Per-tier statement state, in `Tier::ALL` (BIG, MID, LIL) order.
    pub(crate) statements: [TierStatements; 3],
    /// Height up to which the chain has been reconciled; 0 = never scanned.
    pub(crate) last_scan_height: BlockHeight,
}

pub(crate) fn tier_slot(tier: Tier) -> usize {
    match tier {
        Tier::Big => 0,
        Tier::Mid => 1,
        Tier::Lil => 2,
    }
}

impl Registry {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            matured: BTreeMap::new(),
            non_matured: BTreeMap::new(),
            payee_index: HashMap::new(),
            statements: Default::default(),
            last_scan_height: BlockHeight(0),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn last_scan_height(&self) -> BlockHeight {
        self.last_scan_height
    }

    // ========================================================================
    // Node map
    // ========================================================================

    /// Insert a matured record. Rejects a duplicate burn outpoint without
    /// mutation and returns `false`, which makes re-scans idempotent.
    pub fn add(&mut self, record: NodeRecord) -> bool {
        if self.matured.contains_key(&record.burn_outpoint) {
            return false;
        }
        self.matured.insert(record.burn_outpoint, record);
        true
    }

    /// Insert or replace a record in the non-matured shadow set.
    pub fn add_non_matured(&mut self, record: NodeRecord) {
        self.non_matured.insert(record.burn_outpoint, record);
    }

    pub fn find(&self, outpoint: &OutPoint) -> Option<NodeRecord> {
        self.matured.get(outpoint).cloned()
    }

    pub fn has(&self, outpoint: &OutPoint) -> bool {
        self.matured.contains_key(outpoint)
    }

    pub fn has_payee(&self, script: &ScriptBuf) -> bool {
        self.payee_index.contains_key(script)
    }

    /// Whether any matured record already uses `address` as its payee.
    pub fn payee_address_in_use(&self, address: &str) -> bool {
        self.matured.values().any(|r| r.payee_address == address)
    }

    pub fn count(&self) -> usize {
        self.matured.len()
    }

    pub fn count_tier(&self, tier: Tier) -> usize {
        self.matured.values().filter(|r| r.tier == tier).count()
    }

    /// Empty everything, including statement state and the payee index,
    /// and reset the scan position.
    pub fn clear(&mut self) {
        self.matured.clear();
        self.non_matured.clear();
        self.payee_index.clear();
        self.statements = Default::default();
        self.last_scan_height = BlockHeight(0);
    }

    pub fn clear_non_matured(&mut self) {
        self.non_matured.clear();
    }

    // ========================================================================
    // Payee index
    // ========================================================================

    /// Record a coinbase payment to `script` at `height`. Keeps the highest
    /// height seen; inserts when absent. Total: never fails.
    pub fn update_last_paid(&mut self, script: ScriptBuf, height: BlockHeight) {
        let entry = self.payee_index.entry(script).or_insert(height);
        if *entry < height {
            *entry = height;
        }
    }

    /// Propagate the payee index into each record's `last_paid_height`.
    /// Records whose payee script has no index entry are left untouched.
    pub fn update_last_paid_from_index(&mut self) {
        for record in self.matured.values_mut() {
            if let Some(height) = self.payee_index.get(&record.payee_script) {
                record.last_paid_height = Some(*height);
            }
        }
    }

    // ========================================================================
    // Copy-out queries
    // ========================================================================

    pub fn full_map(&self) -> BTreeMap<OutPoint, NodeRecord> {
        self.matured.clone()
    }

    pub fn full_non_matured_map(&self) -> BTreeMap<OutPoint, NodeRecord> {
        self.non_matured.clone()
    }

    pub fn full_payee_index(&self) -> HashMap<ScriptBuf, BlockHeight> {
        self.payee_index.clone()
    }

    pub fn summary(&self) -> String {
        format!(
            "infinity nodes: {}, last scan height: {}",
            self.matured.len(),
            self.last_scan_height
        )
    }

    // ========================================================================
    // ROI
    // ========================================================================

    /// Days until a tier's burn amortizes at the current reward and
    /// population: `burn / ((720 / population) · reward)`, truncated.
    /// Informational only.
    pub fn roi_days(&self, tier: Tier, reward: Amount) -> u64 {
        let population = self.count_tier(tier);
        if population == 0 || reward.to_sat() == 0 {
            return 0;
        }
        let burn = self.params.denom(tier) as f64;
        let reward_coins = reward.to_sat() as f64 / COIN as f64;
        let daily = (720.0 / population as f64) * reward_coins;
        (burn / daily) as u64
    }
}
