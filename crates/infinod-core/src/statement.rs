//! Deterministic reward statements and node ranking.
//!
//! The height axis is partitioned per tier into "statements": a statement
//! starting at `h` spans as many blocks as the tier had eligible nodes at
//! `h`, and each height inside it maps one-to-one to a node by rank.
//! Everything here is a pure function of registry contents, so every
//! participant derives the same schedule from the same chain.

use std::collections::BTreeMap;

use bitcoin::OutPoint;

use crate::registry::{tier_slot, Registry};
use crate::types::{BlockHeight, NodeRecord, Tier};

impl Registry {
    pub(crate) fn stm(&self, tier: Tier) -> &crate::registry::TierStatements {
        &self.statements[tier_slot(tier)]
    }

    /// The most recent statement for a tier as `(start, size)`.
    pub fn last_statement(&self, tier: Tier) -> (BlockHeight, u32) {
        let slot = self.stm(tier);
        (slot.last_start, slot.last_size)
    }

    pub fn statement_map(&self, tier: Tier) -> &BTreeMap<BlockHeight, u32> {
        &self.stm(tier).map
    }

    /// Recompute a tier's statement partition from the genesis statement
    /// height up to (excluding) `tip`.
    ///
    /// `size(h)` counts matured tier records created strictly before `h` and
    /// not expired at `h`; the next statement starts `size` blocks later.
    /// A zero-population statement advances the axis by one block, so the
    /// partition stays well-defined while a tier is still empty.
    pub fn rebuild_statements(&mut self, tier: Tier, tip: BlockHeight) {
        let genesis = self.params().genesis_statement_height;
        let mut map = BTreeMap::new();
        let mut last_start = genesis;
        let mut last_size = 0u32;

        let mut start = genesis;
        while start < tip {
            let size = self
                .matured
                .values()
                .filter(|r| r.tier == tier && r.eligible_at(start))
                .count() as u32;
            map.insert(start, size);
            last_start = start;
            last_size = size;
            start = BlockHeight(start.0 + size.max(1));
        }

        let slot = &mut self.statements[tier_slot(tier)];
        slot.map = map;
        slot.last_start = last_start;
        slot.last_size = last_size;
    }

    /// Order a tier's population at a statement start and assign ranks.
    ///
    /// Every tier record's rank is reset to 0 first; eligible records are
    /// then sorted by creation height, tie-broken by burn outpoint, and
    /// ranked 1..N. With `update` the ranks are written back to the stored
    /// records. Returns the rank → record mapping.
    pub fn rank_at(
        &mut self,
        start: BlockHeight,
        tier: Tier,
        update: bool,
    ) -> BTreeMap<u32, NodeRecord> {
        for record in self.matured.values_mut() {
            if record.tier == tier {
                record.rank = 0;
            }
        }

        let mut eligible: Vec<(BlockHeight, OutPoint)> = self
            .matured
            .values()
            .filter(|r| r.tier == tier && r.eligible_at(start))
            .map(|r| (r.created_height, r.burn_outpoint))
            .collect();
        eligible.sort();

        let mut ranked = BTreeMap::new();
        for (position, (_, outpoint)) in eligible.iter().enumerate() {
            let rank = position as u32 + 1;
            let record = self
                .matured
                .get_mut(outpoint)
                .expect("eligible outpoints come from the matured map");
            if update {
                record.rank = rank;
            }
            ranked.insert(rank, record.clone());
        }

        ranked
    }

    /// The node owed the reward at `height` for a tier, if the height falls
    /// inside a statement: find the statement `(start, size)` with the
    /// largest `start < height` satisfying `height − start ≤ size`, then
    /// pick the node ranked `height − start`.
    pub fn candidate_at(&mut self, height: BlockHeight, tier: Tier) -> Option<NodeRecord> {
        let (start, delta) = self
            .stm(tier)
            .map
            .range(..height)
            .rev()
            .find_map(|(start, size)| {
                let delta = height.0 - start.0;
                (delta <= *size).then_some((*start, delta))
            })?;

        let ranked = self.rank_at(start, tier, false);
        ranked.get(&delta).cloned()
    }

    /// Refresh stored ranks for all tiers at their current last statements.
    /// Run at the end of every scan and after statement rebuilds.
    pub fn refresh_ranks_at_last_statements(&mut self) {
        for tier in Tier::ALL {
            let (start, _) = self.last_statement(tier);
            self.rank_at(start, tier, true);
        }
    }

    /// One-line per-tier statement summary for operators.
    pub fn statement_summary(&self) -> String {
        let fmt = |tier: Tier| {
            let slot = self.stm(tier);
            format!(
                "{}: [{} / {}:{}]",
                tier,
                slot.map.len(),
                slot.last_start,
                slot.last_size
            )
        };
        format!("{} - {} - {}", fmt(Tier::Big), fmt(Tier::Mid), fmt(Tier::Lil))
    }
}
