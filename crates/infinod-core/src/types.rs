//! Domain types for the infinity-node registry.
//!
//! Contains the node record (`NodeRecord`), tier classification (`Tier`),
//! the chain view structs (`BlockView`, `TxView`, ...), consensus parameters
//! (`ConsensusParams`), and shared newtypes like `BlockHeight`.

use bitcoin::{Address, Amount, BlockHash, Network, OutPoint, ScriptBuf};
use serde::{Deserialize, Serialize};

/// Base units per coin.
pub const COIN: u64 = 100_000_000;

/// Node lifetime in blocks: one year of 720-block days.
pub const LIFETIME_BLOCKS: u32 = 720 * 365;

/// Protocol version stamped into records created by the scanner.
pub const PROTOCOL_VERSION: i32 = 250_004;

// ==============================================================================
// Block Height
// ==============================================================================

/// A block height, wrapped for type safety.
///
/// `#[serde(transparent)]` preserves the JSON representation as a bare
/// integer, so this newtype is wire-compatible with plain `u32`.
/// `Deref<Target = u32>` minimises call-site churn.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockHeight(pub u32);

impl From<u32> for BlockHeight {
    fn from(h: u32) -> Self {
        Self(h)
    }
}

impl From<BlockHeight> for u32 {
    fn from(h: BlockHeight) -> Self {
        h.0
    }
}

impl std::ops::Deref for BlockHeight {
    type Target = u32;
    fn deref(&self) -> &u32 {
        &self.0
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Tier Classification
// ==============================================================================

/// Node tier, determined by the burn denomination. The numeric code (1, 5,
/// 10) is the tier's historical wire value and scales its per-block reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Lil,
    Mid,
    Big,
}

impl Tier {
    /// All tiers, in BIG, MID, LIL order. This is the canonical iteration
    /// order for snapshots and statement maintenance.
    pub const ALL: [Tier; 3] = [Tier::Big, Tier::Mid, Tier::Lil];

    /// The tier's numeric code on the wire and in operator output.
    pub fn code(self) -> u32 {
        match self {
            Tier::Lil => 1,
            Tier::Mid => 5,
            Tier::Big => 10,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Lil => write!(f, "LIL"),
            Tier::Mid => write!(f, "MID"),
            Tier::Big => write!(f, "BIG"),
        }
    }
}

// ==============================================================================
// Node Record
// ==============================================================================

/// One infinity node: the immutable identity established by its burn
/// transaction plus the fields the registry derives from chain state.
///
/// Field order matters: it is the snapshot serialization order. `sig_time`
/// and `next_reward_height` are carried for format stability only and are
/// never assigned by the scanner. `rank` is recomputed from statements and
/// deliberately not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// (txid, vout) of the burn output. Permanent identity of the node.
    pub burn_outpoint: OutPoint,
    pub sig_time: i64,
    pub protocol_version: i32,
    /// Height of the block containing the burn transaction.
    pub created_height: BlockHeight,
    /// `created_height + LIFETIME_BLOCKS`.
    pub expire_height: BlockHeight,
    /// Highest height at which the payee script received a tier-matched
    /// coinbase output. `None` until the first matched payment.
    pub last_paid_height: Option<BlockHeight>,
    pub next_reward_height: Option<BlockHeight>,
    /// Amount of the burn output, in base units.
    pub burn_value: Amount,
    pub tier: Tier,
    /// Address decoded from the first input's previous output.
    pub payee_address: String,
    /// Raw output script for the payee address.
    pub payee_script: ScriptBuf,
    /// Owner-declared recovery hint; opaque to the registry.
    pub backup_address: String,
    /// 1-based position within the tier at the most recent statement;
    /// 0 = expired or not placed.
    #[serde(skip)]
    pub rank: u32,
}

impl NodeRecord {
    pub fn new(
        burn_outpoint: OutPoint,
        created_height: BlockHeight,
        burn_value: Amount,
        tier: Tier,
        payee_address: String,
        payee_script: ScriptBuf,
    ) -> Self {
        Self {
            burn_outpoint,
            sig_time: 0,
            protocol_version: PROTOCOL_VERSION,
            created_height,
            expire_height: BlockHeight(created_height.0 + LIFETIME_BLOCKS),
            last_paid_height: None,
            next_reward_height: None,
            burn_value,
            tier,
            payee_address,
            payee_script,
            backup_address: String::new(),
            rank: 0,
        }
    }

    /// The burn amount rounded up to whole coins, as shown to operators.
    pub fn rounded_burn(&self) -> u64 {
        self.burn_value.to_sat() / COIN + 1
    }

    /// Whether this node belongs to the population of a statement starting
    /// at `start`: created strictly before the start and not yet expired.
    pub fn eligible_at(&self, start: BlockHeight) -> bool {
        self.created_height < start && start <= self.expire_height
    }
}

// ==============================================================================
// Chain View Structs
// ==============================================================================

/// A block as read from the chain: header linkage plus full transactions.
#[derive(Debug, Clone)]
pub struct BlockView {
    pub hash: BlockHash,
    pub height: BlockHeight,
    /// `None` only for the genesis block.
    pub prev: Option<BlockHash>,
    pub txs: Vec<TxView>,
}

/// A transaction, reduced to what burn detection and payout matching need.
#[derive(Debug, Clone)]
pub struct TxView {
    pub txid: bitcoin::Txid,
    pub inputs: Vec<TxInView>,
    pub outputs: Vec<TxOutView>,
}

impl TxView {
    /// A coinbase transaction has exactly one input whose prevout is `None`.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_none()
    }
}

/// A transaction input. For coinbase inputs, `prevout` is `None`.
#[derive(Debug, Clone)]
pub struct TxInView {
    pub prevout: Option<OutPoint>,
}

/// A transaction output.
#[derive(Debug, Clone)]
pub struct TxOutView {
    pub value: Amount,
    pub script_pub_key: ScriptBuf,
}

// ==============================================================================
// Consensus Parameters
// ==============================================================================

/// Fixed per-tier coinbase payment amounts.
///
/// The scheduler needs the exact amounts a coinbase output must carry to
/// count as a node payment; chain daemons expose no RPC for them, so they
/// are configured alongside the rest of the consensus parameters.
#[derive(Debug, Clone, Copy)]
pub struct RewardSchedule {
    pub lil: Amount,
    pub mid: Amount,
    pub big: Amount,
}

impl RewardSchedule {
    pub fn amount(&self, tier: Tier) -> Amount {
        match tier {
            Tier::Lil => self.lil,
            Tier::Mid => self.mid,
            Tier::Big => self.big,
        }
    }
}

/// Chain-level parameters consumed by the registry, scanner, and scheduler.
#[derive(Debug, Clone)]
pub struct ConsensusParams {
    pub network: Network,
    /// First height at which burn transactions are recognised.
    pub infinity_begin_height: BlockHeight,
    /// Start of the statement axis.
    pub genesis_statement_height: BlockHeight,
    /// Re-org safety horizon: records younger than this stay in the
    /// non-matured shadow set.
    pub matured_limit: u32,
    /// Burn denominations per tier, in whole coins.
    pub denom_lil: u64,
    pub denom_mid: u64,
    pub denom_big: u64,
    /// Population caps per tier; their maximum is also the coinbase
    /// last-paid scan horizon.
    pub limit_lil: u32,
    pub limit_mid: u32,
    pub limit_big: u32,
    /// The well-known sink address burns are sent to, and its script.
    pub sink_address: String,
    pub sink_script: ScriptBuf,
}

impl ConsensusParams {
    /// Mainnet-flavoured defaults around the given sink address. Callers
    /// override individual fields for other deployments.
    pub fn new(network: Network, sink: Address) -> Self {
        Self {
            network,
            infinity_begin_height: BlockHeight(165_000),
            genesis_statement_height: BlockHeight(250_000),
            matured_limit: 55,
            denom_lil: 100_000,
            denom_mid: 500_000,
            denom_big: 1_000_000,
            limit_lil: 750,
            limit_mid: 375,
            limit_big: 375,
            sink_script: sink.script_pubkey(),
            sink_address: sink.to_string(),
        }
    }

    pub fn denom(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Lil => self.denom_lil,
            Tier::Mid => self.denom_mid,
            Tier::Big => self.denom_big,
        }
    }

    pub fn limit(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Lil => self.limit_lil,
            Tier::Mid => self.limit_mid,
            Tier::Big => self.limit_big,
        }
    }

    /// The exact burn amount for a tier, in base units.
    pub fn burn_amount(&self, tier: Tier) -> Amount {
        Amount::from_sat(self.denom(tier) * COIN)
    }

    /// How deep below the tip coinbase outputs are matched against expected
    /// node payments.
    pub fn last_paid_scan_depth(&self) -> u32 {
        self.limit_lil.max(self.limit_mid).max(self.limit_big)
    }

    /// Classify an output value against the burn denominations. A value
    /// matches tier `T` iff it lies in `((denom(T) − 1)·COIN, denom(T)·COIN]`;
    /// values outside every window are not burns.
    pub fn classify_burn(&self, value: Amount) -> Option<Tier> {
        let sats = value.to_sat();
        for tier in Tier::ALL {
            let denom = self.denom(tier);
            if sats > (denom - 1) * COIN && sats <= denom * COIN {
                return Some(tier);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[test]
    fn tier_codes_match_wire_values() {
        assert_eq!(Tier::Lil.code(), 1);
        assert_eq!(Tier::Mid.code(), 5);
        assert_eq!(Tier::Big.code(), 10);
    }

    #[test]
    fn classify_burn_window_edges() {
        let params = regtest_params();

        // Exactly the denomination is in; one base unit below the floor is out.
        assert_eq!(
            params.classify_burn(Amount::from_sat(100_000 * COIN)),
            Some(Tier::Lil)
        );
        assert_eq!(params.classify_burn(Amount::from_sat(99_999 * COIN)), None);
        // Anywhere strictly inside the window counts.
        assert_eq!(
            params.classify_burn(Amount::from_sat(99_999 * COIN + 1)),
            Some(Tier::Lil)
        );
        assert_eq!(
            params.classify_burn(Amount::from_sat(500_000 * COIN)),
            Some(Tier::Mid)
        );
        assert_eq!(
            params.classify_burn(Amount::from_sat(1_000_000 * COIN)),
            Some(Tier::Big)
        );
        // One over the top denomination is out.
        assert_eq!(
            params.classify_burn(Amount::from_sat(1_000_000 * COIN + 1)),
            None
        );
    }

    #[test]
    fn rounded_burn_rounds_up_to_whole_coins() {
        let rec = make_record(1, 101, Tier::Lil, 1);
        assert_eq!(rec.rounded_burn(), 100_001);

        let mut rec = make_record(2, 101, Tier::Lil, 2);
        rec.burn_value = Amount::from_sat(99_999 * COIN + 1);
        assert_eq!(rec.rounded_burn(), 100_000);
    }

    #[test]
    fn eligibility_brackets_statement_start() {
        let rec = make_record(1, 101, Tier::Lil, 1);
        assert!(!rec.eligible_at(BlockHeight(101)), "created == start");
        assert!(rec.eligible_at(BlockHeight(102)));
        assert!(rec.eligible_at(rec.expire_height));
        assert!(!rec.eligible_at(BlockHeight(rec.expire_height.0 + 1)));
    }
}
