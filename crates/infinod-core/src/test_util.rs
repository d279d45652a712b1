//! Shared test helpers for `infinod-core` unit tests.
//!
//! Deterministic builders for txids, block hashes, scripts, burn and
//! coinbase transactions, and the small-chain consensus parameters the
//! scenario tests run against (activation and genesis statement at 100,
//! maturity limit 5, unit rewards).

use bitcoin::hashes::Hash;
use bitcoin::{Address, Amount, BlockHash, Network, OutPoint, ScriptBuf, Txid};

use crate::types::{
    BlockHeight, BlockView, ConsensusParams, NodeRecord, RewardSchedule, Tier, TxInView,
    TxOutView, TxView, COIN,
};

// ==============================================================================
// Deterministic Identifiers
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

/// Create a deterministic `BlockHash` from a height.
pub fn block_hash_from_height(height: BlockHeight) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&height.0.to_le_bytes());
    bytes[31] = 0xb1;
    BlockHash::from_byte_array(bytes)
}

/// Minimal valid P2WPKH scriptPubKey (OP_0 PUSH20 <hash>), distinguished
/// by `tag` so different payees compare unequal.
pub fn p2wpkh_script(tag: u8) -> ScriptBuf {
    let mut script_bytes = vec![
        0x00, 0x14, // OP_0, PUSH20
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f, 0x10, 0x11, 0x12, 0x13, 0x14,
    ];
    script_bytes[21] = tag;
    ScriptBuf::from_bytes(script_bytes)
}

/// The well-known sink script the scenario params burn to.
pub fn sink_script() -> ScriptBuf {
    p2wpkh_script(0xee)
}

pub fn address_for(script: &ScriptBuf) -> String {
    Address::from_script(script, Network::Regtest)
        .expect("test scripts are standard P2WPKH")
        .to_string()
}

// ==============================================================================
// Consensus Parameters
// ==============================================================================

/// Small-chain parameters for scenario tests: activation and genesis
/// statement at height 100, maturity limit 5, per-tier caps (and thus the
/// coinbase scan horizon) 10.
pub fn regtest_params() -> ConsensusParams {
    let sink = Address::from_script(&sink_script(), Network::Regtest)
        .expect("sink script is standard P2WPKH");
    let mut params = ConsensusParams::new(Network::Regtest, sink);
    params.infinity_begin_height = BlockHeight(100);
    params.genesis_statement_height = BlockHeight(100);
    params.matured_limit = 5;
    params.limit_lil = 10;
    params.limit_mid = 10;
    params.limit_big = 10;
    params
}

/// One whole coin per tier per block.
pub fn unit_rewards() -> RewardSchedule {
    RewardSchedule {
        lil: Amount::from_sat(COIN),
        mid: Amount::from_sat(COIN),
        big: Amount::from_sat(COIN),
    }
}

// ==============================================================================
// Transaction Builders
// ==============================================================================

/// A funding transaction paying `payee` on output 0. Burns built on top of
/// it resolve their payee from this output.
pub fn funding_tx(tag: u8, payee: &ScriptBuf) -> TxView {
    TxView {
        txid: txid_from_byte(tag),
        inputs: vec![TxInView { prevout: None }],
        outputs: vec![TxOutView {
            value: Amount::from_sat(2_000_000 * COIN),
            script_pub_key: payee.clone(),
        }],
    }
}

/// A burn transaction: spends `funding:0` and sends `value` to the sink.
pub fn burn_tx(tag: u8, funding: &TxView, value: Amount) -> TxView {
    TxView {
        txid: txid_from_byte(tag),
        inputs: vec![TxInView {
            prevout: Some(OutPoint::new(funding.txid, 0)),
        }],
        outputs: vec![TxOutView {
            value,
            script_pub_key: sink_script(),
        }],
    }
}

/// A coinbase transaction with the given outputs.
pub fn coinbase_tx(tag: u8, outputs: Vec<TxOutView>) -> TxView {
    TxView {
        txid: txid_from_byte(tag),
        inputs: vec![TxInView { prevout: None }],
        outputs,
    }
}

/// A block at `height` linked to the deterministic hash of `height − 1`.
pub fn make_block(height: u32, txs: Vec<TxView>) -> BlockView {
    BlockView {
        hash: block_hash_from_height(BlockHeight(height)),
        height: BlockHeight(height),
        prev: height
            .checked_sub(1)
            .map(|h| block_hash_from_height(BlockHeight(h))),
        txs,
    }
}

// ==============================================================================
// Record Builder
// ==============================================================================

/// A matured-map record with outpoint `txid_from_byte(tag):0`, the tier's
/// exact burn amount, and payee `p2wpkh_script(payee_tag)`.
pub fn make_record(tag: u8, created: u32, tier: Tier, payee_tag: u8) -> NodeRecord {
    let payee_script = p2wpkh_script(payee_tag);
    let denom = match tier {
        Tier::Lil => 100_000,
        Tier::Mid => 500_000,
        Tier::Big => 1_000_000,
    };
    NodeRecord::new(
        OutPoint::new(txid_from_byte(tag), 0),
        BlockHeight(created),
        Amount::from_sat(denom * COIN),
        tier,
        address_for(&payee_script),
        payee_script,
    )
}
