//! Chain access abstraction.
//!
//! Defines the [`ChainView`] trait the registry subsystems consume and
//! provides an HTTP JSON-RPC implementation ([`HttpChainClient`]) plus a
//! test mock (`mock::MockChain`).

mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpChainClient;

use async_trait::async_trait;
use bitcoin::{Amount, BlockHash, Txid};

use crate::error::CoreError;
use crate::types::{BlockHeight, BlockView, Tier, TxView};

/// Read-only view of the canonical chain.
///
/// Everything the scanner and scheduler need: height-to-hash resolution,
/// full block reads, arbitrary transaction lookup for funding-input
/// resolution, and the expected per-tier coinbase payment amounts.
#[async_trait]
pub trait ChainView: Send + Sync {
    /// Height of the current chain tip.
    async fn best_height(&self) -> Result<BlockHeight, CoreError>;

    /// Resolve the block hash at a height on the active chain.
    /// Returns `None` when the height is beyond the tip.
    async fn block_hash_at(&self, height: BlockHeight) -> Result<Option<BlockHash>, CoreError>;

    /// Read a block with its full transaction list.
    async fn read_block(&self, hash: &BlockHash) -> Result<BlockView, CoreError>;

    /// Fetch a decoded transaction by txid.
    async fn get_transaction(&self, txid: &Txid) -> Result<TxView, CoreError>;

    /// The exact coinbase amount a tier-`tier` node payment carries at
    /// `height`.
    fn reward_at(&self, height: BlockHeight, tier: Tier) -> Amount;
}
