//! Mock [`ChainView`] implementation for unit tests.
//!
//! Uses a builder pattern (`MockChain::builder()`) to register canned
//! blocks and transactions before the mock is consumed.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bitcoin::{Amount, BlockHash, Txid};

use crate::error::CoreError;
use crate::types::{BlockHeight, BlockView, RewardSchedule, Tier, TxView, COIN};

use super::ChainView;

/// A mock chain backend for testing. Serves canned blocks and transactions
/// from maps populated via the builder pattern.
pub struct MockChain {
    hash_by_height: BTreeMap<BlockHeight, BlockHash>,
    blocks: HashMap<BlockHash, BlockView>,
    transactions: HashMap<Txid, TxView>,
    rewards: RewardSchedule,
    best: BlockHeight,
}

impl MockChain {
    pub fn builder() -> MockChainBuilder {
        MockChainBuilder {
            hash_by_height: BTreeMap::new(),
            blocks: HashMap::new(),
            transactions: HashMap::new(),
            rewards: RewardSchedule {
                lil: Amount::from_sat(COIN),
                mid: Amount::from_sat(COIN),
                big: Amount::from_sat(COIN),
            },
        }
    }
}

/// Builder for configuring a [`MockChain`] with canned data.
pub struct MockChainBuilder {
    hash_by_height: BTreeMap<BlockHeight, BlockHash>,
    blocks: HashMap<BlockHash, BlockView>,
    transactions: HashMap<Txid, TxView>,
    rewards: RewardSchedule,
}

impl MockChainBuilder {
    /// Register a block. Its transactions also become visible through
    /// `get_transaction`.
    pub fn with_block(mut self, block: BlockView) -> Self {
        self.hash_by_height.insert(block.height, block.hash);
        for tx in &block.txs {
            self.transactions.insert(tx.txid, tx.clone());
        }
        self.blocks.insert(block.hash, block);
        self
    }

    /// Register a standalone transaction (e.g. a funding tx outside the
    /// scanned window).
    pub fn with_tx(mut self, tx: TxView) -> Self {
        self.transactions.insert(tx.txid, tx);
        self
    }

    /// Override the default unit-coin reward schedule.
    pub fn with_rewards(mut self, rewards: RewardSchedule) -> Self {
        self.rewards = rewards;
        self
    }

    /// Consume the builder and produce a [`MockChain`].
    pub fn build(self) -> MockChain {
        let best = self
            .hash_by_height
            .keys()
            .next_back()
            .copied()
            .unwrap_or(BlockHeight(0));
        MockChain {
            hash_by_height: self.hash_by_height,
            blocks: self.blocks,
            transactions: self.transactions,
            rewards: self.rewards,
            best,
        }
    }
}

#[async_trait]
impl ChainView for MockChain {
    async fn best_height(&self) -> Result<BlockHeight, CoreError> {
        Ok(self.best)
    }

    async fn block_hash_at(&self, height: BlockHeight) -> Result<Option<BlockHash>, CoreError> {
        Ok(self.hash_by_height.get(&height).copied())
    }

    async fn read_block(&self, hash: &BlockHash) -> Result<BlockView, CoreError> {
        self.blocks
            .get(hash)
            .cloned()
            .ok_or(CoreError::BlockUnreadable(*hash))
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<TxView, CoreError> {
        self.transactions
            .get(txid)
            .cloned()
            .ok_or(CoreError::TxNotFound(*txid))
    }

    fn reward_at(&self, _height: BlockHeight, tier: Tier) -> Amount {
        self.rewards.amount(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[tokio::test]
    async fn serves_registered_blocks_and_txs() {
        let payee = p2wpkh_script(1);
        let funding = funding_tx(10, &payee);
        let block = make_block(105, vec![]);
        let chain = MockChain::builder()
            .with_block(block.clone())
            .with_tx(funding.clone())
            .build();

        assert_eq!(chain.best_height().await.unwrap(), BlockHeight(105));
        assert_eq!(
            chain.block_hash_at(BlockHeight(105)).await.unwrap(),
            Some(block.hash)
        );
        assert!(chain
            .block_hash_at(BlockHeight(106))
            .await
            .unwrap()
            .is_none());

        let fetched = chain.get_transaction(&funding.txid).await.unwrap();
        assert_eq!(fetched.outputs[0].script_pub_key, payee);
    }

    #[tokio::test]
    async fn unknown_lookups_are_typed_errors() {
        let chain = MockChain::builder().build();
        let missing_tx = chain.get_transaction(&txid_from_byte(9)).await;
        assert!(matches!(missing_tx, Err(CoreError::TxNotFound(_))));

        let missing_block = chain
            .read_block(&block_hash_from_height(BlockHeight(1)))
            .await;
        assert!(matches!(missing_block, Err(CoreError::BlockUnreadable(_))));
    }
}
