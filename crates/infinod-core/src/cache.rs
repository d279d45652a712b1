//! Bounded LRU cache for funding transactions resolved during a scan.
//!
//! Every burn requires fetching its first input's previous transaction to
//! extract the payee. Re-scans of the maturity window and funding
//! transactions shared by several burns hit the cache instead of the chain.
//! The cache lives inside a single scan, so no lock wrapper is needed.

use std::num::NonZeroUsize;

use bitcoin::Txid;
use lru::LruCache;

use crate::types::TxView;

/// Default maximum number of cached funding transactions.
const DEFAULT_CAPACITY: usize = 4_096;

pub struct FundingTxCache {
    inner: LruCache<Txid, TxView>,
}

impl FundingTxCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache with an explicit capacity. Must be > 0.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(NonZeroUsize::new(capacity).expect("capacity must be > 0")),
        }
    }

    /// Look up a cached funding transaction. Updates LRU recency.
    pub fn get(&mut self, txid: &Txid) -> Option<TxView> {
        self.inner.get(txid).cloned()
    }

    pub fn insert(&mut self, txid: Txid, tx: TxView) {
        self.inner.put(txid, tx);
    }
}

impl Default for FundingTxCache {
    fn default() -> Self {
        Self::new()
    }
}
