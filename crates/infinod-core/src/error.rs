//! Error types for infinod-core.

use bitcoin::{BlockHash, OutPoint, Txid};

use crate::types::BlockHeight;

// ==============================================================================
// RPC Errors
// ==============================================================================

/// Structured errors from the chain daemon's JSON-RPC layer.
///
/// Each variant captures a specific failure mode rather than collapsing
/// everything into a single `String`, which makes programmatic error
/// handling (e.g. retries on transport errors vs. logic errors) possible.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("JSON-RPC error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),
}

// ==============================================================================
// Core Errors
// ==============================================================================

/// Top-level error type for the infinod-core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// No block hash known at the requested height.
    #[error("no block at height {0}")]
    BlockNotFound(BlockHeight),

    /// A block hash resolved but its contents could not be read.
    #[error("block {0} unreadable")]
    BlockUnreadable(BlockHash),

    #[error("transaction not found: {0}")]
    TxNotFound(Txid),

    #[error("invalid chain data: {0}")]
    InvalidChainData(String),

    /// The funding input of a burn does not yield a payee. The scanner
    /// skips the offending burn and keeps going.
    #[error("malformed burn {outpoint}: {reason}")]
    MalformedBurn { outpoint: OutPoint, reason: String },

    #[error("scan window [{low}, {tip}] is not above the activation height")]
    InvalidScanWindow { tip: BlockHeight, low: BlockHeight },

    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    SnapshotVersionMismatch { expected: String, found: String },

    #[error("snapshot parse error: {0}")]
    SnapshotParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
