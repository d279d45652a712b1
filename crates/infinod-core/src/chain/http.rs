use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Amount, BlockHash, ScriptBuf, Txid};
use reqwest::header;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{CoreError, RpcError};
use crate::types::{BlockHeight, BlockView, RewardSchedule, Tier, TxInView, TxOutView, TxView};

use super::ChainView;

/// Chain daemon JSON-RPC client over HTTP(S).
///
/// Talks to a Core-style daemon: `getblockcount`, `getblockhash`,
/// `getblock <hash> 2` (full transactions), `getrawtransaction`.
pub struct HttpChainClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    rewards: RewardSchedule,
    next_id: AtomicU64,
}

#[derive(serde::Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

impl HttpChainClient {
    pub fn new(
        url: &str,
        user: Option<&str>,
        pass: Option<&str>,
        rewards: RewardSchedule,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .expect("reqwest client builder uses valid static config");

        let auth = match (user, pass) {
            (Some(u), Some(p)) => Some((u.to_string(), p.to_string())),
            (Some(u), None) => Some((u.to_string(), String::new())),
            _ => None,
        };

        Self {
            client,
            url: url.to_string(),
            auth,
            rewards,
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();

        let body = response.text().await.map_err(RpcError::Transport)?;
        trace!(rpc.id = id, rpc.method = method, %status, body = %body, "rpc response");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;

        if let Some(err) = decoded.error {
            return Err(parse_jsonrpc_error(err));
        }

        Ok(decoded.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl ChainView for HttpChainClient {
    async fn best_height(&self) -> Result<BlockHeight, CoreError> {
        let raw = self.rpc_call("getblockcount", Vec::new()).await?;
        let count = raw
            .as_u64()
            .ok_or_else(|| RpcError::InvalidResponse(format!("non-numeric block count: {raw}")))?;
        Ok(BlockHeight(count as u32))
    }

    async fn block_hash_at(&self, height: BlockHeight) -> Result<Option<BlockHash>, CoreError> {
        let raw = self
            .rpc_call("getblockhash", vec![serde_json::json!(height.0)])
            .await;
        match raw {
            Ok(value) => {
                let hash: BlockHash = serde_json::from_value(value)
                    .map_err(|e| RpcError::InvalidResponse(format!("invalid block hash: {e}")))?;
                Ok(Some(hash))
            }
            // Core answers -8 "Block height out of range" past the tip.
            Err(CoreError::Rpc(RpcError::ServerError { code: -8, .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn read_block(&self, hash: &BlockHash) -> Result<BlockView, CoreError> {
        let raw = self
            .rpc_call(
                "getblock",
                vec![serde_json::json!(hash.to_string()), serde_json::json!(2)],
            )
            .await
            .map_err(|err| match err {
                CoreError::Rpc(RpcError::ServerError { code: -5, .. }) => {
                    CoreError::BlockUnreadable(*hash)
                }
                other => other,
            })?;

        let block: RawBlock = serde_json::from_value(raw)
            .map_err(|e| CoreError::InvalidChainData(format!("invalid getblock result: {e}")))?;
        block.try_into()
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<TxView, CoreError> {
        let raw = self
            .rpc_call(
                "getrawtransaction",
                vec![serde_json::json!(txid.to_string()), serde_json::json!(true)],
            )
            .await
            .map_err(|err| normalize_tx_not_found(txid, err))?;

        let tx: RawTx = serde_json::from_value(raw).map_err(|e| {
            CoreError::InvalidChainData(format!("invalid getrawtransaction result: {e}"))
        })?;
        tx.try_into()
    }

    fn reward_at(&self, _height: BlockHeight, tier: Tier) -> Amount {
        self.rewards.amount(tier)
    }
}

// ==============================================================================
// Raw RPC Shapes
// ==============================================================================

#[derive(Deserialize)]
struct RawBlock {
    hash: BlockHash,
    height: u32,
    #[serde(rename = "previousblockhash")]
    previous_block_hash: Option<BlockHash>,
    tx: Vec<RawTx>,
}

#[derive(Deserialize)]
struct RawTx {
    txid: Txid,
    vin: Vec<RawVin>,
    vout: Vec<RawVout>,
}

#[derive(Deserialize)]
struct RawVin {
    txid: Option<Txid>,
    vout: Option<u32>,
}

#[derive(Deserialize)]
struct RawVout {
    /// Amount in whole coins, as the daemon reports it.
    value: f64,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: RawScriptPubKey,
}

#[derive(Deserialize)]
struct RawScriptPubKey {
    hex: String,
}

impl TryFrom<RawBlock> for BlockView {
    type Error = CoreError;

    fn try_from(raw: RawBlock) -> Result<Self, CoreError> {
        let txs = raw
            .tx
            .into_iter()
            .map(TxView::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BlockView {
            hash: raw.hash,
            height: BlockHeight(raw.height),
            prev: raw.previous_block_hash,
            txs,
        })
    }
}

impl TryFrom<RawTx> for TxView {
    type Error = CoreError;

    fn try_from(raw: RawTx) -> Result<Self, CoreError> {
        let inputs = raw
            .vin
            .into_iter()
            .map(|vin| TxInView {
                prevout: match (vin.txid, vin.vout) {
                    (Some(txid), Some(vout)) => Some(bitcoin::OutPoint::new(txid, vout)),
                    _ => None,
                },
            })
            .collect();

        let outputs = raw
            .vout
            .into_iter()
            .map(|vout| {
                let value = Amount::from_btc(vout.value).map_err(|e| {
                    CoreError::InvalidChainData(format!("invalid output value: {e}"))
                })?;
                let script_pub_key = ScriptBuf::from_hex(&vout.script_pub_key.hex)
                    .map_err(|e| CoreError::InvalidChainData(format!("invalid script hex: {e}")))?;
                Ok(TxOutView {
                    value,
                    script_pub_key,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(TxView {
            txid: raw.txid,
            inputs,
            outputs,
        })
    }
}

// ==============================================================================
// Error Handling
// ==============================================================================

/// Parse a JSON-RPC error value into a structured `CoreError`.
///
/// The JSON-RPC spec defines errors as `{"code": <int>, "message": <string>}`.
/// If the error value matches that shape, we produce a `ServerError`;
/// otherwise we fall back to `InvalidResponse` with the raw JSON.
fn parse_jsonrpc_error(err: serde_json::Value) -> CoreError {
    #[derive(Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    if let Ok(parsed) = serde_json::from_value::<JsonRpcError>(err.clone()) {
        CoreError::Rpc(RpcError::ServerError {
            code: parsed.code,
            message: parsed.message,
        })
    } else {
        CoreError::Rpc(RpcError::InvalidResponse(format!(
            "non-standard JSON-RPC error: {err}"
        )))
    }
}

/// Convert the daemon's "missing tx" JSON-RPC response into `TxNotFound`,
/// keeping not-found semantics strongly typed for the scanner.
fn normalize_tx_not_found(txid: &Txid, err: CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::ServerError { code: -5, .. }) => CoreError::TxNotFound(*txid),
        other => other,
    }
}
