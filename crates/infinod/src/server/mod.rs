mod burn;
mod error;
mod infinity;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::{Json, Router};
use tokio::sync::{watch, RwLock};
use tower_http::cors::{AllowOrigin, CorsLayer};

use infinod_core::chain::ChainView;
use infinod_core::{Registry, TipHook};

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub chain: Arc<dyn ChainView>,
    pub registry: Arc<RwLock<Registry>>,
    pub tip_hook: Arc<TipHook>,
    pub snapshot_path: Option<PathBuf>,
    /// Flipped on shutdown; in-flight scans poll it between blocks.
    pub shutdown: watch::Receiver<bool>,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> Router {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches. Otherwise, omit the header entirely so browsers
    // get a clean CORS rejection instead of a mismatched origin value.
    let allowed: axum::http::HeaderValue = origin.parse().expect("valid origin header value");
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate({
            let allowed = allowed.clone();
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed
        }))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let shared = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/infinitynode/{command}", get(infinity::dispatch))
        .route("/api/v1/burn-precheck", post(burn::precheck))
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(shared)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bitcoin::hashes::Hash;
    use bitcoin::{Address, Amount, BlockHash, Network, OutPoint, ScriptBuf, Txid};
    use infinod_core::error::CoreError;
    use infinod_core::types::{
        BlockHeight, BlockView, ConsensusParams, NodeRecord, Tier, TxView, COIN,
    };
    use tower::ServiceExt;

    struct FakeChain;

    #[async_trait]
    impl ChainView for FakeChain {
        async fn best_height(&self) -> Result<BlockHeight, CoreError> {
            Ok(BlockHeight(120))
        }

        async fn block_hash_at(
            &self,
            _height: BlockHeight,
        ) -> Result<Option<BlockHash>, CoreError> {
            Ok(None)
        }

        async fn read_block(&self, hash: &BlockHash) -> Result<BlockView, CoreError> {
            Err(CoreError::BlockUnreadable(*hash))
        }

        async fn get_transaction(&self, txid: &Txid) -> Result<TxView, CoreError> {
            Err(CoreError::TxNotFound(*txid))
        }

        fn reward_at(&self, _height: BlockHeight, _tier: Tier) -> Amount {
            Amount::from_sat(COIN)
        }
    }

    fn p2wpkh_script(tag: u8) -> ScriptBuf {
        let mut bytes = vec![
            0x00, 0x14, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
            0x0d, 0x0e, 0x0f, 0x10, 0x11, 0x12, 0x13, 0x14,
        ];
        bytes[21] = tag;
        ScriptBuf::from_bytes(bytes)
    }

    fn test_params() -> ConsensusParams {
        let sink_script = p2wpkh_script(0xee);
        let sink = Address::from_script(&sink_script, Network::Regtest)
            .expect("sink script is standard");
        let mut params = ConsensusParams::new(Network::Regtest, sink);
        params.infinity_begin_height = BlockHeight(100);
        params.genesis_statement_height = BlockHeight(100);
        params.matured_limit = 5;
        params.limit_lil = 2;
        params
    }

    fn sample_record(tag: u8, created: u32) -> NodeRecord {
        let payee_script = p2wpkh_script(tag);
        let payee_address = Address::from_script(&payee_script, Network::Regtest)
            .expect("payee script is standard")
            .to_string();
        NodeRecord::new(
            OutPoint::new(Txid::from_byte_array([tag; 32]), 0),
            BlockHeight(created),
            Amount::from_sat(100_000 * COIN),
            Tier::Lil,
            payee_address,
            payee_script,
        )
    }

    fn router_with(registry: Registry) -> Router {
        let chain: Arc<dyn ChainView> = Arc::new(FakeChain);
        let registry = Arc::new(RwLock::new(registry));
        let tip_hook = Arc::new(TipHook::new(chain.clone(), registry.clone(), None));
        let (shutdown_tx, shutdown) = watch::channel(false);
        std::mem::forget(shutdown_tx);

        build_router(
            AppState {
                chain,
                registry,
                tip_hook,
                snapshot_path: None,
                shutdown,
            },
            "http://127.0.0.1:3090",
        )
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("request handled");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    async fn post_json(
        router: Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("request handled");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = get_json(router_with(Registry::new(test_params())), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_command_is_bad_request() {
        let (status, body) = get_json(
            router_with(Registry::new(test_params())),
            "/api/v1/infinitynode/frobnicate",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("unknown infinitynode command"));
    }

    #[tokio::test]
    async fn unknown_api_route_is_not_found() {
        let (status, _) = get_json(
            router_with(Registry::new(test_params())),
            "/api/v1/nothing-here",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn show_lastscan_starts_at_zero() {
        let (status, body) = get_json(
            router_with(Registry::new(test_params())),
            "/api/v1/infinitynode/show-lastscan",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(0));
    }

    #[tokio::test]
    async fn show_infos_formats_record_lines() {
        let mut registry = Registry::new(test_params());
        let record = sample_record(1, 101);
        let outpoint = record.burn_outpoint;
        let address = record.payee_address.clone();
        registry.add(record);

        let (status, body) = get_json(router_with(registry), "/api/v1/infinitynode/show-infos").await;
        assert_eq!(status, StatusCode::OK);

        let line = body[outpoint.to_string()].as_str().expect("record line");
        // "address created expire roundedBurn tier lastPaid rank"
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0], address);
        assert_eq!(fields[1], "101");
        assert_eq!(fields[3], "100001");
        assert_eq!(fields[4], "1");
        assert_eq!(fields[5], "-1", "never paid shows -1");
        assert_eq!(fields[6], "0");
    }

    #[tokio::test]
    async fn show_candidate_requires_height() {
        let (status, _) = get_json(
            router_with(Registry::new(test_params())),
            "/api/v1/infinitynode/show-candidate",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(
            router_with(Registry::new(test_params())),
            "/api/v1/infinitynode/show-candidate?height=99",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "below genesis statement");
    }

    #[tokio::test]
    async fn show_candidate_returns_per_tier_addresses() {
        let mut registry = Registry::new(test_params());
        let record = sample_record(1, 101);
        let address = record.payee_address.clone();
        registry.add(record);
        registry.rebuild_statements(Tier::Lil, BlockHeight(110));

        let (status, body) = get_json(
            router_with(registry),
            "/api/v1/infinitynode/show-candidate?height=103",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["LIL"], serde_json::json!(address));
        assert_eq!(body["BIG"], serde_json::Value::Null);
        assert_eq!(body["MID"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn show_stm_summarizes_all_tiers() {
        let (status, body) = get_json(
            router_with(Registry::new(test_params())),
            "/api/v1/infinitynode/show-stm",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let summary = body.as_str().expect("summary string");
        assert!(summary.starts_with("BIG: ["));
        assert!(summary.contains("LIL: ["));
    }

    #[tokio::test]
    async fn burn_precheck_rejects_non_denomination_amount() {
        let (status, body) = post_json(
            router_with(Registry::new(test_params())),
            "/api/v1/burn-precheck",
            serde_json::json!({ "amount": 123, "backup_address": "anything" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid amount"));
    }

    #[tokio::test]
    async fn burn_precheck_rejects_reused_funding_address() {
        let mut registry = Registry::new(test_params());
        let record = sample_record(1, 101);
        let address = record.payee_address.clone();
        let backup = Address::from_script(&p2wpkh_script(9), Network::Regtest)
            .unwrap()
            .to_string();
        registry.add(record);

        let (status, body) = post_json(
            router_with(registry),
            "/api/v1/burn-precheck",
            serde_json::json!({
                "amount": 100_000,
                "backup_address": backup,
                "funding_address": address,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("unique"));
    }

    #[tokio::test]
    async fn burn_precheck_rejects_full_tier() {
        // limit_lil is 2 in test params.
        let mut registry = Registry::new(test_params());
        registry.add(sample_record(1, 101));
        registry.add(sample_record(2, 102));
        let backup = Address::from_script(&p2wpkh_script(9), Network::Regtest)
            .unwrap()
            .to_string();

        let (status, body) = post_json(
            router_with(registry),
            "/api/v1/burn-precheck",
            serde_json::json!({ "amount": 100_000, "backup_address": backup }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("full"));
    }

    #[tokio::test]
    async fn burn_precheck_accepts_valid_burn() {
        let registry = Registry::new(test_params());
        let sink_address = registry.params().sink_address.clone();
        let backup = Address::from_script(&p2wpkh_script(9), Network::Regtest)
            .unwrap()
            .to_string();

        let (status, body) = post_json(
            router_with(registry),
            "/api/v1/burn-precheck",
            serde_json::json!({ "amount": 100_000, "backup_address": backup }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], serde_json::json!(1));
        assert_eq!(body["sink_address"], serde_json::json!(sink_address));
        assert_eq!(
            body["burn_amount_sat"],
            serde_json::json!(100_000u64 * COIN)
        );
    }
}
