//! The `infinitynode` command surface.
//!
//! One dispatch endpoint carrying the operator command set: list building,
//! scan/statement introspection, and deterministic candidate lookup.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use infinod_core::scanner::{self, ScanOutcome};
use infinod_core::types::{BlockHeight, Tier};

use super::error::{map_core_error, AppError};
use super::SharedState;

#[derive(Deserialize)]
pub(super) struct CommandQuery {
    pub height: Option<u32>,
}

pub(super) async fn dispatch(
    State(state): State<SharedState>,
    Path(command): Path<String>,
    Query(query): Query<CommandQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    match command.as_str() {
        "build-list" => build_list(&state).await,
        "show-lastscan" => show_lastscan(&state).await,
        "show-infos" => show_infos(&state).await,
        "show-lastpaid" => show_lastpaid(&state).await,
        "build-stm" => build_stm(&state).await,
        "show-stm" => show_stm(&state).await,
        "show-candidate" => show_candidate(&state, query.height).await,
        "stats" => stats(&state).await,
        other => Err(AppError::BadRequest(format!(
            "unknown infinitynode command: {other}"
        ))),
    }
}

async fn build_list(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let tip = state
        .chain
        .best_height()
        .await
        .map_err(map_core_error)?;
    state.tip_hook.updated_block_tip(tip);

    let mut registry = state.registry.write().await;
    let outcome = scanner::update_list(
        state.chain.as_ref(),
        &mut registry,
        tip,
        state.snapshot_path.as_deref(),
        &state.shutdown,
    )
    .await
    .map_err(map_core_error)?;

    Ok(Json(serde_json::json!(outcome == ScanOutcome::Completed)))
}

async fn show_lastscan(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let registry = state.registry.read().await;
    Ok(Json(serde_json::json!(registry.last_scan_height().0)))
}

async fn show_infos(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let registry = state.registry.read().await;
    let mut infos = serde_json::Map::new();
    for (outpoint, record) in registry.full_map() {
        let last_paid = record
            .last_paid_height
            .map(|h| h.0 as i64)
            .unwrap_or(-1);
        infos.insert(
            outpoint.to_string(),
            serde_json::json!(format!(
                "{} {} {} {} {} {} {}",
                record.payee_address,
                record.created_height,
                record.expire_height,
                record.rounded_burn(),
                record.tier.code(),
                last_paid,
                record.rank
            )),
        );
    }
    Ok(Json(serde_json::Value::Object(infos)))
}

async fn show_lastpaid(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let registry = state.registry.read().await;
    let mut entries: Vec<(String, u32)> = registry
        .full_payee_index()
        .into_iter()
        .map(|(script, height)| (format!("{:x}", script.as_script()), height.0))
        .collect();
    entries.sort();

    let mut paid = serde_json::Map::new();
    for (script_hex, height) in entries {
        paid.insert(script_hex, serde_json::json!(height));
    }
    Ok(Json(serde_json::Value::Object(paid)))
}

async fn build_stm(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let mut tip = state.tip_hook.cached_height();
    if tip.0 == 0 {
        tip = state
            .chain
            .best_height()
            .await
            .map_err(map_core_error)?;
    }

    let mut registry = state.registry.write().await;
    for tier in Tier::ALL {
        registry.rebuild_statements(tier, tip);
    }
    Ok(Json(serde_json::json!(true)))
}

async fn show_stm(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let registry = state.registry.read().await;
    Ok(Json(serde_json::json!(registry.statement_summary())))
}

async fn show_candidate(
    state: &SharedState,
    height: Option<u32>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(height) = height else {
        return Err(AppError::BadRequest(
            "usage: show-candidate?height=<n>".to_string(),
        ));
    };

    // Ranks are recomputed during candidate lookup, so this takes the
    // write guard like the scan paths do.
    let mut registry = state.registry.write().await;
    let genesis = registry.params().genesis_statement_height;
    if BlockHeight(height) < genesis {
        return Err(AppError::BadRequest(format!(
            "height must be at least the genesis statement height {genesis}"
        )));
    }

    let candidate = |registry: &mut infinod_core::Registry, tier| {
        registry
            .candidate_at(BlockHeight(height), tier)
            .map(|record| record.payee_address)
    };
    let big = candidate(&mut registry, Tier::Big);
    let mid = candidate(&mut registry, Tier::Mid);
    let lil = candidate(&mut registry, Tier::Lil);

    Ok(Json(serde_json::json!({
        "BIG": big,
        "MID": mid,
        "LIL": lil,
    })))
}

async fn stats(state: &SharedState) -> Result<Json<serde_json::Value>, AppError> {
    let tip = state.tip_hook.cached_height();
    let registry = state.registry.read().await;

    let mut per_tier = serde_json::Map::new();
    for tier in Tier::ALL {
        let reward = state.chain.reward_at(tip, tier);
        per_tier.insert(
            tier.to_string(),
            serde_json::json!({
                "count": registry.count_tier(tier),
                "limit": registry.params().limit(tier),
                "roi_days": registry.roi_days(tier, reward),
            }),
        );
    }

    Ok(Json(serde_json::json!({
        "total": registry.count(),
        "last_scan_height": registry.last_scan_height().0,
        "tiers": per_tier,
    })))
}
