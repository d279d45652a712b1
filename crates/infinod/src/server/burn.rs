//! Burn precheck — validates a prospective node burn before the operator's
//! wallet builds the transaction.
//!
//! Checks the amount against the configured denominations, the tier's
//! population cap, and — when the wallet has already chosen a funding
//! address — that the address is not already a registered node's payee.
//! Transaction construction itself is the wallet's job.

use axum::extract::State;
use axum::Json;
use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use serde::{Deserialize, Serialize};

use infinod_core::Tier;

use super::error::AppError;
use super::SharedState;

#[derive(Deserialize)]
pub(super) struct BurnPrecheckRequest {
    /// Burn amount in whole coins; must equal a tier denomination exactly.
    pub amount: u64,
    /// Owner-declared recovery address, carried in the burn metadata.
    pub backup_address: String,
    /// The funding address the wallet intends to spend from, if chosen.
    pub funding_address: Option<String>,
}

#[derive(Serialize)]
pub(super) struct BurnPrecheckResponse {
    pub tier: u32,
    pub burn_amount_sat: u64,
    pub sink_address: String,
    pub burn_script: String,
}

pub(super) async fn precheck(
    State(state): State<SharedState>,
    Json(request): Json<BurnPrecheckRequest>,
) -> Result<Json<BurnPrecheckResponse>, AppError> {
    let registry = state.registry.read().await;
    let params = registry.params();

    let Some(tier) = Tier::ALL
        .into_iter()
        .find(|tier| params.denom(*tier) == request.amount)
    else {
        return Err(AppError::BadRequest(
            "invalid amount to burn and run an infinity node".to_string(),
        ));
    };

    if registry.count_tier(tier) >= params.limit(tier) as usize {
        return Err(AppError::Conflict(format!(
            "number of {tier} infinity nodes is full"
        )));
    }

    let backup = request
        .backup_address
        .parse::<Address<NetworkUnchecked>>()
        .ok()
        .and_then(|addr| addr.require_network(params.network).ok());
    if backup.is_none() {
        return Err(AppError::BadRequest(
            "invalid backup address for this network".to_string(),
        ));
    }

    if let Some(funding) = &request.funding_address {
        if registry.payee_address_in_use(funding) {
            return Err(AppError::Conflict(format!(
                "address {funding} already funds a registered node; use a unique address"
            )));
        }
    }

    Ok(Json(BurnPrecheckResponse {
        tier: tier.code(),
        burn_amount_sat: params.burn_amount(tier).to_sat(),
        sink_address: params.sink_address.clone(),
        burn_script: format!("{:x}", params.sink_script.as_script()),
    }))
}
