use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::{
    error::Result,
    models::{ApiResponse, EcosystemState},
    wallet::address::checksum_address,
};

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub address: String,
    pub chain_id: u64,
    pub connected_at: Option<DateTime<Utc>>,
    pub state: EcosystemState,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub applied: bool,
    pub state: EcosystemState,
}

/// POST /api/wallet/connect
pub async fn connect_wallet(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ConnectResponse>>> {
    let connection = state.store.connect().await?;
    let snapshot = state.store.snapshot();

    Ok(Json(ApiResponse::success(ConnectResponse {
        address: checksum_address(&connection.address),
        chain_id: connection.chain_id,
        connected_at: snapshot.session.connected_at(),
        state: (*snapshot).clone(),
    })))
}

/// POST /api/wallet/disconnect
pub async fn disconnect_wallet(State(state): State<AppState>) -> Json<ApiResponse<EcosystemState>> {
    state.store.disconnect();
    Json(ApiResponse::success((*state.store.snapshot()).clone()))
}

/// POST /api/wallet/refresh
pub async fn refresh_balances(State(state): State<AppState>) -> Json<ApiResponse<RefreshResponse>> {
    let applied = state.store.refresh_balances().await;
    Json(ApiResponse::success(RefreshResponse {
        applied,
        state: (*state.store.snapshot()).clone(),
    }))
}
