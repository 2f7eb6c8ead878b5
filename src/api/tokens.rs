use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::{
    error::Result,
    integrations::{collection_url, explorer_token_url, swap_url},
    models::{ApiResponse, BalanceReading},
    wallet::address::checksum_address,
};

#[derive(Debug, Serialize)]
pub struct TokenView {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    pub swap_url: String,
    pub explorer_url: Option<String>,
    pub balance: Option<BalanceReading>,
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub network: String,
    pub collection_url: String,
    pub tokens: Vec<TokenView>,
}

/// GET /api/tokens
pub async fn list_tokens(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TokensResponse>>> {
    let snapshot = state.store.snapshot();
    let profile = state.network;

    let mut tokens = Vec::with_capacity(state.store.tokens().len());
    for token in state.store.tokens() {
        let explorer_url = match explorer_token_url(token, profile) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!("No explorer link for {}: {}", token.symbol, e);
                None
            }
        };
        tokens.push(TokenView {
            symbol: token.symbol.clone(),
            address: checksum_address(&token.address),
            decimals: token.decimals,
            swap_url: swap_url(token, profile)?.to_string(),
            explorer_url,
            balance: snapshot.balances.get(&token.symbol).cloned(),
        });
    }

    Ok(Json(ApiResponse::success(TokensResponse {
        network: profile.chain_name.clone(),
        collection_url: collection_url(profile)?.to_string(),
        tokens,
    })))
}
