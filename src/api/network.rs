use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    error::Result,
    models::ApiResponse,
    network::{classify_host, resolve_network, NetworkClass, NetworkProfile},
};

#[derive(Debug, Deserialize)]
pub struct NetworkQuery {
    pub hostname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    pub hostname: String,
    pub class: NetworkClass,
    pub profile: NetworkProfile,
}

/// GET /api/network
pub async fn get_network(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<NetworkResponse>>> {
    let hostname = query
        .hostname
        .filter(|host| !host.trim().is_empty())
        .unwrap_or_else(|| state.config.site_hostname.clone());
    let production = state.config.is_production();

    Ok(Json(ApiResponse::success(NetworkResponse {
        class: classify_host(&hostname, production),
        profile: resolve_network(&hostname, production).clone(),
        hostname,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state_with;

    #[tokio::test]
    async fn explicit_hostname_wins_over_configured_one() {
        let Json(response) = get_network(
            State(state_with(None)),
            Query(NetworkQuery {
                hostname: Some("truth.vercel.app".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.data.profile.chain_id(), 8453);
        assert_eq!(response.data.class, NetworkClass::Mainnet);
    }

    #[tokio::test]
    async fn missing_hostname_uses_site_hostname() {
        let Json(response) = get_network(
            State(state_with(None)),
            Query(NetworkQuery { hostname: None }),
        )
        .await
        .unwrap();
        assert_eq!(response.data.hostname, "localhost");
        assert!(response.data.profile.is_testnet());
    }
}
