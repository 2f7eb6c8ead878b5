use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    error::{AppError, Result},
    models::{ApiResponse, EcosystemState, StateDiff},
};

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub page: String,
}

#[derive(Debug, Serialize)]
pub struct NavigateResponse {
    pub current_page: String,
    pub diff: StateDiff,
}

/// GET /api/ecosystem
pub async fn get_ecosystem(State(state): State<AppState>) -> Json<ApiResponse<EcosystemState>> {
    let snapshot = state.store.snapshot();
    Json(ApiResponse::success((*snapshot).clone()))
}

/// POST /api/navigate
pub async fn navigate(
    State(state): State<AppState>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<ApiResponse<NavigateResponse>>> {
    let page = req.page.trim();
    if page.is_empty() {
        return Err(AppError::BadRequest("page must not be empty".to_string()));
    }

    let diff = state.store.navigate_to(page);
    Ok(Json(ApiResponse::success(NavigateResponse {
        current_page: state.store.snapshot().current_page.clone(),
        diff,
    })))
}
