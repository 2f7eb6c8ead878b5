// src/api/mod.rs

pub mod ecosystem;
pub mod health;
pub mod network;
pub mod tokens;
pub mod wallet;

use axum::http::Uri;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::network::NetworkProfile;
use crate::services::EcosystemStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EcosystemStore>,
    pub config: Config,
    pub network: &'static NetworkProfile,
}

/// JSON 404 for any unmatched route.
pub async fn not_found(uri: Uri) -> Result<()> {
    tracing::debug!("no route for {}", uri.path());
    Err(AppError::NotFound(format!("No route for {}", uri.path())))
}
