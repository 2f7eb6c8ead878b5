use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::wallet::transport::ProviderRpcError;

/// Failures surfaced by the wallet provider adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("No wallet provider found")]
    NoProviderFound,

    #[error("Request rejected by user")]
    UserRejected,

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },

    #[error("Chain switch failed: {0}")]
    ChainSwitchFailed(String),

    #[error("Connect superseded by a wallet change")]
    Superseded,

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderRpcError),
}

impl WalletError {
    /// Short message telling the user what to do next.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::NoProviderFound => {
                "No wallet detected. Install MetaMask or Coinbase Wallet and try again.".to_string()
            }
            WalletError::UserRejected => {
                "Connection request was rejected in your wallet.".to_string()
            }
            WalletError::Timeout { .. } => {
                "Wallet did not respond in time. Open your wallet and retry.".to_string()
            }
            WalletError::InvalidAddress(_) => {
                "Wallet returned an invalid account address.".to_string()
            }
            WalletError::WrongNetwork { expected, .. } => {
                format!("Wrong network. Switch your wallet to chain {}.", expected)
            }
            WalletError::ChainSwitchFailed(_) => {
                "Could not switch your wallet to the required network.".to_string()
            }
            WalletError::Superseded => {
                "Your wallet changed while connecting. Please connect again.".to_string()
            }
            WalletError::Provider(err) => format!("Wallet error: {}", err.message),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WalletError::NoProviderFound => "NO_WALLET",
            WalletError::UserRejected => "USER_REJECTED",
            WalletError::Timeout { .. } => "TIMEOUT",
            WalletError::InvalidAddress(_) => "INVALID_ADDRESS",
            WalletError::WrongNetwork { .. } => "WRONG_NETWORK",
            WalletError::ChainSwitchFailed(_) => "CHAIN_SWITCH_FAILED",
            WalletError::Superseded => "SUPERSEDED",
            WalletError::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

/// Failures of the persisted state blob. Never fatal on load.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Persisted state is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Wallet(ref err) => {
                let status = match err {
                    WalletError::NoProviderFound => StatusCode::FAILED_DEPENDENCY,
                    WalletError::UserRejected => StatusCode::FORBIDDEN,
                    WalletError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
                    WalletError::InvalidAddress(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    WalletError::WrongNetwork { .. }
                    | WalletError::ChainSwitchFailed(_)
                    | WalletError::Superseded => StatusCode::CONFLICT,
                    WalletError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.user_message())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
