use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::constants::{
    PROVIDER_CODE_INTERNAL, PROVIDER_CODE_UNRECOGNIZED_CHAIN, PROVIDER_CODE_USER_REJECTED,
};

/// Error object returned by an EIP-1193 `request` call.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(PROVIDER_CODE_INTERNAL, message)
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == PROVIDER_CODE_USER_REJECTED
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == PROVIDER_CODE_UNRECOGNIZED_CHAIN
    }
}

/// Events a wallet pushes to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
}

/// Identity flags a wallet advertises about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportInfo {
    pub name: String,
    pub is_metamask: bool,
    pub is_coinbase_wallet: bool,
}

impl TransportInfo {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let lowered = name.to_ascii_lowercase();
        Self {
            is_metamask: lowered.contains("metamask"),
            is_coinbase_wallet: lowered.contains("coinbase"),
            name,
        }
    }
}

/// One way of reaching a wallet: method name plus params in, JSON result or a
/// coded error out.
#[async_trait]
pub trait WalletTransport: Send + Sync {
    fn info(&self) -> TransportInfo;

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
}
