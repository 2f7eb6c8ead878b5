use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use url::Url;

use super::transport::{ProviderEvent, ProviderRpcError, TransportInfo, WalletTransport};
use crate::constants::PROVIDER_EVENT_CAPACITY;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ProviderRpcError>,
}

/// JSON-RPC 2.0 over HTTP. Plain HTTP has no push channel, so this transport
/// never emits events; account and chain changes are picked up by the store's
/// wallet poll instead.
pub struct HttpTransport {
    info: TransportInfo,
    endpoint: Url,
    client: Client,
    next_id: AtomicU64,
    events: broadcast::Sender<ProviderEvent>,
}

impl HttpTransport {
    pub fn new(info: TransportInfo, endpoint: &str) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let (events, _) = broadcast::channel(PROVIDER_EVENT_CAPACITY);
        Ok(Self {
            info,
            endpoint,
            client: Client::new(),
            next_id: AtomicU64::new(1),
            events,
        })
    }
}

#[async_trait]
impl WalletTransport for HttpTransport {
    fn info(&self) -> TransportInfo {
        self.info.clone()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!(
            "wallet rpc request transport={} method={} id={}",
            self.info.name,
            method,
            id
        );

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderRpcError::internal(format!("transport failure: {}", e)))?;

        if !resp.status().is_success() {
            return Err(ProviderRpcError::internal(format!(
                "wallet endpoint returned HTTP {}",
                resp.status()
            )));
        }

        let payload: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ProviderRpcError::internal(format!("invalid JSON-RPC response: {}", e)))?;

        if let Some(error) = payload.error {
            return Err(error);
        }
        Ok(payload.result.unwrap_or(Value::Null))
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_endpoint() {
        assert!(HttpTransport::new(TransportInfo::named("MetaMask"), "not a url").is_err());
    }

    #[test]
    fn rpc_error_object_is_preserved() {
        let payload: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 4001, "message": "User rejected the request."}
        }))
        .unwrap();
        let error = payload.error.unwrap();
        assert!(error.is_user_rejection());
        assert!(payload.result.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_maps_to_internal_error() {
        let transport =
            HttpTransport::new(TransportInfo::named("MetaMask"), "http://127.0.0.1:9/rpc").unwrap();
        let err = transport
            .request("eth_chainId", json!([]))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::constants::PROVIDER_CODE_INTERNAL);
    }
}
