use ethers::types::Address;
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{
    address::parse_address,
    discovery::ProviderDiscovery,
    transport::{ProviderEvent, ProviderRpcError, WalletTransport},
};
use crate::{
    constants::{CONNECT_TIMEOUT_SECS, PROVIDER_CALL_TIMEOUT_SECS},
    error::WalletError,
    network::{parse_chain_id, NetworkProfile},
};

pub type AccountsHandler = Arc<dyn Fn(Vec<String>) + Send + Sync>;
pub type ChainHandler = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct AdapterTimeouts {
    pub connect: Duration,
    pub provider_call: Duration,
}

impl Default for AdapterTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            provider_call: Duration::from_secs(PROVIDER_CALL_TIMEOUT_SECS),
        }
    }
}

/// Result of a successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletConnection {
    pub address: Address,
    pub chain_id: u64,
}

#[derive(Default)]
struct Subscriptions {
    accounts: Option<AccountsHandler>,
    chain: Option<ChainHandler>,
}

struct EventPump {
    transport: Arc<dyn WalletTransport>,
    task: JoinHandle<()>,
}

enum CallFailure {
    Rpc(ProviderRpcError),
    TimedOut(Duration),
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallFailure::Rpc(err) => write!(f, "{}", err),
            CallFailure::TimedOut(after) => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

// Internal helper that compares transports by allocation, ignoring vtables.
fn same_transport(a: &Arc<dyn WalletTransport>, b: &Arc<dyn WalletTransport>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Uniform wallet interface over whichever transport discovery finds. Holds no
/// session state; results are returned and events forwarded to the caller.
pub struct WalletProviderAdapter {
    discovery: ProviderDiscovery,
    target: NetworkProfile,
    timeouts: AdapterTimeouts,
    subscriptions: Arc<Mutex<Subscriptions>>,
    pump: Mutex<Option<EventPump>>,
}

impl WalletProviderAdapter {
    pub fn new(discovery: ProviderDiscovery, target: NetworkProfile) -> Self {
        Self::with_timeouts(discovery, target, AdapterTimeouts::default())
    }

    pub fn with_timeouts(
        discovery: ProviderDiscovery,
        target: NetworkProfile,
        timeouts: AdapterTimeouts,
    ) -> Self {
        Self {
            discovery,
            target,
            timeouts,
            subscriptions: Arc::new(Mutex::new(Subscriptions::default())),
            pump: Mutex::new(None),
        }
    }

    /// Re-obtains the wallet transport and makes sure events from it reach the
    /// registered handlers.
    pub fn transport(&self) -> Result<Arc<dyn WalletTransport>, WalletError> {
        let (strategy, transport) = self
            .discovery
            .discover()
            .ok_or(WalletError::NoProviderFound)?;
        tracing::debug!(
            "wallet transport selected name={} strategy={:?}",
            transport.info().name,
            strategy
        );
        self.ensure_pump(&transport);
        Ok(transport)
    }

    /// Requests account access. Retries exactly once, after switching chains,
    /// when the wallet sits on the wrong network.
    pub async fn connect(&self) -> Result<WalletConnection, WalletError> {
        match self.connect_once().await {
            Err(WalletError::WrongNetwork { expected, actual }) => {
                tracing::info!(
                    "wallet on chain {} instead of {}; switching and retrying connect",
                    actual,
                    expected
                );
                self.switch_or_add_chain(&self.target).await?;
                self.connect_once().await
            }
            other => other,
        }
    }

    async fn connect_once(&self) -> Result<WalletConnection, WalletError> {
        let transport = self.transport()?;
        let accounts = self
            .call(
                &transport,
                "eth_requestAccounts",
                json!([]),
                self.timeouts.connect,
            )
            .await
            .map_err(|failure| self.to_wallet_error("eth_requestAccounts", failure))?;
        let address = first_account(&accounts)?;

        let chain_id = self.chain_on(&transport).await?;
        let expected = self.target.chain_id();
        if chain_id != expected {
            return Err(WalletError::WrongNetwork {
                expected,
                actual: chain_id,
            });
        }

        tracing::info!("wallet connected address={:#x} chain={}", address, chain_id);
        Ok(WalletConnection { address, chain_id })
    }

    /// Accounts the wallet has already authorized, without prompting.
    pub async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        let transport = self.transport()?;
        let value = self
            .call(
                &transport,
                "eth_accounts",
                json!([]),
                self.timeouts.provider_call,
            )
            .await
            .map_err(|failure| self.to_wallet_error("eth_accounts", failure))?;
        parse_accounts(&value)
    }

    pub async fn current_chain(&self) -> Result<u64, WalletError> {
        let transport = self.transport()?;
        self.chain_on(&transport).await
    }

    async fn chain_on(&self, transport: &Arc<dyn WalletTransport>) -> Result<u64, WalletError> {
        let value = self
            .call(transport, "eth_chainId", json!([]), self.timeouts.provider_call)
            .await
            .map_err(|failure| self.to_wallet_error("eth_chainId", failure))?;
        value
            .as_str()
            .and_then(parse_chain_id)
            .or_else(|| value.as_u64())
            .ok_or_else(|| {
                WalletError::Provider(ProviderRpcError::internal(format!(
                    "malformed chain id: {}",
                    value
                )))
            })
    }

    /// Switches the wallet to `profile`, adding the chain first when the wallet
    /// does not know it.
    pub async fn switch_or_add_chain(&self, profile: &NetworkProfile) -> Result<(), WalletError> {
        let transport = self.transport()?;
        let switch_params = json!([{ "chainId": profile.chain_id_hex }]);
        match self
            .call(
                &transport,
                "wallet_switchEthereumChain",
                switch_params,
                self.timeouts.connect,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(CallFailure::Rpc(err)) if err.is_unrecognized_chain() => {
                tracing::info!("chain {} unknown to wallet; adding it", profile.chain_name);
                let add_params = json!([profile]);
                self.call(
                    &transport,
                    "wallet_addEthereumChain",
                    add_params,
                    self.timeouts.connect,
                )
                .await
                .map(|_| ())
                .map_err(|failure| {
                    WalletError::ChainSwitchFailed(format!("add chain failed: {}", failure))
                })
            }
            Err(failure) => Err(WalletError::ChainSwitchFailed(failure.to_string())),
        }
    }

    /// Registers the account-change handler. Returns `false` when one is
    /// already registered; the existing handler is kept.
    pub fn subscribe_account_change(&self, handler: AccountsHandler) -> bool {
        let mut subs = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subs.accounts.is_some() {
            tracing::warn!("account change handler already registered; ignoring");
            return false;
        }
        subs.accounts = Some(handler);
        true
    }

    /// Registers the chain-change handler. Same register-once rule as accounts.
    pub fn subscribe_chain_change(&self, handler: ChainHandler) -> bool {
        let mut subs = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subs.chain.is_some() {
            tracing::warn!("chain change handler already registered; ignoring");
            return false;
        }
        subs.chain = Some(handler);
        true
    }

    fn ensure_pump(&self, transport: &Arc<dyn WalletTransport>) {
        let mut pump = self.pump.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = pump.as_ref() {
            if same_transport(&existing.transport, transport) && !existing.task.is_finished() {
                return;
            }
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime; wallet events not forwarded");
            return;
        };
        if let Some(old) = pump.take() {
            old.task.abort();
        }

        let mut events = transport.events();
        let subscriptions = self.subscriptions.clone();
        let task = runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => dispatch_event(&subscriptions, event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("wallet event pump lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *pump = Some(EventPump {
            transport: transport.clone(),
            task,
        });
    }

    async fn call(
        &self,
        transport: &Arc<dyn WalletTransport>,
        method: &str,
        params: Value,
        limit: Duration,
    ) -> Result<Value, CallFailure> {
        match tokio::time::timeout(limit, transport.request(method, params)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::debug!("wallet rpc {} failed: {}", method, err);
                Err(CallFailure::Rpc(err))
            }
            Err(_) => {
                tracing::warn!("wallet rpc {} timed out after {:?}", method, limit);
                Err(CallFailure::TimedOut(limit))
            }
        }
    }

    fn to_wallet_error(&self, method: &str, failure: CallFailure) -> WalletError {
        match failure {
            CallFailure::Rpc(err) if err.is_user_rejection() => WalletError::UserRejected,
            CallFailure::Rpc(err) => WalletError::Provider(err),
            CallFailure::TimedOut(after) => WalletError::Timeout {
                operation: method.to_string(),
                secs: after.as_secs(),
            },
        }
    }
}

impl Drop for WalletProviderAdapter {
    fn drop(&mut self) {
        if let Some(pump) = self
            .pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.task.abort();
        }
    }
}

fn dispatch_event(subscriptions: &Mutex<Subscriptions>, event: ProviderEvent) {
    // Clone the handler out so it runs without the lock held.
    match event {
        ProviderEvent::AccountsChanged(accounts) => {
            let handler = subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .accounts
                .clone();
            if let Some(handler) = handler {
                handler(accounts);
            }
        }
        ProviderEvent::ChainChanged(chain) => {
            let handler = subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .chain
                .clone();
            if let Some(handler) = handler {
                handler(chain);
            }
        }
    }
}

fn parse_accounts(value: &Value) -> Result<Vec<Address>, WalletError> {
    let list = value.as_array().ok_or_else(|| {
        WalletError::InvalidAddress(format!("expected account list, got {}", value))
    })?;
    list.iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| WalletError::InvalidAddress(item.to_string()))
                .and_then(parse_address)
        })
        .collect()
}

fn first_account(value: &Value) -> Result<Address, WalletError> {
    let first = value
        .as_array()
        .and_then(|list| list.first())
        .and_then(Value::as_str)
        .ok_or_else(|| WalletError::InvalidAddress("wallet returned no accounts".to_string()))?;
    parse_address(first)
}
