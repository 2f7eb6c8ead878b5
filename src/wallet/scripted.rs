//! In-memory wallet used by tests: canned answers per method, recorded calls,
//! and manually emitted events.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use super::transport::{ProviderEvent, ProviderRpcError, TransportInfo, WalletTransport};

#[derive(Debug, Clone)]
pub enum Scripted {
    Ok(Value),
    Err(ProviderRpcError),
    Delayed(Duration, Box<Scripted>),
    Hang,
}

impl Scripted {
    pub fn rpc_error(code: i64, message: &str) -> Self {
        Scripted::Err(ProviderRpcError::new(code, message))
    }

    pub fn delayed(millis: u64, inner: Scripted) -> Self {
        Scripted::Delayed(Duration::from_millis(millis), Box::new(inner))
    }
}

pub struct ScriptedTransport {
    info: TransportInfo,
    defaults: Mutex<HashMap<String, Scripted>>,
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<ProviderEvent>,
}

// Internal helper that keys `eth_call` answers by target contract.
fn script_key(method: &str, params: &Value) -> String {
    if method == "eth_call" {
        let to = params
            .get(0)
            .and_then(|call| call.get("to"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        return format!("eth_call:{}", to);
    }
    method.to_string()
}

impl ScriptedTransport {
    pub fn new(info: TransportInfo) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            info,
            defaults: Mutex::new(HashMap::new()),
            queued: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    /// A wallet that is unlocked on `address` and sitting on `chain_id`.
    pub fn wallet(name: &str, address: &str, chain_id: u64) -> Self {
        let transport = Self::new(TransportInfo::named(name));
        transport.set_account(Some(address));
        transport.set_chain(chain_id);
        transport
    }

    pub fn on(&self, method: &str, answer: Scripted) {
        self.defaults
            .lock()
            .unwrap()
            .insert(method.to_string(), answer);
    }

    pub fn once(&self, method: &str, answer: Scripted) {
        self.queued
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(answer);
    }

    pub fn on_token(&self, token: &str, answer: Scripted) {
        self.on(&format!("eth_call:{}", token.to_ascii_lowercase()), answer);
    }

    pub fn set_account(&self, address: Option<&str>) {
        let accounts = match address {
            Some(address) => json!([address]),
            None => json!([]),
        };
        self.on("eth_requestAccounts", Scripted::Ok(accounts.clone()));
        self.on("eth_accounts", Scripted::Ok(accounts));
    }

    pub fn set_chain(&self, chain_id: u64) {
        self.on("eth_chainId", Scripted::Ok(json!(format!("0x{:x}", chain_id))));
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params)
            .collect()
    }

    fn answer_for(&self, method: &str, params: &Value) -> Option<Scripted> {
        let key = script_key(method, params);
        if let Some(answer) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return Some(answer);
        }
        self.defaults.lock().unwrap().get(&key).cloned()
    }
}

async fn play(answer: Scripted) -> Result<Value, ProviderRpcError> {
    let mut answer = answer;
    loop {
        match answer {
            Scripted::Ok(value) => return Ok(value),
            Scripted::Err(err) => return Err(err),
            Scripted::Hang => std::future::pending::<()>().await,
            Scripted::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                answer = *inner;
            }
        }
    }
}

#[async_trait]
impl WalletTransport for ScriptedTransport {
    fn info(&self) -> TransportInfo {
        self.info.clone()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));
        match self.answer_for(method, &params) {
            Some(answer) => play(answer).await,
            None => Err(ProviderRpcError::new(
                4200,
                format!("unsupported method {}", method),
            )),
        }
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
