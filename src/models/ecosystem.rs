use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::DEFAULT_PAGE;

/// The current wallet connection. `connected` implies `address` is set; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WalletSession {
    address: Option<Address>,
    chain_id: Option<u64>,
    connected: bool,
    connected_at: Option<DateTime<Utc>>,
}

impl WalletSession {
    pub fn connected(address: Address, chain_id: u64) -> Self {
        Self {
            address: Some(address),
            chain_id: Some(chain_id),
            connected: true,
            connected_at: Some(Utc::now()),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    /// Repairs sessions that break the connected-implies-address rule, which
    /// can only come from hand-edited or stale persisted data.
    pub fn normalized(self) -> Self {
        if self.connected && self.address.is_none() {
            return Self::disconnected();
        }
        self
    }

    pub fn same_account(&self, address: Address, chain_id: u64) -> bool {
        self.connected && self.address == Some(address) && self.chain_id == Some(chain_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token_symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub raw_balance: U256,
    pub formatted_balance: String,
}

/// Outcome of one token read. `Unavailable` is not the same as a zero balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BalanceReading {
    Available(TokenBalance),
    Unavailable { reason: String },
}

impl BalanceReading {
    pub fn balance(&self) -> Option<&TokenBalance> {
        match self {
            BalanceReading::Available(balance) => Some(balance),
            BalanceReading::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, BalanceReading::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Refreshing,
    Error {
        reason: String,
        code: String,
    },
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Refreshing => "refreshing",
            ConnectionStatus::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VotingTier {
    #[default]
    None,
    Member,
    Delegate,
    Council,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DerivedMetrics {
    pub truth_balance: f64,
    pub creator_balance: f64,
    pub governance_power: f64,
    pub voting_tier: VotingTier,
    pub is_holder: bool,
    pub balances_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcosystemState {
    pub session: WalletSession,
    pub status: ConnectionStatus,
    pub balances: BTreeMap<String, BalanceReading>,
    pub derived: DerivedMetrics,
    pub current_page: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for EcosystemState {
    fn default() -> Self {
        Self {
            session: WalletSession::disconnected(),
            status: ConnectionStatus::Disconnected,
            balances: BTreeMap::new(),
            derived: DerivedMetrics::default(),
            current_page: DEFAULT_PAGE.to_string(),
            updated_at: None,
        }
    }
}

/// Partial state handed to the store's single mutation entry point. Derived
/// metrics are deliberately absent; the store recomputes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub session: Option<WalletSession>,
    pub status: Option<ConnectionStatus>,
    pub balances: Option<BTreeMap<String, BalanceReading>>,
    pub current_page: Option<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(mut self, session: WalletSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn status(mut self, status: ConnectionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn balances(mut self, balances: BTreeMap<String, BalanceReading>) -> Self {
        self.balances = Some(balances);
        self
    }

    pub fn current_page(mut self, page: impl Into<String>) -> Self {
        self.current_page = Some(page.into());
        self
    }

    /// Replaces every base field with the values in `state`.
    pub fn replace_with(state: &EcosystemState) -> Self {
        Self {
            session: Some(state.session.clone()),
            status: Some(state.status.clone()),
            balances: Some(state.balances.clone()),
            current_page: Some(state.current_page.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Session,
    Status,
    Balances,
    Derived,
    CurrentPage,
}

/// Fields whose values changed in one update, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateDiff {
    pub changed: Vec<StateField>,
}

impl StateDiff {
    pub fn between(before: &EcosystemState, after: &EcosystemState) -> Self {
        let mut changed = Vec::new();
        if before.session != after.session {
            changed.push(StateField::Session);
        }
        if before.status != after.status {
            changed.push(StateField::Status);
        }
        if before.balances != after.balances {
            changed.push(StateField::Balances);
        }
        if before.derived != after.derived {
            changed.push(StateField::Derived);
        }
        if before.current_page != after.current_page {
            changed.push(StateField::CurrentPage);
        }
        Self { changed }
    }

    pub fn contains(&self, field: StateField) -> bool {
        self.changed.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}
