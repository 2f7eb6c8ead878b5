use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::{
    constants::STATE_STORAGE_KEY,
    error::WalletError,
    models::{
        ConnectionStatus, EcosystemState, StateDiff, StateUpdate, TokenDescriptor, WalletSession,
    },
    network::{chain_id_to_hex, parse_chain_id, profile_by_chain_id},
    services::{
        metrics::compute_derived,
        storage::{decode_state, encode_state, StateStorage},
        token_balances::TokenBalanceReader,
    },
    wallet::{
        address::{format_address, parse_address},
        WalletConnection, WalletProviderAdapter,
    },
};

pub type StateListener = Arc<dyn Fn(&Arc<EcosystemState>, &StateDiff) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, StateListener)>,
}

/// Owner of the shared ecosystem state.
///
/// Every change goes through [`EcosystemStore::apply_update`], which merges the
/// partial update, recomputes derived metrics from the merged state, persists
/// the result and then notifies listeners in registration order. Readers only
/// ever see immutable `Arc` snapshots.
pub struct EcosystemStore {
    state: Mutex<Arc<EcosystemState>>,
    // Serializes merge, persist and notify so listeners observe updates in order.
    writer: Mutex<()>,
    subscribers: Mutex<Subscribers>,
    storage: Arc<dyn StateStorage>,
    adapter: Arc<WalletProviderAdapter>,
    reader: TokenBalanceReader,
    tokens: Vec<TokenDescriptor>,
}

impl EcosystemStore {
    /// Builds the store from persisted state merged over defaults. Unreadable or
    /// corrupt storage is logged and replaced by defaults.
    pub fn load(
        storage: Arc<dyn StateStorage>,
        adapter: Arc<WalletProviderAdapter>,
        reader: TokenBalanceReader,
        tokens: Vec<TokenDescriptor>,
    ) -> Arc<Self> {
        let mut initial = read_persisted(storage.as_ref());
        initial.derived = compute_derived(&initial);

        Arc::new(Self {
            state: Mutex::new(Arc::new(initial)),
            writer: Mutex::new(()),
            subscribers: Mutex::new(Subscribers::default()),
            storage,
            adapter,
            reader,
            tokens,
        })
    }

    pub fn snapshot(&self) -> Arc<EcosystemState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn tokens(&self) -> &[TokenDescriptor] {
        &self.tokens
    }

    /// Listeners run synchronously inside the update; they must not call
    /// `apply_update` themselves (spawn a task instead).
    pub fn subscribe(&self, listener: StateListener) -> SubscriptionId {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.entries.push((id, listener));
        id
    }

    #[cfg(test)]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.entries.len();
        subs.entries.retain(|(entry_id, _)| *entry_id != id);
        subs.entries.len() != before
    }

    /// The single mutation entry point.
    pub fn apply_update(&self, update: StateUpdate) -> StateDiff {
        self.apply_update_if(|_| true, update)
            .unwrap_or_default()
    }

    /// Applies `update` only if `guard` holds for the state current at the time
    /// of the write. Returns `None` when the guard rejected the update.
    pub fn apply_update_if<F>(&self, guard: F, update: StateUpdate) -> Option<StateDiff>
    where
        F: FnOnce(&EcosystemState) -> bool,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let before = self.snapshot();
        if !guard(&before) {
            return None;
        }

        let mut next = (*before).clone();
        if let Some(session) = update.session {
            next.session = session;
        }
        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(balances) = update.balances {
            next.balances = balances;
        }
        if let Some(page) = update.current_page {
            next.current_page = page;
        }
        next.derived = compute_derived(&next);
        next.updated_at = Some(Utc::now());

        let next = Arc::new(next);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next.clone();
        let diff = StateDiff::between(&before, &next);
        if diff.is_empty() {
            tracing::trace!("state update changed nothing");
        }

        self.persist(&next);

        let listeners: Vec<StateListener> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&next, &diff);
        }

        Some(diff)
    }

    fn persist(&self, state: &EcosystemState) {
        let result =
            encode_state(state).and_then(|json| self.storage.save(STATE_STORAGE_KEY, &json));
        if let Err(err) = result {
            tracing::error!("failed to persist ecosystem state: {}", err);
        }
    }

    /// Disconnected -> Connecting -> Connected (then a balance refresh), or
    /// Error with the reason kept for display. The outcome is dropped when the
    /// session was reset while the wallet was answering.
    pub async fn connect(&self) -> Result<WalletConnection, WalletError> {
        self.apply_update(StateUpdate::new().status(ConnectionStatus::Connecting));

        match self.adapter.connect().await {
            Ok(connection) => {
                let previous = self.snapshot().session.address();
                let mut update = StateUpdate::new()
                    .session(WalletSession::connected(
                        connection.address,
                        connection.chain_id,
                    ))
                    .status(ConnectionStatus::Connected);
                if previous != Some(connection.address) {
                    update = update.balances(Default::default());
                }
                let applied = self.apply_update_if(
                    |state| {
                        state.status == ConnectionStatus::Connecting
                            && state.session.address() == previous
                    },
                    update,
                );
                if applied.is_none() {
                    tracing::debug!(
                        "discarding connect result for {}; session changed meanwhile",
                        format_address(&connection.address)
                    );
                    return Err(WalletError::Superseded);
                }
                self.refresh_balances().await;
                Ok(connection)
            }
            Err(err) => {
                tracing::warn!("wallet connect failed: {}", err);
                self.apply_update_if(
                    |state| state.status == ConnectionStatus::Connecting,
                    StateUpdate::new()
                        .session(WalletSession::disconnected())
                        .balances(Default::default())
                        .status(ConnectionStatus::Error {
                            reason: err.user_message(),
                            code: err.code().to_string(),
                        }),
                );
                Err(err)
            }
        }
    }

    pub fn disconnect(&self) -> StateDiff {
        tracing::info!("wallet session reset");
        self.apply_update(
            StateUpdate::new()
                .session(WalletSession::disconnected())
                .balances(Default::default())
                .status(ConnectionStatus::Disconnected),
        )
    }

    pub fn navigate_to(&self, page: &str) -> StateDiff {
        self.apply_update(StateUpdate::new().current_page(page.trim()))
    }

    /// Re-reads all token balances for the current session. Returns whether the
    /// result was applied; results for a session that changed meanwhile are
    /// dropped.
    pub async fn refresh_balances(&self) -> bool {
        let current = self.snapshot();
        let (Some(address), Some(chain_id)) =
            (current.session.address(), current.session.chain_id())
        else {
            return false;
        };
        if !current.session.is_connected() {
            return false;
        }

        let started = self.apply_update_if(
            |state| {
                state.session.same_account(address, chain_id)
                    && state.status == ConnectionStatus::Connected
            },
            StateUpdate::new().status(ConnectionStatus::Refreshing),
        );
        if started.is_none() {
            tracing::debug!("balance refresh skipped; session busy or changed");
            return false;
        }

        let transport = match self.adapter.transport() {
            Ok(transport) => transport,
            Err(err) => {
                tracing::warn!("balance refresh without transport: {}", err);
                self.apply_update_if(
                    |state| state.session.same_account(address, chain_id),
                    StateUpdate::new().status(ConnectionStatus::Connected),
                );
                return false;
            }
        };

        let balances = self
            .reader
            .read_balances(address, transport.as_ref(), &self.tokens)
            .await;

        let applied = self
            .apply_update_if(
                |state| state.session.same_account(address, chain_id),
                StateUpdate::new()
                    .balances(balances)
                    .status(ConnectionStatus::Connected),
            )
            .is_some();
        if !applied {
            tracing::debug!(
                "discarding stale balance refresh for {}",
                format_address(&address)
            );
        }
        applied
    }

    /// Wallet reported a new account list.
    pub async fn handle_accounts_changed(&self, accounts: Vec<String>) {
        let current = self.snapshot();
        let Some(first) = accounts.first() else {
            if current.session.is_connected() || current.status != ConnectionStatus::Disconnected
            {
                self.disconnect();
            }
            return;
        };
        if !current.session.is_connected() {
            tracing::debug!("accounts changed while disconnected; ignoring");
            return;
        }

        match parse_address(first) {
            Ok(address) if current.session.address() == Some(address) => {}
            Ok(address) => {
                tracing::info!("wallet switched to {}", format_address(&address));
                if let Err(err) = self.connect().await {
                    tracing::warn!("reconnect after account change failed: {}", err);
                }
            }
            Err(err) => {
                tracing::warn!("wallet reported unusable account: {}", err);
                self.disconnect();
            }
        }
    }

    /// Wallet switched chains. State is reset and rebuilt from storage rather than
    /// migrated across chains.
    pub async fn handle_chain_changed(&self, chain: String) {
        let current = self.snapshot();
        let new_chain = parse_chain_id(&chain);
        if !current.session.is_connected() {
            tracing::debug!("chain changed to {} while disconnected", chain);
            return;
        }
        if new_chain.is_some() && new_chain == current.session.chain_id() {
            return;
        }

        let label = new_chain
            .and_then(profile_by_chain_id)
            .map(|profile| profile.chain_name.as_str())
            .unwrap_or("unsupported chain");
        tracing::info!("wallet chain changed to {} ({}); reinitializing", chain, label);

        // Storage is read before the reset is written, otherwise the reload
        // would only see the reset itself.
        let persisted = read_persisted(self.storage.as_ref());
        self.apply_update(
            StateUpdate::replace_with(&persisted)
                .session(WalletSession::disconnected())
                .balances(Default::default())
                .status(ConnectionStatus::Disconnected),
        );
        self.restore_session().await;
    }

    /// Reconnects when the wallet still authorizes an account (`eth_accounts`)
    /// and resets the session otherwise. The account query never prompts, but
    /// the reconnect may ask the user to switch chains.
    pub async fn restore_session(&self) -> bool {
        let accounts = match self.adapter.accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::debug!("session restore skipped: {}", err);
                if self.snapshot().session.is_connected() {
                    self.disconnect();
                }
                return false;
            }
        };

        if accounts.is_empty() {
            if self.snapshot().session.is_connected() {
                self.disconnect();
            }
            return false;
        }

        self.connect().await.is_ok()
    }

    /// One pass of the wallet poll: compares what the wallet reports with the
    /// session and routes differences to the change handlers.
    pub async fn reconcile_wallet(&self) {
        let current = self.snapshot();
        if !current.session.is_connected() {
            return;
        }

        let accounts = match self.adapter.accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::debug!("wallet poll failed: {}", err);
                return;
            }
        };
        if accounts.first().copied() != current.session.address() {
            let accounts = accounts.iter().map(format_address).collect();
            self.handle_accounts_changed(accounts).await;
            return;
        }

        match self.adapter.current_chain().await {
            Ok(chain_id) if Some(chain_id) != current.session.chain_id() => {
                self.handle_chain_changed(chain_id_to_hex(chain_id)).await;
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("wallet chain poll failed: {}", err),
        }
    }

    /// Routes wallet push events into the store. Handlers hold a weak reference
    /// so they never keep the store alive.
    pub fn attach_wallet_events(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.adapter.subscribe_account_change(Arc::new(move |accounts| {
            if let Some(store) = weak.upgrade() {
                tokio::spawn(async move { store.handle_accounts_changed(accounts).await });
            }
        }));

        let weak: Weak<Self> = Arc::downgrade(self);
        self.adapter.subscribe_chain_change(Arc::new(move |chain| {
            if let Some(store) = weak.upgrade() {
                tokio::spawn(async move { store.handle_chain_changed(chain).await });
            }
        }));
    }
}

fn read_persisted(storage: &dyn StateStorage) -> EcosystemState {
    match storage.load(STATE_STORAGE_KEY) {
        Ok(Some(raw)) => decode_state(&raw).unwrap_or_else(|err| {
            tracing::warn!("discarding persisted state: {}", err);
            EcosystemState::default()
        }),
        Ok(None) => EcosystemState::default(),
        Err(err) => {
            tracing::warn!("could not read persisted state: {}", err);
            EcosystemState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROVIDER_CODE_USER_REJECTED;
    use crate::models::{BalanceReading, StateField};
    use crate::network::base_sepolia;
    use crate::services::storage::MemoryStorage;
    use crate::wallet::discovery::{PreferredWallet, ProviderDiscovery, WalletEnvironment};
    use crate::wallet::scripted::{Scripted, ScriptedTransport};
    use crate::wallet::{AdapterTimeouts, ProviderEvent};
    use ethers::abi::AbiEncode;
    use ethers::types::{Address, Bytes, U256};
    use quickcheck::{quickcheck, Arbitrary, Gen};
    use std::time::Duration;

    const ALICE: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const BOB: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";
    const TRUTH: &str = "0x0000000000000000000000000000000000000001";
    const CREATOR: &str = "0x0000000000000000000000000000000000000002";
    const SEPOLIA: u64 = 84532;

    fn tokens() -> Vec<TokenDescriptor> {
        vec![
            TokenDescriptor {
                symbol: "TRUTH".into(),
                address: TRUTH.parse().unwrap(),
                decimals: 18,
            },
            TokenDescriptor {
                symbol: "CREATOR".into(),
                address: CREATOR.parse().unwrap(),
                decimals: 18,
            },
        ]
    }

    fn tokens_answer(whole: u64) -> Scripted {
        let raw = U256::from(whole) * U256::exp10(18);
        Scripted::Ok(serde_json::to_value(Bytes::from(raw.encode())).unwrap())
    }

    fn scripted_wallet(address: &str) -> Arc<ScriptedTransport> {
        let wallet = Arc::new(ScriptedTransport::wallet("MetaMask", address, SEPOLIA));
        wallet.on("wallet_switchEthereumChain", Scripted::Ok(serde_json::Value::Null));
        wallet.on_token(TRUTH, tokens_answer(10));
        wallet.on_token(CREATOR, tokens_answer(4));
        wallet
    }

    fn store_with(
        wallet: Arc<ScriptedTransport>,
        storage: Arc<dyn StateStorage>,
    ) -> Arc<EcosystemStore> {
        let env = WalletEnvironment {
            injected: Some(wallet),
            ..Default::default()
        };
        let adapter = WalletProviderAdapter::with_timeouts(
            ProviderDiscovery::new(env, PreferredWallet::MetaMask),
            base_sepolia().clone(),
            AdapterTimeouts {
                connect: Duration::from_millis(300),
                provider_call: Duration::from_millis(300),
            },
        );
        EcosystemStore::load(
            storage,
            Arc::new(adapter),
            TokenBalanceReader::new(Duration::from_millis(500)),
            tokens(),
        )
    }

    fn address(raw: &str) -> Address {
        raw.parse().unwrap()
    }

    fn assert_invariants(state: &EcosystemState) {
        if state.session.is_connected() {
            assert!(state.session.address().is_some());
        }
        assert_eq!(state.derived, compute_derived(state));
    }

    #[tokio::test]
    async fn connect_populates_session_and_balances() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet, Arc::new(MemoryStorage::new()));

        store.connect().await.unwrap();

        let state = store.snapshot();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.session.address(), Some(address(ALICE)));
        assert_eq!(state.session.chain_id(), Some(SEPOLIA));
        assert_eq!(state.derived.governance_power, 12.0);
        assert!(state.balances.values().all(BalanceReading::is_available));
        assert_invariants(&state);
    }

    #[tokio::test]
    async fn failed_connect_sets_error_with_reason() {
        let wallet = scripted_wallet(ALICE);
        wallet.on(
            "eth_requestAccounts",
            Scripted::rpc_error(PROVIDER_CODE_USER_REJECTED, "User rejected"),
        );
        let store = store_with(wallet, Arc::new(MemoryStorage::new()));

        assert_eq!(store.connect().await, Err(WalletError::UserRejected));
        let state = store.snapshot();
        match &state.status {
            ConnectionStatus::Error { reason, code } => {
                assert_eq!(code, "USER_REJECTED");
                assert!(reason.contains("rejected"));
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(state.session, WalletSession::disconnected());
    }

    #[tokio::test]
    async fn listeners_are_notified_in_registration_order_with_diff() {
        let store = store_with(scripted_wallet(ALICE), Arc::new(MemoryStorage::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let sink = seen.clone();
            store.subscribe(Arc::new(move |state: &Arc<EcosystemState>, diff: &StateDiff| {
                sink.lock()
                    .unwrap()
                    .push((tag, state.current_page.clone(), diff.clone()));
            }));
        }

        let diff = store.navigate_to("gallery");
        assert_eq!(diff.changed, vec![StateField::CurrentPage]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "first");
        assert_eq!(seen[1].0, "second");
        assert_eq!(seen[0].1, "gallery");
        assert_eq!(seen[1].2, diff);
    }

    #[tokio::test]
    async fn unsubscribed_listener_is_not_called() {
        let store = store_with(scripted_wallet(ALICE), Arc::new(MemoryStorage::new()));
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let id = store.subscribe(Arc::new(move |_: &Arc<EcosystemState>, _: &StateDiff| {
            *counter.lock().unwrap() += 1;
        }));
        store.navigate_to("a");
        assert!(store.unsubscribe(id));
        store.navigate_to("b");
        assert_eq!(*hits.lock().unwrap(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[tokio::test]
    async fn persisted_state_round_trips_into_fresh_store() {
        let storage: Arc<dyn StateStorage> = Arc::new(MemoryStorage::new());
        let store = store_with(scripted_wallet(ALICE), storage.clone());
        store.connect().await.unwrap();
        store.navigate_to("governance");

        let fresh = store_with(scripted_wallet(ALICE), storage);
        assert_eq!(*fresh.snapshot(), *store.snapshot());
    }

    #[tokio::test]
    async fn malformed_persisted_json_falls_back_to_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .save(STATE_STORAGE_KEY, r#"{"session": {"address": 12"#)
            .unwrap();
        let store = store_with(scripted_wallet(ALICE), storage);
        assert_eq!(*store.snapshot(), EcosystemState::default());
    }

    #[tokio::test]
    async fn stale_balance_read_is_discarded_after_account_switch() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.connect().await.unwrap();

        // Alice's next read is slow and carries a distinctive balance.
        wallet.once(&format!("eth_call:{}", TRUTH), Scripted::delayed(200, tokens_answer(111)));
        wallet.once(&format!("eth_call:{}", CREATOR), Scripted::delayed(200, tokens_answer(111)));
        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh_balances().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        wallet.set_account(Some(BOB));
        wallet.on_token(TRUTH, tokens_answer(222));
        store.handle_accounts_changed(vec![BOB.to_string()]).await;

        assert!(!slow.await.unwrap());
        let state = store.snapshot();
        assert_eq!(state.session.address(), Some(address(BOB)));
        let truth = state.balances["TRUTH"].balance().unwrap();
        assert_eq!(truth.raw_balance, U256::from(222) * U256::exp10(18));
        assert_invariants(&state);
    }

    #[tokio::test]
    async fn stale_balance_read_is_discarded_after_disconnect() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.connect().await.unwrap();

        wallet.once(&format!("eth_call:{}", TRUTH), Scripted::delayed(150, tokens_answer(9)));
        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh_balances().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.handle_accounts_changed(vec![]).await;

        assert!(!slow.await.unwrap());
        let state = store.snapshot();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.balances.is_empty());
    }

    #[tokio::test]
    async fn chain_change_resets_and_restores_from_wallet() {
        let wallet = scripted_wallet(ALICE);
        let storage: Arc<dyn StateStorage> = Arc::new(MemoryStorage::new());
        let store = store_with(wallet.clone(), storage);
        store.connect().await.unwrap();
        store.navigate_to("collection");

        // Wallet moved to an unsupported chain and refuses to switch back.
        wallet.set_chain(1);
        wallet.on(
            "wallet_switchEthereumChain",
            Scripted::rpc_error(-32000, "switch refused"),
        );
        store.handle_chain_changed("0x1".to_string()).await;

        let state = store.snapshot();
        assert!(!state.session.is_connected());
        assert!(matches!(state.status, ConnectionStatus::Error { .. }));
        assert_eq!(state.current_page, "collection");
        assert_invariants(&state);
    }

    #[tokio::test]
    async fn chain_change_rebuilds_from_storage_written_elsewhere() {
        let wallet = scripted_wallet(ALICE);
        let storage: Arc<dyn StateStorage> = Arc::new(MemoryStorage::new());
        let store = store_with(wallet.clone(), storage.clone());
        store.connect().await.unwrap();
        store.navigate_to("collection");

        let mut elsewhere = (*store.snapshot()).clone();
        elsewhere.current_page = "governance".to_string();
        storage
            .save(STATE_STORAGE_KEY, &encode_state(&elsewhere).unwrap())
            .unwrap();

        wallet.set_account(None);
        store.handle_chain_changed("0x1".to_string()).await;

        let state = store.snapshot();
        assert_eq!(state.current_page, "governance");
        assert_eq!(state.session, WalletSession::disconnected());
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.balances.is_empty());
        assert_invariants(&state);
    }

    #[tokio::test]
    async fn disconnect_during_connect_discards_the_late_result() {
        let wallet = scripted_wallet(ALICE);
        wallet.once(
            "eth_requestAccounts",
            Scripted::delayed(150, Scripted::Ok(serde_json::json!([ALICE]))),
        );
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.attach_wallet_events();

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.connect().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.snapshot().status, ConnectionStatus::Connecting);

        wallet.set_account(None);
        wallet.emit(ProviderEvent::AccountsChanged(vec![]));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(pending.await.unwrap(), Err(WalletError::Superseded));
        let state = store.snapshot();
        assert_eq!(state.session, WalletSession::disconnected());
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(state.balances.is_empty());
        assert_invariants(&state);
    }

    #[tokio::test]
    async fn pushed_wallet_events_drive_the_store() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.attach_wallet_events();
        store.connect().await.unwrap();

        wallet.set_account(None);
        wallet.emit(ProviderEvent::AccountsChanged(vec![]));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.snapshot().status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn reconcile_detects_account_switch_by_polling() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.connect().await.unwrap();

        wallet.set_account(Some(BOB));
        store.reconcile_wallet().await;

        assert_eq!(store.snapshot().session.address(), Some(address(BOB)));
    }

    #[tokio::test]
    async fn reconcile_detects_chain_change_and_reports_refused_switch() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.connect().await.unwrap();

        wallet.set_chain(1);
        wallet.on(
            "wallet_switchEthereumChain",
            Scripted::rpc_error(-32000, "switch refused"),
        );
        store.reconcile_wallet().await;

        let state = store.snapshot();
        match &state.status {
            ConnectionStatus::Error { code, .. } => assert_eq!(code, "CHAIN_SWITCH_FAILED"),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(state.session, WalletSession::disconnected());
        assert!(!wallet.calls_to("wallet_switchEthereumChain").is_empty());
    }

    #[tokio::test]
    async fn reconcile_detects_chain_change_and_reconnects_on_target() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        store.connect().await.unwrap();

        // The poll sees chain 1 once; the wallet is back on the target afterwards.
        wallet.once("eth_chainId", Scripted::Ok(serde_json::json!("0x1")));
        store.reconcile_wallet().await;

        let state = store.snapshot();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.session.address(), Some(address(ALICE)));
        assert_eq!(state.session.chain_id(), Some(SEPOLIA));
        assert!(state.balances.values().all(BalanceReading::is_available));
    }

    #[tokio::test]
    async fn restore_session_reconnects_authorized_wallet() {
        let wallet = scripted_wallet(ALICE);
        let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));
        assert!(store.restore_session().await);
        assert_eq!(store.snapshot().status, ConnectionStatus::Connected);

        wallet.set_account(None);
        assert!(!store.restore_session().await);
        assert_eq!(store.snapshot().status, ConnectionStatus::Disconnected);
    }

    #[derive(Debug, Clone)]
    enum WalletStep {
        ConnectSuccess(bool),
        ConnectFail,
        AccountsEmpty,
        AccountsNew,
        ChainChanged(bool),
    }

    impl Arbitrary for WalletStep {
        fn arbitrary(g: &mut Gen) -> Self {
            match u8::arbitrary(g) % 5 {
                0 => WalletStep::ConnectSuccess(bool::arbitrary(g)),
                1 => WalletStep::ConnectFail,
                2 => WalletStep::AccountsEmpty,
                3 => WalletStep::AccountsNew,
                _ => WalletStep::ChainChanged(bool::arbitrary(g)),
            }
        }
    }

    fn run_steps(steps: Vec<WalletStep>) -> bool {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let wallet = scripted_wallet(ALICE);
            let store = store_with(wallet.clone(), Arc::new(MemoryStorage::new()));

            for step in steps.into_iter().take(25) {
                match step {
                    WalletStep::ConnectSuccess(as_bob) => {
                        wallet.set_chain(SEPOLIA);
                        wallet.set_account(Some(if as_bob { BOB } else { ALICE }));
                        let _ = store.connect().await;
                    }
                    WalletStep::ConnectFail => {
                        wallet.once(
                            "eth_requestAccounts",
                            Scripted::rpc_error(PROVIDER_CODE_USER_REJECTED, "no"),
                        );
                        let _ = store.connect().await;
                    }
                    WalletStep::AccountsEmpty => {
                        wallet.set_account(None);
                        store.handle_accounts_changed(vec![]).await;
                    }
                    WalletStep::AccountsNew => {
                        wallet.set_account(Some(BOB));
                        store.handle_accounts_changed(vec![BOB.to_string()]).await;
                    }
                    WalletStep::ChainChanged(back_to_target) => {
                        let chain = if back_to_target { SEPOLIA } else { 1 };
                        wallet.set_chain(chain);
                        store.handle_chain_changed(chain_id_to_hex(chain)).await;
                    }
                }
                let state = store.snapshot();
                if state.session.is_connected() && state.session.address().is_none() {
                    return false;
                }
                if state.derived != compute_derived(&state) {
                    return false;
                }
            }
            true
        })
    }

    quickcheck! {
        fn connected_implies_address_for_any_event_sequence(steps: Vec<WalletStep>) -> bool {
            run_steps(steps)
        }

        fn derived_metrics_track_every_update(ops: Vec<(u8, u16, bool)>) -> bool {
            let store = store_with(scripted_wallet(ALICE), Arc::new(MemoryStorage::new()));
            for (kind, amount, flag) in ops {
                let update = match kind % 3 {
                    0 => StateUpdate::new().current_page(format!("page-{}", amount)),
                    1 => {
                        let session = if flag {
                            WalletSession::connected(address(ALICE), SEPOLIA)
                        } else {
                            WalletSession::disconnected()
                        };
                        StateUpdate::new().session(session)
                    }
                    _ => {
                        let raw = U256::from(amount) * U256::exp10(18);
                        let reading = BalanceReading::Available(crate::models::TokenBalance {
                            token_symbol: "TRUTH".into(),
                            address: address(TRUTH),
                            decimals: 18,
                            raw_balance: raw,
                            formatted_balance: String::new(),
                        });
                        StateUpdate::new().balances([("TRUTH".to_string(), reading)].into())
                    }
                };
                store.apply_update(update);
                let state = store.snapshot();
                if state.derived != compute_derived(&state) {
                    return false;
                }
            }
            true
        }
    }
}
