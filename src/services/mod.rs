// Ecosystem services
pub mod ecosystem_store;
pub mod metrics;
pub mod storage;
pub mod sync;
pub mod token_balances;

pub use ecosystem_store::EcosystemStore;
pub use storage::{FileStorage, StateStorage};
pub use sync::{start_sync, SyncHandle, SyncIntervals};
pub use token_balances::TokenBalanceReader;

use std::sync::Arc;

use crate::models::{EcosystemState, StateDiff, StateField};

/// Restore any wallet session and start the periodic sync tasks.
pub async fn start_background_services(
    store: Arc<EcosystemStore>,
    intervals: SyncIntervals,
) -> SyncHandle {
    tracing::info!("Starting background services...");

    store.subscribe(Arc::new(|state: &Arc<EcosystemState>, diff: &StateDiff| {
        if diff.contains(StateField::Status) {
            tracing::info!("connection status -> {}", state.status.label());
        }
    }));
    store.attach_wallet_events();
    if store.restore_session().await {
        tracing::info!("Wallet session restored");
    } else {
        tracing::info!("No authorized wallet session to restore");
    }

    let handle = start_sync(&store, intervals);
    tracing::info!("All background services started successfully");
    handle
}
