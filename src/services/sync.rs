use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::{
    constants::{RESYNC_INTERVAL_SECS, WALLET_POLL_INTERVAL_SECS},
    models::ConnectionStatus,
    services::ecosystem_store::EcosystemStore,
};

#[derive(Debug, Clone, Copy)]
pub struct SyncIntervals {
    pub resync: Duration,
    pub wallet_poll: Duration,
}

impl Default for SyncIntervals {
    fn default() -> Self {
        Self {
            resync: Duration::from_secs(RESYNC_INTERVAL_SECS),
            wallet_poll: Duration::from_secs(WALLET_POLL_INTERVAL_SECS),
        }
    }
}

/// Running periodic sync tasks. Dropping the handle cancels them.
pub struct SyncHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the balance resync and the wallet poll. Both tasks end on their own
/// once the store is dropped.
pub fn start_sync(store: &Arc<EcosystemStore>, intervals: SyncIntervals) -> SyncHandle {
    tracing::info!(
        "starting ecosystem sync resync={:?} wallet_poll={:?}",
        intervals.resync,
        intervals.wallet_poll
    );

    let resync = spawn_periodic(Arc::downgrade(store), intervals.resync, |store| async move {
        if store.snapshot().status == ConnectionStatus::Connected {
            store.refresh_balances().await;
        }
    });
    let poll = spawn_periodic(Arc::downgrade(store), intervals.wallet_poll, |store| async move {
        store.reconcile_wallet().await;
    });

    SyncHandle {
        tasks: vec![resync, poll],
    }
}

// Internal helper that runs `job` every `period`, skipping the immediate first tick.
fn spawn_periodic<F, Fut>(store: Weak<EcosystemStore>, period: Duration, job: F) -> JoinHandle<()>
where
    F: Fn(Arc<EcosystemStore>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                tracing::debug!("ecosystem store dropped; sync task exiting");
                break;
            };
            job(store).await;
        }
    })
}
