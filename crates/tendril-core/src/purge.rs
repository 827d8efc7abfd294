//! PurgeCoordinator - store の dead entry を定期的に掃除する
//!
//! `RecurringActionScheduler` のアクションとして `StoreCore::purge` を回すだけ。
//! store への参照は `Weak` で持つので、coordinator が store を生かし続けることはない。

use std::sync::{Arc, Weak};

use log::{debug, warn};

use crate::error::TendrilError;
use crate::scheduler::RecurringActionScheduler;
use crate::store::StoreCore;

pub struct PurgeCoordinator {
    scheduler: RecurringActionScheduler,
}

impl PurgeCoordinator {
    /// Create the scheduler for `core` and apply `interval_ms` to it.
    pub(crate) fn attach<P: Send + Sync + 'static>(
        core: &Arc<StoreCore<P>>,
        interval_ms: i64,
    ) -> Self {
        let store: Weak<StoreCore<P>> = Arc::downgrade(core);
        let config = core.config().scheduler.clone();
        let scheduler = RecurringActionScheduler::with_config(
            move || {
                let Some(core) = store.upgrade() else {
                    debug!("purge: store already dropped");
                    return;
                };
                match core.purge() {
                    Ok(_) => {}
                    Err(TendrilError::StoreDisposed { topic }) => {
                        debug!("purge: store {topic} is disposed");
                    }
                    Err(e) => warn!("purge failed for {}: {e}", core.source()),
                }
            },
            config,
        );
        debug!(
            "store {}: purge scheduler {} attached ({interval_ms}ms)",
            core.source(),
            scheduler.id()
        );
        scheduler.set_interval(interval_ms);
        Self { scheduler }
    }

    pub fn set_interval(&self, ms: i64) {
        self.scheduler.set_interval(ms);
    }

    pub fn interval_ms(&self) -> i64 {
        self.scheduler.interval_ms()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn scheduler(&self) -> &RecurringActionScheduler {
        &self.scheduler
    }

    pub fn dispose(&self) {
        self.scheduler.dispose();
    }
}

impl std::fmt::Debug for PurgeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurgeCoordinator")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
