//! SubscriberStore - 1 トピック分の購読者リストと通知
//!
//! # ロックの方針
//! - 購読者列は `Arc<Vec<Entry>>` で持ち、変更は copy-on-write（`Arc::make_mut`）
//! - `notify` はロック中に `Arc` を clone するだけで、呼び出しはロックの外
//!   → 購読者が同じ store に subscribe / unsubscribe しても deadlock しない
//! - subscribe / unsubscribe / purge / スナップショット取得は同じ mutex で直列化
//!
//! # 失敗の扱い
//! - 解決できない（target が死んだ）エントリは黙って飛ばす。消すのは `purge`
//! - 購読者が `Err` を返したら残りへの配送をやめて呼び出し元に返す
//! - panic も捕まえない。隔離したい購読者は自分でラップする

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use parking_lot::Mutex;

use crate::config::{RUN_ONCE, STOP_AFTER_CYCLE, StoreConfig};
use crate::error::{Result, TendrilError};
use crate::purge::PurgeCoordinator;
use crate::reference::{CallableReference, ReferenceKey, ReferenceState};
use crate::source::TopicSource;
use crate::stats::StoreStats;

/// One registered subscriber.
struct Entry<P> {
    reference: CallableReference<P>,
    ignored: bool,
}

impl<P> Entry<P> {
    fn state(&self) -> ReferenceState {
        match self.reference.state() {
            ReferenceState::Active if self.ignored => ReferenceState::Ignored,
            state => state,
        }
    }

    fn is_dead(&self) -> bool {
        !self.reference.is_static() && !self.reference.target_alive()
    }
}

impl<P> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            reference: self.reference.clone(),
            ignored: self.ignored,
        }
    }
}

/// Mutable part of a store; always accessed under `StoreCore::state`.
struct StoreState<P> {
    subscribers: Arc<Vec<Entry<P>>>,
    last_payload: Option<Arc<P>>,
    disposed: bool,
    purged_total: u64,
    last_purge_at: Option<chrono::DateTime<Utc>>,
}

impl<P> StoreState<P> {
    fn new() -> Self {
        Self {
            subscribers: Arc::new(Vec::new()),
            last_payload: None,
            disposed: false,
            purged_total: 0,
            last_purge_at: None,
        }
    }

    fn position(&self, mut matches: impl FnMut(&CallableReference<P>) -> bool) -> Option<usize> {
        self.subscribers.iter().position(|e| matches(&e.reference))
    }
}

/// The part of a store that the purge scheduler reaches through a `Weak`.
pub(crate) struct StoreCore<P> {
    source: TopicSource,
    config: StoreConfig,
    state: Mutex<StoreState<P>>,
}

impl<P> StoreCore<P> {
    fn disposed_error(&self) -> TendrilError {
        TendrilError::StoreDisposed {
            topic: self.source.clone(),
        }
    }

    /// Lock the state, failing if the store is disposed.
    fn live_state(&self) -> Result<parking_lot::MutexGuard<'_, StoreState<P>>> {
        let state = self.state.lock();
        if state.disposed {
            return Err(self.disposed_error());
        }
        Ok(state)
    }

    pub(crate) fn source(&self) -> &TopicSource {
        &self.source
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn purge(&self) -> Result<usize> {
        let mut state = self.live_state()?;
        let before = state.subscribers.len();
        if !state.subscribers.iter().any(Entry::is_dead) {
            debug!("store {}: purge found nothing to remove", self.source);
            return Ok(0);
        }

        Arc::make_mut(&mut state.subscribers).retain(|e| !e.is_dead());
        let removed = before - state.subscribers.len();
        state.purged_total += removed as u64;
        state.last_purge_at = Some(Utc::now());
        info!(
            "store {}: purged {removed} dead subscriber(s), {} left",
            self.source,
            state.subscribers.len()
        );
        Ok(removed)
    }

    fn snapshot(&self) -> Result<Arc<Vec<Entry<P>>>> {
        Ok(Arc::clone(&self.live_state()?.subscribers))
    }

    fn dispatch(&self, snapshot: &[Entry<P>], payload: &P) -> Result<()> {
        for entry in snapshot {
            if entry.ignored {
                continue;
            }
            let Some(handle) = entry.reference.resolve() else {
                continue;
            };
            handle
                .invoke(&self.source, payload)
                .map_err(|source| TendrilError::SubscriberInvocationFailed {
                    method: handle.method().clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Ordered registry of `CallableReference`s for one topic.
///
/// Share it behind an `Arc` to use it from several threads. Dropping the
/// store disposes it.
pub struct SubscriberStore<P> {
    core: Arc<StoreCore<P>>,
    purge: Mutex<Option<PurgeCoordinator>>,
}

impl<P: Send + Sync + 'static> SubscriberStore<P> {
    pub fn new(source: TopicSource) -> Self {
        Self::with_config(source, StoreConfig::default())
    }

    /// A positive `config.purge_interval_ms` starts the background purge
    /// right away.
    pub fn with_config(source: TopicSource, config: StoreConfig) -> Self {
        let purge_interval_ms = config.purge_interval_ms;
        let core = Arc::new(StoreCore {
            source,
            config,
            state: Mutex::new(StoreState::new()),
        });
        let purge =
            (purge_interval_ms > 0).then(|| PurgeCoordinator::attach(&core, purge_interval_ms));
        Self {
            core,
            purge: Mutex::new(purge),
        }
    }

    /// Append `reference`. Returns `false` if an equal one is already registered.
    pub fn subscribe(&self, reference: CallableReference<P>) -> Result<bool> {
        let mut state = self.core.live_state()?;
        if state.position(|r| *r == reference).is_some() {
            debug!(
                "store {}: {} already subscribed",
                self.core.source,
                reference.method()
            );
            return Ok(false);
        }
        debug!("store {}: subscribe {}", self.core.source, reference.method());
        Arc::make_mut(&mut state.subscribers).push(Entry {
            reference,
            ignored: false,
        });
        Ok(true)
    }

    /// Remove the first entry equal to `reference`.
    pub fn unsubscribe(&self, reference: &CallableReference<P>) -> Result<bool> {
        self.remove_first(|r| r == reference)
    }

    /// Remove the first entry with this (method, target) identity.
    pub fn unsubscribe_key(&self, key: &ReferenceKey) -> Result<bool> {
        self.remove_first(|r| r.matches_key(key))
    }

    fn remove_first(&self, matches: impl FnMut(&CallableReference<P>) -> bool) -> Result<bool> {
        let mut state = self.core.live_state()?;
        let Some(index) = state.position(matches) else {
            return Ok(false);
        };
        let removed = Arc::make_mut(&mut state.subscribers).remove(index);
        debug!(
            "store {}: unsubscribe {}",
            self.core.source,
            removed.reference.method()
        );
        Ok(true)
    }

    /// Deliver `payload` to every live, non-ignored subscriber in
    /// subscription order.
    ///
    /// Works on a snapshot taken at the start of the call: subscribers added
    /// or removed by a handler take effect from the next `notify`.
    pub fn notify(&self, payload: P) -> Result<()> {
        let (snapshot, payload) = {
            let mut state = self.core.live_state()?;
            let payload = Arc::new(payload);
            if self.core.config.cache_last_payload {
                state.last_payload = Some(Arc::clone(&payload));
            }
            (Arc::clone(&state.subscribers), payload)
        };
        self.core.dispatch(&snapshot, &payload)
    }

    /// Replay the cached last payload. Returns `false` if nothing is cached
    /// (caching off, or no `notify` yet).
    pub fn renotify(&self) -> Result<bool> {
        let (snapshot, payload) = {
            let state = self.core.live_state()?;
            let Some(payload) = state.last_payload.clone() else {
                return Ok(false);
            };
            (Arc::clone(&state.subscribers), payload)
        };
        self.core.dispatch(&snapshot, &payload)?;
        Ok(true)
    }

    /// Remove every weak entry whose target is gone. Static and strong
    /// entries always stay; survivors keep their order.
    pub fn purge(&self) -> Result<usize> {
        self.core.purge()
    }

    /// Keep `reference` registered but skip it during dispatch (or undo that).
    /// Returns `false` if it is not registered.
    pub fn set_ignored(&self, reference: &CallableReference<P>, ignored: bool) -> Result<bool> {
        let mut state = self.core.live_state()?;
        let Some(index) = state.position(|r| r == reference) else {
            return Ok(false);
        };
        if state.subscribers[index].ignored != ignored {
            Arc::make_mut(&mut state.subscribers)[index].ignored = ignored;
        }
        Ok(true)
    }

    pub fn state_of(&self, reference: &CallableReference<P>) -> Option<ReferenceState> {
        let snapshot = self.core.snapshot().ok()?;
        snapshot
            .iter()
            .find(|e| e.reference == *reference)
            .map(Entry::state)
    }

    pub fn contains(&self, reference: &CallableReference<P>) -> bool {
        self.state_of(reference).is_some()
    }

    /// Number of entries, dead ones not yet purged included.
    pub fn len(&self) -> usize {
        self.core.state.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> &TopicSource {
        self.core.source()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.core.config
    }

    pub fn is_disposed(&self) -> bool {
        self.core.state.lock().disposed
    }

    /// Change the background purge period, starting it if needed.
    pub fn set_purge_interval(&self, ms: i64) -> Result<()> {
        // checked under the purge lock: `dispose` marks the state before taking it
        let mut purge = self.purge.lock();
        if self.is_disposed() {
            return Err(self.core.disposed_error());
        }
        match purge.as_ref() {
            Some(coordinator) => coordinator.set_interval(ms),
            None if ms > 0 || ms == RUN_ONCE => {
                *purge = Some(PurgeCoordinator::attach(&self.core, ms));
            }
            None => {}
        }
        Ok(())
    }

    /// Current purge interval; `STOP_AFTER_CYCLE` when no purge was ever set up.
    pub fn purge_interval_ms(&self) -> i64 {
        self.purge
            .lock()
            .as_ref()
            .map_or(STOP_AFTER_CYCLE, PurgeCoordinator::interval_ms)
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.core.state.lock();
        StoreStats::collect(
            &self.core.source,
            state.subscribers.iter().map(|e| (&e.reference, e.ignored)),
            state.purged_total,
            state.last_purge_at,
        )
    }
}

impl<P> SubscriberStore<P> {
    /// Terminal: drops every subscriber and the cached payload, stops the
    /// purge scheduler (waiting for an in-flight purge). Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.core.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.subscribers = Arc::new(Vec::new());
            state.last_payload = None;
        }
        let coordinator = self.purge.lock().take();
        if let Some(coordinator) = coordinator {
            coordinator.dispose();
        }
        info!("store {}: disposed", self.core.source);
    }
}

impl<P> Drop for SubscriberStore<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<P> std::fmt::Debug for SubscriberStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("SubscriberStore")
            .field("source", &self.core.source)
            .field("subscribers", &state.subscribers.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}
