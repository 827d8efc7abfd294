use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::CallableReference;
use crate::source::TopicSource;

/// Point-in-time counts for one `SubscriberStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub source: TopicSource,
    pub subscribers: usize,
    pub weak: usize,
    pub strong: usize,
    pub statics: usize,
    pub ignored: usize,
    /// Weak entries whose target is gone but that have not been purged yet.
    pub dead: usize,
    pub purged_total: u64,
    pub last_purge_at: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub(crate) fn collect<'a, P: 'a>(
        source: &TopicSource,
        entries: impl Iterator<Item = (&'a CallableReference<P>, bool)>,
        purged_total: u64,
        last_purge_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut stats = StoreStats {
            source: source.clone(),
            subscribers: 0,
            weak: 0,
            strong: 0,
            statics: 0,
            ignored: 0,
            dead: 0,
            purged_total,
            last_purge_at,
        };
        for (reference, ignored) in entries {
            stats.subscribers += 1;
            if reference.is_static() {
                stats.statics += 1;
            } else if reference.is_weak() {
                stats.weak += 1;
            } else {
                stats.strong += 1;
            }
            if ignored {
                stats.ignored += 1;
            }
            if !reference.target_alive() {
                stats.dead += 1;
            }
        }
        stats
    }
}
