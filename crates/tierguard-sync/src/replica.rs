//! An observing console's view of the engine.
//!
//! A `Replica` subscribes to the feed before it reads the snapshot, so no
//! change committed in between is lost; anything seen twice is absorbed by the
//! cache's merge rule.

use tracing::{debug, warn};

use tierguard_contracts::{
    change::{ChangeEvent, ChangeRecord},
    error::TierGuardResult,
};

use crate::{
    cache::LocalCache,
    feed::{ChangeFeed, Subscription},
};

pub struct Replica {
    subscription: Subscription,
    cache: LocalCache,
}

impl Replica {
    /// Subscribe to `feed`, then seed the cache from `snapshot`.
    ///
    /// ```rust,ignore
    /// let replica = Replica::connect(&feed, || authority.snapshot())?;
    /// ```
    pub fn connect<F>(feed: &ChangeFeed, snapshot: F) -> TierGuardResult<Self>
    where
        F: FnOnce() -> TierGuardResult<Vec<ChangeRecord>>,
    {
        let subscription = feed.subscribe();
        let mut cache = LocalCache::new();
        let records = snapshot()?;
        let seeded = records.len();
        for record in records {
            cache.apply(&ChangeEvent::insert(record));
        }
        debug!(subscription = subscription.id(), seeded, "replica connected");
        Ok(Self { subscription, cache })
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription.id()
    }

    /// Apply every queued feed event. Returns how many changed the cache.
    pub fn sync(&mut self) -> usize {
        let mut changed = 0;
        for event in self.subscription.drain() {
            if self.cache.apply(&event) {
                changed += 1;
            }
        }
        changed
    }

    /// Show `record` locally at once, then run the durable `write`.
    ///
    /// On success the cache holds the record as confirmed by the write. On
    /// failure the cache goes back to the last confirmed value and the error
    /// is returned unchanged.
    pub fn optimistic<F>(&mut self, record: ChangeRecord, write: F) -> TierGuardResult<ChangeRecord>
    where
        F: FnOnce(&ChangeRecord) -> TierGuardResult<ChangeRecord>,
    {
        let collection = record.collection();
        let key = record.key();
        let previous = self.cache.put_unchecked(record.clone());

        match write(&record) {
            Ok(confirmed) => {
                self.cache.restore(collection, &key, previous);
                self.cache.apply(&ChangeEvent::update(confirmed.clone()));
                Ok(confirmed)
            }
            Err(e) => {
                self.cache.restore(collection, &key, previous);
                warn!(key = %key, error = %e, "optimistic write rolled back");
                Err(e)
            }
        }
    }
}
