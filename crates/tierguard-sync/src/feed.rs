//! Fan-out change feed.
//!
//! Every subscriber owns an unbounded channel, so a publish never blocks on a
//! slow reader and each subscriber sees events in publish order. A subscriber
//! whose receiver was dropped is removed on the next publish.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{self, Receiver, Sender, TryRecvError},
    Mutex, PoisonError,
};

use tracing::debug;

use tierguard_contracts::change::ChangeEvent;
use tierguard_core::traits::ChangeSink;

/// The receiving end of one feed subscription.
pub struct Subscription {
    id: u64,
    receiver: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The next queued event, if any. Never blocks.
    pub fn try_next(&self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Every event queued so far, oldest first.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

#[derive(Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<(u64, Sender<ChangeEvent>)>>,
    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving every event published from now on.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).push((id, tx));
        debug!(subscription = id, "change feed subscriber added");
        Subscription { id, receiver: rx }
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ChangeSink for ChangeFeed {
    fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());

        let pruned = before - subscribers.len();
        if pruned > 0 {
            debug!(pruned, "disconnected change feed subscribers removed");
        }
    }
}
