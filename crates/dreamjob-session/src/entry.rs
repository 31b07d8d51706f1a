//! A single user's session: context, subscribers, liveness metadata.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use dreamjob_core::{DeliveryError, LogLine, SubscriberChannel, SubscriberId, UserIdentity};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::registry::SessionInfo;

#[derive(Default)]
struct Subscribers {
    closed: bool,
    channels: Vec<SubscriberChannel>,
}

/// Outcome of delivering one line to every subscriber of an entry.
#[derive(Debug, Default)]
pub(crate) struct Delivery {
    pub(crate) delivered: usize,
    pub(crate) dropped: Vec<(SubscriberId, DeliveryError)>,
}

/// Registry record owning one context and its subscriber set.
///
/// Entries are only constructed and torn down by
/// [`SessionRegistry`](crate::SessionRegistry).
pub(crate) struct SessionEntry<C> {
    identity: UserIdentity,
    context: C,
    created_at: Instant,
    last_touched_at: Mutex<Instant>,
    leases: AtomicUsize,
    subscribers: Mutex<Subscribers>,
}

impl<C> SessionEntry<C> {
    pub(crate) fn new(identity: UserIdentity, context: C) -> Self {
        let now = Instant::now();
        Self {
            identity,
            context,
            created_at: now,
            last_touched_at: Mutex::new(now),
            leases: AtomicUsize::new(0),
            subscribers: Mutex::new(Subscribers::default()),
        }
    }

    pub(crate) const fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub(crate) const fn context(&self) -> &C {
        &self.context
    }

    pub(crate) fn last_touched_at(&self) -> Instant {
        *self.last_touched_at.lock()
    }

    pub(crate) fn touch(&self) {
        *self.last_touched_at.lock() = Instant::now();
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_touched_at())
    }

    pub(crate) fn acquire_lease(&self) {
        self.leases.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_lease(&self) {
        self.leases.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn active_leases(&self) -> usize {
        self.leases.load(Ordering::Acquire)
    }

    /// Add a subscriber. Returns `false` once the entry has been closed.
    pub(crate) fn attach(&self, channel: SubscriberChannel) -> bool {
        let mut subs = self.subscribers.lock();
        if subs.closed {
            return false;
        }
        subs.channels.push(channel);
        true
    }

    /// Remove a subscriber. Returns whether it was attached.
    pub(crate) fn detach(&self, subscriber: SubscriberId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.channels.len();
        subs.channels.retain(|ch| ch.id() != subscriber);
        subs.channels.len() != before
    }

    /// Push `line` to every subscriber without waiting.
    ///
    /// Subscribers that cannot take the line are removed. The subscriber lock
    /// is held for the whole pass, which keeps per-subscriber order equal to
    /// broadcast order.
    pub(crate) fn broadcast(&self, line: &LogLine) -> Delivery {
        let mut subs = self.subscribers.lock();
        let mut delivery = Delivery::default();
        if subs.closed {
            return delivery;
        }

        subs.channels
            .retain(|ch| match ch.try_deliver(line.clone()) {
                Ok(()) => {
                    delivery.delivered += 1;
                    true
                }
                Err(e) => {
                    delivery.dropped.push((ch.id(), e));
                    false
                }
            });
        delivery
    }

    /// Close the entry: no further attach or delivery succeeds.
    ///
    /// Returns the ids of the subscribers that were still attached; their
    /// producer handles are dropped here, which ends each observer's stream.
    pub(crate) fn close(&self) -> Vec<SubscriberId> {
        let mut subs = self.subscribers.lock();
        subs.closed = true;
        subs.channels.drain(..).map(|ch| ch.id()).collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.subscribers.lock().closed
    }

    /// Point-in-time view, read while holding the subscribers lock.
    pub(crate) fn info(&self) -> SessionInfo {
        let subs = self.subscribers.lock();
        SessionInfo {
            identity: self.identity.clone(),
            created_at: self.created_at,
            last_touched_at: self.last_touched_at(),
            subscriber_count: subs.channels.len(),
            active_leases: self.active_leases(),
        }
    }
}
