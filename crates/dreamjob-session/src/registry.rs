//! Session registry: identity → execution context + live subscribers.

use std::{collections::HashMap, sync::Arc, time::Duration};

use dreamjob_core::{
    ContextFactory, FactoryError, LogLine, LogStream, SubscriberChannel, SubscriberId,
    UserIdentity,
};
use parking_lot::RwLock;
use tokio::{sync::broadcast, time::Instant};

use crate::{
    config::RegistryConfig,
    entry::SessionEntry,
    events::{DetachReason, EventBus, RegistryEvent, RemovalReason},
    gate::IdentityGates,
    lease::ContextLease,
    sink::SessionSink,
};

/// Registry error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error("No active session for {0}")]
    NoActiveSession(UserIdentity),
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub identity: UserIdentity,
    pub created_at: Instant,
    pub last_touched_at: Instant,
    pub subscriber_count: usize,
    pub active_leases: usize,
}

impl SessionInfo {
    /// Time since the session was last touched.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_touched_at)
    }

    /// Time since the session was created.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

type Entries<C> = HashMap<UserIdentity, Arc<SessionEntry<C>>>;

/// Process-wide map from user identity to a reusable execution context.
///
/// Creation and removal are serialized per identity only; lookups, touches
/// and broadcasts take a short shared lock on the map and never wait on the
/// factory. Wrap in an `Arc` and hand it to every component that needs it.
pub struct SessionRegistry<F>
where
    F: ContextFactory,
{
    factory: F,
    config: RegistryConfig,
    entries: RwLock<Entries<F::Context>>,
    gates: IdentityGates,
    events: EventBus,
}

impl<F> SessionRegistry<F>
where
    F: ContextFactory,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new(factory: F, config: RegistryConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            factory,
            config,
            entries: RwLock::new(HashMap::new()),
            gates: IdentityGates::new(),
            events,
        }
    }

    /// Registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The context factory.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Receiver for lifecycle events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Return the identity's context, creating it if needed.
    ///
    /// Exactly one of any number of concurrent callers for the same identity
    /// invokes the factory and observes `created == true`; all of them get
    /// the same context.
    ///
    /// # Errors
    /// Returns [`RegistryError::Factory`] if context creation fails. No entry
    /// is installed and the next call tries again.
    pub async fn get_or_create(
        &self,
        identity: &UserIdentity,
    ) -> Result<(F::Context, bool), RegistryError> {
        self.acquire_with(identity, |entry| entry.context().clone())
            .await
    }

    /// Like [`get_or_create`](Self::get_or_create), but marks the session in
    /// use until the returned lease is dropped. The idle sweeper never evicts
    /// a session with outstanding leases.
    ///
    /// # Errors
    /// Returns [`RegistryError::Factory`] if context creation fails.
    pub async fn lease(
        &self,
        identity: &UserIdentity,
    ) -> Result<ContextLease<F::Context>, RegistryError> {
        let (entry, created) = self
            .acquire_with(identity, |entry| {
                entry.acquire_lease();
                Arc::clone(entry)
            })
            .await?;
        Ok(ContextLease::new(entry, created, self.events.clone()))
    }

    /// Run `on_entry` against the identity's live entry, creating it first if
    /// needed. `on_entry` runs under the map lock, after the entry is touched.
    async fn acquire_with<T>(
        &self,
        identity: &UserIdentity,
        on_entry: impl Fn(&Arc<SessionEntry<F::Context>>) -> T,
    ) -> Result<(T, bool), RegistryError> {
        if let Some(found) = self.with_touched(identity, &on_entry) {
            return Ok((found, false));
        }

        let _gate = self.gates.acquire(identity).await;

        // Another caller may have finished creating while we waited.
        if let Some(found) = self.with_touched(identity, &on_entry) {
            return Ok((found, false));
        }

        let context = self.factory.create(identity).await.map_err(|e| {
            tracing::warn!(%identity, error = %e, "Context creation failed");
            e
        })?;

        let found = {
            let mut entries = self.entries.write();
            let entry = Arc::new(SessionEntry::new(identity.clone(), context));
            let found = on_entry(&entry);
            entries.insert(identity.clone(), entry);
            found
        };

        tracing::info!(%identity, "Session created");
        self.events.publish(RegistryEvent::SessionCreated {
            identity: identity.clone(),
        });
        Ok((found, true))
    }

    fn with_touched<T>(
        &self,
        identity: &UserIdentity,
        on_entry: &impl Fn(&Arc<SessionEntry<F::Context>>) -> T,
    ) -> Option<T> {
        let entries = self.entries.read();
        entries.get(identity).map(|entry| {
            entry.touch();
            on_entry(entry)
        })
    }

    /// Mark the session as used now. No-op without a session.
    pub fn touch(&self, identity: &UserIdentity) {
        if let Some(entry) = self.entries.read().get(identity) {
            entry.touch();
        }
    }

    /// Tear down the identity's session.
    ///
    /// Closes every subscriber channel and destroys the context. Returns
    /// whether a session existed; removing twice is not an error.
    pub async fn remove(&self, identity: &UserIdentity) -> bool {
        let entry = {
            let _gate = self.gates.acquire(identity).await;
            self.entries.write().remove(identity)
        };

        match entry {
            Some(entry) => {
                self.teardown(entry, RemovalReason::Logout).await;
                true
            }
            None => false,
        }
    }

    /// Remove the session only if it is still idle past `threshold` and has no
    /// outstanding leases, judged at the moment of removal.
    ///
    /// Doesn't take the identity gate: an entry only exists once creation has
    /// finished, and the check-and-detach happens under the map write lock.
    pub(crate) async fn remove_if_idle(&self, identity: &UserIdentity, threshold: Duration) -> bool {
        let entry = {
            let mut entries = self.entries.write();
            let expired = entries.get(identity).is_some_and(|entry| {
                entry.active_leases() == 0 && entry.idle_for(Instant::now()) > threshold
            });
            if expired {
                entries.remove(identity)
            } else {
                None
            }
        };

        match entry {
            Some(entry) => {
                self.teardown(entry, RemovalReason::Idle).await;
                true
            }
            None => false,
        }
    }

    /// Explicit logout.
    ///
    /// # Errors
    /// Returns [`RegistryError::NoActiveSession`] if there was nothing to remove.
    pub async fn logout(&self, identity: &UserIdentity) -> Result<(), RegistryError> {
        if self.remove(identity).await {
            Ok(())
        } else {
            Err(RegistryError::NoActiveSession(identity.clone()))
        }
    }

    async fn teardown(&self, entry: Arc<SessionEntry<F::Context>>, reason: RemovalReason) {
        let identity = entry.identity().clone();
        let closed = entry.close();
        for subscriber in &closed {
            self.events.publish(RegistryEvent::SubscriberDetached {
                identity: identity.clone(),
                subscriber: *subscriber,
                reason: DetachReason::SessionClosed,
            });
        }

        self.factory.destroy(entry.context().clone()).await;

        tracing::info!(%identity, ?reason, subscribers = closed.len(), "Session removed");
        self.events
            .publish(RegistryEvent::SessionRemoved { identity, reason });
    }

    /// Attach a subscriber channel to the identity's session.
    ///
    /// Returns `false` if the identity has no active session.
    pub fn attach(&self, identity: &UserIdentity, channel: SubscriberChannel) -> bool {
        self.attach_with(identity, channel, |_| ()).is_some()
    }

    /// Create a bounded channel with the configured capacity and attach it.
    ///
    /// # Errors
    /// Returns [`RegistryError::NoActiveSession`] if the identity has no session.
    pub fn subscribe(&self, identity: &UserIdentity) -> Result<LogStream, RegistryError> {
        self.subscribe_with_sink(identity).map(|(stream, _)| stream)
    }

    /// Like [`subscribe`](Self::subscribe), also returning a sink bound to the
    /// session the stream was attached to.
    ///
    /// When the stream ends, [`SessionSink::is_revoked`] tells whether that
    /// session was removed, even if the identity has logged in again since.
    ///
    /// # Errors
    /// Returns [`RegistryError::NoActiveSession`] if the identity has no session.
    pub fn subscribe_with_sink(
        &self,
        identity: &UserIdentity,
    ) -> Result<(LogStream, SessionSink<F::Context>), RegistryError> {
        let (channel, stream) = SubscriberChannel::bounded(self.config.subscriber_capacity);
        let sink = self
            .attach_with(identity, channel, |entry| SessionSink::new(entry, self.events.clone()))
            .ok_or_else(|| RegistryError::NoActiveSession(identity.clone()))?;
        Ok((stream, sink))
    }

    fn attach_with<T>(
        &self,
        identity: &UserIdentity,
        channel: SubscriberChannel,
        bound: impl FnOnce(&Arc<SessionEntry<F::Context>>) -> T,
    ) -> Option<T> {
        let subscriber = channel.id();
        let attached = self
            .entries
            .read()
            .get(identity)
            .and_then(|entry| entry.attach(channel).then(|| bound(entry)));

        if attached.is_some() {
            tracing::debug!(%identity, %subscriber, "Subscriber attached");
            self.events.publish(RegistryEvent::SubscriberAttached {
                identity: identity.clone(),
                subscriber,
            });
        }
        attached
    }

    /// Detach a subscriber. No-op if it is not attached.
    pub fn detach(&self, identity: &UserIdentity, subscriber: SubscriberId) {
        let detached = self
            .entries
            .read()
            .get(identity)
            .is_some_and(|entry| entry.detach(subscriber));

        if detached {
            tracing::debug!(%identity, %subscriber, "Subscriber detached");
            self.events.publish(RegistryEvent::SubscriberDetached {
                identity: identity.clone(),
                subscriber,
                reason: DetachReason::Requested,
            });
        }
    }

    /// Deliver `line` to every subscriber of the identity's session.
    ///
    /// Never waits on a subscriber: one whose queue is full is detached.
    /// Returns how many subscribers received the line; without a session the
    /// line is dropped and nothing is created.
    pub fn broadcast(&self, identity: &UserIdentity, line: impl Into<LogLine>) -> usize {
        let entry = self.entries.read().get(identity).cloned();
        entry.map_or(0, |entry| fan_out(&entry, &line.into(), &self.events))
    }

    /// Log sink bound to the identity's *current* session.
    ///
    /// Lines emitted after that session is removed are dropped, even if a new
    /// session for the same identity exists by then.
    #[must_use]
    pub fn sink(&self, identity: &UserIdentity) -> Option<SessionSink<F::Context>> {
        self.entries
            .read()
            .get(identity)
            .map(|entry| SessionSink::new(entry, self.events.clone()))
    }

    /// Diagnostic view of every session, sorted by identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .entries
            .read()
            .values()
            .map(|entry| entry.info())
            .collect();
        infos.sort_by(|a, b| a.identity.cmp(&b.identity));
        infos
    }

    /// Whether the identity has a session.
    #[must_use]
    pub fn contains(&self, identity: &UserIdentity) -> bool {
        self.entries.read().contains_key(identity)
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Tear down every session. Returns how many were removed.
    pub async fn shutdown(&self) -> usize {
        let drained: Vec<_> = {
            let mut entries = self.entries.write();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        let count = drained.len();
        for entry in drained {
            self.teardown(entry, RemovalReason::Shutdown).await;
        }
        tracing::info!(sessions = count, "Session registry shut down");
        count
    }

    #[cfg(test)]
    pub(crate) fn pending_gates(&self) -> usize {
        self.gates.len()
    }
}

/// Deliver one line and report dropped subscribers.
pub(crate) fn fan_out<C>(entry: &SessionEntry<C>, line: &LogLine, events: &EventBus) -> usize {
    let delivery = entry.broadcast(line);
    for (subscriber, err) in delivery.dropped {
        let identity = entry.identity();
        let reason = DetachReason::from(err);
        if reason == DetachReason::Overloaded {
            tracing::warn!(%identity, %subscriber, "Dropping overloaded subscriber");
        } else {
            tracing::debug!(%identity, %subscriber, "Subscriber went away");
        }
        events.publish(RegistryEvent::SubscriberDetached {
            identity: identity.clone(),
            subscriber,
            reason,
        });
    }
    delivery.delivered
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dreamjob_core::LogSink;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;
    use crate::testing::CountingFactory;

    fn registry(factory: CountingFactory) -> Arc<SessionRegistry<CountingFactory>> {
        Arc::new(SessionRegistry::new(factory, RegistryConfig::default()))
    }

    fn user(name: &str) -> UserIdentity {
        UserIdentity::new(format!("{name}@example.com"))
    }

    fn drain(events: &mut broadcast::Receiver<RegistryEvent>) -> Vec<RegistryEvent> {
        let mut seen = Vec::new();
        loop {
            match events.try_recv() {
                Ok(event) => seen.push(event),
                Err(TryRecvError::Empty) => return seen,
                Err(e) => panic!("unexpected event error: {e}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_get_or_create_creates_once() {
        let registry = registry(CountingFactory::slow(Duration::from_millis(50)));
        let id = user("u1");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                tokio::spawn(async move { registry.get_or_create(&id).await.unwrap() })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(registry.factory().created(), 1);
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        assert!(results.iter().all(|(ctx, _)| Arc::ptr_eq(ctx, &results[0].0)));
        assert_eq!(registry.pending_gates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_identities_create_in_parallel() {
        let registry = registry(CountingFactory::slow(Duration::from_secs(1)));
        let started = Instant::now();

        let (ua, ub) = (user("a"), user("b"));
        let (a, b) = tokio::join!(registry.get_or_create(&ua), registry.get_or_create(&ub));
        assert!(a.unwrap().1);
        assert!(b.unwrap().1);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_existing_session_is_reused() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");

        let (first, created) = registry.get_or_create(&id).await.unwrap();
        assert!(created);
        let (second, created) = registry.get_or_create(&id).await.unwrap();
        assert!(!created);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.factory().created(), 1);
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_no_entry() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.factory().fail_next();

        let err = registry.get_or_create(&id).await.unwrap_err();
        assert!(matches!(err, RegistryError::Factory(_)));
        assert!(!registry.contains(&id));
        assert!(registry.is_empty());

        let (_, created) = registry.get_or_create(&id).await.unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();

        assert!(registry.remove(&id).await);
        assert!(!registry.remove(&id).await);
        assert_eq!(registry.factory().destroyed(), vec![1]);
        assert!(matches!(
            registry.logout(&id).await,
            Err(RegistryError::NoActiveSession(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_updates_last_touched() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        registry.touch(&id);
        registry.touch(&user("nobody"));

        let info = &registry.snapshot()[0];
        assert_eq!(info.idle_for(Instant::now()), Duration::ZERO);
        assert_eq!(info.age(Instant::now()), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_lines_arrive_in_broadcast_order() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let mut rx = registry.subscribe(&id).unwrap();

        for line in ["L1", "L2", "L3"] {
            assert_eq!(registry.broadcast(&id, line), 1);
        }

        assert_eq!(rx.recv().await, Some(LogLine::new("L1")));
        assert_eq!(rx.recv().await, Some(LogLine::new("L2")));
        assert_eq!(rx.recv().await, Some(LogLine::new("L3")));
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_no_history() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();

        assert_eq!(registry.broadcast(&id, "L1"), 0);
        let mut rx = registry.subscribe(&id).unwrap();
        registry.broadcast(&id, "L2");

        assert_eq!(rx.recv().await, Some(LogLine::new("L2")));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn test_removal_closes_subscribers_and_silences_broadcast() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let mut rx = registry.subscribe(&id).unwrap();

        assert!(registry.remove(&id).await);
        assert_eq!(rx.recv().await, None);

        assert_eq!(registry.broadcast(&id, "after"), 0);
        assert!(!registry.contains(&id));
        assert_eq!(registry.factory().created(), 1);
    }

    #[tokio::test]
    async fn test_stuck_subscriber_is_dropped_without_affecting_others() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let mut events = registry.subscribe_events();

        let (stuck, _stuck_rx) = SubscriberChannel::bounded(1);
        let stuck_id = stuck.id();
        assert!(registry.attach(&id, stuck));
        let mut healthy: Vec<LogStream> =
            (0..3).map(|_| registry.subscribe(&id).unwrap()).collect();

        assert_eq!(registry.broadcast(&id, "one"), 4);
        assert_eq!(registry.broadcast(&id, "two"), 3);
        assert_eq!(registry.broadcast(&id, "three"), 3);
        assert_eq!(registry.snapshot()[0].subscriber_count, 3);

        for rx in &mut healthy {
            assert_eq!(rx.recv().await, Some(LogLine::new("one")));
            assert_eq!(rx.recv().await, Some(LogLine::new("two")));
            assert_eq!(rx.recv().await, Some(LogLine::new("three")));
        }

        assert!(drain(&mut events).contains(&RegistryEvent::SubscriberDetached {
            identity: id.clone(),
            subscriber: stuck_id,
            reason: DetachReason::Overloaded,
        }));
    }

    #[tokio::test]
    async fn test_detach_reasons_are_published() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let mut events = registry.subscribe_events();

        let requested = registry.subscribe(&id).unwrap();
        let gone = registry.subscribe(&id).unwrap();
        let kept = registry.subscribe(&id).unwrap();
        let (requested_id, gone_id, kept_id) = (requested.id(), gone.id(), kept.id());

        registry.detach(&id, requested_id);
        drop(gone);
        assert_eq!(registry.broadcast(&id, "still here"), 1);
        assert_eq!(registry.snapshot()[0].subscriber_count, 1);
        registry.remove(&id).await;

        let attached = |subscriber| RegistryEvent::SubscriberAttached {
            identity: id.clone(),
            subscriber,
        };
        let detached = |subscriber, reason| RegistryEvent::SubscriberDetached {
            identity: id.clone(),
            subscriber,
            reason,
        };
        assert_eq!(
            drain(&mut events),
            vec![
                attached(requested_id),
                attached(gone_id),
                attached(kept_id),
                detached(requested_id, DetachReason::Requested),
                detached(gone_id, DetachReason::Disconnected),
                detached(kept_id, DetachReason::SessionClosed),
                RegistryEvent::SessionRemoved {
                    identity: id.clone(),
                    reason: RemovalReason::Logout,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_removal_wakes_waiting_observer() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let mut logs = registry.subscribe(&id).unwrap();

        let mut next = task::spawn(logs.recv());
        assert_pending!(next.poll());

        registry.remove(&id).await;
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), None);
    }

    #[tokio::test]
    async fn test_subscription_sink_stays_revoked_after_relogin() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let (mut logs, sink) = registry.subscribe_with_sink(&id).unwrap();
        assert!(!sink.is_revoked());

        registry.logout(&id).await.unwrap();
        registry.get_or_create(&id).await.unwrap();

        assert_eq!(logs.recv().await, None);
        assert!(sink.is_revoked());
        assert!(!registry.sink(&id).unwrap().is_revoked());
    }

    #[tokio::test]
    async fn test_attach_requires_session() {
        let registry = registry(CountingFactory::default());
        let id = user("ghost");
        let (channel, _rx) = SubscriberChannel::bounded(4);

        assert!(!registry.attach(&id, channel));
        assert!(matches!(
            registry.subscribe(&id),
            Err(RegistryError::NoActiveSession(_))
        ));
        registry.detach(&id, SubscriberId::nil());
    }

    #[tokio::test]
    async fn test_sink_is_bound_to_one_session() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");
        registry.get_or_create(&id).await.unwrap();
        let old_sink = registry.sink(&id).unwrap();

        registry.remove(&id).await;
        registry.get_or_create(&id).await.unwrap();
        let mut rx = registry.subscribe(&id).unwrap();

        old_sink.emit("stale".into());
        registry.sink(&id).unwrap().emit("fresh".into());

        assert_eq!(rx.recv().await, Some(LogLine::new("fresh")));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn test_lease_tracks_use_and_revocation() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");

        let lease = registry.lease(&id).await.unwrap();
        assert!(lease.created());
        assert_eq!(**lease, 1);
        assert_eq!(registry.snapshot()[0].active_leases, 1);

        let mut rx = registry.subscribe(&id).unwrap();
        lease.sink().emit("working".into());
        assert_eq!(rx.recv().await, Some(LogLine::new("working")));

        registry.remove(&id).await;
        assert!(lease.is_revoked());
        lease.sink().emit("dropped".into());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_destroys_everything() {
        let registry = registry(CountingFactory::default());
        for name in ["a", "b", "c"] {
            registry.get_or_create(&user(name)).await.unwrap();
        }
        let mut rx = registry.subscribe(&user("b")).unwrap();

        assert_eq!(registry.shutdown().await, 3);
        assert!(registry.is_empty());
        assert_eq!(rx.recv().await, None);

        let mut destroyed = registry.factory().destroyed();
        destroyed.sort_unstable();
        assert_eq!(destroyed, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_login_observe_logout_scenario() {
        let registry = registry(CountingFactory::default());
        let id = user("u1");

        let (c1, created) = registry.get_or_create(&id).await.unwrap();
        assert!(created);

        let mut sub_a = registry.subscribe(&id).unwrap();
        let mut sub_b = registry.subscribe(&id).unwrap();

        registry.broadcast(&id, "step 1 done");
        assert_eq!(sub_a.recv().await, Some(LogLine::new("step 1 done")));
        assert_eq!(sub_b.recv().await, Some(LogLine::new("step 1 done")));

        registry.detach(&id, sub_b.id());
        registry.broadcast(&id, "step 2 done");
        assert_eq!(sub_a.recv().await, Some(LogLine::new("step 2 done")));
        assert_eq!(sub_b.recv().await, None);

        registry.logout(&id).await.unwrap();
        assert_eq!(sub_a.recv().await, None);

        let (c2, created) = registry.get_or_create(&id).await.unwrap();
        assert!(created);
        assert_ne!(*c1, *c2);
    }
}
