//! Registry lifecycle events.
//!
//! Events are advisory: publishing never blocks and a lagging or absent
//! receiver has no effect on registry behaviour.

use dreamjob_core::{DeliveryError, SubscriberId, UserIdentity};
use tokio::sync::broadcast;

/// Why a session was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Explicit logout / `remove`.
    Logout,
    /// Evicted by the idle sweeper.
    Idle,
    /// Registry shutdown.
    Shutdown,
}

/// Why a subscriber stopped receiving lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachReason {
    /// The observer asked to detach.
    Requested,
    /// The subscriber's queue was full during a broadcast.
    Overloaded,
    /// The observer dropped its stream.
    Disconnected,
    /// The owning session was removed.
    SessionClosed,
}

impl From<DeliveryError> for DetachReason {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::SubscriberOverloaded => Self::Overloaded,
            DeliveryError::Closed => Self::Disconnected,
        }
    }
}

/// Something observable happened in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    SessionCreated {
        identity: UserIdentity,
    },
    SessionRemoved {
        identity: UserIdentity,
        reason: RemovalReason,
    },
    SubscriberAttached {
        identity: UserIdentity,
        subscriber: SubscriberId,
    },
    SubscriberDetached {
        identity: UserIdentity,
        subscriber: SubscriberId,
        reason: DetachReason,
    },
}

/// Broadcast bus for [`RegistryEvent`]s.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn publish(&self, event: RegistryEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }
}
