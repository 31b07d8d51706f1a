//! In-use leases on a session's context.

use std::{ops::Deref, sync::Arc};

use dreamjob_core::UserIdentity;

use crate::{entry::SessionEntry, events::EventBus, sink::SessionSink};

/// Borrowed use of a session's context.
///
/// While any lease is outstanding the idle sweeper leaves the session alone.
/// Dropping the lease touches the session, so the idle clock restarts when
/// the work finishes rather than when it began. An explicit logout still
/// tears the session down; check [`is_revoked`](Self::is_revoked) to stop
/// long-running work early.
pub struct ContextLease<C> {
    entry: Arc<SessionEntry<C>>,
    created: bool,
    events: EventBus,
}

impl<C> ContextLease<C> {
    pub(crate) const fn new(entry: Arc<SessionEntry<C>>, created: bool, events: EventBus) -> Self {
        Self {
            entry,
            created,
            events,
        }
    }

    /// The leased context.
    #[must_use]
    pub fn context(&self) -> &C {
        self.entry.context()
    }

    /// Whether this lease's acquisition created the session.
    #[must_use]
    pub const fn created(&self) -> bool {
        self.created
    }

    /// Identity the session belongs to.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        self.entry.identity()
    }

    /// Whether the session was removed while the lease was held.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.entry.is_closed()
    }

    /// Log sink bound to this session.
    #[must_use]
    pub fn sink(&self) -> SessionSink<C> {
        SessionSink::new(&self.entry, self.events.clone())
    }
}

impl<C> Deref for ContextLease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.entry.context()
    }
}

impl<C> Drop for ContextLease<C> {
    fn drop(&mut self) {
        self.entry.touch();
        self.entry.release_lease();
    }
}
