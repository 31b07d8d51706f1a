//! Log sink wired to one session's subscribers.

use std::sync::{Arc, Weak};

use dreamjob_core::{LogLine, LogSink};

use crate::{entry::SessionEntry, events::EventBus, registry::fan_out};

/// [`LogSink`] that broadcasts to the subscribers of one specific session.
///
/// Holds the session weakly: once the session is removed, emitted lines are
/// silently dropped.
pub struct SessionSink<C> {
    entry: Weak<SessionEntry<C>>,
    events: EventBus,
}

impl<C> SessionSink<C> {
    pub(crate) fn new(entry: &Arc<SessionEntry<C>>, events: EventBus) -> Self {
        Self {
            entry: Arc::downgrade(entry),
            events,
        }
    }

    /// Whether the bound session has been removed.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.entry.upgrade().is_none_or(|entry| entry.is_closed())
    }
}

impl<C> Clone for SessionSink<C> {
    fn clone(&self) -> Self {
        Self {
            entry: Weak::clone(&self.entry),
            events: self.events.clone(),
        }
    }
}

impl<C: Send + Sync> LogSink for SessionSink<C> {
    fn emit(&self, line: LogLine) {
        if let Some(entry) = self.entry.upgrade() {
            fan_out(&entry, &line, &self.events);
        }
    }
}
