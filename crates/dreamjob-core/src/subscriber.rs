//! Bounded delivery endpoints for live log subscribers.
//!
//! A [`SubscriberChannel`] is the producer half handed to the registry; the
//! matching [`LogStream`] stays with the observer (usually one open streaming
//! connection). Delivery never blocks: a full queue is reported back so the
//! broadcaster can drop the subscriber instead of stalling everyone else.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::LogLine;

/// Subscriber identifier.
pub type SubscriberId = Uuid;

/// Why a line could not be delivered to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber's queue is full.
    #[error("subscriber overloaded")]
    SubscriberOverloaded,
    /// The observer dropped its end of the channel.
    #[error("subscriber closed")]
    Closed,
}

/// Producer half of a subscriber's bounded queue.
#[derive(Debug, Clone)]
pub struct SubscriberChannel {
    id: SubscriberId,
    sender: mpsc::Sender<LogLine>,
}

impl SubscriberChannel {
    /// Create a bounded channel pair.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, LogStream) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = Uuid::new_v4();
        (
            Self { id, sender },
            LogStream {
                id,
                inner: ReceiverStream::new(receiver),
            },
        )
    }

    /// Identifier shared with the matching [`LogStream`].
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Push a line without waiting.
    ///
    /// # Errors
    /// Returns [`DeliveryError::SubscriberOverloaded`] if the queue is full and
    /// [`DeliveryError::Closed`] if the observer has gone away.
    pub fn try_deliver(&self, line: LogLine) -> Result<(), DeliveryError> {
        self.sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::SubscriberOverloaded,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Whether the observer dropped its stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half of a subscriber's queue.
///
/// Ends once every producer handle is dropped, which happens when the
/// subscriber is detached or its session is removed.
#[derive(Debug)]
pub struct LogStream {
    id: SubscriberId,
    inner: ReceiverStream<LogLine>,
}

impl LogStream {
    /// Identifier shared with the matching [`SubscriberChannel`].
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receive the next line, or `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<LogLine> {
        self.inner.next().await
    }

    /// Receive a buffered line without waiting.
    pub fn try_recv(&mut self) -> Option<LogLine> {
        self.inner.as_mut().try_recv().ok()
    }
}

impl Stream for LogStream {
    type Item = LogLine;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use super::*;

    #[tokio::test]
    async fn test_full_queue_reports_overload() {
        let (tx, mut rx) = SubscriberChannel::bounded(1);
        assert_eq!(tx.id(), rx.id());

        tx.try_deliver("one".into()).unwrap();
        assert_eq!(
            tx.try_deliver("two".into()),
            Err(DeliveryError::SubscriberOverloaded)
        );

        assert_eq!(rx.recv().await, Some(LogLine::new("one")));
    }

    #[tokio::test]
    async fn test_dropped_stream_reports_closed() {
        let (tx, rx) = SubscriberChannel::bounded(4);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.try_deliver("late".into()), Err(DeliveryError::Closed));
    }

    #[test]
    fn test_stream_ends_when_producer_dropped() {
        let (tx, rx) = SubscriberChannel::bounded(4);
        let mut next = task::spawn(rx);

        assert_pending!(next.poll_next());
        tx.try_deliver("first".into()).unwrap();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll_next(), Some(LogLine::new("first")));

        drop(tx);
        assert_ready_eq!(next.poll_next(), None);
    }
}
