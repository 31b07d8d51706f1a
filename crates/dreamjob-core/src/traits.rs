//! Contracts for the collaborators the session registry depends on.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{LogLine, UserIdentity};

/// Execution-context creation failed.
#[derive(Debug, Error)]
#[error("context creation failed for {identity}: {message}")]
pub struct FactoryError {
    /// Identity the context was requested for.
    pub identity: UserIdentity,
    /// Human-readable cause.
    pub message: String,
}

impl FactoryError {
    /// Create an error with a message only.
    #[must_use]
    pub fn new(identity: UserIdentity, message: impl Into<String>) -> Self {
        Self {
            identity,
            message: message.into(),
        }
    }
}

/// Creates and tears down per-user execution contexts.
///
/// `create` may be slow and may fail transiently; callers never retry on
/// its behalf. `destroy` is invoked once per successfully created context
/// but should tolerate a context that was already torn down.
#[async_trait]
pub trait ContextFactory: Send + Sync + 'static {
    /// Opaque context handle handed out to request handlers.
    type Context: Clone + Send + Sync + 'static;

    /// Build a fresh context for `identity`.
    async fn create(&self, identity: &UserIdentity) -> Result<Self::Context, FactoryError>;

    /// Release everything held by `context`.
    async fn destroy(&self, context: Self::Context);
}

/// Authentication failure.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthenticated")]
    Unauthenticated,
}

/// Resolves request credentials to an identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify `token` and return the identity it belongs to.
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Destination for progress lines emitted by business logic.
pub trait LogSink: Send + Sync {
    /// Emit one line. Never blocks and never fails.
    fn emit(&self, line: LogLine);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, line: LogLine) {
        (**self).emit(line);
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _line: LogLine) {}
}
