//! Core abstractions for per-user job-search sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `UserIdentity` - Normalized key for an authenticated user
//! - `LogLine` - One line of live progress output
//! - `SubscriberChannel` / `LogStream` - Bounded fan-out endpoints
//! - Collaborator traits: `ContextFactory`, `Authenticator`, `JobSearchEngine`, `LogSink`

pub mod identity;
pub mod job;
pub mod log_line;
pub mod subscriber;
pub mod traits;

pub use identity::UserIdentity;
pub use job::{EngineError, JobPosting, JobQuery, JobSearchEngine, UpdateRequest};
pub use log_line::LogLine;
pub use subscriber::{DeliveryError, LogStream, SubscriberChannel, SubscriberId};
pub use traits::{AuthError, Authenticator, ContextFactory, FactoryError, LogSink, NullSink};
