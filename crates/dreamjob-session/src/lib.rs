//! Per-user session registry for job-search execution contexts.
//!
//! Provides:
//! - `SessionRegistry` - Identity → reusable context + live log subscribers
//! - `IdleSweeper` - Background eviction of sessions nobody touched recently
//! - `ContextLease` / `SessionSink` - In-use marking and log wiring for business logic
//! - `RegistryEvent` - Observable lifecycle events

pub mod config;
mod entry;
pub mod events;
mod gate;
pub mod lease;
pub mod registry;
pub mod sink;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use config::RegistryConfig;
pub use events::{DetachReason, RegistryEvent, RemovalReason};
pub use lease::ContextLease;
pub use registry::{RegistryError, SessionInfo, SessionRegistry};
pub use sink::SessionSink;
pub use sweeper::{IdleSweeper, SweeperHandle, sweep_once};
