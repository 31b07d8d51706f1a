//! Transport layer for session log streaming.
//!
//! Provides:
//! - Wire protocol (JSON, tagged by `type`)
//! - Token authentication extractor and HTTP error mapping (feature: server)
//! - WebSocket log stream (feature: server)

pub mod protocol;

#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod error;
#[cfg(feature = "server")]
pub mod websocket;

pub use protocol::{ClientMessage, ServerMessage};

#[cfg(feature = "server")]
pub use auth::{AuthenticatedUser, SharedAuthenticator, bearer_token};
#[cfg(feature = "server")]
pub use error::ApiError;
#[cfg(feature = "server")]
pub use websocket::{WsState, create_ws_router, ws_handler};
