//! WebSocket transport for live session logs.
//!
//! A client connects to `/ws` with its token, is attached as a subscriber
//! of its own session, and receives every line broadcast to that session
//! from then on. Lines emitted before the connection are never replayed.

use std::{future, pin::pin, sync::Arc};

use axum::{
    Router,
    extract::{
        FromRef, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use dreamjob_core::{ContextFactory, LogStream, UserIdentity};
use dreamjob_session::{SessionRegistry, SessionSink};
use futures::{Sink, SinkExt, Stream, StreamExt};

use crate::{
    auth::{AuthenticatedUser, SharedAuthenticator},
    protocol::{ClientMessage, ServerMessage},
};

/// WebSocket handler state.
pub struct WsState<F: ContextFactory> {
    pub registry: Arc<SessionRegistry<F>>,
    pub authenticator: SharedAuthenticator,
}

impl<F: ContextFactory> WsState<F> {
    /// Create new WebSocket state.
    #[must_use]
    pub const fn new(registry: Arc<SessionRegistry<F>>, authenticator: SharedAuthenticator) -> Self {
        Self {
            registry,
            authenticator,
        }
    }
}

impl<F: ContextFactory> Clone for WsState<F> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

impl<F: ContextFactory> FromRef<WsState<F>> for SharedAuthenticator {
    fn from_ref(state: &WsState<F>) -> Self {
        Arc::clone(&state.authenticator)
    }
}

/// WebSocket upgrade handler.
///
/// Authentication runs before the upgrade, so a bad token is answered with
/// a plain 401.
pub async fn ws_handler<F>(
    State(state): State<WsState<F>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    ws: WebSocketUpgrade,
) -> Response
where
    F: ContextFactory,
{
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry, identity))
}

async fn handle_socket<F>(socket: WebSocket, registry: Arc<SessionRegistry<F>>, identity: UserIdentity)
where
    F: ContextFactory,
{
    let (sender, receiver) = socket.split();

    let mut outgoing = pin!(sender.with(|msg: ServerMessage| future::ready(encode(&msg))));
    let mut incoming = pin!(
        receiver
            .take_while(|frame| {
                future::ready(match frame {
                    Ok(Message::Close(_)) => false,
                    Ok(_) => true,
                    Err(e) => {
                        tracing::debug!(error = %e, "WebSocket receive failed");
                        false
                    }
                })
            })
            .filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(serde_json::from_str::<ClientMessage>(text.as_str())),
                    Ok(Message::Binary(data)) => Some(serde_json::from_slice::<ClientMessage>(&data)),
                    _ => None,
                })
            })
    );

    let (logs, session) = match registry.subscribe_with_sink(&identity) {
        Ok(subscription) => subscription,
        Err(e) => {
            let _ = outgoing.send(ServerMessage::error(e.to_string())).await;
            let _ = outgoing.close().await;
            return;
        }
    };

    let subscriber = logs.id();
    tracing::info!(%identity, %subscriber, "Log stream connected");

    let end = relay(
        &registry,
        &identity,
        logs,
        &session,
        outgoing.as_mut(),
        incoming.as_mut(),
    )
    .await;

    registry.detach(&identity, subscriber);
    tracing::info!(%identity, %subscriber, ?end, "Log stream disconnected");
}

fn encode(msg: &ServerMessage) -> Result<Message, axum::Error> {
    serde_json::to_string(msg)
        .map(|json| Message::Text(json.into()))
        .map_err(axum::Error::new)
}

/// Why a relay loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelayEnd {
    /// The session was removed.
    SessionClosed,
    /// The registry dropped this subscriber for falling behind.
    Dropped,
    /// The client went away.
    ClientGone,
}

/// Pump log lines to `outgoing` and answer `incoming` until either side ends.
///
/// `session` is the sink of the session `logs` was attached to; it decides
/// whether an ended stream means that session is gone.
pub(crate) async fn relay<F, Tx, Rx>(
    registry: &SessionRegistry<F>,
    identity: &UserIdentity,
    mut logs: LogStream,
    session: &SessionSink<F::Context>,
    mut outgoing: Tx,
    mut incoming: Rx,
) -> RelayEnd
where
    F: ContextFactory,
    Tx: Sink<ServerMessage> + Unpin + Send,
    Rx: Stream<Item = Result<ClientMessage, serde_json::Error>> + Unpin + Send,
{
    if outgoing.send(ServerMessage::subscribed(identity)).await.is_err() {
        return RelayEnd::ClientGone;
    }

    loop {
        tokio::select! {
            line = logs.recv() => {
                let Some(line) = line else {
                    // The channel only closes on removal or on overflow.
                    let (end, last) = if session.is_revoked() {
                        (RelayEnd::SessionClosed, ServerMessage::SessionClosed)
                    } else {
                        (RelayEnd::Dropped, ServerMessage::error("Log stream fell behind; reconnect"))
                    };
                    let _ = outgoing.send(last).await;
                    let _ = outgoing.close().await;
                    return end;
                };
                if outgoing.send(ServerMessage::log(line)).await.is_err() {
                    return RelayEnd::ClientGone;
                }
            }
            frame = incoming.next() => {
                let reply = match frame {
                    None => return RelayEnd::ClientGone,
                    Some(Ok(ClientMessage::Ping)) => {
                        registry.touch(identity);
                        ServerMessage::Pong
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%identity, error = %e, "Invalid client message");
                        ServerMessage::error(format!("Invalid message: {e}"))
                    }
                };
                if outgoing.send(reply).await.is_err() {
                    return RelayEnd::ClientGone;
                }
            }
        }
    }
}

/// Create the WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(registry.clone(), authenticator.clone()));
/// ```
#[must_use]
pub fn create_ws_router<F>(registry: Arc<SessionRegistry<F>>, authenticator: SharedAuthenticator) -> Router
where
    F: ContextFactory,
{
    Router::new()
        .route("/ws", get(ws_handler::<F>))
        .with_state(WsState::new(registry, authenticator))
}
