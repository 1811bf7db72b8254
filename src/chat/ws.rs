use std::sync::Arc;

use axum::{
    Router, debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{AppResult, AppState, auth::Identity, auth::Verifier};

use super::{Coordinator, events::ClientIntent, registry::ConnId};

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    token: String,
}

/// The token is checked before the upgrade completes; a connection that
/// fails verification never gets a websocket.
#[debug_handler(state = AppState)]
pub(crate) async fn upgrade(
    Query(WsQuery { token }): Query<WsQuery>,
    State(verifier): State<Verifier>,
    State(coordinator): State<Arc<Coordinator>>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let identity = verifier.verify(&token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, coordinator, identity)))
}

async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>, identity: Identity) {
    let username = identity.username.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = coordinator.connect(identity, tx);
    log::info!("user connected: {username} ({conn})");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        let WsMessage::Text(text) = frame else {
            continue;
        };
        // undecodable frames are ignored, like any other malformed input
        let Ok(intent) = serde_json::from_str::<ClientIntent>(&text) else {
            continue;
        };
        if let Err(err) = dispatch(&coordinator, conn, intent).await {
            coordinator.report(conn, err);
        }
    }

    writer.abort();
    coordinator.disconnect(conn).await;
    log::info!("user disconnected: {username} ({conn})");
}

async fn dispatch(coordinator: &Coordinator, conn: ConnId, intent: ClientIntent) -> AppResult<()> {
    match intent {
        ClientIntent::JoinRoom { room_id } => coordinator.join(conn, room_id).await,
        ClientIntent::SendMessage { room_id, content } => {
            coordinator.send(conn, room_id, &content).await
        }
        ClientIntent::LeaveRoom { room_id } => coordinator.leave(conn, room_id).await,
    }
}
