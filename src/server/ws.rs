// src/server/ws.rs
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tracing::info;

use super::AppState;
use crate::subscriber::{self, Subscriber, View};

/// Builds one bare WebSocket router fixed to a single view. Each of the
/// three listener ports runs its own instance of this router (§4.8).
pub fn router(state: AppState, view: View) -> Router {
    let handler = move |ws: WebSocketUpgrade, State(state): State<AppState>| async move {
        ws.on_upgrade(move |socket| handle_connection(socket, state, view))
    };
    Router::new().route("/", get(handler)).with_state(state)
}

async fn handle_connection(mut socket: WebSocket, state: AppState, view: View) {
    let subscriber = Subscriber::new(view, state.config.client_queue_size);

    if let Err(reason) = state.broker.attach(subscriber.clone()).await {
        info!("rejecting {:?} connection: {}", view, reason);
        let close = Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: reason.into(),
        }));
        let _ = socket.send(close).await;
        return;
    }

    let broker = state.broker.clone();
    let ping_timeout = state.config.client_ping_timeout();
    let sub_view = subscriber.view;

    subscriber::serve(socket, subscriber, ping_timeout, move |id| {
        tokio::spawn(async move {
            broker.detach(sub_view, id).await;
        });
    })
    .await;
}
