//! WebSocket entry point for live play.
//!
//! One reader loop per connection turns text frames into `ClientEvent`s and
//! hands them to the coordinator in receipt order; a writer task drains the
//! connection's outbox onto the socket.

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};

use match_core::{ClientEvent, ServerEvent};

use crate::coordinator::Coordinator;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(coordinator): Extension<Coordinator>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

async fn handle_socket(socket: WebSocket, coordinator: Coordinator) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbox) = coordinator.connect();
    tracing::info!(%conn, "socket connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            if let Err(e) = send_event(&mut sender, &event).await {
                tracing::debug!(%conn, "socket write failed: {e}");
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => coordinator.handle(conn, event).await,
            Err(e) => coordinator.notify(
                conn,
                ServerEvent::Error {
                    message: format!("Invalid message: {e}"),
                },
            ),
        }
    }

    coordinator.disconnect(conn).await;
    writer.abort();
    tracing::info!(%conn, "socket disconnected");
}

// ---- Helper: send message ----

async fn send_event(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<()> {
    let json = serde_json::to_string(event)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
