use dashmap::DashMap;
use tokio::sync::mpsc;

use match_core::{ConnectionId, ServerEvent};

/// Fan-out of room events to connection outboxes.
#[derive(Default)]
pub(super) struct Bus {
    outboxes: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl Bus {
    pub fn register(&self, conn: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.insert(conn, tx);
        rx
    }

    pub fn unregister(&self, conn: ConnectionId) {
        self.outboxes.remove(&conn);
    }

    pub fn send(&self, conn: ConnectionId, event: ServerEvent) {
        let Some(outbox) = self.outboxes.get(&conn) else {
            return;
        };
        if outbox.send(event).is_err() {
            tracing::debug!(%conn, "outbox closed, dropping event");
        }
    }

    pub fn broadcast(&self, to: impl IntoIterator<Item = ConnectionId>, event: &ServerEvent) {
        for conn in to {
            self.send(conn, event.clone());
        }
    }

    pub fn broadcast_except(
        &self,
        to: impl IntoIterator<Item = ConnectionId>,
        except: ConnectionId,
        event: &ServerEvent,
    ) {
        self.broadcast(to.into_iter().filter(|conn| *conn != except), event);
    }
}
