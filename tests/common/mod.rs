#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use match_core::{
    ClientEvent, ConnectionId, MatchRecord, NewMatch, Role, ServerEvent, TimeControl,
};
use match_server::coordinator::{Coordinator, CoordinatorSettings};
use match_server::routes;
use match_server::store::{MatchStore, MemoryStore};

/// Coordinator over a fresh in-memory store, with the default one second tick.
pub struct Arena {
    pub coordinator: Coordinator,
    pub store: Arc<MemoryStore>,
}

impl Arena {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let coordinator = Coordinator::new(store.clone(), CoordinatorSettings::default());
        Self { coordinator, store }
    }

    /// Create an untimed match, or a timed one of `minutes` per side.
    pub async fn create_match(&self, minutes: Option<u32>) -> Uuid {
        let params = NewMatch {
            time_control: if minutes.is_some() {
                TimeControl::Timed
            } else {
                TimeControl::Unlimited
            },
            time_limit: minutes,
            ..NewMatch::default()
        };
        let id = Uuid::new_v4();
        self.store
            .create_match(&params.into_record(id, Utc::now()))
            .await
            .expect("create match");
        id
    }

    pub fn client(&self) -> Client {
        let (conn, rx) = self.coordinator.connect();
        Client {
            conn,
            rx,
            coordinator: self.coordinator.clone(),
        }
    }

    pub fn record(&self, match_id: Uuid) -> MatchRecord {
        self.store.snapshot(match_id).expect("match record")
    }

    /// Serve the HTTP routes on an ephemeral local port and return the base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        let app = routes::app(self.coordinator.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve routes");
        });
        format!("http://{addr}")
    }
}

/// One socket's worth of coordinator access.
pub struct Client {
    pub conn: ConnectionId,
    rx: UnboundedReceiver<ServerEvent>,
    coordinator: Coordinator,
}

impl Client {
    pub async fn send(&self, event: ClientEvent) {
        self.coordinator.handle(self.conn, event).await;
    }

    pub async fn join(&self, match_id: Uuid, role: Role) {
        self.send(ClientEvent::JoinGame {
            match_id,
            player_id: None,
            role,
        })
        .await;
    }

    pub async fn play(&self, match_id: Uuid, mv: &str, position: &str) {
        self.send(ClientEvent::MoveMade {
            match_id,
            mv: mv.to_string(),
            position: position.to_string(),
            is_terminal: false,
            winner: None,
            current_turn: None,
        })
        .await;
    }

    pub async fn disconnect(&self) {
        self.coordinator.disconnect(self.conn).await;
    }

    /// Everything delivered so far.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn last_clock(events: &[ServerEvent]) -> Option<(u32, u32)> {
    events.iter().rev().find_map(|e| match e {
        ServerEvent::ClockUpdate {
            white_seconds,
            black_seconds,
            ..
        } => Some((*white_seconds, *black_seconds)),
        _ => None,
    })
}

pub fn clock_updates(events: &[ServerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ServerEvent::ClockUpdate { .. }))
        .count()
}

pub fn errors(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Error { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
