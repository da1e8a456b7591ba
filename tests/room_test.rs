//! Room registry, seating and move relay, driven through the coordinator
//! against the in-memory store.

mod common;

use common::{errors, Arena};
use match_core::{ClientEvent, EndReason, MoveEntry, Outcome, Role, ServerEvent, Side};
use uuid::Uuid;

#[tokio::test]
async fn test_first_two_players_get_white_then_black() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let mut b = arena.client();

    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;

    let a_events = a.drain();
    assert!(a_events.contains(&ServerEvent::AssignedSide { side: Side::White }));
    assert!(a_events.contains(&ServerEvent::MoveHistorySnapshot {
        entries: vec![],
        outcome: None,
    }));
    assert!(a_events.contains(&ServerEvent::Occupancy {
        player_count: 2,
        onlooker_count: 0,
    }));
    assert!(b.drain().contains(&ServerEvent::AssignedSide { side: Side::Black }));
}

#[tokio::test]
async fn test_move_is_relayed_to_opponent_only() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let mut b = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    a.drain();
    b.drain();

    a.play(id, "e2e4", "P1").await;

    assert!(b.drain().contains(&ServerEvent::OpponentMove {
        mv: "e2e4".into(),
        position: "P1".into(),
    }));
    assert!(!a
        .drain()
        .iter()
        .any(|e| matches!(e, ServerEvent::OpponentMove { .. })));

    let status = arena.coordinator.room_status(id).await.unwrap();
    assert_eq!(status.current_turn, Side::Black);
    assert_eq!(status.moves_played, 1);

    let record = arena.record(id);
    assert_eq!(
        record.move_history,
        vec![MoveEntry {
            mv: "e2e4".into(),
            position: "P1".into(),
        }]
    );
    assert_eq!(record.current_turn, Side::Black);
}

#[tokio::test]
async fn test_turn_follows_move_count_parity() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let a = arena.client();
    let b = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;

    let moves = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5"];
    for (i, mv) in moves.iter().enumerate() {
        let mover = if i % 2 == 0 { &a } else { &b };
        mover.play(id, mv, &format!("P{}", i + 1)).await;
        let status = arena.coordinator.room_status(id).await.unwrap();
        assert_eq!(status.current_turn, Side::to_move_after(i + 1));
    }
    assert_eq!(arena.record(id).move_history.len(), moves.len());
}

#[tokio::test]
async fn test_third_player_is_rejected_but_onlooker_admitted() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let a = arena.client();
    let b = arena.client();
    let mut c = arena.client();
    let mut d = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;

    c.join(id, Role::Player).await;
    let c_events = c.drain();
    assert_eq!(c_events, vec![ServerEvent::RoomFull]);

    d.join(id, Role::Onlooker).await;
    let d_events = d.drain();
    assert!(d_events.contains(&ServerEvent::AssignedRole {
        role: Role::Onlooker
    }));
    assert!(!d_events
        .iter()
        .any(|e| matches!(e, ServerEvent::AssignedSide { .. })));

    let status = arena.coordinator.room_status(id).await.unwrap();
    assert_eq!(status.player_count, 2);
    assert_eq!(status.onlooker_count, 1);

    a.play(id, "d2d4", "P1").await;
    assert!(d.drain().contains(&ServerEvent::OpponentMove {
        mv: "d2d4".into(),
        position: "P1".into(),
    }));
    // Rejected connection is not a member and hears nothing.
    assert!(c.drain().is_empty());
}

#[tokio::test]
async fn test_rejoin_keeps_the_same_seat() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    a.join(id, Role::Player).await;
    a.join(id, Role::Player).await;

    let sides: Vec<_> = a
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::AssignedSide { side } => Some(side),
            _ => None,
        })
        .collect();
    assert_eq!(sides, vec![Side::White, Side::White]);

    let status = arena.coordinator.room_status(id).await.unwrap();
    assert_eq!(status.player_count, 1);
    assert!(status.has_white);
    assert!(!status.has_black);
}

#[tokio::test]
async fn test_join_unknown_match() {
    let arena = Arena::new();
    let mut a = arena.client();
    a.join(Uuid::new_v4(), Role::Player).await;

    assert_eq!(errors(&a.drain()), vec!["Match not found".to_string()]);
    assert_eq!(arena.coordinator.live_rooms(), 0);
}

#[tokio::test]
async fn test_out_of_turn_and_onlooker_moves_are_rejected() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let mut b = arena.client();
    let mut watcher = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    watcher.join(id, Role::Onlooker).await;
    a.drain();
    b.drain();
    watcher.drain();

    b.play(id, "e7e5", "P1").await;
    assert_eq!(errors(&b.drain()), vec!["It is not your turn".to_string()]);

    watcher.play(id, "e2e4", "P1").await;
    assert_eq!(
        errors(&watcher.drain()),
        vec!["Only seated players can do that".to_string()]
    );

    assert!(a.drain().is_empty());
    assert!(arena.record(id).move_history.is_empty());
}

#[tokio::test]
async fn test_events_before_join_are_rejected() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();

    a.play(id, "e2e4", "P1").await;
    assert_eq!(
        errors(&a.drain()),
        vec!["Not joined to this match".to_string()]
    );
}

#[tokio::test]
async fn test_late_joiner_receives_history_and_chat() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let a = arena.client();
    let b = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    a.play(id, "e2e4", "P1").await;
    b.play(id, "c7c5", "P2").await;
    a.send(ClientEvent::ChatMessage {
        match_id: id,
        user: "alice".into(),
        text: "gl".into(),
    })
    .await;

    let mut late = arena.client();
    late.join(id, Role::Onlooker).await;
    let events = late.drain();

    let history = events.iter().find_map(|e| match e {
        ServerEvent::MoveHistorySnapshot { entries, .. } => Some(entries.clone()),
        _ => None,
    });
    let moves: Vec<_> = history.unwrap().into_iter().map(|m| m.mv).collect();
    assert_eq!(moves, vec!["e2e4", "c7c5"]);

    let chat = events.iter().find_map(|e| match e {
        ServerEvent::ChatHistorySnapshot { entries } => Some(entries.clone()),
        _ => None,
    });
    let chat = chat.unwrap();
    assert_eq!(chat.len(), 1);
    assert_eq!(chat[0].sender, "alice");
    assert_eq!(chat[0].text, "gl");
}

#[tokio::test]
async fn test_chat_reaches_every_member() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let mut b = arena.client();
    let mut watcher = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    watcher.join(id, Role::Onlooker).await;
    a.drain();
    b.drain();
    watcher.drain();

    watcher
        .send(ClientEvent::ChatMessage {
            match_id: id,
            user: "kibitzer".into(),
            text: "nice".into(),
        })
        .await;

    for client in [&mut a, &mut b, &mut watcher] {
        let got = client.drain().into_iter().any(|e| {
            matches!(e, ServerEvent::ChatMessage { ref user, ref text, .. }
                if user == "kibitzer" && text == "nice")
        });
        assert!(got, "{} missed the chat message", client.conn);
    }
}

#[tokio::test]
async fn test_joining_another_match_leaves_the_first() {
    let arena = Arena::new();
    let first = arena.create_match(None).await;
    let second = arena.create_match(None).await;
    let a = arena.client();
    let mut b = arena.client();
    a.join(first, Role::Player).await;
    b.join(first, Role::Player).await;
    b.drain();

    a.join(second, Role::Player).await;

    assert!(b.drain().contains(&ServerEvent::Occupancy {
        player_count: 1,
        onlooker_count: 0,
    }));
    let status = arena.coordinator.room_status(first).await.unwrap();
    assert!(!status.has_white);
    assert!(status.has_black);

    // Moves for the old match no longer count as joined.
    let mut a = a;
    a.drain();
    a.play(first, "e2e4", "P1").await;
    assert_eq!(
        errors(&a.drain()),
        vec!["Not joined to this match".to_string()]
    );
}

#[tokio::test]
async fn test_room_discarded_when_last_player_leaves() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let a = arena.client();
    let b = arena.client();
    let watcher = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    watcher.join(id, Role::Onlooker).await;
    a.play(id, "e2e4", "P1").await;

    a.disconnect().await;
    assert!(arena.coordinator.room_status(id).await.is_some());
    b.disconnect().await;

    assert!(arena.coordinator.room_status(id).await.is_none());
    assert_eq!(arena.coordinator.live_rooms(), 0);
    // Durable record is untouched.
    assert_eq!(arena.record(id).move_history.len(), 1);
    assert_eq!(arena.record(id).outcome, None);

    // The match resumes from the store on the next join.
    let mut c = arena.client();
    c.join(id, Role::Player).await;
    let events = c.drain();
    assert!(events.contains(&ServerEvent::AssignedSide { side: Side::White }));
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::MoveHistorySnapshot { entries, .. } if entries.len() == 1
    )));
    let status = arena.coordinator.room_status(id).await.unwrap();
    assert_eq!(status.current_turn, Side::Black);
}

#[tokio::test]
async fn test_store_outage_does_not_stop_play() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let a = arena.client();
    let mut b = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    b.drain();

    arena.store.set_offline(true);
    a.play(id, "e2e4", "P1").await;
    assert!(b.drain().contains(&ServerEvent::OpponentMove {
        mv: "e2e4".into(),
        position: "P1".into(),
    }));
    assert!(arena.record(id).move_history.is_empty());

    arena.store.set_offline(false);
    b.play(id, "e7e5", "P2").await;

    // Next successful write carries the whole in-memory ledger.
    let moves: Vec<_> = arena
        .record(id)
        .move_history
        .into_iter()
        .map(|m| m.mv)
        .collect();
    assert_eq!(moves, vec!["e2e4", "e7e5"]);
}

#[tokio::test]
async fn test_checkmate_claim_ends_the_match() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let mut b = arena.client();
    let mut watcher = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    watcher.join(id, Role::Onlooker).await;
    a.play(id, "f2f3", "P1").await;
    b.play(id, "e7e5", "P2").await;
    a.play(id, "g2g4", "P3").await;
    a.drain();
    b.drain();
    watcher.drain();

    b.send(ClientEvent::MoveMade {
        match_id: id,
        mv: "d8h4".into(),
        position: "P4".into(),
        is_terminal: true,
        winner: Some(Outcome::Black),
        current_turn: Some(Side::White),
    })
    .await;

    let ended = ServerEvent::MatchEnded {
        outcome: Outcome::Black,
        reason: EndReason::Checkmate,
    };
    assert!(a.drain().contains(&ended));
    assert!(b.drain().contains(&ended));
    assert!(watcher.drain().contains(&ended));

    let record = arena.record(id);
    assert_eq!(record.outcome, Some(Outcome::Black));
    assert_eq!(record.move_history.len(), 4);
    assert!(arena.coordinator.room_status(id).await.is_none());
}

#[tokio::test]
async fn test_finished_match_stays_finished() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let a = arena.client();
    let b = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    a.play(id, "e2e4", "P1").await;
    b.send(ClientEvent::Surrender {
        match_id: id,
        losing_side: Some(Side::Black),
    })
    .await;
    assert_eq!(arena.record(id).outcome, Some(Outcome::White));

    // Rejoin sees the result and nothing further is accepted.
    let mut again = arena.client();
    again.join(id, Role::Player).await;
    assert!(again.drain().contains(&ServerEvent::MoveHistorySnapshot {
        entries: arena.record(id).move_history,
        outcome: Some(Outcome::White),
    }));

    again
        .send(ClientEvent::Surrender {
            match_id: id,
            losing_side: None,
        })
        .await;
    again.play(id, "e7e5", "P2").await;
    assert_eq!(
        errors(&again.drain()),
        vec![
            "Match is already over".to_string(),
            "Match is already over".to_string()
        ]
    );
    let record = arena.record(id);
    assert_eq!(record.outcome, Some(Outcome::White));
    assert_eq!(record.move_history.len(), 1);
}

#[tokio::test]
async fn test_outcome_survives_failed_write() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let mut b = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    a.play(id, "e2e4", "P1").await;

    arena.store.set_offline(true);
    a.send(ClientEvent::Surrender {
        match_id: id,
        losing_side: None,
    })
    .await;
    assert!(b.drain().contains(&ServerEvent::MatchEnded {
        outcome: Outcome::Black,
        reason: EndReason::Surrender,
    }));
    assert_eq!(arena.record(id).outcome, None);
    assert_eq!(
        arena.coordinator.unsettled_outcome(id),
        Some(Outcome::Black)
    );

    // Rebuilding the room carries the result over and writes it.
    arena.store.set_offline(false);
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;
    assert!(a.drain().contains(&ServerEvent::MoveHistorySnapshot {
        entries: arena.record(id).move_history,
        outcome: Some(Outcome::Black),
    }));
    assert_eq!(arena.record(id).outcome, Some(Outcome::Black));
    assert_eq!(arena.coordinator.unsettled_outcome(id), None);

    b.drain();
    b.send(ClientEvent::Surrender {
        match_id: id,
        losing_side: None,
    })
    .await;
    assert_eq!(errors(&b.drain()), vec!["Match is already over".to_string()]);
    assert_eq!(arena.record(id).outcome, Some(Outcome::Black));
}

#[tokio::test]
async fn test_last_player_stepping_down_discards_room() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    a.join(id, Role::Player).await;

    a.join(id, Role::Onlooker).await;

    assert_eq!(arena.coordinator.live_rooms(), 0);
    assert!(arena.coordinator.room_status(id).await.is_none());
    a.drain();
    a.play(id, "e2e4", "P1").await;
    assert_eq!(
        errors(&a.drain()),
        vec!["Not joined to this match".to_string()]
    );
}

#[tokio::test]
async fn test_player_stepping_down_frees_seat() {
    let arena = Arena::new();
    let id = arena.create_match(None).await;
    let mut a = arena.client();
    let b = arena.client();
    let mut c = arena.client();
    a.join(id, Role::Player).await;
    b.join(id, Role::Player).await;

    a.join(id, Role::Onlooker).await;
    assert!(a.drain().contains(&ServerEvent::AssignedRole {
        role: Role::Onlooker
    }));
    let status = arena.coordinator.room_status(id).await.unwrap();
    assert_eq!((status.player_count, status.onlooker_count), (1, 1));
    assert!(!status.has_white);

    c.join(id, Role::Player).await;
    assert!(c.drain().contains(&ServerEvent::AssignedSide { side: Side::White }));
}
