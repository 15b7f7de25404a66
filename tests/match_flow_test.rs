mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chess_core::protocol::{ClientMessage, ServerMessage};
use chess_core::{BoardSnapshot, MatchOutcome, Replica, Side, Square};
use server::config::Config;
use server::error::MatchError;
use server::events::MatchEvent;
use server::game::lifecycle::ForcedOutcome;
use server::game::registry::Membership;
use server::store::{MemoryPositionStore, PositionStore, SavedPosition, StoreError};

fn sq(s: &str) -> Square {
    s.parse().unwrap()
}

async fn play(member: &Membership, from: &str, to: &str) {
    member
        .context
        .submit_move(member.participant, from, to)
        .await
        .unwrap_or_else(|e| panic!("{from}{to} rejected: {e}"));
}

fn feed(replica: &mut Replica, member: &mut Membership) {
    for event in common::drain(&mut member.events) {
        if let Some(msg) = event.to_message(member.participant) {
            replica.apply(&msg).unwrap();
        }
    }
}

#[tokio::test]
async fn test_two_player_game_replicates_to_both_sides() {
    let registry = common::registry();
    let mut a = registry.join("e2e").await;
    let mut b = registry.join("e2e").await;
    assert_eq!(a.welcome.side, Some(Side::White));
    assert_eq!(b.welcome.side, Some(Side::Black));

    let mut white = Replica::new();
    let mut black = Replica::new();
    white.apply(&a.welcome.to_message()).unwrap();
    black.apply(&b.welcome.to_message()).unwrap();
    feed(&mut white, &mut a);
    feed(&mut black, &mut b);
    assert!(white.can_interact(Side::White));
    assert!(!black.can_interact(Side::Black));

    // White moves optimistically, then the server confirms
    let request = white.begin_move(sq("e2"), sq("e4")).unwrap();
    let ClientMessage::Move { from, to } = request else {
        panic!("expected a move request");
    };
    let applied = a.context.submit_move(a.participant, &from, &to).await.unwrap();

    let seen_by_black = common::drain(&mut b.events);
    assert_eq!(
        seen_by_black,
        vec![
            MatchEvent::MoveApplied { from: sq("e2"), to: sq("e4"), mover: Side::White },
            MatchEvent::TurnChanged { side_to_move: Side::Black, turn: 1 },
        ]
    );
    for event in &seen_by_black {
        black.apply(&event.to_message(b.participant).unwrap()).unwrap();
    }
    feed(&mut white, &mut a);
    assert_eq!(white.pending_move(), None);
    assert!(black.can_interact(Side::Black));
    assert!(black.board().piece_at(sq("e4")).is_some());
    assert!(black.board().piece_at(sq("e2")).is_none());

    // Snapshot follows after the settle delay and needs no repairs
    tokio::time::timeout(Duration::from_secs(2), b.snapshots.changed())
        .await
        .unwrap()
        .unwrap();
    let published = b.snapshots.borrow_and_update().clone();
    assert_eq!(published.turn, 1);
    assert_eq!(published.snapshot, applied.snapshot);
    let repairs = black
        .apply(&ServerMessage::Snapshot { fen: published.snapshot.as_str().to_string() })
        .unwrap();
    assert!(repairs.is_empty());

    // Black replies
    black.begin_move(sq("e7"), sq("e5")).unwrap();
    play(&b, "e7", "e5").await;
    assert_eq!(
        common::drain(&mut a.events),
        vec![
            MatchEvent::MoveApplied { from: sq("e7"), to: sq("e5"), mover: Side::Black },
            MatchEvent::TurnChanged { side_to_move: Side::White, turn: 2 },
        ]
    );
    assert_eq!(a.context.summary().await.turn, 2);

    // Black again, out of turn
    tokio::time::timeout(Duration::from_secs(2), b.snapshots.changed())
        .await
        .unwrap()
        .unwrap();
    let before = b.snapshots.borrow_and_update().clone();
    feed(&mut black, &mut b);
    assert_eq!(black.pending_move(), None);
    let request = black.begin_move(sq("d7"), sq("d5"));
    assert!(request.is_none());
    let err = b.context.submit_move(b.participant, "d7", "d5").await.unwrap_err();
    assert_eq!(err.reason(), "not_your_turn");
    assert!(common::drain(&mut a.events).is_empty());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!b.snapshots.has_changed().unwrap());
    assert_eq!(before.turn, 2);
    assert_eq!(a.context.summary().await.turn, 2);
}

#[tokio::test]
async fn test_wrong_turn_is_rejected_without_broadcast() {
    let registry = common::registry();
    let mut a = registry.join("wrong-turn").await;
    let b = registry.join("wrong-turn").await;
    common::drain(&mut a.events);

    let err = b.context.submit_move(b.participant, "e7", "e5").await.unwrap_err();
    assert!(matches!(err, MatchError::NotYourTurn { side_to_move: Side::White }));
    assert_eq!(err.reason(), "not_your_turn");

    assert!(common::drain(&mut a.events).is_empty());
    assert_eq!(b.context.pending_publications().await, 0);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!a.snapshots.has_changed().unwrap());

    let summary = a.context.summary().await;
    assert_eq!(summary.turn, 0);
    assert_eq!(summary.fen, BoardSnapshot::initial().as_str());
}

#[tokio::test]
async fn test_invalid_requests_report_reasons() {
    let registry = common::registry();
    let a = registry.join("invalid").await;
    let _b = registry.join("invalid").await;
    let spectator = registry.join("invalid").await;
    assert_eq!(spectator.welcome.side, None);

    let err = spectator
        .context
        .submit_move(spectator.participant, "e2", "e4")
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "no_side");

    let err = a.context.submit_move(a.participant, "e2", "e5").await.unwrap_err();
    assert_eq!(err.reason(), "illegal_move");

    let err = a.context.submit_move(a.participant, "z9", "e4").await.unwrap_err();
    assert!(matches!(err, MatchError::InvalidSquare(ref s) if s == "z9"));

    // Nothing above consumed White's turn
    play(&a, "e2", "e4").await;
}

#[tokio::test]
async fn test_concurrent_moves_accept_exactly_one() {
    let registry = common::registry();
    let a = registry.join("race").await;
    let _b = registry.join("race").await;

    let mut tasks = Vec::new();
    for (from, to) in [("e2", "e4"), ("d2", "d4"), ("g1", "f3"), ("b1", "c3")] {
        let context = a.context.clone();
        let participant = a.participant;
        tasks.push(tokio::spawn(async move {
            context.submit_move(participant, from, to).await
        }));
    }

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert_eq!(e.reason(), "not_your_turn"),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(a.context.summary().await.turn, 1);
}

#[tokio::test]
async fn test_checkmate_ends_match_until_new_match() {
    let registry = common::registry();
    let mut a = registry.join("mate").await;
    let b = registry.join("mate").await;

    play(&a, "f2", "f3").await;
    play(&b, "e7", "e5").await;
    play(&a, "g2", "g4").await;
    common::drain(&mut a.events);
    let applied = b.context.submit_move(b.participant, "d8", "h4").await.unwrap();
    assert!(applied.caused_checkmate);

    let events = common::drain(&mut a.events);
    assert_eq!(
        events.last(),
        Some(&MatchEvent::OutcomeChanged {
            previous: MatchOutcome::None,
            current: MatchOutcome::BlackWinsByCheckmate,
        })
    );
    assert_eq!(a.context.outcome().await, MatchOutcome::BlackWinsByCheckmate);

    let err = a.context.submit_move(a.participant, "e2", "e4").await.unwrap_err();
    assert!(matches!(err, MatchError::MatchOver));
    assert!(!a.context.resign(a.participant).await);

    let summary = a.context.new_match().await;
    assert_eq!(summary.outcome, 0);
    assert_eq!(summary.turn, 0);
    assert_eq!(summary.generation, 1);
    assert_eq!(summary.white, Some(a.participant));
    assert_eq!(summary.black, Some(b.participant));
    play(&a, "e2", "e4").await;
}

#[tokio::test]
async fn test_resignation_is_first_writer_wins() {
    let registry = common::registry();
    let mut a = registry.join("resign").await;
    let b = registry.join("resign").await;
    common::drain(&mut a.events);

    assert!(b.context.resign(b.participant).await);
    assert!(!a.context.resign(a.participant).await);
    assert!(!b.context.resign(b.participant).await);

    assert_eq!(
        common::drain(&mut a.events),
        vec![MatchEvent::OutcomeChanged {
            previous: MatchOutcome::None,
            current: MatchOutcome::BlackResigned,
        }]
    );
    assert_eq!(
        a.context.summary().await.message,
        "Black resigned. White wins!"
    );
}

#[tokio::test]
async fn test_force_outcome() {
    let registry = common::registry();
    let a = registry.join("forced").await;
    let _b = registry.join("forced").await;

    assert!(a.context.force_outcome(ForcedOutcome::Stalemate).await.unwrap());
    assert!(!a
        .context
        .force_outcome(ForcedOutcome::Checkmate { winner: Side::White })
        .await
        .unwrap());
    assert_eq!(a.context.outcome().await, MatchOutcome::DrawByStalemate);

    let locked = common::registry_with(Config::default());
    let c = locked.join("forced").await;
    let err = c.context.force_outcome(ForcedOutcome::Stalemate).await.unwrap_err();
    assert!(matches!(err, MatchError::ForceOutcomeDisabled));
}

#[tokio::test]
async fn test_seated_disconnect_resets_and_reseats() {
    let registry = common::registry();
    let a = registry.join("drop").await;
    let mut b = registry.join("drop").await;
    let c = registry.join("drop").await;

    play(&a, "e2", "e4").await;
    play(&b, "e7", "e5").await;
    common::drain(&mut b.events);
    b.snapshots.borrow_and_update();
    let (a_id, b_id, c_id) = (a.participant, b.participant, c.participant);

    assert!(registry.leave(a).await);

    assert_eq!(
        common::drain(&mut b.events),
        vec![
            MatchEvent::OutcomeChanged {
                previous: MatchOutcome::None,
                current: MatchOutcome::ParticipantDisconnected,
            },
            MatchEvent::OutcomeChanged {
                previous: MatchOutcome::ParticipantDisconnected,
                current: MatchOutcome::None,
            },
            MatchEvent::MatchReset { generation: 1 },
            MatchEvent::SideAssigned { participant: b_id, side: Some(Side::White) },
            MatchEvent::SideAssigned { participant: c_id, side: Some(Side::Black) },
            MatchEvent::TurnChanged { side_to_move: Side::White, turn: 0 },
        ]
    );

    // Reset publishes the initial position right away
    assert!(b.snapshots.has_changed().unwrap());
    let published = b.snapshots.borrow_and_update().clone();
    assert_eq!(published.generation, 1);
    assert_eq!(published.snapshot, BoardSnapshot::initial());

    let summary = b.context.summary().await;
    assert_eq!(summary.white, Some(b_id));
    assert_eq!(summary.black, Some(c_id));
    assert!(!summary.participants.contains(&a_id));
    assert_eq!(summary.outcome, 0);
    play(&b, "d2", "d4").await;
}

#[tokio::test]
async fn test_spectator_and_post_game_departures_do_not_reset() {
    let registry = common::registry();
    let a = registry.join("quiet").await;
    let b = registry.join("quiet").await;
    let spectator = registry.join("quiet").await;

    play(&a, "e2", "e4").await;
    assert!(!registry.leave(spectator).await);
    assert_eq!(a.context.summary().await.turn, 1);

    assert!(a.context.resign(a.participant).await);
    assert!(!registry.leave(b).await);
    assert_eq!(a.context.outcome().await, MatchOutcome::WhiteResigned);
}

#[tokio::test]
async fn test_late_joiner_sees_current_state() {
    let registry = common::registry();
    let a = registry.join("late").await;
    let b = registry.join("late").await;
    play(&a, "e2", "e4").await;
    play(&b, "c7", "c5").await;

    let late = registry.join("late").await;
    assert_eq!(late.welcome.side, None);
    assert_eq!(late.welcome.turn, 2);
    assert_eq!(late.welcome.side_to_move, Side::White);
    assert_eq!(late.welcome.outcome, MatchOutcome::None);
    assert_eq!(late.welcome.snapshot.as_str(), a.context.summary().await.fen);

    let mut replica = Replica::new();
    replica.apply(&late.welcome.to_message()).unwrap();
    assert!(replica.board().piece_at(sq("c5")).is_some());
    assert!(replica.board().piece_at(sq("c7")).is_none());
    assert!(!replica.can_interact(Side::White));
}

#[tokio::test]
async fn test_late_joiner_sees_finished_match() {
    let registry = common::registry();
    let a = registry.join("finished").await;
    let _b = registry.join("finished").await;
    assert!(a.context.resign(a.participant).await);

    let late = registry.join("finished").await;
    assert_eq!(late.welcome.outcome, MatchOutcome::WhiteResigned);

    let mut replica = Replica::new();
    replica.apply(&late.welcome.to_message()).unwrap();
    assert_eq!(replica.outcome(), MatchOutcome::WhiteResigned);
    assert_eq!(replica.message(), "White resigned. Black wins!");
    assert!(!replica.can_interact(Side::White));
}

#[tokio::test]
async fn test_save_and_load_position() {
    let registry = common::registry();
    let a = registry.join("saved").await;
    let b = registry.join("saved").await;

    let err = a.context.load_position().await.unwrap_err();
    assert!(matches!(err, MatchError::NoSavedPosition));

    play(&a, "e2", "e4").await;
    let saved = a.context.save_position().await.unwrap();
    assert_eq!(saved.turn, 1);
    play(&b, "e7", "e5").await;

    let summary = a.context.load_position().await.unwrap();
    assert_eq!(summary.turn, 1);
    assert_eq!(summary.fen, saved.fen);
    assert_eq!(summary.generation, 1);
    assert_eq!(summary.side_to_move, Side::Black);

    // Black to move again from the restored position
    play(&b, "e7", "e5").await;
}

#[tokio::test]
async fn test_snapshot_waits_for_settle_delay() {
    let registry = common::registry_with(Config {
        settle_delay: Duration::from_millis(200),
        ..common::test_config()
    });
    let a = registry.join("settle").await;
    let mut b = registry.join("settle").await;

    play(&a, "e2", "e4").await;
    assert!(!b.snapshots.has_changed().unwrap());
    assert_eq!(a.context.pending_publications().await, 1);

    tokio::time::timeout(Duration::from_secs(2), b.snapshots.changed())
        .await
        .unwrap()
        .unwrap();
    let published = b.snapshots.borrow_and_update().clone();
    assert_eq!(published.turn, 1);
    assert_eq!(published.generation, 0);
}

#[tokio::test]
async fn test_reset_cancels_scheduled_publication() {
    let registry = common::registry_with(Config {
        settle_delay: Duration::from_millis(200),
        ..common::test_config()
    });
    let a = registry.join("cancel").await;
    let _b = registry.join("cancel").await;
    let mut spectator = registry.join("cancel").await;

    play(&a, "e2", "e4").await;
    registry.leave(a).await;

    let published = spectator.snapshots.borrow_and_update().clone();
    assert_eq!(published.generation, 1);
    assert_eq!(published.snapshot, BoardSnapshot::initial());

    // The pre-reset move never gets published
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!spectator.snapshots.has_changed().unwrap());
    assert_eq!(spectator.context.pending_publications().await, 0);
}

#[tokio::test]
async fn test_post_game_departure_still_publishes_final_position() {
    let registry = common::registry_with(Config {
        settle_delay: Duration::from_millis(200),
        ..common::test_config()
    });
    let mut a = registry.join("final").await;
    let b = registry.join("final").await;

    play(&a, "f2", "f3").await;
    play(&b, "e7", "e5").await;
    play(&a, "g2", "g4").await;
    let applied = b.context.submit_move(b.participant, "d8", "h4").await.unwrap();
    assert!(applied.caused_checkmate);

    // Black leaves before its mating move has settled
    assert!(!registry.leave(b).await);

    assert!(a.snapshots.has_changed().unwrap());
    let published = a.snapshots.borrow_and_update().clone();
    assert_eq!(published.turn, 4);
    assert_eq!(published.generation, 0);
    assert_eq!(published.snapshot, applied.snapshot);
    assert_eq!(a.context.outcome().await, MatchOutcome::BlackWinsByCheckmate);
}

/// Memory store whose writes take a while, like a slow disk.
struct SlowStore {
    inner: MemoryPositionStore,
    delay: Duration,
}

impl PositionStore for SlowStore {
    fn save(&self, match_id: &str, position: SavedPosition) -> Result<(), StoreError> {
        std::thread::sleep(self.delay);
        self.inner.save(match_id, position)
    }

    fn load(&self, match_id: &str) -> Result<Option<SavedPosition>, StoreError> {
        self.inner.load(match_id)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_save_does_not_block_moves() {
    let store = Arc::new(SlowStore {
        inner: MemoryPositionStore::new(),
        delay: Duration::from_millis(300),
    });
    let registry = common::registry_with_store(common::test_config(), store);
    let a = registry.join("slow-save").await;
    let b = registry.join("slow-save").await;

    play(&a, "e2", "e4").await;
    let context = a.context.clone();
    let save = tokio::spawn(async move { context.save_position().await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let started = Instant::now();
    tokio::time::timeout(Duration::from_millis(150), play(&b, "e7", "e5"))
        .await
        .expect("move stalled behind the save");
    assert!(started.elapsed() < Duration::from_millis(150));

    let saved = save.await.unwrap().unwrap();
    assert_eq!(saved.turn, 1);
    assert_eq!(a.context.summary().await.turn, 2);
}

#[tokio::test]
async fn test_load_rejects_out_of_range_turn() {
    let store = Arc::new(MemoryPositionStore::new());
    store
        .save(
            "overflow",
            SavedPosition {
                fen: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string(),
                turn: u32::MAX,
                saved_at: chrono::Utc::now(),
            },
        )
        .unwrap();
    let registry = common::registry_with_store(common::test_config(), store);
    let a = registry.join("overflow").await;

    let err = a.context.load_position().await.unwrap_err();
    assert!(matches!(err, MatchError::CorruptSavedPosition(_)));
    // Nothing was restored
    let summary = a.context.summary().await;
    assert_eq!(summary.turn, 0);
    assert_eq!(summary.generation, 0);
}
