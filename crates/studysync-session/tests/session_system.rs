//! Integration tests for the session system: registry, actors, ticks and
//! broadcasts working together.
//!
//! Tokio time is paused, so the tick scheduler fires whenever the test is
//! idle. The session's notion of "now" comes from a [`ManualClock`] that
//! the test moves by hand before letting a tick happen.

use std::sync::Arc;
use std::time::Duration;

use studysync_protocol::{
    ParticipantStatus, ServerMessage, SessionStatus, TimerUpdate, UserId,
};
use studysync_session::{
    SessionConfig, SessionError, SessionHandle, SessionRegistry, TimerCommand,
    disconnect_everywhere,
};
use studysync_roster::RosterError;
use studysync_tick::ManualClock;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const LEADER: UserId = UserId(1);

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn registry() -> (SessionRegistry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let registry = SessionRegistry::with_clock(SessionConfig::default(), clock.clone());
    (registry, clock)
}

/// Creates a session led by `LEADER` and consumes its `session-created`.
async fn create(registry: &mut SessionRegistry, duration: u64) -> (SessionHandle, Inbox) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let created = registry
        .create("Algorithms", duration, "Lena", LEADER, tx)
        .expect("should create");
    match rx.recv().await {
        Some(ServerMessage::SessionCreated { session_id, .. }) => {
            assert_eq!(session_id, created.code);
        }
        other => panic!("expected session-created, got {other:?}"),
    }
    (created.handle, rx)
}

async fn join(handle: &SessionHandle, user: UserId, name: &str) -> Inbox {
    let (tx, rx) = mpsc::unbounded_channel();
    handle.join(user, name, tx).await.expect("should join");
    rx
}

fn drain(rx: &mut Inbox) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Waits for the next timer update, skipping anything else.
async fn next_timer(rx: &mut Inbox) -> TimerUpdate {
    loop {
        match rx.recv().await.expect("subscriber channel open") {
            ServerMessage::TimerUpdate(update) => return update,
            _ => continue,
        }
    }
}

/// Moves the session clock to `ms` and waits for the tick that follows.
async fn tick_at(clock: &ManualClock, rx: &mut Inbox, ms: u64) -> TimerUpdate {
    clock.set(ms);
    next_timer(rx).await
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_registers_session_under_generated_code() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 1500).await;

    assert_eq!(registry.len(), 1);
    let code = handle.code().as_str().to_owned();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let found = registry.get(&code.to_lowercase()).expect("case-insensitive lookup");
    assert_eq!(found.code(), handle.code());
}

#[tokio::test(start_paused = true)]
async fn test_create_rejects_invalid_input_without_registering() {
    let (mut registry, _clock) = registry();
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = registry
        .create("Algorithms", 0, "Lena", LEADER, tx.clone())
        .unwrap_err();
    assert_eq!(err, SessionError::InvalidDuration);
    let err = registry.create("  ", 60, "Lena", LEADER, tx).unwrap_err();
    assert_eq!(err, SessionError::InvalidSessionName);
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_created_snapshot_marks_leader() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 900).await;

    let snap = handle.snapshot(LEADER).await.unwrap();
    assert!(snap.is_leader);
    assert_eq!(snap.status, SessionStatus::Waiting);
    assert_eq!(snap.remaining_time, 900);
    assert_eq!(snap.participants.len(), 1);
    assert_eq!(snap.participants[0].name, "Lena");
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_joiner_gets_session_joined_then_timer_update() {
    let (mut registry, _clock) = registry();
    let (handle, mut leader_rx) = create(&mut registry, 600).await;

    let mut rx = join(&handle, UserId(2), "Alice").await;
    let msgs = drain(&mut rx);

    assert!(matches!(
        &msgs[0],
        ServerMessage::SessionJoined { user_id: UserId(2), session, .. } if !session.is_leader
    ));
    assert_eq!(
        msgs[1],
        ServerMessage::TimerUpdate(TimerUpdate {
            remaining_time: 600,
            status: SessionStatus::Waiting,
        })
    );

    // Everyone, joiner included, sees the new board.
    assert!(matches!(&msgs[2], ServerMessage::LeaderboardUpdate(board) if board.len() == 2));
    let leader_msgs = drain(&mut leader_rx);
    assert!(matches!(
        leader_msgs.as_slice(),
        [ServerMessage::LeaderboardUpdate(board)] if board.len() == 2
    ));
}

#[tokio::test(start_paused = true)]
async fn test_case_insensitive_code_and_name_resolve_to_same_record() {
    let (mut registry, _clock) = registry();
    let (handle, _leader_rx) = create(&mut registry, 600).await;
    let code = handle.code().as_str().to_owned();

    let first = registry.get(&code.to_lowercase()).unwrap();
    let (tx, _rx1) = mpsc::unbounded_channel();
    first.join(UserId(2), "Alice", tx).await.unwrap();

    let second = registry.get(&format!("  {code} ")).unwrap();
    let (tx, _rx2) = mpsc::unbounded_channel();
    let snap = second.join(UserId(3), " alice ", tx).await.unwrap();

    let alices: Vec<_> = snap
        .participants
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case("alice"))
        .collect();
    assert_eq!(alices.len(), 1);
    assert_eq!(alices[0].name, "Alice");
    assert_eq!(alices[0].user_id, UserId(3));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_join_is_not_broadcast() {
    let (mut registry, _clock) = registry();
    let (handle, mut leader_rx) = create(&mut registry, 600).await;
    let _alice_rx = join(&handle, UserId(2), "Alice").await;
    drain(&mut leader_rx);

    let (tx, _rx) = mpsc::unbounded_channel();
    let snap = handle.join(UserId(2), "Alice", tx).await.unwrap();

    assert_eq!(snap.participants.len(), 2);
    assert!(drain(&mut leader_rx).is_empty(), "no leaderboard re-broadcast");
}

#[tokio::test(start_paused = true)]
async fn test_join_blank_name_is_rejected() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 600).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = handle.join(UserId(2), "   ", tx).await.unwrap_err();
    assert_eq!(err, SessionError::Roster(RosterError::InvalidName));
    assert_eq!(err.to_string(), "Invalid participant name");
}

#[tokio::test(start_paused = true)]
async fn test_join_ended_session_is_rejected() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 600).await;
    handle.control(LEADER, TimerCommand::End).await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = handle.join(UserId(2), "Late", tx).await.unwrap_err();
    assert_eq!(err, SessionError::Ended);
    assert_eq!(err.to_string(), "Session has ended");
}

// =========================================================================
// Timer control
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_broadcasts_and_ticks_count_down() {
    let (mut registry, clock) = registry();
    let (handle, mut leader_rx) = create(&mut registry, 100).await;

    let update = handle.control(LEADER, TimerCommand::Start).await.unwrap();
    assert_eq!(
        update,
        TimerUpdate {
            remaining_time: 100,
            status: SessionStatus::Active,
        }
    );
    let msgs = drain(&mut leader_rx);
    assert_eq!(msgs.len(), 2);
    assert!(matches!(msgs[0], ServerMessage::TimerUpdate(_)));
    assert!(matches!(
        &msgs[1],
        ServerMessage::LeaderboardUpdate(board) if board[0].time_spent == 1
    ));

    assert_eq!(tick_at(&clock, &mut leader_rx, 1_000).await.remaining_time, 99);
    assert_eq!(tick_at(&clock, &mut leader_rx, 2_000).await.remaining_time, 98);

    // One second for the start itself, one per tick after it.
    let board = handle.leaderboard().await.unwrap();
    assert_eq!(board[0].time_spent, 3);
}

#[tokio::test(start_paused = true)]
async fn test_resume_recomputes_and_credits_immediately() {
    let (mut registry, clock) = registry();
    let (handle, mut rx) = create(&mut registry, 100).await;

    handle.control(LEADER, TimerCommand::Start).await.unwrap();
    clock.set(10_000);
    handle.control(LEADER, TimerCommand::Pause).await.unwrap();
    drain(&mut rx);

    clock.set(25_000);
    let resumed = handle.control(LEADER, TimerCommand::Start).await.unwrap();
    // Paused at 100 (no tick ran), 10s of running time so far.
    assert_eq!(
        resumed,
        TimerUpdate {
            remaining_time: 90,
            status: SessionStatus::Active,
        }
    );
    assert_eq!(handle.leaderboard().await.unwrap()[0].time_spent, 2);
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_ticks_and_resume_accounts_for_pause() {
    let (mut registry, clock) = registry();
    let (handle, mut rx) = create(&mut registry, 100).await;

    handle.control(LEADER, TimerCommand::Start).await.unwrap();
    drain(&mut rx);
    assert_eq!(tick_at(&clock, &mut rx, 10_000).await.remaining_time, 90);

    clock.set(10_000);
    let paused = handle.control(LEADER, TimerCommand::Pause).await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);
    assert_eq!(paused.remaining_time, 90);
    drain(&mut rx);

    // Nothing ticks while paused.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(drain(&mut rx).is_empty());

    clock.set(40_000);
    handle.control(LEADER, TimerCommand::Start).await.unwrap();
    drain(&mut rx);

    // 50s wall time minus 30s paused = 20s elapsed.
    assert_eq!(tick_at(&clock, &mut rx, 50_000).await.remaining_time, 80);
}

#[tokio::test(start_paused = true)]
async fn test_pause_when_not_active_is_rejected() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 100).await;

    let err = handle.control(LEADER, TimerCommand::Pause).await.unwrap_err();
    assert_eq!(err, SessionError::NotActive);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_reaching_zero_ends_session() {
    let (mut registry, clock) = registry();
    let (handle, mut rx) = create(&mut registry, 2).await;
    let mut alice_rx = join(&handle, UserId(2), "Alice").await;

    handle.control(LEADER, TimerCommand::Start).await.unwrap();
    drain(&mut rx);
    drain(&mut alice_rx);

    tick_at(&clock, &mut rx, 1_000).await;
    let last = tick_at(&clock, &mut rx, 2_000).await;
    assert_eq!(
        last,
        TimerUpdate {
            remaining_time: 0,
            status: SessionStatus::Ended,
        }
    );

    // Every subscriber saw the final, empty board.
    let alice_msgs = drain(&mut alice_rx);
    assert!(matches!(
        alice_msgs.last(),
        Some(ServerMessage::LeaderboardUpdate(board)) if board.is_empty()
    ));

    // The scheduler stopped with the session.
    drain(&mut rx);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(handle.snapshot(LEADER).await.unwrap().status, SessionStatus::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_non_leader_control_is_unauthorized_and_changes_nothing() {
    let (mut registry, _clock) = registry();
    let (handle, mut leader_rx) = create(&mut registry, 100).await;
    let _alice_rx = join(&handle, UserId(2), "Alice").await;
    drain(&mut leader_rx);
    let before = handle.snapshot(LEADER).await.unwrap();

    for cmd in [
        TimerCommand::Start,
        TimerCommand::Pause,
        TimerCommand::Reset,
        TimerCommand::End,
    ] {
        let err = handle.control(UserId(2), cmd).await.unwrap_err();
        assert_eq!(err, SessionError::Unauthorized);
    }

    assert_eq!(handle.snapshot(LEADER).await.unwrap(), before);
    assert!(drain(&mut leader_rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_to_waiting_with_full_time() {
    let (mut registry, clock) = registry();
    let (handle, mut rx) = create(&mut registry, 100).await;

    handle.control(LEADER, TimerCommand::Start).await.unwrap();
    drain(&mut rx);
    tick_at(&clock, &mut rx, 5_000).await;
    drain(&mut rx);

    let update = handle.control(LEADER, TimerCommand::Reset).await.unwrap();
    assert_eq!(
        update,
        TimerUpdate {
            remaining_time: 100,
            status: SessionStatus::Waiting,
        }
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    let msgs = drain(&mut rx);
    // reset's own timer + leaderboard, then silence
    assert_eq!(msgs.len(), 2);
}

// =========================================================================
// Disconnect and reconnect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_preserves_time_and_join_time() {
    let (mut registry, clock) = registry();
    clock.set(500);
    let (handle, mut rx) = create(&mut registry, 100).await;
    let _alice_rx = join(&handle, UserId(2), "Alice").await;
    let joined_at = handle.leaderboard().await.unwrap()[1].joined_at;
    assert_eq!(joined_at, 500);

    clock.set(1_000);
    handle.control(LEADER, TimerCommand::Start).await.unwrap();
    drain(&mut rx);
    for ms in [2_000, 3_000, 4_000] {
        tick_at(&clock, &mut rx, ms).await;
    }
    handle.control(LEADER, TimerCommand::Pause).await.unwrap();

    assert_eq!(disconnect_everywhere(&registry.handles(), UserId(2)).await, 1);
    let board = handle.leaderboard().await.unwrap();
    assert!(board.iter().all(|e| e.name != "Alice"), "left participants drop off");

    let (tx, _rx) = mpsc::unbounded_channel();
    let snap = handle.join(UserId(7), "ALICE", tx).await.unwrap();
    let alice = snap
        .participants
        .iter()
        .find(|e| e.name == "Alice")
        .expect("alice is back");
    assert_eq!(alice.user_id, UserId(7));
    assert_eq!(alice.time_spent, 4);
    assert_eq!(alice.joined_at, 500);
    assert_eq!(alice.status, ParticipantStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_everywhere_touches_every_session() {
    let (mut registry, _clock) = registry();
    let (first, _rx1) = create(&mut registry, 100).await;
    let (second, _rx2) = create(&mut registry, 100).await;
    let _a = join(&first, UserId(5), "Sam").await;
    let _b = join(&second, UserId(5), "Sam").await;

    assert_eq!(disconnect_everywhere(&registry.handles(), UserId(5)).await, 2);
    // Second disconnect finds nobody active.
    assert_eq!(disconnect_everywhere(&registry.handles(), UserId(5)).await, 0);
    // Unknown users are a silent no-op.
    assert_eq!(disconnect_everywhere(&registry.handles(), UserId(99)).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_leader_reconnect_regains_control() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 100).await;

    handle.disconnect(LEADER).await.unwrap();
    let (tx, _new_rx) = mpsc::unbounded_channel();
    let snap = handle.join(UserId(40), "lena", tx).await.unwrap();
    assert!(snap.is_leader);

    assert_eq!(
        handle.control(LEADER, TimerCommand::Start).await.unwrap_err(),
        SessionError::Unauthorized
    );
    handle.control(UserId(40), TimerCommand::Start).await.unwrap();
}

// =========================================================================
// Status updates and mutation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_update_status_broadcasts_leaderboard() {
    let (mut registry, _clock) = registry();
    let (handle, mut leader_rx) = create(&mut registry, 100).await;
    let _alice_rx = join(&handle, UserId(2), "Alice").await;
    drain(&mut leader_rx);

    handle
        .update_status(UserId(2), ParticipantStatus::Left)
        .await
        .unwrap();
    let msgs = drain(&mut leader_rx);
    assert!(matches!(
        msgs.as_slice(),
        [ServerMessage::LeaderboardUpdate(board)] if board.len() == 1
    ));
}

#[tokio::test(start_paused = true)]
async fn test_update_status_unknown_user_is_silent() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 100).await;

    let err = handle
        .update_status(UserId(77), ParticipantStatus::Active)
        .await
        .unwrap_err();
    assert!(err.is_silent());
}

#[tokio::test(start_paused = true)]
async fn test_mutate_applies_and_rebroadcasts() {
    let (mut registry, _clock) = registry();
    let (handle, mut rx) = create(&mut registry, 100).await;

    handle
        .mutate(|session| {
            session.roster_mut().credit_active(42);
        })
        .await
        .unwrap();

    let msgs = drain(&mut rx);
    assert!(matches!(msgs[0], ServerMessage::TimerUpdate(_)));
    assert!(matches!(
        &msgs[1],
        ServerMessage::LeaderboardUpdate(board) if board[0].time_spent == 42
    ));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_makes_session_unavailable() {
    let (mut registry, _clock) = registry();
    let (handle, _rx) = create(&mut registry, 100).await;

    handle.shutdown().await.unwrap();
    let err = handle.snapshot(LEADER).await.unwrap_err();
    assert!(matches!(err, SessionError::Unavailable(_)));
    assert!(handle.is_closed());
}
