use super::*;
use crate::protocol::{PALETTE, Position};
use crate::state::test_helpers::{assert_no_message, drain, origin, recv_message, test_outbox};

fn moved(player_id: &str) -> ServerMessage {
    ServerMessage::PlayerMoved { player_id: player_id.into(), position: Position::new(1.0, 2.0, 3.0) }
}

#[tokio::test]
async fn broadcast_except_skips_sender() {
    let (host_tx, mut host_rx) = test_outbox();
    let (guest_tx, mut guest_rx) = test_outbox();
    let mut session = Session::new(1, "host".into(), &host_tx, origin());
    session.add_member("guest".into(), &guest_tx, origin());

    assert_eq!(broadcast_except(&session, "host", &moved("host")), 1);
    assert_eq!(recv_message(&mut guest_rx).await, moved("host"));
    assert_no_message(&mut host_rx);
}

#[tokio::test]
async fn broadcast_all_includes_sender() {
    let (host_tx, mut host_rx) = test_outbox();
    let (guest_tx, mut guest_rx) = test_outbox();
    let mut session = Session::new(1, "host".into(), &host_tx, origin());
    session.add_member("guest".into(), &guest_tx, origin());

    assert_eq!(broadcast_all(&session, &ServerMessage::GameStarted), 2);
    assert_eq!(recv_message(&mut host_rx).await, ServerMessage::GameStarted);
    assert_eq!(recv_message(&mut guest_rx).await, ServerMessage::GameStarted);
}

#[tokio::test]
async fn send_to_non_member_is_false() {
    let (host_tx, mut host_rx) = test_outbox();
    let session = Session::new(1, "host".into(), &host_tx, origin());
    assert!(!send_to(&session, "ghost", &ServerMessage::GameStarted));
    assert_no_message(&mut host_rx);
}

#[tokio::test]
async fn dead_recipient_does_not_block_others() {
    let (host_tx, mut host_rx) = test_outbox();
    let (gone_tx, gone_rx) = test_outbox();
    let (guest_tx, mut guest_rx) = test_outbox();
    let mut session = Session::new(1, "host".into(), &host_tx, origin());
    session.add_member("gone".into(), &gone_tx, origin());
    session.add_member("guest".into(), &guest_tx, origin());
    drop(gone_tx);
    drop(gone_rx);

    assert_eq!(broadcast_all(&session, &ServerMessage::GameStarted), 2);
    assert_eq!(recv_message(&mut host_rx).await, ServerMessage::GameStarted);
    assert_eq!(recv_message(&mut guest_rx).await, ServerMessage::GameStarted);
}

#[tokio::test]
async fn backlogged_recipient_keeps_every_message() {
    let (host_tx, mut host_rx) = test_outbox();
    let (slow_tx, mut slow_rx) = test_outbox();
    let mut session = Session::new(1, "host".into(), &host_tx, origin());
    session.add_member("slow".into(), &slow_tx, origin());

    for _ in 0..5000 {
        assert_eq!(broadcast_except(&session, "host", &moved("host")), 1);
    }
    assert_eq!(broadcast_game_state(&session), 2);

    let backlog = drain(&mut slow_rx);
    assert_eq!(backlog.len(), 5001);
    assert!(matches!(backlog.last(), Some(Outbound::Message(ServerMessage::GameState { .. }))));
    assert!(matches!(recv_message(&mut host_rx).await, ServerMessage::GameState { .. }));
}

#[tokio::test]
async fn game_state_snapshot_reflects_membership_and_started() {
    let (host_tx, _host_rx) = test_outbox();
    let mut session = Session::new(1, "host".into(), &host_tx, Position::new(0.0, 1.0, 0.0));
    session.add_member("guest".into(), &host_tx, Position::new(1.0, 1.0, 1.0));
    session.start("host");

    let ServerMessage::GameState { game_started, mut players } = game_state(&session) else {
        panic!("expected gameState");
    };
    players.sort_by(|a, b| a.id.cmp(&b.id));
    assert!(game_started);
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].id, "guest");
    assert_eq!(players[0].color, PALETTE[1]);
    assert_eq!(players[1].id, "host");
    assert_eq!(players[1].health, 100);
    assert!(players[1].is_alive);
}

#[tokio::test]
async fn broadcast_game_state_reaches_everyone() {
    let (host_tx, mut host_rx) = test_outbox();
    let (guest_tx, mut guest_rx) = test_outbox();
    let mut session = Session::new(1, "host".into(), &host_tx, origin());
    session.add_member("guest".into(), &guest_tx, origin());

    assert_eq!(broadcast_game_state(&session), 2);
    assert!(matches!(recv_message(&mut host_rx).await, ServerMessage::GameState { .. }));
    assert!(matches!(recv_message(&mut guest_rx).await, ServerMessage::GameState { .. }));
}
