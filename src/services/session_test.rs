use super::*;
use crate::protocol::PALETTE;
use crate::state::test_helpers::{origin, test_outbox};

// =============================================================================
// create / lookup
// =============================================================================

#[tokio::test]
async fn create_session_ids_are_sequential_from_one() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    assert_eq!(registry.create_session("a".into(), &tx, origin()).await, 1);
    assert_eq!(registry.create_session("b".into(), &tx, origin()).await, 2);
    assert_eq!(registry.create_session("c".into(), &tx, origin()).await, 3);
    assert_eq!(registry.count().await, 3);
}

#[tokio::test]
async fn session_ids_are_never_reused() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let first = registry.create_session("a".into(), &tx, origin()).await;
    assert_eq!(registry.remove_member(first, "a").await, Some(Departure::Destroyed));
    assert_eq!(registry.create_session("b".into(), &tx, origin()).await, first + 1);
}

#[tokio::test]
async fn created_session_holds_host_with_first_color() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let position = Position::new(0.0, 1.0, 0.0);
    let game_id = registry.create_session("host".into(), &tx, position).await;

    let shared = registry.lookup(game_id).await.unwrap();
    let session = shared.lock().await;
    assert_eq!(session.id, game_id);
    assert_eq!(session.host_id, "host");
    assert_eq!(session.member("host").unwrap().color, PALETTE[0]);
    assert_eq!(session.position("host"), Some(position));
    assert!(!session.started());
}

#[tokio::test]
async fn create_session_with_runs_before_publication() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let (game_id, len) = registry
        .create_session_with("host".into(), &tx, origin(), |session| session.len())
        .await;
    assert_eq!(game_id, 1);
    assert_eq!(len, 1);
}

#[tokio::test]
async fn lookup_unknown_session_is_not_found() {
    let registry = SessionRegistry::new();
    assert!(matches!(registry.lookup(99).await, Err(SessionError::NotFound(99))));
}

// =============================================================================
// join
// =============================================================================

#[tokio::test]
async fn join_returns_color_and_other_members() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry
        .create_session("host".into(), &tx, Position::new(0.0, 1.0, 0.0))
        .await;

    let joined = registry
        .join(game_id, "guest".into(), &tx, Position::new(1.0, 1.0, 1.0))
        .await
        .unwrap();
    assert_eq!(joined.color, PALETTE[1]);
    assert_eq!(joined.players.len(), 1);
    assert_eq!(joined.players[0].id, "host");
    assert_eq!(joined.players[0].position, Position::new(0.0, 1.0, 0.0));
    assert!(joined.players[0].is_host);
}

#[tokio::test]
async fn join_unknown_session_changes_nothing() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let err = registry
        .join(5, "guest".into(), &tx, origin())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(5)));
    assert_eq!(err.error_code(), "E_SESSION_NOT_FOUND");
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn join_twice_is_rejected_without_consuming_a_color() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;
    registry
        .join(game_id, "guest".into(), &tx, origin())
        .await
        .unwrap();

    let err = registry
        .join(game_id, "guest".into(), &tx, origin())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AlreadyMember(id) if id == game_id));

    let next = registry
        .with_session(game_id, |session| session.next_color_index())
        .await;
    assert_eq!(next, Some(2));
}

#[tokio::test]
async fn join_colors_advance_regardless_of_departures() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;

    let a = registry.join(game_id, "a".into(), &tx, origin()).await.unwrap();
    registry.remove_member(game_id, "a").await;
    let b = registry.join(game_id, "b".into(), &tx, origin()).await.unwrap();

    assert_eq!(a.color, PALETTE[1]);
    assert_eq!(b.color, PALETTE[2]);
}

#[tokio::test]
async fn join_with_sees_the_new_member() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;

    let (_, members) = registry
        .join_with(game_id, "guest".into(), &tx, origin(), |session, _| session.len())
        .await
        .unwrap();
    assert_eq!(members, 2);
}

// =============================================================================
// remove
// =============================================================================

#[tokio::test]
async fn removing_last_member_destroys_session() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;

    assert_eq!(registry.remove_member(game_id, "host").await, Some(Departure::Destroyed));
    assert!(registry.lookup(game_id).await.is_err());
    assert!(
        registry
            .join(game_id, "late".into(), &tx, origin())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn removing_non_last_member_keeps_session() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;
    registry.join(game_id, "guest".into(), &tx, origin()).await.unwrap();

    let departure = registry
        .remove_member_with(game_id, "host", |session| session.len())
        .await;
    assert_eq!(departure, Some(Departure::Remaining(1)));

    let shared = registry.lookup(game_id).await.unwrap();
    let session = shared.lock().await;
    assert!(!session.contains("host"));
    assert_eq!(session.position("host"), None);
    assert_eq!(session.host_id, "host");
}

#[tokio::test]
async fn removing_unknown_member_or_session_is_none() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;

    assert_eq!(registry.remove_member(game_id, "ghost").await, None);
    assert_eq!(registry.remove_member(42, "host").await, None);
    assert_eq!(registry.count().await, 1);
}

#[tokio::test]
async fn with_session_on_missing_session_is_none() {
    let registry = SessionRegistry::new();
    assert_eq!(registry.with_session(1, |session| session.len()).await, None);
}

#[tokio::test]
async fn concurrent_joins_each_get_a_distinct_color_index() {
    let registry = SessionRegistry::new();
    let (tx, _rx) = test_outbox();
    let game_id = registry.create_session("host".into(), &tx, origin()).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            registry
                .join(game_id, format!("p{i}"), &tx, origin())
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let (len, next) = registry
        .with_session(game_id, |session| (session.len(), session.next_color_index()))
        .await
        .unwrap();
    assert_eq!(len, 17);
    assert_eq!(next, 17);
}
