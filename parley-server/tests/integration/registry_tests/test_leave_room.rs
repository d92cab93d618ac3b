use parley_core::{MemberId, RoomId};

use crate::integration::{create_test_registry, init_tracing};
use crate::utils::TestMember;

#[tokio::test]
async fn test_leave_notifies_remaining_members() {
    init_tracing();

    let registry = create_test_registry();
    let room = RoomId::from("lobby");
    let mut members: Vec<TestMember> = ["alice", "bob", "carol"]
        .into_iter()
        .map(TestMember::new)
        .collect();

    for member in &members {
        registry
            .join(room.clone(), member.id.clone(), member.outbox.clone())
            .await
            .unwrap();
    }
    for member in &mut members {
        member.drain();
    }

    registry.leave(&members[1].id).await.unwrap();

    let bob = members[1].id.clone();
    assert_eq!(members[0].expect_peer_left().await.unwrap(), bob);
    assert_eq!(members[2].expect_peer_left().await.unwrap(), bob);
    members[1].assert_idle();

    assert_eq!(registry.room_of(&bob), None);
    assert_eq!(
        registry.members_of(&room).await,
        vec![members[0].id.clone(), members[2].id.clone()]
    );
}

#[tokio::test]
async fn test_empty_room_is_reclaimed() {
    init_tracing();

    let registry = create_test_registry();
    let room = RoomId::from("lobby");
    let alice = TestMember::new("alice");
    let bob = TestMember::new("bob");

    for member in [&alice, &bob] {
        registry
            .join(room.clone(), member.id.clone(), member.outbox.clone())
            .await
            .unwrap();
    }
    assert_eq!(registry.room_count(), 1);

    registry.leave(&alice.id).await.unwrap();
    assert_eq!(registry.room_count(), 1);

    registry.leave(&bob.id).await.unwrap();
    assert_eq!(registry.room_count(), 0);
    assert!(registry.members_of(&room).await.is_empty());
}

#[tokio::test]
async fn test_room_is_recreated_after_retiring() {
    init_tracing();

    let registry = create_test_registry();
    let room = RoomId::from("lobby");
    let alice = TestMember::new("alice");
    let mut bob = TestMember::new("bob");

    registry
        .join(room.clone(), alice.id.clone(), alice.outbox.clone())
        .await
        .unwrap();
    registry.leave(&alice.id).await.unwrap();
    assert_eq!(registry.room_count(), 0);

    let peers = registry
        .join(room.clone(), bob.id.clone(), bob.outbox.clone())
        .await
        .unwrap();
    assert!(peers.is_empty());
    assert!(bob.expect_joined(&room).await.unwrap().is_empty());
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test]
async fn test_leave_without_membership_is_noop() {
    let registry = create_test_registry();

    registry
        .leave(&MemberId::from("ghost"))
        .await
        .expect("leaving without a room should succeed");
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_member_can_switch_rooms_after_leaving() {
    init_tracing();

    let registry = create_test_registry();
    let mut alice = TestMember::new("alice");

    registry
        .join(RoomId::from("r1"), alice.id.clone(), alice.outbox.clone())
        .await
        .unwrap();
    registry.leave(&alice.id).await.unwrap();
    registry
        .join(RoomId::from("r2"), alice.id.clone(), alice.outbox.clone())
        .await
        .expect("join after leave should succeed");

    alice.expect_joined(&RoomId::from("r1")).await.unwrap();
    alice.expect_joined(&RoomId::from("r2")).await.unwrap();
    assert_eq!(registry.room_of(&alice.id), Some(RoomId::from("r2")));
}
