use parley_core::{MemberId, RoomId, SignalMessage};
use parley_server::SignalingError;

use crate::integration::{create_test_router, init_tracing};
use crate::utils::TestMember;

fn offer_to(target: &MemberId) -> SignalMessage {
    SignalMessage::Offer {
        source: None,
        target: target.clone(),
        sdp: "v=0".to_owned(),
    }
}

#[tokio::test]
async fn test_target_not_joined_yet() {
    init_tracing();

    let (registry, router) = create_test_router();
    let room = RoomId::from("lobby");
    let alice = TestMember::new("alice");
    let mut bob = TestMember::new("bob");

    registry
        .join(room.clone(), alice.id.clone(), alice.outbox.clone())
        .await
        .unwrap();

    let err = router.route(&alice.id, offer_to(&bob.id)).await.unwrap_err();
    assert_eq!(
        err,
        SignalingError::TargetNotInRoom {
            target: bob.id.clone(),
            room,
        }
    );
    bob.assert_idle();
}

#[tokio::test]
async fn test_target_already_left() {
    init_tracing();

    let (registry, router) = create_test_router();
    let room = RoomId::from("lobby");
    let alice = TestMember::new("alice");
    let mut bob = TestMember::new("bob");

    for member in [&alice, &bob] {
        registry
            .join(room.clone(), member.id.clone(), member.outbox.clone())
            .await
            .unwrap();
    }
    registry.leave(&bob.id).await.unwrap();
    bob.drain();

    let err = router.route(&alice.id, offer_to(&bob.id)).await.unwrap_err();
    assert!(matches!(err, SignalingError::TargetNotInRoom { .. }));
    bob.assert_idle();
}

#[tokio::test]
async fn test_source_without_room_is_unknown() {
    init_tracing();

    let (registry, router) = create_test_router();
    let alice = TestMember::new("alice");
    let stranger = MemberId::from("stranger");

    registry
        .join(RoomId::from("lobby"), alice.id.clone(), alice.outbox.clone())
        .await
        .unwrap();

    let err = router.route(&stranger, offer_to(&alice.id)).await.unwrap_err();
    assert_eq!(err, SignalingError::UnknownSource(stranger));
}

#[tokio::test]
async fn test_source_after_leaving_is_unknown() {
    init_tracing();

    let (registry, router) = create_test_router();
    let room = RoomId::from("lobby");
    let alice = TestMember::new("alice");
    let bob = TestMember::new("bob");

    for member in [&alice, &bob] {
        registry
            .join(room.clone(), member.id.clone(), member.outbox.clone())
            .await
            .unwrap();
    }
    registry.leave(&alice.id).await.unwrap();

    let err = router.route(&alice.id, offer_to(&bob.id)).await.unwrap_err();
    assert_eq!(err, SignalingError::UnknownSource(alice.id.clone()));
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    init_tracing();

    let (registry, router) = create_test_router();
    let alice = TestMember::new("alice");
    let mut carol = TestMember::new("carol");

    registry
        .join(RoomId::from("r1"), alice.id.clone(), alice.outbox.clone())
        .await
        .unwrap();
    registry
        .join(RoomId::from("r2"), carol.id.clone(), carol.outbox.clone())
        .await
        .unwrap();
    carol.drain();

    let err = router.route(&alice.id, offer_to(&carol.id)).await.unwrap_err();
    assert_eq!(
        err,
        SignalingError::TargetNotInRoom {
            target: carol.id.clone(),
            room: RoomId::from("r1"),
        }
    );
    carol.assert_idle();
}

#[tokio::test]
async fn test_membership_frames_are_not_relayed() {
    init_tracing();

    let (registry, router) = create_test_router();
    let alice = TestMember::new("alice");

    registry
        .join(RoomId::from("lobby"), alice.id.clone(), alice.outbox.clone())
        .await
        .unwrap();

    let err = router
        .route(
            &alice.id,
            SignalMessage::Join {
                room: RoomId::from("lobby"),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, SignalingError::Unroutable("join"));

    let err = router.route(&alice.id, SignalMessage::Leave).await.unwrap_err();
    assert_eq!(err, SignalingError::Unroutable("leave"));
}
