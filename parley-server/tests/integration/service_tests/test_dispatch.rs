use parley_core::{ErrorCode, MemberId, RoomId, SignalMessage};
use parley_server::{ServerConfig, SignalingService};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::init_tracing;

async fn next_frame(rx: &mut mpsc::Receiver<SignalMessage>) -> SignalMessage {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("outbox closed")
}

fn turn_config() -> ServerConfig {
    ServerConfig {
        ice_urls: vec!["turn:turn.example.com:3478".to_owned()],
        turn_username: Some("relay".to_owned()),
        turn_credential: Some("secret".to_owned()),
        ..ServerConfig::default()
    }
}

#[tokio::test]
async fn test_join_reply_carries_ice_servers() {
    init_tracing();

    let service = SignalingService::new(&turn_config());
    let (member, outbox, mut rx) = service.open_connection();

    service
        .dispatch(
            &member,
            &outbox,
            SignalMessage::Join {
                room: RoomId::from("lobby"),
            },
        )
        .await;

    match next_frame(&mut rx).await {
        SignalMessage::Joined {
            room,
            member: joined_as,
            peers,
            ice_servers,
        } => {
            assert_eq!(room, RoomId::from("lobby"));
            assert_eq!(joined_as, member);
            assert!(peers.is_empty());
            assert_eq!(ice_servers, service.get_ice_servers());
            assert_eq!(ice_servers[0].username.as_deref(), Some("relay"));
        }
        other => panic!("expected joined, got {:?}", other),
    }
}

#[tokio::test]
async fn test_open_connection_assigns_distinct_ids() {
    let service = SignalingService::new(&ServerConfig::default());

    let (a, _, _rx_a) = service.open_connection();
    let (b, _, _rx_b) = service.open_connection();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_second_room_join_is_reported() {
    init_tracing();

    let service = SignalingService::new(&ServerConfig::default());
    let (member, outbox, mut rx) = service.open_connection();

    for room in ["r1", "r2"] {
        service
            .dispatch(
                &member,
                &outbox,
                SignalMessage::Join {
                    room: RoomId::from(room),
                },
            )
            .await;
    }

    assert_eq!(next_frame(&mut rx).await.kind(), "joined");
    match next_frame(&mut rx).await {
        SignalMessage::Error { code, target, .. } => {
            assert_eq!(code, ErrorCode::AlreadyJoined);
            assert_eq!(target, None);
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(service.registry().room_of(&member), Some(RoomId::from("r1")));
}

#[tokio::test]
async fn test_failed_relay_is_reported_to_sender() {
    init_tracing();

    let service = SignalingService::new(&ServerConfig::default());
    let (member, outbox, mut rx) = service.open_connection();
    let ghost = MemberId::from("ghost");

    service
        .dispatch(
            &member,
            &outbox,
            SignalMessage::Join {
                room: RoomId::from("lobby"),
            },
        )
        .await;
    next_frame(&mut rx).await;

    service
        .dispatch(
            &member,
            &outbox,
            SignalMessage::Offer {
                source: None,
                target: ghost.clone(),
                sdp: "v=0".to_owned(),
            },
        )
        .await;

    match next_frame(&mut rx).await {
        SignalMessage::Error { code, target, .. } => {
            assert_eq!(code, ErrorCode::TargetNotInRoom);
            assert_eq!(target, Some(ghost));
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_relay_before_join_is_unknown_source() {
    init_tracing();

    let service = SignalingService::new(&ServerConfig::default());
    let (member, outbox, mut rx) = service.open_connection();

    service
        .dispatch(
            &member,
            &outbox,
            SignalMessage::Answer {
                source: None,
                target: MemberId::from("someone"),
                sdp: "v=0".to_owned(),
            },
        )
        .await;

    match next_frame(&mut rx).await {
        SignalMessage::Error { code, .. } => assert_eq!(code, ErrorCode::UnknownSource),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_frames_from_client_are_rejected() {
    init_tracing();

    let service = SignalingService::new(&ServerConfig::default());
    let (member, outbox, mut rx) = service.open_connection();

    service
        .dispatch(
            &member,
            &outbox,
            SignalMessage::PeerJoined {
                member: MemberId::from("forged"),
            },
        )
        .await;

    match next_frame(&mut rx).await {
        SignalMessage::Error { code, .. } => assert_eq!(code, ErrorCode::Unroutable),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_two_members_exchange_offer_and_answer() {
    init_tracing();

    let service = SignalingService::new(&ServerConfig::default());
    let (alice, alice_outbox, mut alice_rx) = service.open_connection();
    let (bob, bob_outbox, mut bob_rx) = service.open_connection();
    let join = SignalMessage::Join {
        room: RoomId::from("lobby"),
    };

    service.dispatch(&alice, &alice_outbox, join.clone()).await;
    service.dispatch(&bob, &bob_outbox, join).await;

    assert_eq!(next_frame(&mut alice_rx).await.kind(), "joined");
    assert_eq!(
        next_frame(&mut alice_rx).await,
        SignalMessage::PeerJoined {
            member: bob.clone()
        }
    );
    assert_eq!(next_frame(&mut bob_rx).await.kind(), "joined");

    service
        .dispatch(
            &alice,
            &alice_outbox,
            SignalMessage::Offer {
                source: None,
                target: bob.clone(),
                sdp: "v=0 offer".to_owned(),
            },
        )
        .await;
    assert_eq!(
        next_frame(&mut bob_rx).await.source(),
        Some(&alice),
        "offer should arrive stamped"
    );

    service
        .dispatch(
            &bob,
            &bob_outbox,
            SignalMessage::Answer {
                source: None,
                target: alice.clone(),
                sdp: "v=0 answer".to_owned(),
            },
        )
        .await;
    match next_frame(&mut alice_rx).await {
        SignalMessage::Answer { source, sdp, .. } => {
            assert_eq!(source, Some(bob));
            assert_eq!(sdp, "v=0 answer");
        }
        other => panic!("expected answer, got {:?}", other),
    }
}
