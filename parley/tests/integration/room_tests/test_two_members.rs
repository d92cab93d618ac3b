use parley::client::testing::{LinkCall, MockLinkFactory};
use parley::{MemberId, RoomId};
use parley::client::SdpKind;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{
    connected_to, create_member, create_test_service, drive_until, enter, wait_for_departure,
};

#[tokio::test]
async fn test_joiner_answers_existing_member() {
    init_tracing();

    let service = create_test_service();
    let (mut alice, alice_links) = create_member(&service);
    let (mut bob, bob_links) = create_member(&service);

    assert!(enter(&mut alice, "r1").await.unwrap().is_empty());
    assert!(alice.peers().is_empty());

    let alice_id = alice.member_id().cloned().unwrap();
    assert_eq!(enter(&mut bob, "r1").await.unwrap(), vec![alice_id.clone()]);
    let bob_id = bob.member_id().cloned().unwrap();

    // Each side applies the one candidate the other gathers.
    let applied_one = |links: &MockLinkFactory, remote: &MemberId| {
        links
            .link_for(remote)
            .is_some_and(|link| link.applied_candidates().len() == 1)
    };

    let mut sessions = [alice, bob];
    drive_until(&mut sessions, |s| {
        connected_to(&s[0], 1)
            && connected_to(&s[1], 1)
            && applied_one(&alice_links, &bob_id)
            && applied_one(&bob_links, &alice_id)
    })
    .await
    .unwrap();

    // Alice was there first, so she offered and Bob answered.
    let alice_link = alice_links.link_for(&bob_id).unwrap();
    assert_eq!(alice_link.calls()[0], LinkCall::CreateOffer);
    let bob_link = bob_links.link_for(&alice_id).unwrap();
    assert!(matches!(bob_link.calls()[0], LinkCall::SetRemote(SdpKind::Offer, _)));

    let mut members = service.registry().members_of(&RoomId::from("r1")).await;
    members.sort();
    let mut expected = vec![alice_id, bob_id];
    expected.sort();
    assert_eq!(members, expected);
}

#[tokio::test]
async fn test_leave_closes_remote_supervisor() {
    init_tracing();

    let service = create_test_service();
    let (mut alice, _) = create_member(&service);
    let (mut bob, bob_links) = create_member(&service);

    enter(&mut alice, "r1").await.unwrap();
    enter(&mut bob, "r1").await.unwrap();
    let alice_id = alice.member_id().cloned().unwrap();

    let mut sessions = [alice, bob];
    drive_until(&mut sessions, |s| connected_to(&s[0], 1) && connected_to(&s[1], 1))
        .await
        .unwrap();
    let [mut alice, mut bob] = sessions;

    alice.leave_room().await;
    wait_for_departure(&mut bob, &alice_id).await.unwrap();

    assert!(bob.peers().is_empty());
    assert!(bob_links.link_for(&alice_id).unwrap().is_closed());
    assert_eq!(
        service.registry().members_of(&RoomId::from("r1")).await,
        vec![bob.member_id().cloned().unwrap()]
    );
}

#[tokio::test]
async fn test_dropped_client_is_announced() {
    init_tracing();

    let service = create_test_service();
    let (mut alice, _) = create_member(&service);
    let (mut bob, _) = create_member(&service);

    enter(&mut alice, "r1").await.unwrap();
    enter(&mut bob, "r1").await.unwrap();
    let alice_id = alice.member_id().cloned().unwrap();

    let mut sessions = [alice, bob];
    drive_until(&mut sessions, |s| connected_to(&s[0], 1) && connected_to(&s[1], 1))
        .await
        .unwrap();
    let [alice, mut bob] = sessions;

    // No Leave is sent; the server notices the closed connection.
    drop(alice);
    wait_for_departure(&mut bob, &alice_id).await.unwrap();

    assert!(bob.peers().is_empty());
    bob.leave_room().await;

    // Give the server a moment to process the last leave.
    for _ in 0..50 {
        if service.registry().room_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(service.registry().room_count(), 0);
}

#[tokio::test]
async fn test_rooms_do_not_mix() {
    init_tracing();

    let service = create_test_service();
    let (mut alice, alice_links) = create_member(&service);
    let (mut bob, bob_links) = create_member(&service);

    enter(&mut alice, "r1").await.unwrap();
    assert!(enter(&mut bob, "r2").await.unwrap().is_empty());

    for session in [&mut alice, &mut bob] {
        let quiet = tokio::time::timeout(Duration::from_millis(100), session.next_event()).await;
        assert!(quiet.is_err());
        assert!(session.peers().is_empty());
    }

    assert_eq!(alice_links.created(), 0);
    assert_eq!(bob_links.created(), 0);
    assert_eq!(service.registry().room_count(), 2);
}
