use parley_client::testing::{LinkCall, MockLinkFactory};
use parley_client::{ConnectionSupervisor, LinkEvent, NegotiationError, NegotiationState, Role, SdpKind};
use parley_core::{MemberId, SignalMessage};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{ANSWER_SDP, OFFER_SDP, SupervisorHarness, remote_candidate};

#[tokio::test]
async fn test_offerer_sends_offer_then_candidates() {
    init_tracing();

    let links = MockLinkFactory::new().with_local_candidates(2);
    let mut harness = SupervisorHarness::new(links.clone(), None);
    let bob = MemberId::from("bob");

    let handle = ConnectionSupervisor::spawn(1, bob.clone(), Role::Offerer, harness.ctx.clone());

    let SignalMessage::Offer { target, sdp, .. } = harness.next_frame().await.unwrap() else {
        panic!("expected an offer first");
    };
    assert_eq!(target, bob);
    assert!(sdp.starts_with("v=0"));

    for _ in 0..2 {
        let frame = harness.next_frame().await.unwrap();
        assert!(matches!(frame, SignalMessage::IceCandidate { ref target, .. } if *target == bob));
    }

    handle.remote_answer(ANSWER_SDP.to_owned());
    let state = handle.wait_for(|s| s == NegotiationState::Connected).await;
    assert_eq!(state, NegotiationState::Connected);

    let link = links.link_for(&bob).unwrap();
    assert!(link.calls().contains(&LinkCall::SetRemote(SdpKind::Answer, ANSWER_SDP.to_owned())));
}

#[tokio::test]
async fn test_answerer_applies_early_candidates_after_offer() {
    init_tracing();

    let links = MockLinkFactory::new();
    let mut harness = SupervisorHarness::new(links.clone(), None);
    let alice = MemberId::from("alice");

    let handle = ConnectionSupervisor::spawn(1, alice.clone(), Role::Answerer, harness.ctx.clone());

    handle.remote_candidate(remote_candidate(1));
    handle.remote_candidate(remote_candidate(2));
    handle.remote_offer(OFFER_SDP.to_owned());

    let SignalMessage::Answer { target, .. } = harness.next_frame().await.unwrap() else {
        panic!("expected an answer first");
    };
    assert_eq!(target, alice);

    let state = handle.wait_for(|s| s == NegotiationState::Connected).await;
    assert_eq!(state, NegotiationState::Connected);

    let link = links.link_for(&alice).unwrap();
    assert_eq!(
        link.applied_candidates(),
        vec![remote_candidate(1), remote_candidate(2)]
    );
    assert_eq!(link.calls()[0], LinkCall::SetRemote(SdpKind::Offer, OFFER_SDP.to_owned()));
}

#[tokio::test(start_paused = true)]
async fn test_unconnected_peer_times_out() {
    init_tracing();

    let links = MockLinkFactory::new().without_auto_connect();
    let mut harness = SupervisorHarness::new(links.clone(), Some(Duration::from_secs(5)));
    let bob = MemberId::from("bob");

    let handle = ConnectionSupervisor::spawn(7, bob.clone(), Role::Offerer, harness.ctx.clone());
    handle.remote_answer(ANSWER_SDP.to_owned());

    let state = handle.wait_for(|s| s.is_terminal()).await;
    assert_eq!(state, NegotiationState::Failed);

    let status = harness.next_error().await.unwrap();
    assert_eq!(status.supervisor, 7);
    assert_eq!(status.member, bob);
    assert!(matches!(status.error, Some(NegotiationError::Timeout(t)) if t == Duration::from_secs(5)));
    assert!(links.link_for(&bob).unwrap().is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_connected_peer_outlives_the_deadline() {
    let links = MockLinkFactory::new();
    let harness = SupervisorHarness::new(links, Some(Duration::from_secs(5)));

    let handle =
        ConnectionSupervisor::spawn(1, MemberId::from("alice"), Role::Answerer, harness.ctx.clone());
    handle.remote_offer(OFFER_SDP.to_owned());
    handle.wait_for(|s| s == NegotiationState::Connected).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.state(), NegotiationState::Connected);
}

#[tokio::test]
async fn test_link_failure_after_connect() {
    init_tracing();

    let links = MockLinkFactory::new();
    let mut harness = SupervisorHarness::new(links.clone(), None);
    let alice = MemberId::from("alice");

    let handle = ConnectionSupervisor::spawn(1, alice.clone(), Role::Answerer, harness.ctx.clone());
    handle.remote_offer(OFFER_SDP.to_owned());
    handle.wait_for(|s| s == NegotiationState::Connected).await;

    links.link_for(&alice).unwrap().emit(LinkEvent::Failed);

    let status = harness.next_error().await.unwrap();
    assert_eq!(status.state, NegotiationState::Failed);
    assert!(matches!(status.error, Some(NegotiationError::LinkFailed)));
}

#[tokio::test]
async fn test_malformed_offer_fails_peer() {
    let links = MockLinkFactory::new();
    let mut harness = SupervisorHarness::new(links, None);

    let handle =
        ConnectionSupervisor::spawn(1, MemberId::from("alice"), Role::Answerer, harness.ctx.clone());
    handle.remote_offer("not sdp".to_owned());

    let status = harness.next_error().await.unwrap();
    assert_eq!(status.state, NegotiationState::Failed);
    assert!(matches!(
        status.error,
        Some(NegotiationError::Link { step: "remote offer", .. })
    ));
}
