//! A managing peer talking to a listening node over the memory overlay.

mod common;

use std::time::Duration;

use common::{NODE, TRUSTED, TestNode, UNTRUSTED};
use ed25519_dalek::{Signer, SigningKey};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tpsetup::{Error, ListenerConfig, SetupClient, TransportListener, TrustList};
use tpsetup_engine::{Label, SETUP_LABEL, TransportId, TransportType};
use tpsetup_overlay::{Overlay, PeerId};
use tracing::Span;

#[tokio::test]
async fn test_trusted_peer_adds_transport() {
    let node = TestNode::start().await;
    let remote = PeerId::from_seed(2);
    node.route_trust.trust(remote);

    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();
    let client = manager.client(&TestNode::pk()).unwrap();

    let summary = client
        .add_transport(remote, "typeX", Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(summary.local_pk, TestNode::pk());
    assert_eq!(summary.remote_pk, remote);
    assert_eq!(summary.transport_type, TransportType::from("typeX"));
    assert_eq!(summary.label, SETUP_LABEL);
    assert!(summary.is_setup);
    assert_eq!(
        summary.id,
        TransportId::derive(&TestNode::pk(), &remote, &TransportType::from("typeX"))
    );

    node.route_trust.distrust(&remote);
    let listed = client.get_transports().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, summary.id);
    assert!(!listed[0].is_setup);
}

#[tokio::test]
async fn test_untrusted_peer_sees_only_a_closed_connection() {
    let node = TestNode::start().await;
    let overlay = node.overlay(UNTRUSTED);

    let mut stream = overlay.dial(node.addr()).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("untrusted stream should be closed promptly");
    assert!(matches!(read, Ok(0) | Err(_)));

    let stream = overlay.dial(node.addr()).await.unwrap();
    let client = SetupClient::new(stream, Some(Duration::from_secs(5)), Span::none());
    let err = client
        .add_transport(PeerId::from_seed(2), "dmsg", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rpc(_)), "unexpected error: {err:?}");

    assert_eq!(node.engine.save_calls(), 0);
    assert!(node.engine.transports().is_empty());
}

#[tokio::test]
async fn test_remove_transport_ownership() {
    let node = TestNode::start().await;
    let owned = node.engine.insert(PeerId::from_seed(4), "dmsg", SETUP_LABEL);
    let foreign = node.engine.insert(PeerId::from_seed(5), "stcpr", Label::User);

    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();
    let client = manager.client(&TestNode::pk()).unwrap();

    let err = client.remove_transport(foreign).await.unwrap_err();
    assert!(matches!(err, Error::IncorrectType(id) if id == foreign));
    assert!(node.engine.get(&foreign).is_some());

    client.remove_transport(owned).await.unwrap();
    assert!(node.engine.get(&owned).is_none());

    let err = client.remove_transport(owned).await.unwrap_err();
    assert!(matches!(err, Error::TransportNotFound(id) if id == owned));

    // Errors do not poison the session.
    assert!(!client.is_closed());
}

#[tokio::test]
async fn test_get_transports_returns_only_setup_owned() {
    let node = TestNode::start().await;
    for seed in 20..25 {
        node.engine.insert(PeerId::from_seed(seed), "dmsg", SETUP_LABEL);
    }
    node.engine.insert(PeerId::from_seed(30), "dmsg", Label::User);
    node.engine.insert(PeerId::from_seed(31), "sudph", Label::Automatic);

    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();
    let listed = manager
        .client(&TestNode::pk())
        .unwrap()
        .get_transports()
        .await
        .unwrap();

    assert_eq!(listed.len(), 5);
    assert!(listed.iter().all(|s| s.label == SETUP_LABEL));
}

#[tokio::test]
async fn test_engine_failure_reaches_caller() {
    let node = TestNode::start().await;
    node.engine
        .fail_next_save(tpsetup_engine_mock::Error::MockError("dmsg down".into()));

    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();
    let err = manager
        .client(&TestNode::pk())
        .unwrap()
        .add_transport(PeerId::from_seed(2), "dmsg", Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Engine(ref msg) if msg.contains("dmsg down")));
}

#[tokio::test]
async fn test_save_deadline_over_rpc() {
    let node = TestNode::start_with(ListenerConfig {
        save_timeout_ms: 100,
        ..ListenerConfig::default()
    })
    .await;
    node.engine.set_save_delay(Some(Duration::from_secs(2)));

    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();
    let err = manager
        .client(&TestNode::pk())
        .unwrap()
        .add_transport(PeerId::from_seed(2), "dmsg", Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SaveDeadline(d) if d == Duration::from_millis(100)));
}

#[tokio::test]
async fn test_handshake_over_rpc() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();
    let client = manager.client(&TestNode::pk()).unwrap();

    let nonce = client.challenge().await.unwrap();
    assert_eq!(nonce.len(), tpsetup::NONCE_LENGTH);

    let stranger = SigningKey::from_bytes(&[UNTRUSTED; 32]);
    let err = client
        .response(&stranger.sign(&nonce).to_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Handshake(_)));

    let nonce = client.challenge().await.unwrap();
    let own_key = SigningKey::from_bytes(&[TRUSTED; 32]);
    client
        .response(&own_key.sign(&nonce).to_bytes())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancellation_stops_listener_but_not_sessions() {
    let mut node = TestNode::start().await;
    let manager = node.manager(TRUSTED);
    manager.connect(TestNode::pk()).await.unwrap();

    node.stop().await.unwrap();
    assert!(!node.network.is_listening(&node.addr()));

    // The session accepted before cancellation keeps working.
    let listed = manager
        .client(&TestNode::pk())
        .unwrap()
        .get_transports()
        .await
        .unwrap();
    assert!(listed.is_empty());

    // New sessions cannot be opened.
    let late = node.manager(TRUSTED + 1);
    let err = late.connect(TestNode::pk()).await.unwrap_err();
    assert!(matches!(err, Error::Overlay(_)));
}

#[tokio::test]
async fn test_second_listener_on_same_port_fails_to_bind() {
    let node = TestNode::start().await;

    let second = TransportListener::new(
        node.network.client(PeerId::from_seed(NODE)),
        node.engine.clone(),
        node.route_trust.clone(),
        TrustList::default(),
        ListenerConfig::default(),
    );
    let err = second
        .listen_and_serve(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Bind { port: 47, .. }));
}
