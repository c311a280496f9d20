//! Connection registry behaviour of `ManagementClient`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TRUSTED, TestNode, UNTRUSTED};
use ed25519_dalek::SigningKey;
use tpsetup::{ClientConfig, Error, ListenerConfig};
use tpsetup_overlay::PeerId;

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);

    manager.connect(TestNode::pk()).await.unwrap();
    let first = manager.client(&TestNode::pk()).unwrap();

    let err = manager.connect(TestNode::pk()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyConnected(pk) if pk == TestNode::pk()));

    let still = manager.client(&TestNode::pk()).unwrap();
    assert!(Arc::ptr_eq(&first, &still));
    assert_eq!(manager.list(), vec![TestNode::pk()]);
}

#[tokio::test]
async fn test_disconnect_then_reconnect() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);

    manager.connect(TestNode::pk()).await.unwrap();
    let first = manager.client(&TestNode::pk()).unwrap();

    manager.disconnect(TestNode::pk()).await.unwrap();
    assert!(first.is_closed());
    assert!(manager.client(&TestNode::pk()).is_none());

    manager.connect(TestNode::pk()).await.unwrap();
    let second = manager.client(&TestNode::pk()).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    second.get_transports().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_unknown_peer() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);

    let err = manager.disconnect(PeerId::from_seed(42)).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected(pk) if pk == PeerId::from_seed(42)));
}

#[tokio::test]
async fn test_failed_dial_releases_slot() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);
    let nobody = PeerId::from_seed(77);

    for _ in 0..2 {
        let err = manager.connect(nobody).await.unwrap_err();
        assert!(matches!(err, Error::Overlay(_)));
    }
    assert!(manager.client(&nobody).is_none());
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn test_concurrent_connects_admit_one() {
    let node = TestNode::start().await;
    let manager = Arc::new(node.manager(TRUSTED));

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.connect(TestNode::pk()).await })
        })
        .collect();

    let mut connected = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => connected += 1,
            Err(Error::AlreadyConnected(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(connected, 1);
}

#[tokio::test]
async fn test_timed_out_call_poisons_session() {
    let node = TestNode::start_with(ListenerConfig {
        save_timeout_ms: 0,
        ..ListenerConfig::default()
    })
    .await;
    node.engine.set_save_delay(Some(Duration::from_secs(10)));

    let manager = node.manager_with(
        TRUSTED,
        ClientConfig {
            call_timeout_ms: 100,
            ..node.client_config()
        },
    );
    manager.connect(TestNode::pk()).await.unwrap();
    let client = manager.client(&TestNode::pk()).unwrap();

    let err = client
        .add_transport(PeerId::from_seed(2), "dmsg", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CallTimeout(d) if d == Duration::from_millis(100)));
    assert!(client.is_closed());

    let err = client.get_transports().await.unwrap_err();
    assert!(matches!(err, Error::Rpc(tpsetup_rpc::Error::Closed)));

    // A dead session does not block a fresh connect.
    manager.connect(TestNode::pk()).await.unwrap();
    let fresh = manager.client(&TestNode::pk()).unwrap();
    assert!(!Arc::ptr_eq(&client, &fresh));
    assert!(!fresh.is_closed());
}

#[tokio::test]
async fn test_no_timeout_waits_for_slow_engine() {
    let node = TestNode::start_with(ListenerConfig {
        save_timeout_ms: 0,
        ..ListenerConfig::default()
    })
    .await;
    node.engine.set_save_delay(Some(Duration::from_millis(300)));

    let manager = node.manager_with(
        TRUSTED,
        ClientConfig {
            call_timeout_ms: 0,
            ..node.client_config()
        },
    );
    manager.connect(TestNode::pk()).await.unwrap();

    let summary = manager
        .client(&TestNode::pk())
        .unwrap()
        .add_transport(PeerId::from_seed(2), "dmsg", Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(summary.remote_pk, PeerId::from_seed(2));
}

#[tokio::test]
async fn test_connect_verified_with_own_key() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);
    let key = SigningKey::from_bytes(&[TRUSTED; 32]);

    manager.connect_verified(TestNode::pk(), &key).await.unwrap();

    let client = manager.client(&TestNode::pk()).unwrap();
    client.get_transports().await.unwrap();
    assert_eq!(manager.list(), vec![TestNode::pk()]);
}

#[tokio::test]
async fn test_wrong_key_fails_challenge_and_records_nothing() {
    let node = TestNode::start().await;
    let manager = node.manager(TRUSTED);
    let wrong = SigningKey::from_bytes(&[UNTRUSTED; 32]);

    let err = manager
        .connect_verified(TestNode::pk(), &wrong)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ChallengeFailed { pk, ref source }
            if pk == TestNode::pk() && matches!(**source, Error::Handshake(_))
    ));
    assert!(manager.client(&TestNode::pk()).is_none());
    assert!(manager.list().is_empty());

    manager.connect(TestNode::pk()).await.unwrap();
    assert!(manager.client(&TestNode::pk()).is_some());
}
