//! Test helpers for running a listening node on an in-memory overlay.

#![allow(dead_code)]

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tpsetup::{ClientConfig, ListenerConfig, ManagementClient, TransportListener, TrustList};
use tpsetup_engine_mock::{MockEngine, MockRouteTrust};
use tpsetup_overlay::{Addr, PeerId};
use tpsetup_overlay_memory::{MemoryNetwork, MemoryOverlay};

/// Identity of the node running the listener.
pub const NODE: u8 = 10;
/// Identity on the node's trust list.
pub const TRUSTED: u8 = 1;
/// Identity nobody trusts.
pub const UNTRUSTED: u8 = 3;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tpsetup=debug,tpsetup_rpc=debug")
        .with_test_writer()
        .try_init();
}

/// A node serving the gateway on a memory network.
pub struct TestNode {
    pub network: MemoryNetwork,
    pub engine: MockEngine,
    pub route_trust: MockRouteTrust,
    pub cancel: CancellationToken,
    handle: Option<JoinHandle<tpsetup::Result<()>>>,
    pub port: u16,
}

impl TestNode {
    pub async fn start() -> Self {
        Self::start_with(ListenerConfig::default()).await
    }

    pub async fn start_with(config: ListenerConfig) -> Self {
        init_tracing();

        let network = MemoryNetwork::new();
        let engine = MockEngine::new(Self::pk());
        let route_trust = MockRouteTrust::default();
        let cancel = CancellationToken::new();
        let port = config.port;

        let listener = TransportListener::new(
            network.client(Self::pk()),
            engine.clone(),
            route_trust.clone(),
            TrustList::new([PeerId::from_seed(TRUSTED)]),
            config,
        );
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { listener.listen_and_serve(cancel).await }
        });

        let node = Self {
            network,
            engine,
            route_trust,
            cancel,
            handle: Some(handle),
            port,
        };
        node.wait_listening().await;
        node
    }

    /// Cancel the listener and wait for its loop to return.
    pub async fn stop(&mut self) -> tpsetup::Result<()> {
        self.cancel.cancel();
        let handle = self.handle.take().expect("listener already stopped");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener should stop after cancellation")
            .expect("listener task panicked")
    }

    pub fn pk() -> PeerId {
        PeerId::from_seed(NODE)
    }

    pub fn addr(&self) -> Addr {
        Addr::new(Self::pk(), self.port)
    }

    pub fn overlay(&self, seed: u8) -> MemoryOverlay {
        self.network.client(PeerId::from_seed(seed))
    }

    pub fn manager(&self, seed: u8) -> ManagementClient<MemoryOverlay> {
        self.manager_with(seed, self.client_config())
    }

    pub fn manager_with(&self, seed: u8, config: ClientConfig) -> ManagementClient<MemoryOverlay> {
        ManagementClient::new(self.overlay(seed), config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            port: self.port,
            ..ClientConfig::default()
        }
    }

    async fn wait_listening(&self) {
        let addr = self.addr();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.network.is_listening(&addr) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("listener did not bind in time");
    }
}
