//! Registry of management sessions, one per remote node.

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use parking_lot::Mutex;
use tpsetup_overlay::{Overlay, PeerId};
use tracing::{Span, debug, info, info_span, warn};

use crate::client::SetupClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

enum Slot {
    /// A dial is in flight; nothing is published yet.
    Connecting,
    Connected(Arc<SetupClient>),
}

impl Slot {
    fn is_live(&self) -> bool {
        match self {
            Self::Connecting => true,
            Self::Connected(client) => !client.is_closed(),
        }
    }
}

type Registry = Mutex<HashMap<PeerId, Slot>>;

/// Removes a `Connecting` slot if the dial never publishes a client.
struct Reservation<'a> {
    registry: &'a Registry,
    pk: PeerId,
    armed: bool,
}

impl Reservation<'_> {
    fn publish(mut self, client: Arc<SetupClient>) {
        self.registry.lock().insert(self.pk, Slot::Connected(client));
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut registry = self.registry.lock();
            if matches!(registry.get(&self.pk), Some(Slot::Connecting)) {
                registry.remove(&self.pk);
            }
        }
    }
}

/// Opens, reuses and tears down management sessions to remote gateways.
///
/// At most one session exists per peer. Every access to the registry goes
/// through one lock, and no network I/O happens while it is held.
pub struct ManagementClient<O: Overlay> {
    overlay: O,
    config: ClientConfig,
    clients: Registry,
    span: Span,
}

impl<O: Overlay> ManagementClient<O> {
    /// Create an empty registry dialing through `overlay`.
    pub fn new(overlay: O, config: ClientConfig) -> Self {
        let span = info_span!("management_client", local_pk = %overlay.local_pk());
        Self {
            overlay,
            config,
            clients: Mutex::new(HashMap::new()),
            span,
        }
    }

    /// Record everything this registry logs under `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Open a session to `pk`.
    ///
    /// A session whose connection has already closed (for example after a
    /// call timed out) is replaced.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnected`] if a live session, or a dial, to `pk`
    ///   already exists
    /// - [`Error::Overlay`] if the peer cannot be dialed
    pub async fn connect(&self, pk: PeerId) -> Result<()> {
        self.open(pk, None).await
    }

    /// Open a session to `pk` and prove our identity with `key` before
    /// publishing it.
    ///
    /// The gateway's nonce is signed with `key`; if the gateway rejects the
    /// answer the connection is closed and no session is recorded.
    ///
    /// # Errors
    ///
    /// Everything [`connect`](Self::connect) returns, plus
    /// [`Error::ChallengeFailed`] if the handshake does not complete.
    pub async fn connect_verified(&self, pk: PeerId, key: &SigningKey) -> Result<()> {
        self.open(pk, Some(key)).await
    }

    async fn open(&self, pk: PeerId, key: Option<&SigningKey>) -> Result<()> {
        let reservation = {
            let mut clients = self.clients.lock();
            if clients.get(&pk).is_some_and(Slot::is_live) {
                return Err(Error::AlreadyConnected(pk));
            }
            clients.insert(pk, Slot::Connecting);
            Reservation {
                registry: &self.clients,
                pk,
                armed: true,
            }
        };

        let client = match SetupClient::dial(&self.overlay, pk, &self.config).await {
            Ok(client) => client,
            Err(e) => {
                warn!(parent: &self.span, "Failed to connect to {}: {}", pk, e);
                return Err(e);
            }
        };

        if let Some(key) = key {
            if let Err(e) = solve_challenge(&client, key).await {
                warn!(parent: &self.span, "Failed to solve challenge from {}: {}", pk, e);
                let _ = client.close().await;
                return Err(Error::ChallengeFailed {
                    pk,
                    source: Box::new(e),
                });
            }
        }

        reservation.publish(Arc::new(client));
        info!(parent: &self.span, "Connected to {}", pk);
        Ok(())
    }

    /// Close and forget the session to `pk`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no session to `pk` exists
    /// - the close error of the underlying connection, unchanged
    pub async fn disconnect(&self, pk: PeerId) -> Result<()> {
        let client = {
            let mut clients = self.clients.lock();
            match clients.remove(&pk) {
                Some(Slot::Connected(client)) => client,
                Some(Slot::Connecting) => {
                    clients.insert(pk, Slot::Connecting);
                    return Err(Error::NotConnected(pk));
                }
                None => return Err(Error::NotConnected(pk)),
            }
        };

        debug!(parent: &self.span, "Disconnecting from {}", pk);
        client.close().await
    }

    /// The session to `pk`, if one has been opened.
    pub fn client(&self, pk: &PeerId) -> Option<Arc<SetupClient>> {
        match self.clients.lock().get(pk) {
            Some(Slot::Connected(client)) => Some(Arc::clone(client)),
            Some(Slot::Connecting) | None => None,
        }
    }

    /// Peers with a published session, in no particular order.
    pub fn list(&self) -> Vec<PeerId> {
        self.clients
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Connected(_)))
            .map(|(pk, _)| *pk)
            .collect()
    }
}

async fn solve_challenge(client: &SetupClient, key: &SigningKey) -> Result<()> {
    let nonce = client.challenge().await?;
    client.response(&key.sign(&nonce).to_bytes()).await
}
