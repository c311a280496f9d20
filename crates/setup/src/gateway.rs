//! Per-connection operation surface exposed to authorized peers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::{Signature, Verifier};
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tpsetup_engine::{RouteTrust, SETUP_LABEL, TransportEngine, TransportId, TransportType};
use tpsetup_overlay::PeerId;
use tpsetup_rpc::{ErrorInfo, RpcHandler, codec};
use tracing::{Instrument, Span, debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    ADD_TRANSPORT, AddTransportRequest, CHALLENGE, GET_TRANSPORTS, REMOVE_TRANSPORT, RESPONSE,
};
use crate::summary::TransportSummary;

/// Size of the handshake nonce.
pub const NONCE_LENGTH: usize = 32;

/// Gateway bound to one authorized connection.
///
/// Every call is delegated to the transport engine and the routing-trust
/// oracle. A gateway is never shared between connections.
pub struct Gateway<E, R>
where
    E: TransportEngine,
    R: RouteTrust,
{
    engine: E,
    route_trust: R,
    remote_pk: PeerId,
    save_timeout: Option<Duration>,
    challenge: Mutex<Option<[u8; NONCE_LENGTH]>>,
    verified: AtomicBool,
    span: Span,
}

impl<E, R> Gateway<E, R>
where
    E: TransportEngine,
    R: RouteTrust,
{
    /// Create a gateway serving the peer `remote_pk`.
    pub fn new(
        engine: E,
        route_trust: R,
        remote_pk: PeerId,
        save_timeout: Option<Duration>,
        span: Span,
    ) -> Self {
        Self {
            engine,
            route_trust,
            remote_pk,
            save_timeout,
            challenge: Mutex::new(None),
            verified: AtomicBool::new(false),
            span,
        }
    }

    /// The peer this gateway serves.
    pub const fn remote_pk(&self) -> PeerId {
        self.remote_pk
    }

    /// Whether the peer completed the challenge/response handshake.
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::SeqCst)
    }

    /// Create (or reuse) a setup-owned transport to `remote`.
    ///
    /// A non-zero `timeout` bounds the engine's save by the gateway's own
    /// deadline; the value itself is not used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SaveDeadline`] if the deadline elapsed and
    /// [`Error::Engine`] if the engine refused.
    pub async fn add_transport(
        &self,
        remote: PeerId,
        transport_type: TransportType,
        timeout: Duration,
    ) -> Result<TransportSummary> {
        let save = self.engine.save_transport(remote, &transport_type, SETUP_LABEL);

        let saved = match self.save_timeout.filter(|_| !timeout.is_zero()) {
            Some(deadline) => tokio::time::timeout(deadline, save)
                .await
                .map_err(|_| Error::SaveDeadline(deadline))?,
            None => save.await,
        };
        let transport = saved.map_err(|e| {
            warn!("Failed to save {} transport to {}: {}", transport_type, remote, e);
            Error::engine(&e)
        })?;

        info!("Saved {} transport {} to {}", transport.transport_type, transport.id, remote);
        Ok(self.summarize(transport))
    }

    /// Delete the setup-owned transport `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportNotFound`] if the engine has no such transport
    /// - [`Error::IncorrectType`] if it was not created by transport setup
    /// - [`Error::Engine`] if the engine failed
    pub async fn remove_transport(&self, id: TransportId) -> Result<()> {
        let transport = self
            .engine
            .transport_by_id(id)
            .await
            .map_err(|e| Error::engine(&e))?
            .ok_or(Error::TransportNotFound(id))?;

        if transport.label != SETUP_LABEL {
            warn!("Refusing to remove {} transport {}", transport.label, id);
            return Err(Error::IncorrectType(id));
        }

        self.engine
            .delete_transport(id)
            .await
            .map_err(|e| Error::engine(&e))?;

        info!("Removed transport {}", id);
        Ok(())
    }

    /// Every setup-owned transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`] if the engine failed.
    pub async fn get_transports(&self) -> Result<Vec<TransportSummary>> {
        let transports = self
            .engine
            .transports_by_label(SETUP_LABEL)
            .await
            .map_err(|e| Error::engine(&e))?;

        Ok(transports
            .into_iter()
            .map(|transport| self.summarize(transport))
            .collect())
    }

    /// Issue a fresh handshake nonce, replacing any earlier one.
    pub fn challenge(&self) -> [u8; NONCE_LENGTH] {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        *self.challenge.lock() = Some(nonce);
        nonce
    }

    /// Check the peer's signature over the last nonce.
    ///
    /// The nonce is consumed whether or not the signature is valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if no challenge is outstanding or the
    /// signature does not verify under the peer's key.
    pub fn response(&self, signature: &[u8]) -> Result<()> {
        let nonce = self
            .challenge
            .lock()
            .take()
            .ok_or_else(|| Error::Handshake("no challenge issued".to_string()))?;

        let signature = Signature::from_slice(signature)
            .map_err(|e| Error::Handshake(format!("malformed signature: {e}")))?;
        let key = self
            .remote_pk
            .verifying_key()
            .map_err(|e| Error::Handshake(e.to_string()))?;
        key.verify(&nonce, &signature)
            .map_err(|_| Error::Handshake("signature does not match".to_string()))?;

        self.verified.store(true, Ordering::SeqCst);
        debug!("Peer {} completed the handshake", self.remote_pk);
        Ok(())
    }

    fn summarize(&self, transport: tpsetup_engine::ManagedTransport) -> TransportSummary {
        let is_setup = self.route_trust.setup_is_trusted(&transport.remote);
        TransportSummary::new(transport, is_setup)
    }

    async fn dispatch(
        &self,
        method: &str,
        payload: Bytes,
    ) -> std::result::Result<Bytes, ErrorInfo> {
        let reply = match method {
            ADD_TRANSPORT => {
                let request: AddTransportRequest = decode(&payload)?;
                let summary = self
                    .add_transport(request.remote_pk, request.transport_type, request.timeout)
                    .await?;
                encode(&summary)?
            }
            REMOVE_TRANSPORT => {
                let id: TransportId = decode(&payload)?;
                self.remove_transport(id).await?;
                encode(&())?
            }
            GET_TRANSPORTS => encode(&self.get_transports().await?)?,
            CHALLENGE => encode(&Bytes::copy_from_slice(&self.challenge()))?,
            RESPONSE => {
                let signature: Bytes = decode(&payload)?;
                self.response(&signature)?;
                encode(&())?
            }
            _ => return Err(ErrorInfo::method_not_found(method)),
        };

        Ok(reply)
    }
}

#[async_trait]
impl<E, R> RpcHandler for Gateway<E, R>
where
    E: TransportEngine,
    R: RouteTrust,
{
    async fn handle_message(
        &self,
        method: &str,
        payload: Bytes,
    ) -> std::result::Result<Bytes, ErrorInfo> {
        self.dispatch(method, payload)
            .instrument(self.span.clone())
            .await
    }
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    codec::decode(payload).map_err(|e| Error::BadRequest(e.to_string()))
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    codec::encode(value).map_err(|e| Error::BadRequest(e.to_string()))
}
