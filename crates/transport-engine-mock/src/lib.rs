//! Mock implementations of the transport engine and routing-trust interfaces for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tpsetup_engine::{
    Label, LogEntry, ManagedTransport, RouteTrust, TransportEngine, TransportId, TransportType,
};
use tpsetup_overlay::PeerId;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    transports: Mutex<HashMap<TransportId, ManagedTransport>>,
    fail_next_save: Mutex<Option<Error>>,
    save_delay: Mutex<Option<Duration>>,
    strict_types: AtomicBool,
    closed: AtomicBool,
    save_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// In-memory transport engine.
///
/// Clones share state, so a test can keep a handle while the code under test
/// owns another.
#[derive(Clone, Debug)]
pub struct MockEngine {
    local_pk: PeerId,
    inner: Arc<Inner>,
}

impl MockEngine {
    /// Create an empty engine for the node `local_pk`.
    #[must_use]
    pub fn new(local_pk: PeerId) -> Self {
        Self {
            local_pk,
            inner: Arc::new(Inner::default()),
        }
    }

    /// Add a transport directly, bypassing `save_transport` and its counters.
    pub fn insert(&self, remote: PeerId, transport_type: impl Into<TransportType>, label: Label) -> TransportId {
        let transport = ManagedTransport::new(self.local_pk, remote, transport_type.into(), label);
        let id = transport.id;
        self.inner.transports.lock().insert(id, transport);
        id
    }

    /// Fail the next `save_transport` call with `error`.
    pub fn fail_next_save(&self, error: Error) {
        *self.inner.fail_next_save.lock() = Some(error);
    }

    /// Delay every `save_transport` call by `delay`.
    pub fn set_save_delay(&self, delay: Option<Duration>) {
        *self.inner.save_delay.lock() = delay;
    }

    /// Reject transport types outside the well-known set.
    pub fn set_strict_types(&self, strict: bool) {
        self.inner.strict_types.store(strict, Ordering::SeqCst);
    }

    /// Make every subsequent call fail with [`Error::Closed`].
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Snapshot of a single transport.
    #[must_use]
    pub fn get(&self, id: &TransportId) -> Option<ManagedTransport> {
        self.inner.transports.lock().get(id).cloned()
    }

    /// Snapshot of every transport, in no particular order.
    #[must_use]
    pub fn transports(&self) -> Vec<ManagedTransport> {
        self.inner.transports.lock().values().cloned().collect()
    }

    /// Number of `save_transport` calls so far.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.inner.save_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_transport` calls so far.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl TransportEngine for MockEngine {
    type Error = Error;

    fn local_pk(&self) -> PeerId {
        self.local_pk
    }

    async fn save_transport(
        &self,
        remote: PeerId,
        transport_type: &TransportType,
        label: Label,
    ) -> Result<ManagedTransport, Self::Error> {
        self.inner.save_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        let delay = *self.inner.save_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.inner.fail_next_save.lock().take() {
            return Err(error);
        }

        if self.inner.strict_types.load(Ordering::SeqCst) && !transport_type.is_well_known() {
            return Err(Error::UnknownNetwork(transport_type.clone()));
        }

        let mut transports = self.inner.transports.lock();
        let id = TransportId::derive(&self.local_pk, &remote, transport_type);
        let transport = transports.entry(id).or_insert_with(|| {
            debug!("Saving {} transport {} to {}", transport_type, id, remote);
            let mut transport =
                ManagedTransport::new(self.local_pk, remote, transport_type.clone(), label);
            transport.log = Some(LogEntry::default());
            transport
        });

        Ok(transport.clone())
    }

    async fn transport_by_id(
        &self,
        id: TransportId,
    ) -> Result<Option<ManagedTransport>, Self::Error> {
        self.ensure_open()?;
        Ok(self.get(&id))
    }

    async fn delete_transport(&self, id: TransportId) -> Result<(), Self::Error> {
        self.inner.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_open()?;

        if self.inner.transports.lock().remove(&id).is_some() {
            debug!("Deleted transport {}", id);
        }
        Ok(())
    }

    async fn transports_by_label(
        &self,
        label: Label,
    ) -> Result<Vec<ManagedTransport>, Self::Error> {
        self.ensure_open()?;
        Ok(self
            .inner
            .transports
            .lock()
            .values()
            .filter(|transport| transport.label == label)
            .cloned()
            .collect())
    }
}

/// Routing-trust oracle backed by a mutable set.
#[derive(Clone, Debug, Default)]
pub struct MockRouteTrust {
    trusted: Arc<RwLock<HashSet<PeerId>>>,
}

impl MockRouteTrust {
    /// Create an oracle trusting exactly `peers`.
    #[must_use]
    pub fn new(peers: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            trusted: Arc::new(RwLock::new(peers.into_iter().collect())),
        }
    }

    /// Start trusting `pk`.
    pub fn trust(&self, pk: PeerId) {
        self.trusted.write().insert(pk);
    }

    /// Stop trusting `pk`.
    pub fn distrust(&self, pk: &PeerId) {
        self.trusted.write().remove(pk);
    }
}

impl RouteTrust for MockRouteTrust {
    fn setup_is_trusted(&self, pk: &PeerId) -> bool {
        self.trusted.read().contains(pk)
    }
}
