//! Abstract interface to the transport lifecycle engine and the routing-trust oracle.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod transport;

pub use transport::{Label, LogEntry, ManagedTransport, SETUP_LABEL, TransportId, TransportType};

use std::error::Error;
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use tpsetup_overlay::PeerId;

/// The kind of transport engine error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineErrorKind {
    /// No transport with the requested id
    NotFound,

    /// The requested transport type has no network client
    UnknownNetwork,

    /// The engine is shutting down or already closed
    Closed,

    /// Other/unknown error
    Other,
}

impl Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Marker trait for `TransportEngine` errors
pub trait EngineError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> EngineErrorKind;
}

/// Creates, looks up and deletes the transports of the local node.
#[async_trait]
pub trait TransportEngine
where
    Self: Send + Sync + Clone + 'static,
{
    /// The error type for this engine.
    type Error: EngineError;

    /// Public key of the local node; one edge of every managed transport.
    fn local_pk(&self) -> PeerId;

    /// Establish (or return the existing) transport to `remote` over
    /// `transport_type`, tagging it with `label`.
    async fn save_transport(
        &self,
        remote: PeerId,
        transport_type: &TransportType,
        label: Label,
    ) -> Result<ManagedTransport, Self::Error>;

    /// Look up a transport by id. `Ok(None)` if the engine has no such transport.
    async fn transport_by_id(&self, id: TransportId)
    -> Result<Option<ManagedTransport>, Self::Error>;

    /// Tear down a transport. Teardown may continue in the background.
    async fn delete_transport(&self, id: TransportId) -> Result<(), Self::Error>;

    /// Every transport currently carrying `label`.
    async fn transports_by_label(&self, label: Label)
    -> Result<Vec<ManagedTransport>, Self::Error>;
}

/// Routing subsystem's view of which peers belong to the trusted setup group.
pub trait RouteTrust
where
    Self: Send + Sync + Clone + 'static,
{
    /// Whether `pk` is currently trusted for setup purposes.
    fn setup_is_trusted(&self, pk: &PeerId) -> bool;
}
