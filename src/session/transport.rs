use async_trait::async_trait;
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Link state reported by the transport.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Scanning,
    Open,
    Closed,
}

impl ConnectionState {
    /// Whether upload and download may run.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Something the transport observed on the link.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TransportEvent {
    /// A complete inbound message.
    Received(Vec<u8>),
    /// The link changed state.
    Connection(ConnectionState),
}

/// Errors returned by a transport.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TransportError {
    #[error("no MIDI output is available")]
    Unavailable,
    #[error("fake device could not build its reply: {reason}")]
    FakeReply { reason: String },
}

/// Outbound half of a byte transport.
///
/// Inbound bytes and connection changes arrive separately as
/// [`TransportEvent`]s on the channel handed to the session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one complete message.
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Transport used when no device backend is configured.
///
/// Reports `Disconnected` once and refuses every send.
#[derive(Debug)]
pub struct DisconnectedTransport;

impl DisconnectedTransport {
    /// Creates the transport and its event stream.
    #[must_use]
    pub fn start() -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events, receiver) = mpsc::channel(1);
        let _ = events.try_send(TransportEvent::Connection(ConnectionState::Disconnected));
        (Self, receiver)
    }
}

#[async_trait]
impl Transport for DisconnectedTransport {
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        debug!(len = bytes.len(), "dropping send on disconnected transport");
        Err(TransportError::Unavailable)
    }
}
