use derive_more::From;
use thiserror::Error;

use crate::codec::{FieldCodecError, FrameCodecError};
use crate::config::SnapshotError;
use crate::protocol::MessageType;
use crate::session::{SessionError, TransportError};

/// Errors returned when parsing fake device fixtures and hex input.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("hex payload length must be even")]
    InvalidHexLength,
    #[error("hex payload contains invalid byte `{value}`")]
    InvalidHexByte { value: String },
    #[error("fake reply `{value}` must be `ack`, `ack:<duration>`, `silent` or `foreign`")]
    InvalidReply { value: String },
    #[error("vendor id `{value}` must be three hex data bytes, e.g. `7D5548`")]
    InvalidVendor { value: String },
    #[error("edit `{value}` must look like FIELD=VALUE")]
    InvalidEdit { value: String },
}

/// Errors returned when validating runtime options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("--fake-reply, --fake-config and --fake-connect-delay require --fake")]
    FakeOptionsWithoutFake,
    #[error("--fake-config must be a CONFIG frame, got {message_type}")]
    FakeConfigFrame { message_type: MessageType },
    #[error("device configuration was not received within {waited}")]
    DownloadTimedOut { waited: humantime::FormattedDuration },
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level protocol errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(FieldCodecError, Box<FieldCodecError>)]
    FieldCodec(Box<FieldCodecError>),
    #[error(transparent)]
    #[from(FrameCodecError, Box<FrameCodecError>)]
    FrameCodec(Box<FrameCodecError>),
    #[error(transparent)]
    #[from(SnapshotError, Box<SnapshotError>)]
    Snapshot(Box<SnapshotError>),
    #[error(transparent)]
    #[from(SessionError, Box<SessionError>)]
    Session(Box<SessionError>),
    #[error(transparent)]
    #[from(TransportError, Box<TransportError>)]
    Transport(Box<TransportError>),
    #[error(transparent)]
    #[from(FixtureError, Box<FixtureError>)]
    Fixture(Box<FixtureError>),
}
