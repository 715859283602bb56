mod fake_transport;
mod machine;
mod transport;

pub use fake_transport::{FakeDeviceConfig, FakeReply, FakeTransport, SentFrames};
pub use machine::{SessionConfig, SessionError, SessionHandle, UploadStatus, spawn_session};
pub use transport::{
    ConnectionState, DisconnectedTransport, Transport, TransportError, TransportEvent,
};
