use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info};

use super::transport::{ConnectionState, Transport, TransportError, TransportEvent};
use crate::codec::{Frame, FrameCodec};
use crate::config::ConfigSnapshot;
use crate::error::FixtureError;
use crate::protocol::VendorId;

const EVENT_CAPACITY: usize = 32;
const FOREIGN_VENDOR: [u8; 3] = [0x00, 0x20, 0x29];

/// How the fake device answers an uploaded configuration.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum FakeReply {
    /// Acknowledge immediately.
    #[default]
    Ack,
    /// Acknowledge after a delay.
    AckAfter(Duration),
    /// Never answer.
    Silent,
    /// Answer with an ACK carrying another vendor's id.
    Foreign,
}

impl FromStr for FakeReply {
    type Err = FixtureError;

    /// Parses `ack`, `ack:<duration>`, `silent` or `foreign`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        match value.split_once(':') {
            Some(("ack", delay)) => humantime::parse_duration(delay.trim())
                .map(Self::AckAfter)
                .map_err(|_parse| FixtureError::InvalidReply {
                    value: value.to_string(),
                }),
            None if value == "ack" => Ok(Self::Ack),
            None if value == "silent" => Ok(Self::Silent),
            None if value == "foreign" => Ok(Self::Foreign),
            _ => Err(FixtureError::InvalidReply {
                value: value.to_string(),
            }),
        }
    }
}

/// Settings for a scripted fake device.
#[derive(Debug, Clone, Builder)]
pub struct FakeDeviceConfig {
    #[builder(default)]
    vendor: VendorId,
    /// Configuration the device reports when asked.
    #[builder(default)]
    snapshot: ConfigSnapshot,
    #[builder(default)]
    reply: FakeReply,
    /// Delay before the link opens; `None` keeps the device scanning forever.
    connect_after: Option<Duration>,
}

/// Shared log of every message handed to the fake transport.
#[derive(Debug, Clone, Default)]
pub struct SentFrames {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SentFrames {
    /// Returns a copy of every message sent so far, oldest first.
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of messages sent so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, bytes: &[u8]) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes.to_vec());
    }
}

/// In-memory transport that plays the device side of the protocol.
///
/// REQUEST_CONFIG is answered with the configured snapshot and CONFIG with
/// the configured [`FakeReply`]. Tests can inject arbitrary events through
/// [`FakeTransport::injector`].
#[derive(Debug)]
pub struct FakeTransport {
    codec: FrameCodec,
    snapshot: ConfigSnapshot,
    reply: FakeReply,
    events: mpsc::Sender<TransportEvent>,
    sent: SentFrames,
}

impl FakeTransport {
    /// Creates the transport and its event stream, and starts the link.
    #[must_use]
    pub fn start(config: FakeDeviceConfig) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CAPACITY);
        let FakeDeviceConfig {
            vendor,
            snapshot,
            reply,
            connect_after,
        } = config;

        let _ = events.try_send(TransportEvent::Connection(ConnectionState::Scanning));
        if let Some(delay) = connect_after {
            let link = events.clone();
            tokio::spawn(async move {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                info!("fake device connected");
                let _ = link
                    .send(TransportEvent::Connection(ConnectionState::Open))
                    .await;
            });
        }

        let transport = Self {
            codec: FrameCodec::new(vendor),
            snapshot,
            reply,
            events,
            sent: SentFrames::default(),
        };
        (transport, receiver)
    }

    /// Returns the shared log of sent messages.
    #[must_use]
    pub fn sent(&self) -> SentFrames {
        self.sent.clone()
    }

    /// Returns a sender for injecting transport events by hand.
    #[must_use]
    pub fn injector(&self) -> mpsc::Sender<TransportEvent> {
        self.events.clone()
    }

    fn respond(&self, frame: &Frame) -> Result<(), TransportError> {
        let (response, delay) = match (frame, self.reply) {
            (Frame::RequestConfig, _) => (
                self.encode(&Frame::Config(self.snapshot.clone()))?,
                Duration::ZERO,
            ),
            (Frame::Config(_), FakeReply::Ack) => (self.encode(&Frame::Ack)?, Duration::ZERO),
            (Frame::Config(_), FakeReply::AckAfter(delay)) => (self.encode(&Frame::Ack)?, delay),
            (Frame::Config(_), FakeReply::Foreign) => {
                let mut ack = self.encode(&Frame::Ack)?;
                ack[1..4].copy_from_slice(&FOREIGN_VENDOR);
                (ack, Duration::ZERO)
            }
            (Frame::Config(_), FakeReply::Silent)
            | (
                Frame::Ack | Frame::CalibrationModeOn | Frame::CalibrationModeOff,
                _,
            ) => return Ok(()),
        };

        let events = self.events.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let _ = events.send(TransportEvent::Received(response)).await;
        });
        Ok(())
    }

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, TransportError> {
        self.codec
            .encode(frame)
            .map_err(|source| TransportError::FakeReply {
                reason: source.to_string(),
            })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sent.push(bytes);
        match self.codec.decode(bytes) {
            Ok(frame) => {
                debug!(message_type = %frame.message_type(), "fake device received frame");
                self.respond(&frame)
            }
            Err(_) => {
                debug!(len = bytes.len(), "fake device received non-SysEx message");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("ack", FakeReply::Ack)]
    #[case("ack:1500ms", FakeReply::AckAfter(Duration::from_millis(1500)))]
    #[case(" silent ", FakeReply::Silent)]
    #[case("foreign", FakeReply::Foreign)]
    fn reply_fixture_parses(#[case] text: &str, #[case] expected: FakeReply) {
        assert_eq!(Ok(expected), text.parse::<FakeReply>().map_err(|e| e.to_string()));
    }

    #[rstest]
    #[case("nack")]
    #[case("ack:soon")]
    fn reply_fixture_rejects_unknown_values(#[case] text: &str) {
        assert_matches!(
            text.parse::<FakeReply>(),
            Err(FixtureError::InvalidReply { .. })
        );
    }

    #[tokio::test]
    async fn request_config_is_answered_with_snapshot() {
        let config = FakeDeviceConfig::builder()
            .connect_after(Duration::ZERO)
            .build();
        let (transport, mut events) = FakeTransport::start(config);
        let codec = FrameCodec::default();

        assert_eq!(
            Some(TransportEvent::Connection(ConnectionState::Scanning)),
            events.recv().await
        );
        assert_eq!(
            Some(TransportEvent::Connection(ConnectionState::Open)),
            events.recv().await
        );

        let request = codec
            .encode(&Frame::RequestConfig)
            .expect("request should encode");
        transport
            .send(&request)
            .await
            .expect("fake send should succeed");

        let Some(TransportEvent::Received(reply)) = events.recv().await else {
            panic!("fake device should answer with a frame");
        };
        assert_eq!(
            Frame::Config(ConfigSnapshot::default()),
            codec.decode(&reply).expect("reply should decode")
        );
        assert_eq!(vec![request], transport.sent().frames());
    }

    #[tokio::test]
    async fn foreign_reply_carries_other_vendor() {
        let config = FakeDeviceConfig::builder().reply(FakeReply::Foreign).build();
        let (transport, mut events) = FakeTransport::start(config);
        let codec = FrameCodec::default();
        let _scanning = events.recv().await;

        let upload = codec
            .encode(&Frame::Config(ConfigSnapshot::default()))
            .expect("config should encode");
        transport
            .send(&upload)
            .await
            .expect("fake send should succeed");

        let Some(TransportEvent::Received(reply)) = events.recv().await else {
            panic!("fake device should answer with a frame");
        };
        assert_eq!(vec![0xF0, 0x00, 0x20, 0x29, 0x01, 0xF7], reply);
    }
}
