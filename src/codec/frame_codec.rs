use thiserror::Error;
use tracing::instrument;

use crate::codec::checksum::checksum;
use crate::config::{ConfigSnapshot, SnapshotError};
use crate::protocol::{
    MIDI_DATA_MAX, MessageType, SYSEX_END, SYSEX_START, VendorId, message_metadata,
};

const TYPE_INDEX: usize = 4;
const PAYLOAD_START: usize = 5;
const MIN_FRAME_LEN: usize = 6;

/// Errors returned by frame encoding and decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameCodecError {
    /// Fewer bytes than the smallest possible frame.
    #[error("frame is too short: expected at least 6 bytes, got {actual}")]
    TooShort { actual: usize },
    /// The first byte is not the SysEx start byte.
    #[error("frame does not start with 0xF0 (found {found:#04X})")]
    MissingStart { found: u8 },
    /// The last byte is not the SysEx end byte.
    #[error("frame does not end with 0xF7 (found {found:#04X})")]
    MissingEnd { found: u8 },
    /// The frame belongs to another manufacturer's device.
    #[error("vendor {actual:02X?} does not match {expected}")]
    VendorMismatch { expected: VendorId, actual: [u8; 3] },
    /// The type byte is not a known message type.
    #[error("unknown message type {byte:#04X}")]
    UnknownMessageType { byte: u8 },
    /// A status byte appears between the start and end bytes.
    #[error("status byte {byte:#04X} inside frame at position {position}")]
    EmbeddedStatusByte { position: usize, byte: u8 },
    /// The frame length does not match its message type.
    #[error("{message_type} frame must be {expected} bytes, got {actual}")]
    LengthMismatch {
        message_type: MessageType,
        expected: usize,
        actual: usize,
    },
    /// The trailing checksum does not match the payload.
    #[error("checksum mismatch: frame carries {received:#04X}, payload folds to {computed:#04X}")]
    ChecksumMismatch { received: u8, computed: u8 },
    /// The payload passed framing checks but is not a valid snapshot.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl FrameCodecError {
    /// Whether the frame was addressed to some other device on the bus.
    #[must_use]
    pub const fn is_foreign(&self) -> bool {
        matches!(self, Self::VendorMismatch { .. })
    }
}

/// One decoded protocol message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Frame {
    Config(ConfigSnapshot),
    Ack,
    RequestConfig,
    CalibrationModeOn,
    CalibrationModeOff,
}

impl Frame {
    /// Returns the wire message type of this frame.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Config(_) => MessageType::Config,
            Self::Ack => MessageType::Ack,
            Self::RequestConfig => MessageType::RequestConfig,
            Self::CalibrationModeOn => MessageType::CalibrationModeOn,
            Self::CalibrationModeOff => MessageType::CalibrationModeOff,
        }
    }
}

/// Encodes and decodes SysEx frames for one vendor id.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct FrameCodec {
    vendor: VendorId,
}

impl FrameCodec {
    #[must_use]
    pub const fn new(vendor: VendorId) -> Self {
        Self { vendor }
    }

    /// Vendor id written into and expected on every frame.
    #[must_use]
    pub const fn vendor(&self) -> VendorId {
        self.vendor
    }

    /// Encodes a frame.
    ///
    /// CONFIG frames carry the serialized snapshot followed by its checksum;
    /// every other type is header, type and terminator only.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be serialized.
    ///
    /// ```
    /// use unholy_host::{Frame, FrameCodec};
    ///
    /// let codec = FrameCodec::default();
    /// let frame = codec.encode(&Frame::RequestConfig)?;
    /// assert_eq!(vec![0xF0, 0x7D, 0x55, 0x48, 0x02, 0xF7], frame);
    /// # Ok::<(), unholy_host::FrameCodecError>(())
    /// ```
    #[instrument(skip(self, frame), level = "debug", fields(message_type = %frame.message_type()))]
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, FrameCodecError> {
        let message_type = frame.message_type();
        let metadata = message_metadata(message_type);

        let mut bytes = Vec::with_capacity(metadata.frame_len());
        bytes.push(SYSEX_START);
        bytes.extend_from_slice(&self.vendor.bytes());
        bytes.push(message_type.as_byte());
        if let Frame::Config(snapshot) = frame {
            let payload = snapshot.to_payload()?;
            bytes.extend_from_slice(&payload);
            if metadata.checksummed() {
                bytes.push(checksum(&payload));
            }
        }
        bytes.push(SYSEX_END);
        Ok(bytes)
    }

    /// Decodes and validates a frame.
    ///
    /// Checks run in order: framing bytes, vendor id, type byte, data-byte
    /// range, length for the type, checksum, then snapshot decoding.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails. Nothing is partially decoded.
    ///
    /// ```
    /// use unholy_host::{Frame, FrameCodec};
    ///
    /// let codec = FrameCodec::default();
    /// assert_eq!(Frame::Ack, codec.decode(&[0xF0, 0x7D, 0x55, 0x48, 0x01, 0xF7])?);
    /// assert!(codec.decode(&[0xF0, 0x00, 0x20, 0x29, 0x01, 0xF7]).is_err());
    /// # Ok::<(), unholy_host::FrameCodecError>(())
    /// ```
    #[instrument(skip(self, bytes), level = "debug", fields(len = bytes.len()))]
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, FrameCodecError> {
        let (first, last) = match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) if bytes.len() >= MIN_FRAME_LEN => (*first, *last),
            _ => {
                return Err(FrameCodecError::TooShort {
                    actual: bytes.len(),
                });
            }
        };
        if first != SYSEX_START {
            return Err(FrameCodecError::MissingStart { found: first });
        }
        if last != SYSEX_END {
            return Err(FrameCodecError::MissingEnd { found: last });
        }

        let vendor = [bytes[1], bytes[2], bytes[3]];
        if vendor != self.vendor.bytes() {
            return Err(FrameCodecError::VendorMismatch {
                expected: self.vendor,
                actual: vendor,
            });
        }

        let type_byte = bytes[TYPE_INDEX];
        let message_type = MessageType::try_from(type_byte)
            .map_err(|byte| FrameCodecError::UnknownMessageType { byte })?;

        let body_end = bytes.len() - 1;
        if let Some((offset, byte)) = bytes[PAYLOAD_START..body_end]
            .iter()
            .enumerate()
            .find(|(_, byte)| **byte > MIDI_DATA_MAX)
        {
            return Err(FrameCodecError::EmbeddedStatusByte {
                position: PAYLOAD_START + offset,
                byte: *byte,
            });
        }

        let metadata = message_metadata(message_type);
        if bytes.len() != metadata.frame_len() {
            return Err(FrameCodecError::LengthMismatch {
                message_type,
                expected: metadata.frame_len(),
                actual: bytes.len(),
            });
        }

        let frame = match message_type {
            MessageType::Config => {
                let payload_end = PAYLOAD_START + metadata.payload_len();
                let payload = &bytes[PAYLOAD_START..payload_end];
                if metadata.checksummed() {
                    let received = bytes[payload_end];
                    let computed = checksum(payload);
                    if received != computed {
                        return Err(FrameCodecError::ChecksumMismatch { received, computed });
                    }
                }
                Frame::Config(ConfigSnapshot::from_payload(payload)?)
            }
            MessageType::Ack => Frame::Ack,
            MessageType::RequestConfig => Frame::RequestConfig,
            MessageType::CalibrationModeOn => Frame::CalibrationModeOn,
            MessageType::CalibrationModeOff => Frame::CalibrationModeOff,
        };
        Ok(frame)
    }
}
