use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::config::CONFIG_PAYLOAD_LEN;

/// SysEx start-of-frame byte.
pub const SYSEX_START: u8 = 0xF0;
/// SysEx end-of-frame byte.
pub const SYSEX_END: u8 = 0xF7;
/// Largest value a MIDI data byte may carry.
pub const MIDI_DATA_MAX: u8 = 0x7F;

/// Three-byte manufacturer identifier carried after the SysEx start byte.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, derive_more::Into)]
pub struct VendorId([u8; 3]);

impl VendorId {
    /// Vendor triplet used by the MIDI-to-CV interface firmware.
    pub const DEFAULT: Self = Self([0x7D, 0x55, 0x48]);

    /// Creates a vendor id, rejecting bytes that would collide with status bytes.
    ///
    /// ```
    /// use unholy_host::VendorId;
    ///
    /// let vendor = VendorId::new([0x00, 0x21, 0x7D]).expect("data bytes are valid");
    /// assert_eq!([0x00, 0x21, 0x7D], vendor.bytes());
    /// assert!(VendorId::new([0x80, 0x00, 0x00]).is_none());
    /// ```
    #[must_use]
    pub fn new(bytes: [u8; 3]) -> Option<Self> {
        bytes
            .iter()
            .all(|byte| *byte <= MIDI_DATA_MAX)
            .then_some(Self(bytes))
    }

    /// Returns the raw vendor bytes.
    #[must_use]
    pub const fn bytes(self) -> [u8; 3] {
        self.0
    }
}

impl Default for VendorId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [first, second, third] = self.0;
        write!(f, "{first:02X} {second:02X} {third:02X}")
    }
}

/// Message types exchanged with the device.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Full configuration record, host to device or device to host.
    #[strum(to_string = "config")]
    Config,
    /// Device acknowledgement of an uploaded configuration.
    #[strum(to_string = "ack")]
    Ack,
    /// Host request for the device's current configuration.
    #[strum(to_string = "request_config")]
    RequestConfig,
    /// Enter calibration mode.
    #[strum(to_string = "cal_mode_on")]
    #[serde(rename = "cal_mode_on")]
    CalibrationModeOn,
    /// Leave calibration mode.
    #[strum(to_string = "cal_mode_off")]
    #[serde(rename = "cal_mode_off")]
    CalibrationModeOff,
}

impl MessageType {
    /// Returns the type byte written after the vendor id.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Config => 0x00,
            Self::Ack => 0x01,
            Self::RequestConfig => 0x02,
            Self::CalibrationModeOn => 0x03,
            Self::CalibrationModeOff => 0x04,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::iter()
            .find(|message_type| message_type.as_byte() == value)
            .ok_or(value)
    }
}

/// Wire shape of one message type.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct MessageMetadata {
    payload_len: usize,
    checksummed: bool,
}

impl MessageMetadata {
    /// Number of payload bytes between the type byte and the checksum/terminator.
    pub(crate) fn payload_len(self) -> usize {
        self.payload_len
    }

    /// Whether a checksum byte follows the payload.
    pub(crate) fn checksummed(self) -> bool {
        self.checksummed
    }

    /// Total frame length including start, vendor, type, checksum and end bytes.
    pub(crate) fn frame_len(self) -> usize {
        FRAME_OVERHEAD + self.payload_len + usize::from(self.checksummed)
    }
}

/// Start byte, three vendor bytes, type byte and end byte.
pub(crate) const FRAME_OVERHEAD: usize = 6;

/// Message metadata keyed by typed message ids.
pub(crate) static MESSAGES_BY_TYPE: LazyLock<HashMap<MessageType, MessageMetadata>> =
    LazyLock::new(|| {
        MessageType::iter()
            .map(|message_type| (message_type, metadata_for(message_type)))
            .collect()
    });

/// Returns the wire metadata for one message type.
pub(crate) fn message_metadata(message_type: MessageType) -> MessageMetadata {
    *MESSAGES_BY_TYPE
        .get(&message_type)
        .unwrap_or(&metadata_for(message_type))
}

fn metadata_for(message_type: MessageType) -> MessageMetadata {
    match message_type {
        MessageType::Config => MessageMetadata {
            payload_len: CONFIG_PAYLOAD_LEN,
            checksummed: true,
        },
        MessageType::Ack
        | MessageType::RequestConfig
        | MessageType::CalibrationModeOn
        | MessageType::CalibrationModeOff => MessageMetadata {
            payload_len: 0,
            checksummed: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MessageType::Config, 0x00)]
    #[case(MessageType::Ack, 0x01)]
    #[case(MessageType::RequestConfig, 0x02)]
    #[case(MessageType::CalibrationModeOn, 0x03)]
    #[case(MessageType::CalibrationModeOff, 0x04)]
    fn message_type_bytes_round_trip(#[case] message_type: MessageType, #[case] byte: u8) {
        assert_eq!(byte, message_type.as_byte());
        assert_eq!(Ok(message_type), MessageType::try_from(byte));
    }

    #[test]
    fn unknown_type_byte_is_returned_as_error() {
        assert_eq!(Err(0x05), MessageType::try_from(0x05));
    }

    #[test]
    fn config_frame_len_includes_payload_and_checksum() {
        let metadata = message_metadata(MessageType::Config);
        assert_eq!(132, metadata.payload_len());
        assert_eq!(139, metadata.frame_len());

        let ack = message_metadata(MessageType::Ack);
        assert_eq!(6, ack.frame_len());
        assert!(!ack.checksummed());
    }

    #[test]
    fn vendor_display_is_hex_triplet() {
        assert_eq!("7D 55 48", VendorId::DEFAULT.to_string());
    }
}
