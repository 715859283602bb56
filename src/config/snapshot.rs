use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::codec::field_codec::{
    CalibrationValue, FieldCodecError, Scalar, decode_boolean, encode_boolean,
};
use crate::config::layout::{
    CC_COMMANDS, CLOCK_OUTPUTS, CONFIG_PAYLOAD_LEN, CV_CHANNELS, CV_GROUPS, FieldId, FieldKind,
    GATE_OUTPUTS, RESET_COUNTERS, field_layout, field_spec,
};
use crate::config::options::{
    CvScale, CvSource, GateSource, PolyphonyMode, ReferencePitch, VoicePriority, WireOption,
};

/// Errors raised while reading, editing or (de)serializing a snapshot.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("unknown configuration field `{name}`")]
    UnknownField { name: String },
    #[error("{field} does not exist on this device")]
    FieldOutOfRange { field: FieldId },
    #[error("{field} expects a {expected} value")]
    KindMismatch { field: FieldId, expected: FieldKind },
    #[error("{field} has unknown option code {code}")]
    UnknownOptionCode { field: FieldId, code: u8 },
    #[error("configuration payload must be {expected} bytes, got {actual}")]
    PayloadLength { expected: usize, actual: usize },
    #[error("{field}: {source}")]
    Codec {
        field: FieldId,
        #[source]
        source: FieldCodecError,
    },
    #[error("`{text}` is not a valid {expected} value for {field}")]
    InvalidValue {
        field: FieldId,
        expected: FieldKind,
        text: String,
    },
}

/// A typed value for one configuration field.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    PolyphonyMode(PolyphonyMode),
    CvSource(CvSource),
    VoicePriority(VoicePriority),
    CvScale(CvScale),
    GateSource(GateSource),
    Scalar(Scalar),
    Boolean(bool),
    Decimal(CalibrationValue),
}

impl FieldValue {
    /// Returns the codec kind of this value.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::PolyphonyMode(_) => FieldKind::PolyphonyMode,
            Self::CvSource(_) => FieldKind::CvSource,
            Self::VoicePriority(_) => FieldKind::VoicePriority,
            Self::CvScale(_) => FieldKind::CvScale,
            Self::GateSource(_) => FieldKind::GateSource,
            Self::Scalar(_) => FieldKind::Scalar,
            Self::Boolean(_) => FieldKind::Boolean,
            Self::Decimal(_) => FieldKind::Decimal,
        }
    }

    /// Parses user text into a value suitable for `field`.
    ///
    /// Options accept their names (`DUOPHONIC`, `HZ_V`) or wire codes,
    /// booleans accept `true`/`false`/`1`/`0`, calibration values accept
    /// decimal text with at most three fractional digits.
    ///
    /// # Errors
    ///
    /// Returns an error when `field` does not exist or `text` is not valid
    /// for the field's kind.
    ///
    /// ```
    /// use unholy_host::{FieldId, FieldValue, PolyphonyMode};
    ///
    /// let value = FieldValue::parse(FieldId::PolyphonyMode, "duophonic")?;
    /// assert_eq!(FieldValue::PolyphonyMode(PolyphonyMode::Duophonic), value);
    /// assert!(FieldValue::parse(FieldId::PitchBendRange, "128").is_err());
    /// # Ok::<(), unholy_host::SnapshotError>(())
    /// ```
    pub fn parse(field: FieldId, text: &str) -> Result<Self, SnapshotError> {
        let spec = field_spec(field).ok_or(SnapshotError::FieldOutOfRange { field })?;
        let expected = spec.kind();
        let trimmed = text.trim();
        let invalid = || SnapshotError::InvalidValue {
            field,
            expected,
            text: text.to_string(),
        };

        match expected {
            FieldKind::PolyphonyMode => parse_option(trimmed)
                .map(Self::PolyphonyMode)
                .ok_or_else(invalid),
            FieldKind::CvSource => parse_option(trimmed).map(Self::CvSource).ok_or_else(invalid),
            FieldKind::VoicePriority => parse_option(trimmed)
                .map(Self::VoicePriority)
                .ok_or_else(invalid),
            FieldKind::CvScale => parse_option(trimmed).map(Self::CvScale).ok_or_else(invalid),
            FieldKind::GateSource => parse_option(trimmed)
                .map(Self::GateSource)
                .ok_or_else(invalid),
            FieldKind::Scalar => {
                let raw: u8 = trimmed.parse().map_err(|_parse| invalid())?;
                Scalar::new(raw)
                    .map(Self::Scalar)
                    .map_err(|source| SnapshotError::Codec { field, source })
            }
            FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(Self::Boolean(true)),
                "false" | "off" | "0" => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            FieldKind::Decimal => trimmed
                .parse::<CalibrationValue>()
                .map(Self::Decimal)
                .map_err(|source| SnapshotError::Codec { field, source }),
        }
    }

    fn write_to(self, out: &mut [u8]) {
        match self {
            Self::PolyphonyMode(option) => out[0] = option.to_byte(),
            Self::CvSource(option) => out[0] = option.to_byte(),
            Self::VoicePriority(option) => out[0] = option.to_byte(),
            Self::CvScale(option) => out[0] = option.to_byte(),
            Self::GateSource(option) => out[0] = option.to_byte(),
            Self::Scalar(scalar) => out[0] = scalar.value(),
            Self::Boolean(flag) => out[0] = encode_boolean(flag),
            Self::Decimal(value) => out.copy_from_slice(&value.digits()),
        }
    }

    fn read_from(field: FieldId, kind: FieldKind, bytes: &[u8]) -> Result<Self, SnapshotError> {
        let codec = |source| SnapshotError::Codec { field, source };
        let option = |code: u8| SnapshotError::UnknownOptionCode { field, code };
        let byte = bytes[0];

        Ok(match kind {
            FieldKind::PolyphonyMode => {
                Self::PolyphonyMode(PolyphonyMode::from_byte(byte).ok_or(option(byte))?)
            }
            FieldKind::CvSource => Self::CvSource(CvSource::from_byte(byte).ok_or(option(byte))?),
            FieldKind::VoicePriority => {
                Self::VoicePriority(VoicePriority::from_byte(byte).ok_or(option(byte))?)
            }
            FieldKind::CvScale => Self::CvScale(CvScale::from_byte(byte).ok_or(option(byte))?),
            FieldKind::GateSource => {
                Self::GateSource(GateSource::from_byte(byte).ok_or(option(byte))?)
            }
            FieldKind::Scalar => Self::Scalar(Scalar::new(byte).map_err(codec)?),
            FieldKind::Boolean => Self::Boolean(decode_boolean(byte)),
            FieldKind::Decimal => Self::Decimal(CalibrationValue::from_digits(bytes).map_err(codec)?),
        })
    }
}

/// Parses an option by name, falling back to its numeric wire code.
fn parse_option<T>(text: &str) -> Option<T>
where
    T: WireOption + std::str::FromStr,
{
    text.parse::<T>()
        .ok()
        .or_else(|| text.parse::<u8>().ok().and_then(T::from_byte))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolyphonyMode(option) => fmt::Display::fmt(option, f),
            Self::CvSource(option) => fmt::Display::fmt(option, f),
            Self::VoicePriority(option) => fmt::Display::fmt(option, f),
            Self::CvScale(option) => fmt::Display::fmt(option, f),
            Self::GateSource(option) => fmt::Display::fmt(option, f),
            Self::Scalar(scalar) => fmt::Display::fmt(scalar, f),
            Self::Boolean(flag) => fmt::Display::fmt(flag, f),
            Self::Decimal(value) => fmt::Display::fmt(value, f),
        }
    }
}

/// Settings of one gate output.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GateConfig {
    pub source: GateSource,
    pub note: Scalar,
    pub invert: bool,
}

const fn cal(thousandths: u16) -> CalibrationValue {
    CalibrationValue::from_thousandths_unchecked(thousandths)
}

/// Factory calibration table, per CV channel and reference pitch.
const DEFAULT_CALIBRATION: [[CalibrationValue; ReferencePitch::COUNT]; CV_CHANNELS] = [
    [cal(2), cal(77), cal(1_074), cal(2_066), cal(3_061), cal(4_053), cal(4_877)],
    [cal(1), cal(84), cal(1_071), cal(2_065), cal(3_056), cal(4_047), cal(4_874)],
    [cal(22), cal(80), cal(1_067), cal(2_051), cal(3_037), cal(4_074), cal(5_148)],
];

/// The complete device configuration record.
///
/// Mutation goes through [`ConfigSnapshot::set`]; an inbound record is decoded
/// into a fresh snapshot with [`ConfigSnapshot::from_payload`] and swapped in
/// whole, so a partially applied record is never observable.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    polyphony_mode: PolyphonyMode,
    cv_sources: [CvSource; CV_CHANNELS],
    cv_group_priorities: [VoicePriority; CV_GROUPS],
    cv_scales: [CvScale; CV_CHANNELS],
    pitch_bend_range: Scalar,
    cc_commands: [Scalar; CC_COMMANDS],
    clock_dividers: [Scalar; CLOCK_OUTPUTS],
    reset_beats: [Scalar; RESET_COUNTERS],
    gates: [GateConfig; GATE_OUTPUTS],
    calibration: [[CalibrationValue; ReferencePitch::COUNT]; CV_CHANNELS],
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        let scalars = |values: &[u8]| -> Vec<Scalar> {
            values.iter().map(|value| Scalar::from_data_byte(*value)).collect()
        };
        let mut snapshot = Self {
            polyphony_mode: PolyphonyMode::default(),
            cv_sources: [CvSource::default(); CV_CHANNELS],
            cv_group_priorities: [VoicePriority::default(); CV_GROUPS],
            cv_scales: [CvScale::default(); CV_CHANNELS],
            pitch_bend_range: Scalar::from_data_byte(12),
            cc_commands: [Scalar::default(); CC_COMMANDS],
            clock_dividers: [Scalar::default(); CLOCK_OUTPUTS],
            reset_beats: [Scalar::default(); RESET_COUNTERS],
            gates: [GateConfig::default(); GATE_OUTPUTS],
            calibration: DEFAULT_CALIBRATION,
        };
        snapshot
            .cc_commands
            .copy_from_slice(&scalars(&[7, 10, 11]));
        snapshot
            .clock_dividers
            .copy_from_slice(&scalars(&[3, 6, 12, 24, 48, 96, 96, 96]));
        snapshot.reset_beats.copy_from_slice(&scalars(&[4, 16, 32]));
        snapshot
    }
}

impl ConfigSnapshot {
    /// Current polyphony mode.
    #[must_use]
    pub const fn polyphony_mode(&self) -> PolyphonyMode {
        self.polyphony_mode
    }

    /// Settings of one gate output, if it exists.
    #[must_use]
    pub fn gate(&self, index: usize) -> Option<GateConfig> {
        self.gates.get(index).copied()
    }

    /// Calibration value for one CV channel and reference pitch.
    #[must_use]
    pub fn calibration(&self, channel: usize, pitch: ReferencePitch) -> Option<CalibrationValue> {
        self.calibration
            .get(channel)
            .map(|pitches| pitches[pitch.index()])
    }

    /// Reads one field.
    ///
    /// # Errors
    ///
    /// Returns an error when `field` indexes past the device's outputs.
    ///
    /// ```
    /// use unholy_host::{ConfigSnapshot, FieldId, FieldValue};
    ///
    /// let snapshot = ConfigSnapshot::default();
    /// let value = snapshot.get(FieldId::PitchBendRange)?;
    /// assert_eq!("12", value.to_string());
    /// # Ok::<(), unholy_host::SnapshotError>(())
    /// ```
    pub fn get(&self, field: FieldId) -> Result<FieldValue, SnapshotError> {
        let missing = SnapshotError::FieldOutOfRange { field };
        let value = match field {
            FieldId::PolyphonyMode => FieldValue::PolyphonyMode(self.polyphony_mode),
            FieldId::CvSource(index) => {
                FieldValue::CvSource(*self.cv_sources.get(index).ok_or(missing)?)
            }
            FieldId::CvGroupPriority(index) => {
                FieldValue::VoicePriority(*self.cv_group_priorities.get(index).ok_or(missing)?)
            }
            FieldId::CvScale(index) => {
                FieldValue::CvScale(*self.cv_scales.get(index).ok_or(missing)?)
            }
            FieldId::PitchBendRange => FieldValue::Scalar(self.pitch_bend_range),
            FieldId::CcCommand(index) => {
                FieldValue::Scalar(*self.cc_commands.get(index).ok_or(missing)?)
            }
            FieldId::ClockDivider(index) => {
                FieldValue::Scalar(*self.clock_dividers.get(index).ok_or(missing)?)
            }
            FieldId::ResetBeats(index) => {
                FieldValue::Scalar(*self.reset_beats.get(index).ok_or(missing)?)
            }
            FieldId::GateSource(index) => {
                FieldValue::GateSource(self.gates.get(index).ok_or(missing)?.source)
            }
            FieldId::GateNote(index) => {
                FieldValue::Scalar(self.gates.get(index).ok_or(missing)?.note)
            }
            FieldId::GateInvert(index) => {
                FieldValue::Boolean(self.gates.get(index).ok_or(missing)?.invert)
            }
            FieldId::Calibration { channel, pitch } => FieldValue::Decimal(
                self.calibration.get(channel).ok_or(missing)?[pitch.index()],
            ),
        };
        Ok(value)
    }

    /// Writes one field. This is the only way a snapshot changes in place.
    ///
    /// # Errors
    ///
    /// Returns an error when `field` does not exist or `value` has the wrong
    /// kind for it. The snapshot is unchanged on error.
    ///
    /// ```
    /// use unholy_host::{ConfigSnapshot, FieldId, FieldValue, Scalar};
    ///
    /// let mut snapshot = ConfigSnapshot::default();
    /// snapshot.set(FieldId::GateNote(0), FieldValue::Scalar(Scalar::new(60)?))?;
    /// assert_eq!(60, snapshot.gate(0).map(|gate| gate.note.value()).unwrap_or_default());
    /// assert!(snapshot.set(FieldId::GateNote(0), FieldValue::Boolean(true)).is_err());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn set(&mut self, field: FieldId, value: FieldValue) -> Result<(), SnapshotError> {
        let missing = SnapshotError::FieldOutOfRange { field };
        let expected = field_spec(field).ok_or(missing.clone())?.kind();
        let mismatch = SnapshotError::KindMismatch { field, expected };

        match (field, value) {
            (FieldId::PolyphonyMode, FieldValue::PolyphonyMode(mode)) => {
                self.polyphony_mode = mode;
            }
            (FieldId::CvSource(index), FieldValue::CvSource(source)) => {
                *self.cv_sources.get_mut(index).ok_or(missing)? = source;
            }
            (FieldId::CvGroupPriority(index), FieldValue::VoicePriority(priority)) => {
                *self.cv_group_priorities.get_mut(index).ok_or(missing)? = priority;
            }
            (FieldId::CvScale(index), FieldValue::CvScale(scale)) => {
                *self.cv_scales.get_mut(index).ok_or(missing)? = scale;
            }
            (FieldId::PitchBendRange, FieldValue::Scalar(range)) => {
                self.pitch_bend_range = range;
            }
            (FieldId::CcCommand(index), FieldValue::Scalar(command)) => {
                *self.cc_commands.get_mut(index).ok_or(missing)? = command;
            }
            (FieldId::ClockDivider(index), FieldValue::Scalar(divider)) => {
                *self.clock_dividers.get_mut(index).ok_or(missing)? = divider;
            }
            (FieldId::ResetBeats(index), FieldValue::Scalar(beats)) => {
                *self.reset_beats.get_mut(index).ok_or(missing)? = beats;
            }
            (FieldId::GateSource(index), FieldValue::GateSource(source)) => {
                self.gates.get_mut(index).ok_or(missing)?.source = source;
            }
            (FieldId::GateNote(index), FieldValue::Scalar(note)) => {
                self.gates.get_mut(index).ok_or(missing)?.note = note;
            }
            (FieldId::GateInvert(index), FieldValue::Boolean(invert)) => {
                self.gates.get_mut(index).ok_or(missing)?.invert = invert;
            }
            (FieldId::Calibration { channel, pitch }, FieldValue::Decimal(calibration)) => {
                self.calibration.get_mut(channel).ok_or(missing)?[pitch.index()] = calibration;
            }
            _ => return Err(mismatch),
        }
        Ok(())
    }

    /// Returns a copy with one field changed.
    ///
    /// # Errors
    ///
    /// See [`ConfigSnapshot::set`].
    pub fn with(mut self, field: FieldId, value: FieldValue) -> Result<Self, SnapshotError> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Serializes every field in wire order into the 132-byte payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the field table names a field this snapshot cannot
    /// read; that would be a table/record mismatch.
    #[instrument(skip(self), level = "trace")]
    pub fn to_payload(&self) -> Result<[u8; CONFIG_PAYLOAD_LEN], SnapshotError> {
        let mut payload = [0u8; CONFIG_PAYLOAD_LEN];
        for spec in field_layout() {
            self.get(spec.id())?.write_to(&mut payload[spec.range()]);
        }
        Ok(payload)
    }

    /// Decodes a 132-byte payload into a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error for a wrong-length payload, a status byte in a scalar
    /// field, an unknown option code, or a non-digit calibration byte.
    #[instrument(skip(payload), level = "trace", fields(len = payload.len()))]
    pub fn from_payload(payload: &[u8]) -> Result<Self, SnapshotError> {
        if payload.len() != CONFIG_PAYLOAD_LEN {
            return Err(SnapshotError::PayloadLength {
                expected: CONFIG_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }

        let mut snapshot = Self::default();
        for spec in field_layout() {
            let value = FieldValue::read_from(spec.id(), spec.kind(), &payload[spec.range()])?;
            snapshot.set(spec.id(), value)?;
        }
        Ok(snapshot)
    }

    /// Iterates every field with its current value, in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, FieldValue)> + '_ {
        field_layout()
            .iter()
            .filter_map(|spec| self.get(spec.id()).ok().map(|value| (spec.id(), value)))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::codec::checksum::checksum;

    fn pitch(index: usize) -> ReferencePitch {
        ReferencePitch::new(index).expect("reference pitch index should exist")
    }

    fn scalar(value: u8) -> FieldValue {
        FieldValue::Scalar(Scalar::new(value).expect("test scalar should be a data byte"))
    }

    #[test]
    fn defaults_match_factory_settings() {
        let snapshot = ConfigSnapshot::default();
        let payload = snapshot.to_payload().expect("defaults should serialize");

        assert_eq!(
            [0, 0, 0, 0, 2, 2, 0, 0, 0, 12, 7, 10, 11],
            payload[..13]
        );
        assert_eq!([3, 6, 12, 24, 48, 96, 96, 96], payload[13..21]);
        assert_eq!([4, 16, 32], payload[21..24]);
        assert!(payload[24..48].iter().all(|byte| *byte == 0));
        assert_eq!([0, 0, 0, 2], payload[48..52]);
        assert_eq!([5, 1, 4, 8], payload[128..132]);
    }

    #[test]
    fn duophonic_scenario_payload_layout() {
        let snapshot = ConfigSnapshot::default()
            .with(
                FieldId::PolyphonyMode,
                FieldValue::PolyphonyMode(PolyphonyMode::Duophonic),
            )
            .expect("polyphony mode should be settable");

        let payload = snapshot.to_payload().expect("snapshot should serialize");

        assert_eq!(CONFIG_PAYLOAD_LEN, payload.len());
        assert_eq!([1, 0], payload[..2]);
        assert_eq!(12, payload[9]);
        assert_eq!([0, 0, 0, 2], payload[48..52]);
        let folded = payload.iter().fold(0x7F, |acc, byte| acc ^ byte);
        assert_eq!(folded, checksum(&payload));
    }

    #[test]
    fn payload_round_trips_edited_snapshot() {
        let snapshot = ConfigSnapshot::default()
            .with(FieldId::CvScale(2), FieldValue::CvScale(CvScale::HertzPerVolt))
            .and_then(|s| s.with(FieldId::GateSource(7), FieldValue::GateSource(GateSource::Cc3HiLow)))
            .and_then(|s| s.with(FieldId::GateNote(3), scalar(127)))
            .and_then(|s| s.with(FieldId::GateInvert(5), FieldValue::Boolean(true)))
            .and_then(|s| {
                s.with(
                    FieldId::Calibration {
                        channel: 1,
                        pitch: pitch(4),
                    },
                    FieldValue::Decimal(
                        CalibrationValue::from_thousandths(9_999).expect("9.999 is valid"),
                    ),
                )
            })
            .expect("edits should apply");

        let payload = snapshot.to_payload().expect("snapshot should serialize");
        let decoded = ConfigSnapshot::from_payload(&payload).expect("payload should decode");

        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn set_rejects_wrong_kind_and_leaves_snapshot_untouched() {
        let mut snapshot = ConfigSnapshot::default();
        let before = snapshot.clone();

        let result = snapshot.set(FieldId::PitchBendRange, FieldValue::Boolean(true));

        assert_matches!(
            result,
            Err(SnapshotError::KindMismatch {
                field: FieldId::PitchBendRange,
                expected: FieldKind::Scalar
            })
        );
        assert_eq!(before, snapshot);
    }

    #[rstest]
    #[case(FieldId::CvSource(3))]
    #[case(FieldId::GateNote(8))]
    #[case(FieldId::Calibration { channel: 3, pitch: ReferencePitch::default() })]
    fn out_of_range_fields_are_rejected(#[case] field: FieldId) {
        let snapshot = ConfigSnapshot::default();
        assert_matches!(
            snapshot.get(field),
            Err(SnapshotError::FieldOutOfRange { field: rejected }) if rejected == field
        );
    }

    #[test]
    fn from_payload_rejects_wrong_length() {
        assert_matches!(
            ConfigSnapshot::from_payload(&[0; 131]),
            Err(SnapshotError::PayloadLength {
                expected: 132,
                actual: 131
            })
        );
    }

    #[test]
    fn from_payload_rejects_unknown_option_codes() {
        let mut payload = ConfigSnapshot::default()
            .to_payload()
            .expect("defaults should serialize");
        payload[0] = 3;

        assert_matches!(
            ConfigSnapshot::from_payload(&payload),
            Err(SnapshotError::UnknownOptionCode {
                field: FieldId::PolyphonyMode,
                code: 3
            })
        );
    }

    #[test]
    fn from_payload_rejects_status_bytes_in_scalars() {
        let mut payload = ConfigSnapshot::default()
            .to_payload()
            .expect("defaults should serialize");
        payload[9] = 0x80;

        assert_matches!(
            ConfigSnapshot::from_payload(&payload),
            Err(SnapshotError::Codec {
                field: FieldId::PitchBendRange,
                source: FieldCodecError::ScalarOutOfRange { .. }
            })
        );
    }

    #[test]
    fn from_payload_rejects_non_digit_calibration_bytes() {
        let mut payload = ConfigSnapshot::default()
            .to_payload()
            .expect("defaults should serialize");
        payload[50] = 10;

        assert_matches!(
            ConfigSnapshot::from_payload(&payload),
            Err(SnapshotError::Codec {
                source: FieldCodecError::InvalidDigit { .. },
                ..
            })
        );
    }

    #[rstest]
    #[case(FieldId::PolyphonyMode, "triphonic", "TRIPHONIC")]
    #[case(FieldId::PolyphonyMode, "1", "DUOPHONIC")]
    #[case(FieldId::CvScale(0), "hz_v", "HZ_V")]
    #[case(FieldId::GateSource(0), "CLOCK4", "CLOCK4")]
    #[case(FieldId::GateInvert(0), "on", "true")]
    #[case(FieldId::ClockDivider(2), "24", "24")]
    #[case(FieldId::Calibration { channel: 0, pitch: ReferencePitch::default() }, "0.08", "0.080")]
    fn values_parse_from_text(#[case] field: FieldId, #[case] text: &str, #[case] shown: &str) {
        let value = FieldValue::parse(field, text).expect("text should parse");
        assert_eq!(shown, value.to_string());
    }

    #[rstest]
    #[case(FieldId::PolyphonyMode, "quadraphonic")]
    #[case(FieldId::GateInvert(0), "maybe")]
    #[case(FieldId::PitchBendRange, "twelve")]
    fn invalid_text_is_rejected(#[case] field: FieldId, #[case] text: &str) {
        assert_matches!(
            FieldValue::parse(field, text),
            Err(SnapshotError::InvalidValue { .. })
        );
    }

    #[test]
    fn out_of_range_text_reports_codec_error() {
        assert_matches!(
            FieldValue::parse(FieldId::PitchBendRange, "200"),
            Err(SnapshotError::Codec {
                source: FieldCodecError::ScalarOutOfRange { value: 200, .. },
                ..
            })
        );
        assert_matches!(
            FieldValue::parse(
                FieldId::Calibration {
                    channel: 2,
                    pitch: pitch(6)
                },
                "10.5"
            ),
            Err(SnapshotError::Codec {
                source: FieldCodecError::InvalidDecimalText { .. },
                ..
            })
        );
    }

    #[test]
    fn fields_iterates_in_wire_order() {
        let snapshot = ConfigSnapshot::default();
        let names: Vec<String> = snapshot
            .fields()
            .take(3)
            .map(|(field, _value)| field.to_string())
            .collect();
        assert_eq!(vec!["POLYPHONY_MODE", "CV_1_SOURCE", "CV_2_SOURCE"], names);
        assert_eq!(69, snapshot.fields().count());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let json = serde_json::to_value(ConfigSnapshot::default()).expect("snapshot should serialize");
        assert_eq!("monophonic", json["polyphony_mode"]);
        assert_eq!(12, json["pitch_bend_range"]);
        assert_eq!(0.002, json["calibration"][0][0]);
    }
}
