use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Serialize, Serializer};
use strum_macros::Display;

use crate::codec::field_codec::DECIMAL_WIDTH;
use crate::config::options::ReferencePitch;
use crate::config::snapshot::SnapshotError;

/// Number of CV outputs.
pub const CV_CHANNELS: usize = 3;
/// Number of voice-priority groups (CV 1+2 and CV 1+2+3).
pub const CV_GROUPS: usize = 2;
/// Number of assignable CC commands.
pub const CC_COMMANDS: usize = 3;
/// Number of clock outputs.
pub const CLOCK_OUTPUTS: usize = 8;
/// Number of reset counters.
pub const RESET_COUNTERS: usize = 3;
/// Number of gate outputs.
pub const GATE_OUTPUTS: usize = 8;

/// Bytes in a serialized configuration snapshot.
pub const CONFIG_PAYLOAD_LEN: usize = 132;

/// Address of one configuration field.
///
/// Indexed variants are zero-based; their wire names are one-based, except the
/// calibration pitch index which the firmware numbers from zero.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum FieldId {
    PolyphonyMode,
    CvSource(usize),
    CvGroupPriority(usize),
    CvScale(usize),
    PitchBendRange,
    CcCommand(usize),
    ClockDivider(usize),
    ResetBeats(usize),
    GateSource(usize),
    GateNote(usize),
    GateInvert(usize),
    Calibration {
        channel: usize,
        pitch: ReferencePitch,
    },
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PolyphonyMode => f.write_str("POLYPHONY_MODE"),
            Self::CvSource(index) => write!(f, "CV_{}_SOURCE", index + 1),
            Self::CvGroupPriority(0) => f.write_str("CV_1_AND_2_MODE"),
            Self::CvGroupPriority(1) => f.write_str("CV_1_AND_2_AND_3_MODE"),
            Self::CvGroupPriority(index) => write!(f, "CV_GROUP_{}_MODE", index + 1),
            Self::CvScale(index) => write!(f, "CV_{}_SCALE", index + 1),
            Self::PitchBendRange => f.write_str("PITCH_BEND_RANGE"),
            Self::CcCommand(index) => write!(f, "CC{}_COMMAND", index + 1),
            Self::ClockDivider(index) => write!(f, "CLOCK_{}_DIVIDER", index + 1),
            Self::ResetBeats(index) => write!(f, "RESET_{}_BEATS", index + 1),
            Self::GateSource(index) => write!(f, "GATE_{}_SOURCE", index + 1),
            Self::GateNote(index) => write!(f, "GATE_{}_NOTE", index + 1),
            Self::GateInvert(index) => write!(f, "GATE_{}_INVERT", index + 1),
            Self::Calibration { channel, pitch } => {
                write!(f, "CAL_{}_{}", channel + 1, pitch.index())
            }
        }
    }
}

impl Serialize for FieldId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for FieldId {
    type Err = SnapshotError;

    /// Parses a wire field name such as `GATE_3_NOTE` or `CAL_2_6`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        FIELDS_BY_NAME
            .get(name.trim().to_ascii_uppercase().as_str())
            .copied()
            .ok_or_else(|| SnapshotError::UnknownField {
                name: name.to_string(),
            })
    }
}

/// Codec used for a field's wire bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    PolyphonyMode,
    CvSource,
    VoicePriority,
    CvScale,
    GateSource,
    Scalar,
    Boolean,
    Decimal,
}

impl FieldKind {
    /// Number of wire bytes this kind occupies.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Decimal => DECIMAL_WIDTH,
            Self::PolyphonyMode
            | Self::CvSource
            | Self::VoicePriority
            | Self::CvScale
            | Self::GateSource
            | Self::Scalar
            | Self::Boolean => 1,
        }
    }
}

/// One row of the ordered field table.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldSpec {
    id: FieldId,
    kind: FieldKind,
    offset: usize,
}

impl FieldSpec {
    #[must_use]
    pub const fn id(self) -> FieldId {
        self.id
    }

    #[must_use]
    pub const fn kind(self) -> FieldKind {
        self.kind
    }

    /// Byte offset of the field inside the payload.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn width(self) -> usize {
        self.kind.width()
    }

    /// Payload byte range covered by this field.
    #[must_use]
    pub const fn range(self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.kind.width()
    }
}

static FIELD_LAYOUT: LazyLock<Vec<FieldSpec>> = LazyLock::new(build_layout);

static FIELDS_BY_NAME: LazyLock<HashMap<String, FieldId>> = LazyLock::new(|| {
    FIELD_LAYOUT
        .iter()
        .map(|spec| (spec.id.to_string(), spec.id))
        .collect()
});

static SPECS_BY_ID: LazyLock<HashMap<FieldId, FieldSpec>> = LazyLock::new(|| {
    FIELD_LAYOUT
        .iter()
        .map(|spec| (spec.id, *spec))
        .collect()
});

/// Returns every field in wire order.
///
/// ```
/// use unholy_host::{FieldId, field_layout};
///
/// let layout = field_layout();
/// assert_eq!(FieldId::PolyphonyMode, layout[0].id());
/// assert_eq!("CAL_3_6", layout[layout.len() - 1].id().to_string());
/// ```
#[must_use]
pub fn field_layout() -> &'static [FieldSpec] {
    &FIELD_LAYOUT
}

/// Looks up the table row for one field, if it exists.
#[must_use]
pub fn field_spec(id: FieldId) -> Option<FieldSpec> {
    SPECS_BY_ID.get(&id).copied()
}

fn build_layout() -> Vec<FieldSpec> {
    let mut fields: Vec<(FieldId, FieldKind)> = Vec::new();

    fields.push((FieldId::PolyphonyMode, FieldKind::PolyphonyMode));
    fields.extend((0..CV_CHANNELS).map(|index| (FieldId::CvSource(index), FieldKind::CvSource)));
    fields.extend(
        (0..CV_GROUPS).map(|index| (FieldId::CvGroupPriority(index), FieldKind::VoicePriority)),
    );
    fields.extend((0..CV_CHANNELS).map(|index| (FieldId::CvScale(index), FieldKind::CvScale)));
    fields.push((FieldId::PitchBendRange, FieldKind::Scalar));
    fields.extend((0..CC_COMMANDS).map(|index| (FieldId::CcCommand(index), FieldKind::Scalar)));
    fields
        .extend((0..CLOCK_OUTPUTS).map(|index| (FieldId::ClockDivider(index), FieldKind::Scalar)));
    fields.extend((0..RESET_COUNTERS).map(|index| (FieldId::ResetBeats(index), FieldKind::Scalar)));
    for gate in 0..GATE_OUTPUTS {
        fields.push((FieldId::GateSource(gate), FieldKind::GateSource));
        fields.push((FieldId::GateNote(gate), FieldKind::Scalar));
        fields.push((FieldId::GateInvert(gate), FieldKind::Boolean));
    }
    for channel in 0..CV_CHANNELS {
        fields.extend(
            ReferencePitch::all()
                .map(|pitch| (FieldId::Calibration { channel, pitch }, FieldKind::Decimal)),
        );
    }

    let mut offset = 0;
    fields
        .into_iter()
        .map(|(id, kind)| {
            let spec = FieldSpec { id, kind, offset };
            offset += kind.width();
            spec
        })
        .collect()
}
