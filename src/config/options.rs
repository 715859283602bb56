use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, FromRepr};

/// Enumerated configuration options carried as a single wire byte.
pub trait WireOption: Copy + Sized {
    /// Returns the wire byte for this option.
    fn to_byte(self) -> u8;

    /// Maps a wire byte back to an option, if it is a known code.
    fn from_byte(byte: u8) -> Option<Self>;
}

macro_rules! wire_option {
    ($name:ident) => {
        impl WireOption for $name {
            fn to_byte(self) -> u8 {
                self as u8
            }

            fn from_byte(byte: u8) -> Option<Self> {
                Self::from_repr(byte)
            }
        }
    };
}

/// How many voices the note allocator drives.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum PolyphonyMode {
    #[default]
    Monophonic = 0,
    Duophonic = 1,
    Triphonic = 2,
}

/// What drives a CV output.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum CvSource {
    #[default]
    Note = 0,
    Velocity = 1,
    Cc1 = 2,
    Cc2 = 3,
    Cc3 = 4,
}

/// Which held note wins when a CV group has more notes than voices.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum VoicePriority {
    Highest = 0,
    Lowest = 1,
    #[default]
    Last = 2,
}

/// Pitch scaling of a CV output.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum CvScale {
    /// Volts per octave.
    #[default]
    #[strum(to_string = "V_OCT")]
    VoltsPerOctave = 0,
    /// Hertz per volt.
    #[strum(to_string = "HZ_V")]
    HertzPerVolt = 1,
}

/// Event that drives a gate output.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum GateSource {
    #[default]
    NoteOnOff = 0,
    Clock1 = 1,
    Clock2 = 2,
    Clock3 = 3,
    Clock4 = 4,
    Clock5 = 5,
    Clock6 = 6,
    Clock7 = 7,
    Clock8 = 8,
    Reset1 = 9,
    Reset2 = 10,
    Reset3 = 11,
    Transport = 12,
    MonophonicOnOff = 13,
    DuophonicOnOffVoice1 = 14,
    DuophonicOnOffVoice2 = 15,
    TriphonicOnOffVoice1 = 16,
    TriphonicOnOffVoice2 = 17,
    TriphonicOnOffVoice3 = 18,
    Cc1HiLow = 19,
    Cc2HiLow = 20,
    Cc3HiLow = 21,
}

wire_option!(PolyphonyMode);
wire_option!(CvSource);
wire_option!(VoicePriority);
wire_option!(CvScale);
wire_option!(GateSource);

/// MIDI notes played for the seven calibration reference pitches.
const REFERENCE_NOTES: [u8; ReferencePitch::COUNT] = [0, 1, 13, 25, 37, 49, 59];

/// One of the seven reference pitches each CV channel is calibrated at.
#[derive(
    Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "usize", into = "usize")]
pub struct ReferencePitch(usize);

impl ReferencePitch {
    /// Number of reference pitches per channel.
    pub const COUNT: usize = 7;

    /// Creates a reference pitch from its zero-based index.
    ///
    /// ```
    /// use unholy_host::ReferencePitch;
    ///
    /// let pitch = ReferencePitch::new(6).expect("index 6 exists");
    /// assert_eq!(59, pitch.midi_note());
    /// assert!(ReferencePitch::new(7).is_none());
    /// ```
    #[must_use]
    pub fn new(index: usize) -> Option<Self> {
        (index < Self::COUNT).then_some(Self(index))
    }

    /// Returns all reference pitches in wire order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }

    /// Returns the zero-based index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns the MIDI note the device expects while measuring this pitch.
    #[must_use]
    pub const fn midi_note(self) -> u8 {
        REFERENCE_NOTES[self.0]
    }
}

impl TryFrom<usize> for ReferencePitch {
    type Error = String;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::new(index).ok_or_else(|| {
            format!(
                "reference pitch {index} is out of range (0..{})",
                Self::COUNT
            )
        })
    }
}

impl From<ReferencePitch> for usize {
    fn from(pitch: ReferencePitch) -> Self {
        pitch.0
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_option_round_trips_through_its_wire_byte() {
        for mode in PolyphonyMode::iter() {
            assert_eq!(Some(mode), PolyphonyMode::from_byte(mode.to_byte()));
        }
        for source in GateSource::iter() {
            assert_eq!(Some(source), GateSource::from_byte(source.to_byte()));
        }
    }

    #[rstest]
    #[case(GateSource::NoteOnOff, 0)]
    #[case(GateSource::Reset1, 9)]
    #[case(GateSource::Transport, 12)]
    #[case(GateSource::Cc3HiLow, 21)]
    fn gate_source_codes_match_firmware(#[case] source: GateSource, #[case] code: u8) {
        assert_eq!(code, source.to_byte());
    }

    #[test]
    fn unknown_codes_do_not_map_to_options() {
        assert_eq!(None, PolyphonyMode::from_byte(3));
        assert_eq!(None, CvScale::from_byte(2));
        assert_eq!(None, GateSource::from_byte(22));
    }

    #[rstest]
    #[case("duophonic", PolyphonyMode::Duophonic)]
    #[case("TRIPHONIC", PolyphonyMode::Triphonic)]
    fn options_parse_from_names(#[case] text: &str, #[case] expected: PolyphonyMode) {
        assert_eq!(Ok(expected), text.parse::<PolyphonyMode>());
    }

    #[test]
    fn cv_scale_uses_short_names() {
        assert_eq!("V_OCT", CvScale::VoltsPerOctave.to_string());
        assert_eq!(Ok(CvScale::HertzPerVolt), "hz_v".parse::<CvScale>());
    }

    #[test]
    fn reference_pitches_map_to_calibration_notes() {
        let notes: Vec<u8> = ReferencePitch::all().map(ReferencePitch::midi_note).collect();
        assert_eq!(vec![0, 1, 13, 25, 37, 49, 59], notes);
    }
}
