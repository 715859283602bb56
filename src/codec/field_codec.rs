use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::MIDI_DATA_MAX;

/// Number of digit bytes used by one encoded calibration value.
pub const DECIMAL_WIDTH: usize = 4;

const MAX_THOUSANDTHS: u16 = 9_999;
const PRECISION_TOLERANCE: f64 = 1e-6;

/// Errors returned by the field codec.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldCodecError {
    /// The scalar cannot be carried in a MIDI data byte.
    #[error("scalar {value} is out of range (0..={max})")]
    ScalarOutOfRange { value: u8, max: u8 },
    /// The decimal lies outside `0.000..=9.999` or is not finite.
    #[error("decimal {value} is out of range (0.000..=9.999)")]
    DecimalOutOfRange { value: f64 },
    /// The decimal has more than three fractional digits.
    #[error("decimal {value} has more than three fractional digits")]
    DecimalTooPrecise { value: f64 },
    /// An encoded decimal contains a byte that is not a single digit.
    #[error("decimal digit byte {digit} at position {position} is not in 0..=9")]
    InvalidDigit { position: usize, digit: u8 },
    /// The byte slice handed to the decimal decoder has the wrong width.
    #[error("decimal field needs 4 bytes, got {actual}")]
    DecimalWidth { actual: usize },
    /// Calibration text could not be parsed.
    #[error("`{text}` must be between 0.000 and 9.999")]
    InvalidDecimalText { text: String },
}

/// A configuration value that fits in one MIDI data byte (`0..=127`).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::Into,
)]
#[serde(try_from = "u8", into = "u8")]
#[display("{_0}")]
pub struct Scalar(u8);

impl Scalar {
    /// Creates a validated scalar.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` is above `127`.
    ///
    /// ```
    /// use unholy_host::Scalar;
    ///
    /// let value = Scalar::new(96)?;
    /// assert_eq!(96, value.value());
    /// assert!(Scalar::new(128).is_err());
    /// # Ok::<(), unholy_host::FieldCodecError>(())
    /// ```
    pub fn new(value: u8) -> Result<Self, FieldCodecError> {
        if value > MIDI_DATA_MAX {
            return Err(FieldCodecError::ScalarOutOfRange {
                value,
                max: MIDI_DATA_MAX,
            });
        }
        Ok(Self(value))
    }

    /// Creates a scalar from a value already known to be a data byte.
    pub(crate) const fn from_data_byte(value: u8) -> Self {
        Self(value & MIDI_DATA_MAX)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Scalar {
    type Error = FieldCodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Encodes a scalar into its wire byte.
///
/// # Errors
///
/// Returns an error when `value` is above `127`.
pub fn encode_scalar(value: u8) -> Result<u8, FieldCodecError> {
    Scalar::new(value).map(Scalar::value)
}

/// Decodes a scalar wire byte.
///
/// # Errors
///
/// Returns an error when `byte` has bit 7 set.
pub fn decode_scalar(byte: u8) -> Result<u8, FieldCodecError> {
    Scalar::new(byte).map(Scalar::value)
}

/// Encodes a boolean as `0` or `1`.
#[must_use]
pub fn encode_boolean(value: bool) -> u8 {
    u8::from(value)
}

/// Decodes a boolean; any nonzero byte is `true`.
#[must_use]
pub fn decode_boolean(byte: u8) -> bool {
    byte != 0
}

/// Calibration voltage with exactly three fractional digits, `0.000..=9.999`.
///
/// Stored as thousandths so that the four-digit wire form round-trips exactly.
#[derive(
    Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct CalibrationValue(u16);

impl CalibrationValue {
    /// Smallest representable calibration value.
    pub const MIN: Self = Self(0);
    /// Largest representable calibration value.
    pub const MAX: Self = Self(MAX_THOUSANDTHS);

    /// Creates a calibration value from thousandths of a volt.
    ///
    /// # Errors
    ///
    /// Returns an error when `thousandths` is above `9999`.
    ///
    /// ```
    /// use unholy_host::CalibrationValue;
    ///
    /// let value = CalibrationValue::from_thousandths(4_877)?;
    /// assert_eq!("4.877", value.to_string());
    /// # Ok::<(), unholy_host::FieldCodecError>(())
    /// ```
    pub fn from_thousandths(thousandths: u16) -> Result<Self, FieldCodecError> {
        if thousandths > MAX_THOUSANDTHS {
            return Err(FieldCodecError::DecimalOutOfRange {
                value: f64::from(thousandths) / 1000.0,
            });
        }
        Ok(Self(thousandths))
    }

    pub(crate) const fn from_thousandths_unchecked(thousandths: u16) -> Self {
        Self(thousandths)
    }

    /// Returns the value in thousandths.
    #[must_use]
    pub const fn thousandths(self) -> u16 {
        self.0
    }

    /// Returns the value as a float.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 1000.0
    }

    /// Returns the four wire digits: integer digit then three fractional digits.
    #[must_use]
    pub const fn digits(self) -> [u8; DECIMAL_WIDTH] {
        let value = self.0;
        [
            (value / 1000) as u8,
            ((value / 100) % 10) as u8,
            ((value / 10) % 10) as u8,
            (value % 10) as u8,
        ]
    }

    /// Rebuilds a value from its four wire digits.
    ///
    /// # Errors
    ///
    /// Returns an error when the slice is not four bytes long or holds a
    /// byte outside `0..=9`.
    pub fn from_digits(digits: &[u8]) -> Result<Self, FieldCodecError> {
        let digits: [u8; DECIMAL_WIDTH] =
            digits
                .try_into()
                .map_err(|_width| FieldCodecError::DecimalWidth {
                    actual: digits.len(),
                })?;

        let mut thousandths = 0u16;
        for (position, digit) in digits.into_iter().enumerate() {
            if digit > 9 {
                return Err(FieldCodecError::InvalidDigit { position, digit });
            }
            thousandths = thousandths * 10 + u16::from(digit);
        }
        Ok(Self(thousandths))
    }
}

impl TryFrom<f64> for CalibrationValue {
    type Error = FieldCodecError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 || value >= 10.0 {
            return Err(FieldCodecError::DecimalOutOfRange { value });
        }

        let scaled = value * 1000.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > PRECISION_TOLERANCE {
            return Err(FieldCodecError::DecimalTooPrecise { value });
        }

        // `rounded` is within 0..=9999 after the range and precision checks.
        let thousandths = rounded as u16;
        Self::from_thousandths(thousandths)
    }
}

impl From<CalibrationValue> for f64 {
    fn from(value: CalibrationValue) -> Self {
        value.as_f64()
    }
}

impl FromStr for CalibrationValue {
    type Err = FieldCodecError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || FieldCodecError::InvalidDecimalText {
            text: text.to_string(),
        };
        let value: f64 = text.trim().parse().map_err(|_parse| invalid())?;
        Self::try_from(value).map_err(|_range| invalid())
    }
}

impl fmt::Display for CalibrationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// Encodes a decimal in `0.000..=9.999` as four digit bytes.
///
/// # Errors
///
/// Returns an error when the value is out of range or carries more than
/// three fractional digits. Values are never clamped or truncated.
///
/// ```
/// use unholy_host::encode_decimal;
///
/// assert_eq!([0, 0, 0, 2], encode_decimal(0.002)?);
/// assert_eq!([4, 8, 7, 7], encode_decimal(4.877)?);
/// assert!(encode_decimal(10.0).is_err());
/// assert!(encode_decimal(1.2345).is_err());
/// # Ok::<(), unholy_host::FieldCodecError>(())
/// ```
pub fn encode_decimal(value: f64) -> Result<[u8; DECIMAL_WIDTH], FieldCodecError> {
    CalibrationValue::try_from(value).map(CalibrationValue::digits)
}

/// Decodes four digit bytes into `d0 + d1*0.1 + d2*0.01 + d3*0.001`.
///
/// # Errors
///
/// Returns an error when the slice is not four bytes or a byte is not a digit.
pub fn decode_decimal(bytes: &[u8]) -> Result<f64, FieldCodecError> {
    CalibrationValue::from_digits(bytes).map(CalibrationValue::as_f64)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn scalar_round_trips_every_data_byte() {
        for value in 0..=MIDI_DATA_MAX {
            let encoded = encode_scalar(value).expect("data byte should encode");
            assert_eq!(value, decode_scalar(encoded).expect("data byte should decode"));
        }
    }

    #[rstest]
    #[case(128)]
    #[case(255)]
    fn scalar_rejects_status_bytes(#[case] value: u8) {
        assert_matches!(
            encode_scalar(value),
            Err(FieldCodecError::ScalarOutOfRange { value: rejected, max: 127 }) if rejected == value
        );
        assert_matches!(decode_scalar(value), Err(FieldCodecError::ScalarOutOfRange { .. }));
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(0x7F, true)]
    fn boolean_decodes_nonzero_as_true(#[case] byte: u8, #[case] expected: bool) {
        assert_eq!(expected, decode_boolean(byte));
    }

    #[test]
    fn boolean_encodes_as_zero_or_one() {
        assert_eq!(0, encode_boolean(false));
        assert_eq!(1, encode_boolean(true));
    }

    #[rstest]
    #[case(0.002, [0, 0, 0, 2])]
    #[case(0.08, [0, 0, 8, 0])]
    #[case(4.877, [4, 8, 7, 7])]
    #[case(5.0, [5, 0, 0, 0])]
    #[case(9.999, [9, 9, 9, 9])]
    fn decimal_encodes_digits(#[case] value: f64, #[case] expected: [u8; 4]) {
        let digits = encode_decimal(value).expect("in-range decimal should encode");
        assert_eq!(expected, digits);
        let decoded = decode_decimal(&digits).expect("digits should decode");
        assert!((decoded - value).abs() < 1e-9, "{decoded} != {value}");
    }

    #[rstest]
    #[case(-0.001)]
    #[case(10.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn decimal_rejects_out_of_range(#[case] value: f64) {
        assert_matches!(
            encode_decimal(value),
            Err(FieldCodecError::DecimalOutOfRange { .. })
        );
    }

    #[test]
    fn decimal_rejects_extra_precision() {
        assert_matches!(
            encode_decimal(1.0005),
            Err(FieldCodecError::DecimalTooPrecise { .. })
        );
    }

    #[test]
    fn decimal_decode_rejects_non_digit_bytes() {
        assert_matches!(
            decode_decimal(&[1, 10, 0, 0]),
            Err(FieldCodecError::InvalidDigit {
                position: 1,
                digit: 10
            })
        );
        assert_matches!(
            decode_decimal(&[1, 2, 3]),
            Err(FieldCodecError::DecimalWidth { actual: 3 })
        );
    }

    #[rstest]
    #[case("4.877", 4_877)]
    #[case(" 0.08 ", 80)]
    #[case("5", 5_000)]
    fn calibration_value_parses_text(#[case] text: &str, #[case] thousandths: u16) {
        let value: CalibrationValue = text.parse().expect("text should parse");
        assert_eq!(thousandths, value.thousandths());
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("10.000")]
    #[case("-1")]
    #[case("1.2345")]
    fn calibration_value_rejects_bad_text(#[case] text: &str) {
        let result = text.parse::<CalibrationValue>();
        assert_matches!(result, Err(FieldCodecError::InvalidDecimalText { .. }));
    }

    #[test]
    fn calibration_value_displays_three_fraction_digits() {
        let value = CalibrationValue::from_thousandths(80).expect("80 thousandths is valid");
        assert_eq!("0.080", value.to_string());
    }
}
