use crate::error::FixtureError;

/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    bytes
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses hex text, ignoring whitespace and an optional `0x` prefix per byte group.
pub(crate) fn parse_hex(raw_value: &str) -> Result<Vec<u8>, FixtureError> {
    let cleaned: String = raw_value
        .split_whitespace()
        .map(|group| group.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if !cleaned.len().is_multiple_of(2) {
        return Err(FixtureError::InvalidHexLength);
    }
    hex::decode(&cleaned).map_err(|error| FixtureError::InvalidHexByte {
        value: match error {
            hex::FromHexError::InvalidHexCharacter { c, .. } => c.to_string(),
            other => other.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn format_hex_handles_empty_payload() {
        assert_eq!("<empty>", format_hex(&[]));
    }

    #[test]
    fn format_hex_formats_uppercase_pairs() {
        assert_eq!("F0 7D 55 48 01 F7", format_hex(&[0xF0, 0x7D, 0x55, 0x48, 0x01, 0xF7]));
    }

    #[test]
    fn parse_hex_accepts_spaced_and_prefixed_bytes() {
        assert_eq!(
            vec![0xF0, 0x7D, 0x55, 0x48, 0x01, 0xF7],
            parse_hex("F0 7d 0x55 48 01F7").expect("hex should parse")
        );
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        assert_matches!(parse_hex("F0 7"), Err(FixtureError::InvalidHexLength));
    }

    #[test]
    fn parse_hex_rejects_invalid_digit() {
        assert_matches!(
            parse_hex("F0 ZZ"),
            Err(FixtureError::InvalidHexByte { value }) if value == "Z"
        );
    }
}
