/// Seed value of the rolling checksum.
pub const CHECKSUM_SEED: u8 = 0x7F;

/// Folds `payload` into a single checksum byte by XOR, starting from `0x7F`.
///
/// Only the field payload is covered; framing bytes are never included. With
/// every payload byte in `0..=127` the result is itself a data byte.
///
/// ```
/// use unholy_host::checksum;
///
/// assert_eq!(0x7F, checksum(&[]));
/// assert_eq!(0x7F ^ 0x01 ^ 0x02, checksum(&[0x01, 0x02]));
/// ```
#[must_use]
pub fn checksum(payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(CHECKSUM_SEED, |accumulator, byte| accumulator ^ byte)
}
