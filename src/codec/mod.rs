pub(crate) mod checksum;
pub(crate) mod field_codec;
mod frame_codec;

pub use checksum::{CHECKSUM_SEED, checksum};
pub use field_codec::{
    CalibrationValue, DECIMAL_WIDTH, FieldCodecError, Scalar, decode_boolean, decode_decimal,
    decode_scalar, encode_boolean, encode_decimal, encode_scalar,
};
pub use frame_codec::{Frame, FrameCodec, FrameCodecError};
