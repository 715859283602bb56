mod app;
mod cli;
mod codec;
mod config;
mod error;
mod protocol;
mod session;
mod telemetry;
mod utils;

pub use app::{
    DeviceBackend, RunOptions, disconnected_backend, fake_backend, run, run_with_options,
};
pub use cli::{
    Args, CalibrateAction, CalibrateArgs, Command, DecodeArgs, DownloadArgs, EncodeArgs, FakeArgs,
    FieldEdit, LinkArgs, LogLevel, OutputFormat, UploadArgs,
};
pub use codec::{
    CHECKSUM_SEED, CalibrationValue, DECIMAL_WIDTH, FieldCodecError, Frame, FrameCodec,
    FrameCodecError, Scalar, checksum, decode_boolean, decode_decimal, decode_scalar,
    encode_boolean, encode_decimal, encode_scalar,
};
pub use config::{
    CC_COMMANDS, CLOCK_OUTPUTS, CONFIG_PAYLOAD_LEN, CV_CHANNELS, CV_GROUPS, ConfigSnapshot,
    CvScale, CvSource, FieldId, FieldKind, FieldSpec, FieldValue, GATE_OUTPUTS, GateConfig,
    GateSource, PolyphonyMode, RESET_COUNTERS, ReferencePitch, SnapshotError, VoicePriority,
    WireOption, field_layout, field_spec,
};
pub use error::{FixtureError, ProtocolError};
pub use protocol::{MIDI_DATA_MAX, MessageType, SYSEX_END, SYSEX_START, VendorId};
pub use session::{
    ConnectionState, DisconnectedTransport, FakeDeviceConfig, FakeReply, FakeTransport,
    SentFrames, SessionConfig, SessionError, SessionHandle, Transport, TransportError,
    TransportEvent, UploadStatus, spawn_session,
};
