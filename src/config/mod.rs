mod layout;
mod options;
mod snapshot;

pub use layout::{
    CC_COMMANDS, CLOCK_OUTPUTS, CONFIG_PAYLOAD_LEN, CV_CHANNELS, CV_GROUPS, FieldId, FieldKind,
    FieldSpec, GATE_OUTPUTS, RESET_COUNTERS, field_layout, field_spec,
};
pub use options::{
    CvScale, CvSource, GateSource, PolyphonyMode, ReferencePitch, VoicePriority, WireOption,
};
pub use snapshot::{ConfigSnapshot, FieldValue, GateConfig, SnapshotError};
