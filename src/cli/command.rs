use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::config::{ConfigSnapshot, FieldId, FieldValue, ReferencePitch};
use crate::error::{CliConfigError, FixtureError, ProtocolError};
use crate::protocol::VendorId;
use crate::session::{FakeDeviceConfig, FakeReply};
use crate::utils::parse_hex;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_DOWNLOAD_WAIT: Duration = Duration::from_secs(2);

/// Command-line options for the MIDI-to-CV configuration tool.
#[derive(Debug, Parser)]
#[command(
    name = "unholy-host",
    about = "Read, edit and upload MIDI-to-CV interface settings over SysEx."
)]
pub struct Args {
    /// Log verbosity; overrides `RUST_LOG`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to pretty on a terminal and JSON otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Manufacturer id as three hex data bytes (e.g. `7D5548`).
    #[arg(long, global = true)]
    vendor: Option<VendorArg>,
    /// Uses a scripted fake device instead of a MIDI port.
    #[arg(long, global = true)]
    fake: bool,
    /// How the fake device answers uploads: `ack`, `ack:<duration>`, `silent` or `foreign`.
    #[arg(long, global = true)]
    fake_reply: Option<FakeReply>,
    /// Configuration the fake device reports, as a hex CONFIG frame.
    #[arg(long, global = true)]
    fake_config: Option<HexFrame>,
    /// Delay before the fake device connects (e.g. `250ms`, `2s`).
    #[arg(long, global = true, value_parser = parse_duration)]
    fake_connect_delay: Option<Duration>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use unholy_host::{Args, Command, DownloadArgs};
    ///
    /// let args = Args::new(Command::Download(DownloadArgs::default()));
    /// let _ = args;
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            log_level: None,
            output: None,
            vendor: None,
            fake: false,
            fake_reply: None,
            fake_config: None,
            fake_connect_delay: None,
            command,
        }
    }

    /// Enables fake device mode with pre-parsed settings.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        let FakeArgs {
            reply,
            config,
            connect_delay,
        } = fake;

        self.fake = true;
        self.fake_reply = Some(reply);
        self.fake_config = config;
        self.fake_connect_delay = Some(connect_delay);
        self
    }

    /// Returns the requested log-level override.
    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Returns the requested output format, if any.
    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Returns the vendor id frames are addressed with.
    #[must_use]
    pub fn vendor(&self) -> VendorId {
        self.vendor.map(VendorId::from).unwrap_or_default()
    }

    /// Splits parsed CLI arguments into command and optional fake-device settings.
    ///
    /// # Errors
    ///
    /// Returns an error if fake-device options are given without `--fake`.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_reply,
            fake_config,
            fake_connect_delay,
            command,
            ..
        } = self;

        let fake_args = if fake {
            Some(FakeArgs {
                reply: fake_reply.unwrap_or_default(),
                config: fake_config,
                connect_delay: fake_connect_delay.unwrap_or(Duration::ZERO),
            })
        } else {
            if fake_reply.is_some() || fake_config.is_some() || fake_connect_delay.is_some() {
                return Err(CliConfigError::FakeOptionsWithoutFake.into());
            }
            None
        };

        Ok((command, fake_args))
    }
}

/// Log verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Converts to the tracing filter level.
    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Vendor id parsed from hex.
#[derive(Debug, Clone, Copy, derive_more::Into)]
pub struct VendorArg(VendorId);

impl FromStr for VendorArg {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || FixtureError::InvalidVendor {
            value: value.to_string(),
        };
        let bytes: [u8; 3] = parse_hex(value)
            .map_err(|_hex| invalid())?
            .try_into()
            .map_err(|_len| invalid())?;
        VendorId::new(bytes).map(Self).ok_or_else(invalid)
    }
}

/// A complete SysEx frame given as hex.
#[derive(Debug, Clone, derive_more::Into)]
pub struct HexFrame(Vec<u8>);

impl FromStr for HexFrame {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_hex(value).map(Self)
    }
}

/// One `FIELD=VALUE` edit, e.g. `POLYPHONY_MODE=DUOPHONIC` or `CAL_1_0=0.002`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldEdit {
    field: FieldId,
    value: FieldValue,
}

impl FieldEdit {
    #[must_use]
    pub fn field(&self) -> FieldId {
        self.field
    }

    #[must_use]
    pub fn value(&self) -> FieldValue {
        self.value
    }
}

impl FromStr for FieldEdit {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let Some((name, raw_value)) = text.split_once('=') else {
            return Err(FixtureError::InvalidEdit {
                value: text.to_string(),
            }
            .into());
        };
        let field: FieldId = name.parse()?;
        let value = FieldValue::parse(field, raw_value)?;
        Ok(Self { field, value })
    }
}

/// Applies edits in order to a snapshot.
///
/// # Errors
///
/// Returns the first edit that does not apply.
pub fn apply_edits(
    snapshot: ConfigSnapshot,
    edits: &[FieldEdit],
) -> Result<ConfigSnapshot, ProtocolError> {
    edits.iter().try_fold(snapshot, |snapshot, edit| {
        snapshot
            .with(edit.field, edit.value)
            .map_err(ProtocolError::from)
    })
}

/// Fake device arguments for programmatic runs.
#[derive(Debug, Clone, Builder)]
pub struct FakeArgs {
    #[builder(default, with = |value: &str| -> Result<_, FixtureError> { value.parse() })]
    reply: FakeReply,
    #[builder(with = |value: &str| -> Result<_, FixtureError> { value.parse() })]
    config: Option<HexFrame>,
    #[builder(default)]
    connect_delay: Duration,
}

impl FakeArgs {
    /// Builds the fake device configuration, reporting `snapshot` when asked.
    pub(crate) fn into_device_config(
        self,
        vendor: VendorId,
        snapshot: ConfigSnapshot,
    ) -> FakeDeviceConfig {
        FakeDeviceConfig::builder()
            .vendor(vendor)
            .snapshot(snapshot)
            .reply(self.reply)
            .connect_after(self.connect_delay)
            .build()
    }

    /// Returns the raw CONFIG frame the fake device should report, if one was given.
    pub(crate) fn config_frame(&self) -> Option<&[u8]> {
        self.config.as_ref().map(|frame| frame.0.as_slice())
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Request the device configuration and print it.
    Download(DownloadArgs),
    /// Upload a configuration and wait for the device to acknowledge it.
    Upload(UploadArgs),
    /// Toggle calibration mode or play a calibration reference pitch.
    Calibrate(CalibrateArgs),
    /// Print the CONFIG frame for the default configuration plus edits.
    Encode(EncodeArgs),
    /// Decode one SysEx frame given as hex.
    Decode(DecodeArgs),
}

/// Timing shared by commands that talk to a device.
#[derive(Debug, Clone, Copy, ClapArgs)]
pub struct LinkArgs {
    /// How long to wait for the device link to open.
    #[arg(long, value_parser = parse_duration, default_value = "3s")]
    connect_timeout: Duration,
}

impl Default for LinkArgs {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl LinkArgs {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

/// Arguments for `download`.
#[derive(Debug, Clone, ClapArgs)]
pub struct DownloadArgs {
    #[command(flatten)]
    link: LinkArgs,
    /// How long to wait for the configuration after requesting it.
    #[arg(long, value_parser = parse_duration, default_value = "2s")]
    wait: Duration,
}

impl Default for DownloadArgs {
    fn default() -> Self {
        Self {
            link: LinkArgs::default(),
            wait: DEFAULT_DOWNLOAD_WAIT,
        }
    }
}

impl DownloadArgs {
    #[must_use]
    pub fn link(&self) -> LinkArgs {
        self.link
    }

    #[must_use]
    pub fn wait(&self) -> Duration {
        self.wait
    }
}

/// Arguments for `upload`.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct UploadArgs {
    #[command(flatten)]
    link: LinkArgs,
    /// Start from the device's current configuration instead of defaults.
    #[arg(long)]
    from_device: bool,
    /// Field edits applied before upload, e.g. `PITCH_BEND_RANGE=2`.
    edits: Vec<FieldEdit>,
}

impl UploadArgs {
    /// Creates upload arguments.
    ///
    /// ```
    /// use unholy_host::UploadArgs;
    ///
    /// let args = UploadArgs::new(vec!["GATE_1_INVERT=on".parse()?], false);
    /// assert_eq!(1, args.edits().len());
    /// # Ok::<(), unholy_host::ProtocolError>(())
    /// ```
    #[must_use]
    pub fn new(edits: Vec<FieldEdit>, from_device: bool) -> Self {
        Self {
            link: LinkArgs::default(),
            from_device,
            edits,
        }
    }

    #[must_use]
    pub fn link(&self) -> LinkArgs {
        self.link
    }

    #[must_use]
    pub fn from_device(&self) -> bool {
        self.from_device
    }

    #[must_use]
    pub fn edits(&self) -> &[FieldEdit] {
        &self.edits
    }
}

/// Arguments for `calibrate`.
#[derive(Debug, Clone, ClapArgs)]
pub struct CalibrateArgs {
    #[command(subcommand)]
    action: CalibrateAction,
}

impl CalibrateArgs {
    #[must_use]
    pub fn new(action: CalibrateAction) -> Self {
        Self { action }
    }

    #[must_use]
    pub fn action(&self) -> CalibrateAction {
        self.action
    }
}

/// Calibration step to perform.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CalibrateAction {
    /// Put the device into calibration mode.
    On,
    /// Leave calibration mode.
    Off,
    /// Play one of the seven reference pitches (0..=6).
    Pitch {
        #[arg(value_parser = parse_reference_pitch)]
        index: ReferencePitch,
    },
}

/// Arguments for `encode`.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct EncodeArgs {
    /// Field edits applied to the default configuration.
    edits: Vec<FieldEdit>,
}

impl EncodeArgs {
    #[must_use]
    pub fn new(edits: Vec<FieldEdit>) -> Self {
        Self { edits }
    }

    #[must_use]
    pub fn edits(&self) -> &[FieldEdit] {
        &self.edits
    }
}

/// Arguments for `decode`.
#[derive(Debug, Clone, ClapArgs)]
pub struct DecodeArgs {
    /// Frame bytes as hex, e.g. `F0 7D 55 48 01 F7`.
    frame: HexFrame,
}

impl DecodeArgs {
    /// Creates decode arguments from hex text.
    ///
    /// # Errors
    ///
    /// Returns an error when `hex` is not valid hex.
    pub fn new(hex: &str) -> Result<Self, FixtureError> {
        Ok(Self { frame: hex.parse()? })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.frame.0
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

fn parse_reference_pitch(value: &str) -> Result<ReferencePitch, String> {
    let index = value.parse::<usize>().map_err(|error| error.to_string())?;
    ReferencePitch::try_from(index)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::error::ErrorKind;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::PolyphonyMode;

    #[test]
    fn fake_options_require_fake_mode() {
        let args = Args::try_parse_from(["unholy-host", "--fake-reply", "silent", "download"])
            .expect("flags should parse before validation");

        let error = args
            .into_command_and_fake_args()
            .expect_err("fake options without --fake should be rejected");
        assert_eq!(
            "--fake-reply, --fake-config and --fake-connect-delay require --fake",
            error.to_string()
        );
    }

    #[test]
    fn fake_mode_builds_fake_settings() {
        let args = Args::try_parse_from([
            "unholy-host",
            "--fake",
            "--fake-reply",
            "ack:1500ms",
            "--fake-connect-delay",
            "250ms",
            "upload",
        ])
        .expect("valid fake arguments should parse");

        let (command, fake_args) = args
            .into_command_and_fake_args()
            .expect("valid fake arguments should resolve");
        assert_matches!(command, Command::Upload(_));
        let fake_args = fake_args.expect("fake mode should produce fake settings");
        assert_eq!(FakeReply::AckAfter(Duration::from_millis(1500)), fake_args.reply);
        assert_eq!(Duration::from_millis(250), fake_args.connect_delay);
    }

    #[test]
    fn invalid_fake_reply_fails_argument_parsing() {
        let error = Args::try_parse_from(["unholy-host", "--fake", "--fake-reply", "nack", "download"])
            .expect_err("unknown reply should be rejected");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }

    #[test]
    fn upload_collects_field_edits() {
        let args = Args::try_parse_from([
            "unholy-host",
            "upload",
            "POLYPHONY_MODE=duophonic",
            "CAL_1_0=0.5",
        ])
        .expect("edits should parse");

        let Command::Upload(upload) = args.command else {
            panic!("expected upload command");
        };
        assert_eq!(2, upload.edits().len());
        assert_eq!(FieldId::PolyphonyMode, upload.edits()[0].field());
    }

    #[test]
    fn edits_apply_in_order() {
        let edits: Vec<FieldEdit> = ["POLYPHONY_MODE=1", "POLYPHONY_MODE=TRIPHONIC"]
            .into_iter()
            .map(|text| text.parse().expect("edit should parse"))
            .collect();

        let snapshot =
            apply_edits(ConfigSnapshot::default(), &edits).expect("edits should apply");

        assert_eq!(PolyphonyMode::Triphonic, snapshot.polyphony_mode());
    }

    #[test]
    fn edit_without_equals_is_rejected() {
        assert_matches!(
            "POLYPHONY_MODE".parse::<FieldEdit>(),
            Err(ProtocolError::Fixture(_))
        );
        assert_matches!(
            "NOT_A_FIELD=1".parse::<FieldEdit>(),
            Err(ProtocolError::Snapshot(_))
        );
    }

    #[test]
    fn vendor_argument_parses_hex_triplet() {
        let args = Args::try_parse_from(["unholy-host", "--vendor", "00 21 7D", "encode"])
            .expect("vendor should parse");
        assert_eq!([0x00, 0x21, 0x7D], args.vendor().bytes());

        let error = Args::try_parse_from(["unholy-host", "--vendor", "F0217D", "encode"])
            .expect_err("status byte in vendor should be rejected");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }

    #[test]
    fn calibrate_pitch_rejects_out_of_range_index() {
        let error = Args::try_parse_from(["unholy-host", "calibrate", "pitch", "7"])
            .expect_err("pitch 7 does not exist");
        assert_eq!(ErrorKind::ValueValidation, error.kind());
    }
}
