use std::io::{self, IsTerminal};

use anyhow::Result;
use bon::Builder;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::cli::{Command, FakeArgs, LogLevel, OutputFormat};
use crate::codec::{Frame, FrameCodec};
use crate::config::ConfigSnapshot;
use crate::error::CliConfigError;
use crate::protocol::VendorId;
use crate::session::{
    DisconnectedTransport, FakeTransport, SessionConfig, Transport, TransportEvent, spawn_session,
};
use crate::telemetry;

/// Where device commands send their frames.
#[derive(Debug)]
pub struct DeviceBackend {
    kind: BackendKind,
}

#[derive(Debug)]
enum BackendKind {
    Fake(FakeArgs),
    Disconnected,
}

/// Creates a backend that plays the device with a scripted fake.
#[must_use]
pub fn fake_backend(fake_args: FakeArgs) -> DeviceBackend {
    DeviceBackend {
        kind: BackendKind::Fake(fake_args),
    }
}

/// Creates a backend with no device behind it.
///
/// Device commands report that no device is connected.
#[must_use]
pub fn disconnected_backend() -> DeviceBackend {
    DeviceBackend {
        kind: BackendKind::Disconnected,
    }
}

impl DeviceBackend {
    fn open(self, vendor: VendorId) -> Result<(Box<dyn Transport>, mpsc::Receiver<TransportEvent>)> {
        match self.kind {
            BackendKind::Fake(fake_args) => {
                let snapshot = match fake_args.config_frame() {
                    Some(bytes) => device_snapshot(vendor, bytes)?,
                    None => ConfigSnapshot::default(),
                };
                let (transport, events) =
                    FakeTransport::start(fake_args.into_device_config(vendor, snapshot));
                Ok((Box::new(transport), events))
            }
            BackendKind::Disconnected => {
                let (transport, events) = DisconnectedTransport::start();
                Ok((Box::new(transport), events))
            }
        }
    }
}

fn device_snapshot(vendor: VendorId, bytes: &[u8]) -> Result<ConfigSnapshot> {
    match FrameCodec::new(vendor).decode(bytes)? {
        Frame::Config(snapshot) => Ok(snapshot),
        other => Err(CliConfigError::FakeConfigFrame {
            message_type: other.message_type(),
        }
        .into()),
    }
}

/// Settings for one CLI run.
#[derive(Debug, Clone, Copy, Builder)]
pub struct RunOptions {
    log_level: Option<LogLevel>,
    #[builder(default = OutputFormat::Json)]
    output_format: OutputFormat,
    #[builder(default)]
    vendor: VendorId,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Runs a CLI command with default options.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = unholy_host::Args::try_parse_from(["unholy-host", "--fake", "download"])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let backend = match maybe_fake_args {
///     Some(fake_args) => unholy_host::fake_backend(fake_args),
///     None => unholy_host::disconnected_backend(),
/// };
/// let mut out = Vec::new();
/// unholy_host::run(command, &mut out, backend).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the device interaction
/// fails, or output writing fails.
pub async fn run<W>(command: Command, out: &mut W, backend: DeviceBackend) -> Result<()>
where
    W: io::Write,
{
    run_with_options(command, out, backend, RunOptions::default()).await
}

/// Runs a CLI command with explicit telemetry, output and addressing settings.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
/// use unholy_host::{OutputFormat, RunOptions};
///
/// let args = unholy_host::Args::try_parse_from([
///     "unholy-host",
///     "--log-level",
///     "debug",
///     "encode",
///     "PITCH_BEND_RANGE=2",
/// ])?;
/// let options = RunOptions::builder()
///     .maybe_log_level(args.log_level())
///     .output_format(OutputFormat::Json)
///     .vendor(args.vendor())
///     .build();
/// let (command, _) = args.into_command_and_fake_args()?;
/// let mut out = Vec::new();
/// unholy_host::run_with_options(command, &mut out, unholy_host::disconnected_backend(), options)
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, the device interaction
/// fails, or output writing fails.
#[instrument(
    skip(out, backend),
    level = "info",
    fields(command = %command_name(&command), log_level = ?options.log_level)
)]
pub async fn run_with_options<W>(
    command: Command,
    out: &mut W,
    backend: DeviceBackend,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    telemetry::initialise_tracing(
        env!("CARGO_PKG_NAME"),
        io::stderr().is_terminal(),
        options.log_level.map(LogLevel::as_level_filter),
    )?;

    let RunOptions {
        output_format,
        vendor,
        ..
    } = options;

    match command {
        Command::Encode(args) => crate::cli::frames::encode(&args, vendor, out, output_format),
        Command::Decode(args) => crate::cli::frames::decode(&args, vendor, out, output_format),
        device_command => run_device_command(device_command, out, backend, vendor, output_format).await,
    }
}

async fn run_device_command<W>(
    command: Command,
    out: &mut W,
    backend: DeviceBackend,
    vendor: VendorId,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let (transport, events) = backend.open(vendor)?;
    let config = SessionConfig::builder()
        .vendor(vendor)
        .auto_sync(false)
        .build();
    let (session, task) = spawn_session(config, transport, events);

    let result = match &command {
        Command::Download(args) => {
            crate::cli::device::download(&session, args, out, output_format).await
        }
        Command::Upload(args) => crate::cli::device::upload(&session, args, out, output_format).await,
        Command::Calibrate(args) => {
            crate::cli::device::calibrate(&session, args, out, output_format).await
        }
        Command::Encode(_) | Command::Decode(_) => Ok(()),
    };

    drop(session);
    if let Err(error) = task.await {
        debug!(%error, "session task did not shut down cleanly");
    }
    result
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Download(_args) => "download",
        Command::Upload(_args) => "upload",
        Command::Calibrate(_args) => "calibrate",
        Command::Encode(_args) => "encode",
        Command::Decode(_args) => "decode",
    }
}
