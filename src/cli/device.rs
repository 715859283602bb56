use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{Span, debug, info, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::cli::command::{
    CalibrateAction, CalibrateArgs, DownloadArgs, LinkArgs, UploadArgs, apply_edits,
};
use crate::cli::ui::{Painter, SnapshotView};
use crate::cli::{OutputFormat, write_json_line};
use crate::config::ConfigSnapshot;
use crate::error::CliConfigError;
use crate::session::{ConnectionState, SessionError, SessionHandle, UploadStatus};

/// JSON result emitted by a command that talks to the device.
#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum DeviceResult<'a> {
    Download {
        snapshot: &'a ConfigSnapshot,
    },
    Upload {
        status: UploadStatus,
        fields_edited: usize,
    },
    CalibrationMode {
        enabled: bool,
    },
    CalibrationPitch {
        index: usize,
        note: u8,
    },
}

/// Waits until the link opens or is known to be gone.
///
/// Returns the last observed state; callers let the session reject
/// operations that need an open link.
#[instrument(skip(session), level = "info", fields(timeout = %humantime::format_duration(link.connect_timeout())))]
async fn await_link(session: &SessionHandle, link: LinkArgs) -> ConnectionState {
    let span = Span::current();
    span.pb_set_message("Waiting for the MIDI link");

    let mut connection = session.connection();
    let settled = timeout(
        link.connect_timeout(),
        connection.wait_for(|state| matches!(state, ConnectionState::Open | ConnectionState::Closed)),
    )
    .await
    .map(|waited| waited.map(|state| *state));
    match settled {
        Ok(Ok(state)) => {
            debug!(%state, "link settled");
            state
        }
        Ok(Err(_closed)) => {
            debug!("session stopped while waiting for the link");
            ConnectionState::Closed
        }
        Err(_elapsed) => {
            let state = *connection.borrow();
            debug!(%state, "link did not settle in time");
            state
        }
    }
}

/// Requests the device configuration and waits for it to arrive.
async fn fetch_snapshot(session: &SessionHandle, wait: Duration) -> Result<ConfigSnapshot> {
    let mut snapshot = session.snapshot();
    snapshot.mark_unchanged();
    session.download().await?;

    match timeout(wait, snapshot.changed()).await {
        Ok(Ok(())) => Ok(snapshot.borrow_and_update().clone()),
        Ok(Err(_closed)) => Err(SessionError::SessionClosed.into()),
        Err(_elapsed) => Err(CliConfigError::DownloadTimedOut {
            waited: humantime::format_duration(wait),
        }
        .into()),
    }
}

/// Executes the `download` command.
#[instrument(skip(session, args, out), level = "info", fields(?output_format))]
pub(crate) async fn download<W>(
    session: &SessionHandle,
    args: &DownloadArgs,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    await_link(session, args.link()).await;
    Span::current().pb_set_message("Downloading configuration");
    let snapshot = fetch_snapshot(session, args.wait()).await?;
    info!("configuration downloaded");

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour());
            writeln!(out, "{}", painter.heading("Device configuration"))?;
            writeln!(out, "{}", SnapshotView::new(&snapshot, &painter))?;
        }
        OutputFormat::Json => {
            write_json_line(out, &DeviceResult::Download { snapshot: &snapshot })?;
        }
    }
    Ok(())
}

/// Executes the `upload` command.
#[instrument(
    skip(session, args, out),
    level = "info",
    fields(edits = args.edits().len(), from_device = args.from_device(), ?output_format)
)]
pub(crate) async fn upload<W>(
    session: &SessionHandle,
    args: &UploadArgs,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    await_link(session, args.link()).await;

    let base = if args.from_device() {
        Span::current().pb_set_message("Downloading configuration");
        fetch_snapshot(session, DownloadArgs::default().wait()).await?
    } else {
        ConfigSnapshot::default()
    };
    let snapshot = apply_edits(base, args.edits())?;
    session.replace_snapshot(snapshot).await?;

    let span = Span::current();
    span.pb_set_message(UploadStatus::Pending.message().unwrap_or_default());
    let result = session.upload().await;
    let status = *session.upload_status().borrow();
    span.pb_set_finish_message(&Painter::new(use_colour()).upload_status(status));
    result?;

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(use_colour());
            writeln!(
                out,
                "{} {}",
                painter.upload_status(status),
                painter.muted(format!("({} fields edited)", args.edits().len()))
            )?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &DeviceResult::Upload {
                    status,
                    fields_edited: args.edits().len(),
                },
            )?;
        }
    }
    Ok(())
}

/// Executes the `calibrate` command.
#[instrument(skip(session, args, out), level = "info", fields(action = ?args.action(), ?output_format))]
pub(crate) async fn calibrate<W>(
    session: &SessionHandle,
    args: &CalibrateArgs,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    await_link(session, LinkArgs::default()).await;
    let painter = Painter::new(use_colour());

    let result = match args.action() {
        CalibrateAction::On | CalibrateAction::Off => {
            let enabled = matches!(args.action(), CalibrateAction::On);
            session.set_calibration_mode(enabled).await?;
            if output_format == OutputFormat::Pretty {
                let state = if enabled { "on" } else { "off" };
                writeln!(out, "Calibration mode: {}", painter.value(state))?;
            }
            DeviceResult::CalibrationMode { enabled }
        }
        CalibrateAction::Pitch { index } => {
            session.trigger_calibration_pitch(index).await?;
            if output_format == OutputFormat::Pretty {
                writeln!(
                    out,
                    "Playing reference pitch {} {}",
                    painter.value(index.index().to_string()),
                    painter.muted(format!("(MIDI note {})", index.midi_note()))
                )?;
            }
            DeviceResult::CalibrationPitch {
                index: index.index(),
                note: index.midi_note(),
            }
        }
    };

    if output_format == OutputFormat::Json {
        write_json_line(out, &result)?;
    }
    Ok(())
}

fn use_colour() -> bool {
    io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::session::{
        DisconnectedTransport, FakeDeviceConfig, FakeTransport, SessionConfig, spawn_session,
    };

    fn link(connect_timeout: &str) -> LinkArgs {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            link: LinkArgs,
        }

        Wrapper::try_parse_from(["link", "--connect-timeout", connect_timeout])
            .expect("timeout should parse")
            .link
    }

    #[tokio::test]
    async fn await_link_reports_closed_without_a_device() {
        let (transport, events) = DisconnectedTransport::start();
        let (session, _task) = spawn_session(SessionConfig::default(), Box::new(transport), events);

        assert_eq!(
            ConnectionState::Closed,
            await_link(&session, LinkArgs::default()).await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn await_link_gives_up_on_a_link_that_never_opens() {
        let (transport, events) = FakeTransport::start(FakeDeviceConfig::builder().build());
        let (session, _task) = spawn_session(SessionConfig::default(), Box::new(transport), events);
        let start = tokio::time::Instant::now();

        let state = await_link(&session, link("500ms")).await;

        assert_eq!(ConnectionState::Scanning, state);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn await_link_returns_once_the_fake_connects() {
        let fake = FakeDeviceConfig::builder()
            .connect_after(Duration::from_millis(250))
            .build();
        let (transport, events) = FakeTransport::start(fake);
        let (session, _task) = spawn_session(SessionConfig::default(), Box::new(transport), events);

        assert_eq!(
            ConnectionState::Open,
            await_link(&session, LinkArgs::default()).await
        );
    }
}
