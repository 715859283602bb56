use std::io::{self, IsTerminal};

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::cli::command::{DecodeArgs, EncodeArgs, apply_edits};
use crate::cli::ui::{FrameView, Painter, SnapshotView};
use crate::cli::{OutputFormat, write_json_line};
use crate::codec::{Frame, FrameCodec};
use crate::config::ConfigSnapshot;
use crate::protocol::{MessageType, VendorId};
use crate::utils::format_hex;

/// JSON result emitted by an offline frame command.
#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum FrameResult<'a> {
    Encode {
        message_type: MessageType,
        len: usize,
        hex: &'a str,
    },
    Decode {
        message_type: MessageType,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<&'a ConfigSnapshot>,
    },
}

/// Executes the `encode` command.
#[instrument(skip(args, out), level = "info", fields(edits = args.edits().len(), %vendor, ?output_format))]
pub(crate) fn encode<W>(
    args: &EncodeArgs,
    vendor: VendorId,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let snapshot = apply_edits(ConfigSnapshot::default(), args.edits())?;
    let frame = Frame::Config(snapshot);
    let bytes = FrameCodec::new(vendor).encode(&frame)?;
    let hex = format_hex(&bytes);

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(io::stdout().is_terminal());
            let title = frame.message_type().to_string();
            writeln!(out, "{}", FrameView::new(&title, &hex, bytes.len(), &painter))?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &FrameResult::Encode {
                    message_type: frame.message_type(),
                    len: bytes.len(),
                    hex: &hex,
                },
            )?;
        }
    }
    Ok(())
}

/// Executes the `decode` command.
#[instrument(skip(args, out), level = "info", fields(len = args.bytes().len(), %vendor, ?output_format))]
pub(crate) fn decode<W>(
    args: &DecodeArgs,
    vendor: VendorId,
    out: &mut W,
    output_format: OutputFormat,
) -> Result<()>
where
    W: io::Write,
{
    let frame = FrameCodec::new(vendor).decode(args.bytes())?;
    let snapshot = match &frame {
        Frame::Config(snapshot) => Some(snapshot),
        _ => None,
    };

    match output_format {
        OutputFormat::Pretty => {
            let painter = Painter::new(io::stdout().is_terminal());
            writeln!(
                out,
                "{} {}",
                painter.heading(frame.message_type().to_string()),
                painter.muted(format!("({} bytes)", args.bytes().len()))
            )?;
            if let Some(snapshot) = snapshot {
                writeln!(out, "{}", SnapshotView::new(snapshot, &painter))?;
            }
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &FrameResult::Decode {
                    message_type: frame.message_type(),
                    snapshot,
                },
            )?;
        }
    }
    Ok(())
}
