pub(crate) mod command;
pub(crate) mod device;
pub(crate) mod frames;
pub(crate) mod ui;

use std::io;

use anyhow::Result;
use serde::Serialize;

pub use self::command::{
    Args, CalibrateAction, CalibrateArgs, Command, DecodeArgs, DownloadArgs, EncodeArgs, FakeArgs,
    FieldEdit, LinkArgs, LogLevel, OutputFormat, UploadArgs,
};

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
