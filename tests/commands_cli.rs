use clap::Parser;
use clap::error::ErrorKind;
use pretty_assertions::assert_eq;
use serde_json::Value;
use unholy_host::{
    Args, Command, ConfigSnapshot, DecodeArgs, EncodeArgs, FakeArgs, Frame, FrameCodec,
    OutputFormat, RunOptions, UploadArgs,
};

async fn run_with_parsed_args(args: Args, output_format: OutputFormat) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let options = RunOptions::builder()
        .maybe_log_level(args.log_level())
        .output_format(output_format)
        .vendor(args.vendor())
        .build();
    let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
    let backend = match maybe_fake_args {
        Some(fake_args) => unholy_host::fake_backend(fake_args),
        None => unholy_host::disconnected_backend(),
    };
    unholy_host::run_with_options(command, &mut output, backend, options).await?;
    Ok(String::from_utf8(output)?)
}

async fn run_json<const N: usize>(argv: [&str; N]) -> anyhow::Result<Value> {
    let stdout = run_with_parsed_args(Args::try_parse_from(argv)?, OutputFormat::Json).await?;
    Ok(serde_json::from_str(&stdout)?)
}

fn config_hex(snapshot: &ConfigSnapshot) -> String {
    FrameCodec::default()
        .encode(&Frame::Config(snapshot.clone()))
        .expect("CONFIG should encode")
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

#[tokio::test]
async fn encode_prints_config_frame_with_edits() -> anyhow::Result<()> {
    let json = run_json(["unholy-host", "encode", "POLYPHONY_MODE=DUOPHONIC"]).await?;

    assert_eq!("encode", json["action"]);
    assert_eq!("config", json["message_type"]);
    assert_eq!(139, json["len"]);
    let hex = json["hex"].as_str().expect("hex should be a string");
    assert!(hex.starts_with("F0 7D 55 48 00 01 "), "unexpected frame: {hex}");
    assert!(hex.ends_with(" F7"));

    Ok(())
}

#[tokio::test]
async fn encode_honours_vendor_override() -> anyhow::Result<()> {
    let json = run_json(["unholy-host", "--vendor", "00217D", "encode"]).await?;

    let hex = json["hex"].as_str().expect("hex should be a string");
    assert!(hex.starts_with("F0 00 21 7D 00 "), "unexpected frame: {hex}");

    Ok(())
}

#[tokio::test]
async fn decode_reports_control_frame_type() -> anyhow::Result<()> {
    let json = run_json(["unholy-host", "decode", "F0 7D 55 48 03 F7"]).await?;

    assert_eq!("decode", json["action"]);
    assert_eq!("cal_mode_on", json["message_type"]);
    assert!(json.get("snapshot").is_none());

    Ok(())
}

#[tokio::test]
async fn decode_pretty_lists_config_fields() -> anyhow::Result<()> {
    let hex = config_hex(&ConfigSnapshot::default());
    let args = Args::new(Command::Decode(DecodeArgs::new(&hex)?));

    let stdout = run_with_parsed_args(args, OutputFormat::Pretty).await?;

    assert!(stdout.contains("config"));
    assert!(stdout.contains("POLYPHONY_MODE"));
    assert!(stdout.contains("CAL_3_6"));
    assert!(stdout.contains("5.148"));

    Ok(())
}

#[tokio::test]
async fn decode_rejects_bad_checksum() -> anyhow::Result<()> {
    let mut bytes = FrameCodec::default().encode(&Frame::Config(ConfigSnapshot::default()))?;
    let checksum_at = bytes.len() - 2;
    bytes[checksum_at] ^= 0x01;
    let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
    let args = Args::new(Command::Decode(DecodeArgs::new(&hex)?));

    let error = run_with_parsed_args(args, OutputFormat::Json)
        .await
        .expect_err("corrupt frame should be rejected");
    assert!(error.to_string().contains("checksum"), "{error}");

    Ok(())
}

#[tokio::test]
async fn upload_succeeds_against_acknowledging_fake() -> anyhow::Result<()> {
    let json = run_json([
        "unholy-host",
        "--fake",
        "upload",
        "PITCH_BEND_RANGE=2",
        "GATE_1_INVERT=on",
    ])
    .await?;

    assert_eq!("upload", json["action"]);
    assert_eq!("succeeded", json["status"]);
    assert_eq!(2, json["fields_edited"]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn upload_times_out_against_silent_fake() -> anyhow::Result<()> {
    let fake = FakeArgs::builder().reply("silent")?.build();
    let args = Args::new(Command::Upload(UploadArgs::new(Vec::new(), false))).with_fake(fake);

    let error = run_with_parsed_args(args, OutputFormat::Json)
        .await
        .expect_err("silent device should time out");
    assert_eq!(
        "device did not acknowledge the upload within 2000 ms",
        error.to_string()
    );

    Ok(())
}

#[tokio::test]
async fn download_prints_fake_device_configuration() -> anyhow::Result<()> {
    let snapshot = ConfigSnapshot::default().with(
        "CLOCK_1_DIVIDER".parse()?,
        unholy_host::FieldValue::parse("CLOCK_1_DIVIDER".parse()?, "5")?,
    )?;
    let hex = config_hex(&snapshot);

    let json = run_json(["unholy-host", "--fake", "--fake-config", &hex, "download"]).await?;

    assert_eq!("download", json["action"]);
    assert_eq!(json["snapshot"], serde_json::to_value(&snapshot)?);

    Ok(())
}

#[tokio::test]
async fn device_commands_without_backend_report_no_device() -> anyhow::Result<()> {
    let args = Args::new(Command::Upload(UploadArgs::default()));

    let error = run_with_parsed_args(args, OutputFormat::Json)
        .await
        .expect_err("no device is attached");
    assert_eq!("no device connected", error.to_string());

    Ok(())
}

#[tokio::test]
async fn calibrate_pitch_reports_reference_note() -> anyhow::Result<()> {
    let json = run_json(["unholy-host", "--fake", "calibrate", "pitch", "6"]).await?;

    assert_eq!("calibration_pitch", json["action"]);
    assert_eq!(6, json["index"]);
    assert_eq!(59, json["note"]);

    Ok(())
}

#[test]
fn encode_rejects_value_of_wrong_kind() {
    let error = Args::try_parse_from(["unholy-host", "encode", "GATE_1_INVERT=maybe"])
        .expect_err("invalid boolean should not parse");
    assert_eq!(ErrorKind::ValueValidation, error.kind());
}

#[test]
fn encode_args_accept_parsed_edits() -> anyhow::Result<()> {
    let args = EncodeArgs::new(vec!["CAL_1_0=0.002".parse()?]);
    assert_eq!(1, args.edits().len());
    Ok(())
}
