use std::time::Duration;

use bon::Builder;
use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use wmidi::{Channel, MidiMessage, Note, U7};

use super::transport::{ConnectionState, Transport, TransportError, TransportEvent};
use crate::codec::{Frame, FrameCodec, FrameCodecError};
use crate::config::{ConfigSnapshot, FieldId, FieldValue, ReferencePitch, SnapshotError};
use crate::protocol::VendorId;

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(2000);
const DEFAULT_CLEAR_DELAY: Duration = Duration::from_millis(1000);
const COMMAND_CAPACITY: usize = 16;
const CALIBRATION_CHANNEL: Channel = Channel::Ch1;

/// Errors surfaced to session callers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("no device connected")]
    NotConnected,
    #[error("device did not acknowledge the upload within {timeout_ms} ms")]
    AckTimeout { timeout_ms: u128 },
    #[error("an upload is already waiting for acknowledgement")]
    UploadInProgress,
    #[error("the session has stopped")]
    SessionClosed,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    FrameCodec(#[from] FrameCodecError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("failed to encode calibration note: {detail}")]
    NoteEncoding { detail: String },
}

/// Session timing and addressing.
#[derive(Debug, Clone, Copy, Builder)]
pub struct SessionConfig {
    #[builder(default)]
    vendor: VendorId,
    /// How long an upload waits for ACK before failing.
    #[builder(default = DEFAULT_ACK_TIMEOUT)]
    ack_timeout: Duration,
    /// How long a finished upload status stays visible.
    #[builder(default = DEFAULT_CLEAR_DELAY)]
    clear_delay: Duration,
    /// Send one REQUEST_CONFIG the first time the link opens.
    #[builder(default = true)]
    auto_sync: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn vendor(&self) -> VendorId {
        self.vendor
    }

    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    #[must_use]
    pub const fn clear_delay(&self) -> Duration {
        self.clear_delay
    }
}

/// Progress of the most recent upload, as shown to the user.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

impl UploadStatus {
    /// Modal text for this status, if any is shown.
    ///
    /// ```
    /// use unholy_host::UploadStatus;
    ///
    /// assert_eq!(Some("upload complete"), UploadStatus::Succeeded.message());
    /// assert_eq!(None, UploadStatus::Idle.message());
    /// ```
    #[must_use]
    pub const fn message(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Pending => Some("uploading…"),
            Self::Succeeded => Some("upload complete"),
            Self::Failed => Some("upload failed"),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

#[derive(Debug)]
enum Command {
    Upload(Reply<()>),
    Download(Reply<()>),
    SetCalibrationMode { enabled: bool, reply: Reply<()> },
    TriggerCalibrationPitch { pitch: ReferencePitch, reply: Reply<()> },
    SetField { field: FieldId, value: FieldValue, reply: Reply<()> },
    ReplaceSnapshot { snapshot: Box<ConfigSnapshot>, reply: Reply<()> },
    ResetAutoSync(Reply<()>),
}

/// Cloneable front end of a running session task.
///
/// Every operation is a message to the task, so edits, inbound frames and
/// timers are applied one at a time in arrival order.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    connection: watch::Receiver<ConnectionState>,
    status: watch::Receiver<UploadStatus>,
    snapshot: watch::Receiver<ConfigSnapshot>,
    calibrating: watch::Receiver<bool>,
    calibration_pitch: watch::Receiver<ReferencePitch>,
}

impl SessionHandle {
    /// Uploads the current snapshot and waits for the device to acknowledge it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] without sending anything when the
    /// link is not open, [`SessionError::UploadInProgress`] while another upload
    /// is unresolved, and [`SessionError::AckTimeout`] when no ACK arrives in time.
    pub async fn upload(&self) -> Result<(), SessionError> {
        self.request(Command::Upload).await
    }

    /// Asks the device for its configuration.
    ///
    /// Returns once the request is sent; the reply, if any, replaces the
    /// snapshot published by [`SessionHandle::snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] when the link is not open.
    pub async fn download(&self) -> Result<(), SessionError> {
        self.request(Command::Download).await
    }

    /// Switches device calibration mode on or off.
    ///
    /// Not gated on the link state. The calibrating flag only follows a frame
    /// the transport accepted.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport refuses the frame.
    pub async fn set_calibration_mode(&self, enabled: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::SetCalibrationMode { enabled, reply })
            .await
    }

    /// Selects a reference pitch and plays its note so the device can measure it.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport refuses the note messages.
    pub async fn trigger_calibration_pitch(
        &self,
        pitch: ReferencePitch,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::TriggerCalibrationPitch { pitch, reply })
            .await
    }

    /// Changes one field of the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the field does not exist or the value has the
    /// wrong kind.
    pub async fn set_field(&self, field: FieldId, value: FieldValue) -> Result<(), SessionError> {
        self.request(|reply| Command::SetField {
            field,
            value,
            reply,
        })
        .await
    }

    /// Replaces the whole local snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the session has stopped.
    pub async fn replace_snapshot(&self, snapshot: ConfigSnapshot) -> Result<(), SessionError> {
        self.request(|reply| Command::ReplaceSnapshot {
            snapshot: Box::new(snapshot),
            reply,
        })
        .await
    }

    /// Re-arms auto-sync so the next link open requests the configuration again.
    ///
    /// # Errors
    ///
    /// Returns an error when the session has stopped.
    pub async fn reset_auto_sync(&self) -> Result<(), SessionError> {
        self.request(Command::ResetAutoSync).await
    }

    /// Watches the link state.
    #[must_use]
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Watches the upload status.
    #[must_use]
    pub fn upload_status(&self) -> watch::Receiver<UploadStatus> {
        self.status.clone()
    }

    /// Watches the local snapshot.
    #[must_use]
    pub fn snapshot(&self) -> watch::Receiver<ConfigSnapshot> {
        self.snapshot.clone()
    }

    /// Watches the calibration-mode flag.
    #[must_use]
    pub fn calibrating(&self) -> watch::Receiver<bool> {
        self.calibrating.clone()
    }

    /// Watches the selected calibration reference pitch.
    #[must_use]
    pub fn calibration_pitch(&self) -> watch::Receiver<ReferencePitch> {
        self.calibration_pitch.clone()
    }

    async fn request<F>(&self, command: F) -> Result<(), SessionError>
    where
        F: FnOnce(Reply<()>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_closed| SessionError::SessionClosed)?;
        response.await.map_err(|_dropped| SessionError::SessionClosed)?
    }
}

/// Starts a session task over `transport`.
///
/// The task runs until every [`SessionHandle`] is dropped.
///
/// ```
/// # async fn demo() -> Result<(), unholy_host::SessionError> {
/// use std::time::Duration;
/// use unholy_host::{FakeDeviceConfig, FakeTransport, SessionConfig, spawn_session};
///
/// let fake = FakeDeviceConfig::builder().connect_after(Duration::ZERO).build();
/// let (transport, events) = FakeTransport::start(fake);
/// let (session, _task) = spawn_session(SessionConfig::default(), Box::new(transport), events);
/// session.upload().await?;
/// # Ok(())
/// # }
/// ```
pub fn spawn_session(
    config: SessionConfig,
    transport: Box<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands, command_receiver) = mpsc::channel(COMMAND_CAPACITY);
    let (connection, connection_receiver) = watch::channel(ConnectionState::Disconnected);
    let (status, status_receiver) = watch::channel(UploadStatus::Idle);
    let (snapshot, snapshot_receiver) = watch::channel(ConfigSnapshot::default());
    let (calibrating, calibrating_receiver) = watch::channel(false);
    let (calibration_pitch, calibration_pitch_receiver) = watch::channel(ReferencePitch::default());

    let task = SessionTask {
        config,
        codec: FrameCodec::new(config.vendor),
        transport,
        events,
        events_open: true,
        commands: command_receiver,
        connection,
        status,
        snapshot,
        calibrating,
        calibration_pitch,
        initialized: false,
        pending: None,
        clear_at: None,
    };
    let span = info_span!("session", vendor = %config.vendor);
    let join = tokio::spawn(task.run().instrument(span));

    let handle = SessionHandle {
        commands,
        connection: connection_receiver,
        status: status_receiver,
        snapshot: snapshot_receiver,
        calibrating: calibrating_receiver,
        calibration_pitch: calibration_pitch_receiver,
    };
    (handle, join)
}

#[derive(Debug)]
struct PendingUpload {
    deadline: Instant,
    reply: Reply<()>,
}

struct SessionTask {
    config: SessionConfig,
    codec: FrameCodec,
    transport: Box<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
    events_open: bool,
    commands: mpsc::Receiver<Command>,
    connection: watch::Sender<ConnectionState>,
    status: watch::Sender<UploadStatus>,
    snapshot: watch::Sender<ConfigSnapshot>,
    calibrating: watch::Sender<bool>,
    calibration_pitch: watch::Sender<ReferencePitch>,
    initialized: bool,
    pending: Option<PendingUpload>,
    clear_at: Option<Instant>,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            let ack_deadline = self.pending.as_ref().map(|pending| pending.deadline);
            tokio::select! {
                biased;
                event = self.events.recv(), if self.events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        debug!("transport event stream ended");
                        self.events_open = false;
                        self.set_connection(ConnectionState::Closed);
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                () = wait_until(ack_deadline) => self.expire_upload(),
                () = wait_until(self.clear_at) => self.clear_status(),
            }
        }
        debug!("session task stopped");
    }

    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connection(state) => self.on_connection(state).await,
            TransportEvent::Received(bytes) => self.on_bytes(&bytes),
        }
    }

    async fn on_connection(&mut self, state: ConnectionState) {
        info!(%state, "connection state changed");
        self.set_connection(state);
        if state.is_open() && self.config.auto_sync && !self.initialized {
            self.initialized = true;
            info!("requesting configuration after first connection");
            if let Err(error) = self.send_frame(&Frame::RequestConfig).await {
                warn!(%error, "auto-sync request failed");
            }
        }
    }

    fn on_bytes(&mut self, bytes: &[u8]) {
        let frame = match self.codec.decode(bytes) {
            Ok(frame) => frame,
            Err(error) if error.is_foreign() => {
                debug!(%error, "ignoring frame for another device");
                return;
            }
            Err(error) => {
                warn!(%error, len = bytes.len(), "dropping malformed frame");
                return;
            }
        };

        match frame {
            Frame::Config(snapshot) => {
                info!("received configuration from device");
                self.snapshot.send_replace(snapshot);
            }
            Frame::Ack => self.acknowledge_upload(),
            Frame::RequestConfig | Frame::CalibrationModeOn | Frame::CalibrationModeOff => {
                debug!(message_type = %frame.message_type(), "ignoring host-bound frame");
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Upload(reply) => self.start_upload(reply).await,
            Command::Download(reply) => {
                let _ = reply.send(self.download().await);
            }
            Command::SetCalibrationMode { enabled, reply } => {
                let _ = reply.send(self.set_calibration_mode(enabled).await);
            }
            Command::TriggerCalibrationPitch { pitch, reply } => {
                let _ = reply.send(self.trigger_calibration_pitch(pitch).await);
            }
            Command::SetField {
                field,
                value,
                reply,
            } => {
                let _ = reply.send(self.set_field(field, value));
            }
            Command::ReplaceSnapshot { snapshot, reply } => {
                self.snapshot.send_replace(*snapshot);
                let _ = reply.send(Ok(()));
            }
            Command::ResetAutoSync(reply) => {
                debug!("auto-sync re-armed");
                self.initialized = false;
                let _ = reply.send(Ok(()));
            }
        }
    }

    #[instrument(skip(self, reply), level = "debug")]
    async fn start_upload(&mut self, reply: Reply<()>) {
        if !self.connection.borrow().is_open() {
            warn!("upload refused: no device connected");
            let _ = reply.send(Err(SessionError::NotConnected));
            return;
        }
        if self.pending.is_some() {
            let _ = reply.send(Err(SessionError::UploadInProgress));
            return;
        }

        let frame = Frame::Config(self.snapshot.borrow().clone());
        self.clear_at = None;
        self.status.send_replace(UploadStatus::Pending);
        if let Err(error) = self.send_frame(&frame).await {
            warn!(%error, "upload could not be sent");
            self.finish(UploadStatus::Failed);
            let _ = reply.send(Err(error));
            return;
        }

        let deadline = Instant::now() + self.config.ack_timeout;
        self.pending = Some(PendingUpload { deadline, reply });
    }

    fn acknowledge_upload(&mut self) {
        let Some(pending) = self.pending.take() else {
            debug!("ignoring ACK with no upload pending");
            return;
        };
        info!("upload acknowledged");
        self.finish(UploadStatus::Succeeded);
        let _ = pending.reply.send(Ok(()));
    }

    fn expire_upload(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let timeout_ms = self.config.ack_timeout.as_millis();
        warn!(timeout_ms, "upload was not acknowledged");
        self.finish(UploadStatus::Failed);
        let _ = pending.reply.send(Err(SessionError::AckTimeout { timeout_ms }));
    }

    fn finish(&mut self, status: UploadStatus) {
        self.status.send_replace(status);
        self.clear_at = Some(Instant::now() + self.config.clear_delay);
    }

    fn clear_status(&mut self) {
        self.clear_at = None;
        self.status.send_replace(UploadStatus::Idle);
    }

    #[instrument(skip(self), level = "debug")]
    async fn download(&mut self) -> Result<(), SessionError> {
        if !self.connection.borrow().is_open() {
            warn!("download refused: no device connected");
            return Err(SessionError::NotConnected);
        }
        self.send_frame(&Frame::RequestConfig).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_calibration_mode(&mut self, enabled: bool) -> Result<(), SessionError> {
        if !self.connection.borrow().is_open() {
            warn!(enabled, "sending calibration toggle without an open connection");
        }
        let frame = if enabled {
            Frame::CalibrationModeOn
        } else {
            Frame::CalibrationModeOff
        };
        self.send_frame(&frame).await?;
        self.calibrating.send_replace(enabled);
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(note = pitch.midi_note()))]
    async fn trigger_calibration_pitch(
        &mut self,
        pitch: ReferencePitch,
    ) -> Result<(), SessionError> {
        self.calibration_pitch.send_replace(pitch);
        let note = Note::from_u8_lossy(pitch.midi_note());
        for message in [
            MidiMessage::NoteOn(CALIBRATION_CHANNEL, note, U7::MAX),
            MidiMessage::NoteOff(CALIBRATION_CHANNEL, note, U7::MIN),
        ] {
            let bytes = encode_note(&message)?;
            self.transport.send(&bytes).await?;
        }
        Ok(())
    }

    fn set_field(&mut self, field: FieldId, value: FieldValue) -> Result<(), SessionError> {
        let mut result = Ok(());
        self.snapshot.send_if_modified(|snapshot| {
            let before = snapshot.get(field);
            result = snapshot.set(field, value);
            result.is_ok() && before.ok() != Some(value)
        });
        result.map_err(SessionError::from)
    }

    async fn send_frame(&self, frame: &Frame) -> Result<(), SessionError> {
        let bytes = self.codec.encode(frame)?;
        debug!(message_type = %frame.message_type(), len = bytes.len(), "sending frame");
        self.transport.send(&bytes).await?;
        Ok(())
    }

    fn set_connection(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }
}

fn encode_note(message: &MidiMessage<'_>) -> Result<Vec<u8>, SessionError> {
    let mut bytes = vec![0u8; message.bytes_size()];
    message
        .copy_to_slice(&mut bytes)
        .map_err(|error| SessionError::NoteEncoding {
            detail: format!("{error:?}"),
        })?;
    Ok(bytes)
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
