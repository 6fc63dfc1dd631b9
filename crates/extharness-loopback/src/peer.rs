//! The extension side of a loopback session.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn};

use extharness_protocols::{
    AudioFrameMessage, BoundaryEvent, Command, CommandResult, DataMessage, LogLevel, Message,
    Properties, TesterError, TesterHandle, VideoFrameMessage,
};

use crate::session::Session;

/// An extension hosted by the loopback runtime.
///
/// Mirrors the tester's hooks: phase hooks run one at a time, message hooks
/// start in arrival order and may overlap.
#[async_trait]
pub trait PeerExtension: Send + Sync + 'static {
    async fn on_configure(&self, _env: &PeerEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_init(&self, _env: &PeerEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_start(&self, _env: &PeerEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_stop(&self, _env: &PeerEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_deinit(&self, _env: &PeerEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_cmd(&self, _env: &PeerEnv, _cmd: Command) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_data(&self, _env: &PeerEnv, _data: DataMessage) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_video_frame(
        &self,
        _env: &PeerEnv,
        _frame: VideoFrameMessage,
    ) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_audio_frame(
        &self,
        _env: &PeerEnv,
        _frame: AudioFrameMessage,
    ) -> Result<(), TesterError> {
        Ok(())
    }
}

/// What a hosted extension can do: talk to the tester and read its
/// configured properties.
#[derive(Clone)]
pub struct PeerEnv {
    session: Arc<Session>,
}

impl PeerEnv {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Handle of the tester this extension is connected to.
    pub fn tester(&self) -> TesterHandle {
        self.session.handle()
    }

    pub fn instance_name(&self) -> &str {
        self.session.instance_name()
    }

    /// Properties from the test mode.
    pub fn properties(&self) -> &Properties {
        self.session.properties()
    }

    pub fn get_property_string(&self, key: &str) -> Result<String, TesterError> {
        self.properties().get_string(key)
    }

    /// Send a command to the tester.
    ///
    /// The command is on its way when this returns; the future resolves with
    /// the tester's result and may be dropped if the result is not needed.
    pub fn send_command(
        &self,
        mut cmd: Command,
    ) -> impl Future<Output = Result<CommandResult, TesterError>> + Send + 'static {
        let sent = cmd
            .assign_correlation_id()
            .and_then(|id| {
                let rx = self.session.expect_result(id);
                match self.session.to_tester(BoundaryEvent::Cmd(cmd)) {
                    Ok(()) => Ok(rx),
                    Err(e) => {
                        self.session.forget_result(id);
                        Err(e)
                    }
                }
            });

        async move {
            let rx = sent?;
            rx.await.map_err(|_| TesterError::CompletionDropped)
        }
    }

    pub fn send_data(&self, data: DataMessage) -> Result<(), TesterError> {
        self.session.to_tester(BoundaryEvent::Data(data))
    }

    pub fn send_video_frame(&self, frame: VideoFrameMessage) -> Result<(), TesterError> {
        self.session.to_tester(BoundaryEvent::VideoFrame(frame))
    }

    pub fn send_audio_frame(&self, frame: AudioFrameMessage) -> Result<(), TesterError> {
        self.session.to_tester(BoundaryEvent::AudioFrame(frame))
    }

    /// Answer a command the tester sent.
    pub fn return_result(&self, result: CommandResult) -> Result<(), TesterError> {
        debug!(
            handle = %self.tester(),
            cmd = result.name(),
            status = %result.status(),
            "Extension returning result"
        );
        self.session.resolve_tester_command(result)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let handle = self.tester();
        let extension = self.instance_name();
        match level {
            LogLevel::Verbose => trace!(target: "extharness::extension", %handle, extension, "{}", message),
            LogLevel::Debug => debug!(target: "extharness::extension", %handle, extension, "{}", message),
            LogLevel::Info => info!(target: "extharness::extension", %handle, extension, "{}", message),
            LogLevel::Warn => warn!(target: "extharness::extension", %handle, extension, "{}", message),
            LogLevel::Error | LogLevel::Fatal => {
                error!(target: "extharness::extension", %handle, extension, "{}", message)
            }
        }
    }

    pub fn log_info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl fmt::Debug for PeerEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerEnv")
            .field("tester", &self.tester())
            .field("instance_name", &self.instance_name())
            .finish()
    }
}
