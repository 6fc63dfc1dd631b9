//! The tester environment handed to every hook.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use extharness_protocols::{
    AudioFrameMessage, Command, CommandResult, DataMessage, LogLevel, LogLocation, LogRecord,
    Message, RuntimeBoundary, TesterError, TesterHandle, VideoFrameMessage,
};

use crate::bridge::{CompletionBridge, OperationKind, Reply};

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

/// Log through a [`TesterEnv`] with the calling module, file and line.
///
/// ```ignore
/// tester_log!(env, LogLevel::Info, "received {}", name)?;
/// ```
#[macro_export]
macro_rules! tester_log {
    ($env:expr, $level:expr, $($arg:tt)+) => {
        $env.log_at(
            $level,
            $crate::protocols::LogLocation::new(module_path!(), file!(), line!()),
            format!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! tester_debug {
    ($env:expr, $($arg:tt)+) => {
        $crate::tester_log!($env, $crate::protocols::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! tester_info {
    ($env:expr, $($arg:tt)+) => {
        $crate::tester_log!($env, $crate::protocols::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! tester_warn {
    ($env:expr, $($arg:tt)+) => {
        $crate::tester_log!($env, $crate::protocols::LogLevel::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! tester_error {
    ($env:expr, $($arg:tt)+) => {
        $crate::tester_log!($env, $crate::protocols::LogLevel::Error, $($arg)+)
    };
}

struct EnvInner {
    handle: TesterHandle,
    boundary: Arc<dyn RuntimeBoundary>,
    bridge: Arc<CompletionBridge>,
    stop_requested: AtomicBool,
    closed: AtomicBool,
}

/// Facade over the boundary for one tester instance.
///
/// Cheap to clone. Send methods hand the message to the boundary before they
/// return and give back a [`Reply`] for the outcome, so a caller that does
/// not care about the outcome can simply drop it.
#[derive(Clone)]
pub struct TesterEnv {
    inner: Arc<EnvInner>,
}

impl TesterEnv {
    pub(crate) fn new(
        handle: TesterHandle,
        boundary: Arc<dyn RuntimeBoundary>,
        bridge: Arc<CompletionBridge>,
    ) -> Self {
        Self {
            inner: Arc::new(EnvInner {
                handle,
                boundary,
                bridge,
                stop_requested: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn handle(&self) -> TesterHandle {
        self.inner.handle
    }

    /// Send a command and resolve with its single result.
    ///
    /// A fresh correlation id is stamped on the command. Commands that
    /// already carry one are rejected.
    pub fn send_command(&self, mut cmd: Command) -> Reply<CommandResult> {
        if let Err(e) = self.ensure_open() {
            return Reply::ready(Err(e));
        }
        if let Err(e) = cmd.assign_correlation_id() {
            return Reply::ready(Err(e));
        }
        debug!(handle = %self.handle(), cmd = cmd.name(), "Sending command");

        let EnvInner {
            handle, boundary, ..
        } = &*self.inner;
        self.inner
            .bridge
            .invoke_command(|completion| boundary.send_command(*handle, cmd, completion))
    }

    pub fn send_data(&self, data: DataMessage) -> Reply<()> {
        if let Err(e) = self.ensure_open() {
            return Reply::ready(Err(e));
        }
        debug!(handle = %self.handle(), data = data.name(), "Sending data");

        let EnvInner {
            handle, boundary, ..
        } = &*self.inner;
        self.inner.bridge.invoke_ack(OperationKind::SendData, |completion| {
            boundary.send_data(*handle, data, completion)
        })
    }

    pub fn send_video_frame(&self, frame: VideoFrameMessage) -> Reply<()> {
        if let Err(e) = self.ensure_open() {
            return Reply::ready(Err(e));
        }
        debug!(handle = %self.handle(), frame = frame.name(), "Sending video frame");

        let EnvInner {
            handle, boundary, ..
        } = &*self.inner;
        self.inner
            .bridge
            .invoke_ack(OperationKind::SendVideoFrame, |completion| {
                boundary.send_video_frame(*handle, frame, completion)
            })
    }

    pub fn send_audio_frame(&self, frame: AudioFrameMessage) -> Reply<()> {
        if let Err(e) = self.ensure_open() {
            return Reply::ready(Err(e));
        }
        debug!(handle = %self.handle(), frame = frame.name(), "Sending audio frame");

        let EnvInner {
            handle, boundary, ..
        } = &*self.inner;
        self.inner
            .bridge
            .invoke_ack(OperationKind::SendAudioFrame, |completion| {
                boundary.send_audio_frame(*handle, frame, completion)
            })
    }

    /// Answer a command received in `on_cmd`.
    pub fn return_result(&self, result: CommandResult) -> Reply<()> {
        if let Err(e) = self.ensure_open() {
            return Reply::ready(Err(e));
        }
        debug!(
            handle = %self.handle(),
            cmd = result.name(),
            status = %result.status(),
            "Returning result"
        );

        let EnvInner {
            handle, boundary, ..
        } = &*self.inner;
        self.inner
            .bridge
            .invoke_ack(OperationKind::ReturnResult, |completion| {
                boundary.return_result(*handle, result, completion)
            })
    }

    /// Ask the boundary to end the running phase.
    ///
    /// Only the first successful call reaches the boundary; later calls are
    /// no-ops.
    pub fn stop_test(&self) -> Result<(), TesterError> {
        self.ensure_open()?;
        if self.inner.stop_requested.swap(true, Ordering::SeqCst) {
            debug!(handle = %self.handle(), "Stop already requested");
            return Ok(());
        }

        if let Err(e) = self.inner.boundary.stop_test(self.inner.handle) {
            self.inner.stop_requested.store(false, Ordering::SeqCst);
            return Err(e);
        }
        info!(handle = %self.handle(), "Stop requested");
        Ok(())
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    /// Log through the boundary, attributed to the caller's file and line.
    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), TesterError> {
        self.log_at(level, LogLocation::caller(), message)
    }

    pub fn log_at(
        &self,
        level: LogLevel,
        location: LogLocation,
        message: impl Into<String>,
    ) -> Result<(), TesterError> {
        self.ensure_open()?;
        let message = message.into();
        if message.is_empty() {
            return Err(TesterError::InvalidArgument(
                "log message must not be empty".to_string(),
            ));
        }
        self.inner
            .boundary
            .log(self.inner.handle, LogRecord::new(level, location, message))
    }

    #[track_caller]
    pub fn log_verbose(&self, message: impl Into<String>) -> Result<(), TesterError> {
        self.log(LogLevel::Verbose, message)
    }

    #[track_caller]
    pub fn log_debug(&self, message: impl Into<String>) -> Result<(), TesterError> {
        self.log(LogLevel::Debug, message)
    }

    #[track_caller]
    pub fn log_info(&self, message: impl Into<String>) -> Result<(), TesterError> {
        self.log(LogLevel::Info, message)
    }

    #[track_caller]
    pub fn log_warn(&self, message: impl Into<String>) -> Result<(), TesterError> {
        self.log(LogLevel::Warn, message)
    }

    #[track_caller]
    pub fn log_error(&self, message: impl Into<String>) -> Result<(), TesterError> {
        self.log(LogLevel::Error, message)
    }

    #[track_caller]
    pub fn log_fatal(&self, message: impl Into<String>) -> Result<(), TesterError> {
        self.log(LogLevel::Fatal, message)
    }

    /// Whether the instance reached end of life or was torn down.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), TesterError> {
        if self.is_closed() {
            return Err(TesterError::Closed);
        }
        Ok(())
    }
}

impl fmt::Debug for TesterEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TesterEnv")
            .field("handle", &self.inner.handle)
            .field("stop_requested", &self.is_stop_requested())
            .field("closed", &self.is_closed())
            .finish()
    }
}
