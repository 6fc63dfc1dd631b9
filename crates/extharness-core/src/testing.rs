//! A scripted boundary for unit tests.
//!
//! Records every call as a short string. With `drive` enabled it advances
//! the lifecycle by itself: each phase-done triggers the next phase and
//! `stop_test` triggers stop.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use extharness_protocols::{
    AudioFrameMessage, BoundaryEvent, Command, CommandResult, Completion, ControllerLink,
    DataMessage, LifecyclePhase, LogRecord, Message, RuntimeBoundary, TestMode, TesterError,
    TesterHandle, VideoFrameMessage,
};

#[derive(Default)]
pub(crate) struct ScriptedBoundary {
    pub drive: bool,
    pub reject_sends: AtomicBool,
    pub hold_commands: AtomicBool,
    pub repeat_deinit: AtomicBool,
    pub reject_run: AtomicBool,
    pub preamble: Mutex<Vec<BoundaryEvent>>,
    pub on_running: Mutex<Vec<BoundaryEvent>>,
    pub held: Mutex<Vec<Completion<CommandResult>>>,
    pub logs: Mutex<Vec<LogRecord>>,
    pub mode: Mutex<Option<TestMode>>,
    pub released: Mutex<Vec<TesterHandle>>,
    calls: Mutex<Vec<String>>,
    link: Mutex<Option<ControllerLink>>,
}

impl ScriptedBoundary {
    pub fn driving() -> Self {
        Self {
            drive: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn link(&self) -> Option<ControllerLink> {
        self.link.lock().clone()
    }

    /// Drop the stored link, closing the controller's event channel.
    pub fn disconnect(&self) {
        self.link.lock().take();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn deliver(&self, event: BoundaryEvent) {
        if let Some(link) = self.link() {
            let _ = link.deliver(event);
        }
    }

    fn check_send(&self) -> Result<(), TesterError> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(TesterError::Boundary("sends rejected".to_string()));
        }
        Ok(())
    }
}

impl RuntimeBoundary for ScriptedBoundary {
    fn configure_test_mode(&self, _handle: TesterHandle, mode: &TestMode) -> Result<(), TesterError> {
        self.record(format!("configure_test_mode:{}", mode.addon_name()));
        *self.mode.lock() = Some(mode.clone());
        Ok(())
    }

    fn run(&self, _handle: TesterHandle, link: ControllerLink) -> Result<(), TesterError> {
        self.record("run");
        if self.reject_run.load(Ordering::SeqCst) {
            return Err(TesterError::Boundary("run rejected".to_string()));
        }
        for event in self.preamble.lock().drain(..) {
            let _ = link.deliver(event);
        }
        if self.drive {
            let _ = link.on_configure();
        }
        *self.link.lock() = Some(link);
        Ok(())
    }

    fn send_command(
        &self,
        _handle: TesterHandle,
        cmd: Command,
        completion: Completion<CommandResult>,
    ) -> Result<(), TesterError> {
        self.record(format!("send_command:{}", cmd.name()));
        self.check_send()?;
        if self.hold_commands.load(Ordering::SeqCst) {
            self.held.lock().push(completion);
        } else {
            completion.succeed(CommandResult::ok(&cmd));
        }
        Ok(())
    }

    fn send_data(
        &self,
        _handle: TesterHandle,
        data: DataMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.record(format!("send_data:{}", data.name()));
        self.check_send()?;
        completion.succeed(());
        Ok(())
    }

    fn send_video_frame(
        &self,
        _handle: TesterHandle,
        frame: VideoFrameMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.record(format!("send_video_frame:{}", frame.name()));
        self.check_send()?;
        completion.succeed(());
        Ok(())
    }

    fn send_audio_frame(
        &self,
        _handle: TesterHandle,
        frame: AudioFrameMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.record(format!("send_audio_frame:{}", frame.name()));
        self.check_send()?;
        completion.succeed(());
        Ok(())
    }

    fn return_result(
        &self,
        _handle: TesterHandle,
        result: CommandResult,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.record(format!("return_result:{}:{}", result.name(), result.status()));
        self.check_send()?;
        completion.succeed(());
        Ok(())
    }

    fn stop_test(&self, _handle: TesterHandle) -> Result<(), TesterError> {
        self.record("stop_test");
        if self.drive {
            self.deliver(BoundaryEvent::Stop);
        }
        Ok(())
    }

    fn log(&self, _handle: TesterHandle, record: LogRecord) -> Result<(), TesterError> {
        self.record(format!("log:{}:{}", record.level, record.message));
        self.logs.lock().push(record);
        Ok(())
    }

    fn on_phase_done(&self, _handle: TesterHandle, phase: LifecyclePhase) {
        self.record(format!("phase_done:{}", phase));
        if !self.drive {
            return;
        }
        match phase {
            LifecyclePhase::Configuring => self.deliver(BoundaryEvent::Init),
            LifecyclePhase::Initializing => self.deliver(BoundaryEvent::Start),
            LifecyclePhase::Starting => {
                let events: Vec<_> = self.on_running.lock().drain(..).collect();
                for event in events {
                    self.deliver(event);
                }
            }
            LifecyclePhase::Stopping => {
                self.deliver(BoundaryEvent::Deinit);
                if self.repeat_deinit.load(Ordering::SeqCst) {
                    self.deliver(BoundaryEvent::Deinit);
                }
            }
            _ => {}
        }
    }

    fn on_end_of_life(&self, _handle: TesterHandle) {
        self.record("end_of_life");
    }

    fn release(&self, handle: TesterHandle) {
        self.released.lock().push(handle);
    }
}
