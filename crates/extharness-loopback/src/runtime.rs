//! The loopback runtime.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, trace, warn};

use extharness_protocols::{
    AudioFrameMessage, Command, CommandResult, Completion, ControllerLink, DataMessage,
    LifecyclePhase, LogLevel, LogRecord, Properties, RuntimeBoundary, TestMode, TesterError,
    TesterHandle, VideoFrameMessage,
};

use crate::addon::AddonRegistry;
use crate::default_extension::DefaultExtensionAddon;
use crate::session::{self, PeerInbound, Session, SessionSignal};

/// Hosts extensions under test in-process and connects them to testers.
pub struct LoopbackRuntime {
    addons: Arc<AddonRegistry>,
    modes: DashMap<TesterHandle, TestMode>,
    sessions: Arc<DashMap<TesterHandle, Arc<Session>>>,
}

impl LoopbackRuntime {
    pub fn new(addons: Arc<AddonRegistry>) -> Self {
        Self {
            addons,
            modes: DashMap::new(),
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// A runtime with the built-in addons registered.
    pub fn with_default_addons() -> Result<Self, TesterError> {
        let addons = AddonRegistry::new();
        addons.register(Arc::new(DefaultExtensionAddon))?;
        Ok(Self::new(Arc::new(addons)))
    }

    pub fn addons(&self) -> &Arc<AddonRegistry> {
        &self.addons
    }

    /// Number of testers currently connected.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Number of test modes configured but not yet run.
    pub fn pending_modes(&self) -> usize {
        self.modes.len()
    }

    fn session(&self, handle: TesterHandle) -> Result<Arc<Session>, TesterError> {
        self.sessions
            .get(&handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TesterError::Boundary(format!("{} is not running", handle)))
    }
}

impl RuntimeBoundary for LoopbackRuntime {
    fn configure_test_mode(&self, handle: TesterHandle, mode: &TestMode) -> Result<(), TesterError> {
        if self.sessions.contains_key(&handle) {
            return Err(TesterError::AlreadyRunning);
        }
        if self.modes.contains_key(&handle) {
            return Err(TesterError::AlreadyConfigured);
        }
        let addon_name = mode.addon_name();
        if !self.addons.contains(addon_name) {
            return Err(TesterError::NotFound(format!("addon '{}'", addon_name)));
        }
        debug!(%handle, addon = addon_name, "Test mode accepted");
        self.modes.insert(handle, mode.clone());
        Ok(())
    }

    fn run(&self, handle: TesterHandle, link: ControllerLink) -> Result<(), TesterError> {
        if self.sessions.contains_key(&handle) {
            return Err(TesterError::AlreadyRunning);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TesterError::Boundary(format!("no async runtime: {}", e)))?;

        let (peer, instance_name, properties) = match self.modes.remove(&handle) {
            Some((_, TestMode::Single { addon_name, properties })) => {
                let addon = self.addons.require(&addon_name)?;
                let instance_name = format!("{}_{}", addon_name, handle.raw());
                let peer = addon.create_instance(&instance_name);
                (Some(peer), instance_name, properties)
            }
            None => {
                warn!(%handle, "No test mode configured, running without an extension under test");
                (None, String::new(), Properties::new())
            }
        };

        let (session, channels) = Session::new(handle, instance_name.clone(), properties, link);
        self.sessions.insert(handle, session.clone());
        info!(%handle, extension = %instance_name, "Loopback session started");

        let sessions = self.sessions.clone();
        runtime.spawn(async move {
            match session::drive(session.clone(), peer, channels).await {
                Ok(()) => debug!(%handle, "Loopback session finished"),
                Err(e) => warn!(%handle, error = %e, "Loopback session ended early"),
            }
            sessions.remove_if(&handle, |_, current| Arc::ptr_eq(current, &session));
        });
        Ok(())
    }

    fn send_command(
        &self,
        handle: TesterHandle,
        cmd: Command,
        completion: Completion<CommandResult>,
    ) -> Result<(), TesterError> {
        self.session(handle)?.accept_command(cmd, completion)
    }

    fn send_data(
        &self,
        handle: TesterHandle,
        data: DataMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.session(handle)?
            .to_peer(PeerInbound::Data(data, completion))
    }

    fn send_video_frame(
        &self,
        handle: TesterHandle,
        frame: VideoFrameMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.session(handle)?
            .to_peer(PeerInbound::VideoFrame(frame, completion))
    }

    fn send_audio_frame(
        &self,
        handle: TesterHandle,
        frame: AudioFrameMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.session(handle)?
            .to_peer(PeerInbound::AudioFrame(frame, completion))
    }

    fn return_result(
        &self,
        handle: TesterHandle,
        result: CommandResult,
        completion: Completion<()>,
    ) -> Result<(), TesterError> {
        self.session(handle)?.accept_result(result)?;
        completion.succeed(());
        Ok(())
    }

    fn stop_test(&self, handle: TesterHandle) -> Result<(), TesterError> {
        self.session(handle)?.request_stop();
        Ok(())
    }

    fn log(&self, handle: TesterHandle, record: LogRecord) -> Result<(), TesterError> {
        let LogRecord {
            level,
            location,
            message,
            ..
        } = record;
        let (func, file, line) = (location.function, location.file, location.line);
        match level {
            LogLevel::Verbose => {
                trace!(target: "extharness::tester", %handle, %func, %file, line, "{}", message)
            }
            LogLevel::Debug => {
                debug!(target: "extharness::tester", %handle, %func, %file, line, "{}", message)
            }
            LogLevel::Info => {
                info!(target: "extharness::tester", %handle, %func, %file, line, "{}", message)
            }
            LogLevel::Warn => {
                warn!(target: "extharness::tester", %handle, %func, %file, line, "{}", message)
            }
            LogLevel::Error | LogLevel::Fatal => {
                error!(target: "extharness::tester", %handle, %func, %file, line, %level, "{}", message)
            }
        }
        Ok(())
    }

    fn on_phase_done(&self, handle: TesterHandle, phase: LifecyclePhase) {
        match self.sessions.get(&handle) {
            Some(session) => session.signal(SessionSignal::PhaseDone(phase)),
            None => debug!(%handle, %phase, "Phase done for unknown tester"),
        }
    }

    fn on_end_of_life(&self, handle: TesterHandle) {
        self.modes.remove(&handle);
        match self.sessions.remove(&handle) {
            Some((_, session)) => session.signal(SessionSignal::EndOfLife),
            None => debug!(%handle, "End of life for unknown tester"),
        }
    }

    fn release(&self, handle: TesterHandle) {
        if self.modes.remove(&handle).is_some() {
            debug!(%handle, "Dropped test mode of a tester that never ran");
        }
    }
}

impl fmt::Debug for LoopbackRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackRuntime")
            .field("addons", &self.addons.list_ids())
            .field("active_sessions", &self.sessions.len())
            .finish()
    }
}
