//! Contract between the harness core and the runtime engine.
//!
//! The engine (the "boundary") transports messages and drives the lifecycle.
//! The core talks to it through [`RuntimeBoundary`]; the boundary talks back
//! through a [`ControllerLink`] it receives when a run starts.

use std::fmt;

use tokio::sync::mpsc;

use crate::error::TesterError;
use crate::handle::{OperationId, TesterHandle};
use crate::log::LogRecord;
use crate::message::{
    AudioFrameMessage, Command, CommandResult, DataMessage, Properties, VideoFrameMessage,
};
use crate::phase::LifecyclePhase;

type Resolver<T> = Box<dyn FnOnce(Result<T, TesterError>) + Send>;

/// Single-use completion token for one accepted boundary operation.
///
/// Completing consumes the token, so an operation can be resolved at most
/// once. Dropping an uncompleted token resolves the operation with
/// [`TesterError::CompletionDropped`].
pub struct Completion<T> {
    operation: OperationId,
    resolver: Option<Resolver<T>>,
}

impl<T> Completion<T> {
    pub fn new<F>(operation: OperationId, resolver: F) -> Self
    where
        F: FnOnce(Result<T, TesterError>) + Send + 'static,
    {
        Self {
            operation,
            resolver: Some(Box::new(resolver)),
        }
    }

    pub fn operation(&self) -> OperationId {
        self.operation
    }

    pub fn complete(mut self, result: Result<T, TesterError>) {
        if let Some(resolver) = self.resolver.take() {
            resolver(result);
        }
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: TesterError) {
        self.complete(Err(error));
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(resolver) = self.resolver.take() {
            resolver(Err(TesterError::CompletionDropped));
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("operation", &self.operation)
            .field("resolved", &self.resolver.is_none())
            .finish()
    }
}

/// How the boundary should host the extension under test.
#[derive(Debug, Clone, PartialEq)]
pub enum TestMode {
    /// A single addon instance, configured with the given properties.
    Single {
        addon_name: String,
        properties: Properties,
    },
}

impl TestMode {
    pub fn addon_name(&self) -> &str {
        match self {
            Self::Single { addon_name, .. } => addon_name,
        }
    }
}

/// A notification from the boundary into a lifecycle controller.
#[derive(Debug)]
pub enum BoundaryEvent {
    Configure,
    Init,
    Start,
    Stop,
    Deinit,
    Cmd(Command),
    Data(DataMessage),
    VideoFrame(VideoFrameMessage),
    AudioFrame(AudioFrameMessage),
}

impl BoundaryEvent {
    /// The lifecycle phase this event enters, for phase events.
    pub fn phase(&self) -> Option<LifecyclePhase> {
        match self {
            Self::Configure => Some(LifecyclePhase::Configuring),
            Self::Init => Some(LifecyclePhase::Initializing),
            Self::Start => Some(LifecyclePhase::Starting),
            Self::Stop => Some(LifecyclePhase::Stopping),
            Self::Deinit => Some(LifecyclePhase::Deinitializing),
            _ => None,
        }
    }
}

/// The boundary's channel into one lifecycle controller.
///
/// Events are delivered in the order they are sent.
#[derive(Debug, Clone)]
pub struct ControllerLink {
    handle: TesterHandle,
    tx: mpsc::UnboundedSender<BoundaryEvent>,
}

impl ControllerLink {
    pub fn new(handle: TesterHandle, tx: mpsc::UnboundedSender<BoundaryEvent>) -> Self {
        Self { handle, tx }
    }

    /// Create a link and the receiving end owned by the controller.
    pub fn channel(handle: TesterHandle) -> (Self, mpsc::UnboundedReceiver<BoundaryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(handle, tx), rx)
    }

    pub fn handle(&self) -> TesterHandle {
        self.handle
    }

    /// Whether the controller has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the controller has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn deliver(&self, event: BoundaryEvent) -> Result<(), TesterError> {
        self.tx.send(event).map_err(|_| TesterError::Closed)
    }

    pub fn on_configure(&self) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Configure)
    }

    pub fn on_init(&self) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Init)
    }

    pub fn on_start(&self) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Start)
    }

    pub fn on_stop(&self) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Stop)
    }

    pub fn on_deinit(&self) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Deinit)
    }

    pub fn on_cmd(&self, cmd: Command) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Cmd(cmd))
    }

    pub fn on_data(&self, data: DataMessage) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::Data(data))
    }

    pub fn on_video_frame(&self, frame: VideoFrameMessage) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::VideoFrame(frame))
    }

    pub fn on_audio_frame(&self, frame: AudioFrameMessage) -> Result<(), TesterError> {
        self.deliver(BoundaryEvent::AudioFrame(frame))
    }
}

/// Operations the core consumes from the runtime engine.
///
/// Every `send_*`/`return_result` call either fails immediately, consuming
/// the completion without resolving it through the normal path, or returns
/// `Ok(())` and later resolves the completion exactly once.
pub trait RuntimeBoundary: Send + Sync {
    /// One-time test setup, before [`RuntimeBoundary::run`].
    fn configure_test_mode(&self, handle: TesterHandle, mode: &TestMode) -> Result<(), TesterError>;

    /// Begin driving the lifecycle of `handle` through `link`.
    fn run(&self, handle: TesterHandle, link: ControllerLink) -> Result<(), TesterError>;

    fn send_command(
        &self,
        handle: TesterHandle,
        cmd: Command,
        completion: Completion<CommandResult>,
    ) -> Result<(), TesterError>;

    fn send_data(
        &self,
        handle: TesterHandle,
        data: DataMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError>;

    fn send_video_frame(
        &self,
        handle: TesterHandle,
        frame: VideoFrameMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError>;

    fn send_audio_frame(
        &self,
        handle: TesterHandle,
        frame: AudioFrameMessage,
        completion: Completion<()>,
    ) -> Result<(), TesterError>;

    fn return_result(
        &self,
        handle: TesterHandle,
        result: CommandResult,
        completion: Completion<()>,
    ) -> Result<(), TesterError>;

    /// Request the end of the running phase.
    fn stop_test(&self, handle: TesterHandle) -> Result<(), TesterError>;

    fn log(&self, handle: TesterHandle, record: LogRecord) -> Result<(), TesterError>;

    /// Emitted once per hooked phase, in phase order.
    fn on_phase_done(&self, handle: TesterHandle, phase: LifecyclePhase);

    /// Emitted exactly once, after deinit is done.
    fn on_end_of_life(&self, handle: TesterHandle);

    /// The controller owning `handle` is gone, whether or not it ran.
    /// State still keyed by the handle can be dropped.
    fn release(&self, _handle: TesterHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_completion_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let completion = Completion::<u32>::new(OperationId::new(1), move |result| {
            assert_eq!(result.unwrap(), 5);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(completion.operation(), OperationId::new(1));
        completion.succeed(5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_completion_reports_error() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let seen = dropped.clone();
        let completion = Completion::<()>::new(OperationId::new(2), move |result| {
            assert!(matches!(result, Err(TesterError::CompletionDropped)));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        drop(completion);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_completion_debug() {
        let completion = Completion::<()>::new(OperationId::new(3), |_| {});
        let debug = format!("{:?}", completion);
        assert!(debug.contains("Completion"));
        completion.fail(TesterError::Closed);
    }

    #[test]
    fn test_link_preserves_order() {
        let (link, mut rx) = ControllerLink::channel(TesterHandle::new(1));
        link.on_configure().unwrap();
        link.on_cmd(Command::new("a")).unwrap();
        link.on_cmd(Command::new("b")).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), BoundaryEvent::Configure));
        match rx.try_recv().unwrap() {
            BoundaryEvent::Cmd(cmd) => assert_eq!(crate::Message::name(&cmd), "a"),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv().unwrap() {
            BoundaryEvent::Cmd(cmd) => assert_eq!(crate::Message::name(&cmd), "b"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_link_closed_after_receiver_dropped() {
        let (link, rx) = ControllerLink::channel(TesterHandle::new(1));
        assert!(!link.is_closed());
        drop(rx);
        assert!(link.is_closed());
        assert!(matches!(link.on_start(), Err(TesterError::Closed)));
    }

    #[tokio::test]
    async fn test_link_closed_future() {
        let (link, rx) = ControllerLink::channel(TesterHandle::new(2));
        drop(rx);
        link.closed().await;
        assert!(link.is_closed());
    }

    #[test]
    fn test_event_phase() {
        assert_eq!(
            BoundaryEvent::Deinit.phase(),
            Some(LifecyclePhase::Deinitializing)
        );
        assert_eq!(BoundaryEvent::Data(DataMessage::new("d")).phase(), None);
    }
}
