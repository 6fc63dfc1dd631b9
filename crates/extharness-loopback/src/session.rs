//! One tester connected to one hosted extension.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, oneshot};
use tracing::{debug, error, warn};

use extharness_protocols::{
    AudioFrameMessage, BoundaryEvent, Command, CommandResult, Completion, ControllerLink,
    CorrelationId, DataMessage, LifecyclePhase, Message, Properties, TesterError, TesterHandle,
    VideoFrameMessage,
};

use crate::peer::{PeerEnv, PeerExtension};

/// Progress reported by the tester's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionSignal {
    PhaseDone(LifecyclePhase),
    EndOfLife,
}

/// A message on its way from the tester to the extension.
pub(crate) enum PeerInbound {
    Cmd(Command),
    Data(DataMessage, Completion<()>),
    VideoFrame(VideoFrameMessage, Completion<()>),
    AudioFrame(AudioFrameMessage, Completion<()>),
}

struct Outbound {
    tester_running: bool,
    backlog: Vec<BoundaryEvent>,
}

#[derive(Default)]
struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// Returns true for the first request only.
    fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_one();
        }
        first
    }

    async fn wait(&self) {
        if self.requested.load(Ordering::SeqCst) {
            return;
        }
        self.notify.notified().await;
    }
}

pub(crate) struct Session {
    handle: TesterHandle,
    instance_name: String,
    properties: Properties,
    link: ControllerLink,
    outbound: Mutex<Outbound>,
    inbox: Mutex<Option<mpsc::UnboundedSender<PeerInbound>>>,
    tester_commands: Mutex<HashMap<CorrelationId, Completion<CommandResult>>>,
    peer_commands: Mutex<HashMap<CorrelationId, oneshot::Sender<CommandResult>>>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    stop: StopSignal,
}

/// Receiving ends owned by the session's driver task.
pub(crate) struct SessionChannels {
    pub inbox: mpsc::UnboundedReceiver<PeerInbound>,
    pub signals: mpsc::UnboundedReceiver<SessionSignal>,
}

impl Session {
    pub(crate) fn new(
        handle: TesterHandle,
        instance_name: String,
        properties: Properties,
        link: ControllerLink,
    ) -> (Arc<Self>, SessionChannels) {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            handle,
            instance_name,
            properties,
            link,
            outbound: Mutex::new(Outbound {
                tester_running: false,
                backlog: Vec::new(),
            }),
            inbox: Mutex::new(Some(inbox_tx)),
            tester_commands: Mutex::new(HashMap::new()),
            peer_commands: Mutex::new(HashMap::new()),
            signals: signals_tx,
            stop: StopSignal::default(),
        });
        (session, SessionChannels { inbox, signals })
    }

    pub(crate) fn handle(&self) -> TesterHandle {
        self.handle
    }

    pub(crate) fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub(crate) fn properties(&self) -> &Properties {
        &self.properties
    }

    // Tester -> extension.

    pub(crate) fn accept_command(
        &self,
        cmd: Command,
        completion: Completion<CommandResult>,
    ) -> Result<(), TesterError> {
        let id = cmd.correlation_id().ok_or_else(|| {
            TesterError::InvalidArgument(format!("command '{}' has no correlation id", cmd.name()))
        })?;
        self.tester_commands.lock().insert(id, completion);
        if let Err(e) = self.to_peer(PeerInbound::Cmd(cmd)) {
            self.tester_commands.lock().remove(&id);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn to_peer(&self, message: PeerInbound) -> Result<(), TesterError> {
        let inbox = self.inbox.lock();
        let sender = inbox.as_ref().ok_or_else(|| {
            TesterError::Boundary("no extension under test is running".to_string())
        })?;
        sender
            .send(message)
            .map_err(|_| TesterError::Boundary("no extension under test is running".to_string()))
    }

    /// Route a tester's result to the extension command it answers.
    pub(crate) fn accept_result(&self, result: CommandResult) -> Result<(), TesterError> {
        let id = result.correlation_id().ok_or_else(|| {
            TesterError::Boundary(format!("result for '{}' has no correlation id", result.name()))
        })?;
        let waiter = self.peer_commands.lock().remove(&id).ok_or_else(|| {
            TesterError::Boundary(format!(
                "no outstanding command '{}' ({}) to answer",
                result.name(),
                id
            ))
        })?;
        // The extension may have stopped waiting; delivery still counts.
        let _ = waiter.send(result);
        Ok(())
    }

    pub(crate) fn request_stop(&self) {
        if self.stop.request() {
            debug!(handle = %self.handle, "Stop requested");
        }
    }

    pub(crate) fn signal(&self, signal: SessionSignal) {
        // The driver may already be gone after end of life.
        let _ = self.signals.send(signal);
    }

    // Extension -> tester.

    pub(crate) fn to_tester(&self, event: BoundaryEvent) -> Result<(), TesterError> {
        let mut outbound = self.outbound.lock();
        if outbound.tester_running {
            self.link.deliver(event)
        } else {
            outbound.backlog.push(event);
            Ok(())
        }
    }

    pub(crate) fn expect_result(&self, id: CorrelationId) -> oneshot::Receiver<CommandResult> {
        let (tx, rx) = oneshot::channel();
        self.peer_commands.lock().insert(id, tx);
        rx
    }

    /// Drop the waiter for a command that never reached the tester.
    pub(crate) fn forget_result(&self, id: CorrelationId) {
        self.peer_commands.lock().remove(&id);
    }

    #[cfg(test)]
    fn pending_peer_commands(&self) -> usize {
        self.peer_commands.lock().len()
    }

    pub(crate) fn resolve_tester_command(&self, result: CommandResult) -> Result<(), TesterError> {
        let id = result.correlation_id().ok_or_else(|| {
            TesterError::InvalidArgument(format!("result for '{}' has no correlation id", result.name()))
        })?;
        let completion = self
            .tester_commands
            .lock()
            .remove(&id)
            .ok_or_else(|| TesterError::NotFound(format!("pending command {}", id)))?;
        completion.succeed(result);
        Ok(())
    }

    fn fail_tester_command(&self, id: CorrelationId, error: &TesterError) {
        let completion = self.tester_commands.lock().remove(&id);
        if let Some(completion) = completion {
            completion.fail(TesterError::Operation(error.to_string()));
        }
    }

    /// Start forwarding to the tester, releasing anything held back so far.
    fn mark_tester_running(&self) {
        let mut outbound = self.outbound.lock();
        outbound.tester_running = true;
        let held = std::mem::take(&mut outbound.backlog);
        if !held.is_empty() {
            debug!(handle = %self.handle, count = held.len(), "Releasing held messages to tester");
        }
        for event in held {
            if let Err(e) = self.link.deliver(event) {
                warn!(handle = %self.handle, error = %e, "Tester gone while releasing held messages");
                break;
            }
        }
    }

    fn close_inbox(&self) {
        self.inbox.lock().take();
    }

    async fn wait_for(
        &self,
        signals: &mut mpsc::UnboundedReceiver<SessionSignal>,
        expected: SessionSignal,
    ) -> Result<(), TesterError> {
        loop {
            tokio::select! {
                biased;

                signal = signals.recv() => match signal {
                    Some(signal) if signal == expected => return Ok(()),
                    Some(other) => {
                        debug!(handle = %self.handle, ?other, ?expected, "Ignoring unexpected signal");
                    }
                    None => return Err(TesterError::BoundaryDisconnected),
                },

                _ = self.link.closed() => return Err(TesterError::Closed),
            }
        }
    }

    async fn wait_for_stop(&self) -> Result<(), TesterError> {
        tokio::select! {
            biased;
            _ = self.stop.wait() => Ok(()),
            _ = self.link.closed() => Err(TesterError::Closed),
        }
    }
}

async fn peer_phase<F>(session: &Session, hook: &'static str, run: F)
where
    F: std::future::Future<Output = Result<(), TesterError>>,
{
    if let Err(e) = run.await {
        error!(handle = %session.handle(), hook, error = %e, "Extension hook failed");
    }
}

/// Drive one session from start to end of life.
pub(crate) async fn drive(
    session: Arc<Session>,
    peer: Option<Arc<dyn PeerExtension>>,
    channels: SessionChannels,
) -> Result<(), TesterError> {
    let SessionChannels { inbox, mut signals } = channels;
    let env = PeerEnv::new(session.clone());

    let pump = match &peer {
        Some(peer) => {
            peer_phase(&session, "on_configure", peer.on_configure(&env)).await;
            peer_phase(&session, "on_init", peer.on_init(&env)).await;
            peer_phase(&session, "on_start", peer.on_start(&env)).await;
            Some(tokio::spawn(pump(peer.clone(), env.clone(), inbox)))
        }
        None => {
            session.close_inbox();
            drop(inbox);
            None
        }
    };

    let outcome = drive_tester(&session, &mut signals).await;

    if let Some(peer) = &peer {
        peer_phase(&session, "on_stop", peer.on_stop(&env)).await;
        peer_phase(&session, "on_deinit", peer.on_deinit(&env)).await;
    }
    session.close_inbox();
    if let Some(pump) = pump {
        pump.abort();
    }
    outcome
}

async fn drive_tester(
    session: &Session,
    signals: &mut mpsc::UnboundedReceiver<SessionSignal>,
) -> Result<(), TesterError> {
    let startup = [
        (BoundaryEvent::Configure, LifecyclePhase::Configuring),
        (BoundaryEvent::Init, LifecyclePhase::Initializing),
        (BoundaryEvent::Start, LifecyclePhase::Starting),
    ];
    for (event, phase) in startup {
        session.link.deliver(event)?;
        session
            .wait_for(signals, SessionSignal::PhaseDone(phase))
            .await?;
    }
    session.mark_tester_running();

    session.wait_for_stop().await?;

    session.link.on_stop()?;
    session
        .wait_for(signals, SessionSignal::PhaseDone(LifecyclePhase::Stopping))
        .await?;
    session.link.on_deinit()?;
    session
        .wait_for(signals, SessionSignal::PhaseDone(LifecyclePhase::Deinitializing))
        .await?;
    session.wait_for(signals, SessionSignal::EndOfLife).await
}

/// Feed tester messages to the extension's hooks in arrival order.
async fn pump(
    peer: Arc<dyn PeerExtension>,
    env: PeerEnv,
    mut inbox: mpsc::UnboundedReceiver<PeerInbound>,
) {
    let mut running: FuturesUnordered<BoxFuture<'static, ()>> = FuturesUnordered::new();
    loop {
        tokio::select! {
            biased;

            Some(()) = running.next(), if !running.is_empty() => {}

            message = inbox.recv() => match message {
                Some(message) => running.push(deliver(peer.clone(), env.clone(), message).boxed()),
                None => break,
            },
        }
    }
    while running.next().await.is_some() {}
}

async fn deliver(peer: Arc<dyn PeerExtension>, env: PeerEnv, message: PeerInbound) {
    let (hook, outcome) = match message {
        PeerInbound::Cmd(cmd) => {
            let id = cmd.correlation_id();
            let outcome = peer.on_cmd(&env, cmd).await;
            if let (Err(e), Some(id)) = (&outcome, id) {
                env.session().fail_tester_command(id, e);
            }
            ("on_cmd", outcome)
        }
        PeerInbound::Data(data, completion) => {
            completion.succeed(());
            ("on_data", peer.on_data(&env, data).await)
        }
        PeerInbound::VideoFrame(frame, completion) => {
            completion.succeed(());
            ("on_video_frame", peer.on_video_frame(&env, frame).await)
        }
        PeerInbound::AudioFrame(frame, completion) => {
            completion.succeed(());
            ("on_audio_frame", peer.on_audio_frame(&env, frame).await)
        }
    };
    if let Err(e) = outcome {
        error!(handle = %env.tester(), hook, error = %e, "Extension hook failed");
    }
}
