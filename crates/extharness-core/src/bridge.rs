//! Completion bridge.
//!
//! Every outbound boundary call gets an operation id and an entry in a
//! pending table before the boundary sees it. The entry is the single
//! authority on whether the operation is still open: a synchronous rejection
//! removes it and surfaces the error through the returned [`Reply`], an
//! asynchronous completion removes it and resolves the [`Reply`]. Whichever
//! comes first wins and the other finds nothing to resolve.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use extharness_protocols::{
    CommandResult, Completion, OperationId, TesterError, TesterHandle,
};

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;

/// Which outbound operation a pending entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    SendCommand,
    SendData,
    SendVideoFrame,
    SendAudioFrame,
    ReturnResult,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SendCommand => "send_command",
            Self::SendData => "send_data",
            Self::SendVideoFrame => "send_video_frame",
            Self::SendAudioFrame => "send_audio_frame",
            Self::ReturnResult => "return_result",
        };
        f.write_str(name)
    }
}

/// Snapshot of an operation that is still waiting for its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperation {
    pub id: OperationId,
    pub kind: OperationKind,
}

type Outcome<T> = Result<T, TesterError>;

struct PendingEntry<T> {
    kind: OperationKind,
    tx: oneshot::Sender<Outcome<T>>,
}

struct PendingTable<T> {
    entries: Arc<Mutex<HashMap<OperationId, PendingEntry<T>>>>,
}

impl<T> Clone for PendingTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> PendingTable<T> {
    fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn register(&self, id: OperationId, kind: OperationKind) -> oneshot::Receiver<Outcome<T>> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().insert(id, PendingEntry { kind, tx });
        rx
    }

    /// Resolve `id` if it is still pending. Returns false when it was not.
    fn resolve(&self, id: OperationId, outcome: Outcome<T>) -> bool {
        let entry = self.entries.lock().remove(&id);
        match entry {
            Some(entry) => {
                // The awaiting side may have dropped its reply; that is fine.
                let _ = entry.tx.send(outcome);
                true
            }
            None => false,
        }
    }

    fn discard(&self, id: OperationId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    fn snapshot(&self) -> Vec<PendingOperation> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| PendingOperation {
                id: *id,
                kind: entry.kind,
            })
            .collect()
    }

    fn drain(&self) -> Vec<PendingOperation> {
        self.entries
            .lock()
            .drain()
            .map(|(id, entry)| PendingOperation { id, kind: entry.kind })
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Correlates boundary completions with awaiting callers for one tester.
pub struct CompletionBridge {
    handle: TesterHandle,
    next_operation: AtomicU64,
    commands: PendingTable<CommandResult>,
    acks: PendingTable<()>,
}

impl CompletionBridge {
    pub fn new(handle: TesterHandle) -> Self {
        Self {
            handle,
            next_operation: AtomicU64::new(1),
            commands: PendingTable::new(),
            acks: PendingTable::new(),
        }
    }

    pub fn handle(&self) -> TesterHandle {
        self.handle
    }

    /// Run a command send through the bridge.
    ///
    /// `call` receives the completion token and performs the boundary call.
    pub fn invoke_command<F>(&self, call: F) -> Reply<CommandResult>
    where
        F: FnOnce(Completion<CommandResult>) -> Result<(), TesterError>,
    {
        self.invoke_on(&self.commands, OperationKind::SendCommand, call)
    }

    /// Run a send that resolves with no value.
    pub fn invoke_ack<F>(&self, kind: OperationKind, call: F) -> Reply<()>
    where
        F: FnOnce(Completion<()>) -> Result<(), TesterError>,
    {
        self.invoke_on(&self.acks, kind, call)
    }

    fn invoke_on<T, F>(&self, table: &PendingTable<T>, kind: OperationKind, call: F) -> Reply<T>
    where
        T: Send + 'static,
        F: FnOnce(Completion<T>) -> Result<(), TesterError>,
    {
        let id = OperationId::new(self.next_operation.fetch_add(1, Ordering::SeqCst));
        let rx = table.register(id, kind);

        let resolver = table.clone();
        let handle = self.handle;
        let completion = Completion::new(id, move |outcome| {
            if !resolver.resolve(id, outcome) {
                debug!(%handle, operation = %id, %kind, "Discarding completion for closed operation");
            }
        });

        match call(completion) {
            Ok(()) => {
                trace!(handle = %self.handle, operation = %id, %kind, "Operation accepted");
                Reply::waiting(rx)
            }
            Err(e) => {
                // A completion the boundary kept must not resolve this operation later.
                table.discard(id);
                debug!(handle = %self.handle, operation = %id, %kind, error = %e, "Operation rejected");
                Reply::ready(Err(e))
            }
        }
    }

    /// Operations still waiting for a completion.
    pub fn outstanding(&self) -> Vec<PendingOperation> {
        let mut ops = self.commands.snapshot();
        ops.extend(self.acks.snapshot());
        ops.sort_by_key(|op| op.id);
        ops
    }

    pub fn outstanding_count(&self) -> usize {
        self.commands.len() + self.acks.len()
    }

    /// Drop every pending entry and report what was left open.
    ///
    /// Callers still awaiting one of these replies observe
    /// [`TesterError::CompletionDropped`].
    pub fn close(&self) -> Vec<PendingOperation> {
        let mut leaked = self.commands.drain();
        leaked.extend(self.acks.drain());
        leaked.sort_by_key(|op| op.id);
        if !leaked.is_empty() {
            warn!(
                handle = %self.handle,
                count = leaked.len(),
                "Closing bridge with unresolved operations"
            );
        }
        leaked
    }
}

impl fmt::Debug for CompletionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBridge")
            .field("handle", &self.handle)
            .field("outstanding", &self.outstanding_count())
            .finish()
    }
}

enum ReplyState<T> {
    Ready(Option<Outcome<T>>),
    Waiting(oneshot::Receiver<Outcome<T>>),
}

/// The eventual outcome of one outbound operation.
///
/// The boundary call has already been made when a `Reply` exists. Awaiting
/// it yields the outcome; dropping it leaves the operation running and
/// discards the outcome.
pub struct Reply<T> {
    state: ReplyState<T>,
}

impl<T> Reply<T> {
    /// A reply that is already resolved.
    pub fn ready(outcome: Outcome<T>) -> Self {
        Self {
            state: ReplyState::Ready(Some(outcome)),
        }
    }

    fn waiting(rx: oneshot::Receiver<Outcome<T>>) -> Self {
        Self {
            state: ReplyState::Waiting(rx),
        }
    }
}

impl<T> Unpin for Reply<T> {}

impl<T> Future for Reply<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            ReplyState::Ready(outcome) => Poll::Ready(outcome.take().unwrap_or_else(|| {
                Err(TesterError::Custom("reply polled after completion".to_string()))
            })),
            ReplyState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(Err(TesterError::CompletionDropped)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ReplyState::Ready(_) => "ready",
            ReplyState::Waiting(_) => "waiting",
        };
        f.debug_struct("Reply").field("state", &state).finish()
    }
}
