//! Lifecycle controller.
//!
//! A controller owns one tester instance and drives it through
//! `configure -> init -> start -> running -> stop -> deinit -> end of life`
//! as the boundary asks it to. Phase hooks run one at a time on the
//! controller's own task; inbound messages are forwarded to the message hooks
//! only while the tester is running.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, OptionFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use extharness_protocols::{
    BoundaryEvent, ControllerLink, LifecyclePhase, Properties, RuntimeBoundary, TestMode,
    TesterError, TesterHandle,
};

use crate::env::TesterEnv;
use crate::hooks::ExtensionUnderTest;
use crate::registry::TesterRegistry;

#[path = "lifecycle_proxies.rs"]
mod lifecycle_proxies;
use lifecycle_proxies::{dispatch, run_phase};

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

/// State shared between the controller and the hook futures it spawns.
pub(crate) struct ControllerShared {
    pub(crate) handle: TesterHandle,
    pub(crate) hooks: Arc<dyn ExtensionUnderTest>,
    pub(crate) env: TesterEnv,
    pub(crate) boundary: Arc<dyn RuntimeBoundary>,
    phase: AtomicU8,
    end_of_life: AtomicBool,
}

impl ControllerShared {
    pub(crate) fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from(self.phase.load(Ordering::SeqCst))
    }

    pub(crate) fn set_phase(&self, phase: LifecyclePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    /// Move into `phase`, which is only legal from its predecessor.
    pub(crate) fn enter(
        &self,
        phase: LifecyclePhase,
        operation: &'static str,
    ) -> Result<(), TesterError> {
        let expected = phase.predecessor().unwrap_or(LifecyclePhase::Created);
        self.phase
            .compare_exchange(expected as u8, phase as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| TesterError::InvalidPhase {
                operation,
                expected,
                actual: LifecyclePhase::from(actual),
            })
    }

    /// Emit end of life. Only the first call has any effect.
    pub(crate) fn emit_end_of_life(&self) {
        if self.end_of_life.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_phase(LifecyclePhase::EndOfLife);
        self.env.close();
        self.boundary.on_end_of_life(self.handle);
        info!(handle = %self.handle, "End of life");
    }
}

/// Drives one tester instance for one run.
pub struct LifecycleController {
    shared: Arc<ControllerShared>,
    registry: Arc<TesterRegistry>,
    test_mode: Option<TestMode>,
    started: bool,
}

impl LifecycleController {
    /// Create a tester instance in `registry` backed by `hooks`.
    pub fn new(
        registry: Arc<TesterRegistry>,
        boundary: Arc<dyn RuntimeBoundary>,
        hooks: Arc<dyn ExtensionUnderTest>,
    ) -> Self {
        let instance = registry.create(hooks);
        let handle = instance.handle();
        let env = TesterEnv::new(handle, boundary.clone(), instance.bridge());

        Self {
            shared: Arc::new(ControllerShared {
                handle,
                hooks: instance.hooks(),
                env,
                boundary,
                phase: AtomicU8::new(LifecyclePhase::Created as u8),
                end_of_life: AtomicBool::new(false),
            }),
            registry,
            test_mode: None,
            started: false,
        }
    }

    pub fn handle(&self) -> TesterHandle {
        self.shared.handle
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.shared.phase()
    }

    pub fn env(&self) -> &TesterEnv {
        &self.shared.env
    }

    pub fn test_mode(&self) -> Option<&TestMode> {
        self.test_mode.as_ref()
    }

    /// Host a single addon, configured with `property_json`, as the
    /// extension under test.
    ///
    /// May be called once, before [`LifecycleController::run`].
    pub fn set_test_mode_single(
        &mut self,
        addon_name: &str,
        property_json: &str,
    ) -> Result<(), TesterError> {
        if self.started {
            return Err(TesterError::AlreadyRunning);
        }
        if self.test_mode.is_some() {
            return Err(TesterError::AlreadyConfigured);
        }
        if addon_name.trim().is_empty() {
            return Err(TesterError::InvalidArgument(
                "addon name must not be empty".to_string(),
            ));
        }

        let mode = TestMode::Single {
            addon_name: addon_name.to_string(),
            properties: Properties::from_json_str(property_json)?,
        };
        self.shared
            .boundary
            .configure_test_mode(self.shared.handle, &mode)?;

        info!(handle = %self.shared.handle, addon = addon_name, "Test mode configured");
        self.test_mode = Some(mode);
        Ok(())
    }

    /// Hand control to the boundary and drive the tester until end of life.
    ///
    /// Resolves `Ok` once end of life is reached, or with the first error
    /// that aborted the run. The tester instance is released either way.
    pub async fn run(&mut self) -> Result<(), TesterError> {
        if self.started {
            return Err(TesterError::AlreadyRunning);
        }
        self.started = true;

        let handle = self.shared.handle;
        info!(
            %handle,
            addon = self.test_mode.as_ref().map(TestMode::addon_name),
            "Tester run starting"
        );

        let (link, events) = ControllerLink::channel(handle);
        let outcome = match self.shared.boundary.run(handle, link) {
            Ok(()) => drive(self.shared.clone(), events).await,
            Err(e) => Err(e),
        };

        self.shared.env.close();
        self.registry.dispose(handle);
        match &outcome {
            Ok(()) => info!(%handle, "Tester run finished"),
            Err(e) => error!(%handle, phase = %self.shared.phase(), error = %e, "Tester run failed"),
        }
        outcome
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.registry.dispose(self.shared.handle);
        self.shared.boundary.release(self.shared.handle);
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("handle", &self.shared.handle)
            .field("phase", &self.shared.phase())
            .field("test_mode", &self.test_mode)
            .field("started", &self.started)
            .finish()
    }
}

type PhaseTask = BoxFuture<'static, Result<LifecyclePhase, TesterError>>;
type DispatchTask = BoxFuture<'static, Result<(), TesterError>>;

/// Event loop of one run.
///
/// Inbound events are not read while a phase hook is in flight, so the next
/// phase can never overlap the current one. Message hooks keep being polled
/// throughout.
async fn drive(
    shared: Arc<ControllerShared>,
    mut events: mpsc::UnboundedReceiver<BoundaryEvent>,
) -> Result<(), TesterError> {
    let mut phase_task: Option<PhaseTask> = None;
    let mut dispatches: FuturesUnordered<DispatchTask> = FuturesUnordered::new();

    loop {
        tokio::select! {
            biased;

            Some(result) = dispatches.next(), if !dispatches.is_empty() => {
                result?;
            }

            Some(result) = OptionFuture::from(phase_task.as_mut()), if phase_task.is_some() => {
                phase_task = None;
                if result? == LifecyclePhase::EndOfLife {
                    if !dispatches.is_empty() {
                        debug!(
                            handle = %shared.handle,
                            count = dispatches.len(),
                            "Dropping message hooks still running at end of life"
                        );
                    }
                    return Ok(());
                }
            }

            event = events.recv(), if phase_task.is_none() => {
                let Some(event) = event else {
                    return Err(TesterError::BoundaryDisconnected);
                };
                match event.phase() {
                    Some(phase) => phase_task = Some(run_phase(shared.clone(), phase).boxed()),
                    None => {
                        if let Some(task) = dispatch(&shared, event) {
                            dispatches.push(task);
                        }
                    }
                }
            }

            else => return Err(TesterError::BoundaryDisconnected),
        }
    }
}
