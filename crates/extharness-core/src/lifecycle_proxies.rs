//! Futures that run user hooks on behalf of the controller.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use extharness_protocols::{BoundaryEvent, LifecyclePhase, Message, TesterError};

use super::ControllerShared;

fn hook_name(phase: LifecyclePhase) -> &'static str {
    match phase {
        LifecyclePhase::Configuring => "on_configure",
        LifecyclePhase::Initializing => "on_init",
        LifecyclePhase::Starting => "on_start",
        LifecyclePhase::Stopping => "on_stop",
        LifecyclePhase::Deinitializing => "on_deinit",
        _ => "none",
    }
}

/// Run one hook, turning both its error and a panic into a hook error.
async fn guarded<F>(shared: &ControllerShared, hook: &'static str, call: F) -> Result<(), TesterError>
where
    F: Future<Output = Result<(), TesterError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome.map_err(|e| TesterError::hook(hook, e)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(handle = %shared.handle, hook, panic = %message, "Hook panicked");
            Err(TesterError::hook(hook, TesterError::Panicked(message)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Enter `phase`, run its hook, and report the phase as done.
///
/// Resolves with the phase the tester is in afterwards. Deinit always ends in
/// end of life, even when its hook fails; the failure is still returned.
pub(super) async fn run_phase(
    shared: Arc<ControllerShared>,
    phase: LifecyclePhase,
) -> Result<LifecyclePhase, TesterError> {
    let hook = hook_name(phase);
    shared.enter(phase, hook)?;
    debug!(handle = %shared.handle, %phase, hook, "Entering phase");

    let env = &shared.env;
    let hooks = &shared.hooks;
    let call = match phase {
        LifecyclePhase::Configuring => hooks.on_configure(env),
        LifecyclePhase::Initializing => hooks.on_init(env),
        LifecyclePhase::Starting => hooks.on_start(env),
        LifecyclePhase::Stopping => hooks.on_stop(env),
        LifecyclePhase::Deinitializing => hooks.on_deinit(env),
        other => {
            return Err(TesterError::Custom(format!("phase {} has no hook", other)));
        }
    };
    let outcome = guarded(&shared, hook, call).await;

    if phase == LifecyclePhase::Deinitializing {
        shared.boundary.on_phase_done(shared.handle, phase);
        shared.emit_end_of_life();
        return outcome.map(|()| LifecyclePhase::EndOfLife);
    }

    outcome?;
    if phase == LifecyclePhase::Starting {
        shared.set_phase(LifecyclePhase::Running);
        shared.boundary.on_phase_done(shared.handle, phase);
        info!(handle = %shared.handle, "Tester running");
        return Ok(LifecyclePhase::Running);
    }

    shared.boundary.on_phase_done(shared.handle, phase);
    Ok(phase)
}

/// Build the hook future for an inbound message.
///
/// Returns `None` when the tester is not running; the message is dropped.
pub(super) fn dispatch(
    shared: &Arc<ControllerShared>,
    event: BoundaryEvent,
) -> Option<BoxFuture<'static, Result<(), TesterError>>> {
    let phase = shared.phase();
    if phase != LifecyclePhase::Running {
        let (kind, name) = describe(&event);
        warn!(
            handle = %shared.handle,
            %phase,
            kind,
            name,
            "Dropping message received outside the running phase"
        );
        return None;
    }

    let shared = shared.clone();
    let task = match event {
        BoundaryEvent::Cmd(cmd) => async move {
            guarded(&shared, "on_cmd", shared.hooks.on_cmd(&shared.env, cmd)).await
        }
        .boxed(),
        BoundaryEvent::Data(data) => async move {
            guarded(&shared, "on_data", shared.hooks.on_data(&shared.env, data)).await
        }
        .boxed(),
        BoundaryEvent::VideoFrame(frame) => async move {
            guarded(&shared, "on_video_frame", shared.hooks.on_video_frame(&shared.env, frame)).await
        }
        .boxed(),
        BoundaryEvent::AudioFrame(frame) => async move {
            guarded(&shared, "on_audio_frame", shared.hooks.on_audio_frame(&shared.env, frame)).await
        }
        .boxed(),
        BoundaryEvent::Configure
        | BoundaryEvent::Init
        | BoundaryEvent::Start
        | BoundaryEvent::Stop
        | BoundaryEvent::Deinit => return None,
    };
    Some(task)
}

fn describe(event: &BoundaryEvent) -> (&'static str, &str) {
    match event {
        BoundaryEvent::Cmd(cmd) => ("cmd", cmd.name()),
        BoundaryEvent::Data(data) => ("data", data.name()),
        BoundaryEvent::VideoFrame(frame) => ("video_frame", frame.name()),
        BoundaryEvent::AudioFrame(frame) => ("audio_frame", frame.name()),
        _ => ("phase", ""),
    }
}
