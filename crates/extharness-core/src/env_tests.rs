use super::*;
use crate::testing::ScriptedBoundary;

fn env_with(boundary: Arc<ScriptedBoundary>) -> (TesterEnv, Arc<CompletionBridge>) {
    let handle = TesterHandle::new(1);
    let bridge = Arc::new(CompletionBridge::new(handle));
    (TesterEnv::new(handle, boundary, bridge.clone()), bridge)
}

#[tokio::test]
async fn test_send_command_resolves_with_result() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, bridge) = env_with(boundary.clone());

    let result = env.send_command(Command::new("ping")).await.unwrap();
    assert!(result.is_ok());
    assert_eq!(result.name(), "ping");
    assert!(result.correlation_id().is_some());
    assert_eq!(boundary.calls(), vec!["send_command:ping"]);
    assert_eq!(bridge.outstanding_count(), 0);
}

#[tokio::test]
async fn test_send_command_rejects_already_sent_command() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    let mut cmd = Command::new("ping");
    cmd.assign_correlation_id().unwrap();

    let result = env.send_command(cmd).await;
    assert!(matches!(result, Err(TesterError::InvalidArgument(_))));
    assert!(boundary.calls().is_empty());
}

#[tokio::test]
async fn test_sync_rejection_is_not_left_pending() {
    let boundary = Arc::new(ScriptedBoundary::default());
    boundary.reject_sends.store(true, Ordering::SeqCst);
    let (env, bridge) = env_with(boundary.clone());

    let result = env.send_command(Command::new("ping")).await;
    assert!(matches!(result, Err(TesterError::Boundary(_))));
    assert!(env.send_data(DataMessage::new("d")).await.is_err());
    assert_eq!(bridge.outstanding_count(), 0);
}

#[tokio::test]
async fn test_held_command_stays_outstanding() {
    let boundary = Arc::new(ScriptedBoundary::default());
    boundary.hold_commands.store(true, Ordering::SeqCst);
    let (env, bridge) = env_with(boundary.clone());

    let reply = env.send_command(Command::new("slow"));
    assert_eq!(bridge.outstanding_count(), 1);

    let completion = boundary.held.lock().pop().unwrap();
    completion.succeed(CommandResult::error(&Command::new("slow"), "nope"));

    let result = reply.await.unwrap();
    assert!(!result.is_ok());
    assert_eq!(result.get_property_string("detail").unwrap(), "nope");
}

#[tokio::test]
async fn test_one_way_sends() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    env.send_data(DataMessage::new("d")).await.unwrap();
    env.send_video_frame(VideoFrameMessage::new("v")).await.unwrap();
    env.send_audio_frame(AudioFrameMessage::new("a")).await.unwrap();

    assert_eq!(
        boundary.calls(),
        vec!["send_data:d", "send_video_frame:v", "send_audio_frame:a"]
    );
}

#[tokio::test]
async fn test_fire_and_forget_still_reaches_boundary() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    drop(env.send_data(DataMessage::new("d")));
    assert_eq!(boundary.calls(), vec!["send_data:d"]);
}

#[tokio::test]
async fn test_return_result() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    let mut cmd = Command::new("pong");
    cmd.assign_correlation_id().unwrap();
    env.return_result(CommandResult::ok(&cmd)).await.unwrap();

    assert_eq!(boundary.calls(), vec!["return_result:pong:ok"]);
}

#[test]
fn test_stop_test_reaches_boundary_once() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    assert!(!env.is_stop_requested());
    env.stop_test().unwrap();
    env.stop_test().unwrap();

    assert!(env.is_stop_requested());
    assert_eq!(boundary.count("stop_test"), 1);
}

#[test]
fn test_log_records_caller_location() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    env.log_info("hello").unwrap();

    let logs = boundary.logs.lock();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Info);
    assert_eq!(logs[0].message, "hello");
    assert_eq!(logs[0].location.function, "anonymous");
    assert!(logs[0].location.file.ends_with("env_tests.rs"));
    assert!(logs[0].location.line > 0);
}

#[test]
fn test_log_macro_records_module_path() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    crate::tester_warn!(env, "seen {} frames", 3).unwrap();

    let logs = boundary.logs.lock();
    assert_eq!(logs[0].level, LogLevel::Warn);
    assert_eq!(logs[0].message, "seen 3 frames");
    assert!(logs[0].location.function.contains("env"));
}

#[test]
fn test_log_levels() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    env.log_verbose("v").unwrap();
    env.log_debug("d").unwrap();
    env.log_warn("w").unwrap();
    env.log_error("e").unwrap();
    env.log_fatal("f").unwrap();

    let levels: Vec<_> = boundary.logs.lock().iter().map(|r| r.level).collect();
    assert_eq!(
        levels,
        vec![
            LogLevel::Verbose,
            LogLevel::Debug,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Fatal
        ]
    );
}

#[test]
fn test_empty_log_message_rejected() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());

    let result = env.log(LogLevel::Info, "");
    assert!(matches!(result, Err(TesterError::InvalidArgument(_))));
    assert!(boundary.logs.lock().is_empty());
}

#[tokio::test]
async fn test_closed_env_rejects_everything() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary.clone());
    env.close();

    assert!(env.is_closed());
    assert!(matches!(
        env.send_command(Command::new("ping")).await,
        Err(TesterError::Closed)
    ));
    assert!(matches!(
        env.send_data(DataMessage::new("d")).await,
        Err(TesterError::Closed)
    ));
    assert!(matches!(env.stop_test(), Err(TesterError::Closed)));
    assert!(matches!(env.log_info("late"), Err(TesterError::Closed)));
    assert!(boundary.calls().is_empty());
}

#[test]
fn test_debug_output() {
    let boundary = Arc::new(ScriptedBoundary::default());
    let (env, _bridge) = env_with(boundary);
    let debug = format!("{:?}", env);
    assert!(debug.contains("TesterEnv"));
    assert!(debug.contains("closed"));
}
