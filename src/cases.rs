//! Built-in test cases.
//!
//! A case builds a fresh tester per run. The tester records its verdict in a
//! shared [`Verdict`] slot that the runner reads once the run is over.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use extharness_core::protocols::{
    AudioFrameMessage, Command, CommandResult, DataMessage, Message, Properties, TesterError,
    VideoFrameMessage,
};
use extharness_core::{BaseRegistry, ExtensionUnderTest, Registerable, TesterEnv};
use extharness_loopback::default_extension::{DEFAULT_EXTENSION_ADDON, GREETING_PROPERTY};

/// Outcome slot shared between a tester and the runner.
#[derive(Debug, Default)]
pub struct Verdict(Mutex<Option<Result<(), String>>>);

impl Verdict {
    pub fn pass(&self) {
        self.settle(Ok(()));
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.settle(Err(reason.into()));
    }

    /// The first verdict sticks.
    fn settle(&self, outcome: Result<(), String>) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
    }

    pub fn outcome(&self) -> Result<(), String> {
        self.0
            .lock()
            .clone()
            .unwrap_or_else(|| Err("tester reached no verdict".to_string()))
    }
}

/// A tester ready to run, with the slot it reports into.
pub struct PreparedCase {
    pub tester: Arc<dyn ExtensionUnderTest>,
    pub verdict: Arc<Verdict>,
}

/// A named scenario run against an extension under test.
pub trait TestCase: Registerable {
    fn description(&self) -> &str;

    /// Addon hosted when the configuration names none.
    fn default_addon(&self) -> &str {
        DEFAULT_EXTENSION_ADDON
    }

    /// Properties used unless the configuration overrides them.
    fn default_properties(&self) -> Properties {
        Properties::new()
    }

    /// Build a tester for one run with the resolved `properties`.
    fn prepare(&self, properties: &Properties) -> PreparedCase;
}

pub type TestCaseRegistry = BaseRegistry<dyn TestCase>;

/// Registry holding every built-in case.
pub fn builtin_cases() -> Result<TestCaseRegistry, TesterError> {
    let registry = TestCaseRegistry::new();
    registry.register(Arc::new(CmdPingPongCase))?;
    for kind in [FrameKind::Data, FrameKind::Video, FrameKind::Audio] {
        registry.register(Arc::new(FramePingPongCase { kind }))?;
    }
    registry.register(Arc::new(GreetingCase))?;
    Ok(registry)
}

fn prepared<T: ExtensionUnderTest>(build: impl FnOnce(Arc<Verdict>) -> T) -> PreparedCase {
    let verdict = Arc::new(Verdict::default());
    PreparedCase {
        tester: Arc::new(build(verdict.clone())),
        verdict,
    }
}

// cmd_ping_pong

struct CmdPingPongCase;

impl Registerable for CmdPingPongCase {
    fn registry_id(&self) -> &str {
        "cmd_ping_pong"
    }
}

impl TestCase for CmdPingPongCase {
    fn description(&self) -> &str {
        "send a ping command, expect an ok result followed by a pong command"
    }

    fn prepare(&self, _properties: &Properties) -> PreparedCase {
        prepared(|verdict| CmdPingPongTester {
            verdict,
            result_ok: Mutex::new(false),
        })
    }
}

struct CmdPingPongTester {
    verdict: Arc<Verdict>,
    result_ok: Mutex<bool>,
}

#[async_trait]
impl ExtensionUnderTest for CmdPingPongTester {
    async fn on_start(&self, env: &TesterEnv) -> Result<(), TesterError> {
        let result = env.send_command(Command::new("ping")).await?;
        if result.is_ok() {
            *self.result_ok.lock() = true;
        } else {
            self.verdict.fail(format!("ping answered with status {}", result.status()));
            env.stop_test()?;
        }
        Ok(())
    }

    async fn on_cmd(&self, env: &TesterEnv, cmd: Command) -> Result<(), TesterError> {
        if cmd.name() != "pong" {
            return Ok(());
        }
        if *self.result_ok.lock() {
            self.verdict.pass();
        } else {
            self.verdict.fail("pong arrived before the ping result");
        }
        env.return_result(CommandResult::ok(&cmd)).await?;
        env.stop_test()
    }
}

// data/video_frame/audio_frame ping pong

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Data,
    Video,
    Audio,
}

struct FramePingPongCase {
    kind: FrameKind,
}

impl Registerable for FramePingPongCase {
    fn registry_id(&self) -> &str {
        match self.kind {
            FrameKind::Data => "data_ping_pong",
            FrameKind::Video => "video_frame_ping_pong",
            FrameKind::Audio => "audio_frame_ping_pong",
        }
    }
}

impl TestCase for FramePingPongCase {
    fn description(&self) -> &str {
        match self.kind {
            FrameKind::Data => "send ping data, expect pong data",
            FrameKind::Video => "send a ping video frame, expect a pong video frame",
            FrameKind::Audio => "send a ping audio frame, expect a pong audio frame",
        }
    }

    fn prepare(&self, _properties: &Properties) -> PreparedCase {
        let kind = self.kind;
        prepared(|verdict| FramePingPongTester { kind, verdict })
    }
}

struct FramePingPongTester {
    kind: FrameKind,
    verdict: Arc<Verdict>,
}

impl FramePingPongTester {
    fn received(&self, env: &TesterEnv, kind: FrameKind, name: &str) -> Result<(), TesterError> {
        if kind != self.kind {
            self.verdict.fail(format!("expected {:?}, got {:?} '{}'", self.kind, kind, name));
        } else if name == "pong" {
            self.verdict.pass();
        } else {
            self.verdict.fail(format!("expected 'pong', got '{}'", name));
        }
        env.stop_test()
    }
}

#[async_trait]
impl ExtensionUnderTest for FramePingPongTester {
    async fn on_start(&self, env: &TesterEnv) -> Result<(), TesterError> {
        match self.kind {
            FrameKind::Data => env.send_data(DataMessage::new("ping")).await,
            FrameKind::Video => env.send_video_frame(VideoFrameMessage::new("ping")).await,
            FrameKind::Audio => env.send_audio_frame(AudioFrameMessage::new("ping")).await,
        }
    }

    async fn on_data(&self, env: &TesterEnv, data: DataMessage) -> Result<(), TesterError> {
        self.received(env, FrameKind::Data, data.name())
    }

    async fn on_video_frame(
        &self,
        env: &TesterEnv,
        frame: VideoFrameMessage,
    ) -> Result<(), TesterError> {
        self.received(env, FrameKind::Video, frame.name())
    }

    async fn on_audio_frame(
        &self,
        env: &TesterEnv,
        frame: AudioFrameMessage,
    ) -> Result<(), TesterError> {
        self.received(env, FrameKind::Audio, frame.name())
    }
}

// greeting

const DEFAULT_GREETING: &str = "hello world";

struct GreetingCase;

impl Registerable for GreetingCase {
    fn registry_id(&self) -> &str {
        "greeting"
    }
}

impl TestCase for GreetingCase {
    fn description(&self) -> &str {
        "configure a greeting, expect it as the first command"
    }

    fn default_properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.set_string(GREETING_PROPERTY, DEFAULT_GREETING);
        properties
    }

    fn prepare(&self, properties: &Properties) -> PreparedCase {
        let expected = properties.get_string(GREETING_PROPERTY).ok();
        prepared(|verdict| GreetingTester { expected, verdict })
    }
}

struct GreetingTester {
    expected: Option<String>,
    verdict: Arc<Verdict>,
}

#[async_trait]
impl ExtensionUnderTest for GreetingTester {
    async fn on_start(&self, env: &TesterEnv) -> Result<(), TesterError> {
        if self.expected.is_none() {
            self.verdict.fail(format!("no '{}' property configured", GREETING_PROPERTY));
            env.stop_test()?;
        }
        Ok(())
    }

    async fn on_cmd(&self, env: &TesterEnv, cmd: Command) -> Result<(), TesterError> {
        if cmd.name() != "greeting" {
            return Ok(());
        }
        let received = cmd.get_property_string(GREETING_PROPERTY)?;
        match &self.expected {
            Some(expected) if *expected == received => self.verdict.pass(),
            Some(expected) => self
                .verdict
                .fail(format!("expected greeting '{}', got '{}'", expected, received)),
            None => self.verdict.fail("unexpected greeting"),
        }
        env.return_result(CommandResult::ok(&cmd)).await?;
        env.stop_test()
    }
}
