//! Hooks implemented by a test author.

use async_trait::async_trait;

use extharness_protocols::{
    AudioFrameMessage, Command, DataMessage, TesterError, VideoFrameMessage,
};

use crate::env::TesterEnv;

/// The tester side of a test: phase hooks and inbound message hooks.
///
/// Every hook has a no-op default. Phase hooks run one at a time, in phase
/// order. Message hooks only run while the tester is running and may
/// overlap each other, but each one starts in the order its message arrived.
/// An error from any hook aborts the run.
#[async_trait]
pub trait ExtensionUnderTest: Send + Sync + 'static {
    async fn on_configure(&self, _env: &TesterEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_init(&self, _env: &TesterEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_start(&self, _env: &TesterEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_stop(&self, _env: &TesterEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_deinit(&self, _env: &TesterEnv) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_cmd(&self, _env: &TesterEnv, _cmd: Command) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_data(&self, _env: &TesterEnv, _data: DataMessage) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_video_frame(
        &self,
        _env: &TesterEnv,
        _frame: VideoFrameMessage,
    ) -> Result<(), TesterError> {
        Ok(())
    }

    async fn on_audio_frame(
        &self,
        _env: &TesterEnv,
        _frame: AudioFrameMessage,
    ) -> Result<(), TesterError> {
        Ok(())
    }
}

/// A tester that overrides nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTester;

impl ExtensionUnderTest for NoopTester {}
