//! The built-in `default_extension` addon.
//!
//! Answers `ping` with `pong` for every message kind and, when configured
//! with a `greetingMsg` property, greets the tester on start.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use extharness_core::Registerable;
use extharness_protocols::{
    AudioFrameMessage, Command, CommandResult, DataMessage, Message, TesterError,
    VideoFrameMessage,
};

use crate::addon::Addon;
use crate::peer::{PeerEnv, PeerExtension};

pub const DEFAULT_EXTENSION_ADDON: &str = "default_extension";
pub const GREETING_PROPERTY: &str = "greetingMsg";

/// Echo extension: `ping` in, `pong` out.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtension;

#[async_trait]
impl PeerExtension for DefaultExtension {
    async fn on_start(&self, env: &PeerEnv) -> Result<(), TesterError> {
        if let Ok(greeting) = env.get_property_string(GREETING_PROPERTY) {
            let mut cmd = Command::new("greeting");
            cmd.set_property_string(GREETING_PROPERTY, &greeting);
            // The greeting's result is not needed.
            drop(env.send_command(cmd));
        }
        Ok(())
    }

    async fn on_cmd(&self, env: &PeerEnv, cmd: Command) -> Result<(), TesterError> {
        if cmd.name() != "ping" {
            env.return_result(CommandResult::error(&cmd, "unknown command"))?;
            return Ok(());
        }
        env.return_result(CommandResult::ok(&cmd))?;
        drop(env.send_command(Command::new("pong")));
        Ok(())
    }

    async fn on_data(&self, env: &PeerEnv, data: DataMessage) -> Result<(), TesterError> {
        if data.name() == "ping" {
            env.send_data(DataMessage::new("pong"))
        } else {
            env.log_error(&format!("unexpected data '{}'", data.name()));
            Ok(())
        }
    }

    async fn on_video_frame(
        &self,
        env: &PeerEnv,
        frame: VideoFrameMessage,
    ) -> Result<(), TesterError> {
        if frame.name() == "ping" {
            env.send_video_frame(VideoFrameMessage::new("pong"))
        } else {
            env.log_error(&format!("unexpected video frame '{}'", frame.name()));
            Ok(())
        }
    }

    async fn on_audio_frame(
        &self,
        env: &PeerEnv,
        frame: AudioFrameMessage,
    ) -> Result<(), TesterError> {
        if frame.name() == "ping" {
            env.send_audio_frame(AudioFrameMessage::new("pong"))
        } else {
            env.log_error(&format!("unexpected audio frame '{}'", frame.name()));
            Ok(())
        }
    }
}

/// Registers [`DefaultExtension`] as `default_extension`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtensionAddon;

impl Registerable for DefaultExtensionAddon {
    fn registry_id(&self) -> &str {
        DEFAULT_EXTENSION_ADDON
    }
}

impl Addon for DefaultExtensionAddon {
    fn create_instance(&self, instance_name: &str) -> Arc<dyn PeerExtension> {
        debug!(instance = instance_name, "Creating default extension");
        Arc::new(DefaultExtension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addon_name() {
        assert_eq!(DefaultExtensionAddon.registry_id(), "default_extension");
    }

    #[test]
    fn test_addon_creates_instances() {
        let first = DefaultExtensionAddon.create_instance("a");
        let second = DefaultExtensionAddon.create_instance("b");
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
