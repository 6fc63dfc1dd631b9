//! Message envelope model.
//!
//! Every message has a name and a [`Properties`] bag. Messages are plain
//! values; handing one to a send operation moves it, so a sent message can no
//! longer be mutated by the sender.

mod command;
mod frame;
mod properties;

pub use command::{Command, CommandRef, CommandResult, StatusCode};
pub use frame::{AudioFrameMessage, DataMessage, VideoFrameMessage};
pub use properties::Properties;

use crate::error::TesterError;

/// Kind of a message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    CommandResult,
    Data,
    VideoFrame,
    AudioFrame,
}

/// Capability shared by all message envelopes.
pub trait Message {
    fn kind(&self) -> MessageKind;

    fn name(&self) -> &str;

    fn properties(&self) -> &Properties;

    fn properties_mut(&mut self) -> &mut Properties;

    fn get_property_string(&self, key: &str) -> Result<String, TesterError> {
        self.properties().get_string(key)
    }

    fn get_property_int(&self, key: &str) -> Result<i64, TesterError> {
        self.properties().get_int(key)
    }

    fn get_property_bool(&self, key: &str) -> Result<bool, TesterError> {
        self.properties().get_bool(key)
    }

    fn set_property_string(&mut self, key: &str, value: &str) {
        self.properties_mut().set_string(key, value);
    }

    fn set_property_from_json(&mut self, json: &str) -> Result<(), TesterError> {
        self.properties_mut().merge_json_str(json)
    }
}
