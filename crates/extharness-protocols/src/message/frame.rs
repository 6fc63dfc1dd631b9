//! One-way messages: data, video frames and audio frames.
//!
//! Payloads are opaque bytes; nothing in the harness interprets them.

use bytes::Bytes;

use super::{Message, MessageKind, Properties};

macro_rules! one_way_message {
    ($(#[$meta:meta])* $ty:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $ty {
            name: String,
            properties: Properties,
            payload: Bytes,
        }

        impl $ty {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    properties: Properties::new(),
                    payload: Bytes::new(),
                }
            }

            pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
                self.payload = payload.into();
                self
            }

            pub fn with_property(
                mut self,
                key: impl Into<String>,
                value: impl Into<serde_json::Value>,
            ) -> Self {
                self.properties.set(key, value);
                self
            }

            pub fn payload(&self) -> &Bytes {
                &self.payload
            }
        }

        impl Message for $ty {
            fn kind(&self) -> MessageKind {
                $kind
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn properties(&self) -> &Properties {
                &self.properties
            }

            fn properties_mut(&mut self) -> &mut Properties {
                &mut self.properties
            }
        }
    };
}

one_way_message!(
    /// A one-way data message.
    DataMessage,
    MessageKind::Data
);

one_way_message!(
    /// A one-way video frame.
    VideoFrameMessage,
    MessageKind::VideoFrame
);

one_way_message!(
    /// A one-way audio frame.
    AudioFrameMessage,
    MessageKind::AudioFrame
);
