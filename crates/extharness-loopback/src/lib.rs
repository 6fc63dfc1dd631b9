//! # extharness Loopback
//!
//! An in-process [`RuntimeBoundary`](extharness_protocols::RuntimeBoundary).
//!
//! [`LoopbackRuntime`] hosts the extension under test, created from an
//! [`Addon`] in its [`AddonRegistry`], and connects it to a tester through
//! in-memory channels. It drives both sides through their lifecycles: the
//! extension is started before the tester, and messages the extension sends
//! before the tester is running are held back until it is.

pub mod addon;
pub mod default_extension;
pub mod peer;
pub mod runtime;
mod session;

pub use addon::{Addon, AddonRegistry, FnAddon};
pub use default_extension::{DefaultExtension, DefaultExtensionAddon};
pub use peer::{PeerEnv, PeerExtension};
pub use runtime::LoopbackRuntime;
