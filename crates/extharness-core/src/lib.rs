//! # extharness Core
//!
//! The tester side of the harness.
//!
//! ## Components
//!
//! - [`LifecycleController`] - drives one tester through its phases and
//!   forwards inbound messages to its hooks
//! - [`CompletionBridge`] - turns boundary completions into awaitable [`Reply`]s
//! - [`TesterEnv`] - the facade handed to every hook
//! - [`ExtensionUnderTest`] - the hooks a test author implements
//! - Registries for tester instances and named items

pub mod bridge;
pub mod env;
pub mod hooks;
pub mod lifecycle;
pub mod registry;

#[cfg(test)]
mod testing;

pub use extharness_protocols as protocols;

pub use bridge::{CompletionBridge, OperationKind, PendingOperation, Reply};
pub use env::TesterEnv;
pub use hooks::{ExtensionUnderTest, NoopTester};
pub use lifecycle::LifecycleController;
pub use registry::{BaseRegistry, Registerable, TesterInstance, TesterRegistry};
