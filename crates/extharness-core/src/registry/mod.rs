//! Registries.
//!
//! - [`TesterRegistry`] owns live tester instances by handle.
//! - [`BaseRegistry`] stores named items such as test cases and addons.

mod base;
mod tester;

pub use base::{BaseRegistry, Registerable};
pub use tester::{TesterInstance, TesterRegistry};
