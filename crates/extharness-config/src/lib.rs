//! # extharness Config
//!
//! Configuration for the harness runner: logging, run policy and the list of
//! test cases to execute.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
