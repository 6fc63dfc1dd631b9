//! # extharness Protocols
//!
//! Protocol definitions for the extharness test harness.
//! Contains only value types and interface definitions - no runtime logic.
//!
//! ## Core Types
//!
//! - [`Command`], [`CommandResult`], [`DataMessage`], [`VideoFrameMessage`],
//!   [`AudioFrameMessage`] - the message envelope model
//! - [`RuntimeBoundary`] - the contract the harness core consumes from the
//!   runtime engine
//! - [`ControllerLink`] - the boundary's way back into a lifecycle controller
//! - [`Completion`] - a single-use completion token for one boundary operation
//! - [`LifecyclePhase`] - the strictly ordered lifecycle of a tester instance

pub mod boundary;
pub mod error;
pub mod handle;
pub mod log;
pub mod message;
pub mod phase;

pub use boundary::{BoundaryEvent, Completion, ControllerLink, RuntimeBoundary, TestMode};
pub use error::TesterError;
pub use handle::{CorrelationId, OperationId, TesterHandle};
pub use log::{LogLevel, LogLocation, LogRecord};
pub use message::{
    AudioFrameMessage, Command, CommandRef, CommandResult, DataMessage, Message, MessageKind,
    Properties, StatusCode, VideoFrameMessage,
};
pub use phase::LifecyclePhase;
