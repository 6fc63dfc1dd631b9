//! Commands and command results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Message, MessageKind, Properties};
use crate::error::TesterError;
use crate::handle::CorrelationId;

/// A request-shaped message expecting at most one correlated result.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    properties: Properties,
    correlation_id: Option<CorrelationId>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
            correlation_id: None,
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.set(key, value);
        self
    }

    /// Correlation id, present once the command has been sent.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    pub fn is_sent(&self) -> bool {
        self.correlation_id.is_some()
    }

    /// Stamp a fresh correlation id at send time.
    ///
    /// Fails if the command already carries one; a correlation id belongs to
    /// exactly one logical send.
    pub fn assign_correlation_id(&mut self) -> Result<CorrelationId, TesterError> {
        if let Some(existing) = self.correlation_id {
            return Err(TesterError::InvalidArgument(format!(
                "command '{}' was already sent with correlation id {}",
                self.name, existing
            )));
        }
        let id = CorrelationId::generate();
        self.correlation_id = Some(id);
        Ok(id)
    }
}

impl Message for Command {
    fn kind(&self) -> MessageKind {
        MessageKind::Command
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

/// Status carried by a command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    Ok,
    Error,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Back-reference from a result to the command it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRef {
    pub name: String,
    pub correlation_id: Option<CorrelationId>,
}

/// The single reply to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    status: StatusCode,
    properties: Properties,
    original: CommandRef,
}

impl CommandResult {
    pub fn new(status: StatusCode, command: &Command) -> Self {
        Self {
            status,
            properties: Properties::new(),
            original: CommandRef {
                name: command.name.clone(),
                correlation_id: command.correlation_id,
            },
        }
    }

    pub fn ok(command: &Command) -> Self {
        Self::new(StatusCode::Ok, command)
    }

    /// An error result with a `detail` property.
    pub fn error(command: &Command, detail: impl Into<String>) -> Self {
        let mut result = Self::new(StatusCode::Error, command);
        result.properties.set_string("detail", detail);
        result
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Ok
    }

    pub fn original(&self) -> &CommandRef {
        &self.original
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.original.correlation_id
    }
}

impl Message for CommandResult {
    fn kind(&self) -> MessageKind {
        MessageKind::CommandResult
    }

    fn name(&self) -> &str {
        &self.original.name
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
}
