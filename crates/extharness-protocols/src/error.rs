//! Tester errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TesterError {
    /// The boundary rejected the call before accepting it.
    #[error("Boundary rejected operation: {0}")]
    Boundary(String),

    /// The boundary accepted the call and later reported failure.
    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Hook {hook} failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: Box<TesterError>,
    },

    #[error("Invalid phase: {operation} requires {expected}, current phase is {actual}")]
    InvalidPhase {
        operation: &'static str,
        expected: crate::LifecyclePhase,
        actual: crate::LifecyclePhase,
    },

    /// A user hook panicked instead of returning.
    #[error("Panicked: {0}")]
    Panicked(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Test mode already configured")]
    AlreadyConfigured,

    #[error("Tester already running")]
    AlreadyRunning,

    #[error("Tester environment is closed")]
    Closed,

    #[error("Completion dropped before it was resolved")]
    CompletionDropped,

    #[error("Boundary disconnected before end of life")]
    BoundaryDisconnected,

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Property type mismatch for {key}: expected {expected}")]
    PropertyTypeMismatch { key: String, expected: &'static str },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl TesterError {
    /// Wrap an error returned by a user hook.
    pub fn hook(hook: &'static str, source: TesterError) -> Self {
        Self::Hook {
            hook,
            source: Box::new(source),
        }
    }

    /// Whether this error originated in a user hook.
    pub fn is_hook_error(&self) -> bool {
        matches!(self, Self::Hook { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LifecyclePhase;

    #[test]
    fn test_boundary_error() {
        let err = TesterError::Boundary("invalid handle".to_string());
        let display = err.to_string();
        assert!(display.contains("rejected"));
        assert!(display.contains("invalid handle"));
    }

    #[test]
    fn test_hook_error_wraps_source() {
        let err = TesterError::hook("on_start", TesterError::Custom("boom".to_string()));
        assert!(err.is_hook_error());
        let display = err.to_string();
        assert!(display.contains("on_start"));
        assert!(display.contains("boom"));
    }

    #[test]
    fn test_invalid_phase_error() {
        let err = TesterError::InvalidPhase {
            operation: "on_init",
            expected: LifecyclePhase::Configuring,
            actual: LifecyclePhase::Created,
        };
        let display = err.to_string();
        assert!(display.contains("on_init"));
        assert!(display.contains("configuring"));
        assert!(display.contains("created"));
    }

    #[test]
    fn test_property_type_mismatch() {
        let err = TesterError::PropertyTypeMismatch {
            key: "greetingMsg".to_string(),
            expected: "string",
        };
        assert!(err.to_string().contains("greetingMsg"));
    }

    #[test]
    fn test_json_error_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = TesterError::from(json_err);
        assert!(matches!(err, TesterError::Json(_)));
    }

    #[test]
    fn test_all_error_variants() {
        let errors: Vec<TesterError> = vec![
            TesterError::Boundary("a".to_string()),
            TesterError::Operation("b".to_string()),
            TesterError::Panicked("p".to_string()),
            TesterError::InvalidArgument("c".to_string()),
            TesterError::NotFound("n".to_string()),
            TesterError::AlreadyRegistered("r".to_string()),
            TesterError::AlreadyConfigured,
            TesterError::AlreadyRunning,
            TesterError::Closed,
            TesterError::CompletionDropped,
            TesterError::BoundaryDisconnected,
            TesterError::PropertyNotFound("d".to_string()),
            TesterError::Custom("e".to_string()),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
            assert!(!err.is_hook_error());
        }
    }
}
