//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::HarnessConfig;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error, if any, into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

const KNOWN_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &HarnessConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_logging(config, &mut result);
        Self::validate_run(config, &mut result);
        Self::validate_cases(config, &mut result);
        result
    }

    fn validate_logging(config: &HarnessConfig, result: &mut ValidationResult) {
        let level = config.logging.level.trim();
        if level.is_empty() {
            result.add_error(ValidationError::new(
                "logging.level",
                "level cannot be empty",
            ));
        } else if !level.contains('=') && !KNOWN_LEVELS.contains(&level.to_lowercase().as_str()) {
            // Directives such as "extharness_core=debug" are passed through untouched.
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!("Unknown level '{}', valid values: {:?}", level, KNOWN_LEVELS),
            ));
        }

        if let Some(dir) = &config.logging.directory {
            if dir.trim().is_empty() {
                result.add_error(ValidationError::new(
                    "logging.directory",
                    "directory cannot be empty when set",
                ));
            }
        }
    }

    fn validate_run(config: &HarnessConfig, result: &mut ValidationResult) {
        if config.run.timeout_secs == Some(0) {
            result.add_error(ValidationError::new(
                "run.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_cases(config: &HarnessConfig, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (index, case) in config.cases.iter().enumerate() {
            if case.name.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("cases[{}].name", index),
                    "Case name cannot be empty",
                ));
                continue;
            }

            if !seen.insert(case.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("cases[{}].name", index),
                    format!("Case '{}' is listed more than once", case.name),
                ));
            }

            if let Some(addon) = &case.addon {
                if addon.trim().is_empty() {
                    result.add_error(ValidationError::new(
                        format!("cases[{}].addon", index),
                        "addon cannot be empty when set",
                    ));
                }
            }
        }

        if !config.cases.is_empty() && config.cases.iter().all(|case| !case.enabled) {
            result.add_warning(ValidationWarning::new(
                "cases",
                "Every listed case is disabled, nothing will run",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
