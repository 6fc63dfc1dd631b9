//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::HarnessConfig;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<HarnessConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<HarnessConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut config: HarnessConfig = toml::from_str(&expanded)?;
        if let Some(dir) = config.logging.directory.take() {
            config.logging.directory = Some(Self::expand_path(&dir));
        }
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if a file
    /// exists there, else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<HarnessConfig, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(HarnessConfig::default()),
        }
    }

    /// `<config dir>/extharness/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("extharness").join("config.toml"))
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/logs`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config.cases.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [logging]
            level = "debug"
            format = "json"

            [run]
            timeout_secs = 30
            fail_fast = true

            [[cases]]
            name = "greeting"
            addon = "default_extension"
            properties = { greetingMsg = "hola" }

            [[cases]]
            name = "cmd_ping_pong"
            enabled = false
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.run.timeout_secs, Some(30));
        assert!(config.run.fail_fast);
        assert_eq!(config.cases.len(), 2);

        let greeting = config.case("greeting").unwrap();
        assert_eq!(greeting.addon.as_deref(), Some("default_extension"));
        assert_eq!(greeting.properties.get("greetingMsg").and_then(|v| v.as_str()), Some("hola"));
        assert!(greeting.enabled);
        assert!(!config.case("cmd_ping_pong").unwrap().enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[run]").unwrap();
        writeln!(file, "timeout_secs = 5").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.run.timeout_secs, Some(5));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/harness.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_with_explicit_missing_path() {
        let result = ConfigLoader::load_or_default(Some(Path::new("/nonexistent/harness.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("cases = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_case_without_name_is_rejected() {
        let result = ConfigLoader::load_str("[[cases]]\naddon = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: This test sets a unique test-only env var
        unsafe {
            std::env::set_var("EXTHARNESS_TEST_GREETING", "bonjour");
        }
        let content = r#"
            [[cases]]
            name = "greeting"
            properties = { greetingMsg = "${EXTHARNESS_TEST_GREETING}" }
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(
            config.cases[0].properties.get("greetingMsg").and_then(|v| v.as_str()),
            Some("bonjour")
        );
        unsafe {
            std::env::remove_var("EXTHARNESS_TEST_GREETING");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${EXTHARNESS_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"plain\"";
        assert_eq!(ConfigLoader::expand_env_vars(content).unwrap(), content);
    }

    #[test]
    fn test_log_directory_tilde_expanded() {
        let config = ConfigLoader::load_str("[logging]\ndirectory = \"~/extharness-logs\"").unwrap();
        let dir = config.logging.directory.unwrap();
        assert!(!dir.starts_with('~'));
        assert!(dir.ends_with("/extharness-logs"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        assert_eq!(ConfigLoader::expand_path("/var/log"), "/var/log");
    }

    #[test]
    fn test_default_path_file_name() {
        if let Some(path) = ConfigLoader::default_path() {
            assert!(path.ends_with("extharness/config.toml"));
        }
    }
}
