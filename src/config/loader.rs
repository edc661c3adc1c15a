use std::{collections::HashMap, env, fs, path::Path};

use crate::errors::ConfigError;
use crate::logging::{LogFormat, LoggingEnvironment};

use super::container_config::ContainerConfig;

pub const ENV_REGISTER_DEFAULTS: &str = "LIFESCOPE_REGISTER_DEFAULTS";
pub const ENV_TRACE_RESOLUTIONS: &str = "LIFESCOPE_TRACE_RESOLUTIONS";
pub const ENV_LOG_LEVEL: &str = "LIFESCOPE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LIFESCOPE_LOG_FORMAT";
pub const ENV_LOG_ENVIRONMENT: &str = "LIFESCOPE_LOG_ENVIRONMENT";

/// Loads container configuration from TOML and applies environment overrides
pub struct ConfigLoader {
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a loader that reads the process environment
    pub fn new() -> Self {
        Self { env_vars: None }
    }

    /// Create a loader with a fixed set of environment variables (for testing)
    pub fn with_env(env_vars: HashMap<String, String>) -> Self {
        Self { env_vars: Some(env_vars) }
    }

    /// Defaults plus environment overrides
    pub fn load_default(&self) -> Result<ContainerConfig, ConfigError> {
        let mut config = ContainerConfig::default();
        self.apply_env(&mut config)?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load_file(&self, path: &Path) -> Result<ContainerConfig, ConfigError> {
        let display = path.to_string_lossy().to_string();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileRead(display.clone(), e))?;

        let mut config: ContainerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse(display, e))?;
        self.apply_env(&mut config)?;

        tracing::debug!(path = %path.display(), "Container configuration loaded");
        Ok(config)
    }

    /// Parse TOML text, then apply environment overrides
    pub fn load_str(&self, source: &str) -> Result<ContainerConfig, ConfigError> {
        let mut config: ContainerConfig =
            toml::from_str(source).map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))?;
        self.apply_env(&mut config)?;
        Ok(config)
    }

    fn apply_env(&self, config: &mut ContainerConfig) -> Result<(), ConfigError> {
        let env_map = self.collect_env_vars();

        if let Some(value) = env_map.get(ENV_REGISTER_DEFAULTS) {
            config.register_defaults = parse_bool(ENV_REGISTER_DEFAULTS, value)?;
        }
        if let Some(value) = env_map.get(ENV_TRACE_RESOLUTIONS) {
            config.trace_resolutions = parse_bool(ENV_TRACE_RESOLUTIONS, value)?;
        }
        if let Some(value) = env_map.get(ENV_LOG_LEVEL) {
            config.logging.level = value.trim().to_lowercase();
        }
        if let Some(value) = env_map.get(ENV_LOG_FORMAT) {
            config.logging.format = match value.trim().to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "compact" => LogFormat::Compact,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_LOG_FORMAT.to_string(),
                        value: value.clone(),
                    })
                }
            };
        }
        if let Some(value) = env_map.get(ENV_LOG_ENVIRONMENT) {
            config.logging.environment = match value.trim().to_lowercase().as_str() {
                "development" => LoggingEnvironment::Development,
                "testing" => LoggingEnvironment::Testing,
                "production" => LoggingEnvironment::Production,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_LOG_ENVIRONMENT.to_string(),
                        value: value.clone(),
                    })
                }
            };
        }

        Ok(())
    }

    /// Collect the LIFESCOPE_* environment variables
    fn collect_env_vars(&self) -> HashMap<String, String> {
        if let Some(vars) = &self.env_vars {
            return vars.clone();
        }

        [
            ENV_REGISTER_DEFAULTS,
            ENV_TRACE_RESOLUTIONS,
            ENV_LOG_LEVEL,
            ENV_LOG_FORMAT,
            ENV_LOG_ENVIRONMENT,
        ]
            .iter()
            .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env() -> ConfigLoader {
        ConfigLoader::with_env(HashMap::new())
    }

    #[test]
    fn test_empty_source_yields_defaults() {
        let config = no_env().load_str("").unwrap();
        assert_eq!(config, ContainerConfig::default());
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "register_defaults = false\ntrace_resolutions = true\n\n[logging]\nlevel = \"debug\"\nformat = \"compact\""
        )
        .unwrap();

        let config = no_env().load_file(file.path()).unwrap();
        assert!(!config.register_defaults);
        assert!(config.trace_resolutions);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.logging.show_target);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("lifescope.toml");

        match no_env().load_file(&missing) {
            Err(ConfigError::FileRead(path, _)) => assert!(path.ends_with("lifescope.toml")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_toml() {
        let result = no_env().load_str("register_defaults = \"maybe\"");
        assert!(matches!(result, Err(ConfigError::TomlParse(_, _))));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut env_vars = HashMap::new();
        env_vars.insert(ENV_REGISTER_DEFAULTS.to_string(), "no".to_string());
        env_vars.insert(ENV_LOG_LEVEL.to_string(), "TRACE".to_string());
        env_vars.insert(ENV_LOG_FORMAT.to_string(), "compact".to_string());

        let config = ConfigLoader::with_env(env_vars)
            .load_str("register_defaults = true")
            .unwrap();
        assert!(!config.register_defaults);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_logging_environment_from_file_and_env() {
        let config = no_env()
            .load_str("[logging]\nenvironment = \"production\"")
            .unwrap();
        assert_eq!(config.logging.environment, LoggingEnvironment::Production);

        let mut env_vars = HashMap::new();
        env_vars.insert(ENV_LOG_ENVIRONMENT.to_string(), "Testing".to_string());
        let config = ConfigLoader::with_env(env_vars)
            .load_str("[logging]\nenvironment = \"production\"")
            .unwrap();
        assert_eq!(config.logging.environment, LoggingEnvironment::Testing);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut env_vars = HashMap::new();
        env_vars.insert(ENV_TRACE_RESOLUTIONS.to_string(), "sometimes".to_string());

        let result = ConfigLoader::with_env(env_vars).load_default();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
