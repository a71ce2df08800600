//! TOML-based configuration for sqm.
//!
//! Supports a config file (sqm.toml) with environment variable expansion
//! in paths.
//!
//! Example configuration:
//! ```toml
//! dialect = "postgres"
//!
//! [compiler]
//! jpa_compliance = false
//!
//! [domain]
//! path = "${APP_HOME}/model.toml"
//!
//! [logging]
//! filter = "sqm=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{DomainError, StaticDomainModel};
use crate::engine::QueryEngine;
use crate::sql::dialect::{Dialect, UnknownDialect};
use crate::sqm::node::CreationOptions;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error(transparent)]
    UnknownDialect(#[from] UnknownDialect),

    #[error("Failed to load domain model: {0}")]
    Domain(#[from] DomainError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Target dialect name (ansi, postgres, mysql, ...).
    pub dialect: String,

    pub compiler: CompilerSettings,

    pub domain: DomainSettings,

    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: "ansi".to_string(),
            compiler: CompilerSettings::default(),
            domain: DomainSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Semantic analysis options.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Reject constructs outside the JPA specification.
    pub jpa_compliance: bool,
}

/// Where the domain model comes from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainSettings {
    /// Path to a TOML domain model (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "sqm=warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SQM_CONFIG`
    /// 2. `./sqm.toml`
    /// 3. `~/.config/sqm/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SQM_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("sqm.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sqm").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        Ok(self.dialect.parse()?)
    }

    pub fn creation_options(&self) -> CreationOptions {
        CreationOptions {
            jpa_compliance: self.compiler.jpa_compliance,
        }
    }

    /// The configured domain model path with environment variables expanded.
    pub fn domain_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.domain
            .path
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }

    /// Load the configured domain model.
    pub fn domain_model(&self) -> Result<StaticDomainModel, SettingsError> {
        let path = self.domain_path()?.ok_or_else(|| {
            SettingsError::InvalidConfig("no domain model configured ([domain] path)".to_string())
        })?;
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path));
        }
        Ok(StaticDomainModel::from_file(&path)?)
    }

    /// Build a query engine from these settings.
    pub fn engine(&self) -> Result<QueryEngine, SettingsError> {
        let dialect = self.dialect()?;
        let domain = self.domain_model()?;
        Ok(QueryEngine::new(dialect, Arc::new(domain)).with_options(self.creation_options()))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // a lone $
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("SQM_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${SQM_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${SQM_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("SQM_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("SQM_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$SQM_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$SQM_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost: $ 5").unwrap(), "cost: $ 5");
        env::remove_var("SQM_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(name)) if name == "NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
dialect = "postgresql"

[compiler]
jpa_compliance = true

[domain]
path = "model.toml"

[logging]
filter = "sqm=debug"
"#;

        let settings: Settings = toml::from_str(toml).unwrap();

        assert_eq!(settings.dialect().unwrap(), Dialect::Postgres);
        assert!(settings.creation_options().jpa_compliance);
        assert_eq!(settings.domain_path().unwrap(), Some(PathBuf::from("model.toml")));
        assert_eq!(settings.logging.filter, "sqm=debug");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.dialect().unwrap(), Dialect::Ansi);
        assert!(!settings.compiler.jpa_compliance);
        assert!(settings.domain.path.is_none());
        assert_eq!(settings.logging.filter, "sqm=warn");
    }

    #[test]
    fn test_unknown_dialect() {
        let settings: Settings = toml::from_str("dialect = \"informix\"").unwrap();
        assert!(matches!(settings.dialect(), Err(SettingsError::UnknownDialect(_))));
    }

    #[test]
    fn test_engine_without_domain_is_invalid() {
        assert!(matches!(
            Settings::default().engine(),
            Err(SettingsError::InvalidConfig(_))
        ));
    }
}
