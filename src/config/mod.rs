//! Configuration module for sqm.
//!
//! Handles the settings file, environment variable expansion and building
//! a configured [`crate::QueryEngine`].

mod settings;

pub use settings::{
    expand_env_vars, CompilerSettings, DomainSettings, LoggingSettings, Settings, SettingsError,
};
