//! # drover-settings
//!
//! Layered configuration for the drover runtime.
//!
//! Resolution order (lowest to highest precedence):
//! compiled defaults → `~/.drover/settings.json` (deep merge) → `DROVER_*`
//! environment variables → caller overrides → per-session overrides.
//!
//! Invalid configuration is fatal at startup: the loader returns
//! [`SettingsError`] rather than guessing.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
    with_overrides,
};
pub use types::{LlmSettings, PluginSettings, PolicySettings, SessionSettings, Settings};
