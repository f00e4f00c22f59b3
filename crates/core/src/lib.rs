//! Shared configuration for the u360 Slack bot.
//!
//! Values are layered: built-in defaults, then `u360.toml` (with `${VAR}`
//! interpolation), then `U360_*` environment variables, then programmatic
//! overrides.

pub mod config;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
