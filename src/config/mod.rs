//! Configuration module for Elevated-Launcher
//!
//! Provides configuration loading, validation, and default settings
//! for the launcher.

mod defaults;
mod loader;
mod validator;

pub use defaults::ConfigDefaults;
pub use loader::{load_config, ConfigLoader};
pub use validator::{validate_config, ConfigValidator};

// Re-export the configuration structures
pub use loader::{AnchorConfig, Config, LaunchConfig, LoggingConfig};

// Configuration-related error type
pub use loader::ConfigError;

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
