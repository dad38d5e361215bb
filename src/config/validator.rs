//! Configuration validator for Elevated-Launcher
//!
//! Validates configuration values to ensure they are usable before a launch.

use super::loader::{AnchorConfig, Config, ConfigError, LaunchConfig, LoggingConfig};

/// Largest finite wait `WaitForSingleObject` accepts, in milliseconds
const MAX_WAIT_TIMEOUT_MS: u64 = u32::MAX as u64 - 1;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_anchor(&config.anchor)?;
        Self::validate_launch(&config.launch)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates anchor configuration
    fn validate_anchor(anchor: &AnchorConfig) -> Result<(), ConfigError> {
        let name = anchor.process_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid(
                "Anchor process name cannot be empty".to_string(),
            ));
        }

        if name.contains(['\\', '/']) {
            return Err(ConfigError::Invalid(format!(
                "Anchor process name must be an image name, not a path: {}",
                name
            )));
        }

        Ok(())
    }

    /// Validates launch configuration
    fn validate_launch(launch: &LaunchConfig) -> Result<(), ConfigError> {
        if launch.wait_timeout_ms > MAX_WAIT_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "Wait timeout cannot exceed {} ms",
                MAX_WAIT_TIMEOUT_MS
            )));
        }

        if let Some(desktop) = &launch.desktop {
            if !desktop.is_empty() && !desktop.contains('\\') {
                return Err(ConfigError::Invalid(format!(
                    "Desktop must be given as <winstation>\\<desktop>: {}",
                    desktop
                )));
            }
        }

        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
