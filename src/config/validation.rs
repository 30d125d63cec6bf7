//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{ValhallaError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_onebot_config(&settings.onebot)?;
    validate_database_config(&settings.database)?;
    validate_restore_config(&settings.restore)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate OneBot configuration
fn validate_onebot_config(config: &super::OneBotConfig) -> Result<()> {
    if config.base_url.is_empty() {
        return Err(ValhallaError::Config(
            "OneBot base URL is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(ValhallaError::Config(
            "OneBot timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseSettings) -> Result<()> {
    if config.url.is_empty() {
        return Err(ValhallaError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(ValhallaError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(ValhallaError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate restore configuration
fn validate_restore_config(config: &super::RestoreConfig) -> Result<()> {
    if config.workers == 0 {
        return Err(ValhallaError::Config(
            "Restore workers must be greater than 0".to_string()
        ));
    }

    let rate = &config.rate_limit;
    if rate.max_actions == 0 || rate.window_seconds == 0 || rate.burst == 0 {
        return Err(ValhallaError::Config(
            "Rate limit actions, window and burst must be greater than 0".to_string()
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ValhallaError::Config(
            "Retry max attempts must be greater than 0".to_string()
        ));
    }

    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ValhallaError::Config(
            "Initial backoff cannot be greater than max backoff".to_string()
        ));
    }

    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        return Err(ValhallaError::Config(
            format!("Backoff multiplier must be at least 1.0, got {}", retry.multiplier)
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(ValhallaError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(ValhallaError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_rejects_zero_workers() {
        let mut settings = Settings::default();
        settings.restore.workers = 0;
        assert_matches!(validate_settings(&settings), Err(ValhallaError::Config(_)));
    }

    #[test]
    fn test_rejects_inverted_backoff_bounds() {
        let mut settings = Settings::default();
        settings.restore.retry.initial_backoff_ms = 60_000;
        assert_matches!(validate_settings(&settings), Err(ValhallaError::Config(_)));
    }

    #[test]
    fn test_rejects_connection_bounds_out_of_order() {
        let mut settings = Settings::default();
        settings.database.min_connections = 20;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_zero_attempts_and_empty_url() {
        let mut settings = Settings::default();
        settings.restore.retry.max_attempts = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.onebot.base_url.clear();
        assert!(validate_settings(&settings).is_err());
    }
}
