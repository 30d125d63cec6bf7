//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::middleware::rate_limit::RateLimitConfig;
use crate::models::{CaptureMode, GroupId, PlanOptions};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub onebot: OneBotConfig,
    pub database: DatabaseSettings,
    pub backup: BackupConfig,
    pub restore: RestoreConfig,
    pub logging: LoggingConfig,
}

/// OneBot HTTP API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OneBotConfig {
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
    pub timeout_seconds: u64,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Snapshot capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub groups: Vec<GroupId>,
    pub capture_mode: CaptureMode,
    /// Incrementals allowed after a full snapshot before the next capture is
    /// promoted to full
    pub max_incremental_chain: u32,
}

/// Restore planning and execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestoreConfig {
    pub restore_card: bool,
    pub restore_title: bool,
    pub restore_admin: bool,
    pub workers: usize,
    pub rate_limit: RateLimitSettings,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    pub max_actions: u32,
    pub window_seconds: u64,
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("VALHALLA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("backup.groups")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::ValhallaError> {
        super::validation::validate_settings(self)
    }
}

impl RestoreConfig {
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            restore_card: self.restore_card,
            restore_title: self.restore_title,
            restore_admin: self.restore_admin,
            ..PlanOptions::default()
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_actions: settings.max_actions,
            window: Duration::from_secs(settings.window_seconds),
            burst: settings.burst,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            onebot: OneBotConfig {
                base_url: "http://127.0.0.1:5700".to_string(),
                access_token: String::new(),
                timeout_seconds: 10,
            },
            database: DatabaseSettings {
                url: "postgresql://localhost/valhalla".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            backup: BackupConfig {
                groups: vec![],
                capture_mode: CaptureMode::Incremental,
                max_incremental_chain: 20,
            },
            restore: RestoreConfig {
                restore_card: true,
                restore_title: true,
                restore_admin: true,
                workers: 4,
                rate_limit: RateLimitSettings {
                    max_actions: 20,
                    window_seconds: 60,
                    burst: 1,
                },
                retry: RetryConfig {
                    max_attempts: 3,
                    initial_backoff_ms: 1000,
                    max_backoff_ms: 30_000,
                    multiplier: 2.0,
                    jitter: true,
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "logs".to_string(),
                json: false,
            },
        }
    }
}
