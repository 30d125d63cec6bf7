//! Error handling for Valhalla
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{GroupId, MemberId};

/// Main error type for Valhalla application
#[derive(Error, Debug)]
pub enum ValhallaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Snapshot chain for group {group_id} is broken: sequence {missing} is missing (requested {requested})")]
    Corruption { group_id: GroupId, requested: u64, missing: u64 },

    #[error("Snapshot not found: group {group_id}, sequence {sequence}")]
    SnapshotNotFound { group_id: GroupId, sequence: u64 },

    #[error("No snapshot captured for group {group_id}")]
    NoSnapshots { group_id: GroupId },

    #[error("Duplicate member {member_id} in roster")]
    DuplicateMember { member_id: MemberId },

    #[error("A restore run is already in progress for group {group_id}")]
    RunInProgress { group_id: GroupId },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failures raised by the remote group API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by remote")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Member {member_id} is not in group {group_id}")]
    NotMember { group_id: GroupId, member_id: MemberId },

    #[error("Operation requires the group owner")]
    RequiresOwner,

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Durability failures of the persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot {sequence} already exists for group {group_id}")]
    Conflict { group_id: GroupId, sequence: u64 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Serializable classification of a failed action, recorded in outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    RateLimited,
    Auth,
    Protocol,
    Permission,
    NotMember,
    RequiresOwner,
    InvalidValue,
    OwnerImmutable,
}

/// Result type alias for Valhalla operations
pub type Result<T> = std::result::Result<T, ValhallaError>;

/// Result type alias for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result type alias for persistence calls
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl GatewayError {
    /// Transient failures are retried with backoff, everything else is final
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_) | GatewayError::Timeout | GatewayError::RateLimited
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::Network(_) => FailureKind::Network,
            GatewayError::Timeout => FailureKind::Timeout,
            GatewayError::RateLimited => FailureKind::RateLimited,
            GatewayError::Auth(_) => FailureKind::Auth,
            GatewayError::Protocol(_) => FailureKind::Protocol,
            GatewayError::Permission(_) => FailureKind::Permission,
            GatewayError::NotMember { .. } => FailureKind::NotMember,
            GatewayError::RequiresOwner => FailureKind::RequiresOwner,
            GatewayError::InvalidValue(_) => FailureKind::InvalidValue,
        }
    }
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::Network | FailureKind::Timeout | FailureKind::RateLimited)
    }
}

impl ValhallaError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ValhallaError::Database(_) => false,
            ValhallaError::Migration(_) => false,
            ValhallaError::Gateway(e) => e.is_transient(),
            ValhallaError::Storage(_) => true,
            ValhallaError::Corruption { .. } => false,
            ValhallaError::SnapshotNotFound { .. } => false,
            ValhallaError::NoSnapshots { .. } => false,
            ValhallaError::DuplicateMember { .. } => false,
            ValhallaError::RunInProgress { .. } => true,
            ValhallaError::Config(_) => false,
            ValhallaError::Http(_) => true,
            ValhallaError::Serialization(_) => false,
            ValhallaError::Io(_) => true,
            ValhallaError::UrlParse(_) => false,
            ValhallaError::InvalidInput(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ValhallaError::Database(_) => ErrorSeverity::Critical,
            ValhallaError::Migration(_) => ErrorSeverity::Critical,
            ValhallaError::Config(_) => ErrorSeverity::Critical,
            ValhallaError::Corruption { .. } => ErrorSeverity::Critical,
            ValhallaError::DuplicateMember { .. } => ErrorSeverity::Critical,
            ValhallaError::RunInProgress { .. } => ErrorSeverity::Warning,
            ValhallaError::NoSnapshots { .. } => ErrorSeverity::Info,
            ValhallaError::InvalidInput(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
