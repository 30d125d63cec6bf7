//! Valhalla
//!
//! Versioned membership snapshots for chat groups and reconciliation of a
//! live group's member cards, titles and administrator flags back to a
//! captured state. Snapshots are diffed, turned into ordered restore plans
//! and applied through a rate-limited, retrying executor.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{ValhallaError, Result};

// Re-export main components for easy access
pub use database::{DatabaseService, MemoryPersistence, Persistence};
pub use gateway::{Gateway, OneBotGateway};
pub use services::{Executor, RestoreRequest, RestoreService, SnapshotStore};
pub use state::RunRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
