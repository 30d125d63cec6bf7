//! Test helpers module
//!
//! This module provides utilities and helpers for testing the Valhalla engine.
//! It includes a fake group API, a mock OneBot server, a PostgreSQL test
//! database, roster builders and test context setup.

#![allow(dead_code)]

pub mod database;
pub mod fake_gateway;
pub mod log_capture;
pub mod onebot_mock;
pub mod test_context;
pub mod test_data;

pub use database::*;
pub use fake_gateway::*;
pub use log_capture::*;
pub use onebot_mock::*;
pub use test_context::*;
pub use test_data::*;
