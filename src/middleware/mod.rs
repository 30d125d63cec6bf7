//! Middleware module
//!
//! This module contains middleware wrapped around remote calls

pub mod rate_limit;

// Re-export commonly used middleware
pub use rate_limit::{ActionThrottle, RateLimitConfig};
