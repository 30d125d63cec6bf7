//! Rate limiting middleware
//!
//! Token bucket in front of every remote mutation. A call that would exceed
//! the bucket waits for the next token instead of failing.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::errors::{Result, ValhallaError};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Actions refilled per window
    pub max_actions: u32,
    /// Refill window
    pub window: Duration,
    /// Bucket capacity (actions allowed back to back)
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions: 10,
            window: Duration::from_secs(60),
            burst: 1,
        }
    }
}

impl RateLimitConfig {
    pub fn per_second(max_actions: u32) -> Self {
        Self {
            max_actions,
            window: Duration::from_secs(1),
            burst: 1,
        }
    }

    fn quota(&self) -> Result<Quota> {
        let invalid = || ValhallaError::Config(format!("Invalid rate limit: {:?}", self));
        if self.max_actions == 0 {
            return Err(invalid());
        }
        let burst = NonZeroU32::new(self.burst).ok_or_else(invalid)?;
        let period = self.window / self.max_actions;
        Ok(Quota::with_period(period).ok_or_else(invalid)?.allow_burst(burst))
    }
}

/// Token bucket shared by all in-flight actions of a run
#[derive(Clone)]
pub struct ActionThrottle {
    config: RateLimitConfig,
    limiter: Arc<DirectLimiter>,
    statistics: Arc<Mutex<ThrottleStatistics>>,
}

impl ActionThrottle {
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        let limiter = RateLimiter::direct(config.quota()?);
        Ok(Self {
            config,
            limiter: Arc::new(limiter),
            statistics: Arc::new(Mutex::new(ThrottleStatistics::default())),
        })
    }

    /// Take one token, suspending until one is available
    pub async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            self.record(Duration::ZERO);
            return;
        }

        let started = Instant::now();
        self.limiter.until_ready().await;
        let waited = started.elapsed();
        debug!(waited_ms = waited.as_millis() as u64, "Rate limit token acquired after wait");
        self.record(waited);
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn statistics(&self) -> ThrottleStatistics {
        self.statistics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, waited: Duration) {
        let mut stats = self.statistics.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.acquired += 1;
        if !waited.is_zero() {
            stats.delayed += 1;
            stats.total_wait += waited;
        }
    }
}

impl std::fmt::Debug for ActionThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionThrottle").field("config", &self.config).finish()
    }
}

/// Throttle statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleStatistics {
    pub acquired: u64,
    pub delayed: u64,
    pub total_wait: Duration,
}
