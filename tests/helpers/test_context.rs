//! Test context setup
//!
//! Wires a restore service to in-memory persistence, a fake gateway and a
//! manual clock.

use std::sync::Arc;

use Valhalla::middleware::RateLimitConfig;
use Valhalla::models::{CaptureMode, GroupId, MemberRecord, Snapshot};
use Valhalla::services::{Executor, ManualClock, RestoreService, RetryPolicy, SnapshotStore};
use Valhalla::MemoryPersistence;

use super::{fast_retry, FakeGateway, BOT};

/// Configuration for a test context
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub workers: usize,
    pub max_incremental_chain: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                max_actions: 1000,
                window: std::time::Duration::from_secs(1),
                burst: 1000,
            },
            retry: fast_retry(),
            workers: 4,
            max_incremental_chain: 10,
        }
    }
}

pub struct TestContext {
    pub persistence: MemoryPersistence,
    pub gateway: FakeGateway,
    pub clock: ManualClock,
    pub service: RestoreService,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    pub fn with_config(config: TestConfig) -> Self {
        let persistence = MemoryPersistence::new();
        let clock = ManualClock::default();
        let store = SnapshotStore::new(Arc::new(persistence.clone()), config.max_incremental_chain)
            .with_clock(Arc::new(clock.clone()));
        let executor = Executor::new(Arc::new(persistence.clone()), config.rate_limit, config.retry)
            .expect("valid rate limit")
            .with_clock(Arc::new(clock.clone()))
            .with_workers(config.workers);

        Self {
            service: RestoreService::new(Arc::new(persistence.clone()), store, executor),
            gateway: FakeGateway::new(BOT),
            persistence,
            clock,
        }
    }

    /// Put `records` live in `group_id` and capture them as a full snapshot
    pub async fn capture(&self, group_id: GroupId, records: Vec<MemberRecord>) -> Snapshot {
        self.gateway.set_roster(group_id, records);
        self.service
            .capture(&self.gateway, group_id, CaptureMode::Full)
            .await
            .expect("capture should succeed")
    }
}
