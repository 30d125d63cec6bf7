//! Valhalla snapshot runner
//!
//! Main application entry point: captures one snapshot of every configured
//! group and exits.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use Valhalla::{
    config::Settings,
    database::{self, DatabaseService},
    gateway::{Gateway, OneBotGateway},
    services::{RestoreService, SystemClock},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;
    settings.validate()?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", Valhalla::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = database::connect(&settings.database).await?;
    let persistence = Arc::new(DatabaseService::new(db_pool));

    let gateway = OneBotGateway::new(&settings.onebot)?;
    let self_id = gateway.self_id().await.context("failed to reach the OneBot API")?;
    info!(self_id = %self_id, "Connected to OneBot API");

    let service = RestoreService::from_settings(persistence, &settings, Arc::new(SystemClock))?;

    if settings.backup.groups.is_empty() {
        warn!("No groups configured under backup.groups, nothing to capture");
        return Ok(());
    }

    let mut failures = 0;
    for group_id in &settings.backup.groups {
        match service.capture(&gateway, *group_id, settings.backup.capture_mode).await {
            Ok(snapshot) => info!(
                group_id = %group_id,
                sequence = snapshot.sequence(),
                mode = snapshot.mode().as_str(),
                "Group captured"
            ),
            Err(e) => {
                failures += 1;
                error!(group_id = %group_id, error = %e, severity = ?e.severity(), "Capture failed");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} group captures failed", failures, settings.backup.groups.len());
    }

    info!("All {} groups captured", settings.backup.groups.len());
    Ok(())
}
