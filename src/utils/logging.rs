//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the Valhalla application.

use tracing::{info, warn, error, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::models::{ActionOutcome, GroupId, OutcomeStatus, RunId, RunReport, SnapshotMeta};
use crate::utils::errors::{GatewayError, Result, ValhallaError};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "valhalla.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (json_stdout, text_stdout) = if config.json {
        (Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout)), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_writer(std::io::stdout)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_stdout)
        .with(text_stdout)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| ValhallaError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log a persisted snapshot
pub fn log_snapshot_captured(meta: &SnapshotMeta) {
    info!(
        group_id = %meta.group_id,
        sequence = meta.sequence,
        mode = meta.mode.as_str(),
        members = meta.summary.member_count,
        joined = meta.summary.joined_count,
        left = meta.summary.left_count,
        "Snapshot captured"
    );
}

/// Log the terminal outcome of one plan action
pub fn log_action_outcome(run_id: RunId, group_id: GroupId, position: usize, outcome: &ActionOutcome) {
    match &outcome.status {
        OutcomeStatus::Applied => info!(
            run_id = %run_id,
            group_id = %group_id,
            member_id = %outcome.action.target,
            position = position,
            action = %outcome.action,
            "Action applied"
        ),
        OutcomeStatus::Skipped { reason } => debug!(
            run_id = %run_id,
            group_id = %group_id,
            member_id = %outcome.action.target,
            position = position,
            reason = ?reason,
            "Action skipped"
        ),
        OutcomeStatus::Failed { kind, attempts, message } => warn!(
            run_id = %run_id,
            group_id = %group_id,
            member_id = %outcome.action.target,
            position = position,
            kind = ?kind,
            attempt = attempts,
            error = %message,
            "Action failed"
        ),
    }
}

/// Log the totals of a finished run
pub fn log_run_summary(report: &RunReport) {
    let summary = report.summary();
    info!(
        run_id = %report.run_id,
        group_id = %report.group_id,
        status = ?report.status,
        total = summary.total,
        applied = summary.applied,
        skipped = summary.skipped,
        failed = summary.failed,
        unreachable = report.unreachable.len(),
        rejected = report.rejected.len(),
        storage_failures = report.storage_failures.len(),
        "Restore run finished"
    );
}

/// Log remote API errors with context
pub fn log_gateway_error(action: &str, error: &GatewayError) {
    if error.is_transient() {
        warn!(action = action, error = %error, "Transient gateway error");
    } else {
        error!(action = action, error = %error, kind = ?error.kind(), "Gateway error");
    }
}

/// Log database operations
pub fn log_database_operation(operation: &str, table: &str, duration_ms: u64, success: bool) {
    if success {
        debug!(
            operation = operation,
            table = table,
            duration_ms = duration_ms,
            "Database operation completed"
        );
    } else {
        error!(
            operation = operation,
            table = table,
            duration_ms = duration_ms,
            "Database operation failed"
        );
    }
}
