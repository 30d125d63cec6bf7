//! PostgreSQL pool setup for the snapshot and outcome tables

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use url::Url;

use crate::config::DatabaseSettings;
use crate::utils::errors::{Result, ValhallaError};

pub type DatabasePool = Pool<Postgres>;

/// Tables the engine reads and writes
const REQUIRED_TABLES: [&str; 2] = ["snapshots", "action_outcomes"];

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/valhalla".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

impl From<&DatabaseSettings> for DatabaseConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            ..Self::default()
        }
    }
}

impl DatabaseConfig {
    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("***"));
                url.to_string()
            }
            Ok(url) => url.to_string(),
            Err(_) => "<invalid database url>".to_string(),
        }
    }
}

/// Open the pool, apply pending migrations and verify the schema
pub async fn connect(settings: &DatabaseSettings) -> Result<DatabasePool> {
    let pool = create_pool(&settings.into()).await?;
    run_migrations(&pool).await?;
    verify_schema(&pool).await?;
    Ok(pool)
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool> {
    tracing::info!(url = %config.redacted_url(), max_connections = config.max_connections, "Opening database pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &DatabasePool) -> Result<()> {
    let migrator = sqlx::migrate!("./migrations");
    migrator.run(pool).await?;
    tracing::info!(migrations = migrator.iter().count(), "Database schema up to date");
    Ok(())
}

/// Fail unless every table the engine uses exists
pub async fn verify_schema(pool: &DatabasePool) -> Result<()> {
    for table in REQUIRED_TABLES {
        let (present,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(pool)
            .await?;
        if !present {
            return Err(ValhallaError::Config(format!("database is missing table '{}'", table)));
        }
    }
    Ok(())
}
