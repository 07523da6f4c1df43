mod error;
pub mod models;
pub mod sql;

pub use error::{DbError, DbResult};
pub use models::*;
pub use sql::{Predicate, PropertyFilter, SqlValue};

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use tracing::info;

use crate::config::ServerConfig;

pub type DbPool = SqlitePool;

/// Open the configured database and bring its schema up to date.
pub async fn init(config: &ServerConfig) -> Result<DbPool> {
    let db_url = match &config.database_url {
        Some(url) => url.clone(),
        None => format!("sqlite:{}", config.data_dir.join("sharebnb.db").display()),
    };

    info!("Initializing database at {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)
        .with_context(|| format!("Invalid database URL: {}", db_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL for better read concurrency
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to {}", db_url))?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// A private in-memory database with the schema applied.
///
/// Every in-memory connection is its own database, so the pool is pinned to a
/// single connection that is never recycled.
pub async fn init_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: users, properties, images, bookings and the overlap trigger.
    // raw_sql runs the whole script, including the multi-statement trigger body.
    sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
        .execute(pool)
        .await
        .context("Failed to apply migration 001_initial")?;

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::models::{NewProperty, RegisterRequest};
    use super::{init, DbPool};
    use crate::config::ServerConfig;
    use std::path::PathBuf;

    /// A fresh, empty directory under the system temp dir.
    pub(crate) fn temp_data_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "sharebnb-{}-{}-{}",
            label,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// A file-backed pool, for tests that need more than one connection.
    pub(crate) async fn file_pool(label: &str, max_connections: u32) -> (DbPool, PathBuf) {
        let dir = temp_data_dir(label);
        let config = ServerConfig {
            data_dir: dir.clone(),
            max_connections,
            ..ServerConfig::default()
        };
        (init(&config).await.unwrap(), dir)
    }

    pub(crate) fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "password123".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: format!("{}@example.com", username),
            phone: None,
        }
    }

    pub(crate) fn new_property(title: &str, address: &str, price: i64, owner: &str) -> NewProperty {
        NewProperty {
            title: title.to_string(),
            address: address.to_string(),
            description: format!("A lovely place called {}", title),
            price,
            owner: owner.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["bookings", "images", "properties", "users"]);

        let trigger: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'trigger' AND name = 'bookings_no_overlap'",
        )
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert!(trigger.is_some());
    }

    #[tokio::test]
    async fn test_init_creates_file_database() {
        let dir = test_support::temp_data_dir("db-init");

        let config = ServerConfig {
            data_dir: dir.clone(),
            ..ServerConfig::default()
        };
        let pool = init(&config).await.unwrap();
        pool.close().await;

        assert!(dir.join("sharebnb.db").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
