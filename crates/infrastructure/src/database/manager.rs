use notifier_config::DatabaseConfig;
use notifier_domain::repositories::RecipientRepository;
use notifier_errors::NotifierResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::sqlite::SqliteRecipientRepository;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> NotifierResult<Self> {
        debug!("连接SQLite数据库: {}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect_with(connect_options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> NotifierResult<()> {
        SqliteRecipientRepository::run_migrations(&self.pool).await
    }

    pub async fn health_check(&self) -> NotifierResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn recipient_repository(&self) -> Arc<dyn RecipientRepository> {
        Arc::new(SqliteRecipientRepository::new(self.pool.clone()))
    }
}
