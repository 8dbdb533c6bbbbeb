use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifier_domain::{
    entities::{
        ChannelCounts, ChannelKind, NewRecipient, Recipient, RecipientFilter, RecipientPage,
        RecipientStats,
    },
    repositories::RecipientRepository,
};
use notifier_errors::NotifierResult;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    recipient_context,
};

const RECIPIENT_COLUMNS: &str = "id, identity, channel, source, notified, notified_at, attempts, last_attempt_at, last_error, subscribed_at";

pub struct SqliteRecipientRepository {
    pool: SqlitePool,
}

impl SqliteRecipientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 创建订阅者表和索引，可重复执行
    pub async fn run_migrations(pool: &SqlitePool) -> NotifierResult<()> {
        debug!("Running SQLite database migrations");
        let context = recipient_context!(RepositoryOperation::Migrate);

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recipients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity TEXT NOT NULL UNIQUE,
                channel TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'website',
                notified INTEGER NOT NULL DEFAULT 0,
                notified_at TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_attempt_at TEXT,
                last_error TEXT,
                subscribed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_recipients_notified ON recipients(notified)",
            "CREATE INDEX IF NOT EXISTS idx_recipients_subscribed_at ON recipients(subscribed_at)",
            "CREATE INDEX IF NOT EXISTS idx_recipients_attempts ON recipients(attempts)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;
        }

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    fn row_to_recipient(row: &sqlx::sqlite::SqliteRow) -> NotifierResult<Recipient> {
        let attempts: i64 = row.try_get("attempts")?;
        let attempts = u32::try_from(attempts).map_err(|_| {
            RepositoryErrorHelpers::mapping_error(
                &recipient_context!(RepositoryOperation::Read),
                format!("失败次数超出范围: {attempts}"),
            )
        })?;

        Ok(Recipient {
            id: row.try_get("id")?,
            identity: row.try_get("identity")?,
            channel: row.try_get("channel")?,
            source: row.try_get("source")?,
            notified: row.try_get("notified")?,
            notified_at: row.try_get("notified_at")?,
            attempts,
            last_attempt_at: row.try_get("last_attempt_at")?,
            last_error: row.try_get("last_error")?,
            subscribed_at: row.try_get("subscribed_at")?,
        })
    }

    fn rows_to_recipients(rows: &[sqlx::sqlite::SqliteRow]) -> NotifierResult<Vec<Recipient>> {
        rows.iter().map(Self::row_to_recipient).collect()
    }

    async fn fetch_by_condition(
        &self,
        condition: &str,
        max_attempts: Option<u32>,
    ) -> NotifierResult<Vec<Recipient>> {
        let context = recipient_context!(RepositoryOperation::Query)
            .with_additional_info(condition.to_string());

        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE {condition} ORDER BY subscribed_at ASC, id ASC"
        );
        let mut query = sqlx::query(&sql);
        if let Some(max_attempts) = max_attempts {
            query = query.bind(i64::from(max_attempts));
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context, e))?;
        Self::rows_to_recipients(&rows)
    }

    async fn exists(&self, identity: &str) -> NotifierResult<bool> {
        let context = recipient_context!(RepositoryOperation::Read, identity = identity);
        let row = sqlx::query("SELECT 1 FROM recipients WHERE identity = $1")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context, e))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl RecipientRepository for SqliteRecipientRepository {
    #[instrument(skip(self, recipient), fields(
        identity = %recipient.identity,
        channel = %recipient.channel,
    ))]
    async fn create(&self, recipient: &NewRecipient) -> NotifierResult<Recipient> {
        let context = recipient_context!(RepositoryOperation::Create, identity = &recipient.identity);

        let sql = format!(
            "INSERT INTO recipients (identity, channel, source, subscribed_at) VALUES ($1, $2, $3, $4) RETURNING {RECIPIENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&recipient.identity)
            .bind(recipient.channel)
            .bind(recipient.source)
            .bind(recipient.subscribed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;

        let created = Self::row_to_recipient(&row)?;
        RepositoryErrorHelpers::log_operation_success(
            context,
            &created.entity_description(),
            Some(&format!("ID: {}, 来源: {}", created.id, created.source)),
        );
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn find_by_identity(&self, identity: &str) -> NotifierResult<Option<Recipient>> {
        let context = recipient_context!(RepositoryOperation::Read, identity = identity);

        let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE identity = $1");
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context, e))?;

        row.as_ref().map(Self::row_to_recipient).transpose()
    }

    #[instrument(skip(self))]
    async fn delete(&self, identity: &str) -> NotifierResult<bool> {
        let context = recipient_context!(RepositoryOperation::Delete, identity = identity);

        let result = sqlx::query("DELETE FROM recipients WHERE identity = $1")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            RepositoryErrorHelpers::log_operation_success(context, &format!("订阅者 '{identity}'"), None);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_pending(&self) -> NotifierResult<Vec<Recipient>> {
        self.fetch_by_condition("notified = 0", None).await
    }

    #[instrument(skip(self))]
    async fn list_retryable(&self, max_attempts: u32) -> NotifierResult<Vec<Recipient>> {
        self.fetch_by_condition("notified = 0 AND attempts > 0 AND attempts < $1", Some(max_attempts))
            .await
    }

    #[instrument(skip(self))]
    async fn list_failed(&self) -> NotifierResult<Vec<Recipient>> {
        self.fetch_by_condition("notified = 0 AND attempts > 0", None)
            .await
    }

    #[instrument(skip(self, filter), fields(
        notified = ?filter.notified,
        channel = ?filter.channel,
        page = filter.page,
        limit = filter.limit,
    ))]
    async fn list(&self, filter: &RecipientFilter) -> NotifierResult<RecipientPage> {
        let context = recipient_context!(RepositoryOperation::Query)
            .with_additional_info(format!("过滤器: {filter:?}"));

        let mut conditions = String::from(" WHERE 1=1");
        let mut bind_count = 0;
        if filter.notified.is_some() {
            bind_count += 1;
            conditions.push_str(&format!(" AND notified = ${bind_count}"));
        }
        if filter.channel.is_some() {
            bind_count += 1;
            conditions.push_str(&format!(" AND channel = ${bind_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) AS total FROM recipients{conditions}");
        let mut count_query = sqlx::query(&count_sql);
        if let Some(notified) = filter.notified {
            count_query = count_query.bind(notified);
        }
        if let Some(channel) = filter.channel {
            count_query = count_query.bind(channel);
        }
        let total: i64 = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?
            .try_get("total")?;

        let list_sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients{conditions} ORDER BY subscribed_at DESC, id DESC LIMIT ${} OFFSET ${}",
            bind_count + 1,
            bind_count + 2
        );
        let mut list_query = sqlx::query(&list_sql);
        if let Some(notified) = filter.notified {
            list_query = list_query.bind(notified);
        }
        if let Some(channel) = filter.channel {
            list_query = list_query.bind(channel);
        }
        let offset = i64::try_from(filter.offset()).unwrap_or(i64::MAX);
        let rows = list_query
            .bind(i64::from(filter.limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context, e))?;

        let recipients = Self::rows_to_recipients(&rows)?;
        Ok(RecipientPage::new(
            recipients,
            filter,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    #[instrument(skip(self))]
    async fn stats(&self, max_attempts: u32) -> NotifierResult<RecipientStats> {
        let context = recipient_context!(RepositoryOperation::Query)
            .with_additional_info("统计".to_string());

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN notified = 1 THEN 1 ELSE 0 END), 0) AS notified,
                COALESCE(SUM(CASE WHEN notified = 0 THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(CASE WHEN notified = 0 AND attempts > 0 THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(CASE WHEN notified = 0 AND attempts >= $1 THEN 1 ELSE 0 END), 0) AS exhausted
            FROM recipients
            "#,
        )
        .bind(i64::from(max_attempts))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;

        let channel_rows =
            sqlx::query("SELECT channel, COUNT(*) AS count FROM recipients GROUP BY channel")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context, e))?;

        let mut by_channel = ChannelCounts::default();
        for channel_row in &channel_rows {
            let channel: ChannelKind = channel_row.try_get("channel")?;
            let count: i64 = channel_row.try_get("count")?;
            by_channel.add(channel, u64::try_from(count).unwrap_or_default());
        }

        let count = |column: &str| -> NotifierResult<u64> {
            let value: i64 = row.try_get(column)?;
            Ok(u64::try_from(value).unwrap_or_default())
        };

        Ok(RecipientStats {
            total: count("total")?,
            notified: count("notified")?,
            pending: count("pending")?,
            failed: count("failed")?,
            exhausted: count("exhausted")?,
            by_channel,
        })
    }

    #[instrument(skip(self, at))]
    async fn mark_notified(&self, identity: &str, at: DateTime<Utc>) -> NotifierResult<bool> {
        let context = recipient_context!(RepositoryOperation::Update, identity = identity);

        // 条件更新：只有待通知的订阅者会被标记，并发调用不会覆盖已写入的通知时间
        let result = sqlx::query(
            r#"
            UPDATE recipients
            SET notified = 1, notified_at = $2, last_attempt_at = $2, last_error = NULL
            WHERE identity = $1 AND notified = 0
            "#,
        )
        .bind(identity)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;

        if result.rows_affected() == 0 {
            if !self.exists(identity).await? {
                return Err(RepositoryErrorHelpers::recipient_not_found(context));
            }
            return Ok(false);
        }

        RepositoryErrorHelpers::log_operation_success(
            context,
            &format!("订阅者 '{identity}'"),
            Some("已标记为已通知"),
        );
        Ok(true)
    }

    #[instrument(skip(self, at))]
    async fn record_failed_attempt(
        &self,
        identity: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> NotifierResult<u32> {
        let context = recipient_context!(RepositoryOperation::Update, identity = identity);

        let row = sqlx::query(
            r#"
            UPDATE recipients
            SET attempts = attempts + 1, last_attempt_at = $2, last_error = $3
            WHERE identity = $1 AND notified = 0
            RETURNING attempts
            "#,
        )
        .bind(identity)
        .bind(at)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::recipient_database_error(context.clone(), e))?;

        match row {
            Some(row) => {
                let attempts: i64 = row.try_get("attempts")?;
                let attempts = u32::try_from(attempts).map_err(|_| {
                    RepositoryErrorHelpers::mapping_error(&context, format!("失败次数超出范围: {attempts}"))
                })?;
                RepositoryErrorHelpers::log_operation_success(
                    context,
                    &format!("订阅者 '{identity}'"),
                    Some(&format!("失败次数: {attempts}")),
                );
                Ok(attempts)
            }
            // 已通知的订阅者不再累计失败次数
            None => match self.find_by_identity(identity).await? {
                Some(existing) => Ok(existing.attempts),
                None => Err(RepositoryErrorHelpers::recipient_not_found(context)),
            },
        }
    }
}
