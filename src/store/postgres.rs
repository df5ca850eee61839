//! Postgres-backed work item store.
//!
//! Owns the connection pool shared across all handlers. Status transitions
//! are guarded UPDATEs (`WHERE id = $1 AND status = $expected`) checked via
//! `rows_affected`, so concurrent claimers serialize per row without any
//! in-process locking.

use crate::error::{Error, Result};
use crate::model::{NewWorkItem, Status, WorkId, WorkItem};
use crate::store::WorkStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Database handle. Owns the connection pool.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check — run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

const ITEM_COLUMNS: &str = "id, group_key, language, source_locator, cache_locator, status, \
                            result_locator, claimed_at, created_at, updated_at";

#[async_trait]
impl WorkStore for Db {
    async fn insert(&self, new: NewWorkItem) -> Result<WorkItem> {
        let item = new.build();
        sqlx::query(
            "INSERT INTO work_items (id, group_key, language, source_locator, cache_locator, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
        )
        .bind(item.id.0)
        .bind(&item.group_key)
        .bind(&item.language)
        .bind(&item.source_locator)
        .bind(&item.cache_locator)
        .bind(item.status.to_string())
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(item)
    }

    async fn get(&self, id: WorkId) -> Result<WorkItem> {
        let row: Option<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("work item {id}")))?
            .try_into_work_item()
    }

    async fn sample_group(
        &self,
        language: &str,
        exclude_groups: &[String],
    ) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT group_key FROM work_items
             WHERE status = 'unassigned' AND language = $1 AND group_key <> ALL($2)
             GROUP BY group_key ORDER BY RANDOM() LIMIT 1",
        )
        .bind(language)
        .bind(exclude_groups)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(group,)| group))
    }

    async fn sample_unassigned(
        &self,
        language: &str,
        group_key: &str,
    ) -> Result<Option<WorkItem>> {
        let row: Option<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items
             WHERE status = 'unassigned' AND language = $1 AND group_key = $2
             ORDER BY RANDOM() LIMIT 1"
        ))
        .bind(language)
        .bind(group_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkItemRow::try_into_work_item).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: WorkId,
        expected: Status,
        new: Status,
        result_locator: Option<&str>,
    ) -> Result<bool> {
        if !expected.can_transition_to(new) {
            return Err(Error::InvalidTransition {
                from: expected,
                to: new,
            });
        }

        let rows_affected = sqlx::query(
            "UPDATE work_items
             SET status = $1,
                 result_locator = $2,
                 claimed_at = CASE WHEN $1 = 'in_progress' THEN now() ELSE NULL END,
                 updated_at = now()
             WHERE id = $3 AND status = $4",
        )
        .bind(new.to_string())
        .bind(result_locator)
        .bind(id.0)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn list(
        &self,
        status: Option<Status>,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR language = $2)
             ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(status.map(|s| s.to_string()))
        .bind(language)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect()
    }

    async fn stale_in_progress(&self, claimed_before: DateTime<Utc>) -> Result<Vec<WorkItem>> {
        let rows: Vec<WorkItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items
             WHERE status = 'in_progress' AND claimed_at < $1
             ORDER BY claimed_at ASC"
        ))
        .bind(claimed_before)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    group_key: String,
    language: String,
    source_locator: String,
    cache_locator: String,
    status: String,
    result_locator: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkItemRow {
    fn try_into_work_item(self) -> Result<WorkItem> {
        Ok(WorkItem {
            id: WorkId(self.id),
            group_key: self.group_key,
            language: self.language,
            source_locator: self.source_locator,
            cache_locator: self.cache_locator,
            status: self.status.parse()?,
            result_locator: self.result_locator,
            claimed_at: self.claimed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
