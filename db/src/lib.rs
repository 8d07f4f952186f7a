use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use common::{Action, UsageAggregate};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

// Fixed width so that MIN/MAX over the text column follow chronological order.
// Rows stamped by the column default (no fraction) parse with the same pattern.
const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_READ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// A private in-memory database. Every connection to `sqlite::memory:` opens a
/// fresh database, so the pool is pinned to a single connection that is never
/// recycled.
pub async fn init_pool_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

pub async fn create_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS usage_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            action TEXT NOT NULL,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        )"#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS usage_stats_user_id ON usage_stats (user_id)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn record_usage(pool: &SqlitePool, user_id: &str, action: Action) -> Result<()> {
    record_usage_at(pool, user_id, action, Utc::now()).await
}

pub async fn record_usage_at(
    pool: &SqlitePool,
    user_id: &str,
    action: Action,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO usage_stats (user_id, action, timestamp) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(action.as_str())
        .bind(at.format(TIMESTAMP_WRITE_FORMAT).to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn usage_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<UsageAggregate>> {
    let rows = sqlx::query_as::<_, (String, i64, String, String)>(
        r#"SELECT action, COUNT(*), MIN(timestamp), MAX(timestamp)
        FROM usage_stats
        WHERE user_id = ?
        GROUP BY action
        ORDER BY action"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(into_aggregate).collect()
}

pub async fn usage_total(pool: &SqlitePool) -> Result<Vec<UsageAggregate>> {
    let rows = sqlx::query_as::<_, (String, i64, String, String)>(
        r#"SELECT action, COUNT(*), MIN(timestamp), MAX(timestamp)
        FROM usage_stats
        GROUP BY action
        ORDER BY action"#,
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(into_aggregate).collect()
}

fn into_aggregate(
    (action, count, first_use, last_use): (String, i64, String, String),
) -> Result<UsageAggregate> {
    Ok(UsageAggregate {
        action,
        count,
        first_use: parse_timestamp(&first_use)?,
        last_use: parse_timestamp(&last_use)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIMESTAMP_READ_FORMAT)
        .with_context(|| format!("invalid usage timestamp {raw:?}"))?;
    Ok(naive.and_utc())
}
