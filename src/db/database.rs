use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::db::models::{ActivityInsert, ActivityRow};
use crate::db::SettingsStore;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    sender: mpsc::Sender<ActivityInsert>,
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        // Every connection to `:memory:` opens its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (\
                key TEXT PRIMARY KEY,\
                value TEXT NOT NULL,\
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS usage_counters (\
                name TEXT PRIMARY KEY,\
                count INTEGER NOT NULL DEFAULT 0,\
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS activity_log (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                action TEXT NOT NULL,\
                detail TEXT NOT NULL,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_activity_log_created_at ON activity_log(created_at);")
            .execute(&pool)
            .await?;

        info!("Database tables created successfully");

        let (sender, receiver) = mpsc::channel(1000);
        let writer_pool = pool.clone();
        tokio::spawn(async move {
            activity_writer(writer_pool, receiver).await;
        });

        info!("Activity writer task started");

        Ok(Database { pool, sender })
    }

    pub async fn queue_activity(&self, insert: ActivityInsert) -> Result<()> {
        self.sender
            .send(insert)
            .await
            .map_err(|err| anyhow::anyhow!("Failed to queue activity insert: {err}"))
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fetch_setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn add_to_counter(&self, name: &str, delta: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_counters (name, count) VALUES (?, ?) \
             ON CONFLICT(name) DO UPDATE SET count = count + excluded.count, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(name)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn counter_value(&self, name: &str) -> Result<i64> {
        let value = sqlx::query_scalar::<_, i64>("SELECT count FROM usage_counters WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or(0))
    }

    pub async fn insert_activity(&self, insert: &ActivityInsert) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO activity_log (action, detail, created_at) VALUES (?, ?, ?)",
        )
        .bind(&insert.action)
        .bind(&insert.detail)
        .bind(insert.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityRow>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, action, detail, created_at FROM activity_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().rev().collect())
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.fetch_setting(key).await
    }

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<()> {
        self.add_to_counter(name, delta).await
    }

    async fn log_activity(&self, action: &str, detail: &str) -> Result<()> {
        self.queue_activity(ActivityInsert::now(action, detail)).await
    }
}

async fn activity_writer(pool: SqlitePool, mut receiver: mpsc::Receiver<ActivityInsert>) {
    while let Some(activity) = receiver.recv().await {
        let result = sqlx::query(
            "INSERT INTO activity_log (action, detail, created_at) VALUES (?, ?, ?)",
        )
        .bind(activity.action)
        .bind(activity.detail)
        .bind(activity.created_at)
        .execute(&pool)
        .await;

        if let Err(err) = result {
            warn!("Error in activity_writer: {err}");
        }
    }

    info!("Activity writer task stopped");
}
