pub mod database;
pub mod models;

use anyhow::Result;
use async_trait::async_trait;

pub use database::Database;

/// Settings and usage telemetry consumed by the generation pipeline.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<()>;

    async fn log_activity(&self, _action: &str, _detail: &str) -> Result<()> {
        Ok(())
    }
}
