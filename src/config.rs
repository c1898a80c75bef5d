use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::db::SettingsStore;

pub const DEFAULT_VISUAL_STYLE: &str = "Cinematic film still, photorealistic, anamorphic lens, \
     subtle film grain, rich contrast, consistent character design across shots";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub image_timeout_seconds: u64,
    pub http_timeout_seconds: u64,
    pub database_url: String,
    pub credential_cache_path: PathBuf,
    pub api_key_setting_name: String,
    pub visual_style: String,
    pub output_dir: PathBuf,
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Config {
    pub fn load() -> Self {
        let visual_style = non_blank(&env_string("STORYBOARD_VISUAL_STYLE", ""))
            .unwrap_or_else(|| DEFAULT_VISUAL_STYLE.to_string());

        Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_api_base: env_string(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_text_model: env_string("GEMINI_TEXT_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string(
                "GEMINI_IMAGE_MODEL",
                "gemini-2.5-flash-image-preview",
            ),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            image_timeout_seconds: env_u64("IMAGE_TIMEOUT_SECONDS", 90),
            http_timeout_seconds: env_u64("HTTP_TIMEOUT_SECONDS", 120),
            database_url: env_string("DATABASE_URL", "sqlite://studio.db?mode=rwc"),
            credential_cache_path: PathBuf::from(env_string(
                "CREDENTIAL_CACHE_PATH",
                ".studio/api_key",
            )),
            api_key_setting_name: env_string("API_KEY_SETTING_NAME", "gemini_api_key"),
            visual_style,
            output_dir: PathBuf::from(env_string("OUTPUT_DIR", "output")),
        }
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_seconds.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.max(1))
    }

    /// The key compiled into the binary wins over `GEMINI_API_KEY` as the
    /// last-resort default.
    pub fn fallback_api_key(&self) -> Option<String> {
        option_env!("STUDIO_DEFAULT_API_KEY")
            .and_then(non_blank)
            .or_else(|| non_blank(&self.gemini_api_key))
    }
}

fn read_cached_key(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    non_blank(&raw)
}

fn write_cached_key(path: &Path, key: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, key).with_context(|| format!("Failed to write {}", path.display()))
}

/// Resolves the generative-AI credential: settings store, then the local
/// cache file, then `fallback`. A key found in the store refreshes the cache.
pub async fn resolve_api_key(
    store: Option<&dyn SettingsStore>,
    setting_name: &str,
    cache_path: &Path,
    fallback: Option<String>,
) -> Option<String> {
    if let Some(store) = store {
        match store.get_setting(setting_name).await {
            Ok(Some(value)) => {
                if let Some(key) = non_blank(&value) {
                    info!("Using API key from settings store ({})", setting_name);
                    if let Err(err) = write_cached_key(cache_path, &key) {
                        warn!("Failed to refresh credential cache: {err:#}");
                    }
                    return Some(key);
                }
            }
            Ok(None) => debug!("Setting {} not present in store", setting_name),
            Err(err) => warn!("Settings store lookup for {} failed: {err:#}", setting_name),
        }
    }

    if let Some(key) = read_cached_key(cache_path) {
        info!("Using cached API key from {}", cache_path.display());
        return Some(key);
    }

    let key = fallback.and_then(|value| non_blank(&value));
    if key.is_some() {
        info!("Using API key from build/environment default");
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedStore {
        settings: HashMap<String, String>,
        fail: bool,
    }

    #[async_trait]
    impl SettingsStore for FixedStore {
        async fn get_setting(&self, key: &str) -> Result<Option<String>> {
            if self.fail {
                return Err(anyhow::anyhow!("store offline"));
            }
            Ok(self.settings.get(key).cloned())
        }

        async fn increment_counter(&self, _name: &str, _delta: i64) -> Result<()> {
            Ok(())
        }
    }

    fn store_with(key: Option<&str>, fail: bool) -> FixedStore {
        let mut settings = HashMap::new();
        if let Some(key) = key {
            settings.insert("gemini_api_key".to_string(), key.to_string());
        }
        FixedStore { settings, fail }
    }

    #[tokio::test]
    async fn store_value_wins_and_refreshes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("nested").join("api_key");
        fs::create_dir_all(cache.parent().unwrap()).unwrap();
        fs::write(&cache, "cached-key").unwrap();
        let store = store_with(Some(" remote-key "), false);

        let key = resolve_api_key(
            Some(&store),
            "gemini_api_key",
            &cache,
            Some("default-key".to_string()),
        )
        .await;

        assert_eq!(key.as_deref(), Some("remote-key"));
        assert_eq!(fs::read_to_string(&cache).unwrap(), "remote-key");
    }

    #[tokio::test]
    async fn falls_back_to_cache_when_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("api_key");
        fs::write(&cache, "cached-key\n").unwrap();
        let store = store_with(Some("remote-key"), true);

        let key = resolve_api_key(Some(&store), "gemini_api_key", &cache, None).await;
        assert_eq!(key.as_deref(), Some("cached-key"));
    }

    #[tokio::test]
    async fn blank_store_value_and_missing_cache_use_default() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("missing");
        let store = store_with(Some("   "), false);

        let key = resolve_api_key(
            Some(&store),
            "gemini_api_key",
            &cache,
            Some("default-key".to_string()),
        )
        .await;
        assert_eq!(key.as_deref(), Some("default-key"));
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn no_source_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let key = resolve_api_key(None, "gemini_api_key", &dir.path().join("x"), Some(" ".into()))
            .await;
        assert!(key.is_none());
    }
}
