use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

use proteus_core::service::EngineConfig;

pub struct Config {
    pub db_path: PathBuf,
    /// Base URL of the profile document store. `None` runs local-only.
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    pub user_id: Option<String>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "proteus").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::resolve(data_dir.join("proteus.db"), |key| std::env::var(key).ok())
    }

    /// Apply `PROTEUS_*` overrides from `env` on top of the default db path.
    fn resolve(default_db: PathBuf, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty("PROTEUS_DB").map_or(default_db, PathBuf::from);
        let mut engine = EngineConfig::default();
        if let Some(ms) = non_empty("PROTEUS_SYNC_DEBOUNCE_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("Invalid PROTEUS_SYNC_DEBOUNCE_MS '{ms}'"))?;
            engine.debounce = Duration::from_millis(ms);
        }

        Ok(Config {
            db_path,
            remote_url: non_empty("PROTEUS_REMOTE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            remote_token: non_empty("PROTEUS_REMOTE_TOKEN"),
            user_id: non_empty("PROTEUS_USER_ID"),
            engine,
        })
    }
}
