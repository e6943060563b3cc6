use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LifecycleError, Result};

pub const DB_ENV: &str = "SHIFTBOARD_DB";
pub const ACTOR_ENV: &str = "SHIFTBOARD_ACTOR";

/// Settings read from `config.json` in the user's config directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file; defaults to `shiftboard.db` in the data directory.
    pub db_path: Option<PathBuf>,
    /// Name recorded in the status log for every change.
    pub actor: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            actor: "admin".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_file() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(std::env::var(DB_ENV).ok(), std::env::var(ACTOR_ENV).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            LifecycleError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn apply_env(&mut self, db: Option<String>, actor: Option<String>) {
        if let Some(db) = db.filter(|s| !s.trim().is_empty()) {
            self.db_path = Some(PathBuf::from(db));
        }
        if let Some(actor) = actor.filter(|s| !s.trim().is_empty()) {
            self.actor = actor.trim().to_string();
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_db_path)
    }

    fn default_file() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "shiftboard")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

fn default_db_path() -> PathBuf {
    // XDG data directory, or the current directory as a fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "shiftboard") {
        proj_dirs.data_dir().join("shiftboard.db")
    } else {
        PathBuf::from("shiftboard.db")
    }
}
