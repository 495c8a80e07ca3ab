use std::path::{Path, PathBuf};
use std::time::Duration;

use facets_model::PreferenceMap;
use serde::{Deserialize, Serialize};

use crate::domains::preferences::PreferenceRules;

const APP_DIR: &str = "facets";
const CONFIG_FILE: &str = "engine.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server_url: String,
    pub request_timeout_secs: u64,
    /// Upper bound on photos held by one section
    pub max_photos_per_section: usize,
    pub page_size: usize,
    /// Trailing debounce for preference toggles
    pub debounce_ms: u64,
    pub max_upload_bytes: usize,
    pub allowed_media_types: Vec<String>,
    pub revalidate_on_settle: bool,
    /// Visibility assumed for a field nobody has set yet
    pub default_visibility: bool,
    pub default_preferences: PreferenceMap,
    pub coupling: PreferenceRules,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            max_photos_per_section: 6,
            page_size: 6,
            debounce_ms: 150,
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_media_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            revalidate_on_settle: true,
            default_visibility: true,
            default_preferences: PreferenceMap::new(),
            coupling: PreferenceRules::default(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Self {
        let mut config = Self::default_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    log::warn!(
                        "[Config] Ignoring {}: {}",
                        path.display(),
                        e
                    );
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env_overrides();
        config
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(server_url) = std::env::var("FACETS_SERVER_URL") {
            self.server_url = server_url;
        }
        if let Ok(raw) = std::env::var("FACETS_DEBOUNCE_MS") {
            match raw.parse() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => log::warn!(
                    "[Config] FACETS_DEBOUNCE_MS is not a number: {raw}"
                ),
            }
        }
    }
}
