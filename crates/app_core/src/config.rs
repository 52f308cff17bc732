//! Application configuration

use crate::FilterPredicate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub grid: GridConfig,
    pub storage: StorageConfig,
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Save the cursor position so the next visit resumes there
    pub remember_selection: bool,
    pub default_filter: FilterPredicate,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remember_selection: true,
            default_filter: FilterPredicate::All,
        }
    }
}

/// Grid geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub columns: usize,
    pub row_height: f32,
    pub viewport_height: f32,
    pub overscan_rows: usize,
    /// PageUp/PageDown stride in rows
    pub page_rows: usize,
    pub thumbnail_size: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            row_height: 220.0,
            viewport_height: 880.0,
            overscan_rows: 2,
            page_rows: 5,
            thumbnail_size: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `<data dir>/glimpse.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Worker threads; `None` = 80% of logical cores, at least 2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl ThumbnailConfig {
    pub fn effective_threads(&self, cpu_count: usize) -> usize {
        self.threads.unwrap_or_else(|| ((cpu_count as f64 * 0.8).round() as usize).max(2))
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::info!("Configuration loaded from {:?}", path);
            Ok(config.validated())
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("com", "Glimpse", "Glimpse")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Clamp values a hand-edited file may have broken
    fn validated(mut self) -> Self {
        self.grid.columns = self.grid.columns.max(1);
        self.grid.page_rows = self.grid.page_rows.max(1);
        self.grid.row_height = self.grid.row_height.max(1.0);
        self.grid.viewport_height = self.grid.viewport_height.max(0.0);
        if self.thumbnails.threads == Some(0) {
            self.thumbnails.threads = None;
        }
        self
    }
}
