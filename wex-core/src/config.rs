//! ``src/config.rs``
//! ============================================================================
//! # Config: tree-view configuration loader and saver
//!
//! User-editable settings for the window tree: search delimiter, store
//! capacity, default display order, refresh cadence, and logging. Loads and
//! saves TOML from the cross-platform config path via the
//! [`directories`](https://docs.rs/directories) crate, with robust defaulting
//! when no config file exists.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TreeResult;
use crate::logging::LogConfig;
use crate::model::window_node::WindowColumn;
use crate::model::window_tree::SortOrder;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// OR-delimiter splitting the search string into terms.
    pub search_delimiter: char,

    /// Initial handle→node store capacity.
    pub store_capacity: usize,

    /// Column the display list is ordered by on first build.
    pub default_sort_column: WindowColumn,

    pub default_sort_order: SortOrder,

    /// Cadence at which the embedding view triggers rebuilds.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    pub logging: LogConfig,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            search_delimiter: '|',
            store_capacity: 512,
            default_sort_column: WindowColumn::Class,
            default_sort_order: SortOrder::Ascending,
            refresh_interval: Duration::from_secs(1),
            logging: LogConfig::default(),
        }
    }
}

impl TreeConfig {
    /// XDG-compliant location of the config file, when a home directory
    /// can be resolved.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "wex").map(|dirs: ProjectDirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from the config path; a missing file yields defaults, a present
    /// but malformed file is an error (never silently half-applied).
    pub fn load() -> TreeResult<Self> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> TreeResult<Self> {
        if !path.exists() {
            info!(
                marker = "CONFIG_DEFAULTED",
                path = %path.display(),
                "no config file, using defaults"
            );
            return Ok(Self::default());
        }

        let raw: String = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;

        Ok(config)
    }

    /// Persist to the config path, creating parent directories as needed.
    pub fn save(&self) -> TreeResult<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> TreeResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw: String = toml::to_string_pretty(self)?;
        fs::write(path, raw)?;

        info!(marker = "CONFIG_SAVED", path = %path.display(), "config written");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;

    #[test]
    fn defaults_are_sensible() {
        let config = TreeConfig::default();
        assert_eq!(config.search_delimiter, '|');
        assert_eq!(config.default_sort_column, WindowColumn::Class);
        assert_eq!(config.refresh_interval, Duration::from_secs(1));
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = TreeConfig {
            search_delimiter: ',',
            store_capacity: 64,
            default_sort_column: WindowColumn::Thread,
            default_sort_order: SortOrder::Descending,
            refresh_interval: Duration::from_millis(500),
            logging: LogConfig::default(),
        };

        let raw = toml::to_string_pretty(&config).unwrap();
        let back: TreeConfig = toml::from_str(&raw).unwrap();

        assert_eq!(back.search_delimiter, ',');
        assert_eq!(back.default_sort_column, WindowColumn::Thread);
        assert_eq!(back.default_sort_order, SortOrder::Descending);
        assert_eq!(back.refresh_interval, Duration::from_millis(500));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: TreeConfig = toml::from_str("search_delimiter = \";\"").unwrap();
        assert_eq!(config.search_delimiter, ';');
        assert_eq!(config.store_capacity, 512);
    }

    #[test]
    fn missing_file_defaults_and_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("absent.toml");
        let config = TreeConfig::load_from(&missing).unwrap();
        assert_eq!(config.search_delimiter, '|');

        let malformed = dir.path().join("bad.toml");
        fs::write(&malformed, "search_delimiter = [not toml").unwrap();
        let err = TreeConfig::load_from(&malformed).unwrap_err();
        assert!(matches!(err, TreeError::ConfigParse(_)));
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = TreeConfig::default();
        config.store_capacity = 2048;
        config.save_to(&path).unwrap();

        let back = TreeConfig::load_from(&path).unwrap();
        assert_eq!(back.store_capacity, 2048);
    }
}
