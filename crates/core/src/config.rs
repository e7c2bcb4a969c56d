//! Plugin configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under `~/.config` holding the configuration file.
pub const CONFIG_DIR: &str = "review-notes";
/// File name of the configuration document.
pub const CONFIG_FILE: &str = "config.json";
/// Prefix for environment overrides, e.g. `REVIEW_NOTES__UTC_OFFSET_HOURS=3`.
pub const ENV_PREFIX: &str = "REVIEW_NOTES";

/// Runtime configuration for the review backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Host-provided plugin directory; the store file lives here.
    pub base_dir: PathBuf,
    /// Name of the JSON document holding every review.
    pub store_file: String,
    /// Directory holding the stylesheet registered with the host.
    pub static_dir: PathBuf,
    /// Host image cache, laid out as `<app_id>/<file_name>`.
    pub image_cache_dir: PathBuf,
    /// Fixed offset used for stored timestamps and formatted dates.
    pub utc_offset_hours: i32,
    /// Longest accepted review text, in characters.
    pub max_review_length: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR);
        Self {
            static_dir: base_dir.join("static"),
            image_cache_dir: base_dir.join("librarycache"),
            base_dir,
            store_file: "reviews.json".to_string(),
            utc_offset_hours: 4,
            max_review_length: 5000,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path` (optional) layered over the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("failed to build default configuration")?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.offset()?;
        Ok(config)
    }

    /// Full path of the review store document.
    pub fn store_path(&self) -> PathBuf {
        self.base_dir.join(&self.store_file)
    }

    /// The configured offset as a chrono [`FixedOffset`].
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).with_context(|| {
            format!("utc_offset_hours {} is out of range", self.utc_offset_hours)
        })
    }
}

/// Default location of the configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write a default configuration file when none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path())
}

fn write_default_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.json"))?;
        assert_eq!(config.store_file, "reviews.json");
        assert_eq!(config.utc_offset_hours, 4);
        assert_eq!(config.max_review_length, 5000);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"base_dir": "/tmp/plugin", "utc_offset_hours": 3, "max_review_length": 10}"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.base_dir, PathBuf::from("/tmp/plugin"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/plugin/reviews.json"));
        assert_eq!(config.offset()?.local_minus_utc(), 3 * 3600);
        assert_eq!(config.max_review_length, 10);
        Ok(())
    }

    #[test]
    fn default_file_is_written_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        write_default_config(path.clone())?;
        let written = AppConfig::load_from(&path)?;
        assert_eq!(written, AppConfig::default());

        fs::write(&path, r#"{"store_file": "custom.json"}"#)?;
        write_default_config(path.clone())?;
        assert_eq!(AppConfig::load_from(&path)?.store_file, "custom.json");
        Ok(())
    }

    #[test]
    fn rejects_impossible_offsets() {
        let config = AppConfig {
            utc_offset_hours: 30,
            ..AppConfig::default()
        };
        assert!(config.offset().is_err());
    }
}
