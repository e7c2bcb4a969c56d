//! Host-facing operations and plugin lifecycle.
//!
//! Every operation answers with a plain value: failures are logged and mapped
//! to `false`, `{}` or `None` so the host never sees an error object.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    images::ImageCache,
    report::{self, RatingsReport},
    store::{LoadOutcome, ReviewStore, StoreError},
};

/// Stylesheet registered with the host when present.
pub const STYLESHEET: &str = "review-writer.css";
/// Frontend bundle registered with the host when present.
pub const SCRIPT: &str = "index.js";

/// Services the host runtime offers to the plugin during startup.
pub trait Host {
    /// Inject a stylesheet from the plugin's static directory.
    fn add_browser_css(&mut self, file_name: &str);
    /// Inject a script from the plugin's frontend bundle.
    fn add_browser_js(&mut self, file_name: &str);
    /// Signal that the backend finished loading.
    fn ready(&mut self);
}

/// Operations exposed to the host UI.
pub struct Backend {
    config: AppConfig,
    images: ImageCache,
    store: Mutex<Option<ReviewStore>>,
}

impl Backend {
    /// Backend with an unloaded store.
    pub fn new(config: AppConfig) -> Self {
        Self {
            images: ImageCache::new(&config.image_cache_dir),
            config,
            store: Mutex::new(None),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether [`Backend::load_store`] has run.
    pub fn is_loaded(&self) -> bool {
        self.store.lock().is_some()
    }

    /// Create the base directory and read the store document.
    pub fn load_store(&self) -> Result<LoadOutcome> {
        fs::create_dir_all(&self.config.base_dir).with_context(|| {
            format!("failed to create {}", self.config.base_dir.display())
        })?;
        let mut store = ReviewStore::from_config(&self.config)?;
        let outcome = store.load();
        *self.store.lock() = Some(store);
        Ok(outcome)
    }

    /// Write the store document; a no-op before the store is loaded.
    pub fn persist(&self) -> Result<(), StoreError> {
        match self.store.lock().as_ref() {
            Some(store) => store.save(),
            None => Ok(()),
        }
    }

    /// Stored record plus formatted dates, or `{}` when there is none.
    pub fn get_review(&self, app_id: &str) -> Value {
        let app_id = app_id.trim();
        debug!("get_review called for {app_id}");
        self.with_store("get_review", empty_object(), |store| {
            store.get(app_id).unwrap_or_else(empty_object)
        })
    }

    /// Save a JSON-encoded record; `false` on invalid input or a failed write.
    pub fn save_review(&self, app_id: &str, review_data: impl AsRef<[u8]>) -> bool {
        let app_id = app_id.trim();
        debug!("save_review called for {app_id}");
        if app_id.is_empty() {
            warn!("save_review called without a game id");
            return false;
        }
        self.with_store("save_review", false, |store| {
            match store.put(app_id, review_data.as_ref()) {
                Ok(_) => true,
                Err(err) => {
                    error!("failed to save review for {app_id}: {err}");
                    false
                }
            }
        })
    }

    /// Delete a record; `true` only when one existed and the store was written.
    pub fn delete_review(&self, app_id: &str) -> bool {
        let app_id = app_id.trim();
        debug!("delete_review called for {app_id}");
        self.with_store("delete_review", false, |store| {
            store.delete(app_id).unwrap_or_else(|err| {
                error!("failed to delete review for {app_id}: {err}");
                false
            })
        })
    }

    /// Whether a record exists.
    pub fn has_review(&self, app_id: &str) -> bool {
        let app_id = app_id.trim();
        self.with_store("has_review", false, |store| store.contains(app_id))
    }

    /// Every stored record, exactly as persisted.
    pub fn get_all_reviews(&self) -> Value {
        self.with_store("get_all_reviews", empty_object(), |store| store.list_all())
    }

    /// Ratings report over the current records.
    pub fn get_game_ratings(
        &self,
        show_all_games: bool,
        selected_year: Option<&str>,
    ) -> RatingsReport {
        debug!(
            "get_game_ratings called (show_all_games={show_all_games}, year={selected_year:?})"
        );
        let records = self.with_store("get_game_ratings", Vec::new(), |store| store.records());
        report::build(
            records.iter().map(|(app_id, record)| (app_id.as_str(), record)),
            show_all_games,
            selected_year,
        )
    }

    /// Cached cover art as a data URL, or `None` when it is not cached.
    pub fn get_game_image_base64(&self, app_id: &str, file_name: &str) -> Option<String> {
        self.images
            .data_url(app_id.trim(), file_name)
            .unwrap_or_else(|err| {
                warn!("failed to read image {file_name} for {app_id}: {err:#}");
                None
            })
    }

    /// Forward a frontend message to the log.
    pub fn debug_log(&self, message: &str) -> bool {
        info!(target: "frontend", "{message}");
        true
    }

    /// Effective configuration as JSON.
    pub fn get_config(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or_else(|err| {
            error!("failed to serialize configuration: {err}");
            empty_object()
        })
    }

    fn with_store<T>(
        &self,
        operation: &str,
        fallback: T,
        f: impl FnOnce(&mut ReviewStore) -> T,
    ) -> T {
        let mut guard = self.store.lock();
        match guard.as_mut() {
            Some(store) => f(store),
            None => {
                warn!("{operation} called before the review store was loaded");
                fallback
            }
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Lifecycle wrapper driven by the host runtime.
pub struct Plugin {
    backend: Backend,
}

impl Plugin {
    /// Plugin around a fresh backend.
    pub fn new(config: AppConfig) -> Self {
        Self {
            backend: Backend::new(config),
        }
    }

    /// Operations for the host UI.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Load the store, register frontend assets that exist, then signal readiness.
    pub fn load(&self, host: &mut dyn Host) -> Result<LoadOutcome> {
        let config = self.backend.config();
        info!("plugin base dir: {}", config.base_dir.display());
        let outcome = self.backend.load_store()?;

        if stylesheet_path(config).is_file() {
            host.add_browser_css(STYLESHEET);
        } else {
            debug!("{STYLESHEET} not found, skipping");
        }
        if script_path(config).is_file() {
            host.add_browser_js(SCRIPT);
        } else {
            debug!("{SCRIPT} not found, skipping");
        }

        host.ready();
        info!("review backend loaded ({outcome:?})");
        Ok(outcome)
    }

    /// Persist the store; failures are logged.
    pub fn unload(&self) {
        info!("unloading review backend");
        if let Err(err) = self.backend.persist() {
            error!("failed to persist reviews on unload: {err}");
        }
    }
}

fn stylesheet_path(config: &AppConfig) -> PathBuf {
    config.static_dir.join(STYLESHEET)
}

fn script_path(config: &AppConfig) -> PathBuf {
    config
        .base_dir
        .join(".millennium")
        .join("Dist")
        .join(SCRIPT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingHost {
        css: Vec<String>,
        js: Vec<String>,
        ready: bool,
    }

    impl Host for RecordingHost {
        fn add_browser_css(&mut self, file_name: &str) {
            self.css.push(file_name.to_string());
        }

        fn add_browser_js(&mut self, file_name: &str) {
            self.js.push(file_name.to_string());
        }

        fn ready(&mut self) {
            self.ready = true;
        }
    }

    fn config_in(dir: &Path) -> AppConfig {
        AppConfig {
            base_dir: dir.join("plugin"),
            static_dir: dir.join("plugin").join("static"),
            image_cache_dir: dir.join("cache"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn operations_fail_softly_before_load() -> Result<()> {
        let dir = tempdir()?;
        let backend = Backend::new(config_in(dir.path()));
        assert!(!backend.is_loaded());
        assert_eq!(backend.get_review("1"), json!({}));
        assert!(!backend.save_review("1", r#"{"rating": 3}"#));
        assert!(!backend.delete_review("1"));
        assert_eq!(backend.get_all_reviews(), json!({}));
        assert_eq!(backend.get_game_ratings(true, None).total_games, 0);
        Ok(())
    }

    #[test]
    fn load_registers_only_existing_assets() -> Result<()> {
        let dir = tempdir()?;
        let config = config_in(dir.path());
        fs::create_dir_all(&config.static_dir)?;
        fs::write(config.static_dir.join(STYLESHEET), "body {}")?;

        let plugin = Plugin::new(config);
        let mut host = RecordingHost::default();
        assert_eq!(plugin.load(&mut host)?, LoadOutcome::Missing);
        assert_eq!(host.css, [STYLESHEET]);
        assert!(host.js.is_empty());
        assert!(host.ready);
        assert!(plugin.backend().is_loaded());
        Ok(())
    }

    #[test]
    fn reviews_survive_a_restart() -> Result<()> {
        let dir = tempdir()?;
        let plugin = Plugin::new(config_in(dir.path()));
        plugin.load(&mut RecordingHost::default())?;
        let backend = plugin.backend();

        assert!(backend.save_review(" 10 ", r#"{"status": "FINISHED", "rating": 9}"#));
        assert!(backend.save_review("20", r#"{"status": "IN_PROGRESS", "rating": 7}"#));
        assert!(!backend.save_review("30", "{broken"));
        assert!(backend.has_review("10"));
        assert!(!backend.has_review("30"));
        plugin.unload();

        let restarted = Plugin::new(config_in(dir.path()));
        assert_eq!(
            restarted.load(&mut RecordingHost::default())?,
            LoadOutcome::Loaded(2)
        );
        let backend = restarted.backend();
        assert_eq!(backend.get_review("10")["rating"], json!(9));
        assert_eq!(backend.get_review("999"), json!({}));

        let report = backend.get_game_ratings(false, Some("all"));
        assert_eq!(report.total_games, 1);
        assert_eq!(report.ratings[0].app_id, "10");

        assert!(backend.delete_review("20"));
        assert!(!backend.delete_review("20"));
        assert_eq!(
            backend.get_all_reviews().as_object().map(Map::len),
            Some(1)
        );
        Ok(())
    }

    #[test]
    fn images_and_config_pass_through() -> Result<()> {
        let dir = tempdir()?;
        let config = config_in(dir.path());
        fs::create_dir_all(config.image_cache_dir.join("10"))?;
        fs::write(config.image_cache_dir.join("10").join("icon.png"), [1u8, 2, 3])?;

        let backend = Backend::new(config);
        assert_eq!(
            backend.get_game_image_base64("10", "icon.png").as_deref(),
            Some("data:image/png;base64,AQID")
        );
        assert_eq!(backend.get_game_image_base64("10", "missing.png"), None);
        assert!(backend.debug_log("hello from the frontend"));
        assert_eq!(backend.get_config()["utc_offset_hours"], json!(4));
        Ok(())
    }
}
