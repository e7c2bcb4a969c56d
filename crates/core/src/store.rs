//! JSON-backed review store.
//!
//! The whole collection lives in one document mapping game identifiers to
//! review records. Every mutation rewrites that document before returning.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    clock::ReviewClock,
    config::AppConfig,
    models::{ReviewRecord, ReviewStatus, CREATED_AT_FORMATTED, FINISHED_AT_FORMATTED},
};

/// Default upper bound for review text, in characters.
pub const DEFAULT_MAX_REVIEW_LENGTH: usize = 5000;

/// Failures reported by mutating store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The payload bytes were not UTF-8 text.
    #[error("review payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    /// The payload was not parseable JSON.
    #[error("review payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    /// The payload parsed but was not a JSON object.
    #[error("review payload must be a JSON object")]
    NotAnObject,
    /// A known field had the wrong type.
    #[error("review payload has invalid fields: {0}")]
    InvalidRecord(#[source] serde_json::Error),
    /// The review text exceeded the configured limit.
    #[error("review text is {len} characters, limit is {max}")]
    ReviewTooLong {
        /// Characters supplied.
        len: usize,
        /// Characters allowed.
        max: usize,
    },
    /// Writing the store document failed.
    #[error("failed to persist {}: {source}", path.display())]
    Persist {
        /// Store document path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Serializing the store document failed.
    #[error("failed to serialize review store: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// What [`ReviewStore::load`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document was read; holds the number of records.
    Loaded(usize),
    /// No document existed; the store starts empty.
    Missing,
    /// The document was unreadable or malformed and was ignored.
    Discarded,
}

/// In-memory review collection mirrored to a single JSON document.
#[derive(Debug)]
pub struct ReviewStore {
    path: PathBuf,
    clock: ReviewClock,
    max_review_length: usize,
    records: Map<String, Value>,
}

impl ReviewStore {
    /// Create an empty store backed by `path`. Call [`ReviewStore::load`] to read it.
    pub fn new(path: impl Into<PathBuf>, clock: ReviewClock) -> Self {
        Self {
            path: path.into(),
            clock,
            max_review_length: DEFAULT_MAX_REVIEW_LENGTH,
            records: Map::new(),
        }
    }

    /// Build an empty store from the application configuration.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let clock = ReviewClock::new(config.offset()?);
        Ok(Self::new(config.store_path(), clock).with_max_review_length(config.max_review_length))
    }

    /// Override the review length limit.
    pub fn with_max_review_length(mut self, max: usize) -> Self {
        self.max_review_length = max;
        self
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clock used for timestamps and formatted dates.
    pub fn clock(&self) -> ReviewClock {
        self.clock
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the in-memory map with the document on disk.
    ///
    /// A missing document yields an empty store. An unreadable or malformed
    /// document is logged and also yields an empty store.
    pub fn load(&mut self) -> LoadOutcome {
        self.records = Map::new();
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("no review store at {}, starting empty", self.path.display());
                return LoadOutcome::Missing;
            }
            Err(err) => {
                warn!("failed to read review store {}: {err}", self.path.display());
                return LoadOutcome::Discarded;
            }
        };

        match parse_document(&bytes) {
            Ok(records) => {
                info!(
                    "loaded {} reviews from {}",
                    records.len(),
                    self.path.display()
                );
                self.records = records;
                LoadOutcome::Loaded(self.records.len())
            }
            Err(err) => {
                warn!(
                    "discarding unreadable review store {}: {err:#}",
                    self.path.display()
                );
                LoadOutcome::Discarded
            }
        }
    }

    /// Write the whole map to disk, pretty-printed.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Persist {
                path: self.path.clone(),
                source,
            })?;
        }
        let serialized = serde_json::to_vec_pretty(&self.records).map_err(StoreError::Serialize)?;
        fs::write(&self.path, serialized).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            "persisted {} reviews to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Stored record for `app_id` with the derived formatted dates attached.
    pub fn get(&self, app_id: &str) -> Option<Value> {
        let mut fields = self.records.get(app_id)?.as_object()?.clone();
        let created = fields.get("created_at").and_then(Value::as_i64);
        let finished = fields.get("finished_at").and_then(Value::as_i64);
        if let Some(date) = created.and_then(|ts| self.clock.format_date(ts)) {
            fields.insert(CREATED_AT_FORMATTED.to_string(), Value::String(date));
        }
        if let Some(date) = finished.and_then(|ts| self.clock.format_date(ts)) {
            fields.insert(FINISHED_AT_FORMATTED.to_string(), Value::String(date));
        }
        Some(Value::Object(fields))
    }

    /// Whether a record exists for `app_id`.
    pub fn contains(&self, app_id: &str) -> bool {
        self.records.contains_key(app_id)
    }

    /// Replace the record for `app_id` with the normalized payload and persist.
    ///
    /// `payload` is the UTF-8 text of a JSON object. Only `created_at` carries
    /// over from a previous record; every other field comes from the payload.
    /// Returns the record as written.
    pub fn put(&mut self, app_id: &str, payload: &[u8]) -> Result<Value, StoreError> {
        let mut record = self.decode_payload(payload)?;
        let supplied_finish = record.take_formatted_dates();

        let previous = self.records.get(app_id);
        record.created_at = Some(
            previous
                .and_then(|value| value.get("created_at"))
                .and_then(Value::as_i64)
                .unwrap_or_else(|| self.clock.now()),
        );

        record.finished_at = match record.status_kind() {
            ReviewStatus::Finished => {
                let parsed = supplied_finish
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(|date| self.clock.midnight(date));
                if parsed.is_none() && supplied_finish.is_some() {
                    debug!("ignoring unparseable finish date for {app_id}: {supplied_finish:?}");
                }
                Some(parsed.unwrap_or_else(|| self.clock.now()))
            }
            _ => None,
        };

        let value = serde_json::to_value(&record).map_err(StoreError::InvalidRecord)?;
        let replaced = self.records.insert(app_id.to_string(), value.clone());
        if let Err(err) = self.save() {
            match replaced {
                Some(old) => {
                    self.records.insert(app_id.to_string(), old);
                }
                None => {
                    self.records.shift_remove(app_id);
                }
            }
            return Err(err);
        }

        info!("saved review for {app_id}");
        Ok(value)
    }

    /// Remove the record for `app_id`, persisting only when something was removed.
    pub fn delete(&mut self, app_id: &str) -> Result<bool, StoreError> {
        let Some(index) = self.records.keys().position(|key| key == app_id) else {
            debug!("no review to delete for {app_id}");
            return Ok(false);
        };
        let removed = self.records.shift_remove(app_id);
        if let Err(err) = self.save() {
            if let Some(old) = removed {
                self.records.insert(app_id.to_string(), old);
                self.restore_position(app_id, index);
            }
            return Err(err);
        }
        info!("deleted review for {app_id}");
        Ok(true)
    }

    /// The full map exactly as persisted.
    pub fn list_all(&self) -> Value {
        Value::Object(self.records.clone())
    }

    /// Typed view of every record in insertion order.
    ///
    /// A known field with the wrong type is reported as unset; the rest of
    /// the record is kept.
    pub fn records(&self) -> Vec<(String, ReviewRecord)> {
        self.records
            .iter()
            .map(|(app_id, value)| {
                if !value.is_object() {
                    warn!("review {app_id} is not a JSON object");
                }
                let (record, skipped) = ReviewRecord::decode_lenient(value);
                if !skipped.is_empty() {
                    warn!("review {app_id} has malformed fields: {}", skipped.join(", "));
                }
                (app_id.clone(), record)
            })
            .collect()
    }

    fn decode_payload(&self, payload: &[u8]) -> Result<ReviewRecord, StoreError> {
        let text = std::str::from_utf8(payload)?;
        let value: Value = serde_json::from_str(text).map_err(StoreError::InvalidPayload)?;
        let Value::Object(mut fields) = value else {
            return Err(StoreError::NotAnObject);
        };
        // Timestamps are always assigned here.
        fields.remove("created_at");
        fields.remove("finished_at");
        let record: ReviewRecord =
            serde_json::from_value(Value::Object(fields)).map_err(StoreError::InvalidRecord)?;
        if let Some(review) = record.review.as_deref() {
            let len = review.chars().count();
            if len > self.max_review_length {
                return Err(StoreError::ReviewTooLong {
                    len,
                    max: self.max_review_length,
                });
            }
        }
        Ok(record)
    }

    fn restore_position(&mut self, app_id: &str, index: usize) {
        let entries: Vec<(String, Value)> = std::mem::take(&mut self.records).into_iter().collect();
        let (mut moved, rest): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|(key, _)| key == app_id);
        let mut ordered = rest;
        if let Some(entry) = moved.pop() {
            ordered.insert(index.min(ordered.len()), entry);
        }
        self.records = ordered.into_iter().collect();
    }
}

fn parse_document(bytes: &[u8]) -> anyhow::Result<Map<String, Value>> {
    let text = std::str::from_utf8(bytes).context("store is not valid UTF-8")?;
    let value: Value = serde_json::from_str(text).context("store is not valid JSON")?;
    match value {
        Value::Object(records) => Ok(records),
        other => bail!("expected a JSON object, found {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
