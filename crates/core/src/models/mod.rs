//! Shared domain models.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Derived field carrying `created_at` as `YYYY-MM-DD`; never persisted.
pub const CREATED_AT_FORMATTED: &str = "created_at_formatted";
/// Derived field carrying `finished_at` as `YYYY-MM-DD`; never persisted.
pub const FINISHED_AT_FORMATTED: &str = "finished_at_formatted";

/// Play-through state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewStatus {
    /// Played to completion.
    Finished,
    /// Abandoned or deliberately passed over.
    Skipped,
    /// Currently being played.
    InProgress,
    /// Missing or unrecognised status.
    Unknown,
}

impl ReviewStatus {
    /// Priority order used by the ratings screen.
    pub const ORDER: [ReviewStatus; 3] = [
        ReviewStatus::Finished,
        ReviewStatus::Skipped,
        ReviewStatus::InProgress,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Finished => "FINISHED",
            ReviewStatus::Skipped => "SKIPPED",
            ReviewStatus::InProgress => "IN_PROGRESS",
            ReviewStatus::Unknown => "UNKNOWN",
        }
    }

    /// Classify a raw status string; anything unrecognised is `Unknown`.
    pub fn classify(raw: &str) -> Self {
        match raw {
            "FINISHED" => ReviewStatus::Finished,
            "SKIPPED" => ReviewStatus::Skipped,
            "IN_PROGRESS" => ReviewStatus::InProgress,
            _ => ReviewStatus::Unknown,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A review score. Half steps are allowed; whole values serialize as integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating(pub f64);

impl Rating {
    /// Score assumed for records written without one.
    pub const FALLBACK: Rating = Rating(1.0);
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.fract() == 0.0 && self.0.abs() < i64::MAX as f64 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Rating)
    }
}

/// One game's review entry as persisted in the store.
///
/// The game identifier is the map key and is not repeated here. Fields the
/// backend does not interpret are kept in `extra` and written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Human readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Host cache key of the game icon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_hash: Option<String>,
    /// Score; absent on legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    /// Raw status string, see [`ReviewStatus`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Free-form review text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    /// Unix seconds of the first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Unix seconds of completion; only set while `FINISHED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    /// Fields the backend does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReviewRecord {
    /// Classified status; a missing status is `Unknown`.
    pub fn status_kind(&self) -> ReviewStatus {
        self.status
            .as_deref()
            .map(ReviewStatus::classify)
            .unwrap_or(ReviewStatus::Unknown)
    }

    /// Decode a stored record, treating each known field with the wrong type as unset.
    ///
    /// Returns the record and the names of the fields that were skipped.
    pub fn decode_lenient(value: &Value) -> (Self, Vec<String>) {
        let Some(fields) = value.as_object() else {
            return (Self::default(), Vec::new());
        };
        if let Ok(record) = serde_json::from_value(value.clone()) {
            return (record, Vec::new());
        }

        let mut kept = Map::new();
        let mut skipped = Vec::new();
        for (key, field) in fields {
            let mut single = Map::new();
            single.insert(key.clone(), field.clone());
            if serde_json::from_value::<Self>(Value::Object(single)).is_ok() {
                kept.insert(key.clone(), field.clone());
            } else {
                skipped.push(key.clone());
            }
        }
        let record = serde_json::from_value(Value::Object(kept)).unwrap_or_default();
        (record, skipped)
    }

    /// Remove the request-scoped formatted dates, returning the finished date if supplied.
    pub fn take_formatted_dates(&mut self) -> Option<Value> {
        self.extra.remove(CREATED_AT_FORMATTED);
        self.extra.remove(FINISHED_AT_FORMATTED)
    }
}

/// Canonical string form of a game identifier.
///
/// Hosts hand identifiers over as JSON numbers or strings; both collapse to the
/// decimal text used as the store key.
pub fn normalize_app_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => number
            .as_u64()
            .map(|value| value.to_string())
            .or_else(|| number.as_i64().map(|value| value.to_string())),
        _ => None,
    }
}
