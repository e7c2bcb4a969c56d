//! Ratings report: filtered, grouped and sorted view over the review store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    clock::utc_year,
    models::{Rating, ReviewRecord, ReviewStatus},
};

/// Year filter value meaning "every year".
pub const ALL_YEARS: &str = "all";

/// One game row of the ratings report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Store key of the game.
    pub app_id: String,
    /// Title, `Game {app_id}` when unknown.
    pub display_name: String,
    /// Host cache key of the game icon.
    pub icon_hash: Option<String>,
    /// Score, 1 when unset.
    pub rating: Rating,
    /// Raw status, `UNKNOWN` when unset.
    pub status: String,
    /// Review text, empty when unset.
    pub review: String,
    /// Unix seconds of the first save.
    pub created_at: Option<i64>,
    /// Unix seconds of completion.
    pub finished_at: Option<i64>,
    /// UTC year of completion, else of creation.
    pub year: Option<i32>,
}

impl RatingEntry {
    fn from_record(app_id: &str, record: &ReviewRecord) -> Self {
        let year = record
            .finished_at
            .and_then(utc_year)
            .or_else(|| record.created_at.and_then(utc_year));
        Self {
            app_id: app_id.to_string(),
            display_name: record
                .display_name
                .clone()
                .unwrap_or_else(|| format!("Game {app_id}")),
            icon_hash: record.icon_hash.clone(),
            rating: record.rating.unwrap_or(Rating::FALLBACK),
            status: record
                .status
                .clone()
                .unwrap_or_else(|| ReviewStatus::Unknown.as_str().to_string()),
            review: record.review.clone().unwrap_or_default(),
            created_at: record.created_at,
            finished_at: record.finished_at,
            year,
        }
    }

    fn is_completed(&self) -> bool {
        matches!(
            ReviewStatus::classify(&self.status),
            ReviewStatus::Finished | ReviewStatus::Skipped
        )
    }
}

/// Result of [`build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingsReport {
    /// Every record, unfiltered.
    pub all_ratings: Vec<RatingEntry>,
    /// Records left after the status and year filters.
    pub ratings: Vec<RatingEntry>,
    /// Filtered records per status, best rated first.
    pub grouped_by_status: BTreeMap<String, Vec<RatingEntry>>,
    /// Display order hint for the status groups.
    pub status_order: Vec<String>,
    /// Distinct years across all records, ascending.
    pub years: Vec<i32>,
    /// Length of `ratings`.
    pub total_games: usize,
}

/// Build the ratings report from a snapshot of the store.
///
/// Without `show_all_games` only finished and skipped games are kept. A
/// `selected_year` other than `"all"` keeps games from that year; a value that
/// is not a year is logged and ignored.
pub fn build<'a, I>(
    records: I,
    show_all_games: bool,
    selected_year: Option<&str>,
) -> RatingsReport
where
    I: IntoIterator<Item = (&'a str, &'a ReviewRecord)>,
{
    let all_ratings: Vec<RatingEntry> = records
        .into_iter()
        .map(|(app_id, record)| RatingEntry::from_record(app_id, record))
        .collect();

    let year_filter = selected_year
        .map(str::trim)
        .filter(|value| *value != ALL_YEARS)
        .and_then(|value| match value.parse::<i32>() {
            Ok(year) => Some(year),
            Err(err) => {
                warn!("ignoring invalid year filter {value:?}: {err}");
                None
            }
        });

    let ratings: Vec<RatingEntry> = all_ratings
        .iter()
        .filter(|entry| show_all_games || entry.is_completed())
        .filter(|entry| year_filter.map_or(true, |year| entry.year == Some(year)))
        .cloned()
        .collect();

    let mut grouped_by_status: BTreeMap<String, Vec<RatingEntry>> = BTreeMap::new();
    for entry in &ratings {
        grouped_by_status
            .entry(entry.status.clone())
            .or_default()
            .push(entry.clone());
    }
    for group in grouped_by_status.values_mut() {
        group.sort_by(|a, b| b.rating.0.total_cmp(&a.rating.0));
    }

    let years: BTreeSet<i32> = all_ratings.iter().filter_map(|entry| entry.year).collect();

    RatingsReport {
        total_games: ratings.len(),
        status_order: ReviewStatus::ORDER
            .iter()
            .map(|status| status.as_str().to_string())
            .collect(),
        years: years.into_iter().collect(),
        all_ratings,
        ratings,
        grouped_by_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2023-06-15T12:00:00Z
    const MID_2023: i64 = 1_686_830_400;
    // 2021-03-01T00:00:00Z
    const EARLY_2021: i64 = 1_614_556_800;

    fn record(status: Option<&str>, rating: Option<f64>) -> ReviewRecord {
        ReviewRecord {
            status: status.map(str::to_string),
            rating: rating.map(Rating),
            ..ReviewRecord::default()
        }
    }

    fn snapshot() -> Vec<(String, ReviewRecord)> {
        vec![
            (
                "10".to_string(),
                ReviewRecord {
                    finished_at: Some(MID_2023),
                    ..record(Some("FINISHED"), Some(9.0))
                },
            ),
            ("20".to_string(), record(Some("IN_PROGRESS"), Some(7.0))),
        ]
    }

    fn run(
        records: &[(String, ReviewRecord)],
        show_all_games: bool,
        year: Option<&str>,
    ) -> RatingsReport {
        build(
            records.iter().map(|(id, record)| (id.as_str(), record)),
            show_all_games,
            year,
        )
    }

    fn ids(entries: &[RatingEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.app_id.as_str()).collect()
    }

    #[test]
    fn hides_unfinished_games_by_default() {
        let records = snapshot();
        let report = run(&records, false, None);
        assert_eq!(ids(&report.ratings), ["10"]);
        assert_eq!(report.grouped_by_status.len(), 1);
        assert_eq!(ids(&report.grouped_by_status["FINISHED"]), ["10"]);
        assert_eq!(report.years, [2023]);
        assert_eq!(report.total_games, 1);
        assert_eq!(report.all_ratings.len(), 2);

        let report = run(&records, true, None);
        assert_eq!(report.total_games, 2);
        assert_eq!(ids(&report.grouped_by_status["IN_PROGRESS"]), ["20"]);
        assert_eq!(report.status_order, ["FINISHED", "SKIPPED", "IN_PROGRESS"]);
    }

    #[test]
    fn fills_defaults_for_sparse_records() {
        let records = vec![("77".to_string(), ReviewRecord::default())];
        let report = run(&records, true, None);
        let entry = &report.all_ratings[0];
        assert_eq!(entry.display_name, "Game 77");
        assert_eq!(entry.rating, Rating(1.0));
        assert_eq!(entry.status, "UNKNOWN");
        assert_eq!(entry.review, "");
        assert_eq!(entry.year, None);
        assert!(report.years.is_empty());
    }

    #[test]
    fn year_prefers_finish_then_creation() {
        let records = vec![
            (
                "1".to_string(),
                ReviewRecord {
                    created_at: Some(EARLY_2021),
                    finished_at: Some(MID_2023),
                    ..record(Some("FINISHED"), Some(3.0))
                },
            ),
            (
                "2".to_string(),
                ReviewRecord {
                    created_at: Some(EARLY_2021),
                    finished_at: Some(0),
                    ..record(Some("SKIPPED"), Some(2.0))
                },
            ),
        ];
        let report = run(&records, false, Some("2021"));
        assert_eq!(ids(&report.ratings), ["2"]);
        assert_eq!(report.years, [2021, 2023]);

        let report = run(&records, false, Some(ALL_YEARS));
        assert_eq!(report.total_games, 2);
    }

    #[test]
    fn invalid_year_filter_is_ignored() {
        let records = snapshot();
        let report = run(&records, true, Some("twenty"));
        assert_eq!(report.total_games, 2);
    }

    #[test]
    fn groups_sort_by_rating_keeping_ties_in_order() {
        let records = vec![
            ("a".to_string(), record(Some("FINISHED"), Some(3.0))),
            ("b".to_string(), record(Some("FINISHED"), Some(4.5))),
            ("c".to_string(), record(Some("FINISHED"), Some(3.0))),
            ("d".to_string(), record(Some("DROPPED"), Some(5.0))),
            ("e".to_string(), record(Some("FINISHED"), None)),
        ];
        let report = run(&records, true, None);
        assert_eq!(
            ids(&report.grouped_by_status["FINISHED"]),
            ["b", "a", "c", "e"]
        );
        assert_eq!(ids(&report.grouped_by_status["DROPPED"]), ["d"]);
        assert_eq!(ids(&report.ratings), ["a", "b", "c", "d", "e"]);

        let hidden = run(&records, false, None);
        assert!(!hidden.grouped_by_status.contains_key("DROPPED"));
        assert!(ids(&hidden.all_ratings).contains(&"d"));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let records = snapshot();
        let first = run(&records, false, Some("2023"));
        let second = run(&records, false, Some("2023"));
        assert_eq!(first, second);
        assert_eq!(first.total_games, first.ratings.len());
        assert!(first
            .ratings
            .iter()
            .all(|entry| first.all_ratings.contains(entry)));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let records = snapshot();
        let value = serde_json::to_value(run(&records, false, None)).expect("report");
        assert_eq!(value["total_games"], json!(1));
        assert_eq!(value["ratings"][0]["rating"], json!(9));
        assert_eq!(value["ratings"][0]["year"], json!(2023));
        assert_eq!(value["grouped_by_status"]["FINISHED"][0]["app_id"], json!("10"));
    }
}
