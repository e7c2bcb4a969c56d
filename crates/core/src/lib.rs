#![warn(clippy::all, missing_docs)]

//! Core logic for the game review notes plugin.
//!
//! This crate hosts the review record model, the JSON-backed review
//! store, the ratings report, configuration handling, and the
//! host-facing backend used by the bridge binary and any other host.

pub mod backend;
pub mod clock;
pub mod config;
pub mod images;
pub mod models;
pub mod report;
pub mod store;

pub use backend::{Backend, Host, Plugin};
pub use clock::ReviewClock;
pub use config::AppConfig;
pub use models::{Rating, ReviewRecord, ReviewStatus};
pub use report::{RatingEntry, RatingsReport};
pub use store::{LoadOutcome, ReviewStore, StoreError};
