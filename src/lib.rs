//! Rank-based engineering college lookup over historical admission cutoffs.
//!
//! Admins bulk-load cutoff spreadsheets ([`importer`], [`scraper`]) into a
//! [`dataset::DatasetStore`]; students search it by rank with
//! [`analyzer::RankMatcher`].

pub mod analyzer;
pub mod auth;
pub mod categories;
pub mod dataset;
pub mod error;
pub mod importer;
pub mod logging;
pub mod models;
pub mod report;
pub mod scraper;
pub mod template;

pub use analyzer::{RankMatcher, SearchQuery, SearchRequest, SearchResponse, ToleranceWindow};
pub use dataset::{Dataset, DatasetStore};
pub use error::{ErrorKind, RankError};
