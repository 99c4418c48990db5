//! Domain logic for coursemap.
//!
//! This crate provides:
//! - [`ingest`], catalog pages into the course store
//! - [`query`], the read-only query engine behind the API
//! - [`difficulty`] and [`normalize`], the derivations both sides share

pub mod difficulty;
pub mod ingest;
pub mod normalize;
pub mod query;

pub use difficulty::{estimate_difficulty, level_difficulty};
pub use ingest::{
    CourseIngestStats, MajorIngestStats, ProgressReporter, SilentProgress, ingest_courses,
    ingest_major, scrape_courses, scrape_majors,
};
pub use query::{CourseDetail, MajorRequirements};
