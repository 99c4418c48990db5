//! Catalog fetching and parsing: the input half of ingestion.
//!
//! This crate provides:
//! - [`CatalogClient`], HTTP fetches of catalog pages
//! - [`courses`], course-block parsing into [`ParsedCourse`]
//! - [`requirements`], bucketing of course codes on major requirement pages

mod client;
pub mod courses;
pub mod requirements;

use coursemap_shared::{CourseMapError, Result};
use scraper::Selector;

pub use client::CatalogClient;
pub use courses::{CourseBlockParser, ParsedCourse};
pub use requirements::parse_requirements_page;

/// Compile a CSS selector, mapping failures into [`CourseMapError::Parse`].
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CourseMapError::parse(format!("selector '{css}': {e}")))
}

/// Collapse every whitespace run (including non-breaking spaces) to one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
