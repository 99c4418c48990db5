//! Field normalization shared by ingestion and queries.

use std::sync::LazyLock;

use regex::Regex;

/// Credit hours assumed when the catalog text has no number.
pub const DEFAULT_CREDIT_HOURS: u32 = 3;

/// Separator between codes in a prerequisite chain.
const CHAIN_SEPARATOR: &str = " → ";

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid number regex"));

/// First run of digits anywhere in the credits text, or 3.
///
/// `"3-4 hours"` → 3, `"4 hours"` → 4, `""`/`None` → 3.
pub fn parse_credits(credits: Option<&str>) -> u32 {
    credits
        .and_then(|text| FIRST_NUMBER.find(text))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_CREDIT_HOURS)
}

/// Level from the first digit of a course number: `"251"` → 200.
/// Numbers without a leading digit have level 0.
pub fn course_level(course_number: &str) -> u32 {
    course_number
        .trim()
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .map_or(0, |d| d * 100)
}

/// Lower-cased code with spaces removed: `"CS 141"` → `"cs141"`.
pub fn slug_id(course_code: &str) -> String {
    course_code.to_lowercase().replace(' ', "")
}

/// Prerequisite codes joined with " → ", or `"None"` when there are none.
pub fn prereq_chain(prerequisites: &[String]) -> String {
    if prerequisites.is_empty() {
        "None".to_string()
    } else {
        prerequisites.join(CHAIN_SEPARATOR)
    }
}
