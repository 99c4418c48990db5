//! Core domain types for the course store.

use serde::{Deserialize, Serialize};

use crate::error::CourseMapError;

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Three-level difficulty rating attached to every course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Challenging,
}

impl Difficulty {
    /// Text form as stored in the `courses.difficulty` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Moderate => "Moderate",
            Self::Challenging => "Challenging",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = CourseMapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Self::Easy),
            "Moderate" => Ok(Self::Moderate),
            "Challenging" => Ok(Self::Challenging),
            other => Err(CourseMapError::parse(format!("unknown difficulty '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Course records
// ---------------------------------------------------------------------------

/// A normalized course as produced by ingestion and written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Natural key, e.g. `CS 141`.
    pub course_code: String,
    /// Number part of the code, e.g. `141`.
    pub course_number: String,
    pub title: String,
    /// Free-text credits as printed in the catalog, e.g. `3 hours`.
    pub credits: Option<String>,
    pub description: String,
    /// 100/200/300/400/500, from the first digit of the course number.
    pub level: u32,
    pub difficulty: Difficulty,
    /// Whole catalog block text, kept for provenance.
    pub raw_text: String,
    /// Prerequisite codes, de-duplicated, in catalog order.
    pub prerequisites: Vec<String>,
}

/// A course row as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCourse {
    /// Surrogate id linking to prerequisite edges.
    pub id: i64,
    pub course_code: String,
    pub course_number: String,
    pub title: String,
    pub credits: Option<String>,
    pub description: Option<String>,
    pub level: u32,
    /// Raw stored difficulty text; `None` when the column is NULL.
    pub difficulty: Option<String>,
}

// ---------------------------------------------------------------------------
// Majors
// ---------------------------------------------------------------------------

/// A major (optionally narrowed to a concentration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Major {
    pub id: i64,
    pub name: String,
    pub concentration: Option<String>,
}

/// A requirement edge: a course code required by a major, tagged with a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub course_code: String,
    /// Bucket name, e.g. `Core CS` or `Math`.
    pub requirement_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_text_roundtrip() {
        for d in [Difficulty::Easy, Difficulty::Moderate, Difficulty::Challenging] {
            let parsed: Difficulty = d.to_string().parse().expect("parse difficulty");
            assert_eq!(parsed, d);
        }
        assert!("Hard".parse::<Difficulty>().is_err());
    }

    #[test]
    fn difficulty_serializes_as_plain_string() {
        let json = serde_json::to_string(&Difficulty::Challenging).unwrap();
        assert_eq!(json, "\"Challenging\"");
    }

    #[test]
    fn major_serializes_null_concentration() {
        let major = Major {
            id: 1,
            name: "Computer Science".into(),
            concentration: None,
        };
        let value = serde_json::to_value(&major).unwrap();
        assert_eq!(value["concentration"], serde_json::Value::Null);
        assert_eq!(value["name"], "Computer Science");
    }
}
