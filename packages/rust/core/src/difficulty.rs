//! Difficulty estimation.
//!
//! Two estimators exist and are used on different paths:
//! - [`estimate_difficulty`]: multi-factor score, run once at ingestion and stored.
//! - [`level_difficulty`]: level-only fallback, used at query time when a
//!   course has no (or an unreadable) stored rating.

use coursemap_shared::Difficulty;

/// Words that push a description toward harder.
const CHALLENGING_KEYWORDS: &[&str] = &["advanced", "intensive", "rigorous", "complex", "theoretical"];

/// Words that push a description toward easier.
const EASY_KEYWORDS: &[&str] = &["introduction", "survey", "overview", "fundamentals", "basics"];

/// Score a course on level, prerequisite count, credits, and description keywords.
///
/// | factor | points |
/// |---|---|
/// | level ≥ 400 / ≥ 300 / ≥ 200 | 3 / 2 / 1 |
/// | prerequisites ≥ 3 / ≥ 1 | 2 / 1 |
/// | credit hours ≥ 4 | 1 |
/// | any challenging keyword | +1 |
/// | any easy keyword | −1 |
///
/// Score ≤ 2 is Easy, 3..=5 Moderate, ≥ 6 Challenging.
pub fn estimate_difficulty(
    level: u32,
    prerequisite_count: usize,
    credit_hours: u32,
    description: &str,
) -> Difficulty {
    let mut score: i32 = 0;

    score += match level {
        400.. => 3,
        300.. => 2,
        200.. => 1,
        _ => 0,
    };

    score += match prerequisite_count {
        3.. => 2,
        1.. => 1,
        0 => 0,
    };

    if credit_hours >= 4 {
        score += 1;
    }

    let desc = description.to_lowercase();
    if CHALLENGING_KEYWORDS.iter().any(|w| desc.contains(w)) {
        score += 1;
    }
    if EASY_KEYWORDS.iter().any(|w| desc.contains(w)) {
        score -= 1;
    }

    rating_for_score(score)
}

fn rating_for_score(score: i32) -> Difficulty {
    match score {
        ..=2 => Difficulty::Easy,
        3..=5 => Difficulty::Moderate,
        _ => Difficulty::Challenging,
    }
}

/// Level-only estimate: ≤ 200 Easy, ≤ 300 Moderate, otherwise Challenging.
pub fn level_difficulty(level: u32) -> Difficulty {
    match level {
        ..=200 => Difficulty::Easy,
        201..=300 => Difficulty::Moderate,
        _ => Difficulty::Challenging,
    }
}

/// Stored rating when present and readable, else [`level_difficulty`].
pub fn stored_or_level(stored: Option<&str>, level: u32) -> Difficulty {
    stored
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| level_difficulty(level))
}
