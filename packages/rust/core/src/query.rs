//! Read-only queries over the course store.
//!
//! Every operation takes the store handle explicitly and never writes.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use coursemap_shared::{CourseMapError, Difficulty, Major, Result, StoredCourse};
use coursemap_storage::Storage;

use crate::difficulty::stored_or_level;
use crate::normalize::{parse_credits, prereq_chain, slug_id};

/// A course as returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    /// Slug form of the code, e.g. `cs141`.
    pub id: String,
    pub code: String,
    pub title: String,
    pub credits: u32,
    pub level: u32,
    pub difficulty: Difficulty,
    pub description: Option<String>,
    pub prerequisites: Vec<String>,
    pub prereq_chain: String,
    /// Set only on items of [`MajorRequirements::required_courses`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_type: Option<String>,
}

impl CourseDetail {
    fn new(course: StoredCourse, prerequisites: Vec<String>) -> Self {
        Self {
            id: slug_id(&course.course_code),
            credits: parse_credits(course.credits.as_deref()),
            difficulty: stored_or_level(course.difficulty.as_deref(), course.level),
            prereq_chain: prereq_chain(&prerequisites),
            code: course.course_code,
            title: course.title,
            level: course.level,
            description: course.description,
            prerequisites,
            requirement_type: None,
        }
    }
}

/// A major together with the courses it requires.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorRequirements {
    pub major: Major,
    pub required_courses: Vec<CourseDetail>,
}

/// All majors ordered by name, then concentration.
pub async fn list_majors(storage: &Storage) -> Result<Vec<Major>> {
    storage.list_majors().await
}

/// Required courses of a major, ordered by bucket then course code.
///
/// Requirement edges naming a course that is not in the store are left out.
#[instrument(skip(storage))]
pub async fn get_major_requirements(storage: &Storage, major_id: i64) -> Result<MajorRequirements> {
    let major = storage
        .get_major(major_id)
        .await?
        .ok_or_else(|| CourseMapError::not_found("Major"))?;

    let rows = storage.list_requirement_courses(major_id).await?;
    let mut required_courses = Vec::with_capacity(rows.len());
    for (course, requirement_type) in rows {
        let prerequisites = storage.prerequisites_for(course.id).await?;
        let mut detail = CourseDetail::new(course, prerequisites);
        detail.requirement_type = Some(requirement_type);
        required_courses.push(detail);
    }

    debug!(count = required_courses.len(), "resolved required courses");
    Ok(MajorRequirements {
        major,
        required_courses,
    })
}

/// Every course, ordered by course number compared as text.
pub async fn list_courses(storage: &Storage) -> Result<Vec<CourseDetail>> {
    let courses = storage.list_courses().await?;
    let mut prereqs = storage.all_prerequisites().await?;
    Ok(attach_prerequisites(courses, &mut prereqs))
}

/// One course by code; the code is upper-cased before lookup.
#[instrument(skip(storage))]
pub async fn get_course(storage: &Storage, code: &str) -> Result<CourseDetail> {
    let course = storage
        .get_course(&code.to_uppercase())
        .await?
        .ok_or_else(|| CourseMapError::not_found("Course"))?;
    let prerequisites = storage.prerequisites_for(course.id).await?;
    Ok(CourseDetail::new(course, prerequisites))
}

/// Courses not in `completed` whose prerequisites are all in `completed`,
/// in [`list_courses`] order.
#[instrument(skip_all, fields(completed = completed.len()))]
pub async fn get_eligible_courses(
    storage: &Storage,
    completed: &HashSet<String>,
) -> Result<Vec<CourseDetail>> {
    let eligible: Vec<CourseDetail> = list_courses(storage)
        .await?
        .into_iter()
        .filter(|c| is_eligible(&c.code, &c.prerequisites, completed))
        .collect();

    debug!(count = eligible.len(), "eligible courses");
    Ok(eligible)
}

/// Eligibility rule: not yet taken, and every prerequisite taken.
pub fn is_eligible(code: &str, prerequisites: &[String], completed: &HashSet<String>) -> bool {
    !completed.contains(code) && prerequisites.iter().all(|p| completed.contains(p))
}

fn attach_prerequisites(
    courses: Vec<StoredCourse>,
    prereqs: &mut HashMap<i64, Vec<String>>,
) -> Vec<CourseDetail> {
    courses
        .into_iter()
        .map(|course| {
            let list = prereqs.remove(&course.id).unwrap_or_default();
            CourseDetail::new(course, list)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursemap_shared::{CourseRecord, Requirement};
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cm_query_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn record(code: &str, level: u32, credits: &str, prereqs: &[&str]) -> CourseRecord {
        CourseRecord {
            course_code: code.into(),
            course_number: code.split_whitespace().last().unwrap().into(),
            title: format!("{code} title"),
            credits: Some(credits.into()),
            description: format!("{code} description"),
            level,
            difficulty: Difficulty::Easy,
            raw_text: code.into(),
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// CS 141 (no prereqs) and CS 251 (requires CS 141).
    async fn two_course_store() -> Storage {
        let storage = test_storage().await;
        storage
            .upsert_course(&record("CS 141", 100, "3 hours", &[]), "a")
            .await
            .unwrap();
        storage
            .upsert_course(&record("CS 251", 200, "4 hours", &["CS 141"]), "b")
            .await
            .unwrap();
        storage
    }

    fn set(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    fn ids(courses: &[CourseDetail]) -> Vec<&str> {
        courses.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn eligible_scenario() {
        let storage = two_course_store().await;

        let none_done = get_eligible_courses(&storage, &set(&[])).await.unwrap();
        assert_eq!(ids(&none_done), vec!["cs141"]);

        let after_141 = get_eligible_courses(&storage, &set(&["CS 141"])).await.unwrap();
        assert_eq!(ids(&after_141), vec!["cs251"]);

        let all_done = get_eligible_courses(&storage, &set(&["CS 141", "CS 251"]))
            .await
            .unwrap();
        assert!(all_done.is_empty());
    }

    #[tokio::test]
    async fn eligible_never_returns_completed() {
        let storage = two_course_store().await;
        storage
            .upsert_course(&record("CS 301", 300, "3 hours", &["CS 251", "CS 141"]), "c")
            .await
            .unwrap();

        for completed in [
            set(&[]),
            set(&["CS 141"]),
            set(&["CS 251"]),
            set(&["CS 141", "CS 251"]),
            set(&["CS 301"]),
        ] {
            let eligible = get_eligible_courses(&storage, &completed).await.unwrap();
            assert!(eligible.iter().all(|c| !completed.contains(&c.code)));
        }

        let eligible = get_eligible_courses(&storage, &set(&["CS 141", "CS 251"]))
            .await
            .unwrap();
        assert_eq!(ids(&eligible), vec!["cs301"]);
    }

    #[tokio::test]
    async fn eligible_with_prereq_outside_store() {
        let storage = test_storage().await;
        storage
            .upsert_course(&record("CS 141", 100, "3 hours", &["CS 111"]), "a")
            .await
            .unwrap();
        assert!(get_eligible_courses(&storage, &set(&[])).await.unwrap().is_empty());
        let eligible = get_eligible_courses(&storage, &set(&["CS 111"])).await.unwrap();
        assert_eq!(ids(&eligible), vec!["cs141"]);
    }

    #[tokio::test]
    async fn course_detail_shape() {
        let storage = two_course_store().await;

        let cs251 = get_course(&storage, "CS 251").await.unwrap();
        assert_eq!(cs251.id, "cs251");
        assert_eq!(cs251.credits, 4);
        assert_eq!(cs251.level, 200);
        assert_eq!(cs251.prerequisites, vec!["CS 141"]);
        assert_eq!(cs251.prereq_chain, "CS 141");
        assert!(cs251.requirement_type.is_none());

        let cs141 = get_course(&storage, "CS 141").await.unwrap();
        assert_eq!(cs141.prereq_chain, "None");
        assert_eq!(cs141.credits, 3);

        let json = serde_json::to_value(&cs251).unwrap();
        assert_eq!(json["prereqChain"], "CS 141");
        assert_eq!(json["difficulty"], "Easy");
        assert!(json.get("requirementType").is_none());
    }

    #[tokio::test]
    async fn get_course_is_case_insensitive() {
        let storage = two_course_store().await;
        let lower = get_course(&storage, "cs 141").await.unwrap();
        let upper = get_course(&storage, "CS 141").await.unwrap();
        assert_eq!(lower, upper);
    }

    #[tokio::test]
    async fn get_course_unknown_is_not_found() {
        let storage = two_course_store().await;
        let err = get_course(&storage, "CS 999").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Course not found");
    }

    #[tokio::test]
    async fn list_courses_orders_numbers_as_text() {
        let storage = two_course_store().await;
        storage
            .upsert_course(&record("CS 1000", 100, "1 hour", &[]), "x")
            .await
            .unwrap();
        let courses = list_courses(&storage).await.unwrap();
        assert_eq!(ids(&courses), vec!["cs1000", "cs141", "cs251"]);
        assert_eq!(courses[2].prerequisites, vec!["CS 141"]);
    }

    #[tokio::test]
    async fn major_requirements_join_and_order() {
        let storage = two_course_store().await;
        let major_id = storage
            .upsert_major("Computer Science", Some("Software Engineering"))
            .await
            .unwrap();
        for (code, bucket) in [
            ("CS 251", "Core CS"),
            ("MATH 180", "Math"),
            ("CS 141", "Core CS"),
        ] {
            storage
                .insert_requirement(
                    major_id,
                    &Requirement {
                        course_code: code.into(),
                        requirement_type: bucket.into(),
                    },
                )
                .await
                .unwrap();
        }

        let result = get_major_requirements(&storage, major_id).await.unwrap();
        assert_eq!(result.major.name, "Computer Science");
        // MATH 180 has no course row and is dropped.
        assert_eq!(ids(&result.required_courses), vec!["cs141", "cs251"]);
        assert_eq!(
            result.required_courses[1].requirement_type.as_deref(),
            Some("Core CS")
        );
        assert_eq!(result.required_courses[1].prereq_chain, "CS 141");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["requiredCourses"][0]["requirementType"], "Core CS");
        assert_eq!(json["major"]["concentration"], "Software Engineering");
    }

    #[tokio::test]
    async fn major_requirements_unknown_major() {
        let storage = test_storage().await;
        let err = get_major_requirements(&storage, 42).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Major not found");
    }

    #[tokio::test]
    async fn majors_sorted_by_name_then_concentration() {
        let storage = test_storage().await;
        storage.upsert_major("Mathematics", None).await.unwrap();
        storage
            .upsert_major("Computer Science", Some("Software Engineering"))
            .await
            .unwrap();
        storage
            .upsert_major("Computer Science", Some("Human-Centered Computing"))
            .await
            .unwrap();

        let majors = list_majors(&storage).await.unwrap();
        let labels: Vec<(&str, Option<&str>)> = majors
            .iter()
            .map(|m| (m.name.as_str(), m.concentration.as_deref()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Computer Science", Some("Human-Centered Computing")),
                ("Computer Science", Some("Software Engineering")),
                ("Mathematics", None),
            ]
        );
    }

    #[test]
    fn eligibility_rule() {
        let done = set(&["CS 141"]);
        assert!(is_eligible("CS 251", &["CS 141".to_string()], &done));
        assert!(!is_eligible("CS 141", &[], &done));
        assert!(is_eligible("CS 111", &[], &done));
        assert!(!is_eligible("CS 301", &["CS 251".to_string()], &done));
    }
}
