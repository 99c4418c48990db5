//! Ingestion: catalog pages → normalized records → course store.
//!
//! Runs as a separate CLI invocation, never alongside the API server's
//! read-only handle writing to the same store.

use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use coursemap_catalog::{CatalogClient, ParsedCourse};
use coursemap_shared::{AppConfig, CourseMapError, CourseRecord, MajorSource, Requirement, Result};
use coursemap_storage::Storage;

use crate::difficulty::estimate_difficulty;
use crate::normalize::{course_level, parse_credits};

/// Progress callback for reporting ingestion status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each course is written or skipped.
    fn course_stored(&self, code: &str, current: usize, total: usize);
    /// Called after each major's requirements are stored.
    fn major_stored(&self, label: &str, requirements: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn course_stored(&self, _code: &str, _current: usize, _total: usize) {}
    fn major_stored(&self, _label: &str, _requirements: usize) {}
}

/// Outcome of one course ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CourseIngestStats {
    pub added: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Total course rows after the run.
    pub total: u64,
}

/// Outcome of ingesting one major.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MajorIngestStats {
    pub major_id: i64,
    pub inserted: usize,
    pub existing: usize,
}

/// Normalize a parsed course block into a store record.
///
/// Level comes from the course number, credits default to 3 hours, and the
/// multi-factor estimator assigns the stored difficulty.
pub fn build_record(parsed: &ParsedCourse) -> CourseRecord {
    let level = course_level(&parsed.course_number);
    let credit_hours = parse_credits(parsed.credits.as_deref());
    let difficulty = estimate_difficulty(
        level,
        parsed.prerequisites.len(),
        credit_hours,
        &parsed.description,
    );

    CourseRecord {
        course_code: parsed.course_code.clone(),
        course_number: parsed.course_number.clone(),
        title: parsed.title.clone(),
        credits: parsed.credits.clone(),
        description: parsed.description.clone(),
        level,
        difficulty,
        raw_text: parsed.raw_text.clone(),
        prerequisites: parsed.prerequisites.clone(),
    }
}

/// SHA-256 over the record's JSON form, hex encoded.
pub fn content_hash(record: &CourseRecord) -> Result<String> {
    let json = serde_json::to_vec(record)
        .map_err(|e| CourseMapError::parse(format!("serialize {}: {e}", record.course_code)))?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Store parsed courses, skipping any whose content hash is unchanged.
///
/// The run is recorded in `scrape_runs`; a failed run is closed with an
/// `{"error": ...}` stats object.
#[instrument(skip_all, fields(courses = parsed.len()))]
pub async fn ingest_courses(
    storage: &Storage,
    parsed: &[ParsedCourse],
    progress: &dyn ProgressReporter,
) -> Result<CourseIngestStats> {
    let run_id = storage.insert_scrape_run("courses").await?;
    let outcome = store_courses(storage, parsed, progress).await;
    let stats = close_run(storage, &run_id, outcome).await?;

    info!(
        added = stats.added,
        changed = stats.changed,
        unchanged = stats.unchanged,
        total = stats.total,
        "course ingestion complete"
    );
    Ok(stats)
}

async fn store_courses(
    storage: &Storage,
    parsed: &[ParsedCourse],
    progress: &dyn ProgressReporter,
) -> Result<CourseIngestStats> {
    let mut stats = CourseIngestStats::default();
    let total = parsed.len();

    progress.phase("Storing courses");
    for (i, course) in parsed.iter().enumerate() {
        let record = build_record(course);
        let hash = content_hash(&record)?;

        match storage.course_content_hash(&record.course_code).await? {
            Some(existing) if existing == hash => stats.unchanged += 1,
            Some(_) => {
                storage.upsert_course(&record, &hash).await?;
                stats.changed += 1;
            }
            None => {
                storage.upsert_course(&record, &hash).await?;
                stats.added += 1;
            }
        }
        progress.course_stored(&record.course_code, i + 1, total);
    }

    stats.total = storage.count_courses().await?;
    Ok(stats)
}

/// Upsert a major and insert its requirement edges. Edges already present
/// are counted as existing.
#[instrument(skip_all, fields(major = %name))]
pub async fn ingest_major(
    storage: &Storage,
    name: &str,
    concentration: Option<&str>,
    requirements: &[Requirement],
) -> Result<MajorIngestStats> {
    let major_id = storage.upsert_major(name, concentration).await?;
    let mut stats = MajorIngestStats {
        major_id,
        ..Default::default()
    };

    for req in requirements {
        if storage.insert_requirement(major_id, req).await? {
            stats.inserted += 1;
        } else {
            stats.existing += 1;
        }
    }

    info!(
        major_id,
        inserted = stats.inserted,
        existing = stats.existing,
        "major requirements stored"
    );
    Ok(stats)
}

/// Fetch the configured course page and ingest it.
pub async fn scrape_courses(
    config: &AppConfig,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<CourseIngestStats> {
    let client = CatalogClient::new(&config.catalog)?;
    let url = config.catalog.courses_url()?;

    progress.phase("Fetching course catalog");
    let started = Instant::now();
    let parsed = client.fetch_courses(&url).await?;
    if parsed.is_empty() {
        warn!(%url, "no course blocks found on catalog page");
    }
    info!(count = parsed.len(), elapsed_ms = started.elapsed().as_millis() as u64, "fetched courses");

    ingest_courses(storage, &parsed, progress).await
}

/// Fetch and ingest every configured major.
pub async fn scrape_majors(
    config: &AppConfig,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<Vec<MajorIngestStats>> {
    let client = CatalogClient::new(&config.catalog)?;
    let run_id = storage.insert_scrape_run("majors").await?;
    let outcome = store_majors(&client, &config.majors, storage, progress).await;
    close_run(storage, &run_id, outcome).await
}

async fn store_majors(
    client: &CatalogClient,
    majors: &[MajorSource],
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<Vec<MajorIngestStats>> {
    let mut all = Vec::with_capacity(majors.len());
    for major in majors {
        let label = major_label(major);
        progress.phase(&format!("Fetching requirements for {label}"));

        let requirements = client.fetch_requirements(major).await?;
        let stats = ingest_major(
            storage,
            &major.name,
            major.concentration.as_deref(),
            &requirements,
        )
        .await?;

        progress.major_stored(&label, requirements.len());
        all.push(stats);
    }
    Ok(all)
}

fn major_label(major: &MajorSource) -> String {
    match &major.concentration {
        Some(c) => format!("{} ({c})", major.name),
        None => major.name.clone(),
    }
}

/// Close a scrape run with its stats, or with the error that ended it.
/// The work's own error wins over a failure to close the run.
async fn close_run<T: Serialize>(storage: &Storage, run_id: &str, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(stats) => {
            let json = serde_json::to_string(&stats)
                .map_err(|e| CourseMapError::parse(format!("serialize run stats: {e}")))?;
            storage.finish_scrape_run(run_id, &json).await?;
            Ok(stats)
        }
        Err(err) => {
            let json = serde_json::json!({ "error": err.to_string() }).to_string();
            if let Err(close_err) = storage.finish_scrape_run(run_id, &json).await {
                warn!(run_id, error = %close_err, "could not record failed scrape run");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;
    use coursemap_catalog::CourseBlockParser;
    use coursemap_shared::{CatalogConfig, Difficulty};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COURSES_PAGE: &str = include_str!("../../../../fixtures/html/uic_cs_courses.html");
    const REQUIREMENTS_PAGE: &str = include_str!("../../../../fixtures/html/cs_se_requirements.html");

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("cm_ingest_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn fixture_courses() -> Vec<ParsedCourse> {
        CourseBlockParser::new("CS")
            .unwrap()
            .parse_page(COURSES_PAGE)
            .unwrap()
    }

    fn parsed(code: &str, credits: Option<&str>, prereqs: &[&str], description: &str) -> ParsedCourse {
        ParsedCourse {
            course_code: code.into(),
            course_number: code.split_whitespace().last().unwrap().into(),
            title: "Title".into(),
            credits: credits.map(String::from),
            description: description.into(),
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
            raw_text: code.into(),
        }
    }

    #[test]
    fn build_record_derives_level_and_difficulty() {
        let record = build_record(&parsed(
            "CS 494",
            Some("1-4 hours."),
            &["CS 251", "CS 261", "CS 301"],
            "Rigorous treatment of advanced topics.",
        ));
        assert_eq!(record.level, 400);
        // 3 (level) + 2 (prereqs) + 0 (credits) + 1 (keyword)
        assert_eq!(record.difficulty, Difficulty::Challenging);

        let intro = build_record(&parsed("CS 100", None, &[], "An introduction."));
        assert_eq!(intro.level, 100);
        assert_eq!(intro.difficulty, Difficulty::Easy);
    }

    #[test]
    fn content_hash_tracks_record_content() {
        let a = build_record(&parsed("CS 141", Some("3 hours."), &[], "Design."));
        let mut b = a.clone();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
        assert_eq!(content_hash(&a).unwrap().len(), 64);

        b.prerequisites.push("CS 111".into());
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[tokio::test]
    async fn ingest_fixture_page() {
        let storage = test_storage().await;
        let stats = ingest_courses(&storage, &fixture_courses(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(stats.added, 5);
        assert_eq!(stats.total, 5);

        let cs251 = query::get_course(&storage, "cs 251").await.unwrap();
        assert_eq!(cs251.title, "Data Structures");
        assert_eq!(cs251.credits, 4);
        assert_eq!(cs251.prerequisites, vec!["CS 211", "CS 141"]);
        assert_eq!(cs251.difficulty, Difficulty::Moderate);

        let cs401 = query::get_course(&storage, "CS 401").await.unwrap();
        assert_eq!(cs401.title, "Computer Algorithms I");

        let cs494 = query::get_course(&storage, "CS 494").await.unwrap();
        assert_eq!(cs494.difficulty, Difficulty::Challenging);
        assert_eq!(cs494.credits, 1);
    }

    #[tokio::test]
    async fn reingest_is_idempotent() {
        let storage = test_storage().await;
        let courses = fixture_courses();
        ingest_courses(&storage, &courses, &SilentProgress).await.unwrap();
        let before = query::list_courses(&storage).await.unwrap();
        let cs141_before = query::get_course(&storage, "CS 141").await.unwrap();

        let stats = ingest_courses(&storage, &courses, &SilentProgress).await.unwrap();
        assert_eq!(stats.unchanged, courses.len());
        assert_eq!(stats.added + stats.changed, 0);

        assert_eq!(query::list_courses(&storage).await.unwrap(), before);
        assert_eq!(
            query::get_course(&storage, "CS 141").await.unwrap(),
            cs141_before
        );
    }

    #[tokio::test]
    async fn changed_course_is_rewritten() {
        let storage = test_storage().await;
        let first = vec![parsed("CS 141", Some("3 hours."), &[], "Design.")];
        ingest_courses(&storage, &first, &SilentProgress).await.unwrap();

        let second = vec![
            parsed("CS 141", Some("3 hours."), &["CS 111"], "Design."),
            parsed("CS 151", Some("3 hours."), &[], "Discrete."),
        ];
        let stats = ingest_courses(&storage, &second, &SilentProgress).await.unwrap();
        assert_eq!(
            stats,
            CourseIngestStats {
                added: 1,
                changed: 1,
                unchanged: 0,
                total: 2,
            }
        );
        let cs141 = query::get_course(&storage, "CS 141").await.unwrap();
        assert_eq!(cs141.prerequisites, vec!["CS 111"]);
    }

    #[tokio::test]
    async fn ingest_major_counts_existing_edges() {
        let storage = test_storage().await;
        let reqs = vec![
            Requirement {
                course_code: "CS 141".into(),
                requirement_type: "Core CS".into(),
            },
            Requirement {
                course_code: "MATH 180".into(),
                requirement_type: "Math".into(),
            },
        ];

        let first = ingest_major(&storage, "Computer Science", None, &reqs)
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);

        let second = ingest_major(&storage, "Computer Science", None, &reqs)
            .await
            .unwrap();
        assert_eq!(second.major_id, first.major_id);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.existing, 2);
        assert_eq!(storage.list_majors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scrape_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses/cs/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(COURSES_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/majors/cs-se/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(REQUIREMENTS_PAGE))
            .mount(&server)
            .await;

        let config = AppConfig {
            catalog: CatalogConfig {
                courses_url: format!("{}/courses/cs/", server.uri()),
                ..Default::default()
            },
            majors: vec![MajorSource {
                name: "Computer Science".into(),
                concentration: Some("Software Engineering".into()),
                url: format!("{}/majors/cs-se/", server.uri()),
                concentration_bucket: "Software Concentration".into(),
                concentration_courses: vec![440, 441, 442, 443, 474, 476, 477],
            }],
            ..Default::default()
        };

        let storage = test_storage().await;
        let course_stats = scrape_courses(&config, &storage, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(course_stats.added, 5);

        let major_stats = scrape_majors(&config, &storage, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(major_stats.len(), 1);
        assert_eq!(major_stats[0].inserted, 8);

        // Only CS 141 and CS 251 of the required codes have course rows.
        let reqs = query::get_major_requirements(&storage, major_stats[0].major_id)
            .await
            .unwrap();
        let codes: Vec<&str> = reqs
            .required_courses
            .iter()
            .map(|c| c.code.as_str())
            .collect();
        assert_eq!(codes, vec!["CS 141", "CS 251"]);
    }

    #[tokio::test]
    async fn scrape_run_records_stats() {
        let storage = test_storage().await;
        let run = storage.insert_scrape_run("courses").await.unwrap();
        let stats = CourseIngestStats {
            added: 2,
            ..Default::default()
        };
        let returned = close_run(&storage, &run, Ok(stats.clone())).await.unwrap();
        assert_eq!(returned, stats);

        let json = storage.scrape_run_stats(&run).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["added"], 2);
    }

    #[tokio::test]
    async fn failed_run_is_closed_with_error() {
        let storage = test_storage().await;
        let run = storage.insert_scrape_run("majors").await.unwrap();
        let outcome: Result<Vec<MajorIngestStats>> =
            Err(CourseMapError::Network("catalog unreachable".into()));

        let err = close_run(&storage, &run, outcome).await.unwrap_err();
        assert!(matches!(err, CourseMapError::Network(_)));

        let json = storage.scrape_run_stats(&run).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["error"].as_str().unwrap().contains("catalog unreachable"));
    }

    #[tokio::test]
    async fn scrape_majors_propagates_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = AppConfig {
            majors: vec![MajorSource {
                name: "Computer Science".into(),
                concentration: None,
                url: format!("{}/majors/cs/", server.uri()),
                concentration_bucket: "Software Concentration".into(),
                concentration_courses: vec![],
            }],
            ..Default::default()
        };

        let storage = test_storage().await;
        let err = scrape_majors(&config, &storage, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(storage.list_majors().await.unwrap().is_empty());
    }
}
