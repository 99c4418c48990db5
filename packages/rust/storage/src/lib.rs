//! libSQL storage layer for the course store.
//!
//! The [`Storage`] struct wraps a libSQL database holding courses,
//! prerequisite edges, majors, requirement edges, and scrape run history.
//!
//! **Access rules:**
//! - Ingestion (`coursemap scrape`): read-write, sole writer, via [`Storage::open`]
//! - API server (`coursemap serve`): read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use coursemap_shared::{CourseMapError, CourseRecord, Major, Requirement, Result, StoredCourse};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Column list shared by every course read, in [`row_to_course`] order.
const COURSE_COLUMNS: &str =
    "c.id, c.course_code, c.course_number, c.title, c.credits, c.description, c.level, c.difficulty";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CourseMapError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing, already-populated database at `path` in read-only mode.
    ///
    /// Fails when the file is missing or has never been migrated, so a server
    /// refuses to start instead of serving an empty store.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CourseMapError::Storage(format!(
                "database file '{}' not found; run `coursemap scrape all` first",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: true,
        };

        if storage.get_schema_version().await == 0 {
            return Err(CourseMapError::Storage(format!(
                "database '{}' is not initialized",
                path.display()
            )));
        }
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CourseMapError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CourseMapError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Course writes
    // -----------------------------------------------------------------------

    /// Upsert a course by `course_code` and replace its prerequisite edge set.
    ///
    /// The surrogate id of an existing course is kept. Returns the course id.
    pub async fn upsert_course(&self, course: &CourseRecord, content_hash: &str) -> Result<i64> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO courses
                   (course_code, course_number, title, credits, description, level, difficulty,
                    raw_text, content_hash, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(course_code) DO UPDATE SET
                   course_number = excluded.course_number,
                   title = excluded.title,
                   credits = excluded.credits,
                   description = excluded.description,
                   level = excluded.level,
                   difficulty = excluded.difficulty,
                   raw_text = excluded.raw_text,
                   content_hash = excluded.content_hash,
                   updated_at = excluded.updated_at",
                params![
                    course.course_code.as_str(),
                    course.course_number.as_str(),
                    course.title.as_str(),
                    course.credits.as_deref(),
                    course.description.as_str(),
                    i64::from(course.level),
                    course.difficulty.as_str(),
                    course.raw_text.as_str(),
                    content_hash,
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;

        let course_id = self
            .course_id(&course.course_code)
            .await?
            .ok_or_else(|| {
                CourseMapError::Storage(format!(
                    "course {} missing right after upsert",
                    course.course_code
                ))
            })?;

        self.conn
            .execute(
                "DELETE FROM prerequisites WHERE course_id = ?1",
                params![course_id],
            )
            .await
            .map_err(db_err)?;

        for code in &course.prerequisites {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO prerequisites (course_id, prerequisite_code)
                     VALUES (?1, ?2)",
                    params![course_id, code.as_str()],
                )
                .await
                .map_err(db_err)?;
        }

        Ok(course_id)
    }

    // -----------------------------------------------------------------------
    // Course reads
    // -----------------------------------------------------------------------

    /// Surrogate id for an exact `course_code`.
    async fn course_id(&self, course_code: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM courses WHERE course_code = ?1",
                params![course_code],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row.get::<i64>(0).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    /// Stored content hash for a course, if the course exists.
    pub async fn course_content_hash(&self, course_code: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content_hash FROM courses WHERE course_code = ?1",
                params![course_code],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }

    /// Get a course by exact `course_code` (callers normalize case).
    pub async fn get_course(&self, course_code: &str) -> Result<Option<StoredCourse>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.course_code = ?1"),
                params![course_code],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_course(&row)?)),
            None => Ok(None),
        }
    }

    /// List all courses ordered by `course_number` as text, then `course_code`.
    pub async fn list_courses(&self) -> Result<Vec<StoredCourse>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COURSE_COLUMNS} FROM courses c
                     ORDER BY c.course_number, c.course_code"
                ),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_course(&row)?);
        }
        Ok(results)
    }

    /// Number of stored courses.
    pub async fn count_courses(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM courses", params![])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// Prerequisite codes of one course, in insertion order.
    pub async fn prerequisites_for(&self, course_id: i64) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT prerequisite_code FROM prerequisites WHERE course_id = ?1 ORDER BY id",
                params![course_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(results)
    }

    /// Every prerequisite edge, grouped by course id, each list in insertion order.
    pub async fn all_prerequisites(&self) -> Result<HashMap<i64, Vec<String>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT course_id, prerequisite_code FROM prerequisites ORDER BY course_id, id",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results: HashMap<i64, Vec<String>> = HashMap::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let course_id: i64 = row.get(0).map_err(db_err)?;
            let code: String = row.get(1).map_err(db_err)?;
            results.entry(course_id).or_default().push(code);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Major operations
    // -----------------------------------------------------------------------

    /// Insert a major if absent and return its id.
    ///
    /// Matching uses `IS` so a NULL concentration is found again on re-runs.
    pub async fn upsert_major(&self, name: &str, concentration: Option<&str>) -> Result<i64> {
        self.check_writable()?;
        if let Some(id) = self.find_major(name, concentration).await? {
            return Ok(id);
        }

        self.conn
            .execute(
                "INSERT INTO majors (name, concentration) VALUES (?1, ?2)",
                params![name, concentration],
            )
            .await
            .map_err(db_err)?;

        self.find_major(name, concentration).await?.ok_or_else(|| {
            CourseMapError::Storage(format!("major '{name}' missing right after insert"))
        })
    }

    async fn find_major(&self, name: &str, concentration: Option<&str>) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM majors WHERE name = ?1 AND concentration IS ?2",
                params![name, concentration],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row.get::<i64>(0).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    /// Get a major by id.
    pub async fn get_major(&self, id: i64) -> Result<Option<Major>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, concentration FROM majors WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_major(&row)?)),
            None => Ok(None),
        }
    }

    /// List all majors ordered by name, then concentration.
    pub async fn list_majors(&self) -> Result<Vec<Major>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, concentration FROM majors ORDER BY name, concentration",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_major(&row)?);
        }
        Ok(results)
    }

    /// Insert a requirement edge unless `(major_id, course_code)` already exists.
    /// Returns `true` when a row was inserted.
    pub async fn insert_requirement(&self, major_id: i64, req: &Requirement) -> Result<bool> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO major_requirements (major_id, course_code, requirement_type)
                 VALUES (?1, ?2, ?3)",
                params![
                    major_id,
                    req.course_code.as_str(),
                    req.requirement_type.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Required courses of a major joined with their course rows, ordered by
    /// bucket then course code. Edges with no matching course are dropped by
    /// the inner join.
    pub async fn list_requirement_courses(
        &self,
        major_id: i64,
    ) -> Result<Vec<(StoredCourse, String)>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COURSE_COLUMNS}, mr.requirement_type
                     FROM major_requirements mr
                     JOIN courses c ON c.course_code = mr.course_code
                     WHERE mr.major_id = ?1
                     ORDER BY mr.requirement_type, mr.course_code"
                ),
                params![major_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let course = row_to_course(&row)?;
            let requirement_type: String = row.get(8).map_err(db_err)?;
            results.push((course, requirement_type));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Scrape run history
    // -----------------------------------------------------------------------

    /// Record the start of an ingestion run. Returns the generated run ID.
    pub async fn insert_scrape_run(&self, kind: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO scrape_runs (id, kind, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), kind, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    /// Mark an ingestion run finished with its stats.
    pub async fn finish_scrape_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE scrape_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Stats JSON of a finished run, `None` while it is still open or unknown.
    pub async fn scrape_run_stats(&self, run_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM scrape_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }
}

fn db_err(e: libsql::Error) -> CourseMapError {
    CourseMapError::Storage(e.to_string())
}

/// Convert a database row selected with [`COURSE_COLUMNS`] to a [`StoredCourse`].
fn row_to_course(row: &libsql::Row) -> Result<StoredCourse> {
    Ok(StoredCourse {
        id: row.get::<i64>(0).map_err(db_err)?,
        course_code: row.get::<String>(1).map_err(db_err)?,
        course_number: row.get::<String>(2).map_err(db_err)?,
        title: row.get::<String>(3).map_err(db_err)?,
        credits: row.get::<String>(4).ok(),
        description: row.get::<String>(5).ok(),
        level: row.get::<i64>(6).ok().map_or(0, |v| v as u32),
        difficulty: row.get::<String>(7).ok(),
    })
}

fn row_to_major(row: &libsql::Row) -> Result<Major> {
    Ok(Major {
        id: row.get::<i64>(0).map_err(db_err)?,
        name: row.get::<String>(1).map_err(db_err)?,
        concentration: row.get::<String>(2).ok(),
    })
}
