//! SQL migration definitions for the course store.
//!
//! Migrations are applied in order on read-write open. Each migration has a
//! version number and a batch of SQL statements that records its own version.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: courses, prerequisites",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Catalog courses, keyed by course_code
CREATE TABLE IF NOT EXISTS courses (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    course_code   TEXT UNIQUE NOT NULL,
    course_number TEXT NOT NULL,
    title         TEXT NOT NULL,
    credits       TEXT,
    description   TEXT,
    level         INTEGER,
    difficulty    TEXT,
    raw_text      TEXT,
    content_hash  TEXT,
    updated_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_courses_number ON courses(course_number);

-- Prerequisite edges; prerequisite_code is a bare code, not a foreign key
CREATE TABLE IF NOT EXISTS prerequisites (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id         INTEGER NOT NULL REFERENCES courses(id),
    prerequisite_code TEXT NOT NULL,
    UNIQUE(course_id, prerequisite_code)
);

CREATE INDEX IF NOT EXISTS idx_prerequisites_course ON prerequisites(course_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Majors and requirement edges",
            sql: r#"
CREATE TABLE IF NOT EXISTS majors (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    concentration TEXT,
    UNIQUE(name, concentration)
);

CREATE TABLE IF NOT EXISTS major_requirements (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    major_id         INTEGER NOT NULL REFERENCES majors(id),
    course_code      TEXT NOT NULL,
    requirement_type TEXT NOT NULL,
    UNIQUE(major_id, course_code)
);

CREATE INDEX IF NOT EXISTS idx_major_requirements_major ON major_requirements(major_id);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Scrape run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS scrape_runs (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_ascend_and_self_record() {
        let migrations = all_migrations();
        for (i, m) in migrations.iter().enumerate() {
            assert_eq!(m.version as usize, i + 1);
            assert!(
                m.sql
                    .contains(&format!("INSERT INTO schema_migrations (version) VALUES ({})", m.version)),
                "migration v{} does not record itself",
                m.version
            );
        }
    }
}
