//! SQLite schema DDL for every tabular artifact.
//!
//! Each command writes its own table into a fresh database file; `run_meta`
//! is present in all of them.

use rusqlite::Connection;

use crate::errors::SkeletonResult;

/// Stored in `run_meta` under `schema_version`.
pub const SCHEMA_VERSION: i32 = 1;

pub const RUN_META_STATEMENTS: &[&str] = &["CREATE TABLE IF NOT EXISTS run_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );"];

pub const CLASS_SKELETON_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS class_skeletons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repository TEXT NOT NULL,
        file_path TEXT NOT NULL,
        class_name TEXT,
        qualified_name TEXT,
        start_line INTEGER,
        end_line INTEGER,
        bases TEXT NOT NULL,
        docstring TEXT,
        methods TEXT NOT NULL,
        skeleton TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('ok', 'partial', 'failed')),
        diagnostic TEXT,
        content_hash TEXT
    );",
    "CREATE INDEX IF NOT EXISTS idx_class_skeletons_repo_file \
     ON class_skeletons(repository, file_path);",
    "CREATE INDEX IF NOT EXISTS idx_class_skeletons_status \
     ON class_skeletons(status);",
];

pub const REPO_METADATA_STATEMENTS: &[&str] = &["CREATE TABLE IF NOT EXISTS repo_metadata (
        repository TEXT PRIMARY KEY,
        splits TEXT NOT NULL,
        full_name TEXT,
        stars INTEGER,
        forks INTEGER,
        open_issues INTEGER,
        language TEXT,
        license TEXT,
        created_at TEXT,
        pushed_at TEXT,
        archived BOOLEAN,
        is_fork BOOLEAN,
        error TEXT
    );"];

pub const CODE_RATIO_STATEMENTS: &[&str] = &["CREATE TABLE IF NOT EXISTS code_ratio (
        repository TEXT PRIMARY KEY,
        files INTEGER NOT NULL,
        code_lines INTEGER NOT NULL,
        comment_lines INTEGER NOT NULL,
        blank_lines INTEGER NOT NULL,
        ratio REAL
    );"];

pub const UNDERSTAND_RUN_STATEMENTS: &[&str] = &["CREATE TABLE IF NOT EXISTS understand_runs (
        repository TEXT PRIMARY KEY,
        database_path TEXT NOT NULL,
        exit_code INTEGER,
        succeeded BOOLEAN NOT NULL,
        error TEXT
    );"];

/// Run `run_meta` DDL plus the given table statements.
pub fn init_schema(conn: &Connection, statements: &[&str]) -> SkeletonResult<()> {
    for stmt in RUN_META_STATEMENTS.iter().chain(statements) {
        conn.execute_batch(stmt)?;
    }
    conn.execute(
        "INSERT INTO run_meta(key, value) VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(Result::unwrap)
            .filter(|n| !n.starts_with("sqlite_"))
            .collect()
    }

    #[test]
    fn class_skeleton_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, CLASS_SKELETON_STATEMENTS).unwrap();
        assert_eq!(table_names(&conn), vec!["class_skeletons", "run_meta"]);
    }

    #[test]
    fn init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, CODE_RATIO_STATEMENTS).unwrap();
        init_schema(&conn, CODE_RATIO_STATEMENTS).unwrap();
        let version: String = conn
            .query_row(
                "SELECT value FROM run_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());
    }

    #[test]
    fn status_check_rejects_unknown_values() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, CLASS_SKELETON_STATEMENTS).unwrap();
        let res = conn.execute(
            "INSERT INTO class_skeletons (repository, file_path, bases, methods, skeleton, status) \
             VALUES ('a/b', 'x.py', '[]', '[]', '', 'weird')",
            [],
        );
        assert!(res.is_err());
    }
}
