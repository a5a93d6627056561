//! Single-file SQLite artifact writer.
//!
//! An artifact is created fresh for every run: an existing file at the
//! destination is replaced. All rows go in inside one transaction.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Transaction};

use crate::errors::{SkeletonError, SkeletonResult};
use crate::models::ClassSkeletonRecord;
use crate::pipeline::RunStats;
use crate::store::schema;

fn artifact_error(path: &Path, err: impl Display) -> SkeletonError {
    SkeletonError::Artifact {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

pub struct ArtifactWriter {
    path: PathBuf,
    conn: Connection,
}

impl ArtifactWriter {
    /// Create (or replace) the artifact at `path` with the given table DDL.
    pub fn create(path: &Path, statements: &[&str]) -> SkeletonResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| artifact_error(path, e))?;
        }
        if path.is_dir() {
            return Err(artifact_error(path, "destination is a directory"));
        }
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(suffix);
            match fs::remove_file(&candidate) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(artifact_error(path, e)),
            }
        }

        let conn = Connection::open(path).map_err(|e| artifact_error(path, e))?;
        schema::init_schema(&conn, statements).map_err(|e| artifact_error(path, e))?;
        tracing::debug!(path = %path.display(), "created artifact");
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_meta(&self, key: &str, value: &str) -> SkeletonResult<()> {
        self.conn
            .execute(
                "INSERT INTO run_meta(key, value) VALUES(?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
                params![key, value],
            )
            .map_err(|e| artifact_error(&self.path, e))?;
        Ok(())
    }

    /// Record run-level facts alongside the table rows.
    pub fn write_run_meta(&self, command: &str, stats: &RunStats) -> SkeletonResult<()> {
        self.set_meta("run_id", &stats.run_id)?;
        self.set_meta("command", command)?;
        self.set_meta("repositories", &stats.repositories.to_string())?;
        self.set_meta("files_seen", &stats.files_seen.to_string())?;
        self.set_meta("status_ok", &stats.ok.to_string())?;
        self.set_meta("status_partial", &stats.partial.to_string())?;
        self.set_meta("status_failed", &stats.failed.to_string())?;
        Ok(())
    }

    /// Run `f` inside a transaction, committing on success.
    pub fn in_transaction<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> SkeletonResult<T>,
    ) -> SkeletonResult<T> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| artifact_error(&self.path, e))?;
        let value = f(&tx).map_err(|e| artifact_error(&self.path, e))?;
        tx.commit().map_err(|e| artifact_error(&self.path, e))?;
        Ok(value)
    }

    /// Insert records in the given order. Returns the number of rows written.
    pub fn write_class_skeletons(&mut self, records: &[ClassSkeletonRecord]) -> SkeletonResult<usize> {
        let written = self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO class_skeletons (repository, file_path, class_name, \
                 qualified_name, start_line, end_line, bases, docstring, methods, \
                 skeleton, status, diagnostic, content_hash) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            )?;
            for rec in records {
                let bases = serde_json::to_string(&rec.bases)?;
                let methods = serde_json::to_string(&rec.methods)?;
                stmt.execute(params![
                    rec.repository,
                    rec.file_path,
                    rec.class_name,
                    rec.qualified_name,
                    rec.start_line,
                    rec.end_line,
                    bases,
                    rec.docstring,
                    methods,
                    rec.skeleton,
                    rec.status.as_str(),
                    rec.diagnostic,
                    rec.content_hash,
                ])?;
            }
            Ok(records.len())
        })?;
        tracing::info!(path = %self.path.display(), rows = written, "wrote class skeletons");
        Ok(written)
    }
}
