//! Drives the SciTools `und` command line over each repository.

use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use rusqlite::params;

use crate::collaborators::Collaborator;
use crate::corpus::DirectoryLayout;
use crate::errors::{SkeletonError, SkeletonResult};
use crate::models::Repository;
use crate::store::{schema, ArtifactWriter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnderstandRun {
    pub repository: String,
    pub database: PathBuf,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl UnderstandRun {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }
}

pub struct Understand {
    binary: PathBuf,
    layout: DirectoryLayout,
    output_dir: PathBuf,
}

impl Understand {
    pub fn new(binary: impl Into<PathBuf>, layout: DirectoryLayout, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            layout,
            output_dir: output_dir.into(),
        }
    }

    pub fn database_path(&self, repo: &Repository) -> PathBuf {
        self.output_dir.join(format!("{}.und", repo.slug()))
    }

    fn step(&self, args: &[&OsStr]) -> Result<i32, String> {
        let output = Command::new(&self.binary).args(args).output();
        match output {
            Ok(output) if output.status.success() => Ok(0),
            Ok(output) => {
                let code = output.status.code().unwrap_or(-1);
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(format!("exit {code}: {}", stderr.trim()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(format!("binary not found: {}", self.binary.display()))
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// `und create`, `und add`, `und analyze` for one repository.
    pub fn analyze(&self, repo: &Repository) -> UnderstandRun {
        let database = self.database_path(repo);
        let mut run = UnderstandRun {
            repository: repo.id.clone(),
            database: database.clone(),
            exit_code: None,
            error: None,
        };

        let source_dir = self.layout.repo_dir(repo);
        if !source_dir.is_dir() {
            run.error = Some("repository not present in corpus".to_string());
            return run;
        }
        if let Err(e) = remove_existing(&database) {
            run.error = Some(e.to_string());
            return run;
        }

        let db = database.as_os_str();
        let steps: [Vec<&OsStr>; 3] = [
            vec![OsStr::new("create"), OsStr::new("-languages"), OsStr::new("python"), db],
            vec![OsStr::new("add"), source_dir.as_os_str(), db],
            vec![OsStr::new("analyze"), db],
        ];
        for args in &steps {
            match self.step(args) {
                Ok(code) => run.exit_code = Some(code),
                Err(message) => {
                    tracing::warn!(repo = %repo.id, step = ?args[0], error = %message, "understand step failed");
                    run.error = Some(message);
                    break;
                }
            }
        }
        run
    }
}

fn remove_existing(database: &Path) -> std::io::Result<()> {
    if database.is_dir() {
        fs::remove_dir_all(database)
    } else if database.exists() {
        fs::remove_file(database)
    } else {
        Ok(())
    }
}

impl Collaborator for Understand {
    fn table(&self) -> &'static str {
        "understand_runs"
    }

    fn schema(&self) -> &'static [&'static str] {
        schema::UNDERSTAND_RUN_STATEMENTS
    }

    fn run(&self, repos: &[Repository], writer: &mut ArtifactWriter) -> SkeletonResult<usize> {
        fs::create_dir_all(&self.output_dir).map_err(|e| SkeletonError::Artifact {
            path: self.output_dir.display().to_string(),
            message: e.to_string(),
        })?;
        let runs: Vec<UnderstandRun> = repos.iter().map(|repo| self.analyze(repo)).collect();

        writer.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO understand_runs (repository, database_path, exit_code, succeeded, error) \
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for run in &runs {
                stmt.execute(params![
                    run.repository,
                    run.database.to_string_lossy(),
                    run.exit_code,
                    run.succeeded(),
                    run.error,
                ])?;
            }
            Ok(runs.len())
        })
    }
}
