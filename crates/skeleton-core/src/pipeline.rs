//! Extraction pipeline orchestration with Rayon-based parallelism.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use crate::corpus::SourceLocator;
use crate::extract::parser::python_parser;
use crate::extract::{extract_source_file, ExtractOptions};
use crate::models::{ClassSkeletonRecord, ExtractionStatus, Repository};
use crate::text::normalize::normalize_skeleton;
use crate::text::sanitize::sanitize_field;

/// Everything extracted from one repository.
pub struct RepositoryOutput {
    pub repository: String,
    pub files_seen: usize,
    pub records: Vec<ClassSkeletonRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub run_id: String,
    pub repositories: usize,
    pub files_seen: usize,
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    pub elapsed_ms: u128,
}

impl RunStats {
    fn count(&mut self, status: ExtractionStatus) {
        match status {
            ExtractionStatus::Ok => self.ok += 1,
            ExtractionStatus::Partial => self.partial += 1,
            ExtractionStatus::Failed => self.failed += 1,
        }
    }
}

pub fn new_run_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("run-{millis}")
}

/// Extract every located file of one repository, in locator order.
pub fn extract_repository(
    repo: &Repository,
    locator: &dyn SourceLocator,
    options: &ExtractOptions,
) -> RepositoryOutput {
    let mut output = RepositoryOutput {
        repository: repo.id.clone(),
        files_seen: 0,
        records: Vec::new(),
    };

    let mut parser = match python_parser() {
        Ok(parser) => Some(parser),
        Err(e) => {
            tracing::error!(repo = %repo.id, error = %e, "python parser unavailable");
            None
        }
    };

    for file in locator.locate(repo) {
        output.files_seen += 1;
        match parser.as_mut() {
            Some(parser) => output
                .records
                .extend(extract_source_file(parser, &file, options)),
            None => output.records.push(ClassSkeletonRecord::failed(
                &file.repository,
                &file.relative_path,
                "parser unavailable",
            )),
        }
    }

    tracing::debug!(
        repo = %repo.id,
        files = output.files_seen,
        records = output.records.len(),
        "extracted repository"
    );
    output
}

/// Fan out one task per repository. Falls back to sequential extraction if the
/// pool cannot be built.
pub fn parallel_extract(
    repos: &[Repository],
    locator: &dyn SourceLocator,
    options: &ExtractOptions,
    workers: usize,
) -> Vec<RepositoryOutput> {
    if repos.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            repos
                .par_iter()
                .map(|repo| extract_repository(repo, locator, options))
                .collect()
        }),
        Err(e) => {
            tracing::warn!(error = %e, "thread pool unavailable, extracting sequentially");
            repos
                .iter()
                .map(|repo| extract_repository(repo, locator, options))
                .collect()
        }
    }
}

/// Normalize and sanitize records, then put them in artifact order.
///
/// Only `ok` and `partial` skeletons are re-indented; failed records keep
/// their empty skeleton.
pub fn assemble(mut records: Vec<ClassSkeletonRecord>) -> Vec<ClassSkeletonRecord> {
    for record in &mut records {
        if record.status != ExtractionStatus::Failed {
            record.skeleton = normalize_skeleton(&record.skeleton);
        }
        record.map_text_fields(sanitize_field);
    }
    records.sort_by(|a, b| a.artifact_order(b));
    records
}

/// Select-to-assemble run over the given repositories.
pub fn run_extraction(
    repos: &[Repository],
    locator: &dyn SourceLocator,
    options: &ExtractOptions,
    workers: usize,
) -> (Vec<ClassSkeletonRecord>, RunStats) {
    let started = Instant::now();
    let outputs = parallel_extract(repos, locator, options, workers);

    let mut stats = RunStats {
        run_id: new_run_id(),
        repositories: repos.len(),
        ..RunStats::default()
    };
    let mut records = Vec::new();
    for output in outputs {
        stats.files_seen += output.files_seen;
        records.extend(output.records);
    }

    let records = assemble(records);
    for record in &records {
        stats.count(record.status);
    }
    stats.elapsed_ms = started.elapsed().as_millis();

    tracing::info!(
        run_id = %stats.run_id,
        repositories = stats.repositories,
        files = stats.files_seen,
        ok = stats.ok,
        partial = stats.partial,
        failed = stats.failed,
        elapsed_ms = stats.elapsed_ms as u64,
        "extraction finished"
    );
    (records, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::DirectoryLayout;
    use std::fs;

    #[test]
    fn assemble_sorts_and_sanitizes() {
        let b = ClassSkeletonRecord::failed("acme/widgets", "b.py", "bad\0byte");
        let mut a = ClassSkeletonRecord::failed("acme/widgets", "a.py", "x");
        a.class_name = Some("A".to_string());
        a.status = ExtractionStatus::Ok;
        a.skeleton = "class A:\n  def f(self):\n    ...".to_string();

        let records = assemble(vec![b, a]);
        assert_eq!(records[0].file_path, "a.py");
        assert_eq!(records[0].skeleton, "class A:\n    def f(self):\n        ...");
        assert_eq!(records[1].diagnostic.as_deref(), Some("bad\u{FFFD}byte"));
        assert!(records[1].skeleton.is_empty());
    }

    #[test]
    fn repository_without_files_produces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path());
        let output = extract_repository(
            &Repository::new("acme/empty"),
            &layout,
            &ExtractOptions::default(),
        );
        assert_eq!(output.files_seen, 0);
        assert!(output.records.is_empty());
    }

    #[test]
    fn run_counts_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("acme").join("widgets");
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join("good.py"), "class A:\n    pass\n\nclass B(A):\n    pass\n").unwrap();
        fs::write(repo_dir.join("bad.py"), "def (((:\n  ]]] = = \n").unwrap();

        let layout = DirectoryLayout::new(dir.path());
        let repos = vec![Repository::new("acme/widgets")];
        let (records, stats) = run_extraction(&repos, &layout, &ExtractOptions::default(), 2);

        assert_eq!(stats.files_seen, 2);
        assert_eq!(stats.ok, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file_path, "bad.py");
        assert!(stats.run_id.starts_with("run-"));
    }
}
