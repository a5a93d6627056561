//! Shared typed models used across selection, extraction, and storage.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 1. Repository
// ---------------------------------------------------------------------------

/// A repository selected for a run, identified as `owner/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Repository {
    pub id: String,
    /// Benchmark splits this repository appears in (may be empty).
    pub splits: BTreeSet<String>,
    /// Inclusion flag carried over from a curated project list, if any.
    pub included: Option<bool>,
}

impl Repository {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            splits: BTreeSet::new(),
            included: None,
        }
    }

    pub fn owner(&self) -> &str {
        self.id.split_once('/').map(|(o, _)| o).unwrap_or(&self.id)
    }

    pub fn name(&self) -> &str {
        self.id.split_once('/').map(|(_, n)| n).unwrap_or("")
    }

    /// Filesystem-safe slug, e.g. `owner__name`.
    pub fn slug(&self) -> String {
        self.id.replace('/', "__")
    }
}

/// Validate an `owner/name` identifier.
///
/// Both halves must be non-empty, contain no further separators, and must not
/// be `.` or `..`.
pub fn is_valid_repo_id(id: &str) -> bool {
    let Some((owner, name)) = id.split_once('/') else {
        return false;
    };
    let ok_part = |p: &str| {
        !p.is_empty()
            && p != "."
            && p != ".."
            && p
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    ok_part(owner) && ok_part(name)
}

// ---------------------------------------------------------------------------
// 2. SourceFile
// ---------------------------------------------------------------------------

/// A candidate source file belonging to a repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// Owning repository identifier.
    pub repository: String,
    /// Absolute (or corpus-rooted) path on disk.
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub relative_path: String,
}

// ---------------------------------------------------------------------------
// 3. Extraction status
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Ok,
    Partial,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Ok => "ok",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// 4. MethodRecord
// ---------------------------------------------------------------------------

/// A method defined directly in a class body. Bodies are never captured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    /// Parameter list including the surrounding parentheses.
    pub parameters: String,
    pub return_annotation: Option<String>,
    pub decorators: Vec<String>,
    pub is_async: bool,
    pub docstring: Option<String>,
}

// ---------------------------------------------------------------------------
// 5. ClassSkeletonRecord
// ---------------------------------------------------------------------------

/// One row of the final artifact.
///
/// File-scoped failures carry no class name and an empty skeleton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSkeletonRecord {
    pub repository: String,
    pub file_path: String,
    pub class_name: Option<String>,
    pub qualified_name: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub bases: Vec<String>,
    pub docstring: Option<String>,
    pub methods: Vec<MethodRecord>,
    pub skeleton: String,
    pub status: ExtractionStatus,
    pub diagnostic: Option<String>,
    pub content_hash: Option<String>,
}

impl ClassSkeletonRecord {
    /// A `failed` record scoped to a whole file.
    pub fn failed(
        repository: impl Into<String>,
        file_path: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            file_path: file_path.into(),
            class_name: None,
            qualified_name: None,
            start_line: None,
            end_line: None,
            bases: Vec::new(),
            docstring: None,
            methods: Vec::new(),
            skeleton: String::new(),
            status: ExtractionStatus::Failed,
            diagnostic: Some(diagnostic.into()),
            content_hash: None,
        }
    }

    /// Apply `f` to every text-typed field. Missing optional fields stay missing.
    pub fn map_text_fields<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        let apply = |s: &mut String| *s = f(s.as_str());
        let apply_opt = |s: &mut Option<String>| {
            if let Some(v) = s.as_mut() {
                *v = f(v.as_str());
            }
        };

        apply(&mut self.repository);
        apply(&mut self.file_path);
        apply_opt(&mut self.class_name);
        apply_opt(&mut self.qualified_name);
        self.bases.iter_mut().for_each(apply);
        apply_opt(&mut self.docstring);
        for method in &mut self.methods {
            apply(&mut method.name);
            apply(&mut method.parameters);
            apply_opt(&mut method.return_annotation);
            method.decorators.iter_mut().for_each(apply);
            apply_opt(&mut method.docstring);
        }
        apply(&mut self.skeleton);
        apply_opt(&mut self.diagnostic);
        apply_opt(&mut self.content_hash);
    }

    /// Artifact row ordering: repository, file path, class name, start line.
    /// File-scoped failures (no class name) sort first within their file.
    pub fn artifact_order(&self, other: &Self) -> Ordering {
        self.repository
            .cmp(&other.repository)
            .then_with(|| self.file_path.cmp(&other.file_path))
            .then_with(|| self.class_name.cmp(&other.class_name))
            .then_with(|| self.start_line.cmp(&other.start_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_validation() {
        assert!(is_valid_repo_id("psf/requests"));
        assert!(is_valid_repo_id("some-org/my_repo.py"));
        assert!(!is_valid_repo_id("requests"));
        assert!(!is_valid_repo_id("../etc"));
        assert!(!is_valid_repo_id("a/b/c"));
        assert!(!is_valid_repo_id("owner/.."));
        assert!(!is_valid_repo_id("/name"));
    }

    #[test]
    fn repository_parts() {
        let repo = Repository::new("psf/requests");
        assert_eq!(repo.owner(), "psf");
        assert_eq!(repo.name(), "requests");
        assert_eq!(repo.slug(), "psf__requests");
    }

    #[test]
    fn failed_record_has_empty_skeleton() {
        let rec = ClassSkeletonRecord::failed("a/b", "x.py", "boom");
        assert_eq!(rec.status, ExtractionStatus::Failed);
        assert!(rec.skeleton.is_empty());
        assert!(rec.class_name.is_none());
        assert_eq!(rec.diagnostic.as_deref(), Some("boom"));
    }

    #[test]
    fn map_text_fields_leaves_missing_fields_missing() {
        let mut rec = ClassSkeletonRecord::failed("a/b", "x.py", "boom");
        rec.map_text_fields(|s| s.to_uppercase());
        assert_eq!(rec.repository, "A/B");
        assert_eq!(rec.diagnostic.as_deref(), Some("BOOM"));
        assert!(rec.docstring.is_none());
        assert!(rec.class_name.is_none());
    }

    #[test]
    fn failures_sort_before_classes_in_same_file() {
        let failed = ClassSkeletonRecord::failed("a/b", "x.py", "boom");
        let mut class = failed.clone();
        class.class_name = Some("Alpha".to_string());
        assert_eq!(failed.artifact_order(&class), Ordering::Less);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ExtractionStatus::Partial).unwrap();
        assert_eq!(json, "\"partial\"");
        assert_eq!(ExtractionStatus::Ok.to_string(), "ok");
    }
}
