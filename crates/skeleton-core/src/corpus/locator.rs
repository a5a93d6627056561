//! Mapping from repository identifiers to candidate source files.
//!
//! The extractor only sees [`SourceLocator`]; the on-disk convention lives in
//! one implementation and can be swapped without touching extraction.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::models::{Repository, SourceFile};

const SOURCE_EXTENSIONS: &[&str] = &["py"];

const IMPLICIT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".tox",
    ".venv",
    "venv",
    "node_modules",
];

/// Produces the source files believed to belong to a repository.
pub trait SourceLocator: Send + Sync {
    /// Lazily enumerate files in a stable order. Missing repositories yield
    /// an empty sequence.
    fn locate<'a>(&'a self, repo: &Repository) -> Box<dyn Iterator<Item = SourceFile> + Send + 'a>;
}

/// `<root>/<owner>/<name>/**/*.py`
#[derive(Clone, Debug)]
pub struct DirectoryLayout {
    root: PathBuf,
}

impl DirectoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn repo_dir(&self, repo: &Repository) -> PathBuf {
        self.root.join(repo.owner()).join(repo.name())
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IMPLICIT_IGNORED_DIRS.contains(&name))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

impl SourceLocator for DirectoryLayout {
    fn locate<'a>(&'a self, repo: &Repository) -> Box<dyn Iterator<Item = SourceFile> + Send + 'a> {
        let repo_root = self.repo_dir(repo);
        if !repo_root.is_dir() {
            tracing::debug!(repo = %repo.id, dir = %repo_root.display(), "repository not present in corpus");
            return Box::new(std::iter::empty());
        }

        let repo_id = repo.id.clone();
        let walker = WalkDir::new(&repo_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_ignored_dir(e));

        Box::new(walker.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(repo = %repo_id, error = %e, "skipping unreadable entry");
                    return None;
                }
            };
            let path = entry.path();
            if !has_source_extension(path) {
                return None;
            }
            let file_type = entry.file_type();
            if file_type.is_symlink() && !path.is_file() {
                tracing::warn!(repo = %repo_id, path = %path.display(), "skipping broken link");
                return None;
            }
            if !file_type.is_file() && !file_type.is_symlink() {
                return None;
            }
            let relative_path = path
                .strip_prefix(&repo_root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            Some(SourceFile {
                repository: repo_id.clone(),
                path: path.to_path_buf(),
                relative_path,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn lists_python_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("acme").join("widgets");
        write(&repo_dir.join("b.py"), "");
        write(&repo_dir.join("a.py"), "");
        write(&repo_dir.join("pkg").join("c.py"), "");
        write(&repo_dir.join("README.md"), "");
        write(&repo_dir.join(".git").join("hooks.py"), "");
        write(&repo_dir.join("pkg").join("__pycache__").join("c.py"), "");

        let layout = DirectoryLayout::new(dir.path());
        let files: Vec<String> = layout
            .locate(&Repository::new("acme/widgets"))
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(files, vec!["a.py", "b.py", "pkg/c.py"]);
    }

    #[test]
    fn missing_repository_yields_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path());
        assert_eq!(layout.locate(&Repository::new("nobody/nothing")).count(), 0);
    }

    #[test]
    fn repository_without_sources_yields_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("acme").join("docs").join("index.rst"), "");
        let layout = DirectoryLayout::new(dir.path());
        assert_eq!(layout.locate(&Repository::new("acme/docs")).count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn broken_links_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("acme").join("widgets");
        write(&repo_dir.join("real.py"), "");
        std::os::unix::fs::symlink(repo_dir.join("missing.py"), repo_dir.join("dangling.py"))
            .unwrap();

        let layout = DirectoryLayout::new(dir.path());
        let files: Vec<String> = layout
            .locate(&Repository::new("acme/widgets"))
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(files, vec!["real.py"]);
    }
}
