//! Repository selection from split manifests, curated project lists, or the
//! local corpus directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{SkeletonError, SkeletonResult};
use crate::models::{is_valid_repo_id, Repository};

pub const SPLIT_EXTENSION: &str = "jsonl";

/// Which repositories a run targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepoSelection {
    Split(String),
    AllSplits,
    ProjectList(PathBuf),
    LocalCorpus,
}

#[derive(Deserialize)]
struct SplitEntry {
    repo: Option<String>,
}

/// Resolves a [`RepoSelection`] against the on-disk inputs.
#[derive(Clone, Debug)]
pub struct CorpusSelector {
    splits_dir: PathBuf,
    corpus_root: PathBuf,
}

fn list_error(path: &Path, source: std::io::Error) -> SkeletonError {
    SkeletonError::RepoList {
        path: path.display().to_string(),
        source,
    }
}

impl CorpusSelector {
    pub fn new(splits_dir: impl Into<PathBuf>, corpus_root: impl Into<PathBuf>) -> Self {
        Self {
            splits_dir: splits_dir.into(),
            corpus_root: corpus_root.into(),
        }
    }

    /// Deduplicated repositories ordered by identifier.
    pub fn select(&self, selection: &RepoSelection) -> SkeletonResult<Vec<Repository>> {
        let mut repos: BTreeMap<String, Repository> = BTreeMap::new();
        match selection {
            RepoSelection::Split(name) => {
                let path = self.split_path(name);
                self.read_split(name, &path, &mut repos)?;
            }
            RepoSelection::AllSplits => {
                for (name, path) in self.split_manifests()? {
                    self.read_split(&name, &path, &mut repos)?;
                }
            }
            RepoSelection::ProjectList(path) => read_project_list(path, &mut repos)?,
            RepoSelection::LocalCorpus => self.scan_corpus(&mut repos)?,
        }
        tracing::info!(selection = ?selection, repositories = repos.len(), "selected repositories");
        Ok(repos.into_values().collect())
    }

    pub fn split_path(&self, name: &str) -> PathBuf {
        self.splits_dir.join(format!("{name}.{SPLIT_EXTENSION}"))
    }

    fn split_manifests(&self) -> SkeletonResult<Vec<(String, PathBuf)>> {
        let entries = fs::read_dir(&self.splits_dir).map_err(|e| list_error(&self.splits_dir, e))?;
        let mut manifests = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| list_error(&self.splits_dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SPLIT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                manifests.push((stem.to_string(), path.clone()));
            }
        }
        manifests.sort();
        Ok(manifests)
    }

    fn read_split(
        &self,
        split: &str,
        path: &Path,
        repos: &mut BTreeMap<String, Repository>,
    ) -> SkeletonResult<()> {
        let content = fs::read_to_string(path).map_err(|e| list_error(path, e))?;
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let repo = match serde_json::from_str::<SplitEntry>(line) {
                Ok(SplitEntry { repo: Some(repo) }) => repo,
                Ok(SplitEntry { repo: None }) => {
                    tracing::warn!(path = %path.display(), line = lineno + 1, "manifest entry without repo field");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping malformed manifest line");
                    continue;
                }
            };
            if let Some(entry) = admit(repos, repo.trim()) {
                entry.splits.insert(split.to_string());
            }
        }
        Ok(())
    }

    fn scan_corpus(&self, repos: &mut BTreeMap<String, Repository>) -> SkeletonResult<()> {
        let owners = fs::read_dir(&self.corpus_root).map_err(|e| list_error(&self.corpus_root, e))?;
        for owner in owners.flatten() {
            if !owner.path().is_dir() {
                continue;
            }
            let Ok(names) = fs::read_dir(owner.path()) else {
                tracing::warn!(dir = %owner.path().display(), "skipping unreadable owner directory");
                continue;
            };
            for name in names.flatten() {
                if !name.path().is_dir() {
                    continue;
                }
                let id = format!(
                    "{}/{}",
                    owner.file_name().to_string_lossy(),
                    name.file_name().to_string_lossy()
                );
                admit(repos, &id);
            }
        }
        Ok(())
    }
}

/// Insert a repository id after validation, returning the stored entry.
fn admit<'m>(
    repos: &'m mut BTreeMap<String, Repository>,
    id: &str,
) -> Option<&'m mut Repository> {
    if !is_valid_repo_id(id) {
        tracing::warn!(repo = %id, "skipping invalid repository identifier");
        return None;
    }
    Some(
        repos
            .entry(id.to_string())
            .or_insert_with(|| Repository::new(id)),
    )
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// `owner/name[,flag]` per line, with an optional `repo...` header row.
fn read_project_list(path: &Path, repos: &mut BTreeMap<String, Repository>) -> SkeletonResult<()> {
    let content = fs::read_to_string(path).map_err(|e| list_error(path, e))?;
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if index == 0 && line.to_ascii_lowercase().starts_with("repo") {
            continue;
        }
        let mut fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty());
        let Some(id) = fields.next() else {
            continue;
        };
        let included = fields.next().and_then(parse_flag);
        if included == Some(false) {
            tracing::debug!(repo = %id, "excluded by project list flag");
            continue;
        }
        if let Some(entry) = admit(repos, id) {
            entry.included = included.or(entry.included);
        }
    }
    Ok(())
}
