//! Repository metadata from the GitHub REST API.

use std::time::Duration;

use rusqlite::params;
use serde::Deserialize;

use crate::collaborators::Collaborator;
use crate::config::AppConfig;
use crate::errors::{SkeletonError, SkeletonResult};
use crate::models::Repository;
use crate::store::{schema, ArtifactWriter};

const USER_AGENT: &str = concat!("class-skeletons/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct License {
    pub spdx_id: Option<String>,
}

/// Subset of `GET /repos/{owner}/{repo}` that ends up in the table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RepoInfo {
    pub full_name: Option<String>,
    pub stargazers_count: Option<i64>,
    pub forks_count: Option<i64>,
    pub open_issues_count: Option<i64>,
    pub language: Option<String>,
    pub license: Option<License>,
    pub created_at: Option<String>,
    pub pushed_at: Option<String>,
    pub archived: Option<bool>,
    pub fork: Option<bool>,
}

pub struct RepoMetadata {
    client: reqwest::blocking::Client,
    api_url: String,
    token: String,
}

impl RepoMetadata {
    /// Fails before any request when no token is configured.
    pub fn from_config(config: &AppConfig) -> SkeletonResult<Self> {
        let token = config
            .github_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                SkeletonError::Config(format!(
                    "missing GitHub token (set {}_GITHUB_TOKEN)",
                    crate::config::ENV_PREFIX
                ))
            })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn repo_url(&self, repo: &Repository) -> String {
        format!("{}/repos/{}/{}", self.api_url, repo.owner(), repo.name())
    }

    fn fetch(&self, repo: &Repository) -> SkeletonResult<RepoInfo> {
        let info = self
            .client
            .get(self.repo_url(repo))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()?
            .error_for_status()?
            .json::<RepoInfo>()?;
        Ok(info)
    }
}

impl Collaborator for RepoMetadata {
    fn table(&self) -> &'static str {
        "repo_metadata"
    }

    fn schema(&self) -> &'static [&'static str] {
        schema::REPO_METADATA_STATEMENTS
    }

    fn run(&self, repos: &[Repository], writer: &mut ArtifactWriter) -> SkeletonResult<usize> {
        let mut rows = Vec::with_capacity(repos.len());
        for repo in repos {
            let result = self.fetch(repo);
            if let Err(e) = &result {
                tracing::warn!(repo = %repo.id, error = %e, "metadata request failed");
            }
            rows.push((repo, result));
        }

        writer.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO repo_metadata (repository, splits, full_name, stars, forks, \
                 open_issues, language, license, created_at, pushed_at, archived, is_fork, error) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            )?;
            for (repo, result) in &rows {
                let splits = serde_json::to_string(&repo.splits)?;
                match result {
                    Ok(info) => stmt.execute(params![
                        repo.id,
                        splits,
                        info.full_name,
                        info.stargazers_count,
                        info.forks_count,
                        info.open_issues_count,
                        info.language,
                        info.license.as_ref().and_then(|l| l.spdx_id.clone()),
                        info.created_at,
                        info.pushed_at,
                        info.archived,
                        info.fork,
                        Option::<String>::None,
                    ])?,
                    Err(e) => stmt.execute(params![
                        repo.id,
                        splits,
                        Option::<String>::None,
                        Option::<i64>::None,
                        Option::<i64>::None,
                        Option::<i64>::None,
                        Option::<String>::None,
                        Option::<String>::None,
                        Option::<String>::None,
                        Option::<String>::None,
                        Option::<bool>::None,
                        Option::<bool>::None,
                        e.to_string(),
                    ])?,
                };
            }
            Ok(rows.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> AppConfig {
        AppConfig {
            corpus_root: PathBuf::from("repos"),
            data_root: PathBuf::from("data"),
            output: None,
            project_list: None,
            workers: 1,
            max_file_bytes: 1024,
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            http_timeout_secs: 5,
            understand_binary: PathBuf::from("und"),
        }
    }

    #[test]
    fn missing_token_is_config_error() {
        let err = RepoMetadata::from_config(&config()).err().unwrap();
        assert!(matches!(err, SkeletonError::Config(_)));
    }

    #[test]
    fn builds_repo_url() {
        let mut config = config();
        config.github_token = Some("t".to_string());
        config.github_api_url = "https://api.example.test/".to_string();
        let job = RepoMetadata::from_config(&config).unwrap();
        assert_eq!(
            job.repo_url(&Repository::new("psf/requests")),
            "https://api.example.test/repos/psf/requests"
        );
    }

    #[test]
    fn parses_api_payload_with_missing_fields() {
        let info: RepoInfo = serde_json::from_str(
            r#"{"full_name": "psf/requests", "stargazers_count": 50000,
                "license": {"key": "apache-2.0", "spdx_id": "Apache-2.0"},
                "language": null, "fork": false}"#,
        )
        .unwrap();
        assert_eq!(info.full_name.as_deref(), Some("psf/requests"));
        assert_eq!(info.stargazers_count, Some(50000));
        assert_eq!(info.license.and_then(|l| l.spdx_id).as_deref(), Some("Apache-2.0"));
        assert!(info.language.is_none());
        assert!(info.archived.is_none());
    }
}
