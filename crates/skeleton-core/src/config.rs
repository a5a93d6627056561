//! Runtime configuration, read once at startup.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! `SKELETONS_*` environment variables, then command-line overrides.

use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::SkeletonResult;

pub const ENV_PREFIX: &str = "SKELETONS";

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Root of the local corpus, laid out as `<owner>/<name>/...`.
    pub corpus_root: PathBuf,
    /// Split manifests, project lists and collaborator outputs live here.
    pub data_root: PathBuf,
    /// Artifact destination; defaults to a per-command file under `data_root`.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub project_list: Option<PathBuf>,
    pub workers: usize,
    pub max_file_bytes: u64,
    #[serde(default)]
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub http_timeout_secs: u64,
    pub understand_binary: PathBuf,
}

/// Values supplied on the command line. `None` leaves lower layers in effect.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub corpus_root: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub workers: Option<usize>,
}

fn default_workers() -> i64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(4)
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl AppConfig {
    pub fn load(overrides: &ConfigOverrides) -> SkeletonResult<Self> {
        Self::load_with_env(overrides, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(overrides: &ConfigOverrides, env: Environment) -> SkeletonResult<Self> {
        let mut builder = Config::builder()
            .set_default("corpus_root", "data/repos")?
            .set_default("data_root", "data")?
            .set_default("workers", default_workers())?
            .set_default("max_file_bytes", 2_i64 * 1024 * 1024)?
            .set_default("github_api_url", "https://api.github.com")?
            .set_default("http_timeout_secs", 30_i64)?
            .set_default("understand_binary", "und")?;

        if let Some(file) = &overrides.config_file {
            builder = builder.add_source(File::from(file.as_path()).required(true));
        }
        builder = builder.add_source(env.try_parsing(true));

        if let Some(root) = &overrides.corpus_root {
            builder = builder.set_override("corpus_root", path_value(root))?;
        }
        if let Some(root) = &overrides.data_root {
            builder = builder.set_override("data_root", path_value(root))?;
        }
        if let Some(output) = &overrides.output {
            builder = builder.set_override("output", path_value(output))?;
        }
        if let Some(workers) = overrides.workers {
            builder = builder.set_override("workers", workers as i64)?;
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        tracing::debug!(
            corpus_root = %config.corpus_root.display(),
            data_root = %config.data_root.display(),
            workers = config.workers,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn splits_dir(&self) -> PathBuf {
        self.data_root.join("splits")
    }

    pub fn understand_dir(&self) -> PathBuf {
        self.data_root.join("understand")
    }

    pub fn default_project_list(&self) -> PathBuf {
        self.project_list
            .clone()
            .unwrap_or_else(|| self.data_root.join("projects.csv"))
    }

    /// Explicit output, or `<data_root>/<file_name>`.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.data_root.join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = AppConfig::load_with_env(&ConfigOverrides::default(), no_env()).unwrap();
        assert_eq!(config.corpus_root, PathBuf::from("data/repos"));
        assert_eq!(config.max_file_bytes, 2 * 1024 * 1024);
        assert!(config.github_token.is_none());
        assert!(config.workers >= 1);
        assert_eq!(config.output_path("x.db"), PathBuf::from("data/x.db"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::from([
            ("SKELETONS_GITHUB_TOKEN".to_string(), "secret".to_string()),
            ("SKELETONS_WORKERS".to_string(), "3".to_string()),
        ])));
        let config = AppConfig::load_with_env(&ConfigOverrides::default(), env).unwrap();
        assert_eq!(config.github_token.as_deref(), Some("secret"));
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn file_then_cli_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("skeletons.toml");
        std::fs::write(&file, "data_root = \"/srv/data\"\nworkers = 7\n").unwrap();

        let overrides = ConfigOverrides {
            config_file: Some(file),
            workers: Some(2),
            ..ConfigOverrides::default()
        };
        let config = AppConfig::load_with_env(&overrides, no_env()).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/srv/data"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.splits_dir(), PathBuf::from("/srv/data/splits"));
    }

    #[test]
    fn missing_config_file_is_error() {
        let overrides = ConfigOverrides {
            config_file: Some(PathBuf::from("/definitely/not/here.toml")),
            ..ConfigOverrides::default()
        };
        assert!(AppConfig::load_with_env(&overrides, no_env()).is_err());
    }
}
