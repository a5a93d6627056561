//! Job dispatch: one variant per command, one handler per variant.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::collaborators::{CodeRatio, Collaborator, RepoMetadata, Understand};
use crate::config::AppConfig;
use crate::corpus::{CorpusSelector, DirectoryLayout, RepoSelection};
use crate::errors::{SkeletonError, SkeletonResult};
use crate::extract::ExtractOptions;
use crate::pipeline::{new_run_id, run_extraction, RunStats};
use crate::store::{schema, ArtifactWriter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    PullCsnRepoData,
    CalculateCodeRatio,
    AnalyzeWithUnderstand,
    ExtractClassSkeleton,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::PullCsnRepoData,
        Command::CalculateCodeRatio,
        Command::AnalyzeWithUnderstand,
        Command::ExtractClassSkeleton,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::PullCsnRepoData => "pull-csn-repo-data",
            Command::CalculateCodeRatio => "calculate-code-ratio",
            Command::AnalyzeWithUnderstand => "analyze-with-understand",
            Command::ExtractClassSkeleton => "extract-class-skeleton",
        }
    }

    /// Artifact file name used when no explicit output is configured.
    pub fn default_artifact(&self) -> &'static str {
        match self {
            Command::PullCsnRepoData => "repo_metadata.db",
            Command::CalculateCodeRatio => "code_ratio.db",
            Command::AnalyzeWithUnderstand => "understand_runs.db",
            Command::ExtractClassSkeleton => "class_skeletons.db",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = SkeletonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| SkeletonError::UnknownCommand(s.to_string()))
    }
}

/// Per-invocation repository selection flags.
#[derive(Clone, Debug, Default)]
pub struct SelectionArgs {
    pub split: Option<String>,
    pub projects: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct CommandReport {
    pub command: Command,
    pub artifact: PathBuf,
    pub rows: usize,
    pub stats: RunStats,
}

/// Which repositories a command reads when no flag says otherwise.
pub fn resolve_selection(command: Command, args: &SelectionArgs, config: &AppConfig) -> RepoSelection {
    if let Some(projects) = &args.projects {
        return RepoSelection::ProjectList(projects.clone());
    }
    if let Some(split) = &args.split {
        return RepoSelection::Split(split.clone());
    }
    match command {
        Command::PullCsnRepoData => RepoSelection::AllSplits,
        Command::CalculateCodeRatio | Command::AnalyzeWithUnderstand => {
            RepoSelection::ProjectList(config.default_project_list())
        }
        Command::ExtractClassSkeleton => RepoSelection::LocalCorpus,
    }
}

pub fn run_command(command: Command, args: &SelectionArgs, config: &AppConfig) -> SkeletonResult<CommandReport> {
    let layout = DirectoryLayout::new(&config.corpus_root);
    let output = config.output_path(command.default_artifact());

    // Credentials are checked before any selection or network work.
    let collaborator: Option<Box<dyn Collaborator>> = match command {
        Command::PullCsnRepoData => Some(Box::new(RepoMetadata::from_config(config)?)),
        Command::CalculateCodeRatio => Some(Box::new(CodeRatio::new(layout.clone()))),
        Command::AnalyzeWithUnderstand => Some(Box::new(Understand::new(
            &config.understand_binary,
            layout.clone(),
            config.understand_dir(),
        ))),
        Command::ExtractClassSkeleton => None,
    };

    let selection = resolve_selection(command, args, config);
    let repos = CorpusSelector::new(config.splits_dir(), &config.corpus_root).select(&selection)?;
    tracing::info!(command = %command, repositories = repos.len(), output = %output.display(), "starting");

    let report = match collaborator {
        None => {
            let options = ExtractOptions {
                max_file_bytes: config.max_file_bytes,
                ..ExtractOptions::default()
            };
            let mut writer = ArtifactWriter::create(&output, schema::CLASS_SKELETON_STATEMENTS)?;
            let (records, stats) = run_extraction(&repos, &layout, &options, config.workers);
            let rows = writer.write_class_skeletons(&records)?;
            writer.write_run_meta(command.as_str(), &stats)?;
            CommandReport {
                command,
                artifact: output,
                rows,
                stats,
            }
        }
        Some(job) => {
            let stats = RunStats {
                run_id: new_run_id(),
                repositories: repos.len(),
                ..RunStats::default()
            };
            let mut writer = ArtifactWriter::create(&output, job.schema())?;
            let rows = job.run(&repos, &mut writer)?;
            writer.write_run_meta(command.as_str(), &stats)?;
            tracing::info!(command = %command, table = job.table(), rows, "collaborator finished");
            CommandReport {
                command,
                artifact: output,
                rows,
                stats,
            }
        }
    };
    Ok(report)
}
