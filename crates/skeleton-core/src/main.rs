use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use skeleton_core::{run_command, AppConfig, Command, ConfigOverrides, SelectionArgs};

#[derive(Parser)]
#[command(
    name = "class-skeletons",
    about = "Build a class-skeleton corpus from Python repositories"
)]
struct Cli {
    /// One of: pull-csn-repo-data, calculate-code-ratio,
    /// analyze-with-understand, extract-class-skeleton
    command: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local corpus root (`<owner>/<name>/...`)
    #[arg(long)]
    corpus_root: Option<PathBuf>,

    /// Directory holding split manifests and collaborator outputs
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Artifact path (default: per-command file under the data root)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Restrict to one benchmark split (train, valid, test)
    #[arg(long, conflicts_with = "projects")]
    split: Option<String>,

    /// Curated project list file
    #[arg(long)]
    projects: Option<PathBuf>,

    /// Worker threads for extraction
    #[arg(short = 'j', long)]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let command: Command = cli.command.parse()?;

    let config = AppConfig::load(&ConfigOverrides {
        config_file: cli.config,
        corpus_root: cli.corpus_root,
        data_root: cli.data_root,
        output: cli.output,
        workers: cli.workers,
    })?;
    let selection = SelectionArgs {
        split: cli.split,
        projects: cli.projects,
    };

    let report = run_command(command, &selection, &config)?;
    println!(
        "{}: wrote {} rows to {} ({} repositories, ok={} partial={} failed={}) in {:.1}s",
        report.command,
        report.rows,
        report.artifact.display(),
        report.stats.repositories,
        report.stats.ok,
        report.stats.partial,
        report.stats.failed,
        t0.elapsed().as_secs_f64()
    );
    Ok(())
}
