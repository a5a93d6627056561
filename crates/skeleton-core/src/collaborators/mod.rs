//! Jobs that sit next to the extraction core: each takes the selected
//! repositories and fills one table of its own artifact.

pub mod code_ratio;
pub mod metadata;
pub mod understand;

use crate::errors::SkeletonResult;
use crate::models::Repository;
use crate::store::ArtifactWriter;

pub trait Collaborator {
    /// Artifact table this job fills.
    fn table(&self) -> &'static str;

    /// DDL for [`Collaborator::table`].
    fn schema(&self) -> &'static [&'static str];

    /// Process `repos` and write one row per repository. Per-repository
    /// failures are rows, not errors.
    fn run(&self, repos: &[Repository], writer: &mut ArtifactWriter) -> SkeletonResult<usize>;
}

pub use code_ratio::CodeRatio;
pub use metadata::RepoMetadata;
pub use understand::Understand;
