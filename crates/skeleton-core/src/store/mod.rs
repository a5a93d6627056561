pub mod artifact;
pub mod schema;

pub use artifact::ArtifactWriter;
