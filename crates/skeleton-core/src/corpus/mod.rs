pub mod locator;
pub mod selector;

pub use locator::{DirectoryLayout, SourceLocator};
pub use selector::{CorpusSelector, RepoSelection};
