//! Class-skeleton corpus builder.
//!
//! Selects repositories from a local Python corpus, extracts one structural
//! summary per class (signature, bases, docstrings, method signatures), then
//! normalizes indentation, repairs text encoding and writes everything to a
//! single SQLite artifact. Three side jobs (repository metadata, comment
//! ratio, Understand analysis) share the same selection and storage layers.

pub mod collaborators;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod text;

pub use crate::commands::{run_command, Command, CommandReport, SelectionArgs};
pub use crate::config::{AppConfig, ConfigOverrides};
pub use crate::errors::{SkeletonError, SkeletonResult};
