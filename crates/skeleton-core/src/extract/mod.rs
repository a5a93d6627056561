pub mod classes;
pub mod docstring;
pub mod parser;

use tree_sitter::Parser;

use crate::extract::classes::extract_classes;
use crate::extract::parser::{content_hash, read_source, ReadPolicy};
use crate::models::{ClassSkeletonRecord, SourceFile};

/// Per-file extraction limits.
#[derive(Clone, Copy, Debug)]
pub struct ExtractOptions {
    pub max_file_bytes: u64,
    pub read_policy: ReadPolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 2 * 1024 * 1024,
            read_policy: ReadPolicy::default(),
        }
    }
}

/// Read one source file and extract its class records.
///
/// Read failures and oversized files become a single `failed` record so the
/// file stays visible in the artifact.
pub fn extract_source_file(
    parser: &mut Parser,
    file: &SourceFile,
    options: &ExtractOptions,
) -> Vec<ClassSkeletonRecord> {
    let source = match read_source(&file.path, options.read_policy) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(repo = %file.repository, path = %file.relative_path, error = %e, "unreadable source file");
            return vec![ClassSkeletonRecord::failed(
                &file.repository,
                &file.relative_path,
                format!("unreadable: {e}"),
            )];
        }
    };

    let hash = content_hash(&source);
    let mut records = if source.len() as u64 > options.max_file_bytes {
        vec![ClassSkeletonRecord::failed(
            &file.repository,
            &file.relative_path,
            format!(
                "file too large: {} bytes (limit {})",
                source.len(),
                options.max_file_bytes
            ),
        )]
    } else {
        extract_classes(parser, &source, &file.repository, &file.relative_path)
    };

    for record in &mut records {
        record.content_hash = Some(hash.clone());
    }
    tracing::debug!(
        repo = %file.repository,
        path = %file.relative_path,
        records = records.len(),
        "extracted file"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parser::python_parser;
    use crate::models::ExtractionStatus;

    fn source_file(dir: &std::path::Path, name: &str, body: &[u8]) -> SourceFile {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        SourceFile {
            repository: "acme/widgets".to_string(),
            path,
            relative_path: name.to_string(),
        }
    }

    #[test]
    fn records_carry_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = source_file(dir.path(), "a.py", b"class A:\n    pass\n");
        let mut parser = python_parser().unwrap();
        let records = extract_source_file(&mut parser, &file, &ExtractOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content_hash.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn oversized_file_is_failed_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = source_file(dir.path(), "big.py", b"class A:\n    pass\n");
        let options = ExtractOptions {
            max_file_bytes: 4,
            ..ExtractOptions::default()
        };
        let mut parser = python_parser().unwrap();
        let records = extract_source_file(&mut parser, &file, &options);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExtractionStatus::Failed);
        assert!(records[0].diagnostic.as_deref().unwrap().starts_with("file too large"));
    }

    #[test]
    fn vanished_file_is_failed_record() {
        let dir = tempfile::tempdir().unwrap();
        let file = SourceFile {
            repository: "acme/widgets".to_string(),
            path: dir.path().join("gone.py"),
            relative_path: "gone.py".to_string(),
        };
        let mut parser = python_parser().unwrap();
        let records = extract_source_file(&mut parser, &file, &ExtractOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExtractionStatus::Failed);
        assert!(records[0].diagnostic.as_deref().unwrap().starts_with("unreadable"));
    }
}
