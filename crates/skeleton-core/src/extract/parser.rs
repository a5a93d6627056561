//! Python parsing wrapper used by the class extractor.
//!
//! tree-sitter is error tolerant: a tree is produced for almost any input,
//! with `ERROR` and missing nodes marking the places it had to recover. The
//! extractor decides what those mean for record status.

use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tree_sitter::{Node, Parser, Tree};

use crate::errors::{SkeletonError, SkeletonResult};

/// Bounded retry policy for reading source files.
#[derive(Clone, Copy, Debug)]
pub struct ReadPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Build a parser configured for Python.
pub fn python_parser() -> SkeletonResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| SkeletonError::Parse(format!("Failed to set language: {e}")))?;
    Ok(parser)
}

/// Parse raw source bytes. Invalid UTF-8 is tolerated by the grammar.
pub fn parse_source(parser: &mut Parser, source: &[u8]) -> SkeletonResult<Tree> {
    parser
        .parse(source, None)
        .ok_or_else(|| SkeletonError::Parse("parser produced no syntax tree".to_string()))
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

/// Run `read`, retrying transient failures with linear backoff.
///
/// `read` is called at most `policy.attempts` times; the sleep before retry
/// `n` is `n * policy.backoff`.
pub fn retry_read<T>(
    policy: ReadPolicy,
    mut read: impl FnMut() -> std::io::Result<T>,
) -> std::io::Result<T> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match read() {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(e.kind()) && attempt < attempts => {
                tracing::debug!(attempt, error = %e, "retrying read");
                thread::sleep(policy.backoff * attempt);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read a file under the given retry policy.
pub fn read_source(path: &Path, policy: ReadPolicy) -> std::io::Result<Vec<u8>> {
    retry_read(policy, || std::fs::read(path))
}

/// SHA-256 hex digest of file contents.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First syntax error (or missing node) at or below `node`, in source order.
pub fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.is_error() || current.is_missing() {
            return Some(current);
        }
        let mut cursor = current.walk();
        let children: Vec<Node<'_>> = current
            .children(&mut cursor)
            .filter(|c| c.has_error())
            .collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Human readable description of a syntax error location.
pub fn describe_error(node: Node<'_>) -> String {
    let line = node.start_position().row + 1;
    if node.is_missing() {
        format!("syntax error near line {line}: missing `{}`", node.kind())
    } else {
        format!("syntax error near line {line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_python() {
        let mut parser = python_parser().unwrap();
        let tree = parse_source(&mut parser, b"class A:\n    pass\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn locates_first_error() {
        let mut parser = python_parser().unwrap();
        let tree = parse_source(&mut parser, b"x = 1\ny = (\n").unwrap();
        let err = first_error(tree.root_node()).expect("error expected");
        assert!(describe_error(err).starts_with("syntax error near line"));
    }

    #[test]
    fn no_error_on_clean_tree() {
        let mut parser = python_parser().unwrap();
        let tree = parse_source(&mut parser, b"def f():\n    return 1\n").unwrap();
        assert!(first_error(tree.root_node()).is_none());
    }

    #[test]
    fn read_source_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source(&dir.path().join("absent.py"), ReadPolicy::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    fn quick_policy() -> ReadPolicy {
        ReadPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let result = retry_read(quick_policy(), || {
            calls += 1;
            if calls <= 2 {
                Err(std::io::Error::from(ErrorKind::Interrupted))
            } else {
                Ok(b"class A: pass\n".to_vec())
            }
        });
        assert_eq!(result.unwrap(), b"class A: pass\n".to_vec());
        assert_eq!(calls, 3);
    }

    #[test]
    fn retries_stop_after_configured_attempts() {
        let mut calls = 0;
        let err = retry_read(quick_policy(), || -> std::io::Result<()> {
            calls += 1;
            Err(std::io::Error::from(ErrorKind::TimedOut))
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let mut calls = 0;
        let err = retry_read(quick_policy(), || -> std::io::Result<()> {
            calls += 1;
            Err(std::io::Error::from(ErrorKind::PermissionDenied))
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_reads_once() {
        let policy = ReadPolicy {
            attempts: 0,
            backoff: Duration::from_millis(1),
        };
        let mut calls = 0;
        let _ = retry_read(policy, || -> std::io::Result<()> {
            calls += 1;
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
