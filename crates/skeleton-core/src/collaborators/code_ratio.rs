//! Comment-to-code ratio per repository.
//!
//! A line counts as code when it holds any token outside comments and
//! docstrings, as comment when it is covered by a `#` comment or a docstring,
//! and as blank otherwise.

use rusqlite::params;
use tree_sitter::{Node, Parser};

use crate::collaborators::Collaborator;
use crate::corpus::SourceLocator;
use crate::errors::SkeletonResult;
use crate::extract::docstring::docstring_node;
use crate::extract::parser::{parse_source, python_parser, read_source, ReadPolicy};
use crate::models::Repository;
use crate::store::{schema, ArtifactWriter};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub files: u64,
    pub code: u64,
    pub comment: u64,
    pub blank: u64,
}

impl LineCounts {
    /// `comment / (code + comment)`, absent when both are zero.
    pub fn ratio(&self) -> Option<f64> {
        let total = self.code + self.comment;
        (total > 0).then(|| self.comment as f64 / total as f64)
    }

    fn add(&mut self, other: LineCounts) {
        self.files += other.files;
        self.code += other.code;
        self.comment += other.comment;
        self.blank += other.blank;
    }
}

fn is_docstring(node: Node<'_>, source: &[u8]) -> bool {
    let Some(stmt) = node.parent() else {
        return false;
    };
    let Some(container) = stmt.parent() else {
        return false;
    };
    let first_in_body = matches!(container.kind(), "module" | "block")
        && container.named_child(0).is_some_and(|first| first.id() == stmt.id());
    first_in_body && docstring_node(stmt, source).is_some_and(|lit| lit.id() == node.id())
}

/// Count lines of one parsed file.
pub fn count_lines(parser: &mut Parser, source: &[u8]) -> SkeletonResult<LineCounts> {
    let tree = parse_source(parser, source)?;
    let text = String::from_utf8_lossy(source);
    let lines: Vec<&str> = text.lines().collect();
    let mut has_code = vec![false; lines.len()];
    let mut has_comment = vec![false; lines.len()];

    let mark = |flags: &mut Vec<bool>, node: Node<'_>| {
        let end = node.end_position().row.min(flags.len().saturating_sub(1));
        for row in node.start_position().row..=end {
            if let Some(flag) = flags.get_mut(row) {
                *flag = true;
            }
        }
    };

    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.kind() == "comment" {
            mark(&mut has_comment, node);
            continue;
        }
        if matches!(node.kind(), "string" | "concatenated_string") && is_docstring(node, source) {
            mark(&mut has_comment, node);
            continue;
        }
        if node.child_count() == 0 {
            if node.start_byte() < node.end_byte() {
                mark(&mut has_code, node);
            }
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }

    let mut counts = LineCounts {
        files: 1,
        ..LineCounts::default()
    };
    for (row, line) in lines.iter().enumerate() {
        if has_code[row] {
            counts.code += 1;
        } else if has_comment[row] {
            counts.comment += 1;
        } else if line.trim().is_empty() {
            counts.blank += 1;
        } else {
            counts.code += 1;
        }
    }
    Ok(counts)
}

pub struct CodeRatio<L> {
    locator: L,
    read_policy: ReadPolicy,
}

impl<L: SourceLocator> CodeRatio<L> {
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            read_policy: ReadPolicy::default(),
        }
    }

    pub fn measure(&self, parser: &mut Parser, repo: &Repository) -> LineCounts {
        let mut totals = LineCounts::default();
        for file in self.locator.locate(repo) {
            let counted = read_source(&file.path, self.read_policy)
                .map_err(Into::into)
                .and_then(|bytes| count_lines(parser, &bytes));
            match counted {
                Ok(counts) => totals.add(counts),
                Err(e) => {
                    tracing::warn!(repo = %repo.id, path = %file.relative_path, error = %e, "skipping file")
                }
            }
        }
        totals
    }
}

impl<L: SourceLocator> Collaborator for CodeRatio<L> {
    fn table(&self) -> &'static str {
        "code_ratio"
    }

    fn schema(&self) -> &'static [&'static str] {
        schema::CODE_RATIO_STATEMENTS
    }

    fn run(&self, repos: &[Repository], writer: &mut ArtifactWriter) -> SkeletonResult<usize> {
        let mut parser = python_parser()?;
        let measured: Vec<(&Repository, LineCounts)> = repos
            .iter()
            .map(|repo| (repo, self.measure(&mut parser, repo)))
            .collect();

        writer.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO code_ratio (repository, files, code_lines, comment_lines, blank_lines, ratio) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for (repo, counts) in &measured {
                stmt.execute(params![
                    repo.id,
                    counts.files as i64,
                    counts.code as i64,
                    counts.comment as i64,
                    counts.blank as i64,
                    counts.ratio(),
                ])?;
            }
            Ok(measured.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::DirectoryLayout;
    use rusqlite::Connection;

    fn counts(src: &str) -> LineCounts {
        let mut parser = python_parser().unwrap();
        count_lines(&mut parser, src.as_bytes()).unwrap()
    }

    #[test]
    fn classifies_comment_docstring_blank_and_code() {
        let src = "\"\"\"Module doc.\n\nMore.\n\"\"\"\n\
                   # leading comment\n\
                   import os  # trailing\n\
                   \n\
                   def f():\n\
                   \x20   \"\"\"Doc.\"\"\"\n\
                   \x20   return \"not a docstring\"\n";
        let c = counts(src);
        // 4 module docstring lines, 1 comment, 1 function docstring.
        assert_eq!(c.comment, 6);
        assert_eq!(c.blank, 1);
        assert_eq!(c.code, 3);
        assert_eq!(c.ratio(), Some(6.0 / 9.0));
    }

    #[test]
    fn empty_file_has_no_ratio() {
        let c = counts("");
        assert_eq!(c.code + c.comment + c.blank, 0);
        assert_eq!(c.ratio(), None);
    }

    #[test]
    fn writes_one_row_per_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("corpus").join("acme").join("widgets");
        std::fs::create_dir_all(&repo_dir).unwrap();
        std::fs::write(repo_dir.join("a.py"), "# c\nx = 1\n").unwrap();

        let job = CodeRatio::new(DirectoryLayout::new(dir.path().join("corpus")));
        let out = dir.path().join("ratio.db");
        let mut writer = ArtifactWriter::create(&out, job.schema()).unwrap();
        let repos = vec![Repository::new("acme/widgets"), Repository::new("acme/absent")];
        assert_eq!(job.run(&repos, &mut writer).unwrap(), 2);
        drop(writer);

        let conn = Connection::open(&out).unwrap();
        let (files, ratio): (i64, Option<f64>) = conn
            .query_row(
                "SELECT files, ratio FROM code_ratio WHERE repository = 'acme/widgets'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(files, 1);
        assert_eq!(ratio, Some(0.5));
        let absent: Option<f64> = conn
            .query_row(
                "SELECT ratio FROM code_ratio WHERE repository = 'acme/absent'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(absent.is_none());
    }
}
