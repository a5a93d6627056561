//! Class skeleton extraction from Python source.
//!
//! Walks a tree-sitter syntax tree, finds every class definition (top level,
//! nested in classes, functions, or compound statements) and renders a
//! skeleton from source slices: decorators and declaration up to the colon,
//! the class docstring, and for each method directly in the class body its
//! decorators, signature and leading docstring. Nothing else from a body is
//! copied; bodies without a docstring get a `...` stub.
//!
//! Slices keep their original indentation. [`crate::text::normalize`] is
//! responsible for making it uniform.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::extract::docstring::{docstring_node, docstring_text};
use crate::extract::parser::{describe_error, first_error, parse_source};
use crate::models::{ClassSkeletonRecord, ExtractionStatus, MethodRecord};
use crate::text::sanitize::sanitize_bytes;

const BODY_STUB: &str = "...";
const FALLBACK_INDENT: &str = "    ";

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());
static CLASS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^class\s+([^\W\d]\w*)").unwrap());
static CLASS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^class\s+[^\W\d]\w*\s*(?:\(([^()]*)\))?\s*:?$").unwrap()
});

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Convert a repository-relative file path to a dotted module name.
///
/// Strips the extension, skips `.`/root components and collapses a trailing
/// `__init__` onto its package.
pub fn to_module_name(path: &str) -> String {
    let p = Path::new(path);
    let without_ext = p.with_extension("");
    let mut parts: Vec<&str> = without_ext
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os) => os.to_str(),
            _ => None,
        })
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if parts.len() > 1 && parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

fn node_text(node: Node<'_>, source: &[u8]) -> String {
    sanitize_bytes(&source[node.byte_range()]).into_owned()
}

/// Node text with embedded line breaks folded to single spaces.
fn flat_text(node: Node<'_>, source: &[u8]) -> String {
    LINE_BREAK_RE
        .replace_all(&node_text(node, source), " ")
        .into_owned()
}

fn line_start(source: &[u8], byte: usize) -> usize {
    source[..byte]
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Leading whitespace of the line `node` starts on, if only whitespace
/// precedes the node on that line.
fn own_line_indent(node: Node<'_>, source: &[u8]) -> Option<String> {
    let start = node.start_byte();
    let prefix = &source[line_start(source, start)..start];
    prefix
        .iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\x0c'))
        .then(|| sanitize_bytes(prefix).into_owned())
}

/// Indentation to render `node` with: its own line's indentation when it
/// starts on a fresh line after `after_row`, otherwise `fallback`.
fn indent_for(node: Node<'_>, source: &[u8], after_row: usize, fallback: &str) -> String {
    if node.start_position().row > after_row {
        if let Some(indent) = own_line_indent(node, source) {
            return indent;
        }
    }
    fallback.to_string()
}

/// The `:` token ending a class or function header. A colon inserted by
/// error recovery does not count.
fn header_colon(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let colon = node
        .children(&mut cursor)
        .find(|c| c.kind() == ":" && !c.is_missing());
    colon
}

/// `decorated_definition` wrapper if present, else the node itself.
fn outer_definition(node: Node<'_>) -> Node<'_> {
    match node.parent() {
        Some(parent) if parent.kind() == "decorated_definition" => parent,
        _ => node,
    }
}

fn decorators(outer: Node<'_>, source: &[u8]) -> Vec<String> {
    if outer.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut cursor = outer.walk();
    let found = outer
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|c| flat_text(c, source).trim_start_matches('@').trim().to_string())
        .collect();
    found
}

fn body_statements<'tree>(body: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = body.walk();
    let statements = body
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect();
    statements
}

// ---------------------------------------------------------------------------
// Repaired class headers
// ---------------------------------------------------------------------------

/// Declaration rebuilt from the `class` keyword's line when tree-sitter had
/// to recover inside the header.
struct RepairedHeader {
    name: String,
    declaration: String,
    bases: Vec<String>,
}

/// True when the parsed header cannot be trusted: the name sits on another
/// line than `class`, or a syntax error precedes the header's end.
fn header_needs_repair(class: Node<'_>) -> bool {
    let Some(name) = class.child_by_field_name("name") else {
        return true;
    };
    if name.start_position().row != class.start_position().row {
        return true;
    }
    let header_end = header_colon(class)
        .map(|c| c.start_byte())
        .or_else(|| class.child_by_field_name("body").map(|b| b.start_byte()))
        .unwrap_or_else(|| class.end_byte());
    first_error(class).is_some_and(|err| err.start_byte() <= header_end)
}

fn repair_header(class: Node<'_>, source: &[u8]) -> Option<RepairedHeader> {
    let start = class.start_byte();
    let end = source[start..]
        .iter()
        .position(|b| *b == b'\n')
        .map(|i| start + i)
        .unwrap_or(source.len());
    let line = sanitize_bytes(&source[start..end]);
    let line = line.trim_end();

    let name = CLASS_NAME_RE.captures(line)?.get(1)?.as_str().to_string();
    let (declaration, bases) = match CLASS_LINE_RE.captures(line) {
        Some(caps) => {
            let bases: Vec<String> = caps
                .get(1)
                .map(|args| {
                    args.as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|b| !b.is_empty() && !b.contains('=') && !b.starts_with('*'))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            (format!("{}:", line.trim_end_matches(':').trim_end()), bases)
        }
        None => (format!("class {name}:"), Vec::new()),
    };
    Some(RepairedHeader {
        name,
        declaration,
        bases,
    })
}

/// Name a class is recorded and scoped under.
fn class_name(class: Node<'_>, source: &[u8]) -> Option<String> {
    if header_needs_repair(class) {
        repair_header(class, source).map(|h| h.name)
    } else {
        class.child_by_field_name("name").map(|n| node_text(n, source))
    }
}

// ---------------------------------------------------------------------------
// Skeleton assembly
// ---------------------------------------------------------------------------

/// Raw skeleton being assembled for one class.
struct SkeletonText {
    source_lines: Vec<String>,
}

impl SkeletonText {
    fn new() -> Self {
        Self {
            source_lines: Vec::new(),
        }
    }

    fn push(&mut self, indent: &str, text: &str) {
        self.source_lines.push(format!("{indent}{text}"));
    }

    fn blank(&mut self) {
        self.source_lines.push(String::new());
    }

    fn finish(self) -> String {
        self.source_lines.join("\n")
    }
}

/// Header slice from the first decorator (or keyword) up to the colon.
/// Without a colon the slice stops at `fallback_end` and is marked incomplete.
fn header_slice(
    outer: Node<'_>,
    node: Node<'_>,
    source: &[u8],
    fallback_end: usize,
) -> (String, Option<usize>, bool) {
    match header_colon(node) {
        Some(colon) => (
            sanitize_bytes(&source[outer.start_byte()..colon.end_byte()]).into_owned(),
            Some(colon.end_position().row),
            true,
        ),
        None => {
            let end = fallback_end.max(outer.start_byte());
            (
                format!("{}:", sanitize_bytes(&source[outer.start_byte()..end]).trim_end()),
                None,
                false,
            )
        }
    }
}

/// Docstring literal and cleaned text of a block, when present.
fn block_docstring<'tree>(
    body: Option<Node<'tree>>,
    source: &[u8],
) -> (Option<Node<'tree>>, Option<String>) {
    let Some(first) = body.and_then(|b| body_statements(b).into_iter().next()) else {
        return (None, None);
    };
    match docstring_node(first, source) {
        Some(literal) => (Some(literal), docstring_text(literal, source)),
        None => (None, None),
    }
}

// ---------------------------------------------------------------------------
// Per-class extraction
// ---------------------------------------------------------------------------

struct ClassCapture {
    record: ClassSkeletonRecord,
    complete: bool,
}

fn extract_method(
    func: Node<'_>,
    source: &[u8],
    skeleton: &mut SkeletonText,
    after_row: usize,
    member_indent: &str,
) -> Option<MethodRecord> {
    let name = func.child_by_field_name("name")?;
    let outer = outer_definition(func);
    let params = func.child_by_field_name("parameters");
    let body = func.child_by_field_name("body");

    let fallback_end = params.map(|p| p.end_byte()).unwrap_or_else(|| name.end_byte());
    let (header, colon_row, _) = header_slice(outer, func, source, fallback_end);
    let indent = indent_for(outer, source, after_row, member_indent);
    skeleton.blank();
    skeleton.push(&indent, &header);

    let header_row = colon_row.unwrap_or(func.start_position().row);
    let body_indent_fallback = format!("{indent}{FALLBACK_INDENT}");
    let (literal, docstring) = block_docstring(body, source);
    match literal {
        Some(lit) => {
            let doc_indent = indent_for(lit, source, header_row, &body_indent_fallback);
            skeleton.push(&doc_indent, &node_text(lit, source));
        }
        None => {
            let stub_indent = body
                .and_then(|b| body_statements(b).into_iter().next())
                .map(|s| indent_for(s, source, header_row, &body_indent_fallback))
                .unwrap_or(body_indent_fallback);
            skeleton.push(&stub_indent, BODY_STUB);
        }
    }

    let parameters = params
        .map(|p| {
            let mut cursor = p.walk();
            let items: Vec<String> = p
                .named_children(&mut cursor)
                .filter(|c| c.kind() != "comment")
                .map(|c| flat_text(c, source))
                .collect();
            format!("({})", items.join(", "))
        })
        .unwrap_or_else(|| "()".to_string());

    let mut cursor = func.walk();
    let is_async = func.children(&mut cursor).any(|c| c.kind() == "async");

    Some(MethodRecord {
        name: node_text(name, source),
        parameters,
        return_annotation: func
            .child_by_field_name("return_type")
            .map(|r| flat_text(r, source)),
        decorators: decorators(outer, source),
        is_async,
        docstring,
    })
}

/// Function definitions sitting directly in a class body.
fn direct_methods<'tree>(body: Node<'tree>) -> Vec<Node<'tree>> {
    body_statements(body)
        .into_iter()
        .filter_map(|stmt| match stmt.kind() {
            "function_definition" => Some(stmt),
            "decorated_definition" => stmt
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        })
        .collect()
}

fn extract_class(
    class: Node<'_>,
    source: &[u8],
    repository: &str,
    file_path: &str,
    scope: &str,
) -> Option<ClassCapture> {
    let outer = outer_definition(class);
    let superclasses = class.child_by_field_name("superclasses");
    let body = class.child_by_field_name("body");

    let mut skeleton = SkeletonText::new();
    let class_indent = own_line_indent(outer, source).unwrap_or_default();
    let repaired = header_needs_repair(class);

    let (name, colon_row, has_colon, bases) = if repaired {
        // Everything after the keyword's line is left to the body.
        let header = repair_header(class, source)?;
        let decorators = sanitize_bytes(&source[outer.start_byte()..class.start_byte()]);
        skeleton.push(&class_indent, &format!("{decorators}{}", header.declaration));
        (header.name, Some(class.start_position().row), false, header.bases)
    } else {
        let name_node = class.child_by_field_name("name")?;
        let fallback_end = superclasses
            .map(|s| s.end_byte())
            .unwrap_or_else(|| name_node.end_byte());
        let (header, colon_row, has_colon) = header_slice(outer, class, source, fallback_end);
        skeleton.push(&class_indent, &header);

        let bases = superclasses
            .map(|s| {
                let mut cursor = s.walk();
                let positional: Vec<String> = s
                    .named_children(&mut cursor)
                    .filter(|c| {
                        !matches!(
                            c.kind(),
                            "keyword_argument" | "dictionary_splat" | "comment"
                        )
                    })
                    .map(|c| flat_text(c, source))
                    .collect();
                positional
            })
            .unwrap_or_default();
        (node_text(name_node, source), colon_row, has_colon, bases)
    };

    let header_row = colon_row.unwrap_or(class.start_position().row);
    let member_indent = format!("{class_indent}{FALLBACK_INDENT}");
    let (literal, docstring) = block_docstring(body, source);
    let mut last_row = header_row;
    if let Some(lit) = literal {
        let doc_indent = indent_for(lit, source, header_row, &member_indent);
        skeleton.push(&doc_indent, &node_text(lit, source));
        last_row = lit.end_position().row;
    }

    let mut methods = Vec::new();
    if let Some(block) = body {
        let members = direct_methods(block)
            .into_iter()
            .filter(|f| f.start_position().row > header_row);
        for func in members {
            if let Some(method) = extract_method(func, source, &mut skeleton, last_row, &member_indent)
            {
                methods.push(method);
            }
            last_row = func.end_position().row;
        }
    }

    if literal.is_none() && methods.is_empty() {
        let stub_indent = body
            .and_then(|b| body_statements(b).into_iter().next())
            .map(|s| indent_for(s, source, header_row, &member_indent))
            .unwrap_or(member_indent);
        skeleton.push(&stub_indent, BODY_STUB);
    }

    let mut diagnostics = Vec::new();
    if let Some(err) = first_error(class) {
        diagnostics.push(describe_error(err));
    }
    if !has_colon {
        diagnostics.push("class header is incomplete".to_string());
    }
    if body.is_none() {
        diagnostics.push("class body could not be parsed".to_string());
    }
    let status = if diagnostics.is_empty() {
        ExtractionStatus::Ok
    } else {
        ExtractionStatus::Partial
    };

    let qualified_name = if scope.is_empty() {
        name.clone()
    } else {
        format!("{scope}.{name}")
    };

    Some(ClassCapture {
        complete: (has_colon || repaired) && body.is_some(),
        record: ClassSkeletonRecord {
            repository: repository.to_string(),
            file_path: file_path.to_string(),
            class_name: Some(name),
            qualified_name: Some(qualified_name),
            start_line: Some(outer.start_position().row as i64 + 1),
            end_line: Some(class.end_position().row as i64 + 1),
            bases,
            docstring,
            methods,
            skeleton: skeleton.finish(),
            status,
            diagnostic: (!diagnostics.is_empty()).then(|| diagnostics.join("; ")),
            content_hash: None,
        },
    })
}

// ---------------------------------------------------------------------------
// Tree walk
// ---------------------------------------------------------------------------

/// Every class definition in source order, paired with its dotted scope.
///
/// Iterative so that deeply nested expressions cannot exhaust the stack.
fn collect_classes<'tree>(
    root: Node<'tree>,
    source: &[u8],
    module: &str,
) -> Vec<(Node<'tree>, String)> {
    let mut found = Vec::new();
    let mut stack: Vec<(Node<'tree>, String)> = vec![(root, module.to_string())];

    while let Some((node, scope)) = stack.pop() {
        let child_scope = match node.kind() {
            kind @ ("class_definition" | "function_definition") => {
                let name = if kind == "class_definition" {
                    class_name(node, source)
                } else {
                    node.child_by_field_name("name").map(|n| node_text(n, source))
                };
                match name {
                    Some(name) => {
                        if kind == "class_definition" {
                            found.push((node, scope.clone()));
                        }
                        if scope.is_empty() {
                            name
                        } else {
                            format!("{scope}.{name}")
                        }
                    }
                    None => scope,
                }
            }
            _ => scope,
        };

        let mut cursor = node.walk();
        let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push((child, child_scope.clone()));
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Extract skeleton records from one file's raw bytes.
///
/// Never fails: a file that cannot be parsed yields one `failed` record, a
/// class containing syntax errors yields a `partial` record.
pub fn extract_classes(
    parser: &mut Parser,
    source: &[u8],
    repository: &str,
    file_path: &str,
) -> Vec<ClassSkeletonRecord> {
    let tree = match parse_source(parser, source) {
        Ok(tree) => tree,
        Err(e) => {
            return vec![ClassSkeletonRecord::failed(
                repository,
                file_path,
                e.to_string(),
            )]
        }
    };
    let root = tree.root_node();
    let module = to_module_name(file_path);

    let captures: Vec<ClassCapture> = collect_classes(root, source, &module)
        .into_iter()
        .filter_map(|(node, scope)| extract_class(node, source, repository, file_path, &scope))
        .collect();

    if root.has_error() && !captures.iter().any(|c| c.complete) {
        let diagnostic = first_error(root)
            .map(describe_error)
            .unwrap_or_else(|| "syntax error".to_string());
        tracing::debug!(repo = %repository, path = %file_path, %diagnostic, "file failed to parse");
        return vec![ClassSkeletonRecord::failed(
            repository,
            file_path,
            format!("{diagnostic}: no class definition could be recovered"),
        )];
    }

    captures.into_iter().map(|c| c.record).collect()
}
