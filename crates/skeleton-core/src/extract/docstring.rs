//! Docstring detection and cleanup.

use tree_sitter::Node;

use crate::text::sanitize::sanitize_bytes;

/// Return the string literal node if `stmt` is a bare string expression that
/// Python would treat as a docstring. Byte strings and f-strings are not.
pub fn docstring_node<'tree>(stmt: Node<'tree>, source: &[u8]) -> Option<Node<'tree>> {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let literal = stmt.named_child(0)?;
    match literal.kind() {
        "string" if is_plain_string(literal, source) => Some(literal),
        "concatenated_string" => {
            let mut cursor = literal.walk();
            let all_plain = literal
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "string")
                .all(|c| is_plain_string(c, source));
            all_plain.then_some(literal)
        }
        _ => None,
    }
}

fn string_prefix(literal: &[u8]) -> &[u8] {
    let end = literal
        .iter()
        .position(|b| *b == b'"' || *b == b'\'')
        .unwrap_or(literal.len());
    &literal[..end]
}

fn is_plain_string(node: Node<'_>, source: &[u8]) -> bool {
    let prefix = string_prefix(&source[node.byte_range()]);
    !prefix
        .iter()
        .any(|b| matches!(b, b'b' | b'B' | b'f' | b'F'))
}

/// Strip prefix letters and quotes from one string literal.
fn literal_content(literal: &str) -> &str {
    let body = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body.strip_prefix(quote) {
            return inner.strip_suffix(quote).unwrap_or(inner);
        }
    }
    body
}

/// Cleaned docstring text for a string or concatenated-string node.
///
/// Follows `inspect.cleandoc`: tabs expanded, first line stripped, common
/// indentation removed from the remaining lines, and leading/trailing blank
/// lines dropped. Escape sequences are kept as written. Empty docstrings are
/// reported as absent.
pub fn docstring_text(literal: Node<'_>, source: &[u8]) -> Option<String> {
    let raw = if literal.kind() == "concatenated_string" {
        let mut cursor = literal.walk();
        let joined: String = literal
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "string")
            .map(|c| literal_content(&sanitize_bytes(&source[c.byte_range()])).to_string())
            .collect();
        joined
    } else {
        literal_content(&sanitize_bytes(&source[literal.byte_range()])).to_string()
    };
    let cleaned = clean_docstring(&raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

pub fn clean_docstring(raw: &str) -> String {
    let lines: Vec<String> = raw.lines().map(expand_tabs).collect();
    if lines.is_empty() {
        return String::new();
    }

    let margin = lines[1..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_spaces(l))
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    cleaned.push(lines[0].trim_start());
    for line in &lines[1..] {
        let cut = margin.min(leading_spaces(line));
        cleaned.push(&line[cut..]);
    }

    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    let start = cleaned
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(cleaned.len());
    cleaned[start..]
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - col % 8;
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(c);
            col += 1;
        }
    }
    out
}
