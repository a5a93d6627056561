//! Skeleton re-indentation.
//!
//! Every logical line is re-indented to `level * INDENT_UNIT` spaces, where
//! the level comes from a Python-tokenizer style indent stack. Physical lines
//! that continue a logical line (open brackets, backslash continuations,
//! multi-line strings such as docstrings) keep their layout relative to the
//! logical line's first line: if they start with that line's original
//! indentation, only that prefix is swapped for the new indentation. Lines
//! that do not share the prefix are left untouched.

use crate::text::lexer::{indent_width, split_indent, LineScanner};

pub const INDENT_UNIT: usize = 4;

/// Re-indent skeleton text to a uniform indent unit.
pub fn normalize_skeleton(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut scanner = LineScanner::new();
    let mut stack: Vec<usize> = Vec::new();
    // Original and rewritten indentation of the current logical line.
    let mut logical: (String, String) = (String::new(), String::new());
    let mut out: Vec<String> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        let continuation = scanner.continues();
        let inside_string = scanner.in_string();
        scanner.feed(line);

        if continuation {
            out.push(rebase(line, &logical.0, &logical.1, inside_string));
            continue;
        }

        let (indent, content) = split_indent(line);
        if content.is_empty() {
            out.push(String::new());
            continue;
        }

        let width = indent_width(indent);
        let level = if content.starts_with('#') {
            peek_level(&stack, width)
        } else {
            push_level(&mut stack, width)
        };
        let new_indent = " ".repeat(level * INDENT_UNIT);
        logical = (indent.to_string(), new_indent.clone());
        // Trailing whitespace of a line that opens a string belongs to the literal.
        let content = if scanner.in_string() {
            content
        } else {
            content.trim_end()
        };
        out.push(format!("{new_indent}{content}"));
    }

    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

/// Move a continuation line along with its logical line.
fn rebase(line: &str, old_indent: &str, new_indent: &str, inside_string: bool) -> String {
    if let Some(rest) = line.strip_prefix(old_indent) {
        if !rest.is_empty() || inside_string {
            return format!("{new_indent}{rest}");
        }
    }
    if !inside_string && line.trim().is_empty() {
        return String::new();
    }
    line.to_string()
}

/// Level for a logical line, updating the indent stack.
///
/// A dedent that matches no enclosing level snaps to the shallowest level
/// that is still at least as deep as the line, so a stray method stays
/// inside its class block.
fn push_level(stack: &mut Vec<usize>, width: usize) -> usize {
    match stack.last() {
        None => {
            stack.push(width);
            0
        }
        Some(&top) if width > top => {
            stack.push(width);
            stack.len() - 1
        }
        Some(_) => {
            let level = peek_level(stack, width);
            stack.truncate(level + 1);
            level
        }
    }
}

/// Level a line would get, without touching the stack.
fn peek_level(stack: &[usize], width: usize) -> usize {
    match stack.last() {
        None => 0,
        Some(&top) if width > top => stack.len(),
        Some(_) => stack.iter().position(|&w| w >= width).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_become_four_spaces() {
        let raw = "class A:\n\tdef f(self):\n\t\t...\n";
        assert_eq!(
            normalize_skeleton(raw),
            "class A:\n    def f(self):\n        ...\n"
        );
    }

    #[test]
    fn two_space_indent_is_widened() {
        let raw = "class A(Base):\n  def f(self, x):\n    ...\n  def g(self):\n    ...";
        assert_eq!(
            normalize_skeleton(raw),
            "class A(Base):\n    def f(self, x):\n        ...\n    def g(self):\n        ..."
        );
    }

    #[test]
    fn nested_class_is_dedented_to_column_zero() {
        let raw = "        class Inner:\n            def f(self):\n                ...";
        assert_eq!(
            normalize_skeleton(raw),
            "class Inner:\n    def f(self):\n        ..."
        );
    }

    #[test]
    fn docstring_body_keeps_relative_layout() {
        let raw = "class A:\n  \"\"\"Summary.\n\n  Example:\n      >>> A()\n  \"\"\"\n  def f(self):\n    ...";
        let expected = "class A:\n    \"\"\"Summary.\n\n    Example:\n        >>> A()\n    \"\"\"\n    def f(self):\n        ...";
        assert_eq!(normalize_skeleton(raw), expected);
    }

    #[test]
    fn docstring_lines_outdented_past_opener_are_left_alone() {
        let raw = "class A:\n    \"\"\"Summary.\nflush left\n    \"\"\"";
        assert_eq!(normalize_skeleton(raw), raw);
    }

    #[test]
    fn multi_line_signature_moves_with_its_def() {
        let raw = "class A:\n\tdef f(self,\n\t      a,\n\t      b):\n\t\t...";
        let expected = "class A:\n    def f(self,\n          a,\n          b):\n        ...";
        assert_eq!(normalize_skeleton(raw), expected);
    }

    #[test]
    fn inconsistent_dedent_snaps_to_enclosing_level() {
        let raw = "class A:\n    def f(self):\n        ...\n  def g(self):\n        ...";
        let expected = "class A:\n    def f(self):\n        ...\n    def g(self):\n        ...";
        assert_eq!(normalize_skeleton(raw), expected);
    }

    #[test]
    fn blank_lines_are_emptied() {
        let raw = "class A:\n    \n    def f(self):\n        ...";
        assert_eq!(
            normalize_skeleton(raw),
            "class A:\n\n    def f(self):\n        ..."
        );
    }

    #[test]
    fn normalizing_is_idempotent() {
        let samples = [
            "class A:\n\tdef f(self):\n\t\t...\n",
            "  class B(C,\n          D):\n    '''Doc\n\n       more'''\n    def g(self): ...\n",
            "class A:\n    \"\"\"Summary.\nflush left\n    \"\"\"\n  def h(self):\n\t...",
            "class A:\n    # note\n    def f(self):\n        ...",
        ];
        for sample in samples {
            let once = normalize_skeleton(sample);
            assert_eq!(normalize_skeleton(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn docstring_opening_line_keeps_trailing_spaces() {
        let raw = "class A:\n  \"\"\"Summary.   \n\n  Details.\n  \"\"\"\n  def f(self):\n    ...";
        assert_eq!(
            normalize_skeleton(raw),
            "class A:\n    \"\"\"Summary.   \n\n    Details.\n    \"\"\"\n    def f(self):\n        ..."
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize_skeleton(""), "");
    }
}
