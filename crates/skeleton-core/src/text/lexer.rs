//! Minimal line-oriented Python lexer.
//!
//! Tracks just enough state across lines to tell whether the next physical
//! line starts a new logical line: open brackets, open string literals
//! (including triple-quoted docstrings), and explicit backslash continuations.
//! Malformed input never errors; unterminated single-quoted strings are closed
//! at end of line, the way the Python tokenizer recovers.

const TAB_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpenString {
    quote: u8,
    triple: bool,
}

#[derive(Clone, Debug, Default)]
pub struct LineScanner {
    bracket_depth: usize,
    open_string: Option<OpenString>,
    backslash: bool,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the next line to be fed continues the current logical line.
    pub fn continues(&self) -> bool {
        self.bracket_depth > 0 || self.open_string.is_some() || self.backslash
    }

    /// True while inside a multi-line string literal.
    pub fn in_string(&self) -> bool {
        self.open_string.is_some()
    }

    /// Advance the lexer state over one physical line (without its newline).
    pub fn feed(&mut self, line: &str) {
        let bytes = line.trim_end_matches('\r').as_bytes();
        let len = bytes.len();
        let mut i = 0;
        self.backslash = false;

        while i < len {
            if let Some(open) = self.open_string {
                match bytes[i] {
                    b'\\' => {
                        i += 2;
                    }
                    q if q == open.quote => {
                        if !open.triple {
                            self.open_string = None;
                            i += 1;
                        } else if i + 2 < len && bytes[i + 1] == q && bytes[i + 2] == q {
                            self.open_string = None;
                            i += 3;
                        } else {
                            i += 1;
                        }
                    }
                    _ => i += 1,
                }
                continue;
            }

            match bytes[i] {
                b'#' => break,
                b'(' | b'[' | b'{' => self.bracket_depth += 1,
                b')' | b']' | b'}' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
                q @ (b'\'' | b'"') => {
                    let triple = i + 2 < len && bytes[i + 1] == q && bytes[i + 2] == q;
                    self.open_string = Some(OpenString { quote: q, triple });
                    i += if triple { 3 } else { 1 };
                    continue;
                }
                b'\\' if i + 1 == len => self.backslash = true,
                _ => {}
            }
            i += 1;
        }

        if let Some(open) = self.open_string {
            // A trailing backslash inside the literal skips past the end.
            if !open.triple && i <= len {
                self.open_string = None;
            }
        }
    }
}

/// Split a line into its leading whitespace and the rest.
pub fn split_indent(line: &str) -> (&str, &str) {
    let rest = line.trim_start_matches([' ', '\t', '\x0c']);
    line.split_at(line.len() - rest.len())
}

/// Column width of leading whitespace, expanding tabs the way the Python
/// tokenizer does. Form feeds reset the column.
pub fn indent_width(indent: &str) -> usize {
    indent.chars().fold(0, |col, c| match c {
        '\t' => (col / TAB_SIZE + 1) * TAB_SIZE,
        '\x0c' => 0,
        _ => col + 1,
    })
}
