//! Encoding repair for text fields.
//!
//! Both entry points are total: every byte sequence and every string maps to
//! valid UTF-8 without NUL characters. Invalid sequences and NUL become
//! U+FFFD, so sanitizing sanitized text changes nothing.

use std::borrow::Cow;

pub const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

/// Decode arbitrary bytes, substituting every invalid UTF-8 sequence.
pub fn sanitize_bytes(bytes: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => sanitize_text(s),
        Cow::Owned(s) => Cow::Owned(sanitize_text(&s).into_owned()),
    }
}

/// Replace characters that downstream text cells cannot hold.
pub fn sanitize_text(text: &str) -> Cow<'_, str> {
    if text.contains('\0') {
        Cow::Owned(text.replace('\0', &REPLACEMENT.to_string()))
    } else {
        Cow::Borrowed(text)
    }
}

/// Owned convenience used when rewriting record fields in place.
pub fn sanitize_field(text: &str) -> String {
    sanitize_text(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_text_is_borrowed_unchanged() {
        let text = "class Foo:\n    \"\"\"Caf\u{e9}.\"\"\"";
        assert!(matches!(sanitize_text(text), Cow::Borrowed(_)));
        assert_eq!(sanitize_text(text), text);
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let bytes = b"abc\xff\xfedef";
        let out = sanitize_bytes(bytes);
        assert_eq!(out, "abc\u{fffd}\u{fffd}def");
    }

    #[test]
    fn truncated_multibyte_sequence_is_replaced() {
        // First two bytes of a three-byte sequence, then ASCII.
        let out = sanitize_bytes(b"x\xe2\x82y");
        assert_eq!(out, "x\u{fffd}y");
    }

    #[test]
    fn nul_is_replaced() {
        assert_eq!(sanitize_text("a\0b"), "a\u{fffd}b");
        assert_eq!(sanitize_bytes(b"a\x00b"), "a\u{fffd}b");
    }

    #[test]
    fn latin1_bytes_are_total() {
        let all: Vec<u8> = (0u8..=255).collect();
        let out = sanitize_bytes(&all);
        assert!(!out.contains('\0'));
        assert!(out.contains(REPLACEMENT));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples: [&[u8]; 4] = [b"plain", b"\xc3\x28bad", b"nul\x00here", b"\xf0\x9f\x98"];
        for sample in samples {
            let once = sanitize_bytes(sample).into_owned();
            let twice = sanitize_bytes(once.as_bytes()).into_owned();
            assert_eq!(once, twice);
            assert_eq!(sanitize_field(&once), once);
        }
    }
}
