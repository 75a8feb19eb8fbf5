//! Struct tag lookup with the conventional `key:"value" key2:"value2"` syntax.

use crate::lexer::unquote;

/// Returns the value stored under `key`, or `None` when the key is absent
/// or the tag is malformed before it is reached.
pub fn lookup(tag: &str, key: &str) -> Option<String> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }
        let name_len = rest
            .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
            .unwrap_or(rest.len());
        if name_len == 0 || !rest[name_len..].starts_with(":\"") {
            return None;
        }
        let name = &rest[..name_len];
        rest = &rest[name_len + 1..];

        // Scan to the closing quote, honoring escapes.
        let bytes = rest.as_bytes();
        let mut i = 1;
        while i < bytes.len() && bytes[i] != b'"' {
            if bytes[i] == b'\\' {
                i += 1;
            }
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        let quoted = &rest[..=i];
        rest = &rest[i + 1..];
        if name == key {
            return unquote(quoted);
        }
    }
}

/// The name part of the value under `key`, with options such as
/// `,omitempty` removed.
pub fn name(tag: &str, key: &str) -> Option<String> {
    lookup(tag, key).map(|v| match v.split_once(',') {
        Some((name, _)) => name.to_string(),
        None => v,
    })
}
