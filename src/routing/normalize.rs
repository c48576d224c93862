//! Request path normalization.
//!
//! Gates match on the normalized path and the same path is forwarded, so an
//! upstream cannot see a different resource than the one that was checked.
//!
//! # Rules
//! - Percent-encoded unreserved characters (`A-Z a-z 0-9 - . _ ~`) are decoded;
//!   every other escape is kept with upper-case hex digits
//! - Encoded separators (`%2F`, `%5C`), raw backslashes and broken escapes
//!   are rejected
//! - Runs of `/` collapse to one
//! - `.` and `..` segments are resolved; `..` never climbs above the root
//! - A trailing `/` is kept

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed percent-encoding")]
    BadEscape,

    #[error("encoded path separator")]
    EncodedSeparator,

    #[error("backslash in path")]
    Backslash,
}

/// Canonical form of `path`.
pub fn normalize_path(path: &str) -> Result<String, PathError> {
    let decoded = decode_unreserved(path)?;

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in decoded.split('/') {
        match segment {
            "" => {}
            "." => trailing_slash = true,
            ".." => {
                segments.pop();
                trailing_slash = true;
            }
            s => {
                segments.push(s);
                trailing_slash = false;
            }
        }
    }
    if decoded.ends_with('/') {
        trailing_slash = true;
    }

    if segments.is_empty() {
        return Ok("/".to_string());
    }
    let mut out = String::with_capacity(decoded.len());
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    if trailing_slash {
        out.push('/');
    }
    Ok(out)
}

fn decode_unreserved(path: &str) -> Result<String, PathError> {
    if path.contains('\\') {
        return Err(PathError::Backslash);
    }

    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            // `path` is a &str and `%` is ASCII, so this slice is on a boundary
            let next = path[i..].find('%').map_or(path.len(), |n| i + n);
            out.push_str(&path[i..next]);
            i = next;
            continue;
        }

        let hi = bytes.get(i + 1).and_then(|b| hex_value(*b));
        let lo = bytes.get(i + 2).and_then(|b| hex_value(*b));
        let (Some(hi), Some(lo)) = (hi, lo) else {
            return Err(PathError::BadEscape);
        };
        let byte = hi << 4 | lo;
        match byte {
            b'/' | b'\\' => return Err(PathError::EncodedSeparator),
            b if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') => {
                out.push(b as char)
            }
            b => out.push_str(&format!("%{:02X}", b)),
        }
        i += 3;
    }
    Ok(out)
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(path: &str) -> String {
        normalize_path(path).unwrap()
    }

    #[test]
    fn test_canonical_paths_are_unchanged() {
        for path in ["/", "/api/items", "/api/items/", "/a%20b", "/caf%C3%A9"] {
            assert_eq!(norm(path), path);
        }
    }

    #[test]
    fn test_repeated_slashes_collapse() {
        assert_eq!(norm("//api/items"), "/api/items");
        assert_eq!(norm("/api///items//"), "/api/items/");
        assert_eq!(norm(""), "/");
    }

    #[test]
    fn test_unreserved_escapes_are_decoded() {
        assert_eq!(norm("/%61pi/items"), "/api/items");
        assert_eq!(norm("/api/%7euser"), "/api/~user");
        assert_eq!(norm("/a%2db%5Fc"), "/a-b_c");
        // reserved and non-ASCII stay encoded, hex upper-cased
        assert_eq!(norm("/a%3fb"), "/a%3Fb");
        assert_eq!(norm("/caf%c3%a9"), "/caf%C3%A9");
    }

    #[test]
    fn test_dot_segments_resolve() {
        assert_eq!(norm("/api/../api/items"), "/api/items");
        assert_eq!(norm("/public/../api/items"), "/api/items");
        assert_eq!(norm("/./api/./items"), "/api/items");
        assert_eq!(norm("/%2e%2e/api/items"), "/api/items");
        assert_eq!(norm("/../../api"), "/api");
        assert_eq!(norm("/api/items/.."), "/api/");
        assert_eq!(norm("/api/.."), "/");
    }

    #[test]
    fn test_ambiguous_paths_are_rejected() {
        assert_eq!(normalize_path("/api%2Fitems"), Err(PathError::EncodedSeparator));
        assert_eq!(normalize_path("/api%5citems"), Err(PathError::EncodedSeparator));
        assert_eq!(normalize_path("/api\\items"), Err(PathError::Backslash));
        assert_eq!(normalize_path("/api/%zz"), Err(PathError::BadEscape));
        assert_eq!(normalize_path("/api/%4"), Err(PathError::BadEscape));
    }
}
