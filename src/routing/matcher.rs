//! Path pattern matching.
//!
//! # Responsibilities
//! - Match request paths against configured patterns
//! - `/api/*` matches `/api` and everything below it
//! - `*` and `/*` match every path
//! - Anything else matches that exact path (a trailing `/` is ignored);
//!   `/` matches only the root
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Paths are matched after normalization (see `normalize.rs`)
//! - Prefixes respect segment boundaries: `/api/*` does not match `/apix`
//! - No regex to guarantee O(n) matching

/// A single compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `/base/*`: the base itself and every descendant.
    Subtree(String),
    /// `/base`: exactly that path.
    Exact(String),
}

impl PathPattern {
    /// Compile a pattern from its configured text.
    pub fn parse(pattern: &str) -> Self {
        if let Some(base) = pattern.strip_suffix("/*") {
            Self::Subtree(base.to_string())
        } else if pattern == "*" {
            Self::Subtree(String::new())
        } else {
            Self::Exact(trim_trailing_slash(pattern).to_string())
        }
    }

    /// Returns true if the path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Subtree(base) if base.is_empty() => true,
            Self::Subtree(base) => match path.strip_prefix(base.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
            Self::Exact(base) => trim_trailing_slash(path) == base,
        }
    }
}

/// `/a/` → `/a`, but `/` stays `/`.
fn trim_trailing_slash(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/",
        trimmed => trimmed,
    }
}

/// An ordered set of patterns combined with OR semantics.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    patterns: Vec<PathPattern>,
}

impl PathSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| PathPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// Returns true if any pattern matches.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
