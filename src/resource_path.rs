//! Provider-qualified resource paths.
//!
//! A resource path names the location of a media item's bytes: which media
//! provider serves it and the provider-internal path. The serialized form
//! (`provider://path`) is the join key stored in the provider-resource
//! aspect, so it must round-trip exactly and prefix-match byte-wise.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PATH_SEPARATOR: char = '/';
const PROVIDER_SEPARATOR: &str = "://";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath {
    provider: String,
    path: String,
}

impl ResourcePath {
    pub fn new(provider: impl Into<String>, path: impl Into<String>) -> Self {
        ResourcePath {
            provider: provider.into(),
            path: path.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stable string encoding, `provider://path`.
    pub fn serialize(&self) -> String {
        format!("{}{}{}", self.provider, PROVIDER_SEPARATOR, self.path)
    }

    /// Inverse of [`serialize`](Self::serialize).
    pub fn parse(s: &str) -> Result<Self> {
        let (provider, path) = s
            .split_once(PROVIDER_SEPARATOR)
            .ok_or_else(|| LibraryError::InvalidResourcePath(s.to_string()))?;
        if provider.is_empty() {
            return Err(LibraryError::InvalidResourcePath(s.to_string()));
        }
        Ok(ResourcePath::new(provider, path))
    }

    /// Append a child segment, collapsing duplicate separators.
    pub fn join(&self, segment: &str) -> ResourcePath {
        let base = self.path.trim_end_matches(PATH_SEPARATOR);
        let child = segment.trim_start_matches(PATH_SEPARATOR);
        ResourcePath::new(
            self.provider.clone(),
            format!("{}{}{}", base, PATH_SEPARATOR, child),
        )
    }

    /// True when `self` lies strictly under `base` (same provider, path
    /// begins with base + separator). A base of `/a/b` does not cover
    /// `/a/bc`.
    pub fn is_under(&self, base: &ResourcePath) -> bool {
        self.provider == base.provider
            && self
                .path
                .starts_with(&ensure_trailing_separator(&base.path))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.provider, PROVIDER_SEPARATOR, self.path)
    }
}

impl FromStr for ResourcePath {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        ResourcePath::parse(s)
    }
}

/// Normalize a path to end with exactly one separator. Used everywhere a
/// base path is prefix-compared against item paths.
pub fn ensure_trailing_separator(path: &str) -> String {
    let mut normalized = path.trim_end_matches(PATH_SEPARATOR).to_string();
    normalized.push(PATH_SEPARATOR);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trips() {
        let p = ResourcePath::new("local-fs", "/movies/a.mkv");
        assert_eq!(ResourcePath::parse(&p.serialize()).unwrap(), p);
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert!(ResourcePath::parse("no-separator").is_err());
        assert!(ResourcePath::parse("://missing-provider").is_err());
    }

    #[test]
    fn parse_keeps_everything_after_first_separator() {
        let p = ResourcePath::parse("smb://host/share://odd").unwrap();
        assert_eq!(p.provider(), "smb");
        assert_eq!(p.path(), "host/share://odd");
    }

    #[test]
    fn is_under_requires_full_segment_match() {
        let base = ResourcePath::new("fs", "/a/b");
        assert!(ResourcePath::new("fs", "/a/b/c.mkv").is_under(&base));
        assert!(!ResourcePath::new("fs", "/a/bc/c.mkv").is_under(&base));
        assert!(!ResourcePath::new("fs", "/a/b").is_under(&base));
        assert!(!ResourcePath::new("other", "/a/b/c.mkv").is_under(&base));
    }

    #[test]
    fn trailing_separator_is_not_duplicated() {
        assert_eq!(ensure_trailing_separator("/a/b/"), "/a/b/");
        assert_eq!(ensure_trailing_separator("/a/b"), "/a/b/");
    }

    #[test]
    fn join_collapses_separators() {
        let base = ResourcePath::new("fs", "/movies/");
        assert_eq!(base.join("/sub/a.mkv").path(), "/movies/sub/a.mkv");
    }
}
