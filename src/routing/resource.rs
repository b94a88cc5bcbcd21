//! Parsed request target.
//!
//! # Responsibilities
//! - Split a raw request target into path, query string and fragment
//! - Keep the raw text so forwarding and logging see exactly what arrived
//!
//! # Design Decisions
//! - Fragment is cut first, then the query string (a `?` inside the fragment
//!   belongs to the fragment)
//! - Immutable once constructed; `path() + search() + hash() == raw()`

use std::fmt;

/// A request target split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    raw: String,
    path: String,
    search: String,
    hash: String,
}

impl Resource {
    /// Parse a raw request target such as `/a/b?x=1#frag`.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();

        let (rest, hash) = match raw.find('#') {
            Some(pos) => (&raw[..pos], &raw[pos..]),
            None => (raw.as_str(), ""),
        };
        let (path, search) = match rest.find('?') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        Self {
            path: path.to_string(),
            search: search.to_string(),
            hash: hash.to_string(),
            raw,
        }
    }

    /// Parse a target, prepending `/` when the client omitted it.
    pub fn from_target(target: &str) -> Self {
        if target.starts_with('/') {
            Self::parse(target)
        } else {
            Self::parse(format!("/{}", target))
        }
    }

    /// The target exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The path with query string and fragment removed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query string including the leading `?`, or empty.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// The fragment including the leading `#`, or empty.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_query_and_fragment() {
        let res = Resource::parse("/a/b?x=1#frag");
        assert_eq!(res.path(), "/a/b");
        assert_eq!(res.search(), "?x=1");
        assert_eq!(res.hash(), "#frag");
        assert_eq!(res.raw(), "/a/b?x=1#frag");
        assert_eq!(format!("{}{}{}", res.path(), res.search(), res.hash()), res.raw());
    }

    #[test]
    fn question_mark_inside_fragment_stays_in_fragment() {
        let res = Resource::parse("/p#x?y");
        assert_eq!(res.path(), "/p");
        assert_eq!(res.search(), "");
        assert_eq!(res.hash(), "#x?y");
    }

    #[test]
    fn bare_path_has_empty_search_and_hash() {
        let res = Resource::parse("/index.html");
        assert_eq!(res.path(), "/index.html");
        assert!(res.search().is_empty());
        assert!(res.hash().is_empty());
    }

    #[test]
    fn from_target_adds_leading_slash() {
        let res = Resource::from_target("api?q=1");
        assert_eq!(res.raw(), "/api?q=1");
        assert_eq!(res.path(), "/api");
    }
}
