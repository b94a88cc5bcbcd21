//! Path pattern matching for policy tables.
//!
//! # Responsibilities
//! - Parse rule patterns into exact, prefix and regex matchers
//! - Resolve a request path to the winning entry of a compiled table
//!
//! # Design Decisions
//! - `"= "` prefix marks an exact pattern, `"*~ "` a regex, anything else a
//!   literal path prefix
//! - Exact matches always win; the longest prefix wins next, except the
//!   catch-all `"/"` which ranks below any regex match of equal or greater
//!   length
//! - Equal-length ties keep the entry declared first
//! - Regex patterns are unanchored; the leftmost match is measured
//! - A single invalid pattern fails the whole table

use regex::Regex;

/// Errors raised while compiling a pattern table.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid regular expression `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Which bucket a compiled pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Regex,
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

const EXACT_MARKER: &str = "= ";
const REGEX_MARKER: &str = "*~ ";

impl Pattern {
    /// Parse a rule pattern such as `"= /index.html"`, `"*~ \\.js$"` or `"/api"`.
    pub fn parse(rule: &str) -> Result<Self, PatternError> {
        if let Some(literal) = rule.strip_prefix(EXACT_MARKER) {
            return Ok(Pattern::Exact(literal.to_string()));
        }

        if let Some(expr) = rule.strip_prefix(REGEX_MARKER) {
            return Regex::new(expr)
                .map(Pattern::Regex)
                .map_err(|source| PatternError::InvalidRegex {
                    pattern: expr.to_string(),
                    source,
                });
        }

        Ok(Pattern::Prefix(rule.to_string()))
    }

    pub fn kind(&self) -> MatchKind {
        match self {
            Pattern::Exact(_) => MatchKind::Exact,
            Pattern::Prefix(_) => MatchKind::Prefix,
            Pattern::Regex(_) => MatchKind::Regex,
        }
    }

    /// Length of the matched text, or `None` when the path does not match.
    ///
    /// An empty regex match counts as no match.
    pub fn matched_len(&self, path: &str) -> Option<usize> {
        match self {
            Pattern::Exact(literal) => (path == literal).then_some(literal.len()),
            Pattern::Prefix(prefix) => path.starts_with(prefix.as_str()).then_some(prefix.len()),
            Pattern::Regex(regex) => regex
                .find(path)
                .map(|m| m.as_str().len())
                .filter(|len| *len > 0),
        }
    }

    fn is_catch_all(&self) -> bool {
        matches!(self, Pattern::Prefix(prefix) if prefix == "/")
    }
}

/// One compiled rule: the pattern, its source text and the attached handler.
#[derive(Debug, Clone)]
pub struct MatchEntry<H> {
    source: String,
    pattern: Pattern,
    handler: H,
}

impl<H> MatchEntry<H> {
    /// The rule text as written in configuration.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// A pattern table split into exact, prefix and regex buckets.
///
/// Entries keep their declaration order inside each bucket.
#[derive(Debug, Clone)]
pub struct PathMatcher<H> {
    exact: Vec<MatchEntry<H>>,
    prefix: Vec<MatchEntry<H>>,
    regex: Vec<MatchEntry<H>>,
}

impl<H> Default for PathMatcher<H> {
    fn default() -> Self {
        Self {
            exact: Vec::new(),
            prefix: Vec::new(),
            regex: Vec::new(),
        }
    }
}

impl<H> PathMatcher<H> {
    /// Compile `(pattern, handler)` pairs in declaration order.
    pub fn compile<I, S>(rules: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = (S, H)>,
        S: Into<String>,
    {
        let mut matcher = Self::default();
        for (source, handler) in rules {
            let source = source.into();
            let pattern = Pattern::parse(&source)?;
            let entry = MatchEntry {
                source,
                pattern,
                handler,
            };
            match entry.pattern.kind() {
                MatchKind::Exact => matcher.exact.push(entry),
                MatchKind::Prefix => matcher.prefix.push(entry),
                MatchKind::Regex => matcher.regex.push(entry),
            }
        }
        Ok(matcher)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefix.len() + self.regex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the entry that governs `path`.
    pub fn resolve(&self, path: &str) -> Option<&MatchEntry<H>> {
        if let Some(entry) = self
            .exact
            .iter()
            .find(|entry| entry.pattern.matched_len(path).is_some())
        {
            return Some(entry);
        }

        let mut best: Option<(&MatchEntry<H>, usize)> = None;
        for entry in &self.prefix {
            let Some(len) = entry.pattern.matched_len(path) else {
                continue;
            };
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((entry, len));
            }
        }

        if let Some((entry, _)) = best {
            if !entry.pattern.is_catch_all() {
                return Some(entry);
            }
        }

        for entry in &self.regex {
            let Some(len) = entry.pattern.matched_len(path) else {
                continue;
            };
            let wins = match best {
                None => true,
                Some((current, best_len)) if current.pattern.is_catch_all() => len >= best_len,
                Some((_, best_len)) => len > best_len,
            };
            if wins {
                best = Some((entry, len));
            }
        }

        best.map(|(entry, _)| entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rules: &[&'static str]) -> PathMatcher<&'static str> {
        PathMatcher::compile(rules.iter().map(|rule| (*rule, *rule))).unwrap()
    }

    fn winner(matcher: &PathMatcher<&'static str>, path: &str) -> Option<&'static str> {
        matcher.resolve(path).map(|entry| *entry.handler())
    }

    #[test]
    fn parses_pattern_kinds() {
        assert_eq!(Pattern::parse("= /a").unwrap().kind(), MatchKind::Exact);
        assert_eq!(Pattern::parse("*~ ^/a").unwrap().kind(), MatchKind::Regex);
        assert_eq!(Pattern::parse("/a").unwrap().kind(), MatchKind::Prefix);
        // the regex marker needs its trailing space
        assert_eq!(Pattern::parse("*~/a").unwrap().kind(), MatchKind::Prefix);
    }

    #[test]
    fn invalid_regex_fails_whole_table() {
        let result = PathMatcher::compile(vec![("/ok", 1), ("*~ (unclosed", 2)]);
        assert!(matches!(result, Err(PatternError::InvalidRegex { .. })));
    }

    #[test]
    fn exact_wins_regardless_of_order() {
        let matcher = table(&["/", "/index", "*~ index.html$", "= /index.html"]);
        assert_eq!(winner(&matcher, "/index.html"), Some("= /index.html"));
        assert_eq!(winner(&matcher, "/index.htm"), Some("/index"));
    }

    #[test]
    fn longest_prefix_wins() {
        let matcher = table(&["/usr", "/usr/local/share", "/usr/local"]);
        assert_eq!(winner(&matcher, "/usr/local/share/doc"), Some("/usr/local/share"));
        assert_eq!(winner(&matcher, "/usr/local/bin"), Some("/usr/local"));
        assert_eq!(winner(&matcher, "/usr/bin"), Some("/usr"));
        assert_eq!(winner(&matcher, "/opt"), None);
    }

    #[test]
    fn non_root_prefix_beats_regex() {
        let matcher = table(&["*~ .*/test.end$", "/usr"]);
        assert_eq!(winner(&matcher, "/usr/test.end"), Some("/usr"));
    }

    #[test]
    fn root_prefix_yields_to_regex() {
        let matcher = table(&["/", "*~ .*/test.end$"]);
        assert_eq!(winner(&matcher, "/a/test.end"), Some("*~ .*/test.end$"));
        assert_eq!(winner(&matcher, "/a/other"), Some("/"));
    }

    #[test]
    fn root_prefix_yields_to_equal_length_regex() {
        let matcher = table(&["/", "*~ a"]);
        assert_eq!(winner(&matcher, "/xa"), Some("*~ a"));
    }

    #[test]
    fn root_prefix_kept_over_empty_regex_match() {
        let matcher = table(&["/", "*~ z*"]);
        assert_eq!(winner(&matcher, "/abc"), Some("/"));
    }

    #[test]
    fn empty_regex_match_is_no_match() {
        assert_eq!(Pattern::parse("*~ z*").unwrap().matched_len("/abc"), None);
        assert_eq!(Pattern::parse("*~ b*").unwrap().matched_len("/abc"), None);
        assert_eq!(Pattern::parse("*~ /a").unwrap().matched_len("/abc"), Some(2));

        let matcher = table(&["*~ z*"]);
        assert_eq!(winner(&matcher, "/abc"), None);
    }

    #[test]
    fn longer_regex_match_wins_and_ties_keep_first() {
        let matcher = table(&["*~ [a-z]+", "*~ [a-z]+/[a-z]+", "*~ [a-c]+/[a-z]+"]);
        assert_eq!(winner(&matcher, "/abc/def"), Some("*~ [a-z]+/[a-z]+"));
    }

    #[test]
    fn regex_is_unanchored() {
        let matcher = table(&["*~ \\.js"]);
        assert_eq!(winner(&matcher, "/static/app.js?v=1"), Some("*~ \\.js"));
    }

    #[test]
    fn empty_table_resolves_nothing() {
        let matcher: PathMatcher<()> = PathMatcher::default();
        assert!(matcher.is_empty());
        assert!(matcher.resolve("/").is_none());
    }
}
