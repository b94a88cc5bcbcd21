//! Host-keyed proxy route table.
//!
//! # Responsibilities
//! - Store proxy rules per host, keyed by `(host, src_path)`
//! - Resolve the host (or the default host) for a request
//! - Pick the rule whose `src_path` is the longest prefix of the request path
//! - Rewrite the request target for the upstream
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Hosts compare ASCII case-insensitively
//! - Redeclaring a `(host, src_path)` pair replaces the earlier rule in place
//! - Equal-length prefixes keep the rule declared first

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Where a proxy rule sends traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// Plain TCP (`tls == false`) or TLS to `host:port`.
    Tcp { host: String, port: u16, tls: bool },
    /// A local Unix-domain-socket server.
    Pipe { socket_path: PathBuf },
}

impl Upstream {
    /// Value sent as the upstream `Host` header.
    pub fn authority(&self) -> String {
        match self {
            Upstream::Tcp { host, port, .. } => format!("{}:{}", host, port),
            Upstream::Pipe { .. } => "localhost".to_string(),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Upstream::Tcp { tls: false, .. } => "http",
            Upstream::Tcp { tls: true, .. } => "https",
            Upstream::Pipe { .. } => "pipe",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Tcp { host, port, .. } => write!(f, "{}://{}:{}", self.scheme(), host, port),
            Upstream::Pipe { socket_path } => write!(f, "pipe://{}", socket_path.display()),
        }
    }
}

/// A single `proxy:` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
    /// Original rule text, used in access logs.
    pub rule: String,
    pub src_host: String,
    /// Path prefix this rule serves (`/` when omitted).
    pub src_path: String,
    pub upstream: Upstream,
}

impl ProxyRule {
    /// Upstream request target: `src_path` stripped from `target`, leading `/` kept.
    pub fn upstream_target(&self, target: &str) -> String {
        let rest = target.strip_prefix(self.src_path.as_str()).unwrap_or(target);
        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        }
    }
}

/// All proxy rules, grouped by host.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    hosts: HashMap<String, Vec<ProxyRule>>,
    order: Vec<String>,
    default_host: Option<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule; `is_default` makes its host the fallback for unknown hosts.
    pub fn insert(&mut self, rule: ProxyRule, is_default: bool) {
        let host = rule.src_host.to_ascii_lowercase();
        if is_default {
            self.default_host = Some(host.clone());
        }

        let rules = match self.hosts.get_mut(&host) {
            Some(rules) => rules,
            None => {
                self.order.push(host.clone());
                self.hosts.entry(host).or_default()
            }
        };

        match rules.iter_mut().find(|existing| existing.src_path == rule.src_path) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn default_host(&self) -> Option<&str> {
        self.default_host.as_deref()
    }

    /// Hosts in declaration order with their rules.
    pub fn hosts(&self) -> impl Iterator<Item = (&str, &[ProxyRule])> {
        self.order
            .iter()
            .filter_map(|host| self.hosts.get(host).map(|rules| (host.as_str(), rules.as_slice())))
    }

    /// Rules for `host`, falling back to the default host.
    pub fn lookup(&self, host: &str) -> Option<&[ProxyRule]> {
        let host = host.to_ascii_lowercase();
        self.hosts
            .get(&host)
            .or_else(|| self.default_host.as_ref().and_then(|default| self.hosts.get(default)))
            .map(Vec::as_slice)
    }

    /// The rule with the longest `src_path` prefix of `path`.
    pub fn select<'a>(rules: &'a [ProxyRule], path: &str) -> Option<&'a ProxyRule> {
        let mut best: Option<&ProxyRule> = None;
        for rule in rules {
            if !path.starts_with(rule.src_path.as_str()) {
                continue;
            }
            if best.map_or(true, |current| rule.src_path.len() > current.src_path.len()) {
                best = Some(rule);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_rule(host: &str, src_path: &str, port: u16) -> ProxyRule {
        ProxyRule {
            rule: format!("proxy:{}{}:http:127.0.0.1:{}", host, src_path, port),
            src_host: host.to_string(),
            src_path: src_path.to_string(),
            upstream: Upstream::Tcp {
                host: "127.0.0.1".to_string(),
                port,
                tls: false,
            },
        }
    }

    #[test]
    fn strips_src_path_prefix() {
        let rule = http_rule("localhost", "/api/", 5080);
        assert_eq!(rule.upstream_target("/api/users/1"), "/users/1");
        assert_eq!(rule.upstream_target("/api/users?id=3"), "/users?id=3");
        assert_eq!(rule.upstream_target("/api/"), "/");
    }

    #[test]
    fn root_src_path_keeps_target() {
        let rule = http_rule("localhost", "/", 5080);
        assert_eq!(rule.upstream_target("/index.html?a=1"), "/index.html?a=1");
    }

    #[test]
    fn selects_longest_src_path() {
        let mut table = RouteTable::new();
        table.insert(http_rule("localhost", "/", 5081), false);
        table.insert(http_rule("localhost", "/res/", 5082), false);
        table.insert(http_rule("localhost", "/res/img/", 5083), false);

        let rules = table.lookup("localhost").unwrap();
        assert_eq!(RouteTable::select(rules, "/res/img/a.png").unwrap().src_path, "/res/img/");
        assert_eq!(RouteTable::select(rules, "/res/a.css").unwrap().src_path, "/res/");
        assert_eq!(RouteTable::select(rules, "/other").unwrap().src_path, "/");
    }

    #[test]
    fn unmatched_sub_path_selects_nothing() {
        let mut table = RouteTable::new();
        table.insert(http_rule("localhost", "/api/", 5080), false);
        let rules = table.lookup("localhost").unwrap();
        assert!(RouteTable::select(rules, "/index.html").is_none());
    }

    #[test]
    fn redeclared_pair_replaces_rule() {
        let mut table = RouteTable::new();
        table.insert(http_rule("localhost", "/", 5080), false);
        table.insert(http_rule("localhost", "/", 5081), false);

        let rules = table.lookup("localhost").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].upstream.authority(), "127.0.0.1:5081");
    }

    #[test]
    fn unknown_host_uses_default() {
        let mut table = RouteTable::new();
        table.insert(http_rule("a.test", "/", 1), false);
        table.insert(http_rule("b.test", "/", 2), true);

        assert_eq!(table.default_host(), Some("b.test"));
        assert_eq!(table.lookup("A.TEST").unwrap()[0].src_host, "a.test");
        assert_eq!(table.lookup("c.test").unwrap()[0].src_host, "b.test");
    }

    #[test]
    fn unknown_host_without_default_is_none() {
        let mut table = RouteTable::new();
        table.insert(http_rule("a.test", "/", 1), false);
        assert!(table.lookup("c.test").is_none());
    }

    #[test]
    fn pipe_upstream_authority_is_localhost() {
        let upstream = Upstream::Pipe {
            socket_path: PathBuf::from("/tmp/app.sock"),
        };
        assert_eq!(upstream.authority(), "localhost");
        assert_eq!(upstream.to_string(), "pipe:///tmp/app.sock");
    }
}
