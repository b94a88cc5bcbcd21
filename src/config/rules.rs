//! Rule-URI parsing.
//!
//! # Responsibilities
//! - Parse `proxy:`, `mime:`, `cors:` and `csp:` rule strings
//! - Resolve file paths in rules against the rule's base directory
//!
//! # Grammar
//! ```text
//! proxy[:default]:<host>[/<sub>/]:[http|https|pipe]:<dst>
//! mime[:default]:<ext>:<type/subtype>
//! cors[:default]:<host>:<policy.json>
//! csp[:default]:<host>:<policy.json>
//! ```
//!
//! `http`/`https` destinations are `<host>:<port>`; a `pipe` destination is a
//! Unix socket path. An empty scheme means `http`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::routing::{ProxyRule, Upstream};

/// Errors raised while parsing a single rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("unknown rule kind in `{0}`")]
    UnknownKind(String),

    #[error("invalid rule format `{0}`")]
    Malformed(String),

    #[error("invalid destination `{dst}` in rule `{rule}`, expected <host>:<port>")]
    InvalidDestination { rule: String, dst: String },
}

/// A parsed configuration rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Proxy { rule: ProxyRule, is_default: bool },
    Mime { extension: String, mime: String },
    Cors { host: String, policy_path: PathBuf },
    Csp { host: String, policy_path: PathBuf },
}

fn proxy_rule() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^proxy(:default)?:([a-zA-Z0-9_.-]+)(/|/[^ ]+/)?:(http|https|pipe)?:(.+)$")
            .expect("proxy rule grammar is a valid regex")
    })
}

fn host_port() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-zA-Z0-9_.-]+):([0-9]+)$")
            .expect("host:port grammar is a valid regex")
    })
}

fn mime_rule() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^mime(:default)?:(.+):(.+/.+)$")
            .expect("mime rule grammar is a valid regex")
    })
}

fn policy_rule() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(cors|csp)(:default)?:([a-zA-Z0-9_.-]+):(.+)$")
            .expect("policy rule grammar is a valid regex")
    })
}

impl Rule {
    /// Parse one rule; relative paths resolve against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, RuleError> {
        let text = text.trim();
        match text.split_once(':').map(|(kind, _)| kind) {
            Some("proxy") => parse_proxy(text, base_dir),
            Some("mime") => parse_mime(text),
            Some("cors") | Some("csp") => parse_policy(text, base_dir),
            _ => Err(RuleError::UnknownKind(text.to_string())),
        }
    }
}

fn parse_proxy(text: &str, base_dir: &Path) -> Result<Rule, RuleError> {
    let caps = proxy_rule()
        .captures(text)
        .ok_or_else(|| RuleError::Malformed(text.to_string()))?;

    let is_default = caps.get(1).is_some();
    let src_host = caps[2].trim().to_ascii_lowercase();
    let src_path = caps.get(3).map_or("/", |m| m.as_str()).trim().to_string();
    let scheme = caps.get(4).map_or("http", |m| m.as_str());
    let dst = &caps[5];

    let upstream = match scheme {
        "pipe" => Upstream::Pipe {
            socket_path: base_dir.join(dst),
        },
        _ => {
            let invalid = || RuleError::InvalidDestination {
                rule: text.to_string(),
                dst: dst.to_string(),
            };
            let hp = host_port().captures(dst).ok_or_else(invalid)?;
            let port: u16 = hp[2].parse().map_err(|_| invalid())?;
            Upstream::Tcp {
                host: hp[1].to_string(),
                port,
                tls: scheme == "https",
            }
        }
    };

    Ok(Rule::Proxy {
        rule: ProxyRule {
            rule: text.to_string(),
            src_host,
            src_path,
            upstream,
        },
        is_default,
    })
}

fn parse_mime(text: &str) -> Result<Rule, RuleError> {
    let caps = mime_rule()
        .captures(text)
        .ok_or_else(|| RuleError::Malformed(text.to_string()))?;
    Ok(Rule::Mime {
        extension: caps[2].trim_start_matches('.').to_ascii_lowercase(),
        mime: caps[3].to_string(),
    })
}

fn parse_policy(text: &str, base_dir: &Path) -> Result<Rule, RuleError> {
    let caps = policy_rule()
        .captures(text)
        .ok_or_else(|| RuleError::Malformed(text.to_string()))?;

    let host = caps[3].to_ascii_lowercase();
    let policy_path = base_dir.join(&caps[4]);
    Ok(match &caps[1] {
        "cors" => Rule::Cors { host, policy_path },
        _ => Rule::Csp { host, policy_path },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Rule, RuleError> {
        Rule::parse(text, Path::new("/etc/gateway"))
    }

    fn proxy(text: &str) -> (ProxyRule, bool) {
        match parse(text).unwrap() {
            Rule::Proxy { rule, is_default } => (rule, is_default),
            other => panic!("expected proxy rule, got {:?}", other),
        }
    }

    #[test]
    fn parses_http_proxy_rule() {
        let (rule, is_default) = proxy("proxy:localhost:http:127.0.0.1:5080");
        assert!(!is_default);
        assert_eq!(rule.src_host, "localhost");
        assert_eq!(rule.src_path, "/");
        assert_eq!(
            rule.upstream,
            Upstream::Tcp {
                host: "127.0.0.1".into(),
                port: 5080,
                tls: false
            }
        );
        assert_eq!(rule.rule, "proxy:localhost:http:127.0.0.1:5080");
    }

    #[test]
    fn parses_default_https_rule_with_sub_path() {
        let (rule, is_default) = proxy("proxy:default:API.test/v1/:https:backend.internal:8443");
        assert!(is_default);
        assert_eq!(rule.src_host, "api.test");
        assert_eq!(rule.src_path, "/v1/");
        assert_eq!(rule.upstream.scheme(), "https");
        assert_eq!(rule.upstream.authority(), "backend.internal:8443");
    }

    #[test]
    fn empty_scheme_means_http() {
        let (rule, _) = proxy("proxy:localhost::127.0.0.1:80");
        assert_eq!(rule.upstream.scheme(), "http");
    }

    #[test]
    fn pipe_path_resolves_against_base_dir() {
        let (rule, _) = proxy("proxy:local:pipe:run/app.sock");
        assert_eq!(
            rule.upstream,
            Upstream::Pipe {
                socket_path: PathBuf::from("/etc/gateway/run/app.sock")
            }
        );

        let (rule, _) = proxy("proxy:local:pipe:/tmp/app.sock");
        assert_eq!(
            rule.upstream,
            Upstream::Pipe {
                socket_path: PathBuf::from("/tmp/app.sock")
            }
        );
    }

    #[test]
    fn rejects_bad_destination() {
        assert!(matches!(
            parse("proxy:localhost:http:127.0.0.1"),
            Err(RuleError::InvalidDestination { .. })
        ));
        assert!(matches!(
            parse("proxy:localhost:http:127.0.0.1:99999"),
            Err(RuleError::InvalidDestination { .. })
        ));
    }

    #[test]
    fn rejects_malformed_and_unknown_rules() {
        assert!(matches!(parse("proxy:bad host:http:a:1"), Err(RuleError::Malformed(_))));
        assert!(matches!(parse("redirect:a:b"), Err(RuleError::UnknownKind(_))));
        assert!(matches!(parse("no-colon"), Err(RuleError::UnknownKind(_))));
    }

    #[test]
    fn parses_mime_rule() {
        assert_eq!(
            parse("mime:bjs:application/javascript").unwrap(),
            Rule::Mime {
                extension: "bjs".into(),
                mime: "application/javascript".into()
            }
        );
    }

    #[test]
    fn parses_policy_rules() {
        assert_eq!(
            parse("cors:localhost:cors.json").unwrap(),
            Rule::Cors {
                host: "localhost".into(),
                policy_path: PathBuf::from("/etc/gateway/cors.json")
            }
        );
        assert_eq!(
            parse("csp:default:Site.test:/srv/csp.json").unwrap(),
            Rule::Csp {
                host: "site.test".into(),
                policy_path: PathBuf::from("/srv/csp.json")
            }
        );
    }
}
