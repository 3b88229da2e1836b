//! Request-line parsing and cacheability.
//!
//! # Responsibilities
//! - Extract the request fingerprint (verb, URL, scheme, host, port, path)
//!   from the first line a client sends
//! - Decide whether a request's response may be cached
//!
//! # Design Decisions
//! - Clients of a forward proxy send absolute-form request lines; the URL
//!   is parsed structurally first, with a manual regex fallback for lines
//!   the `url` crate rejects
//! - The dynamic-content filter is a substring test over the path, so a
//!   marker anywhere in the path disqualifies the request

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static VERB_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+").expect("verb pattern compiles"));

static FALLBACK_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?)://(.+)/(.*)").expect("fallback url pattern compiles"));

/// Path markers for dynamically generated content. Responses for matching
/// paths are never cached. The bare `jspa` entry carries no dot.
pub const DYNAMIC_PATH_MARKERS: [&str; 10] = [
    ".asp", ".aspx", ".jsp", "jspa", ".jspx", ".pl", ".cgi", ".action", ".do", ".php",
];

/// The fingerprint extracted from an HTTP request line. The URL is the
/// cache key; the raw line is what gets forwarded to the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub verb: String,
    pub url: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub raw: String,
}

impl RequestLine {
    /// The leading verb of a request line, if one is present.
    pub fn verb_of(line: &str) -> Option<&str> {
        VERB_PATTERN.find(line).map(|m| m.as_str())
    }

    /// Parse an absolute-form request line such as
    /// `GET http://host:port/path HTTP/1.1`.
    ///
    /// Returns `None` when the verb or URL token is missing or the URL
    /// resists both parsers.
    pub fn parse(raw: &str) -> Option<RequestLine> {
        let line = raw.trim_end_matches(['\r', '\n']);
        let verb = Self::verb_of(line)?.to_string();
        let url = line.split_whitespace().nth(1)?.to_string();
        let (scheme, host, port, path) = match Url::parse(&url) {
            Ok(parsed) if parsed.has_host() => {
                let scheme = parsed.scheme().to_string();
                let host = parsed.host_str()?.to_string();
                let port = parsed.port_or_known_default().unwrap_or(80);
                (scheme, host, port, parsed.path().to_string())
            }
            _ => Self::parse_fallback(&url)?,
        };
        Some(RequestLine {
            verb,
            url,
            scheme,
            host,
            port,
            path,
            raw: raw.to_string(),
        })
    }

    /// Manual split for URLs the structured parser rejects: scheme,
    /// host[:port], path, with the port defaulting by scheme.
    fn parse_fallback(url: &str) -> Option<(String, String, u16, String)> {
        let caps = FALLBACK_URL_PATTERN.captures(url)?;
        let scheme = caps[1].to_string();
        let host_port = &caps[2];
        let path = format!("/{}", &caps[3]);
        let default_port = if scheme == "https" { 443 } else { 80 };
        let (host, port) = match host_port.rsplit_once(':') {
            Some((bare_host, candidate)) => match candidate.parse() {
                Ok(port) => (bare_host.to_string(), port),
                Err(_) => (host_port.to_string(), default_port),
            },
            None => (host_port.to_string(), default_port),
        };
        Some((scheme, host, port, path))
    }

    /// Whether the response to this request may enter the cache: a GET with
    /// a non-empty path carrying no dynamic-content marker.
    pub fn is_cacheable(&self) -> bool {
        self.verb == "GET"
            && !self.path.is_empty()
            && !DYNAMIC_PATH_MARKERS
                .iter()
                .any(|marker| self.path.contains(marker))
    }
}
