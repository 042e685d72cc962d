use serde::Serialize;
use std::fmt;
use url::{Position, Url};

/// Protocol a reversed URL is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Socket,
}

impl Protocol {
    fn scheme(self, secure: bool) -> &'static str {
        match (self, secure) {
            (Protocol::Http, false) => "http",
            (Protocol::Http, true) => "https",
            (Protocol::Socket, false) => "ws",
            (Protocol::Socket, true) => "wss",
        }
    }
}

/// Result of a reverse lookup: a concrete path, optionally tagged with the
/// protocol of the resolving route and the host of an enclosing host node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlPath {
    pub path: String,
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl UrlPath {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            protocol: None,
            host: None,
        }
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Option<Protocol>) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    /// Resolve against `base_url`.
    ///
    /// The scheme follows the protocol (`http`/`https`, `ws`/`wss`, secure when the
    /// base is), the host replaces the base authority when set, and the path is
    /// appended to the base path.
    pub fn make_absolute_url(&self, base_url: &str) -> Result<Url, url::ParseError> {
        let base = Url::parse(base_url)?;
        let secure = matches!(base.scheme(), "https" | "wss");
        let scheme = self
            .protocol
            .map_or(base.scheme(), |protocol| protocol.scheme(secure));
        let netloc = match &self.host {
            Some(host) => host.as_str(),
            None => &base[Position::BeforeHost..Position::AfterPort],
        };
        let prefix = base.path().trim_end_matches('/');
        Url::parse(&format!("{scheme}://{netloc}{prefix}{}", self.path))
    }
}

impl fmt::Display for UrlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_absolute_url_uses_base() {
        let url = UrlPath::new("/users/1").with_protocol(Some(Protocol::Http));
        let abs = url.make_absolute_url("https://example.org:8443/app/").unwrap();
        assert_eq!(abs.as_str(), "https://example.org:8443/app/users/1");
    }

    #[test]
    fn test_absolute_url_socket_scheme_and_host() {
        let url = UrlPath::new("/ws")
            .with_protocol(Some(Protocol::Socket))
            .with_host(Some("acme.example.com".to_string()));
        let abs = url.make_absolute_url("http://localhost:8000").unwrap();
        assert_eq!(abs.as_str(), "ws://acme.example.com/ws");
    }
}
