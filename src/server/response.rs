use super::channel::{Channel, ChannelError};
use super::message::Message;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline headers before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names use `Arc<str>`: names repeat heavily across requests
/// (content-type, host, ...) and cloning one is an atomic increment.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Response produced by a request handler.
///
/// The body and header value objects belong to the transport; this is the
/// minimal shape the router needs to emit a response over a [`Channel`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    /// Response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    pub body: String,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: String) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A `text/plain` response.
    #[must_use]
    pub fn text(status: u16, body: &str) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((
            Arc::from("content-type"),
            "text/plain; charset=utf-8".to_string(),
        ));
        Self::new(status, headers, body.to_string())
    }

    /// An `application/json` response.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self::new(status, headers, body.to_string())
    }

    /// A temporary redirect (307) preserving the request method.
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("location"), location.to_string()));
        Self::new(307, headers, String::new())
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Emit this response as a `response.start` / `response.body` pair.
    pub fn send(self, channel: &mut dyn Channel) -> Result<(), ChannelError> {
        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        channel.send(Message::ResponseStart {
            status: self.status,
            headers,
        })?;
        channel.send(Message::ResponseBody { body: self.body })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::server::MemoryChannel;

    #[test]
    fn test_text_sets_content_type() {
        let response = Response::text(404, "Not Found");
        assert_eq!(response.status, 404);
        assert_eq!(
            response.get_header("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_set_header_replaces_existing() {
        let mut response = Response::json(200, &serde_json::json!({"ok": true}));
        response.set_header("Content-Type", "application/problem+json".to_string());
        assert_eq!(response.headers.len(), 1);
        assert_eq!(
            response.get_header("content-type"),
            Some("application/problem+json")
        );
    }

    #[test]
    fn test_send_emits_start_then_body() {
        let (mut app, mut transport) = MemoryChannel::pair();
        Response::redirect("/users/").send(&mut app).unwrap();
        assert_eq!(
            transport.drain(),
            vec![
                Message::ResponseStart {
                    status: 307,
                    headers: vec![("location".to_string(), "/users/".to_string())],
                },
                Message::ResponseBody {
                    body: String::new()
                },
            ]
        );
    }
}
