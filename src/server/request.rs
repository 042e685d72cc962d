use super::channel::{Channel, ChannelError};
use super::message::Message;
use super::scope::Scope;
use crate::converter::ParamValue;
use crate::router::{NoMatchFound, PathParams, UrlPath};
use http::Method;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// View over a matched [`Scope`] handed to request handlers.
#[derive(Debug, Clone)]
pub struct Request {
    scope: Scope,
}

impl Request {
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.scope.method.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.scope.path
    }

    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.scope.root_path
    }

    #[must_use]
    pub fn path_params(&self) -> &PathParams {
        &self.scope.path_params
    }

    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&ParamValue> {
        self.scope.path_params.get(name)
    }

    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.scope.header(name)
    }

    /// Query string parameters, URL-decoded. Later duplicates win.
    #[must_use]
    pub fn query_params(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.scope.query_string.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Reverse-resolve `name` through the router that dispatched this request.
    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, NoMatchFound> {
        match &self.scope.router {
            Some(router) => router.url_path_for(name, params),
            None => Err(NoMatchFound::new(name)),
        }
    }

    /// Absolute URL for `name`, resolved against this request's base URL.
    pub fn url_for(&self, name: &str, params: &PathParams) -> anyhow::Result<Url> {
        let url_path = self.url_path_for(name, params)?;
        let base = self.scope.base_url();
        debug!(name = %name, base_url = %base, path = %url_path.path, "Building absolute URL");
        Ok(url_path.make_absolute_url(&base)?)
    }
}

/// A socket session handed to session handlers.
pub struct Session<'a> {
    scope: Scope,
    channel: &'a mut dyn Channel,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(scope: Scope, channel: &'a mut dyn Channel) -> Self {
        Self { scope, channel }
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&ParamValue> {
        self.scope.path_params.get(name)
    }

    /// Wait for `socket.connect` and accept the session.
    pub fn accept(&mut self) -> Result<(), ChannelError> {
        loop {
            match self.channel.receive()? {
                Message::SocketConnect => break,
                other => debug!(message = other.kind(), "Ignoring message before connect"),
            }
        }
        self.channel.send(Message::SocketAccept)
    }

    /// Next text frame, or `None` once the peer disconnects.
    pub fn receive_text(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            match self.channel.receive()? {
                Message::SocketReceive { text } => return Ok(Some(text)),
                Message::SocketDisconnect { .. } => return Ok(None),
                other => debug!(message = other.kind(), "Ignoring non-frame message"),
            }
        }
    }

    pub fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
        self.channel.send(Message::SocketSend {
            text: text.to_string(),
        })
    }

    pub fn close(&mut self, code: u16) -> Result<(), ChannelError> {
        self.channel.send(Message::SocketClose { code })
    }
}
