use thiserror::Error;

/// Registration-time failure building a route, mount or host.
///
/// These are fatal: a table that fails to compile must not start serving.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A placeholder names a converter type that is not registered
    #[error("unknown path converter '{converter}' in template '{template}'")]
    UnknownConverter { converter: String, template: String },

    /// The template is malformed
    #[error("invalid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The compiled pattern was rejected by the regex engine
    #[error("template '{template}' compiled to an invalid pattern: {source}")]
    InvalidPattern {
        template: String,
        #[source]
        source: regex::Error,
    },

    /// A method name is not a valid HTTP token
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
}

/// No node in the tree resolves the requested name and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no route matches name '{name}' with the given parameters")]
pub struct NoMatchFound {
    pub name: String,
}

impl NoMatchFound {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}
