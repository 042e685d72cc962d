//! Path compiler - turns a template like `/users/{id:int}` into its matcher.
//!
//! A template compiles once, at registration time, into three artifacts that
//! are derived together and never drift apart:
//!
//! - an anchored [`Regex`] with one named group per placeholder,
//! - the canonical format (`/users/{id}`) and its literal/placeholder
//!   segments, used to rebuild concrete paths,
//! - the ordered converter for each placeholder.

use super::error::RouteError;
use super::params::PathParams;
use crate::converter::{ConversionError, Converter, ConverterRegistry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Placeholder syntax: `{name}` or `{name:type}`.
#[allow(clippy::expect_used)] // static pattern
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)(?::([a-zA-Z_][a-zA-Z0-9_]*))?\}")
        .expect("placeholder pattern compiles")
});

const DEFAULT_CONVERTER: &str = "str";

/// One piece of the canonical format.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    /// Index into the converter list.
    Param(usize),
}

/// A compiled path or host template.
#[derive(Clone)]
pub struct CompiledPath {
    template: String,
    regex: Regex,
    format: String,
    segments: Vec<Segment>,
    converters: Vec<(Arc<str>, Arc<dyn Converter>)>,
}

impl CompiledPath {
    /// Compile `template` against the built-in converters.
    pub fn compile(template: &str) -> Result<Self, RouteError> {
        Self::compile_with(template, ConverterRegistry::global())
    }

    /// Compile `template`, resolving converter types in `registry`.
    ///
    /// # Errors
    ///
    /// * [`RouteError::UnknownConverter`] - a placeholder names an unregistered type
    /// * [`RouteError::InvalidTemplate`] - a placeholder name is used twice
    /// * [`RouteError::InvalidPattern`] - a converter pattern is not a valid regex
    pub fn compile_with(template: &str, registry: &ConverterRegistry) -> Result<Self, RouteError> {
        let mut pattern = String::with_capacity(template.len() + 16);
        let mut format = String::with_capacity(template.len());
        let mut segments = Vec::new();
        let mut converters: Vec<(Arc<str>, Arc<dyn Converter>)> = Vec::new();
        let mut idx = 0;

        pattern.push('^');
        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let kind = caps.get(2).map_or(DEFAULT_CONVERTER, |m| m.as_str());

            let converter = registry
                .get(kind)
                .ok_or_else(|| RouteError::UnknownConverter {
                    converter: kind.to_string(),
                    template: template.to_string(),
                })?;
            if converters.iter().any(|(n, _)| n.as_ref() == name) {
                return Err(RouteError::InvalidTemplate {
                    template: template.to_string(),
                    reason: format!("duplicate parameter '{name}'"),
                });
            }

            let literal = &template[idx..whole.start()];
            pattern.push_str(&regex::escape(literal));
            pattern.push_str("(?P<");
            pattern.push_str(name);
            pattern.push('>');
            pattern.push_str(converter.pattern());
            pattern.push(')');

            format.push_str(literal);
            format.push('{');
            format.push_str(name);
            format.push('}');

            if !literal.is_empty() {
                segments.push(Segment::Literal(literal.to_string()));
            }
            segments.push(Segment::Param(converters.len()));
            converters.push((Arc::from(name), converter));
            idx = whole.end();
        }
        let tail = &template[idx..];
        pattern.push_str(&regex::escape(tail));
        pattern.push('$');
        format.push_str(tail);
        if !tail.is_empty() {
            segments.push(Segment::Literal(tail.to_string()));
        }

        let regex = Regex::new(&pattern).map_err(|source| RouteError::InvalidPattern {
            template: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
            format,
            segments,
            converters,
        })
    }

    /// The template as registered.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The template with converter annotations stripped.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.converters.iter().map(|(n, _)| n.as_ref())
    }

    /// Match `subject` against the whole pattern and decode every capture.
    ///
    /// Returns `None` when the pattern does not match. A decode failure means a
    /// capture satisfied the converter's pattern but not its codec (for example
    /// an integer too large for `i64`).
    #[must_use]
    pub fn match_params(&self, subject: &str) -> Option<Result<PathParams, ConversionError>> {
        let caps = self.regex.captures(subject)?;
        let mut params = PathParams::new();
        for (name, converter) in &self.converters {
            let raw = caps.name(name).map_or("", |m| m.as_str());
            match converter.decode(raw) {
                Ok(value) => params.insert(Arc::clone(name), value),
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(params))
    }

    /// Substitute every parameter that appears in the format.
    ///
    /// Returns the partially (or fully) substituted format and the parameters
    /// that had no placeholder. Placeholders without a value stay as `{name}`.
    pub fn replace_params(
        &self,
        params: &PathParams,
    ) -> Result<(String, PathParams), ConversionError> {
        self.substitute(params, None)
    }

    /// Substitute parameters, rendering the `blank` placeholder as an empty string.
    ///
    /// Used by mounts that rebuild their prefix before delegating to a child.
    pub(crate) fn replace_params_with_blank(
        &self,
        params: &PathParams,
        blank: &str,
    ) -> Result<(String, PathParams), ConversionError> {
        self.substitute(params, Some(blank))
    }

    /// Single left-to-right pass over the segments; substituted values are
    /// never rescanned.
    fn substitute(
        &self,
        params: &PathParams,
        blank: Option<&str>,
    ) -> Result<(String, PathParams), ConversionError> {
        let mut path = String::with_capacity(self.format.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(i) => {
                    let (name, converter) = &self.converters[*i];
                    if blank == Some(name.as_ref()) {
                        continue;
                    }
                    match params.get(name) {
                        Some(value) => path.push_str(&converter.encode(value)?),
                        None => {
                            path.push('{');
                            path.push_str(name);
                            path.push('}');
                        }
                    }
                }
            }
        }

        let mut remaining = PathParams::new();
        for (key, value) in params.iter() {
            let placed = self.converters.iter().any(|(n, _)| n == key);
            if !placed && blank != Some(key.as_ref()) {
                remaining.insert(Arc::clone(key), value.clone());
            }
        }
        Ok((path, remaining))
    }
}

impl PartialEq for CompiledPath {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

impl fmt::Debug for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPath")
            .field("template", &self.template)
            .field("regex", &self.regex.as_str())
            .field("format", &self.format)
            .field("params", &self.param_names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::converter::ParamValue;

    #[test]
    fn test_root_path() {
        let path = CompiledPath::compile("/").unwrap();
        assert!(path.regex().is_match("/"));
        assert!(!path.regex().is_match("/x"));
        assert_eq!(path.param_names().count(), 0);
    }

    #[test]
    fn test_parameterized_path() {
        let path = CompiledPath::compile("/items/{id:int}").unwrap();
        assert_eq!(path.format(), "/items/{id}");
        let params = path.match_params("/items/123").unwrap().unwrap();
        assert_eq!(params.get("id"), Some(&ParamValue::Int(123)));
        assert!(path.match_params("/items/abc").is_none());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let path = CompiledPath::compile("/a/{b}/c").unwrap();
        assert!(path.match_params("/a/1/c").is_some());
        assert!(path.match_params("/x/a/1/c").is_none());
        assert!(path.match_params("/a/1/c/d").is_none());
    }

    #[test]
    fn test_literals_are_escaped() {
        let host = CompiledPath::compile("{tenant}.example.com").unwrap();
        assert!(host.match_params("acme.example.com").is_some());
        assert!(host.match_params("acme-example.com").is_none());
    }

    #[test]
    fn test_unknown_converter() {
        let err = CompiledPath::compile("/items/{id:slug}").err().unwrap();
        assert!(matches!(err, RouteError::UnknownConverter { ref converter, .. } if converter == "slug"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = CompiledPath::compile("/{id}/{id:int}").err().unwrap();
        assert!(matches!(err, RouteError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_replace_params_leaves_unknown() {
        let path = CompiledPath::compile("/users/{id:int}").unwrap();
        let params = PathParams::new().with("id", 7i64).with("extra", "x");
        let (built, remaining) = path.replace_params(&params).unwrap();
        assert_eq!(built, "/users/7");
        assert_eq!(remaining.keys().collect::<Vec<_>>(), vec!["extra"]);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let path = CompiledPath::compile("/{a}/{b}").unwrap();
        let values = PathParams::new().with("a", "{b}").with("b", "z");
        let (concrete, remaining) = path.replace_params(&values).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(concrete, "/{b}/z");
        assert_eq!(path.match_params(&concrete).unwrap().unwrap(), values);
    }

    #[test]
    fn test_blank_placeholder_is_dropped() {
        let path = CompiledPath::compile("/shop/{id}/{path:path}").unwrap();
        let values = PathParams::new().with("id", "7").with("path", "ignored");
        let (built, remaining) = path.replace_params_with_blank(&values, "path").unwrap();
        assert_eq!(built, "/shop/7/");
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_format_then_match_recovers_values() {
        let path = CompiledPath::compile("/{org}/files/{rest:path}").unwrap();
        let values = PathParams::new()
            .with("org", "acme")
            .with("rest", "docs/a.txt");
        let (concrete, remaining) = path.replace_params(&values).unwrap();
        assert!(remaining.is_empty());
        assert_eq!(concrete, "/acme/files/docs/a.txt");
        assert_eq!(path.match_params(&concrete).unwrap().unwrap(), values);
    }
}
