//! # Converter Module
//!
//! Path parameter converters: the codec between a placeholder's raw capture and a
//! typed [`ParamValue`], plus the regex fragment that decides which strings the
//! placeholder accepts.
//!
//! ## Built-in converters
//!
//! | Type    | Pattern                                   | Value               |
//! |---------|-------------------------------------------|---------------------|
//! | `str`   | `[^/]+`                                   | [`ParamValue::Str`] |
//! | `int`   | `[0-9]+`                                  | [`ParamValue::Int`] |
//! | `float` | `[0-9]+(\.[0-9]+)?`                       | [`ParamValue::Float`] |
//! | `path`  | `.*`                                      | [`ParamValue::Str`] |
//! | `uuid`  | `[0-9a-f]{8}-...-[0-9a-f]{12}`            | [`ParamValue::Uuid`] |
//!
//! Every converter honours `decode(encode(v)) == v` for the values it accepts,
//! and its pattern accepts exactly the strings `encode` produces.
//!
//! ## Custom converters
//!
//! ```rust
//! use std::sync::Arc;
//! use tramline::converter::{ConversionError, Converter, ConverterRegistry, ParamValue};
//!
//! struct Slug;
//!
//! impl Converter for Slug {
//!     fn pattern(&self) -> &str {
//!         "[a-z0-9-]+"
//!     }
//!     fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
//!         Ok(ParamValue::Str(raw.to_string()))
//!     }
//!     fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
//!         Ok(value.to_string())
//!     }
//! }
//!
//! let mut registry = ConverterRegistry::default();
//! registry.register("slug", Arc::new(Slug));
//! assert!(registry.get("slug").is_some());
//! ```

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A typed path parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
}

impl ParamValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            ParamValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<Uuid> for ParamValue {
    fn from(value: Uuid) -> Self {
        ParamValue::Uuid(value)
    }
}

/// Raised when a value cannot be decoded from, or encoded into, a path segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {value:?} with the '{converter}' converter: {reason}")]
pub struct ConversionError {
    pub converter: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl ConversionError {
    fn new(converter: &'static str, value: impl fmt::Display, reason: &'static str) -> Self {
        Self {
            converter,
            value: value.to_string(),
            reason,
        }
    }
}

/// Codec between a placeholder capture and a typed value.
pub trait Converter: Send + Sync {
    /// Regex fragment placed verbatim inside the placeholder's capture group.
    fn pattern(&self) -> &str;

    /// Decode a captured string into a typed value.
    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError>;

    /// Encode a value back into its path representation.
    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError>;
}

/// Single path segment, any character but `/`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn pattern(&self) -> &str {
        "[^/]+"
    }

    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
        Ok(ParamValue::Str(raw.to_string()))
    }

    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
        let encoded = value.to_string();
        if encoded.is_empty() {
            return Err(ConversionError::new("str", encoded, "must not be empty"));
        }
        if encoded.contains('/') {
            return Err(ConversionError::new("str", encoded, "may not contain '/'"));
        }
        Ok(encoded)
    }
}

/// Everything up to the end of the path, slashes included.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathConverter;

impl Converter for PathConverter {
    fn pattern(&self) -> &str {
        ".*"
    }

    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
        Ok(ParamValue::Str(raw.to_string()))
    }

    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
        Ok(value.to_string())
    }
}

/// Non-negative integers.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn pattern(&self) -> &str {
        "[0-9]+"
    }

    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
        raw.parse::<i64>()
            .map(ParamValue::Int)
            .map_err(|_| ConversionError::new("int", raw, "out of range for i64"))
    }

    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
        let int = match value {
            ParamValue::Int(i) => *i,
            ParamValue::Str(s) => s
                .parse::<i64>()
                .map_err(|_| ConversionError::new("int", s, "not an integer"))?,
            other => return Err(ConversionError::new("int", other, "not an integer")),
        };
        if int < 0 {
            return Err(ConversionError::new("int", int, "negative integers are not supported"));
        }
        Ok(int.to_string())
    }
}

/// Non-negative, finite decimals without exponent notation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn pattern(&self) -> &str {
        r"[0-9]+(?:\.[0-9]+)?"
    }

    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
        raw.parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| ConversionError::new("float", raw, "not a decimal number"))
    }

    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
        let float = match value {
            ParamValue::Float(f) => *f,
            // i64 -> f64 is lossy above 2^53; such ids belong to the int converter
            ParamValue::Int(i) => *i as f64,
            ParamValue::Str(s) => s
                .parse::<f64>()
                .map_err(|_| ConversionError::new("float", s, "not a decimal number"))?,
            other => return Err(ConversionError::new("float", other, "not a decimal number")),
        };
        if !float.is_finite() {
            return Err(ConversionError::new("float", float, "must be finite"));
        }
        if float < 0.0 {
            return Err(ConversionError::new("float", float, "negative numbers are not supported"));
        }
        // -0.0 would render as "-0"
        let float = if float == 0.0 { 0.0 } else { float };
        // f64 Display is the shortest round-tripping form and never uses an exponent
        Ok(format!("{float}"))
    }
}

/// Lower-case hyphenated UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidConverter;

impl Converter for UuidConverter {
    fn pattern(&self) -> &str {
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
    }

    fn decode(&self, raw: &str) -> Result<ParamValue, ConversionError> {
        Uuid::parse_str(raw)
            .map(ParamValue::Uuid)
            .map_err(|_| ConversionError::new("uuid", raw, "not a UUID"))
    }

    fn encode(&self, value: &ParamValue) -> Result<String, ConversionError> {
        let uuid = match value {
            ParamValue::Uuid(u) => *u,
            ParamValue::Str(s) => {
                Uuid::parse_str(s).map_err(|_| ConversionError::new("uuid", s, "not a UUID"))?
            }
            other => return Err(ConversionError::new("uuid", other, "not a UUID")),
        };
        Ok(uuid.hyphenated().to_string())
    }
}

/// Named set of converters consulted by the path compiler.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}

static DEFAULT_REGISTRY: Lazy<ConverterRegistry> = Lazy::new(ConverterRegistry::default);

impl ConverterRegistry {
    /// An empty registry. Most callers want [`ConverterRegistry::default`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// The shared registry holding the built-in converters.
    #[must_use]
    pub fn global() -> &'static ConverterRegistry {
        &DEFAULT_REGISTRY
    }

    /// Register (or replace) a converter under `name`.
    pub fn register(&mut self, name: &str, converter: Arc<dyn Converter>) {
        self.converters.insert(name.to_string(), converter);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(name).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.converters.contains_key(name)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("str", Arc::new(StringConverter));
        registry.register("path", Arc::new(PathConverter));
        registry.register("int", Arc::new(IntegerConverter));
        registry.register("float", Arc::new(FloatConverter));
        registry.register("uuid", Arc::new(UuidConverter));
        registry
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.converters.keys().collect();
        names.sort();
        f.debug_struct("ConverterRegistry")
            .field("converters", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use regex::Regex;

    fn full_match(converter: &dyn Converter, s: &str) -> bool {
        Regex::new(&format!("^(?:{})$", converter.pattern()))
            .unwrap()
            .is_match(s)
    }

    #[test]
    fn test_default_registry_contents() {
        let registry = ConverterRegistry::default();
        for name in ["str", "path", "int", "float", "uuid"] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(!registry.contains("slug"));
    }

    #[test]
    fn test_string_converter_rejects_slash() {
        let c = StringConverter;
        assert!(c.encode(&"a/b".into()).is_err());
        assert!(c.encode(&"".into()).is_err());
        assert_eq!(c.encode(&42i64.into()).unwrap(), "42");
        assert!(!full_match(&c, "a/b"));
    }

    #[test]
    fn test_integer_round_trip() {
        let c = IntegerConverter;
        for v in [0i64, 7, 1234567890] {
            let encoded = c.encode(&ParamValue::Int(v)).unwrap();
            assert!(full_match(&c, &encoded));
            assert_eq!(c.decode(&encoded).unwrap(), ParamValue::Int(v));
        }
        assert!(c.encode(&ParamValue::Int(-1)).is_err());
        assert_eq!(c.encode(&"12".into()).unwrap(), "12");
        assert!(c.decode("99999999999999999999999").is_err());
    }

    #[test]
    fn test_float_round_trip() {
        let c = FloatConverter;
        for v in [0.0f64, 1.0, 0.1, 3.25, 1e21, 123456.789] {
            let encoded = c.encode(&ParamValue::Float(v)).unwrap();
            assert!(full_match(&c, &encoded), "pattern rejects {encoded}");
            assert_eq!(c.decode(&encoded).unwrap(), ParamValue::Float(v));
        }
        assert!(c.encode(&ParamValue::Float(f64::NAN)).is_err());
        assert!(c.encode(&ParamValue::Float(-0.5)).is_err());
    }

    #[test]
    fn test_uuid_round_trip() {
        let c = UuidConverter;
        let id = Uuid::new_v4();
        let encoded = c.encode(&id.into()).unwrap();
        assert!(full_match(&c, &encoded));
        assert_eq!(c.decode(&encoded).unwrap(), ParamValue::Uuid(id));
    }

    #[test]
    fn test_path_converter_accepts_slashes() {
        let c = PathConverter;
        assert!(full_match(&c, "a/b/c"));
        assert!(full_match(&c, ""));
        assert_eq!(c.encode(&"a/b".into()).unwrap(), "a/b");
    }
}
