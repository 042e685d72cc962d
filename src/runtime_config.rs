//! # Runtime Configuration Module
//!
//! Environment-driven settings for the dispatch runtime.
//!
//! ## Environment Variables
//!
//! ### `TRAMLINE_WORKER_STACK_SIZE`
//!
//! Stack size for blocking worker threads. These are plain OS threads running
//! arbitrary handler code, so the default matches the std thread default.
//! Accepts decimal (`2097152`) or hexadecimal (`0x200000`). Default: `0x200000` (2 MiB).
//!
//! ### `TRAMLINE_BLOCKING_WORKERS`
//!
//! Number of threads in the blocking worker pool. Default: `4`.
//!
//! ### `TRAMLINE_REDIRECT_SLASHES`
//!
//! Whether routers built with [`RouterBuilder::from_config`](crate::router::RouterBuilder::from_config)
//! redirect to the trailing-slash variant of an unmatched path. Default: `true`.
//!
//! ## Usage
//!
//! ```rust
//! use tramline::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Worker stack size: {} bytes", config.worker_stack_size);
//! ```
//!
//! Unparseable values fall back to the default.

use serde::Deserialize;
use std::env;

pub const DEFAULT_WORKER_STACK_SIZE: usize = 0x20_0000;
const DEFAULT_BLOCKING_WORKERS: usize = 4;

/// Runtime configuration loaded from environment variables or a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Stack size for blocking worker threads in bytes
    pub worker_stack_size: usize,
    pub blocking_workers: usize,
    pub redirect_slashes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_stack_size: DEFAULT_WORKER_STACK_SIZE,
            blocking_workers: DEFAULT_BLOCKING_WORKERS,
            redirect_slashes: true,
        }
    }
}

/// Parse a size given in decimal or `0x`-prefixed hexadecimal.
fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            worker_stack_size: lookup("TRAMLINE_WORKER_STACK_SIZE")
                .and_then(|v| parse_size(&v))
                .filter(|n| *n > 0)
                .unwrap_or(defaults.worker_stack_size),
            blocking_workers: lookup("TRAMLINE_BLOCKING_WORKERS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.blocking_workers),
            redirect_slashes: lookup("TRAMLINE_REDIRECT_SLASHES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.redirect_slashes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.worker_stack_size, 2 * 1024 * 1024);
        assert_eq!(config.blocking_workers, 4);
        assert!(config.redirect_slashes);
    }

    #[test]
    fn test_hex_and_decimal_worker_stack_size() {
        let hex = RuntimeConfig::from_lookup(lookup_from(&[(
            "TRAMLINE_WORKER_STACK_SIZE",
            "0x400000",
        )]));
        assert_eq!(hex.worker_stack_size, 0x40_0000);
        let dec = RuntimeConfig::from_lookup(lookup_from(&[(
            "TRAMLINE_WORKER_STACK_SIZE",
            "1048576",
        )]));
        assert_eq!(dec.worker_stack_size, 1024 * 1024);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("TRAMLINE_WORKER_STACK_SIZE", "big"),
            ("TRAMLINE_BLOCKING_WORKERS", "0"),
            ("TRAMLINE_REDIRECT_SLASHES", "nope"),
        ]));
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_redirect_slashes_disabled() {
        let config =
            RuntimeConfig::from_lookup(lookup_from(&[("TRAMLINE_REDIRECT_SLASHES", "false")]));
        assert!(!config.redirect_slashes);
    }
}
