//! # Route Tables
//!
//! Declarative routing trees in YAML, wired to the [`echo`](crate::echo)
//! endpoints. Used by the CLI to inspect matching and reverse lookup without
//! writing handlers.
//!
//! ```yaml
//! runtime:
//!   redirect_slashes: true
//! routes:
//!   - path: /users/{id:int}
//!     name: get_user
//!     methods: [GET, DELETE]
//!   - socket: /feed
//!     name: feed
//!   - mount: /api
//!     name: api
//!     routes:
//!       - path: /items
//!         name: items
//!   - host: "{tenant}.example.com"
//!     name: tenant
//!     routes:
//!       - path: /
//!         name: home
//! ```
//!
//! Each entry carries exactly one of `path`, `socket`, `mount` or `host`.

use crate::dispatcher::Endpoint;
use crate::echo::{echo_handler, echo_session};
use crate::router::{Host, Mount, Node, Route, Router, RouterBuilder};
use crate::runtime_config::RuntimeConfig;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

fn default_true() -> bool {
    true
}

/// One node of a route table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteEntry {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub socket: Option<String>,
    #[serde(default)]
    pub mount: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Request routes only; omitted means `GET` (and `HEAD`)
    #[serde(default)]
    pub methods: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub include_in_schema: bool,
    /// Children of a `mount` or `host` entry
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteTable {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    pub routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse route table")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read route table {}", path.display()))?;
        let table = Self::from_yaml_str(&yaml)
            .with_context(|| format!("Invalid route table {}", path.display()))?;
        info!(
            table = %path.display(),
            entries = table.routes.len(),
            "Route table loaded"
        );
        Ok(table)
    }

    /// Build a router whose endpoints echo what they matched.
    pub fn build(&self) -> Result<Router> {
        let mut builder = RouterBuilder::from_config(&self.runtime);
        for node in build_nodes(&self.routes)? {
            builder = builder.node(node);
        }
        Ok(builder.build())
    }
}

fn build_nodes(entries: &[RouteEntry]) -> Result<Vec<Node>> {
    entries.iter().map(build_node).collect()
}

fn build_node(entry: &RouteEntry) -> Result<Node> {
    let targets = [&entry.path, &entry.socket, &entry.mount, &entry.host]
        .iter()
        .filter(|t| t.is_some())
        .count();
    if targets != 1 {
        bail!(
            "route entry {:?} must set exactly one of path, socket, mount or host",
            entry.name.as_deref().unwrap_or("<unnamed>")
        );
    }
    let nested = entry.mount.is_some() || entry.host.is_some();
    if !nested && !entry.routes.is_empty() {
        bail!("only mount and host entries may carry nested routes");
    }
    if entry.methods.is_some() && entry.path.is_none() {
        bail!("methods apply to path entries only");
    }

    if let Some(path) = &entry.path {
        let mut endpoint = Endpoint::handler(echo_handler);
        if let Some(name) = &entry.name {
            endpoint = endpoint.named(name);
        }
        let mut route = Route::new(path, endpoint)
            .with_context(|| format!("Invalid route {path}"))?
            .include_in_schema(entry.include_in_schema);
        if let Some(methods) = &entry.methods {
            route = route.methods(methods)?;
        }
        return Ok(route.into());
    }

    if let Some(path) = &entry.socket {
        let mut endpoint = Endpoint::session(echo_session);
        if let Some(name) = &entry.name {
            endpoint = endpoint.named(name);
        }
        let route = Route::socket(path, endpoint)
            .with_context(|| format!("Invalid socket route {path}"))?;
        return Ok(route.into());
    }

    let children = build_nodes(&entry.routes)?;
    if let Some(prefix) = &entry.mount {
        let mut mount =
            Mount::new(prefix, children).with_context(|| format!("Invalid mount {prefix}"))?;
        if let Some(name) = &entry.name {
            mount = mount.named(name);
        }
        return Ok(mount.into());
    }
    if let Some(host) = &entry.host {
        let mut gate = Host::new(host, children).with_context(|| format!("Invalid host {host}"))?;
        if let Some(name) = &entry.name {
            gate = gate.named(name);
        }
        return Ok(gate.into());
    }
    bail!("empty route entry")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_entry_needs_exactly_one_target() {
        let table = RouteTable::from_yaml_str(
            "routes:\n  - path: /a\n    mount: /b\n",
        )
        .unwrap();
        let err = table.build().unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(RouteTable::from_yaml_str("routes:\n  - path: /a\n    verb: GET\n").is_err());
    }

    #[test]
    fn test_runtime_section_defaults() {
        let table = RouteTable::from_yaml_str("routes: []\n").unwrap();
        assert_eq!(table.runtime, RuntimeConfig::default());
        assert!(table.build().unwrap().redirect_slashes());
    }
}
