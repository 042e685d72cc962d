use crate::router::{Node, PathParams, Router};
use crate::server::{Channel, MemoryChannel, Message, Scope};
use crate::table::RouteTable;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Command-line interface for tramline
///
/// Loads declarative route tables and exercises the router against them.
#[derive(Parser)]
#[command(name = "tramline")]
#[command(about = "Inspect and exercise route tables", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the routing tree of a table
    Routes {
        /// Path to the route table (YAML)
        #[arg(short, long)]
        table: PathBuf,

        /// List documented endpoints as JSON lines instead of the tree
        #[arg(long, default_value_t = false)]
        schema: bool,
    },
    /// Dispatch one request and print the outbound messages as JSON lines
    Match {
        /// Path to the route table (YAML)
        #[arg(short, long)]
        table: PathBuf,

        /// Request method (ignored with --socket)
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path
        #[arg(short, long)]
        path: String,

        /// Value of the `host` header
        #[arg(long)]
        host: Option<String>,

        /// Raw query string
        #[arg(long, default_value = "")]
        query: String,

        /// Open a socket session instead of sending a request
        #[arg(long, default_value_t = false)]
        socket: bool,

        /// Text frames to deliver over the socket session (repeatable)
        #[arg(long = "send")]
        frames: Vec<String>,
    },
    /// Reverse-resolve a route name to a URL
    UrlFor {
        /// Path to the route table (YAML)
        #[arg(short, long)]
        table: PathBuf,

        /// Route name, `mount:child` for nested routes
        name: String,

        /// Path parameters as KEY=VALUE
        params: Vec<String>,

        /// Resolve to an absolute URL against this base
        #[arg(long)]
        base: Option<String>,
    },
}

/// Execute the parsed command, writing results to stdout.
pub fn run_cli(cli: &Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli.command, &mut out)
}

/// Execute `command`, writing results to `out`.
pub fn execute(command: &Commands, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::Routes { table, schema } => {
            let router = load_router(table)?;
            if *schema {
                for endpoint in router.endpoints() {
                    writeln!(out, "{}", serde_json::to_string(&endpoint)?)?;
                }
            } else {
                write_tree(out, router.nodes(), 0)?;
            }
            Ok(())
        }
        Commands::Match {
            table,
            method,
            path,
            host,
            query,
            socket,
            frames,
        } => {
            let router = load_router(table)?;
            let mut scope = if *socket {
                Scope::socket(path)
            } else {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("Invalid method {method}"))?;
                Scope::request(method, path)
            };
            scope = scope.with_query(query);
            if let Some(host) = host {
                scope = scope.with_header("host", host);
            }

            let (mut app, mut transport) = MemoryChannel::pair();
            if *socket {
                transport.send(Message::SocketConnect)?;
                for text in frames {
                    transport.send(Message::SocketReceive { text: text.clone() })?;
                }
                transport.send(Message::SocketDisconnect { code: 1000 })?;
            }

            let outcome = router.dispatch(scope, &mut app);
            for message in transport.drain() {
                writeln!(out, "{}", serde_json::to_string(&message)?)?;
            }
            outcome.context("Dispatch failed")?;
            Ok(())
        }
        Commands::UrlFor {
            table,
            name,
            params,
            base,
        } => {
            let router = load_router(table)?;
            let params = parse_params(params)?;
            let url_path = router.url_path_for(name, &params)?;
            match base {
                Some(base) => writeln!(out, "{}", url_path.make_absolute_url(base)?)?,
                None => writeln!(out, "{}", serde_json::to_string(&url_path)?)?,
            }
            Ok(())
        }
    }
}

fn load_router(table: &Path) -> Result<Router> {
    RouteTable::load(table)?.build()
}

/// `["id=42", "slug=a-b"]` -> path params. Values stay strings; converters
/// parse them when substituting.
pub(crate) fn parse_params(pairs: &[String]) -> Result<PathParams> {
    let mut params = PathParams::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("parameter '{pair}' is not KEY=VALUE");
        };
        if key.is_empty() {
            bail!("parameter '{pair}' has an empty key");
        }
        params.insert(key, value);
    }
    Ok(params)
}

fn write_tree(out: &mut dyn Write, nodes: &[Node], depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            Node::Route(route) => {
                let methods = route
                    .allowed_methods()
                    .map(|m| m.iter().map(String::as_str).collect::<Vec<_>>().join(","))
                    .unwrap_or_else(|| "*".to_string());
                writeln!(
                    out,
                    "{indent}{:?} {methods} {} -> {}",
                    route.protocol(),
                    route.path(),
                    route.name()
                )?;
            }
            Node::Mount(mount) => {
                writeln!(
                    out,
                    "{indent}Mount {}/ [{}]",
                    mount.path(),
                    mount.name().unwrap_or("-")
                )?;
                write_tree(out, mount.routes().unwrap_or_default(), depth + 1)?;
            }
            Node::Host(host) => {
                writeln!(out, "{indent}Host {} [{}]", host.host(), host.name().unwrap_or("-"))?;
                write_tree(out, host.routes().unwrap_or_default(), depth + 1)?;
            }
            Node::Lifespan(lifespan) => writeln!(out, "{indent}{lifespan:?}")?,
        }
    }
    Ok(())
}
