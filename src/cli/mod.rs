//! # CLI Module
//!
//! Command-line front end over [`RouteTable`](crate::table::RouteTable) files.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print the routing tree, or with `--schema` the documented endpoints:
//!
//! ```bash
//! tramline routes --table routes.yaml
//! tramline routes --table routes.yaml --schema
//! ```
//!
//! ### `match`
//!
//! Dispatch one request (or socket session) and print every message the router
//! sent back, one JSON object per line:
//!
//! ```bash
//! tramline match --table routes.yaml --method POST --path /users/42
//! tramline match --table routes.yaml --path / --host acme.example.com
//! tramline match --table routes.yaml --path /feed --socket --send hello
//! ```
//!
//! ### `url-for`
//!
//! Reverse-resolve a route name:
//!
//! ```bash
//! tramline url-for --table routes.yaml api:items
//! tramline url-for --table routes.yaml get_user id=42 --base https://example.org/
//! ```

mod commands;


pub use commands::{execute, run_cli, Cli, Commands};
