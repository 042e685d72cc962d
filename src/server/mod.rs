//! # Server Module
//!
//! The transport-facing types the router consumes and produces:
//!
//! - [`Scope`] - the inbound request descriptor, derived per nesting level,
//! - [`Channel`] / [`Message`] - the bidirectional event channel,
//! - [`Request`] / [`Response`] - what request handlers see and return,
//! - [`Session`] - what socket session handlers drive.
//!
//! Wire-level parsing belongs to the transport. [`MemoryChannel`] connects the
//! router to an in-process peer and is what the CLI and the tests use.

mod channel;
mod message;
mod request;
mod response;
mod scope;

pub use channel::{Channel, ChannelError, MemoryChannel};
pub use message::Message;
pub use request::{Request, Session};
pub use response::{HeaderVec, Response, MAX_INLINE_HEADERS};
pub use scope::{Scope, ScopeKind};
