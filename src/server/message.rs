use serde::{Deserialize, Serialize};

/// One event on the bidirectional channel between the transport and the router.
///
/// Serialized with a `type` tag, e.g. `{"type":"lifecycle.start.failed","detail":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "lifecycle.start")]
    LifecycleStart,
    #[serde(rename = "lifecycle.start.complete")]
    LifecycleStartComplete,
    #[serde(rename = "lifecycle.start.failed")]
    LifecycleStartFailed { detail: String },
    #[serde(rename = "lifecycle.stop")]
    LifecycleStop,
    #[serde(rename = "lifecycle.stop.complete")]
    LifecycleStopComplete,

    #[serde(rename = "response.start")]
    ResponseStart {
        status: u16,
        headers: Vec<(String, String)>,
    },
    #[serde(rename = "response.body")]
    ResponseBody { body: String },

    #[serde(rename = "socket.connect")]
    SocketConnect,
    #[serde(rename = "socket.accept")]
    SocketAccept,
    #[serde(rename = "socket.receive")]
    SocketReceive { text: String },
    #[serde(rename = "socket.send")]
    SocketSend { text: String },
    #[serde(rename = "socket.close")]
    SocketClose { code: u16 },
    #[serde(rename = "socket.disconnect")]
    SocketDisconnect { code: u16 },
}

impl Message {
    /// The wire name of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Message::LifecycleStart => "lifecycle.start",
            Message::LifecycleStartComplete => "lifecycle.start.complete",
            Message::LifecycleStartFailed { .. } => "lifecycle.start.failed",
            Message::LifecycleStop => "lifecycle.stop",
            Message::LifecycleStopComplete => "lifecycle.stop.complete",
            Message::ResponseStart { .. } => "response.start",
            Message::ResponseBody { .. } => "response.body",
            Message::SocketConnect => "socket.connect",
            Message::SocketAccept => "socket.accept",
            Message::SocketReceive { .. } => "socket.receive",
            Message::SocketSend { .. } => "socket.send",
            Message::SocketClose { .. } => "socket.close",
            Message::SocketDisconnect { .. } => "socket.disconnect",
        }
    }
}
