//! The bidirectional message channel between a transport and the router.
//!
//! [`Channel`] is the boundary contract: `receive` waits for the next inbound
//! event, `send` emits an outbound one. [`MemoryChannel`] is an in-process
//! implementation over `may` MPSC channels. Inside a coroutine, `receive`
//! suspends the coroutine instead of blocking its worker thread.

use super::message::Message;
use may::sync::mpsc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The other end of the channel was dropped
    #[error("channel closed")]
    Closed,
}

/// Bidirectional event channel.
pub trait Channel: Send {
    /// Wait for the next inbound message.
    fn receive(&mut self) -> Result<Message, ChannelError>;

    /// Emit an outbound message.
    fn send(&mut self, message: Message) -> Result<(), ChannelError>;
}

/// In-process channel endpoint.
///
/// Endpoints come in pairs: what one side sends, the other receives.
pub struct MemoryChannel {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
}

impl MemoryChannel {
    /// Create two connected endpoints: `(app side, transport side)`.
    #[must_use]
    pub fn pair() -> (MemoryChannel, MemoryChannel) {
        let (to_app, app_rx) = mpsc::channel();
        let (to_transport, transport_rx) = mpsc::channel();
        (
            MemoryChannel {
                tx: to_transport,
                rx: app_rx,
            },
            MemoryChannel {
                tx: to_app,
                rx: transport_rx,
            },
        )
    }

    /// Drain every message currently queued without waiting.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push(message);
        }
        out
    }
}

impl Channel for MemoryChannel {
    fn receive(&mut self) -> Result<Message, ChannelError> {
        self.rx.recv().map_err(|_| ChannelError::Closed)
    }

    fn send(&mut self, message: Message) -> Result<(), ChannelError> {
        self.tx.send(message).map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_pair_is_crossed() {
        let (mut app, mut transport) = MemoryChannel::pair();
        transport.send(Message::LifecycleStart).unwrap();
        assert_eq!(app.receive().unwrap(), Message::LifecycleStart);
        app.send(Message::LifecycleStartComplete).unwrap();
        assert_eq!(transport.drain(), vec![Message::LifecycleStartComplete]);
    }

    #[test]
    fn test_receive_after_peer_dropped() {
        let (mut app, transport) = MemoryChannel::pair();
        drop(transport);
        assert_eq!(app.receive(), Err(ChannelError::Closed));
    }
}
