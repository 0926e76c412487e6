//! Connected humans and their outbound message queues.

use crate::protocol::ServerMessage;
use derive_getters::Getters;
use derive_more::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("#{_0}")]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Allocates a fresh process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Sending side of a connection's outbound queue.
///
/// A single writer task drains the queue, so messages from the session task
/// and from the connection's own read loop never interleave mid-write.
#[derive(Debug, Clone)]
pub struct Outbox {
    owner: ParticipantId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Outbox {
    /// Creates an outbox and the receiver its writer task drains.
    pub fn channel(owner: ParticipantId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { owner, tx }, rx)
    }

    /// Queues a message. Returns `false` once the connection has gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                debug!(participant = %self.owner, "Dropping message for closed connection");
                false
            }
        }
    }
}

/// A human participant as seen by the matchmaker and sessions.
#[derive(Debug, Clone, Getters, derive_new::new)]
pub struct Participant {
    /// Connection id.
    id: ParticipantId,
    /// Display name, derived from the remote address.
    name: String,
    /// Outbound queue to the participant's socket.
    outbox: Outbox,
}

impl Participant {
    /// Creates a participant with a fresh id and outbox.
    pub fn channel(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ParticipantId::next();
        let (outbox, rx) = Outbox::channel(id);
        (Self::new(id, name.into(), outbox), rx)
    }

    /// Queues a message for this participant.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbox.send(message)
    }
}
