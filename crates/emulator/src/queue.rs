//! FIFO packet queues between the device and the link driver

use protocol::Envelope;
use std::collections::VecDeque;
use tracing::trace;

/// One direction of envelope traffic
///
/// Strict FIFO: envelopes leave in the order they were pushed and are never
/// dropped by the queue itself.
#[derive(Debug)]
pub struct PacketQueue {
    name: &'static str,
    packets: VecDeque<Envelope>,
}

impl PacketQueue {
    /// Create an empty queue; `name` only labels log output
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            packets: VecDeque::new(),
        }
    }

    pub fn push(&mut self, envelope: Envelope) {
        self.packets.push_back(envelope);
        trace!(queue = self.name, depth = self.packets.len(), "Queued envelope");
    }

    /// Remove and return the oldest envelope
    pub fn pop(&mut self) -> Option<Envelope> {
        let envelope = self.packets.pop_front()?;
        trace!(queue = self.name, depth = self.packets.len(), "Dequeued envelope");
        Some(envelope)
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Oldest envelope, left in place
    pub fn front(&self) -> Option<&Envelope> {
        self.packets.front()
    }
}
