//! Per-entity packet mailboxes.
//!
//! Each replicated entity owns one `PacketMailbox<T>` per packet type it can
//! receive or send. The transport thread deposits inbound packets before the
//! gameplay tick; exactly one system drains them per fixed tick. Outbound
//! traffic has two shapes: whole packets queued for the next flush, and a
//! single *pending* packet that several systems accrete fields onto within
//! the same tick (the per-tick `PlayerAction` intent).

use bevy_ecs::component::Component;
use std::collections::VecDeque;

/// Typed packet mailbox attached to a replicated entity.
#[derive(Component)]
pub struct PacketMailbox<T: Send + Sync + 'static> {
    received: VecDeque<T>,
    pending: Option<T>,
    outgoing: Vec<T>,
}

impl<T: Send + Sync + 'static> Default for PacketMailbox<T> {
    fn default() -> Self {
        Self {
            received: VecDeque::new(),
            pending: None,
            outgoing: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> PacketMailbox<T> {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit an inbound packet (transport side). FIFO; bursts of the same
    /// type within one tick are kept in arrival order.
    pub fn push_received(&mut self, packet: T) {
        self.received.push_back(packet);
    }

    /// Drain all inbound packets in arrival order. Called by exactly one
    /// system per fixed tick.
    pub fn drain_received(&mut self) -> impl Iterator<Item = T> + '_ {
        self.received.drain(..)
    }

    /// Number of inbound packets waiting.
    pub fn received_len(&self) -> usize {
        self.received.len()
    }

    /// Queue a complete packet for the next flush.
    pub fn queue_send(&mut self, packet: T) {
        self.outgoing.push(packet);
    }

    /// Mutable access to the pending outbound packet, creating it on first
    /// use. Several systems may accrete onto it within one tick.
    pub fn pending_mut(&mut self) -> &mut T
    where
        T: Default,
    {
        self.pending.get_or_insert_with(T::default)
    }

    /// Whether a pending packet has been started this tick.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Move the pending packet (if any) into the outgoing queue. Called once
    /// at the end of the tick, after all accreting systems have run.
    pub fn flush_pending(&mut self) {
        if let Some(packet) = self.pending.take() {
            self.outgoing.push(packet);
        }
    }

    /// Take everything queued for send (transport side).
    pub fn take_outgoing(&mut self) -> Vec<T> {
        std::mem::take(&mut self.outgoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PlayerAction;
    use crazycanvas_core::AmmoType;

    #[test]
    fn received_packets_drain_in_fifo_order() {
        let mut mailbox = PacketMailbox::<u32>::new();
        mailbox.push_received(1);
        mailbox.push_received(2);
        mailbox.push_received(3);

        let drained: Vec<u32> = mailbox.drain_received().collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert_eq!(mailbox.received_len(), 0);
    }

    #[test]
    fn drain_tolerates_bursts() {
        let mut mailbox = PacketMailbox::<u32>::new();
        for i in 0..64 {
            mailbox.push_received(i);
        }
        assert_eq!(mailbox.drain_received().count(), 64);
    }

    #[test]
    fn pending_packet_accretes_across_systems() {
        let mut mailbox = PacketMailbox::<PlayerAction>::new();

        // Fire system writes first...
        mailbox.pending_mut().fired_ammo = Some(AmmoType::Paint);
        // ...reload system appends onto the same pending packet.
        mailbox.pending_mut().started_reload = true;

        mailbox.flush_pending();
        let sent = mailbox.take_outgoing();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].fired_ammo, Some(AmmoType::Paint));
        assert!(sent[0].started_reload);
    }

    #[test]
    fn flush_without_pending_sends_nothing() {
        let mut mailbox = PacketMailbox::<PlayerAction>::new();
        mailbox.flush_pending();
        assert!(mailbox.take_outgoing().is_empty());
    }

    #[test]
    fn queued_and_pending_packets_flush_together() {
        let mut mailbox = PacketMailbox::<PlayerAction>::new();
        mailbox.queue_send(PlayerAction {
            fired_ammo: Some(AmmoType::Water),
            started_reload: false,
        });
        mailbox.pending_mut().started_reload = true;
        mailbox.flush_pending();

        let sent = mailbox.take_outgoing();
        assert_eq!(sent.len(), 2);
        assert!(mailbox.take_outgoing().is_empty());
    }
}
