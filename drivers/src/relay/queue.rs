//! Bounded FIFO of fixed-size blocks between one producer and one consumer.
//!
//! Every slot carries an explicit state, so "empty" and "full" never share
//! a cursor configuration and all `depth` slots are usable:
//!
//! | From       | To         | On                                      |
//! |------------|------------|-----------------------------------------|
//! | `Free`     | `Filling`  | [`RelayQueue::try_reserve_for_fill`]    |
//! | `Filling`  | `Ready`    | [`RelayQueue::commit_filled`]           |
//! | `Filling`  | `Free`     | [`RelayQueue::abandon_fill`]            |
//! | `Ready`    | `Draining` | [`RelayQueue::try_reserve_for_drain`]   |
//! | `Draining` | `Ready`    | [`RelayQueue::abandon_drain`]           |
//! | `Draining` | `Free`     | [`RelayQueue::commit_drained`]          |
//!
//! A reserved [`Slot`] owns its buffer; the queue only gets it back through
//! a commit. The buffer of a slot being filled can therefore never be the
//! buffer of a slot being drained.
//!
//! The queue takes `&mut self` everywhere. Shared between interrupt
//! handlers, it must sit behind an [`IrqSpinLock`](common::sync::IrqSpinLock).

use alloc::vec;
use alloc::vec::Vec;

use crate::hal::serial::UsartError;
use crate::usart::Buffer;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SlotState {
    Free,
    Filling,
    Ready,
    Draining,
}

/// Receipt for a reserved slot. Only the queue can create one.
#[derive(Debug, PartialEq, Eq)]
pub struct SlotTicket {
    index: usize,
}

impl SlotTicket {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A reserved slot: its ticket plus the block buffer it lends out.
#[derive(Debug)]
pub struct Slot {
    ticket: SlotTicket,
    buffer: Buffer,
}

impl Slot {
    pub fn index(&self) -> usize {
        self.ticket.index
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Split so the buffer can be lent to a transfer while the ticket is
    /// kept to rebuild the slot afterwards.
    pub fn into_parts(self) -> (SlotTicket, Buffer) {
        (self.ticket, self.buffer)
    }

    pub fn from_parts(ticket: SlotTicket, buffer: Buffer) -> Self {
        Self { ticket, buffer }
    }
}

struct Entry {
    state: SlotState,
    /// `None` while the slot is reserved.
    buffer: Option<Buffer>,
}

pub struct RelayQueue {
    entries: Vec<Entry>,
    block_size: usize,
    /// Next slot to fill.
    head: usize,
    /// Next slot to drain.
    tail: usize,
    /// Slots in `Ready` or `Draining` state.
    filled: usize,
}

impl RelayQueue {
    /// Allocate `depth` blocks of `block_size` bytes.
    ///
    /// Fails with [`UsartError::InvalidArgument`] if `depth < 2` or
    /// `block_size == 0`.
    pub fn new(depth: usize, block_size: usize) -> Result<Self, UsartError> {
        if depth < 2 || block_size == 0 {
            return Err(UsartError::InvalidArgument);
        }

        let entries = (0..depth)
            .map(|_| Entry {
                state: SlotState::Free,
                buffer: Some(vec![0u8; block_size].into_boxed_slice()),
            })
            .collect();

        Ok(Self {
            entries,
            block_size,
            head: 0,
            tail: 0,
            filled: 0,
        })
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Slots committed by the producer and not yet drained, including one
    /// being drained.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// No slot left for the producer.
    pub fn is_full(&self) -> bool {
        self.entries[self.head].state != SlotState::Free
    }

    /// Blocks committed and waiting for a drain reservation.
    pub fn ready(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == SlotState::Ready)
            .count()
    }

    /// Reserve the next slot for the producer.
    ///
    /// Returns `None` if the queue is full or a fill is already
    /// outstanding.
    pub fn try_reserve_for_fill(&mut self) -> Option<Slot> {
        let index = self.head;
        let entry = &mut self.entries[index];
        if entry.state != SlotState::Free {
            return None;
        }
        let buffer = entry.buffer.take()?;
        entry.state = SlotState::Filling;
        Some(Slot {
            ticket: SlotTicket { index },
            buffer,
        })
    }

    /// [`try_reserve_for_fill`](Self::try_reserve_for_fill), reporting a
    /// full queue as [`UsartError::Overrun`].
    pub fn reserve_for_fill(&mut self) -> Result<Slot, UsartError> {
        self.try_reserve_for_fill().ok_or(UsartError::Overrun)
    }

    /// Publish a filled slot to the consumer.
    ///
    /// The slot is handed back with [`UsartError::InvalidArgument`] if it is
    /// not the outstanding fill reservation.
    pub fn commit_filled(&mut self, slot: Slot) -> Result<(), (UsartError, Slot)> {
        let slot = self.check(slot, self.head, SlotState::Filling)?;
        self.restore(slot, SlotState::Ready);
        self.head = (self.head + 1) % self.depth();
        self.filled += 1;
        Ok(())
    }

    /// Return a fill reservation without publishing it.
    pub fn abandon_fill(&mut self, slot: Slot) -> Result<(), (UsartError, Slot)> {
        let slot = self.check(slot, self.head, SlotState::Filling)?;
        self.restore(slot, SlotState::Free);
        Ok(())
    }

    /// Reserve the oldest ready slot for the consumer.
    ///
    /// Returns `None` if nothing is ready or a drain is already
    /// outstanding.
    pub fn try_reserve_for_drain(&mut self) -> Option<Slot> {
        let index = self.tail;
        let entry = &mut self.entries[index];
        if entry.state != SlotState::Ready {
            return None;
        }
        let buffer = entry.buffer.take()?;
        entry.state = SlotState::Draining;
        Some(Slot {
            ticket: SlotTicket { index },
            buffer,
        })
    }

    /// Return a drain reservation without consuming it; the block stays
    /// first in line.
    pub fn abandon_drain(&mut self, slot: Slot) -> Result<(), (UsartError, Slot)> {
        let slot = self.check(slot, self.tail, SlotState::Draining)?;
        self.restore(slot, SlotState::Ready);
        Ok(())
    }

    /// Hand a drained slot back to the producer side.
    pub fn commit_drained(&mut self, slot: Slot) -> Result<(), (UsartError, Slot)> {
        let slot = self.check(slot, self.tail, SlotState::Draining)?;
        self.restore(slot, SlotState::Free);
        self.tail = (self.tail + 1) % self.depth();
        self.filled -= 1;
        Ok(())
    }

    /// A ticket is only honoured at the cursor its reservation was made
    /// from, and only with a block-sized buffer.
    fn check(&self, slot: Slot, cursor: usize, expected: SlotState) -> Result<Slot, (UsartError, Slot)> {
        let index = slot.ticket.index;
        let state = self.entries.get(index).map(|e| e.state);
        if index == cursor && state == Some(expected) && slot.buffer.len() == self.block_size {
            Ok(slot)
        } else {
            Err((UsartError::InvalidArgument, slot))
        }
    }

    fn restore(&mut self, slot: Slot, state: SlotState) {
        let entry = &mut self.entries[slot.ticket.index];
        entry.buffer = Some(slot.buffer);
        entry.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fill the next slot with `byte` and commit it.
    fn fill(q: &mut RelayQueue, byte: u8) -> usize {
        let mut slot = q.try_reserve_for_fill().unwrap();
        slot.buffer_mut().fill(byte);
        let index = slot.index();
        q.commit_filled(slot).unwrap();
        index
    }

    fn drain(q: &mut RelayQueue) -> u8 {
        let slot = q.try_reserve_for_drain().unwrap();
        let byte = slot.buffer()[0];
        assert!(slot.buffer().iter().all(|&b| b == byte));
        q.commit_drained(slot).unwrap();
        byte
    }

    #[test]
    fn depth_and_block_size_are_validated() {
        assert!(matches!(RelayQueue::new(1, 128), Err(UsartError::InvalidArgument)));
        assert!(matches!(RelayQueue::new(2, 0), Err(UsartError::InvalidArgument)));
        let q = RelayQueue::new(2, 128).unwrap();
        assert_eq!(q.depth(), 2);
        assert_eq!(q.block_size(), 128);
        assert!(q.is_empty());
    }

    #[test]
    fn full_after_depth_commits_without_drain() {
        for depth in 2..6 {
            let mut q = RelayQueue::new(depth, 4).unwrap();
            for i in 0..depth {
                fill(&mut q, i as u8);
            }
            assert_eq!(q.len(), depth);
            assert!(q.is_full());
            assert!(q.try_reserve_for_fill().is_none());
            assert!(matches!(q.reserve_for_fill(), Err(UsartError::Overrun)));
        }
    }

    #[test]
    fn drains_in_fill_order() {
        let mut q = RelayQueue::new(3, 8).unwrap();
        let s1 = fill(&mut q, 1);
        let s2 = fill(&mut q, 2);
        let s3 = fill(&mut q, 3);
        assert_eq!((s1, s2, s3), (0, 1, 2));

        assert_eq!(drain(&mut q), 1);
        assert_eq!(drain(&mut q), 2);
        assert_eq!(drain(&mut q), 3);
        assert!(q.try_reserve_for_drain().is_none());
    }

    #[test]
    fn fifo_survives_wraparound() {
        let mut q = RelayQueue::new(2, 1).unwrap();
        for round in 0..10u8 {
            fill(&mut q, round);
            fill(&mut q, round.wrapping_add(100));
            assert_eq!(drain(&mut q), round);
            assert_eq!(drain(&mut q), round.wrapping_add(100));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn fill_and_drain_hold_different_buffers() {
        let mut q = RelayQueue::new(2, 4).unwrap();
        fill(&mut q, 0xAA);

        let draining = q.try_reserve_for_drain().unwrap();
        let mut filling = q.try_reserve_for_fill().unwrap();
        assert_ne!(draining.index(), filling.index());
        filling.buffer_mut().fill(0x55);
        assert_eq!(draining.buffer(), &[0xAA; 4]);

        // One outstanding reservation per side.
        assert!(q.try_reserve_for_fill().is_none());
        assert!(q.try_reserve_for_drain().is_none());

        q.commit_filled(filling).unwrap();
        q.commit_drained(draining).unwrap();
        assert_eq!(drain(&mut q), 0x55);
    }

    #[test]
    fn draining_slot_blocks_the_producer_until_committed() {
        let mut q = RelayQueue::new(2, 2).unwrap();
        fill(&mut q, 1);
        let draining = q.try_reserve_for_drain().unwrap();
        fill(&mut q, 2);
        assert!(q.try_reserve_for_fill().is_none());

        q.commit_drained(draining).unwrap();
        assert!(q.try_reserve_for_fill().is_some());
    }

    #[test]
    fn mismatched_commits_hand_the_slot_back() {
        let mut q = RelayQueue::new(2, 4).unwrap();
        let slot = q.try_reserve_for_fill().unwrap();

        // A fill reservation cannot be committed as drained.
        let (err, slot) = q.commit_drained(slot).unwrap_err();
        assert_eq!(err, UsartError::InvalidArgument);

        // Nor with a buffer of the wrong size.
        let (ticket, _) = slot.into_parts();
        let short = Slot::from_parts(ticket, vec![0u8; 3].into_boxed_slice());
        let (err, slot) = q.commit_filled(short).unwrap_err();
        assert_eq!(err, UsartError::InvalidArgument);

        let (ticket, _) = slot.into_parts();
        q.commit_filled(Slot::from_parts(ticket, vec![9u8; 4].into_boxed_slice()))
            .unwrap();
        assert_eq!(drain(&mut q), 9);
    }

    #[test]
    fn abandoned_fill_is_reused_and_never_drained() {
        let mut q = RelayQueue::new(2, 4).unwrap();
        let slot = q.try_reserve_for_fill().unwrap();
        let index = slot.index();
        q.abandon_fill(slot).unwrap();
        assert!(q.try_reserve_for_drain().is_none());
        assert_eq!(q.try_reserve_for_fill().unwrap().index(), index);
    }

    #[test]
    fn abandoned_drain_stays_first_in_line() {
        let mut q = RelayQueue::new(3, 2).unwrap();
        fill(&mut q, 1);
        fill(&mut q, 2);
        let slot = q.try_reserve_for_drain().unwrap();
        q.abandon_drain(slot).unwrap();
        assert_eq!(q.ready(), 2);
        assert_eq!(drain(&mut q), 1);
        assert_eq!(drain(&mut q), 2);
    }
}
