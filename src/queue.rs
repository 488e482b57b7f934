// SPDX-License-Identifier: MIT OR Apache-2.0

//! The superpage queue: one in-order pipeline partitioned into three contiguous regions.
//!
//! Entries are stored oldest-first in a single deque; `filled` and `arrivals` are the region
//! lengths, so the layout is always `[Filled | Arrivals | Pushing]`. An entry enters at the tail
//! of Pushing, moves to Arrivals once all its pages have been handed to the card, moves to Filled
//! once all its pages have arrived, and leaves from the head of Filled. Region transitions only
//! move the boundaries, so insertion order is preserved end to end.

/* ---------------------------------------------------------------------------------------------- */

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::superpage::Superpage;

/* ---------------------------------------------------------------------------------------------- */

/// A superpage plus the driver-side bookkeeping for slicing it into DMA pages.
#[derive(Clone, Debug)]
pub(crate) struct SuperpageEntry {
    pub superpage: Superpage,
    /// Bus address of the start of the superpage (buffer bus base + superpage offset).
    pub bus_address: u64,
    /// Number of DMA pages the superpage holds.
    pub max_pages: usize,
    /// Number of pages already pushed into the card's free FIFO.
    pub pushed_pages: usize,
}

impl SuperpageEntry {
    pub fn new(superpage: Superpage, bus_address: u64, max_pages: usize) -> SuperpageEntry {
        SuperpageEntry {
            superpage,
            bus_address,
            max_pages,
            pushed_pages: 0,
        }
    }

    pub fn unpushed_pages(&self) -> usize {
        self.max_pages - self.pushed_pages
    }

    pub fn is_pushed(&self) -> bool {
        self.pushed_pages == self.max_pages
    }
}

/* ---------------------------------------------------------------------------------------------- */

#[derive(Debug)]
pub(crate) struct SuperpageQueue {
    entries: VecDeque<SuperpageEntry>,
    /// Length of the Filled region (front of `entries`).
    filled: usize,
    /// Length of the Arrivals region (directly after Filled).
    arrivals: usize,
    /// Capacity of Pushing + Arrivals together.
    transfer_capacity: usize,
    /// Capacity of Filled.
    ready_capacity: usize,
}

impl SuperpageQueue {
    pub fn new(transfer_capacity: usize, ready_capacity: usize) -> SuperpageQueue {
        SuperpageQueue {
            entries: VecDeque::with_capacity(transfer_capacity + ready_capacity),
            filled: 0,
            arrivals: 0,
            transfer_capacity,
            ready_capacity,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.filled = 0;
        self.arrivals = 0;
    }

    /// Appends an entry to the tail of Pushing.
    pub fn add_to_queue(&mut self, entry: SuperpageEntry) -> Result<()> {
        if self.queue_available() == 0 {
            return Err(Error::QueueFull);
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// The front of Pushing joins the tail of Arrivals.
    pub fn remove_from_pushing_queue(&mut self) {
        debug_assert!(self.pushing_len() > 0);
        self.arrivals += 1;
    }

    /// The front of Arrivals joins the tail of Filled.
    pub fn move_from_arrivals_to_filled_queue(&mut self) {
        debug_assert!(self.arrivals > 0);
        debug_assert!(self.filled < self.ready_capacity);
        self.arrivals -= 1;
        self.filled += 1;
    }

    /// Pops the head of Filled.
    pub fn remove_from_filled_queue(&mut self) -> Result<SuperpageEntry> {
        if self.filled == 0 {
            return Err(Error::QueueEmpty);
        }
        self.filled -= 1;
        Ok(self.entries.pop_front().expect("filled region not empty"))
    }

    pub fn pushing_len(&self) -> usize {
        self.entries.len() - self.filled - self.arrivals
    }

    pub fn arrivals_len(&self) -> usize {
        self.arrivals
    }

    pub fn filled_len(&self) -> usize {
        self.filled
    }

    pub fn filled_is_full(&self) -> bool {
        self.filled == self.ready_capacity
    }

    /// Remaining slack on the transfer side (Pushing + Arrivals).
    pub fn queue_available(&self) -> usize {
        self.transfer_capacity - (self.pushing_len() + self.arrivals_len())
    }

    pub fn pushing_front(&self) -> Option<&SuperpageEntry> {
        self.entries.get(self.filled + self.arrivals)
    }

    pub fn pushing_front_mut(&mut self) -> Option<&mut SuperpageEntry> {
        let index = self.filled + self.arrivals;
        self.entries.get_mut(index)
    }

    /// The oldest entry that has not been completely received: the head of Arrivals, or the head
    /// of Pushing when Arrivals is empty. This is the entry the oldest outstanding descriptors
    /// in the hardware ring belong to.
    pub fn receiving_front(&self) -> Option<&SuperpageEntry> {
        self.entries.get(self.filled)
    }

    pub fn receiving_front_mut(&mut self) -> Option<&mut SuperpageEntry> {
        let index = self.filled;
        self.entries.get_mut(index)
    }

    /// The oldest entry overall, regardless of region.
    pub fn front_superpage(&self) -> Option<Superpage> {
        self.entries.front().map(|entry| entry.superpage)
    }
}

/* ---------------------------------------------------------------------------------------------- */


/* ---------------------------------------------------------------------------------------------- */
