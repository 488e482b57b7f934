// SPDX-License-Identifier: MIT OR Apache-2.0

/* ---------------------------------------------------------------------------------------------- */

use std::fmt::Debug;

use crate::error::Result;
use crate::parameters::ResetLevel;
use crate::pci::{CardType, PciAddress};
use crate::superpage::Superpage;

/* ---------------------------------------------------------------------------------------------- */

pub(crate) use private::Sealed;
mod private {
    /// Private trait used as a supertrait to make `DmaChannel` non-implementable from outside
    /// this crate: https://jack.wrenn.fyi/blog/private-trait-methods/
    pub trait Sealed {}
}

/// A DMA channel of a readout card.
///
/// All operations are meant to be called from a single thread; the channel performs no background
/// work. The client pushes superpages, calls [`DmaChannel::fill_superpages`] regularly to let the
/// driver feed the card and harvest arrivals, and pops superpages once they are filled.
/// Superpages come back in exactly the order they were pushed.
///
/// This trait is _sealed_ for forward-compatibility reasons, and thus cannot be implemented by
/// users of the crate.
pub trait DmaChannel: Debug + Send + Sealed {
    /// Hands a superpage to the driver. The superpage must satisfy the card's granularity and
    /// alignment requirements and lie inside the registered buffer, and the transfer queue must
    /// have room.
    fn push_superpage(&mut self, superpage: Superpage) -> Result<()>;

    /// Removes and returns the oldest filled superpage.
    fn pop_superpage(&mut self) -> Result<Superpage>;

    /// Peeks the oldest superpage the driver still holds, regardless of its progress.
    fn get_superpage(&self) -> Result<Superpage>;

    /// Remaining room in the transfer queue.
    fn get_transfer_queue_available(&self) -> usize;

    /// Number of filled superpages waiting to be popped.
    fn get_ready_queue_size(&self) -> usize;

    /// The engine tick: feeds free pages to the card and harvests arrivals. Must be called at a
    /// cadence high enough to keep the card's descriptor ring from starving.
    fn fill_superpages(&mut self) -> Result<()>;

    /// Starts DMA. The card may defer actual hardware startup until the first superpage is
    /// available; see [`DmaChannel::fill_superpages`].
    fn start_dma(&mut self) -> Result<()>;

    /// Stops DMA. Best effort: hardware errors during stop are logged, not returned, so stopping
    /// always completes. Stopping an already-stopped channel is a no-op.
    fn stop_dma(&mut self) -> Result<()>;

    /// Resets the channel to the given level. `ResetLevel::Nothing` is a no-op.
    fn reset_channel(&mut self, level: ResetLevel) -> Result<()>;

    fn get_card_type(&self) -> CardType;

    fn get_serial(&mut self) -> Result<Option<i32>>;

    fn get_firmware_info(&mut self) -> Result<Option<String>>;

    fn get_temperature(&mut self) -> Result<Option<f32>>;

    fn get_pci_address(&self) -> PciAddress;

    fn get_numa_node(&self) -> i32;
}

/* ---------------------------------------------------------------------------------------------- */
