// SPDX-License-Identifier: MIT OR Apache-2.0

/* ---------------------------------------------------------------------------------------------- */

use std::path::PathBuf;

use crate::pci::PciAddress;

/* ---------------------------------------------------------------------------------------------- */

const DIR_SHAREDMEM: &str = "/dev/shm";

/// Names of the per-channel files and named objects.
///
/// Everything lives under `/dev/shm` and is derived from the card's PCI address and the channel
/// number, so two processes arrive at the same names for the same channel.
#[derive(Clone, Copy, Debug)]
pub struct ChannelPaths {
    pci_address: PciAddress,
    channel: u32,
}

impl ChannelPaths {
    pub fn new(pci_address: PciAddress, channel: u32) -> ChannelPaths {
        ChannelPaths {
            pci_address,
            channel,
        }
    }

    fn make_path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}/AliceO2_RoC_{}_Channel_{}{}",
            DIR_SHAREDMEM, self.pci_address, self.channel, suffix
        ))
    }

    /// The channel's lock file.
    pub fn lock(&self) -> PathBuf {
        self.make_path(".lock")
    }

    /// The file backing the channel's ready FIFO.
    pub fn fifo(&self) -> PathBuf {
        self.make_path("_fifo")
    }

    /// Name of the channel's named mutex (a name, not a path).
    pub fn named_mutex(&self) -> String {
        format!(
            "AliceO2_RoC_{}_Channel_{}_Mutex",
            self.pci_address, self.channel
        )
    }
}

/* ---------------------------------------------------------------------------------------------- */


/* ---------------------------------------------------------------------------------------------- */
