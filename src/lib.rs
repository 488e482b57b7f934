// SPDX-License-Identifier: MIT OR Apache-2.0

//! A crate for user-space DMA readout from ALICE C-RORC PCIe data-acquisition cards.
//!
//! The driver interface revolves around the [`DmaChannel`](channel::DmaChannel) trait: the
//! client registers a large DMA buffer, hands the driver __superpages__ (big contiguous slices
//! of that buffer), and the driver programs the card to stream fixed-size DMA pages into them,
//! signalling when each superpage is full. Superpages come back in exactly the order they were
//! pushed.
//!
//! Two backends implement the trait: the C-RORC backend
//! ([`CrorcDmaChannel`](backends::crorc::CrorcDmaChannel)), which drives real hardware through a
//! [`CardOps`](backends::crorc::card::CardOps) collaborator, and a software-only dummy backend
//! for exercising client code.
//!
//! ## Reading out a channel
//!
//! The loop is always the same: push superpages while the transfer queue has room, call
//! [`fill_superpages`](channel::DmaChannel::fill_superpages) at a steady cadence, and pop
//! whatever shows up in the ready queue. With the dummy backend this works without hardware:
//!
//! ```
//! use rorc_driver::channel::DmaChannel;
//! use rorc_driver::factory::ChannelFactory;
//! use rorc_driver::parameters::{BufferParameters, CardId, Parameters};
//! use rorc_driver::superpage::Superpage;
//!
//! let factory = ChannelFactory::new();
//! let parameters = Parameters::new(CardId::Serial(factory.dummy_serial_number()), 0)
//!     .set_buffer_parameters(BufferParameters::Memory { address: 0, size: 1024 * 1024 });
//!
//! let mut channel = factory.get_dma_channel(&parameters)?;
//! channel.start_dma()?;
//!
//! channel.push_superpage(Superpage::new(0, 32 * 1024))?;
//! channel.fill_superpages()?;
//!
//! let superpage = channel.pop_superpage()?;
//! assert!(superpage.is_ready());
//! channel.stop_dma()?;
//! # rorc_driver::error::Result::Ok(())
//! ```
//!
//! ## Opening real hardware
//!
//! The C-RORC backend does not enumerate PCI devices or map memory itself; the embedding
//! application provides the collaborators: a [`Bar`](bar::Bar) for register access (wrapped in
//! [`Crorc`](backends::crorc::card::Crorc)), [`DmaBuffer`](buffer::DmaBuffer)s for the data
//! buffer and the ready FIFO, and normally a [`ChannelLock`](interprocess::ChannelLock) for
//! cross-process exclusive ownership of the channel.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rorc_driver::backends::crorc::card::Crorc;
//! use rorc_driver::backends::crorc::{CrorcCollaborators, CrorcDmaChannel};
//! use rorc_driver::bar::MemoryBar;
//! use rorc_driver::channel_paths::ChannelPaths;
//! use rorc_driver::interprocess::{ChannelLock, LockMode};
//! use rorc_driver::parameters::{CardId, Parameters};
//!
//! let address = "42:00.0".parse()?;
//! let parameters = Parameters::new(CardId::Address(address), 0);
//!
//! let bar: MemoryBar = unimplemented!("map BAR 0 of the device");
//! let buffer = unimplemented!("register the client buffer for DMA");
//! let fifo_buffer = unimplemented!("register the ready FIFO memory for DMA");
//! let lock = ChannelLock::acquire(&ChannelPaths::new(address, 0), LockMode::Try)?;
//!
//! let mut channel = CrorcDmaChannel::new(&parameters, CrorcCollaborators {
//!     ops: Box::new(Crorc::new(bar)),
//!     buffer,
//!     fifo_buffer,
//!     lock: Some(lock),
//! })?;
//! # rorc_driver::error::Result::Ok(())
//! ```

/* ---------------------------------------------------------------------------------------------- */

pub mod backends;
pub mod bar;
pub mod buffer;
pub mod channel;
pub mod channel_paths;
pub mod data_format;
pub mod error;
pub mod factory;
pub mod firmware;
pub mod interprocess;
#[cfg(feature = "mocks")]
pub mod mocks;
pub mod options;
pub mod parameters;
pub mod pci;
mod queue;
pub mod ready_fifo;
pub mod superpage;
pub mod utils;

/* ---------------------------------------------------------------------------------------------- */
