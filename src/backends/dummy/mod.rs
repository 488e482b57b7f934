// SPDX-License-Identifier: MIT OR Apache-2.0

//! A software-only pass-through channel.
//!
//! No hardware is involved: `fill_superpages` moves pushed superpages straight to the ready
//! queue, marking them fully received. The channel satisfies the same public contract as the
//! real backends, which makes it useful for exercising client code.

/* ---------------------------------------------------------------------------------------------- */

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::channel::{DmaChannel, Sealed};
use crate::error::{Error, Result};
use crate::factory::DUMMY_SERIAL_NUMBER;
use crate::parameters::{Parameters, ResetLevel};
use crate::pci::{CardType, PciAddress};
use crate::superpage::Superpage;
use crate::utils::is_multiple;

/* ---------------------------------------------------------------------------------------------- */

const TRANSFER_QUEUE_SIZE: usize = 16;
const READY_QUEUE_SIZE: usize = 32;

/// The dummy accepts any superpage size that is a multiple of this.
const SUPERPAGE_SIZE_GRANULE: usize = 32 * 1024;

const SUPERPAGE_ALIGNMENT: usize = 4;

/* ---------------------------------------------------------------------------------------------- */

#[derive(Debug)]
pub struct DummyDmaChannel {
    channel_number: u32,
    buffer_size: usize,
    transfer_queue: VecDeque<Superpage>,
    ready_queue: VecDeque<Superpage>,
}

impl DummyDmaChannel {
    pub fn new(parameters: &Parameters) -> Result<DummyDmaChannel> {
        let channel_number = parameters.channel_number();
        if channel_number > 7 {
            return Err(Error::Parameter(format!(
                "channel number {} out of range for dummy card (0..=7)",
                channel_number
            )));
        }

        let buffer_size = parameters.buffer_parameters_required()?.size();

        debug!("opening dummy channel {}", channel_number);

        Ok(DummyDmaChannel {
            channel_number,
            buffer_size,
            transfer_queue: VecDeque::with_capacity(TRANSFER_QUEUE_SIZE),
            ready_queue: VecDeque::with_capacity(READY_QUEUE_SIZE),
        })
    }

    pub fn channel_number(&self) -> u32 {
        self.channel_number
    }
}

impl Sealed for DummyDmaChannel {}
impl DmaChannel for DummyDmaChannel {
    fn push_superpage(&mut self, superpage: Superpage) -> Result<()> {
        if self.get_transfer_queue_available() == 0 {
            return Err(Error::QueueFull);
        }

        if superpage.size() == 0 {
            return Err(Error::Parameter(
                "could not enqueue superpage, size was 0".into(),
            ));
        }

        if !is_multiple(superpage.size(), SUPERPAGE_SIZE_GRANULE) {
            return Err(Error::Parameter(format!(
                "could not enqueue superpage, size {:#x} not a multiple of 32 KiB",
                superpage.size()
            )));
        }

        if superpage.offset() + superpage.size() > self.buffer_size {
            return Err(Error::OutOfRange {
                offset: superpage.offset(),
                end: superpage.offset() + superpage.size(),
                buffer_size: self.buffer_size,
            });
        }

        if superpage.offset() % SUPERPAGE_ALIGNMENT != 0 {
            return Err(Error::Alignment {
                offset: superpage.offset(),
                alignment: SUPERPAGE_ALIGNMENT,
            });
        }

        self.transfer_queue.push_back(superpage);
        Ok(())
    }

    fn pop_superpage(&mut self) -> Result<Superpage> {
        self.ready_queue.pop_front().ok_or(Error::QueueEmpty)
    }

    fn get_superpage(&self) -> Result<Superpage> {
        self.ready_queue
            .front()
            .or_else(|| self.transfer_queue.front())
            .copied()
            .ok_or(Error::QueueEmpty)
    }

    fn get_transfer_queue_available(&self) -> usize {
        TRANSFER_QUEUE_SIZE - self.transfer_queue.len()
    }

    fn get_ready_queue_size(&self) -> usize {
        self.ready_queue.len()
    }

    fn fill_superpages(&mut self) -> Result<()> {
        while !self.transfer_queue.is_empty() {
            if self.ready_queue.len() == READY_QUEUE_SIZE {
                break;
            }
            let mut superpage = self.transfer_queue.pop_front().expect("non-empty");
            superpage.received = superpage.size();
            superpage.ready = true;
            self.ready_queue.push_back(superpage);
        }
        Ok(())
    }

    fn start_dma(&mut self) -> Result<()> {
        debug!("dummy channel {}: start DMA", self.channel_number);
        self.transfer_queue.clear();
        self.ready_queue.clear();
        Ok(())
    }

    fn stop_dma(&mut self) -> Result<()> {
        debug!("dummy channel {}: stop DMA", self.channel_number);
        Ok(())
    }

    fn reset_channel(&mut self, level: ResetLevel) -> Result<()> {
        debug!("dummy channel {}: reset {:?}", self.channel_number, level);
        Ok(())
    }

    fn get_card_type(&self) -> CardType {
        CardType::Dummy
    }

    fn get_serial(&mut self) -> Result<Option<i32>> {
        Ok(Some(DUMMY_SERIAL_NUMBER))
    }

    fn get_firmware_info(&mut self) -> Result<Option<String>> {
        Ok(Some("Dummy".into()))
    }

    fn get_temperature(&mut self) -> Result<Option<f32>> {
        // A plausible-looking value that slowly wanders through 37..=43.
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(Some(37.0 + (seconds % 7) as f32))
    }

    fn get_pci_address(&self) -> PciAddress {
        PciAddress::new(0, 0, 0).expect("zero address is valid")
    }

    fn get_numa_node(&self) -> i32 {
        0
    }
}

/* ---------------------------------------------------------------------------------------------- */
