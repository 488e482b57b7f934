// SPDX-License-Identifier: MIT OR Apache-2.0

//! The C-RORC DMA channel.
//!
//! The channel owns the superpage queue, the ready-FIFO view, and the ring counters; everything
//! it knows about the card goes through the [`CardOps`] collaborator, and everything it knows
//! about memory comes from the [`DmaBuffer`] collaborators handed in at construction.
//!
//! The card cannot start DMA until a full ring of free-page descriptors is available, so
//! [`DmaChannel::start_dma`] only records the intent; the first
//! [`DmaChannel::fill_superpages`] tick that finds a pushable superpage arms the card, primes
//! the ring, and transitions the channel to running.

/* ---------------------------------------------------------------------------------------------- */

pub mod card;
pub(crate) mod registers;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::backends::crorc::card::{CardOps, DiuConfig, ResetTarget};
use crate::backends::crorc::registers::ddl;
use crate::buffer::DmaBuffer;
use crate::channel::{DmaChannel, Sealed};
use crate::error::{Error, Result};
use crate::interprocess::ChannelLock;
use crate::parameters::{GeneratorPattern, LoopbackMode, Parameters, ResetLevel};
use crate::pci::{CardType, PciAddress};
use crate::queue::{SuperpageEntry, SuperpageQueue};
use crate::ready_fifo::{ReadyFifo, READYFIFO_ENTRIES, READY_FIFO_SIZE};
use crate::superpage::Superpage;
use crate::utils::is_multiple;

/* ---------------------------------------------------------------------------------------------- */

/// Superpages the channel tracks on the transfer side (Pushing + Arrivals).
const TRANSFER_QUEUE_SIZE: usize = 32;
/// Filled superpages the channel holds before harvesting stalls.
const READY_QUEUE_SIZE: usize = 32;

/// Most descriptors the engine keeps outstanding in the ring at once.
const FIFO_QUEUE_MAX: usize = READYFIFO_ENTRIES;

/// Superpage sizes must be multiples of this: 1 MiB holds exactly 128 pages of 8 KiB, one full
/// ring.
const SUPERPAGE_SIZE_GRANULE: usize = 1024 * 1024;

const SUPERPAGE_ALIGNMENT: usize = 4;

const DMA_PAGE_SIZE_DEFAULT: usize = 8 * 1024;

/// Byte offset of the event-size word inside a page's Sub-event Data Header.
const SDH_EVENT_SIZE_OFFSET: usize = 16;

/// Settle time after hardware resets. No datasheet specifies a bound; this matches what the
/// card needs in practice.
const RESET_SETTLE: Duration = Duration::from_millis(100);

/// Time the card needs to reset its free FIFO.
const FREE_FIFO_SETTLE: Duration = Duration::from_millis(10);

/// Fixed wait for the initial pages after priming the ring.
/// TODO polling wait with timeout
const INITIAL_PAGES_WAIT: Duration = Duration::from_millis(10);

/* ---------------------------------------------------------------------------------------------- */

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DmaState {
    Stopped,
    /// `start_dma` was called but the ring has not been primed yet.
    PendingStart,
    Running,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DataArrivalStatus {
    NoneArrived,
    PartArrived,
    WholeArrived,
}

/* ---------------------------------------------------------------------------------------------- */

/// The external collaborators a C-RORC channel is built on.
pub struct CrorcCollaborators {
    /// Register-programming operations for the channel.
    pub ops: Box<dyn CardOps>,
    /// The client's registered DMA buffer.
    pub buffer: Arc<dyn DmaBuffer>,
    /// The buffer holding the ready FIFO, registered for DMA separately.
    pub fifo_buffer: Arc<dyn DmaBuffer>,
    /// Exclusive ownership of the channel, when opening real hardware.
    pub lock: Option<ChannelLock>,
}

/* ---------------------------------------------------------------------------------------------- */

#[derive(Debug)]
pub struct CrorcDmaChannel {
    ops: Box<dyn CardOps>,
    pci_address: PciAddress,
    channel_number: u32,

    queue: SuperpageQueue,
    ready_fifo: ReadyFifo,
    ready_fifo_bus_address: u64,
    /// Index of the oldest unread descriptor.
    fifo_back: usize,
    /// Number of outstanding descriptors.
    fifo_size: usize,
    state: DmaState,
    diu_config: DiuConfig,

    buffer_user_address: usize,
    buffer_bus_address: u64,
    buffer_size: usize,

    page_size: usize,
    initial_reset_level: ResetLevel,
    loopback_mode: LoopbackMode,
    generator_enabled: bool,
    generator_pattern: GeneratorPattern,
    generator_maximum_events: u32,
    generator_initial_value: u32,
    generator_initial_word: u32,
    generator_seed: u32,
    generator_data_size: usize,
    rdyrx_enabled: bool,

    // Keep the mappings and the channel ownership alive as long as the card may use them.
    _buffer: Arc<dyn DmaBuffer>,
    _fifo_buffer: Arc<dyn DmaBuffer>,
    _lock: Option<ChannelLock>,
}

impl CrorcDmaChannel {
    pub fn allowed_channels() -> std::ops::RangeInclusive<u32> {
        0..=5
    }

    pub fn channel_number(&self) -> u32 {
        self.channel_number
    }

    pub fn new(
        parameters: &Parameters,
        collaborators: CrorcCollaborators,
    ) -> Result<CrorcDmaChannel> {
        let channel_number = parameters.channel_number();
        if !Self::allowed_channels().contains(&channel_number) {
            return Err(Error::Parameter(format!(
                "channel number {} out of range for C-RORC (0..=5)",
                channel_number
            )));
        }

        let pci_address = match parameters.card_id() {
            crate::parameters::CardId::Address(address) => address,
            crate::parameters::CardId::Serial(_) => PciAddress::new(0, 0, 0)?,
        };

        let page_size = parameters.dma_page_size().unwrap_or(DMA_PAGE_SIZE_DEFAULT);
        if page_size == 0 || !is_multiple(SUPERPAGE_SIZE_GRANULE, page_size) {
            return Err(Error::Parameter(format!(
                "DMA page size {:#x} does not divide the 1 MiB superpage granule",
                page_size
            )));
        }

        // The engine requires single-segment buffers; only the first scatter/gather entry is
        // used and superpages must fit inside it.
        let buffer_entry = *collaborators
            .buffer
            .scatter_gather_list()
            .first()
            .ok_or_else(|| Error::Parameter("DMA buffer has no scatter/gather entries".into()))?;

        let fifo_entry = *collaborators
            .fifo_buffer
            .scatter_gather_list()
            .first()
            .ok_or_else(|| Error::Parameter("FIFO buffer has no scatter/gather entries".into()))?;
        if fifo_entry.size < READY_FIFO_SIZE {
            return Err(Error::Fifo {
                entry_size: fifo_entry.size,
                fifo_size: READY_FIFO_SIZE,
            });
        }

        debug!("initializing ready FIFO at bus address {:#x}", fifo_entry.bus_address);
        let ready_fifo = unsafe { ReadyFifo::new(fifo_entry.user_address as *mut u8) };
        ready_fifo.reset();

        let generator_pattern = parameters
            .generator_pattern()
            .unwrap_or(GeneratorPattern::Incremental);

        Ok(CrorcDmaChannel {
            ops: collaborators.ops,
            pci_address,
            channel_number,
            queue: SuperpageQueue::new(TRANSFER_QUEUE_SIZE, READY_QUEUE_SIZE),
            ready_fifo,
            ready_fifo_bus_address: fifo_entry.bus_address,
            fifo_back: 0,
            fifo_size: 0,
            state: DmaState::Stopped,
            diu_config: DiuConfig::default(),
            buffer_user_address: buffer_entry.user_address,
            buffer_bus_address: buffer_entry.bus_address,
            buffer_size: buffer_entry.size,
            page_size,
            initial_reset_level: ResetLevel::Internal,
            loopback_mode: parameters
                .generator_loopback()
                .unwrap_or(LoopbackMode::Internal),
            generator_enabled: parameters.generator_enabled().unwrap_or(true),
            generator_pattern,
            generator_maximum_events: 0,
            generator_initial_value: 0,
            generator_initial_word: 0,
            generator_seed: if generator_pattern == GeneratorPattern::Random {
                1
            } else {
                0
            },
            generator_data_size: parameters.generator_data_size().unwrap_or(page_size),
            rdyrx_enabled: parameters.rdyrx_enabled(),
            _buffer: collaborators.buffer,
            _fifo_buffer: collaborators.fifo_buffer,
            _lock: collaborators.lock,
        })
    }

    /* ------------------------------------- deferred start ------------------------------------- */

    fn start_pending_dma(&mut self) -> Result<()> {
        info!("starting pending DMA");

        {
            let entry = self.queue.pushing_front().expect("pushing queue not empty");
            if entry.max_pages < READYFIFO_ENTRIES {
                return Err(Error::Parameter(format!(
                    "first superpage supplies only {} pages, priming the ring needs {}",
                    entry.max_pages, READYFIFO_ENTRIES
                )));
            }
        }

        self.diu_config = self.ops.init_diu_version()?;
        self.reset_with_context(self.initial_reset_level)?;
        self.start_data_receiving()?;

        // Prime the firmware FIFO with one full ring of pages.
        for index in 0..READYFIFO_ENTRIES {
            self.ready_fifo.reset_entry(index);
            self.push_into_superpage()?;
        }

        if self
            .queue
            .pushing_front()
            .expect("pushing queue not empty")
            .is_pushed()
        {
            self.queue.remove_from_pushing_queue();
        }

        if self.generator_enabled {
            info!("starting data generator");
            self.start_data_generator()?;
        } else if self.rdyrx_enabled {
            info!("starting trigger");

            // Clear SIU/DIU status before telling the front-end to send.
            self.ops.assert_link_up()?;
            self.ops.siu_command(ddl::RAND_CIFST)?;
            self.ops.diu_command(ddl::RAND_CIFST)?;

            self.ops.start_trigger(&self.diu_config)?;
        }

        thread::sleep(INITIAL_PAGES_WAIT);
        if !matches!(
            self.data_arrived(READYFIFO_ENTRIES - 1),
            Ok(DataArrivalStatus::WholeArrived)
        ) {
            warn!("initial pages not arrived");
        }

        let page_size = self.page_size;
        let entry = self
            .queue
            .receiving_front_mut()
            .expect("primed entry still queued");
        entry.superpage.received += READYFIFO_ENTRIES * page_size;
        if entry.superpage.is_filled() {
            entry.superpage.ready = true;
            self.queue.move_from_arrivals_to_filled_queue();
        }

        self.ready_fifo.reset();
        self.fifo_back = 0;
        self.fifo_size = 0;

        self.state = DmaState::Running;
        info!("DMA started");
        Ok(())
    }

    fn start_data_receiving(&mut self) -> Result<()> {
        self.ops.init_diu_version()?;

        if self.loopback_mode == LoopbackMode::Siu {
            self.reset_with_context(ResetLevel::InternalDiuSiu)?;
            self.ops.assert_link_up()?;
            self.ops.siu_command(ddl::RAND_CIFST)?;
            self.ops.diu_command(ddl::RAND_CIFST)?;
        }

        self.ops.reset(ResetTarget::FreeFifo, &self.diu_config)?;
        // Give the card some time to reset the free FIFO.
        thread::sleep(FREE_FIFO_SETTLE);
        self.ops.assert_free_fifo_empty()?;
        self.ops.start_data_receiver(self.ready_fifo_bus_address)?;
        Ok(())
    }

    fn start_data_generator(&mut self) -> Result<()> {
        if self.loopback_mode == LoopbackMode::None {
            self.ops.start_trigger(&self.diu_config)?;
        }

        self.ops.arm_data_generator(
            self.generator_initial_value,
            self.generator_initial_word,
            self.generator_pattern,
            (self.generator_data_size / 4) as u32,
            self.generator_seed,
        )?;

        if self.loopback_mode == LoopbackMode::Internal {
            self.ops.set_loopback_internal()?;
            thread::sleep(RESET_SETTLE);
        }

        if self.loopback_mode == LoopbackMode::Siu {
            self.ops.set_loopback_siu(&self.diu_config)?;
            thread::sleep(RESET_SETTLE);
            self.ops.assert_link_up()?;
            self.ops.siu_command(ddl::RAND_CIFST)?;
            self.ops.diu_command(ddl::RAND_CIFST)?;
        }

        self.ops.start_data_generator(self.generator_maximum_events)
    }

    /* ------------------------------------------ reset ----------------------------------------- */

    fn reset_with_context(&mut self, level: ResetLevel) -> Result<()> {
        self.device_reset_channel(level).map_err(|error| {
            if let Error::Card(mut card_error) = error {
                card_error.reset_level = Some(level);
                card_error.loopback_mode = Some(self.loopback_mode);
                Error::Card(card_error)
            } else {
                error
            }
        })
    }

    fn device_reset_channel(&mut self, level: ResetLevel) -> Result<()> {
        if level == ResetLevel::Nothing {
            return Ok(());
        }

        if level >= ResetLevel::Internal {
            self.ops.reset(ResetTarget::FreeFifo, &self.diu_config)?;
            self.ops.reset(ResetTarget::Rorc, &self.diu_config)?;
        }

        if self.loopback_mode.is_external() {
            self.ops.arm_ddl(ResetTarget::Diu, &self.diu_config)?;

            if level == ResetLevel::InternalDiuSiu && self.loopback_mode != LoopbackMode::Diu {
                // Wait a little before resetting the SIU.
                thread::sleep(RESET_SETTLE);
                self.ops.arm_ddl(ResetTarget::Siu, &self.diu_config)?;
                self.ops.arm_ddl(ResetTarget::Diu, &self.diu_config)?;
            }

            self.ops.arm_ddl(ResetTarget::Rorc, &self.diu_config)?;
        }

        // Wait a little after reset.
        thread::sleep(RESET_SETTLE);
        Ok(())
    }

    /* ------------------------------------------ ring ------------------------------------------ */

    /// Pushes the next free page of the front pushing entry into the card's Rx FIFO.
    fn push_into_superpage(&mut self) -> Result<()> {
        debug_assert!(self.fifo_size < FIFO_QUEUE_MAX);

        let (page_bus_address, slot) = {
            let entry = self.queue.pushing_front().expect("pushing queue not empty");
            debug_assert!(entry.pushed_pages < entry.max_pages);
            (
                entry.bus_address + (entry.pushed_pages * self.page_size) as u64,
                (self.fifo_back + self.fifo_size) % READYFIFO_ENTRIES,
            )
        };

        self.ops.push_rx_free_fifo(
            page_bus_address,
            (self.page_size / 4) as u32,
            slot as u32,
        )?;

        self.fifo_size += 1;
        self.queue
            .pushing_front_mut()
            .expect("pushing queue not empty")
            .pushed_pages += 1;
        Ok(())
    }

    fn data_arrived(&self, index: usize) -> Result<DataArrivalStatus> {
        let length = self.ready_fifo.length(index);
        let status = self.ready_fifo.status(index);

        if status == -1 {
            return Ok(DataArrivalStatus::NoneArrived);
        }
        if status == 0 {
            return Ok(DataArrivalStatus::PartArrived);
        }
        if (status as u32) & 0xff == ddl::DTSW {
            // With internal loopback the event length in words is also carried in the status
            // word, e.g. 0x400082 for 4 KiB events.
            if (status as u32) & (1 << 31) != 0 {
                return Err(Error::DataArrival {
                    status,
                    length,
                    index,
                });
            }
            return Ok(DataArrivalStatus::WholeArrived);
        }

        Err(Error::DataArrival {
            status,
            length,
            index,
        })
    }

    /* ----------------------------------------- helpers ---------------------------------------- */

    fn write_sdh_event_size(page_user_address: usize, event_size: u32) {
        // The current firmware does not fill in the SDH event-size word; write it ourselves.
        // Remove once a firmware that does is the deployed baseline.
        let address = (page_user_address + SDH_EVENT_SIZE_OFFSET) as *mut u32;
        unsafe {
            address.write_volatile(0);
            address.add(1).write_volatile(0);
            address.add(2).write_volatile(0);
            address.add(3).write_volatile(event_size);
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */

impl Sealed for CrorcDmaChannel {}
impl DmaChannel for CrorcDmaChannel {
    fn push_superpage(&mut self, superpage: Superpage) -> Result<()> {
        if self.queue.queue_available() == 0 {
            return Err(Error::QueueFull);
        }

        if superpage.size() == 0 || !is_multiple(superpage.size(), SUPERPAGE_SIZE_GRANULE) {
            return Err(Error::Parameter(format!(
                "could not enqueue superpage, C-RORC requires size to be a multiple of 1 MiB \
                 (got {:#x})",
                superpage.size()
            )));
        }

        if superpage.offset() % SUPERPAGE_ALIGNMENT != 0 {
            return Err(Error::Alignment {
                offset: superpage.offset(),
                alignment: SUPERPAGE_ALIGNMENT,
            });
        }

        if superpage.offset() + superpage.size() > self.buffer_size {
            return Err(Error::OutOfRange {
                offset: superpage.offset(),
                end: superpage.offset() + superpage.size(),
                buffer_size: self.buffer_size,
            });
        }

        let entry = SuperpageEntry::new(
            Superpage::new(superpage.offset(), superpage.size()),
            self.buffer_bus_address + superpage.offset() as u64,
            superpage.size() / self.page_size,
        );
        self.queue.add_to_queue(entry)
    }

    fn pop_superpage(&mut self) -> Result<Superpage> {
        Ok(self.queue.remove_from_filled_queue()?.superpage)
    }

    fn get_superpage(&self) -> Result<Superpage> {
        self.queue.front_superpage().ok_or(Error::QueueEmpty)
    }

    fn get_transfer_queue_available(&self) -> usize {
        self.queue.queue_available()
    }

    fn get_ready_queue_size(&self) -> usize {
        self.queue.filled_len()
    }

    fn fill_superpages(&mut self) -> Result<()> {
        if self.state == DmaState::Stopped {
            return Ok(());
        }

        // Push phase: feed free pages of the front pushing entry to the card.
        if self.queue.pushing_len() > 0 {
            if self.state == DmaState::PendingStart {
                return self.start_pending_dma();
            }

            let possible_to_push = {
                let entry = self.queue.pushing_front().expect("pushing queue not empty");
                (FIFO_QUEUE_MAX - self.fifo_size).min(entry.unpushed_pages())
            };

            for _ in 0..possible_to_push {
                self.push_into_superpage()?;
            }

            if self
                .queue
                .pushing_front()
                .expect("pushing queue not empty")
                .is_pushed()
            {
                self.queue.remove_from_pushing_queue();
            }
        }

        // Arrival phase: harvest completed descriptors in ring order.
        while self.fifo_size > 0 {
            if self.queue.filled_is_full() {
                // No room to complete another superpage; let the client pop first.
                break;
            }
            if self.queue.receiving_front().is_none() {
                break;
            }

            match self.data_arrived(self.fifo_back)? {
                // If the back descriptor hasn't arrived, the later ones certainly haven't
                // either.
                DataArrivalStatus::NoneArrived | DataArrivalStatus::PartArrived => break,
                DataArrivalStatus::WholeArrived => {
                    let length = self.ready_fifo.length(self.fifo_back) as u32;

                    let page_user_address = {
                        let entry = self.queue.receiving_front().expect("receiving entry");
                        self.buffer_user_address
                            + entry.superpage.offset()
                            + entry.superpage.received()
                    };
                    Self::write_sdh_event_size(page_user_address, length);

                    self.ready_fifo.reset_entry(self.fifo_back);
                    self.fifo_size -= 1;
                    self.fifo_back = (self.fifo_back + 1) % READYFIFO_ENTRIES;

                    let page_size = self.page_size;
                    let entry = self.queue.receiving_front_mut().expect("receiving entry");
                    entry.superpage.received += page_size;

                    if entry.superpage.is_filled() {
                        entry.superpage.ready = true;
                        self.queue.move_from_arrivals_to_filled_queue();
                    }
                }
            }
        }

        Ok(())
    }

    fn start_dma(&mut self) -> Result<()> {
        if self.state != DmaState::Stopped {
            warn!("DMA already started");
            return Ok(());
        }

        // The card can't start until a full ring of descriptors is available, which needs a
        // superpage; defer the hardware side to the first fill tick.
        debug!("DMA start deferred until superpage available");

        self.queue.clear();
        self.fifo_back = 0;
        self.fifo_size = 0;
        self.state = DmaState::PendingStart;
        Ok(())
    }

    fn stop_dma(&mut self) -> Result<()> {
        if self.state == DmaState::Stopped {
            debug!("DMA already stopped");
            return Ok(());
        }

        // Stop is best effort: log failures so shutdown always completes.
        if self.generator_enabled {
            if let Err(error) = self.ops.stop_data_generator() {
                warn!("failed to stop data generator: {}", error);
            }
            if let Err(error) = self.ops.stop_data_receiver() {
                warn!("failed to stop data receiver: {}", error);
            }
        } else if self.rdyrx_enabled {
            // Send EOBTR to the front-end electronics.
            if let Err(error) = self.ops.stop_trigger(&self.diu_config) {
                warn!("failed to stop trigger: {}", error);
            }
        }

        self.state = DmaState::Stopped;
        Ok(())
    }

    fn reset_channel(&mut self, level: ResetLevel) -> Result<()> {
        self.reset_with_context(level)
    }

    fn get_card_type(&self) -> CardType {
        CardType::Crorc
    }

    fn get_serial(&mut self) -> Result<Option<i32>> {
        self.ops.get_serial()
    }

    fn get_firmware_info(&mut self) -> Result<Option<String>> {
        self.ops.get_firmware_info().map(Some)
    }

    fn get_temperature(&mut self) -> Result<Option<f32>> {
        // The C-RORC carries no temperature sensor the driver can reach.
        Ok(None)
    }

    fn get_pci_address(&self) -> PciAddress {
        self.pci_address
    }

    fn get_numa_node(&self) -> i32 {
        let path = format!("/sys/bus/pci/devices/0000:{}/numa_node", self.pci_address);
        std::fs::read_to_string(path)
            .ok()
            .and_then(|contents| contents.trim().parse().ok())
            .unwrap_or(0)
    }
}

impl Drop for CrorcDmaChannel {
    fn drop(&mut self) {
        let _ = self.stop_dma();
    }
}

/* ---------------------------------------------------------------------------------------------- */
