// SPDX-License-Identifier: MIT OR Apache-2.0

//! The hardware-programming contract the DMA engine consumes, and its register-level
//! implementation.
//!
//! [`CardOps`] is the seam between the engine and the card: every operation is synchronous and
//! fails with a [`CardError`](crate::error::CardError) when the hardware disagrees. The engine
//! only ever talks to the card through this trait, so it can be driven against a mock.

/* ---------------------------------------------------------------------------------------------- */

use std::fmt::Debug;

use log::debug;

use crate::backends::crorc::registers::{self, csr, ddl, dsr, reset};
use crate::bar::Bar;
use crate::error::{CardError, Result};
use crate::firmware::decode_firmware_info;
use crate::parameters::GeneratorPattern;
use crate::utils::get_bits;

/* ---------------------------------------------------------------------------------------------- */

/// What a reset or DDL arming command targets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResetTarget {
    /// The card's free FIFO.
    FreeFifo,
    /// The RORC channel logic.
    Rorc,
    /// The DIU link endpoint.
    Diu,
    /// The SIU link endpoint (reached over the link).
    Siu,
}

/// DIU configuration probed from the card; arming commands differ between DIU generations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiuConfig {
    pub version: i32,
}

/* ---------------------------------------------------------------------------------------------- */

/// Register-programming operations of one C-RORC channel.
pub trait CardOps: Debug + Send {
    /// Probes the DIU hardware generation. Required before any arming command.
    fn init_diu_version(&mut self) -> Result<DiuConfig>;

    /// Issues a reset command for the given target.
    fn reset(&mut self, target: ResetTarget, diu: &DiuConfig) -> Result<()>;

    /// Arms (reset + reinitialize) a DDL component.
    fn arm_ddl(&mut self, target: ResetTarget, diu: &DiuConfig) -> Result<()>;

    /// Points the card at the ready FIFO and starts the data receiver.
    fn start_data_receiver(&mut self, ready_fifo_bus_address: u64) -> Result<()>;

    fn stop_data_receiver(&mut self) -> Result<()>;

    /// Pushes one free-page descriptor into the card's Rx FIFO.
    fn push_rx_free_fifo(
        &mut self,
        page_bus_address: u64,
        page_words: u32,
        fifo_index: u32,
    ) -> Result<()>;

    fn arm_data_generator(
        &mut self,
        initial_value: u32,
        initial_word: u32,
        pattern: GeneratorPattern,
        data_size_words: u32,
        seed: u32,
    ) -> Result<()>;

    /// Starts the data generator; `maximum_events == 0` means unbounded.
    fn start_data_generator(&mut self, maximum_events: u32) -> Result<()>;

    fn stop_data_generator(&mut self) -> Result<()>;

    /// Sends the RDYRX command towards the front-end electronics.
    fn start_trigger(&mut self, diu: &DiuConfig) -> Result<()>;

    /// Sends the EOBTR command towards the front-end electronics.
    fn stop_trigger(&mut self, diu: &DiuConfig) -> Result<()>;

    fn set_loopback_internal(&mut self) -> Result<()>;

    fn set_loopback_siu(&mut self, diu: &DiuConfig) -> Result<()>;

    /// Fails unless the optical link is up.
    fn assert_link_up(&mut self) -> Result<()>;

    fn siu_command(&mut self, command: u32) -> Result<()>;

    fn diu_command(&mut self, command: u32) -> Result<()>;

    /// Fails unless the card's free FIFO is empty.
    fn assert_free_fifo_empty(&mut self) -> Result<()>;

    fn read_register(&mut self, index: usize) -> Result<u32>;

    /// The card's serial number, if programmed.
    fn get_serial(&mut self) -> Result<Option<i32>>;

    /// The firmware version, decoded from the firmware ID register.
    fn get_firmware_info(&mut self) -> Result<String>;
}

/* ---------------------------------------------------------------------------------------------- */

fn generator_pattern_code(pattern: GeneratorPattern) -> u32 {
    match pattern {
        GeneratorPattern::Constant => 0,
        GeneratorPattern::Incremental => 1,
        GeneratorPattern::Alternating => 2,
        GeneratorPattern::Flying0 => 3,
        GeneratorPattern::Flying1 => 4,
        GeneratorPattern::Random => 5,
    }
}

fn reset_command(target: ResetTarget) -> u32 {
    match target {
        ResetTarget::FreeFifo => reset::FF,
        ResetTarget::Rorc => reset::RORC,
        ResetTarget::Diu => reset::DIU,
        ResetTarget::Siu => reset::SIU,
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// [`CardOps`] over a BAR 0 window.
#[derive(Debug)]
pub struct Crorc<B: Bar> {
    bar: B,
}

impl<B: Bar> Crorc<B> {
    pub fn new(bar: B) -> Crorc<B> {
        Crorc { bar }
    }
}

impl<B: Bar> CardOps for Crorc<B> {
    fn init_diu_version(&mut self) -> Result<DiuConfig> {
        let status = self.bar.read_register(registers::C_DSR);
        let version = if status & dsr::VERSION_2 != 0 { 2 } else { 1 };
        debug!("DIU version {}", version);
        Ok(DiuConfig { version })
    }

    fn reset(&mut self, target: ResetTarget, _diu: &DiuConfig) -> Result<()> {
        self.bar.write_register(registers::RCSR, reset_command(target));
        Ok(())
    }

    fn arm_ddl(&mut self, target: ResetTarget, diu: &DiuConfig) -> Result<()> {
        // The arming command is the reset command with the DIU-generation bit folded in.
        let command = reset_command(target) | ((diu.version as u32) << 8);
        self.bar.write_register(registers::RCSR, command);
        Ok(())
    }

    fn start_data_receiver(&mut self, ready_fifo_bus_address: u64) -> Result<()> {
        self.bar
            .write_register(registers::C_RRBAR, ready_fifo_bus_address as u32);
        self.bar
            .write_register(registers::C_RRBX, (ready_fifo_bus_address >> 32) as u32);

        let control = self.bar.read_register(registers::C_CSR);
        self.bar
            .write_register(registers::C_CSR, control | csr::START_DATA_RECEIVER);
        Ok(())
    }

    fn stop_data_receiver(&mut self) -> Result<()> {
        let control = self.bar.read_register(registers::C_CSR);
        self.bar
            .write_register(registers::C_CSR, control & !csr::START_DATA_RECEIVER);
        Ok(())
    }

    fn push_rx_free_fifo(
        &mut self,
        page_bus_address: u64,
        page_words: u32,
        fifo_index: u32,
    ) -> Result<()> {
        self.bar
            .write_register(registers::C_RAFL, page_bus_address as u32);
        self.bar
            .write_register(registers::C_RAFH, (page_bus_address >> 32) as u32);
        // The length/index word commits the descriptor; it must be written last.
        self.bar
            .write_register(registers::C_RAFX, (page_words << 8) | (fifo_index & 0xff));
        Ok(())
    }

    fn arm_data_generator(
        &mut self,
        initial_value: u32,
        initial_word: u32,
        pattern: GeneratorPattern,
        data_size_words: u32,
        seed: u32,
    ) -> Result<()> {
        self.bar
            .write_register(registers::C_DG1, generator_pattern_code(pattern));
        self.bar.write_register(registers::C_DG2, data_size_words);
        self.bar.write_register(registers::C_DG3, initial_value);
        self.bar.write_register(registers::C_DG4, initial_word);
        if pattern == GeneratorPattern::Random {
            self.bar.write_register(registers::C_DGS, seed);
        }
        Ok(())
    }

    fn start_data_generator(&mut self, maximum_events: u32) -> Result<()> {
        let pattern = self.bar.read_register(registers::C_DG1);
        self.bar
            .write_register(registers::C_DG1, pattern | (maximum_events << 8));
        let control = self.bar.read_register(registers::C_CSR);
        self.bar
            .write_register(registers::C_CSR, control | csr::GENERATOR_RUNNING);
        Ok(())
    }

    fn stop_data_generator(&mut self) -> Result<()> {
        let control = self.bar.read_register(registers::C_CSR);
        self.bar
            .write_register(registers::C_CSR, control & !csr::GENERATOR_RUNNING);
        Ok(())
    }

    fn start_trigger(&mut self, _diu: &DiuConfig) -> Result<()> {
        self.siu_command(ddl::RDYRX)
    }

    fn stop_trigger(&mut self, _diu: &DiuConfig) -> Result<()> {
        self.siu_command(ddl::EOBTR)
    }

    fn set_loopback_internal(&mut self) -> Result<()> {
        let control = self.bar.read_register(registers::C_CSR);
        self.bar
            .write_register(registers::C_CSR, control | csr::LOOPBACK_INTERNAL);
        Ok(())
    }

    fn set_loopback_siu(&mut self, _diu: &DiuConfig) -> Result<()> {
        self.siu_command(ddl::SIU_LOOPBACK)
    }

    fn assert_link_up(&mut self) -> Result<()> {
        let status = self.bar.read_register(registers::C_DSR);
        if status & dsr::LINK_UP == 0 {
            return Err(CardError::with_csr("link was not up", status).into());
        }
        Ok(())
    }

    fn siu_command(&mut self, command: u32) -> Result<()> {
        self.bar.write_register(registers::C_SCR, command);
        Ok(())
    }

    fn diu_command(&mut self, command: u32) -> Result<()> {
        self.bar.write_register(registers::C_DCR, command);
        Ok(())
    }

    fn assert_free_fifo_empty(&mut self) -> Result<()> {
        let control = self.bar.read_register(registers::C_CSR);
        if control & csr::FREE_FIFO_NOT_EMPTY != 0 {
            return Err(CardError::with_csr("free FIFO was not empty", control).into());
        }
        Ok(())
    }

    fn read_register(&mut self, index: usize) -> Result<u32> {
        Ok(self.bar.read_register(index))
    }

    fn get_serial(&mut self) -> Result<Option<i32>> {
        let hardware_id = self.bar.read_register(registers::RHID);
        if hardware_id == u32::MAX {
            // Unprogrammed EEPROM reads back all ones.
            return Ok(None);
        }
        Ok(Some(get_bits(hardware_id, 0, 23) as i32))
    }

    fn get_firmware_info(&mut self) -> Result<String> {
        decode_firmware_info(self.bar.read_register(registers::RFID))
    }
}

/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::MemoryBar;

    fn test_crorc(words: &mut Vec<u32>) -> Crorc<MemoryBar> {
        let bar = unsafe { MemoryBar::new_raw(words.as_mut_ptr(), words.len()) };
        Crorc::new(bar)
    }

    #[test]
    fn test_push_rx_free_fifo_packs_length_and_index() {
        let mut words = vec![0u32; registers::BAR_REGISTERS];
        let mut crorc = test_crorc(&mut words);

        crorc
            .push_rx_free_fifo(0x1_2345_6000, 2048, 0x7f)
            .unwrap();

        assert_eq!(crorc.read_register(registers::C_RAFL).unwrap(), 0x2345_6000);
        assert_eq!(crorc.read_register(registers::C_RAFH).unwrap(), 0x1);
        assert_eq!(
            crorc.read_register(registers::C_RAFX).unwrap(),
            (2048 << 8) | 0x7f
        );
    }

    #[test]
    fn test_link_up_assertion() {
        let mut words = vec![0u32; registers::BAR_REGISTERS];
        let mut crorc = test_crorc(&mut words);

        assert!(crorc.assert_link_up().is_err());

        crorc.bar.write_register(registers::C_DSR, dsr::LINK_UP);
        assert!(crorc.assert_link_up().is_ok());
    }

    #[test]
    fn test_serial_unprogrammed() {
        let mut words = vec![0u32; registers::BAR_REGISTERS];
        let mut crorc = test_crorc(&mut words);

        crorc.bar.write_register(registers::RHID, u32::MAX);
        assert_eq!(crorc.get_serial().unwrap(), None);

        crorc.bar.write_register(registers::RHID, 0x00_0300_39);
        assert_eq!(crorc.get_serial().unwrap(), Some(0x030039));
    }
}

/* ---------------------------------------------------------------------------------------------- */
