// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction-time channel parameters.
//!
//! [`Parameters`] is a builder: required values go into [`Parameters::new`], everything else is
//! set through chaining setters and falls back to the card-specific default when absent.

/* ---------------------------------------------------------------------------------------------- */

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::pci::PciAddress;

/* ---------------------------------------------------------------------------------------------- */

/// Identifies a card either by its PCI address or by its serial number.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CardId {
    Address(PciAddress),
    Serial(i32),
}

impl FromStr for CardId {
    type Err = Error;

    /// A string that parses as a PCI address is an address; otherwise it must be a serial number.
    fn from_str(string: &str) -> Result<CardId> {
        if let Ok(address) = string.parse::<PciAddress>() {
            return Ok(CardId::Address(address));
        }
        string
            .parse::<i32>()
            .map(CardId::Serial)
            .map_err(|_| Error::Parameter(format!("invalid card id \"{}\"", string)))
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// Pattern generated by the card's on-board data generator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeneratorPattern {
    Constant,
    Incremental,
    Alternating,
    Flying0,
    Flying1,
    Random,
}

/// Routing of generated data back through the link stages for self-test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopbackMode {
    None,
    Internal,
    Siu,
    Diu,
    Rorc,
}

impl LoopbackMode {
    /// Whether the mode routes data through the optical link hardware.
    pub fn is_external(self) -> bool {
        matches!(self, LoopbackMode::Siu | LoopbackMode::Diu)
    }
}

impl FromStr for LoopbackMode {
    type Err = Error;

    fn from_str(string: &str) -> Result<LoopbackMode> {
        match string {
            "NONE" => Ok(LoopbackMode::None),
            "INTERNAL" => Ok(LoopbackMode::Internal),
            "SIU" => Ok(LoopbackMode::Siu),
            "DIU" => Ok(LoopbackMode::Diu),
            "RORC" => Ok(LoopbackMode::Rorc),
            _ => Err(Error::Parameter(format!(
                "invalid loopback mode \"{}\", expected NONE, INTERNAL, SIU, DIU or RORC",
                string
            ))),
        }
    }
}

/// How deep a channel reset goes. Levels are ordered; a higher level performs the lower levels'
/// actions as well.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ResetLevel {
    Nothing,
    Internal,
    InternalDiuSiu,
}

/// Readout mode of the card.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadoutMode {
    Continuous,
    Triggered,
}

/* ---------------------------------------------------------------------------------------------- */

/// Describes the DMA buffer the client registers with the channel.
#[derive(Clone, Debug)]
pub enum BufferParameters {
    /// A region of the client's own memory.
    Memory { address: usize, size: usize },
    /// A file to be mapped into memory.
    File { path: PathBuf, size: usize },
    /// No buffer. Only useful for channels that never transfer data.
    Null,
}

impl BufferParameters {
    pub fn size(&self) -> usize {
        match self {
            BufferParameters::Memory { size, .. } => *size,
            BufferParameters::File { size, .. } => *size,
            BufferParameters::Null => 0,
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// Parameters for opening a DMA channel.
#[derive(Clone, Debug)]
pub struct Parameters {
    card_id: CardId,
    channel_number: u32,
    dma_page_size: Option<usize>,
    generator_enabled: Option<bool>,
    generator_pattern: Option<GeneratorPattern>,
    generator_loopback: Option<LoopbackMode>,
    generator_data_size: Option<usize>,
    readout_mode: Option<ReadoutMode>,
    buffer_parameters: Option<BufferParameters>,
    rdyrx_enabled: bool,
}

impl Parameters {
    pub fn new(card_id: CardId, channel_number: u32) -> Parameters {
        Parameters {
            card_id,
            channel_number,
            dma_page_size: None,
            generator_enabled: None,
            generator_pattern: None,
            generator_loopback: None,
            generator_data_size: None,
            readout_mode: None,
            buffer_parameters: None,
            rdyrx_enabled: false,
        }
    }

    pub fn set_dma_page_size(mut self, size: usize) -> Parameters {
        self.dma_page_size = Some(size);
        self
    }

    pub fn set_generator_enabled(mut self, enabled: bool) -> Parameters {
        self.generator_enabled = Some(enabled);
        self
    }

    pub fn set_generator_pattern(mut self, pattern: GeneratorPattern) -> Parameters {
        self.generator_pattern = Some(pattern);
        self
    }

    pub fn set_generator_loopback(mut self, mode: LoopbackMode) -> Parameters {
        self.generator_loopback = Some(mode);
        self
    }

    pub fn set_generator_data_size(mut self, size: usize) -> Parameters {
        self.generator_data_size = Some(size);
        self
    }

    pub fn set_readout_mode(mut self, mode: ReadoutMode) -> Parameters {
        self.readout_mode = Some(mode);
        self
    }

    pub fn set_buffer_parameters(mut self, buffer: BufferParameters) -> Parameters {
        self.buffer_parameters = Some(buffer);
        self
    }

    /// Enables the RDYRX/EOBTR trigger commands towards the front-end electronics when the data
    /// generator is disabled. Off by default.
    pub fn set_rdyrx_enabled(mut self, enabled: bool) -> Parameters {
        self.rdyrx_enabled = enabled;
        self
    }

    pub fn card_id(&self) -> CardId {
        self.card_id
    }

    pub fn channel_number(&self) -> u32 {
        self.channel_number
    }

    pub fn dma_page_size(&self) -> Option<usize> {
        self.dma_page_size
    }

    pub fn generator_enabled(&self) -> Option<bool> {
        self.generator_enabled
    }

    pub fn generator_pattern(&self) -> Option<GeneratorPattern> {
        self.generator_pattern
    }

    pub fn generator_loopback(&self) -> Option<LoopbackMode> {
        self.generator_loopback
    }

    pub fn generator_data_size(&self) -> Option<usize> {
        self.generator_data_size
    }

    pub fn readout_mode(&self) -> Option<ReadoutMode> {
        self.readout_mode
    }

    pub fn buffer_parameters(&self) -> Option<&BufferParameters> {
        self.buffer_parameters.as_ref()
    }

    pub fn rdyrx_enabled(&self) -> bool {
        self.rdyrx_enabled
    }

    /// Like [`Parameters::buffer_parameters`], but a missing buffer is an error.
    pub fn buffer_parameters_required(&self) -> Result<&BufferParameters> {
        self.buffer_parameters
            .as_ref()
            .ok_or_else(|| Error::Parameter("DMA channel requires buffer parameters".into()))
    }
}

/* ---------------------------------------------------------------------------------------------- */


/* ---------------------------------------------------------------------------------------------- */
