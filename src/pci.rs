// SPDX-License-Identifier: MIT OR Apache-2.0

//! PCI-level identity types: addresses, card types, card descriptors.

/* ---------------------------------------------------------------------------------------------- */

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/* ---------------------------------------------------------------------------------------------- */

/// The kind of readout card behind a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CardType {
    /// The C-RORC PCIe readout card.
    Crorc,
    /// The CRU readout card (sibling family; only its frame format is handled here).
    Cru,
    /// The software-only pass-through channel used for testing.
    Dummy,
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CardType::Crorc => "CRORC",
            CardType::Cru => "CRU",
            CardType::Dummy => "DUMMY",
        };
        f.write_str(name)
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// A PCI geographical address: bus, device (slot), and function number.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PciAddress {
    bus: u8,
    device: u8,
    function: u8,
}

impl PciAddress {
    /// Fails if `device` exceeds 31 or `function` exceeds 7.
    pub fn new(bus: u8, device: u8, function: u8) -> Result<PciAddress> {
        if device > 31 {
            return Err(Error::Parameter(format!(
                "PCI device number {} out of range (0..=31)",
                device
            )));
        }
        if function > 7 {
            return Err(Error::Parameter(format!(
                "PCI function number {} out of range (0..=7)",
                function
            )));
        }
        Ok(PciAddress {
            bus,
            device,
            function,
        })
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn device(&self) -> u8 {
        self.device
    }

    pub fn function(&self) -> u8 {
        self.function
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }
}

impl FromStr for PciAddress {
    type Err = Error;

    /// Parses the `"bus:device.function"` form, e.g. `"42:00.0"` (hexadecimal fields).
    fn from_str(string: &str) -> Result<PciAddress> {
        let invalid = || {
            Error::Parameter(format!(
                "invalid PCI address \"{}\", expected \"bus:device.function\"",
                string
            ))
        };

        let (bus, rest) = string.split_once(':').ok_or_else(invalid)?;
        let (device, function) = rest.split_once('.').ok_or_else(invalid)?;

        let bus = u8::from_str_radix(bus, 16).map_err(|_| invalid())?;
        let device = u8::from_str_radix(device, 16).map_err(|_| invalid())?;
        let function = u8::from_str_radix(function, 16).map_err(|_| invalid())?;

        PciAddress::new(bus, device, function)
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// Identity of a card as seen by a channel.
#[derive(Clone, Copy, Debug)]
pub struct CardDescriptor {
    pub card_type: CardType,
    pub serial: Option<i32>,
    pub pci_address: PciAddress,
}

/* ---------------------------------------------------------------------------------------------- */


/* ---------------------------------------------------------------------------------------------- */
