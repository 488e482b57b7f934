// SPDX-License-Identifier: MIT OR Apache-2.0

/* ---------------------------------------------------------------------------------------------- */

use crate::backends::dummy::DummyDmaChannel;
use crate::channel::DmaChannel;
use crate::error::{Error, Result};
use crate::parameters::{CardId, Parameters};

/* ---------------------------------------------------------------------------------------------- */

/// Serial number that selects the dummy backend.
pub const DUMMY_SERIAL_NUMBER: i32 = -1;

/// Builds DMA channels from [`Parameters`].
///
/// This is a plain value: construct one where your program starts and pass it around. Only the
/// dummy backend can be built from parameters alone; a C-RORC channel needs hardware
/// collaborators (card ops, registered DMA buffers) and is constructed through
/// [`CrorcDmaChannel::new`](crate::backends::crorc::CrorcDmaChannel::new).
#[derive(Debug, Default)]
pub struct ChannelFactory {}

impl ChannelFactory {
    pub fn new() -> ChannelFactory {
        ChannelFactory {}
    }

    /// The serial number the dummy backend reports.
    pub fn dummy_serial_number(&self) -> i32 {
        DUMMY_SERIAL_NUMBER
    }

    pub fn get_dma_channel(&self, parameters: &Parameters) -> Result<Box<dyn DmaChannel>> {
        match parameters.card_id() {
            CardId::Serial(DUMMY_SERIAL_NUMBER) => {
                Ok(Box::new(DummyDmaChannel::new(parameters)?))
            }
            other => Err(Error::Parameter(format!(
                "cannot build a channel for {:?} from parameters alone; construct the C-RORC \
                 backend directly with its hardware collaborators",
                other
            ))),
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::BufferParameters;

    #[test]
    fn test_factory_builds_dummy() {
        let factory = ChannelFactory::new();
        let parameters = Parameters::new(CardId::Serial(factory.dummy_serial_number()), 0)
            .set_buffer_parameters(BufferParameters::Null);

        let channel = factory.get_dma_channel(&parameters).unwrap();
        assert_eq!(channel.get_card_type(), crate::pci::CardType::Dummy);
    }

    #[test]
    fn test_factory_rejects_hardware_ids() {
        let factory = ChannelFactory::new();
        let parameters = Parameters::new(CardId::Serial(12345), 0);

        assert!(factory.get_dma_channel(&parameters).is_err());
    }
}

/* ---------------------------------------------------------------------------------------------- */
