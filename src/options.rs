// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line option groups shared by the driver utilities.
//!
//! Each group is a [`clap::Args`] struct that a utility flattens into its own parser. The
//! channel-parameter group converts to byte-sized values through
//! [`ChannelParameterOptions::to_channel_parameters`].

/* ---------------------------------------------------------------------------------------------- */

use std::str::FromStr;

use clap::Args;

use crate::parameters::{CardId, LoopbackMode};

/* ---------------------------------------------------------------------------------------------- */

fn parse_register_word(string: &str) -> Result<u64, String> {
    let result = if let Some(hex) = string.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        string.parse()
    };
    result.map_err(|_| format!("invalid register word \"{}\"", string))
}

fn parse_loopback(string: &str) -> Result<LoopbackMode, String> {
    LoopbackMode::from_str(string).map_err(|error| error.to_string())
}

fn parse_card_id(string: &str) -> Result<CardId, String> {
    CardId::from_str(string).map_err(|error| error.to_string())
}

/* ---------------------------------------------------------------------------------------------- */

/// Options identifying a card and channel.
#[derive(Args, Clone, Debug)]
pub struct IdOptions {
    /// Card id: a PCI address ("42:00.0") or a serial number.
    #[arg(long = "id", value_parser = parse_card_id)]
    pub id: Option<CardId>,

    /// Serial number of the card.
    #[arg(long = "serial")]
    pub serial: Option<i32>,

    /// Channel number.
    #[arg(long = "channel", default_value_t = 0)]
    pub channel: u32,
}

impl IdOptions {
    /// The card id, with `--serial` as the fallback for `--id`.
    pub fn card_id(&self) -> Option<CardId> {
        self.id.or(self.serial.map(CardId::Serial))
    }
}

/// Options addressing a single register or register range.
#[derive(Args, Clone, Debug)]
pub struct RegisterOptions {
    /// Register address in bytes. Accepts hexadecimal with a "0x" prefix.
    #[arg(long = "address", value_parser = parse_register_word)]
    pub address: Option<u64>,

    /// Number of registers in the range.
    #[arg(long = "regrange")]
    pub range: Option<u64>,

    /// Value to write. Accepts hexadecimal with a "0x" prefix.
    #[arg(long = "value", value_parser = parse_register_word)]
    pub value: Option<u64>,
}

/// The `--cp-*` channel-parameter options.
#[derive(Args, Clone, Debug)]
pub struct ChannelParameterOptions {
    /// DMA page size in KiB.
    #[arg(long = "cp-dma-pagesize", default_value_t = 8)]
    pub dma_page_size_kib: usize,

    /// DMA buffer size in MiB.
    #[arg(long = "cp-dma-bufmb", default_value_t = 32)]
    pub dma_buffer_mib: usize,

    /// Whether to use the card's data generator.
    #[arg(long = "cp-gen-enable", action = clap::ArgAction::Set, default_value_t = true)]
    pub generator_enabled: bool,

    /// Loopback mode for generated data: NONE, INTERNAL, SIU, DIU or RORC.
    #[arg(long = "cp-gen-loopb", value_parser = parse_loopback, default_value = "INTERNAL")]
    pub generator_loopback: LoopbackMode,
}

impl ChannelParameterOptions {
    pub fn to_channel_parameters(&self) -> ChannelParameters {
        ChannelParameters {
            dma: DmaParameters {
                page_size: self.dma_page_size_kib * 1024,
                buffer_size: self.dma_buffer_mib * 1024 * 1024,
            },
            generator: GeneratorParameters {
                enabled: self.generator_enabled,
                loopback: self.generator_loopback,
            },
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// Channel parameters with all sizes converted to bytes.
#[derive(Clone, Copy, Debug)]
pub struct ChannelParameters {
    pub dma: DmaParameters,
    pub generator: GeneratorParameters,
}

#[derive(Clone, Copy, Debug)]
pub struct DmaParameters {
    pub page_size: usize,
    pub buffer_size: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct GeneratorParameters {
    pub enabled: bool,
    pub loopback: LoopbackMode,
}

/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        id: IdOptions,
        #[command(flatten)]
        registers: RegisterOptions,
        #[command(flatten)]
        channel_parameters: ChannelParameterOptions,
    }

    #[test]
    fn test_options_roundtrip() {
        let cli = TestCli::try_parse_from([
            "/test",
            "--address=0x100",
            "--regrange=200",
            "--value=0x250",
            "--cp-dma-pagesize=300",
            "--cp-dma-bufmb=400",
            "--cp-gen-enable=true",
            "--cp-gen-loopb=RORC",
            "--serial=500",
        ])
        .unwrap();

        assert_eq!(cli.registers.address, Some(0x100));
        assert_eq!(cli.registers.range, Some(200));
        assert_eq!(cli.registers.value, Some(0x250));

        let parameters = cli.channel_parameters.to_channel_parameters();
        assert_eq!(parameters.dma.page_size, 300 * 1024);
        assert_eq!(parameters.dma.buffer_size, 400 * 1024 * 1024);
        assert!(parameters.generator.enabled);
        assert_eq!(parameters.generator.loopback, LoopbackMode::Rorc);

        assert_eq!(cli.id.serial, Some(500));
        assert_eq!(cli.id.card_id(), Some(CardId::Serial(500)));
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["/test"]).unwrap();

        let parameters = cli.channel_parameters.to_channel_parameters();
        assert_eq!(parameters.dma.page_size, 8 * 1024);
        assert_eq!(parameters.dma.buffer_size, 32 * 1024 * 1024);
        assert!(parameters.generator.enabled);
        assert_eq!(parameters.generator.loopback, LoopbackMode::Internal);
        assert_eq!(cli.id.channel, 0);
        assert_eq!(cli.id.card_id(), None);
    }

    #[test]
    fn test_bad_loopback_rejected() {
        assert!(TestCli::try_parse_from(["/test", "--cp-gen-loopb=SIDEWAYS"]).is_err());
    }
}

/* ---------------------------------------------------------------------------------------------- */
