// SPDX-License-Identifier: MIT OR Apache-2.0

//! Does some basic sanity checks on a card's channel.
//!
//! Exits 0 when the channel answers, non-zero otherwise. Only the dummy backend can be checked
//! without hardware collaborators; see the crate docs for opening real hardware.

/* ---------------------------------------------------------------------------------------------- */

use std::process::ExitCode;

use clap::Parser;

use rorc_driver::channel::DmaChannel;
use rorc_driver::factory::{ChannelFactory, DUMMY_SERIAL_NUMBER};
use rorc_driver::options::{ChannelParameterOptions, IdOptions};
use rorc_driver::parameters::{BufferParameters, CardId, Parameters};

/* ---------------------------------------------------------------------------------------------- */

#[derive(Debug, Parser)]
#[command(
    name = "rorc-sanity-check",
    about = "Does some basic sanity checks on the card",
    after_help = "Example: rorc-sanity-check --id=-1 --channel=0"
)]
struct Cli {
    #[command(flatten)]
    id: IdOptions,

    #[command(flatten)]
    channel_parameters: ChannelParameterOptions,
}

fn run(cli: &Cli) -> rorc_driver::error::Result<()> {
    let card_id = cli
        .id
        .card_id()
        .unwrap_or(CardId::Serial(DUMMY_SERIAL_NUMBER));

    let channel_parameters = cli.channel_parameters.to_channel_parameters();
    let parameters = Parameters::new(card_id, cli.id.channel)
        .set_dma_page_size(channel_parameters.dma.page_size)
        .set_generator_enabled(channel_parameters.generator.enabled)
        .set_generator_loopback(channel_parameters.generator.loopback)
        .set_buffer_parameters(BufferParameters::Null);

    let factory = ChannelFactory::new();
    let mut channel = factory.get_dma_channel(&parameters)?;

    println!("card type: {}", channel.get_card_type());
    if let Some(serial) = channel.get_serial()? {
        println!("serial: {}", serial);
    }
    if let Some(firmware) = channel.get_firmware_info()? {
        println!("firmware: {}", firmware);
    }
    println!("pci address: {}", channel.get_pci_address());
    println!("numa node: {}", channel.get_numa_node());

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("sanity check failed: {}", error);
            ExitCode::FAILURE
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */
