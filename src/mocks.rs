// SPDX-License-Identifier: MIT OR Apache-2.0

/* ---------------------------------------------------------------------------------------------- */

use mockall::mock;

use crate::backends::crorc::card::{CardOps, DiuConfig, ResetTarget};
use crate::error::Result;
use crate::parameters::GeneratorPattern;

/* ---------------------------------------------------------------------------------------------- */

mock! {
    /// A [`CardOps`] without a card, so the DMA engine can be driven entirely from software.
    /// Pair it with [`MemoryDmaBuffer`](crate::buffer::MemoryDmaBuffer)s for the data and FIFO
    /// buffers and have the `push_rx_free_fifo` expectation write completion words into the FIFO
    /// memory to simulate arrivals.
    #[derive(Debug)]
    pub CardOps {}

    impl CardOps for CardOps {
        fn init_diu_version(&mut self) -> Result<DiuConfig>;
        fn reset(&mut self, target: ResetTarget, diu: &DiuConfig) -> Result<()>;
        fn arm_ddl(&mut self, target: ResetTarget, diu: &DiuConfig) -> Result<()>;
        fn start_data_receiver(&mut self, ready_fifo_bus_address: u64) -> Result<()>;
        fn stop_data_receiver(&mut self) -> Result<()>;
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
        fn start_data_generator(&mut self, maximum_events: u32) -> Result<()>;
        fn stop_data_generator(&mut self) -> Result<()>;
        fn start_trigger(&mut self, diu: &DiuConfig) -> Result<()>;
        fn stop_trigger(&mut self, diu: &DiuConfig) -> Result<()>;
        fn set_loopback_internal(&mut self) -> Result<()>;
        fn set_loopback_siu(&mut self, diu: &DiuConfig) -> Result<()>;
        fn assert_link_up(&mut self) -> Result<()>;
        fn siu_command(&mut self, command: u32) -> Result<()>;
        fn diu_command(&mut self, command: u32) -> Result<()>;
        fn assert_free_fifo_empty(&mut self) -> Result<()>;
        fn read_register(&mut self, index: usize) -> Result<u32>;
        fn get_serial(&mut self) -> Result<Option<i32>>;
        fn get_firmware_info(&mut self) -> Result<String>;
    }
}

/* ---------------------------------------------------------------------------------------------- */
