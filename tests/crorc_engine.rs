// SPDX-License-Identifier: MIT OR Apache-2.0

//! DMA engine scenarios, driven through a mocked card.
//!
//! The mock's `push_rx_free_fifo` expectation plays the card's role: for every descriptor the
//! engine pushes, it writes a completion word straight into the ready FIFO memory. Varying what
//! gets written (whole arrivals, partials, error bits) exercises the harvest paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use rorc_driver::backends::crorc::card::{DiuConfig, ResetTarget};
use rorc_driver::backends::crorc::{CrorcCollaborators, CrorcDmaChannel};
use rorc_driver::channel::DmaChannel;
use rorc_driver::buffer::MemoryDmaBuffer;
use rorc_driver::error::Error;
use rorc_driver::mocks::MockCardOps;
use rorc_driver::parameters::{CardId, LoopbackMode, Parameters, ResetLevel};
use rorc_driver::pci::PciAddress;
use rorc_driver::ready_fifo::{READYFIFO_ENTRIES, READY_FIFO_SIZE};
use rorc_driver::superpage::Superpage;

const PAGE: usize = 8192;
const PAGE_WORDS: i32 = (PAGE / 4) as i32;
const MIB: usize = 1024 * 1024;

/// A status word whose low byte is the DTSW magic and whose error bit is clear.
const WHOLE_ARRIVED: i32 = 0x82;
/// DTSW with bit 31 (the error flag) set.
const ERROR_ARRIVED: i32 = 0x8000_0082u32 as i32;

/* ---------------------------------------------------------------------------------------------- */

/// The card's side of the ready FIFO: writes completion words into the shared slots.
#[derive(Clone, Copy)]
struct CardMemory {
    fifo_user_address: usize,
}

impl CardMemory {
    fn write_descriptor(&self, index: usize, length: i32, status: i32) {
        assert!(index < READYFIFO_ENTRIES);
        let entry = (self.fifo_user_address + index * 8) as *mut i32;
        unsafe {
            entry.write_volatile(length);
            entry.add(1).write_volatile(status);
        }
    }
}

struct TestChannel {
    channel: CrorcDmaChannel,
    card: CardMemory,
    /// Total descriptors pushed through the mock so far.
    pushes: Arc<AtomicUsize>,
}

/// Builds a channel over `buffer_size` bytes of memory. `descriptor` decides, per push ordinal
/// and ring slot, what the simulated card writes into that slot.
fn test_channel<F>(buffer_size: usize, descriptor: F) -> TestChannel
where
    F: Fn(usize, usize) -> (i32, i32) + Send + 'static,
{
    let buffer = Arc::new(MemoryDmaBuffer::new(buffer_size));
    let fifo_buffer = Arc::new(MemoryDmaBuffer::new(READY_FIFO_SIZE));
    let card = CardMemory {
        fifo_user_address: fifo_buffer.user_address(),
    };
    let pushes = Arc::new(AtomicUsize::new(0));

    let mut ops = MockCardOps::new();
    ops.expect_init_diu_version()
        .returning(|| Ok(DiuConfig { version: 2 }));
    ops.expect_reset().returning(|_, _| Ok(()));
    ops.expect_arm_ddl().returning(|_, _| Ok(()));
    ops.expect_assert_free_fifo_empty().returning(|| Ok(()));
    ops.expect_start_data_receiver().returning(|_| Ok(()));
    ops.expect_arm_data_generator()
        .returning(|_, _, _, _, _| Ok(()));
    ops.expect_set_loopback_internal().returning(|| Ok(()));
    ops.expect_start_data_generator().returning(|_| Ok(()));
    ops.expect_stop_data_generator().returning(|| Ok(()));
    ops.expect_stop_data_receiver().returning(|| Ok(()));
    {
        let pushes = Arc::clone(&pushes);
        ops.expect_push_rx_free_fifo()
            .returning(move |_, _, index| {
                let ordinal = pushes.fetch_add(1, Ordering::SeqCst);
                let (length, status) = descriptor(ordinal, index as usize);
                card.write_descriptor(index as usize, length, status);
                Ok(())
            });
    }

    let parameters = Parameters::new(CardId::Address(PciAddress::new(0, 0, 0).unwrap()), 0);
    let channel = CrorcDmaChannel::new(
        &parameters,
        CrorcCollaborators {
            ops: Box::new(ops),
            buffer,
            fifo_buffer,
            lock: None,
        },
    )
    .unwrap();

    TestChannel {
        channel,
        card,
        pushes,
    }
}

fn whole_arrivals(_ordinal: usize, _slot: usize) -> (i32, i32) {
    (PAGE_WORDS, WHOLE_ARRIVED)
}

/* ---------------------------------------------------------------------------------------------- */

#[test]
fn s1_cold_start() {
    let mut test = test_channel(MIB, whole_arrivals);

    test.channel.start_dma().unwrap();
    test.channel.push_superpage(Superpage::new(0, MIB)).unwrap();
    test.channel.fill_superpages().unwrap();

    // The deferred start primes exactly one full ring.
    assert_eq!(test.pushes.load(Ordering::SeqCst), READYFIFO_ENTRIES);
    assert_eq!(test.channel.get_ready_queue_size(), 1);

    let superpage = test.channel.pop_superpage().unwrap();
    assert_eq!(superpage.offset(), 0);
    assert_eq!(superpage.size(), MIB);
    assert_eq!(superpage.received(), MIB);
    assert!(superpage.is_ready());

    test.channel.stop_dma().unwrap();
}

#[test]
fn s2_superpages_pop_in_push_order() {
    let mut test = test_channel(3 * MIB, whole_arrivals);

    test.channel.start_dma().unwrap();
    for index in 0..3 {
        test.channel
            .push_superpage(Superpage::new(index * MIB, MIB))
            .unwrap();
    }

    for _ in 0..10 {
        test.channel.fill_superpages().unwrap();
        if test.channel.get_ready_queue_size() == 3 {
            break;
        }
    }
    assert_eq!(test.channel.get_ready_queue_size(), 3);

    for index in 0..3 {
        let superpage = test.channel.pop_superpage().unwrap();
        assert_eq!(superpage.offset(), index * MIB);
        assert!(superpage.is_ready());
    }
}

#[test]
fn s3_validation() {
    let mut test = test_channel(2 * MIB, whole_arrivals);
    let channel = &mut test.channel;

    // Not a 1 MiB multiple.
    assert!(matches!(
        channel.push_superpage(Superpage::new(0, 512 * 1024)),
        Err(Error::Parameter(_))
    ));

    // Offset not 4-byte aligned.
    assert!(matches!(
        channel.push_superpage(Superpage::new(3, MIB)),
        Err(Error::Alignment { offset: 3, .. })
    ));

    // Falls outside the registered buffer.
    assert!(matches!(
        channel.push_superpage(Superpage::new(MIB, 2 * MIB)),
        Err(Error::OutOfRange { .. })
    ));

    // Fill the transfer queue to the brim.
    while channel.get_transfer_queue_available() > 0 {
        channel.push_superpage(Superpage::new(0, MIB)).unwrap();
    }
    assert!(matches!(
        channel.push_superpage(Superpage::new(0, MIB)),
        Err(Error::QueueFull)
    ));

    // Back-pressure takes precedence over validation.
    assert!(matches!(
        channel.push_superpage(Superpage::new(0, 512 * 1024)),
        Err(Error::QueueFull)
    ));
}

#[test]
fn s4_error_bit_fails_the_channel() {
    // The primer's ring of pages arrives cleanly; everything after that carries the error bit.
    let mut test = test_channel(2 * MIB, |ordinal, _slot| {
        if ordinal < READYFIFO_ENTRIES {
            (PAGE_WORDS, WHOLE_ARRIVED)
        } else {
            (PAGE_WORDS, ERROR_ARRIVED)
        }
    });

    test.channel.start_dma().unwrap();
    test.channel
        .push_superpage(Superpage::new(0, 2 * MIB))
        .unwrap();

    // First tick: deferred start, primes and credits the first half of the superpage.
    test.channel.fill_superpages().unwrap();
    assert_eq!(test.channel.get_ready_queue_size(), 0);

    // Second tick: the freshly pushed pages report the error bit at the ring's back slot.
    match test.channel.fill_superpages() {
        Err(Error::DataArrival {
            status,
            length,
            index,
        }) => {
            assert_eq!(status, ERROR_ARRIVED);
            assert_eq!(length, PAGE_WORDS);
            assert_eq!(index, 0);
        }
        other => panic!("expected DataArrival error, got {:?}", other),
    }

    // The superpage must not have been delivered.
    assert_eq!(test.channel.get_ready_queue_size(), 0);
    assert!(matches!(
        test.channel.pop_superpage(),
        Err(Error::QueueEmpty)
    ));
}

#[test]
fn partial_arrival_stops_the_harvest_without_error() {
    // Primer ring arrives whole; of the second ring, the first 64 pages arrive whole and the
    // rest are partial.
    let mut test = test_channel(2 * MIB, |ordinal, _slot| {
        if ordinal < READYFIFO_ENTRIES + 64 {
            (PAGE_WORDS, WHOLE_ARRIVED)
        } else {
            (0, 0)
        }
    });

    test.channel.start_dma().unwrap();
    test.channel
        .push_superpage(Superpage::new(0, 2 * MIB))
        .unwrap();

    test.channel.fill_superpages().unwrap();
    test.channel.fill_superpages().unwrap();
    test.channel.fill_superpages().unwrap();
    assert_eq!(test.channel.get_ready_queue_size(), 0);

    // The card finishes the stalled pages; the next tick completes the superpage.
    for slot in 64..READYFIFO_ENTRIES {
        test.card.write_descriptor(slot, PAGE_WORDS, WHOLE_ARRIVED);
    }
    test.channel.fill_superpages().unwrap();

    assert_eq!(test.channel.get_ready_queue_size(), 1);
    let superpage = test.channel.pop_superpage().unwrap();
    assert_eq!(superpage.received(), 2 * MIB);
}

#[test]
fn conservation_over_many_ticks() {
    let mut test = test_channel(4 * MIB, whole_arrivals);

    test.channel.start_dma().unwrap();
    test.channel
        .push_superpage(Superpage::new(0, 2 * MIB))
        .unwrap();
    test.channel
        .push_superpage(Superpage::new(2 * MIB, 2 * MIB))
        .unwrap();

    for _ in 0..10 {
        test.channel.fill_superpages().unwrap();
        if test.channel.get_ready_queue_size() == 2 {
            break;
        }
    }

    // Every page of both superpages went through the ring exactly once.
    assert_eq!(test.channel.get_ready_queue_size(), 2);
    assert_eq!(test.pushes.load(Ordering::SeqCst), 4 * MIB / PAGE);
    assert_eq!(test.channel.pop_superpage().unwrap().offset(), 0);
    assert_eq!(test.channel.pop_superpage().unwrap().offset(), 2 * MIB);
}

#[test]
fn stop_is_idempotent() {
    let mut ops = MockCardOps::new();
    ops.expect_stop_data_generator().times(1).returning(|| Ok(()));
    ops.expect_stop_data_receiver().times(1).returning(|| Ok(()));

    let buffer = Arc::new(MemoryDmaBuffer::new(MIB));
    let fifo_buffer = Arc::new(MemoryDmaBuffer::new(READY_FIFO_SIZE));
    let parameters = Parameters::new(CardId::Address(PciAddress::new(0, 0, 0).unwrap()), 0);
    let mut channel = CrorcDmaChannel::new(
        &parameters,
        CrorcCollaborators {
            ops: Box::new(ops),
            buffer,
            fifo_buffer,
            lock: None,
        },
    )
    .unwrap();

    channel.start_dma().unwrap();
    channel.stop_dma().unwrap();
    // The second stop (and the drop) must not touch the card again.
    channel.stop_dma().unwrap();
}

#[test]
fn reset_nothing_is_a_noop() {
    // No expectations: any register traffic would fail the mock.
    let ops = MockCardOps::new();

    let buffer = Arc::new(MemoryDmaBuffer::new(MIB));
    let fifo_buffer = Arc::new(MemoryDmaBuffer::new(READY_FIFO_SIZE));
    let parameters = Parameters::new(CardId::Address(PciAddress::new(0, 0, 0).unwrap()), 0);
    let mut channel = CrorcDmaChannel::new(
        &parameters,
        CrorcCollaborators {
            ops: Box::new(ops),
            buffer,
            fifo_buffer,
            lock: None,
        },
    )
    .unwrap();

    channel.reset_channel(ResetLevel::Nothing).unwrap();
}

#[test]
fn reset_internal_diu_siu_implies_internal() {
    let calls: Arc<Mutex<Vec<(&'static str, ResetTarget)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut ops = MockCardOps::new();
    {
        let calls = Arc::clone(&calls);
        ops.expect_reset().returning(move |target, _| {
            calls.lock().unwrap().push(("reset", target));
            Ok(())
        });
    }
    {
        let calls = Arc::clone(&calls);
        ops.expect_arm_ddl().returning(move |target, _| {
            calls.lock().unwrap().push(("arm", target));
            Ok(())
        });
    }

    let buffer = Arc::new(MemoryDmaBuffer::new(MIB));
    let fifo_buffer = Arc::new(MemoryDmaBuffer::new(READY_FIFO_SIZE));
    let parameters = Parameters::new(CardId::Address(PciAddress::new(0, 0, 0).unwrap()), 0)
        .set_generator_loopback(LoopbackMode::Siu);
    let mut channel = CrorcDmaChannel::new(
        &parameters,
        CrorcCollaborators {
            ops: Box::new(ops),
            buffer,
            fifo_buffer,
            lock: None,
        },
    )
    .unwrap();

    channel.reset_channel(ResetLevel::InternalDiuSiu).unwrap();

    // The deep reset performs the internal actions first, then the SIU sequence.
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            ("reset", ResetTarget::FreeFifo),
            ("reset", ResetTarget::Rorc),
            ("arm", ResetTarget::Diu),
            ("arm", ResetTarget::Siu),
            ("arm", ResetTarget::Diu),
            ("arm", ResetTarget::Rorc),
        ]
    );
}

#[test]
fn primer_needs_a_full_ring_of_pages() {
    // With 16 KiB pages a 1 MiB superpage holds only 64 pages, not the 128 the primer needs.
    let mut ops = MockCardOps::new();
    ops.expect_stop_data_generator().returning(|| Ok(()));
    ops.expect_stop_data_receiver().returning(|| Ok(()));

    let buffer = Arc::new(MemoryDmaBuffer::new(MIB));
    let fifo_buffer = Arc::new(MemoryDmaBuffer::new(READY_FIFO_SIZE));
    let parameters = Parameters::new(CardId::Address(PciAddress::new(0, 0, 0).unwrap()), 0)
        .set_dma_page_size(16 * 1024);
    let mut channel = CrorcDmaChannel::new(
        &parameters,
        CrorcCollaborators {
            ops: Box::new(ops),
            buffer,
            fifo_buffer,
            lock: None,
        },
    )
    .unwrap();

    channel.start_dma().unwrap();
    channel.push_superpage(Superpage::new(0, MIB)).unwrap();
    assert!(matches!(
        channel.fill_superpages(),
        Err(Error::Parameter(_))
    ));
}

#[test]
fn fifo_buffer_must_hold_the_whole_ring() {
    let buffer = Arc::new(MemoryDmaBuffer::new(MIB));
    let fifo_buffer = Arc::new(MemoryDmaBuffer::new(READY_FIFO_SIZE / 2));
    let parameters = Parameters::new(CardId::Address(PciAddress::new(0, 0, 0).unwrap()), 0);

    let result = CrorcDmaChannel::new(
        &parameters,
        CrorcCollaborators {
            ops: Box::new(MockCardOps::new()),
            buffer,
            fifo_buffer,
            lock: None,
        },
    );
    assert!(matches!(result, Err(Error::Fifo { .. })));
}

#[test]
fn start_twice_is_a_noop() {
    let mut test = test_channel(MIB, whole_arrivals);

    test.channel.start_dma().unwrap();
    test.channel.start_dma().unwrap();

    test.channel.push_superpage(Superpage::new(0, MIB)).unwrap();
    test.channel.fill_superpages().unwrap();
    assert_eq!(test.channel.get_ready_queue_size(), 1);
}
