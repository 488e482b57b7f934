// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel-lock behavior. These tests create real lock files and named semaphores under
//! /dev/shm, with names salted by the test process id so concurrent runs don't collide.

use rorc_driver::channel_paths::ChannelPaths;
use rorc_driver::error::Error;
use rorc_driver::interprocess::{ChannelLock, LockMode};
use rorc_driver::pci::PciAddress;

fn unique_paths(tag: u32) -> ChannelPaths {
    let channel = std::process::id().wrapping_mul(16) + tag;
    ChannelPaths::new(PciAddress::new(0xfe, 0, 0).unwrap(), channel)
}

#[test]
fn try_lock_conflicts_while_held_and_releases_on_drop() {
    let paths = unique_paths(1);

    let lock = ChannelLock::acquire(&paths, LockMode::Try).unwrap();

    // A second acquisition fails on the file lock, which signals a live owner.
    match ChannelLock::acquire(&paths, LockMode::Try) {
        Err(Error::FileLock { .. }) => {}
        Err(other) => panic!("expected a file lock conflict, got {}", other),
        Ok(_) => panic!("expected a file lock conflict, got a lock"),
    }

    drop(lock);

    // Both locks come back after release.
    let reacquired = ChannelLock::acquire(&paths, LockMode::Try).unwrap();
    drop(reacquired);

    let _ = std::fs::remove_file(paths.lock());
}

#[test]
fn wait_mode_acquires_a_free_lock() {
    let paths = unique_paths(2);

    let lock = ChannelLock::acquire(&paths, LockMode::Wait).unwrap();
    drop(lock);

    let _ = std::fs::remove_file(paths.lock());
}
