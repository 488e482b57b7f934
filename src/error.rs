// SPDX-License-Identifier: MIT OR Apache-2.0

//! The crate's error type.
//!
//! All fallible operations return [`Result`]. [`Error`] is a closed set of kinds; each kind
//! carries the structured context a caller needs to react to it (status words, slot indices,
//! lock names), rather than a bag of dynamically-typed attachments.

/* ---------------------------------------------------------------------------------------------- */

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::parameters::{LoopbackMode, ResetLevel};

/* ---------------------------------------------------------------------------------------------- */

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A construction-time or call-time parameter was invalid.
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// A superpage offset did not satisfy the required alignment.
    #[error("superpage offset {offset:#x} is not {alignment}-byte aligned")]
    Alignment { offset: usize, alignment: usize },

    /// The transfer queue cannot take another superpage.
    #[error("could not push superpage, transfer queue was full")]
    QueueFull,

    /// There was no filled superpage to pop or peek.
    #[error("could not pop superpage, ready queue was empty")]
    QueueEmpty,

    /// A superpage fell (partly) outside the registered buffer.
    #[error("superpage [{offset:#x}, {end:#x}) does not fit in buffer of {buffer_size:#x} bytes")]
    OutOfRange {
        offset: usize,
        end: usize,
        buffer_size: usize,
    },

    /// The hardware-programming collaborator reported a failure.
    #[error(transparent)]
    Card(#[from] CardError),

    /// The card reported a descriptor status word the engine cannot interpret, or one with the
    /// error bit set. The channel must be reset and restarted before further use.
    #[error(
        "data arrival status word invalid: status {status:#010x}, length {length:#x}, \
         fifo index {index}"
    )]
    DataArrival { status: i32, length: i32, index: usize },

    /// The channel lock file could not be acquired. Another live process most likely owns the
    /// channel.
    #[error("failed to acquire file lock {path:?}: {message}")]
    FileLock { path: PathBuf, message: String },

    /// The file lock was acquired but the named mutex was not. Possible causes: the mutex is
    /// held by another thread in this process, or a previous lock on the same channel was not
    /// cleanly released (crashed process).
    #[error("failed to acquire named mutex \"{name}\"; file lock was acquired: {message}")]
    NamedMutexLock { name: String, message: String },

    /// A scatter/gather entry was too small to hold the ready FIFO.
    #[error("scatter/gather entry of {entry_size} bytes too small for ready FIFO of {fifo_size}")]
    Fifo { entry_size: usize, fifo_size: usize },
}

/* ---------------------------------------------------------------------------------------------- */

/// A failure reported by the card-programming layer.
///
/// `reset_level` and `loopback_mode` are filled in by the DMA engine when the failure happened
/// during a reset sequence; `csr` carries the offending register value where one exists.
#[derive(Debug)]
pub struct CardError {
    pub message: String,
    pub reset_level: Option<ResetLevel>,
    pub loopback_mode: Option<LoopbackMode>,
    pub csr: Option<u32>,
}

impl CardError {
    pub fn new(message: impl Into<String>) -> CardError {
        CardError {
            message: message.into(),
            reset_level: None,
            loopback_mode: None,
            csr: None,
        }
    }

    pub fn with_csr(message: impl Into<String>, csr: u32) -> CardError {
        CardError {
            csr: Some(csr),
            ..CardError::new(message)
        }
    }
}

impl fmt::Display for CardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "card error: {}", self.message)?;
        if let Some(csr) = self.csr {
            write!(f, " (register {:#010x})", csr)?;
        }
        if let Some(level) = self.reset_level {
            write!(f, " (reset level {:?})", level)?;
        }
        if let Some(loopback) = self.loopback_mode {
            write!(f, " (loopback mode {:?})", loopback)?;
        }
        Ok(())
    }
}

impl std::error::Error for CardError {}

/* ---------------------------------------------------------------------------------------------- */
