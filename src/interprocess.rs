// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel exclusive ownership across processes.
//!
//! A [`ChannelLock`] holds two locks at once: a lock on the channel's lock file, and the
//! channel's named mutex (a POSIX named semaphore). The file lock is released by the kernel when
//! the owning process dies; the named mutex is NOT. The combination gives crash detection: if a
//! `Try` acquisition gets the file lock but not the named mutex, the previous owner most likely
//! crashed without cleaning up, and the operator should clear the stale mutex by hand.

/* ---------------------------------------------------------------------------------------------- */

use std::ffi::CString;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use libc::{c_int, sem_t};

use crate::channel_paths::ChannelPaths;
use crate::error::{Error, Result};

/* ---------------------------------------------------------------------------------------------- */

fn flock(file: &File, operation: c_int) -> io::Result<()> {
    let ret = unsafe { libc::flock(file.as_raw_fd(), operation) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sem_open(name: &CString) -> io::Result<*mut sem_t> {
    let sem = unsafe {
        libc::sem_open(
            name.as_ptr(),
            libc::O_CREAT,
            0o644 as libc::mode_t,
            1 as libc::c_uint,
        )
    };
    if sem == libc::SEM_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(sem)
    }
}

fn sem_trywait(sem: *mut sem_t) -> io::Result<()> {
    let ret = unsafe { libc::sem_trywait(sem) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sem_wait(sem: *mut sem_t) -> io::Result<()> {
    loop {
        let ret = unsafe { libc::sem_wait(sem) };
        if ret == 0 {
            return Ok(());
        }
        let error = io::Error::last_os_error();
        if error.kind() != io::ErrorKind::Interrupted {
            return Err(error);
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */

/// How to behave when a lock is already held elsewhere.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LockMode {
    /// Fail immediately.
    Try,
    /// Block until both locks are available.
    Wait,
}

/// Exclusive ownership of one channel. Both underlying locks are released on drop.
pub struct ChannelLock {
    lock_file: File,
    semaphore: *mut sem_t,
    mutex_name: String,
}

// The semaphore handle may move between threads with the lock; it is only ever posted once, on
// drop.
unsafe impl Send for ChannelLock {}

impl ChannelLock {
    /// Acquires both locks for the given channel, all or nothing.
    ///
    /// With [`LockMode::Try`], the error distinguishes which lock failed: a
    /// [`Error::FileLock`] means another live process owns the channel; a
    /// [`Error::NamedMutexLock`] means the file lock was free but the mutex was held, which
    /// points at stale state from a crashed owner.
    ///
    /// With [`LockMode::Wait`], both acquisitions block. The locks are always taken in the same
    /// order (file first, then mutex), so two waiters cannot deadlock against each other.
    pub fn acquire(paths: &ChannelPaths, mode: LockMode) -> Result<ChannelLock> {
        let lock_path = paths.lock();
        let mutex_name = paths.named_mutex();

        // lock file

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .map_err(|error| file_lock_error(&lock_path, &error))?;

        let operation = match mode {
            LockMode::Try => libc::LOCK_EX | libc::LOCK_NB,
            LockMode::Wait => libc::LOCK_EX,
        };
        flock(&lock_file, operation).map_err(|error| {
            if error.kind() == io::ErrorKind::WouldBlock {
                Error::FileLock {
                    path: lock_path.clone(),
                    message: "lock is held by another process".into(),
                }
            } else {
                file_lock_error(&lock_path, &error)
            }
        })?;

        // named mutex

        let semaphore_name = CString::new(format!("/{}", mutex_name))
            .expect("mutex name contains no interior NUL");
        let semaphore = sem_open(&semaphore_name).map_err(|error| Error::NamedMutexLock {
            name: mutex_name.clone(),
            message: error.to_string(),
        })?;

        let acquired = match mode {
            LockMode::Try => sem_trywait(semaphore),
            LockMode::Wait => sem_wait(semaphore),
        };
        if let Err(error) = acquired {
            // Dropping `lock_file` below releases the file lock again.
            unsafe { libc::sem_close(semaphore) };
            return Err(Error::NamedMutexLock {
                name: mutex_name,
                message: if error.kind() == io::ErrorKind::WouldBlock {
                    "mutex is held; previous owner may have crashed".into()
                } else {
                    error.to_string()
                },
            });
        }

        Ok(ChannelLock {
            lock_file,
            semaphore,
            mutex_name,
        })
    }
}

impl Drop for ChannelLock {
    fn drop(&mut self) {
        unsafe {
            libc::sem_post(self.semaphore);
            libc::sem_close(self.semaphore);
        }
        let _ = flock(&self.lock_file, libc::LOCK_UN);
    }
}

impl fmt::Debug for ChannelLock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChannelLock")
            .field("mutex_name", &self.mutex_name)
            .finish()
    }
}

fn file_lock_error(path: &Path, error: &io::Error) -> Error {
    Error::FileLock {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/* ---------------------------------------------------------------------------------------------- */
