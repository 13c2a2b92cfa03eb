/*
 * Created on Thu Mar 07 2024
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2024, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

// unix imports
#[cfg(unix)]
extern crate libc;
// windows imports
#[cfg(windows)]
extern crate winapi;
#[cfg(windows)]
use std::os::windows::io::AsRawHandle;

use {
    core::fmt,
    std::{
        fs::File,
        io,
        path::Path,
        time::{SystemTime, UNIX_EPOCH},
    },
};

#[derive(Debug)]
#[repr(transparent)]
/// A wrapper around [`std::io::Error`] that makes it easy to construct
/// errors from bare error kinds at the storage layer
pub struct SysIOError(io::Error);

impl SysIOError {
    pub fn into_inner(self) -> io::Error {
        self.0
    }
}

impl From<io::Error> for SysIOError {
    fn from(e: io::Error) -> Self {
        Self(e)
    }
}

impl From<io::ErrorKind> for SysIOError {
    fn from(e: io::ErrorKind) -> Self {
        Self(e.into())
    }
}

impl fmt::Display for SysIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Microseconds since the unix epoch. Only useful as a monotonic-enough
/// wallclock for rate accounting and log lines
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

pub fn sleep_micros(micros: u64) {
    std::thread::sleep(std::time::Duration::from_micros(micros))
}

/// An exclusive advisory lock on a file. The lock is held for the lifetime
/// of the value unless explicitly [`FileLock::release`]d
pub struct FileLock {
    _file: File,
    #[cfg(windows)]
    handle: winapi::um::winnt::HANDLE,
}

impl FileLock {
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        #[cfg(windows)]
        {
            use {
                std::mem,
                winapi::um::{
                    fileapi::LockFileEx,
                    minwinbase::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY},
                    winnt::HANDLE,
                },
            };
            let handle = file.as_raw_handle();
            let mut overlapped = unsafe { mem::zeroed() };
            let result = unsafe {
                LockFileEx(
                    handle as HANDLE,
                    LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                    0,
                    u32::MAX,
                    u32::MAX,
                    &mut overlapped,
                )
            };
            if result == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "file is already locked",
                ));
            }
            return Ok(Self {
                _file: file,
                handle,
            });
        }
        #[cfg(unix)]
        {
            use {
                libc::{flock, LOCK_EX, LOCK_NB},
                std::os::unix::io::AsRawFd,
            };
            let result = unsafe { flock(file.as_raw_fd(), LOCK_EX | LOCK_NB) };
            if result != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "file is already locked",
                ));
            }
            return Ok(Self { _file: file });
        }
    }
    pub fn release(self) -> io::Result<()> {
        #[cfg(windows)]
        {
            use {
                std::mem,
                winapi::um::{fileapi::UnlockFileEx, winnt::HANDLE},
            };
            let mut overlapped = unsafe { mem::zeroed() };
            let result = unsafe {
                UnlockFileEx(
                    self.handle as HANDLE,
                    0,
                    u32::MAX,
                    u32::MAX,
                    &mut overlapped,
                )
            };
            if result == 0 {
                return Err(io::Error::last_os_error());
            }
        }
        #[cfg(unix)]
        {
            use {
                libc::{flock, LOCK_UN},
                std::os::unix::io::AsRawFd,
            };
            let result = unsafe { flock(self._file.as_raw_fd(), LOCK_UN) };
            if result != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}
