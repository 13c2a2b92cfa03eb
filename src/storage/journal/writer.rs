/*
 * Created on Tue Mar 19 2024
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

use {
    super::{RecordType, BLOCK_SIZE, HEADER_SIZE, MAX_RECORD_TYPE},
    crate::{
        storage::{
            checksum::{mask, SCrc32},
            interface::fs::{File, FileWrite, FileWriteExt},
        },
        IoResult,
    },
};

/// Appends logical records to a journal file, fragmenting them across
/// fixed-size blocks. Single-threaded; one writer owns the file for its
/// lifetime
pub struct JournalWriter<F = File> {
    dest: F,
    block_offset: usize,
    // digests pre-seeded with the type byte, one per record type
    type_crc: [SCrc32; MAX_RECORD_TYPE as usize + 1],
}

impl<F: FileWrite> JournalWriter<F> {
    pub fn new(dest: F) -> Self {
        Self::with_offset(dest, 0)
    }
    /// Resume appending to a journal whose current length is `dest_len`
    pub fn with_offset(dest: F, dest_len: u64) -> Self {
        Self {
            dest,
            block_offset: (dest_len % BLOCK_SIZE as u64) as usize,
            type_crc: core::array::from_fn(|t| {
                let mut digest = SCrc32::new();
                digest.update(&[t as u8]);
                digest
            }),
        }
    }
    pub fn add_record(&mut self, payload: &[u8]) -> IoResult<()> {
        let mut left = payload;
        let mut begin = true;
        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                // zero the trailer and move to a fresh block
                if leftover > 0 {
                    const TRAILER: [u8; HEADER_SIZE - 1] = [0; HEADER_SIZE - 1];
                    self.dest.fwrite_all(&TRAILER[..leftover])?;
                }
                self.block_offset = 0;
            }
            debug_assert!(BLOCK_SIZE - self.block_offset >= HEADER_SIZE);
            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_len = left.len().min(avail);
            let end = fragment_len == left.len();
            let ty = match (begin, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };
            self.emit_physical_record(ty, &left[..fragment_len])?;
            left = &left[fragment_len..];
            begin = false;
            if end {
                break Ok(());
            }
        }
    }
    fn emit_physical_record(&mut self, ty: RecordType, fragment: &[u8]) -> IoResult<()> {
        debug_assert!(fragment.len() <= u16::MAX as usize);
        debug_assert!(self.block_offset + HEADER_SIZE + fragment.len() <= BLOCK_SIZE);
        let mut digest = self.type_crc[ty as usize].clone();
        digest.update(fragment);
        let crc = mask(digest.finish());
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&crc.to_le_bytes());
        header[4..6].copy_from_slice(&(fragment.len() as u16).to_le_bytes());
        header[6] = ty as u8;
        self.dest.fwrite_all(&header)?;
        self.dest.fwrite_all(fragment)?;
        self.dest.fflush()?;
        self.block_offset += HEADER_SIZE + fragment.len();
        Ok(())
    }
    pub fn into_inner(self) -> F {
        self.dest
    }
}

impl<F: FileWrite + FileWriteExt> JournalWriter<F> {
    /// Durability barrier: everything appended so far reaches stable storage
    pub fn sync(&mut self) -> IoResult<()> {
        self.dest.fsync_all()
    }
}
