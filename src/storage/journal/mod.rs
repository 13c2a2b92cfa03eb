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

/*
    write-ahead journal
    ---
    The journal file is a stream of fixed 32KiB blocks. Each block is a run
    of physical records; if fewer than 7 bytes are left in a block, they are
    zeroed and the next record starts at the next block boundary. A header
    NEVER straddles a block boundary.

    Physical record:
    +--------------------+------------+----------+-----------------+
    | 4B: masked crc32c  | 2B: length | 1B: type | length: payload |
    +--------------------+------------+----------+-----------------+
    (all integers little-endian; crc over type byte || payload)

    A logical record is either one Full record or First Middle* Last. The
    reader tolerates torn tails (a crashed writer) silently and skips over
    corrupted regions, reporting the dropped byte counts.
*/

mod reader;
mod writer;
#[cfg(test)]
mod tests;

pub use {
    reader::{CorruptionReporter, JournalReader},
    writer::JournalWriter,
};

/// Fixed size of a journal block
pub const BLOCK_SIZE: usize = 32768;
/// checksum (4B) + length (2B) + type (1B)
pub const HEADER_SIZE: usize = sizeof!(u32) + sizeof!(u16) + sizeof!(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Preallocated/zeroed region; never written by the writer
    Zero = 0,
    Full = 1,
    First = 2,
    Middle = 3,
    Last = 4,
}

pub(super) const MAX_RECORD_TYPE: u8 = RecordType::Last as u8;
