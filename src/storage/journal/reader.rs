/*
 * Created on Thu Mar 21 2024
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
        error::Error,
        storage::{
            checksum::{unmask, SCrc32},
            coding::decode_fixed32,
            interface::fs::{File, FileRead},
        },
    },
    core::ops::Range,
};

/// Sink for corruption reports. The reader never fails hard on corrupt
/// content; it tells the reporter how much it had to drop and resumes at
/// the next intact record
pub trait CorruptionReporter {
    fn corruption(&mut self, bytes: usize, reason: &Error);
}

// internal result codes, right past the valid record types
const CODE_EOF: u8 = MAX_RECORD_TYPE + 1;
const CODE_BAD: u8 = MAX_RECORD_TYPE + 2;

/// Streams logical records out of a journal file. Single-threaded; the
/// reader owns the file for its lifetime
pub struct JournalReader<F = File> {
    file: F,
    reporter: Option<Box<dyn CorruptionReporter>>,
    verify_checksums: bool,
    backing: Box<[u8]>,
    /// live window into `backing`
    buf: Range<usize>,
    eof: bool,
    /// offset at which the last record returned by `read_record` began
    last_record_offset: u64,
    /// offset of the first location past the end of `backing`'s content
    end_of_buffer_offset: u64,
    initial_offset: u64,
    /// true while skipping ahead to the first record at or past
    /// `initial_offset` (dropping fragments of records that started earlier)
    resyncing: bool,
}

impl<F: FileRead> JournalReader<F> {
    pub fn new(
        file: F,
        reporter: Option<Box<dyn CorruptionReporter>>,
        verify_checksums: bool,
        initial_offset: u64,
    ) -> Self {
        Self {
            file,
            reporter,
            verify_checksums,
            backing: vec![0u8; BLOCK_SIZE].into_boxed_slice(),
            buf: 0..0,
            eof: false,
            last_record_offset: 0,
            end_of_buffer_offset: 0,
            initial_offset,
            resyncing: initial_offset > 0,
        }
    }

    /// Read the next logical record into `record`. Returns false at EOF.
    /// `record` holds the payload until the next call
    pub fn read_record(&mut self, record: &mut Vec<u8>) -> bool {
        if self.last_record_offset < self.initial_offset {
            if !self.skip_to_initial_block() {
                return false;
            }
        }
        record.clear();
        let mut in_fragmented_record = false;
        // offset at which the logical record being assembled started
        let mut prospective_record_offset = 0u64;
        loop {
            let (code, frag) = self.read_physical_record();
            let fragment_len = frag.len() as u64;
            // where this physical record began: current read position, less
            // what is still buffered, less this record itself. wrapping math
            // mirrors the fact that the value is meaningless for EOF codes
            let physical_record_offset = self
                .end_of_buffer_offset
                .wrapping_sub(self.buf.len() as u64)
                .wrapping_sub(HEADER_SIZE as u64)
                .wrapping_sub(fragment_len);

            if self.resyncing {
                if code == RecordType::Middle as u8 {
                    continue;
                } else if code == RecordType::Last as u8 {
                    self.resyncing = false;
                    continue;
                } else {
                    self.resyncing = false;
                }
            }

            if code == RecordType::Full as u8 {
                if in_fragmented_record && !record.is_empty() {
                    self.report_corruption(record.len() as u64, "partial record without end(1)");
                }
                record.clear();
                record.extend_from_slice(&self.backing[frag]);
                self.last_record_offset = physical_record_offset;
                return true;
            } else if code == RecordType::First as u8 {
                if in_fragmented_record && !record.is_empty() {
                    self.report_corruption(record.len() as u64, "partial record without end(2)");
                }
                prospective_record_offset = physical_record_offset;
                record.clear();
                record.extend_from_slice(&self.backing[frag]);
                in_fragmented_record = true;
            } else if code == RecordType::Middle as u8 {
                if !in_fragmented_record {
                    self.report_corruption(fragment_len, "missing start of fragmented record(1)");
                } else {
                    record.extend_from_slice(&self.backing[frag]);
                }
            } else if code == RecordType::Last as u8 {
                if !in_fragmented_record {
                    self.report_corruption(fragment_len, "missing start of fragmented record(2)");
                } else {
                    record.extend_from_slice(&self.backing[frag]);
                    self.last_record_offset = prospective_record_offset;
                    return true;
                }
            } else if code == CODE_EOF {
                if in_fragmented_record {
                    // the writer died after a fragment and before the next
                    // one; drop the partial logical record without noise
                    record.clear();
                }
                return false;
            } else if code == CODE_BAD {
                if in_fragmented_record {
                    self.report_corruption(record.len() as u64, "error in middle of record");
                    in_fragmented_record = false;
                    record.clear();
                }
            } else {
                let dropped = fragment_len
                    + if in_fragmented_record {
                        record.len() as u64
                    } else {
                        0
                    };
                self.report_corruption(dropped, &format!("unknown record type {code}"));
                in_fragmented_record = false;
                record.clear();
            }
        }
    }

    /// The file offset at which the most recently returned record began
    pub fn last_record_offset(&self) -> u64 {
        self.last_record_offset
    }

    fn skip_to_initial_block(&mut self) -> bool {
        let offset_in_block = self.initial_offset % BLOCK_SIZE as u64;
        let mut block_start_location = self.initial_offset - offset_in_block;
        // an offset inside the trailer can't start a record; begin at the
        // next block instead
        if offset_in_block > (BLOCK_SIZE - HEADER_SIZE + 1) as u64 {
            block_start_location += BLOCK_SIZE as u64;
        }
        self.end_of_buffer_offset = block_start_location;
        if block_start_location > 0 {
            if let Err(e) = self.file.fskip(block_start_location) {
                self.report_drop(block_start_location, &Error::from(e));
                return false;
            }
        }
        true
    }

    /// Returns the record type (or an internal EOF/BAD code) and the
    /// payload's window into the backing buffer
    fn read_physical_record(&mut self) -> (u8, Range<usize>) {
        loop {
            if self.buf.len() < HEADER_SIZE {
                if !self.eof {
                    // the leftover (if any) is block trailer; refill
                    self.buf = 0..0;
                    let n = match self.file.fread_upto(&mut self.backing) {
                        Ok(n) => n,
                        Err(e) => {
                            self.report_drop(BLOCK_SIZE as u64, &Error::from(e));
                            self.eof = true;
                            return (CODE_EOF, 0..0);
                        }
                    };
                    self.end_of_buffer_offset += n as u64;
                    self.buf = 0..n;
                    if n < BLOCK_SIZE {
                        self.eof = true;
                    }
                    continue;
                } else {
                    // a truncated header at eof means the writer died while
                    // writing it. not corruption, just the end
                    self.buf = 0..0;
                    return (CODE_EOF, 0..0);
                }
            }
            let header_start = self.buf.start;
            let header = &self.backing[header_start..header_start + HEADER_SIZE];
            let a = header[4] as usize;
            let b = header[5] as usize;
            let ty = header[6];
            let length = a | (b << 8);
            if HEADER_SIZE + length > self.buf.len() {
                let drop_size = self.buf.len() as u64;
                self.buf = 0..0;
                if !self.eof {
                    self.report_corruption(drop_size, "bad record length");
                    return (CODE_BAD, 0..0);
                }
                // the payload is cut off at eof: writer crash, report EOF
                return (CODE_EOF, 0..0);
            }
            if ty == RecordType::Zero as u8 && length == 0 {
                // zeroed preallocation artifacts; drop without reporting
                self.buf = 0..0;
                return (CODE_BAD, 0..0);
            }
            if self.verify_checksums {
                let expected_crc = unmask(decode_fixed32(header));
                let mut digest = SCrc32::new();
                // crc covers the type byte and the payload
                digest.update(
                    &self.backing[header_start + HEADER_SIZE - 1
                        ..header_start + HEADER_SIZE + length],
                );
                if digest.finish() != expected_crc {
                    // part of the buffer may be a fragment of a real record
                    // elsewhere; dropping everything is the safe move
                    let drop_size = self.buf.len() as u64;
                    self.buf = 0..0;
                    self.report_corruption(drop_size, "checksum mismatch");
                    return (CODE_BAD, 0..0);
                }
            }
            self.buf.start += HEADER_SIZE + length;

            // silently skip records that started before the initial offset
            if self
                .end_of_buffer_offset
                .wrapping_sub(self.buf.len() as u64)
                .wrapping_sub(HEADER_SIZE as u64)
                .wrapping_sub(length as u64)
                < self.initial_offset
            {
                return (CODE_BAD, 0..0);
            }
            return (
                ty,
                header_start + HEADER_SIZE..header_start + HEADER_SIZE + length,
            );
        }
    }

    fn report_corruption(&mut self, bytes: u64, reason: &str) {
        self.report_drop(bytes, &Error::corruption(reason));
    }

    fn report_drop(&mut self, bytes: u64, reason: &Error) {
        // suppress reports for regions the caller asked us to skip
        if self
            .end_of_buffer_offset
            .wrapping_sub(self.buf.len() as u64)
            .wrapping_sub(bytes)
            >= self.initial_offset
        {
            match self.reporter.as_mut() {
                Some(reporter) => reporter.corruption(bytes as usize, reason),
                None => log::warn!("journal: dropped {bytes} bytes: {reason}"),
            }
        }
    }
}
