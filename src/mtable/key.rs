/*
 * Created on Fri Mar 29 2024
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
    internal key format
    ---
    Every user key is stored with an 8-byte little-endian tag appended:

        tag = (sequence << 8) | value_type

    Ordering over internal keys is user key ascending, then tag DESCENDING,
    so that a seek to (key, S) lands on the newest entry with sequence <= S.
    The tag layout is part of the on-disk format; treat every constant here
    as frozen.
*/

use crate::storage::coding::{decode_fixed64, put_fixed64, put_varint32};

/// Engine-wide structural constants
pub mod config {
    pub const NUM_LEVELS: usize = 7;
    /// Level-0 file count that starts a compaction
    pub const L0_COMPACTION_TRIGGER: usize = 4;
    /// Level-0 file count at which writes are slowed
    pub const L0_SLOWDOWN_WRITES_TRIGGER: usize = 8;
    /// Level-0 file count at which writes stop
    pub const L0_STOP_WRITES_TRIGGER: usize = 12;
    /// Highest level a fresh memtable compaction may be pushed to
    pub const MAX_MEM_COMPACT_LEVEL: usize = 2;
    /// Approximate byte gap between read samples during iteration
    pub const READ_BYTES_PERIOD: usize = 1_048_576;
}

pub type SeqNumber = u64;

/// Sequence numbers are 56-bit so they can share a u64 with the type byte
pub const MAX_SEQUENCE_NUMBER: SeqNumber = (1 << 56) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    Deletion = 0x0,
    Value = 0x1,
}

/// The tag type used when seeking: the highest-sorting type for a given
/// sequence (tags order descending)
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Value;

impl ValueType {
    pub const fn from_tag(tag: u64) -> Option<Self> {
        match tag & 0xff {
            0x0 => Some(Self::Deletion),
            0x1 => Some(Self::Value),
            _ => None,
        }
    }
}

#[inline(always)]
pub const fn pack_seq_and_type(seq: SeqNumber, vtype: ValueType) -> u64 {
    debug_assert!(seq <= MAX_SEQUENCE_NUMBER);
    (seq << 8) | vtype as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SeqNumber,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn new(user_key: &'a [u8], sequence: SeqNumber, value_type: ValueType) -> Self {
        Self {
            user_key,
            sequence,
            value_type,
        }
    }
    /// Encoded length of this key
    pub fn encoding_length(&self) -> usize {
        self.user_key.len() + sizeof!(u64)
    }
}

pub fn append_internal_key(dst: &mut Vec<u8>, key: &ParsedInternalKey) {
    dst.extend_from_slice(key.user_key);
    put_fixed64(dst, pack_seq_and_type(key.sequence, key.value_type));
}

/// Decode an internal key; `None` if it is structurally invalid
pub fn parse_internal_key(internal_key: &[u8]) -> Option<ParsedInternalKey<'_>> {
    if internal_key.len() < sizeof!(u64) {
        return None;
    }
    let (user_key, tag) = internal_key.split_at(internal_key.len() - sizeof!(u64));
    let tag = decode_fixed64(tag);
    Some(ParsedInternalKey {
        user_key,
        sequence: tag >> 8,
        value_type: ValueType::from_tag(tag)?,
    })
}

#[inline(always)]
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    debug_assert!(internal_key.len() >= sizeof!(u64));
    &internal_key[..internal_key.len() - sizeof!(u64)]
}

#[inline(always)]
pub fn extract_tag(internal_key: &[u8]) -> u64 {
    debug_assert!(internal_key.len() >= sizeof!(u64));
    decode_fixed64(&internal_key[internal_key.len() - sizeof!(u64)..])
}

/// The key shape used for memtable lookups. One buffer, three views:
///
/// ```text
/// | varint32(klen + 8) | user key | tag |
/// ^ memtable key                        |
///                      ^ internal key   |
///                      ^ user key  ^    |
/// ```
pub struct LookupKey {
    data: Vec<u8>,
    kstart: usize,
}

impl LookupKey {
    /// Key for a snapshot read of `user_key` at `sequence`
    pub fn new(user_key: &[u8], sequence: SeqNumber) -> Self {
        let mut data = Vec::with_capacity(user_key.len() + 13);
        put_varint32(&mut data, (user_key.len() + sizeof!(u64)) as u32);
        let kstart = data.len();
        data.extend_from_slice(user_key);
        put_fixed64(&mut data, pack_seq_and_type(sequence, VALUE_TYPE_FOR_SEEK));
        Self { data, kstart }
    }
    /// The full length-prefixed form the memtable's index stores
    pub fn memtable_key(&self) -> &[u8] {
        &self.data
    }
    pub fn internal_key(&self) -> &[u8] {
        &self.data[self.kstart..]
    }
    pub fn user_key(&self) -> &[u8] {
        &self.data[self.kstart..self.data.len() - sizeof!(u64)]
    }
}
