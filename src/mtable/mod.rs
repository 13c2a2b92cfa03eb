/*
 * Created on Mon Apr 01 2024
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
    memtable
    ---
    The mutable in-memory table: a skip index over entry blobs packed into
    arena memory. An entry is

        varint32(klen + 8) || user key || tag || varint32(vlen) || value

    and the index stores just the blob's base pointer; the comparator reads
    the length-prefixed internal key straight out of the arena. Writers are
    serialized by the engine's write path; readers are lock-free. Lifetime
    is managed by Arc: the last clone to drop takes the index and the arena
    (and so every entry) down with it.
*/

mod cmp;
mod key;

pub use {
    cmp::{BytewiseComparator, Comparator, InternalKeyComparator},
    key::{
        append_internal_key, config, extract_tag, extract_user_key, pack_seq_and_type,
        parse_internal_key, LookupKey, ParsedInternalKey, SeqNumber, ValueType,
        MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK,
    },
};

use {
    crate::{
        idx::{KeyComparator, SkipList, SkipListIter},
        mem::{Arena, RawSlice},
        storage::coding::{put_varint32, read_varint32_raw, varint_length, MAX_VARINT32_SIZE},
    },
    core::cmp::Ordering,
    std::sync::Arc,
};

/// View of a length-prefixed blob starting at `p`. Valid while the backing
/// arena is.
///
/// ## Safety
/// `p` must point at a valid encoded blob (arena-resident entries qualify)
unsafe fn read_length_prefixed(p: *const u8) -> RawSlice<u8> {
    let (len, data) = match read_varint32_raw(p, p.add(MAX_VARINT32_SIZE)) {
        Some(decoded) => decoded,
        None => unreachable!("corrupt entry prefix in arena"),
    };
    RawSlice::new(data, len as usize)
}

/// Compares entry blobs by their length-prefixed internal keys
struct EntryComparator<C> {
    icmp: InternalKeyComparator<C>,
}

impl<C: Comparator> KeyComparator<*const u8> for EntryComparator<C> {
    fn compare_keys(&self, a: &*const u8, b: &*const u8) -> Ordering {
        unsafe {
            // UNSAFE(@ohsayan): the index only ever holds pointers to entries we packed ourselves
            self.icmp
                .compare(&read_length_prefixed(*a), &read_length_prefixed(*b))
        }
    }
}

/// Outcome of a memtable point lookup. `Deleted` is a real answer: it means
/// a tombstone is the newest entry at or below the requested sequence, so
/// lower levels must NOT be consulted
#[derive(Debug, PartialEq, Eq)]
pub enum MemLookup<'a> {
    Found(&'a [u8]),
    Deleted,
    Missing,
}

pub struct MemTable<C: Comparator = BytewiseComparator> {
    icmp: InternalKeyComparator<C>,
    arena: Arc<Arena>,
    table: SkipList<*const u8, EntryComparator<C>>,
}

// UNSAFE(@ohsayan): the raw entry pointers target arena memory owned by `arena`, whose lifetime is
// tied to this table; concurrency discipline is the skip index's (one external writer)
unsafe impl<C: Comparator> Send for MemTable<C> {}
unsafe impl<C: Comparator> Sync for MemTable<C> {}

impl<C: Comparator + Clone> MemTable<C> {
    pub fn new(icmp: InternalKeyComparator<C>) -> Arc<Self> {
        let arena = Arc::new(Arena::new());
        let table = SkipList::new(
            EntryComparator { icmp: icmp.clone() },
            Arc::clone(&arena),
        );
        Arc::new(Self { icmp, arena, table })
    }
}

impl<C: Comparator> MemTable<C> {
    /// Bytes held by the backing arena (approximate, relaxed)
    pub fn approximate_memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    /// Insert an entry. Repeated user keys with different sequences
    /// coexist; the comparator keeps the newest first.
    ///
    /// Writers MUST be serialized externally (one writer, any readers)
    pub fn add(&self, sequence: SeqNumber, vtype: ValueType, user_key: &[u8], value: &[u8]) {
        let internal_key_len = user_key.len() + sizeof!(u64);
        let encoded_len = varint_length(internal_key_len as u64)
            + internal_key_len
            + varint_length(value.len() as u64)
            + value.len();
        // pack the entry straight into arena memory through a scratch header
        let mut prefix = Vec::with_capacity(MAX_VARINT32_SIZE);
        unsafe {
            // UNSAFE(@ohsayan): single-writer contract is ours to forward; the region is fresh
            // and exactly encoded_len bytes by construction
            let buf = self.arena.alloc(encoded_len);
            let mut at = buf;
            put_varint32(&mut prefix, internal_key_len as u32);
            at.copy_from_nonoverlapping(prefix.as_ptr(), prefix.len());
            at = at.add(prefix.len());
            at.copy_from_nonoverlapping(user_key.as_ptr(), user_key.len());
            at = at.add(user_key.len());
            let tag = pack_seq_and_type(sequence, vtype).to_le_bytes();
            at.copy_from_nonoverlapping(tag.as_ptr(), tag.len());
            at = at.add(tag.len());
            prefix.clear();
            put_varint32(&mut prefix, value.len() as u32);
            at.copy_from_nonoverlapping(prefix.as_ptr(), prefix.len());
            at = at.add(prefix.len());
            at.copy_from_nonoverlapping(value.as_ptr(), value.len());
            debug_assert_eq!(at.add(value.len()) as usize, buf as usize + encoded_len);
            self.table.insert(buf as *const u8);
        }
    }

    /// Point lookup at the snapshot encoded in `key`
    pub fn get(&self, key: &LookupKey) -> MemLookup<'_> {
        let memkey = key.memtable_key();
        let mut iter = self.table.iter();
        iter.seek(&memkey.as_ptr());
        if iter.valid() {
            let entry = *iter.key();
            let internal_key = unsafe {
                // UNSAFE(@ohsayan): entries in the index are always validly packed
                read_length_prefixed(entry)
            };
            // the seek landed somewhere at or past (user_key, seq); it is
            // only OUR user key if the user-key bytes match exactly
            if self
                .icmp
                .user_comparator()
                .compare(extract_user_key(&internal_key), key.user_key())
                == Ordering::Equal
            {
                match ValueType::from_tag(extract_tag(&internal_key)) {
                    Some(ValueType::Value) => {
                        let value = unsafe {
                            read_length_prefixed(internal_key.as_ptr().add(internal_key.len()))
                                .into_slice()
                        };
                        return MemLookup::Found(value);
                    }
                    Some(ValueType::Deletion) => return MemLookup::Deleted,
                    None => {}
                }
            }
        }
        MemLookup::Missing
    }

    /// Cursor over entries in internal-key order
    pub fn iter(&self) -> MemTableIter<'_, C> {
        MemTableIter {
            it: self.table.iter(),
            scratch: Vec::new(),
        }
    }
}

/// Yields (internal key, value) pairs in index order. Same read contract as
/// the underlying skip index
pub struct MemTableIter<'a, C: Comparator> {
    it: SkipListIter<'a, *const u8, EntryComparator<C>>,
    scratch: Vec<u8>,
}

impl<'a, C: Comparator> MemTableIter<'a, C> {
    pub fn valid(&self) -> bool {
        self.it.valid()
    }
    pub fn key(&self) -> &'a [u8] {
        unsafe {
            // UNSAFE(@ohsayan): valid() => live entry; the arena outlives 'a
            read_length_prefixed(*self.it.key()).into_slice()
        }
    }
    pub fn value(&self) -> &'a [u8] {
        unsafe {
            let internal_key = read_length_prefixed(*self.it.key());
            read_length_prefixed(internal_key.as_ptr().add(internal_key.len())).into_slice()
        }
    }
    pub fn next(&mut self) {
        self.it.next()
    }
    pub fn prev(&mut self) {
        self.it.prev()
    }
    pub fn seek_to_first(&mut self) {
        self.it.seek_to_first()
    }
    pub fn seek_to_last(&mut self) {
        self.it.seek_to_last()
    }
    /// Position at the first entry with internal key >= `internal_key`
    pub fn seek(&mut self, internal_key: &[u8]) {
        self.scratch.clear();
        put_varint32(&mut self.scratch, internal_key.len() as u32);
        self.scratch.extend_from_slice(internal_key);
        self.it.seek(&self.scratch.as_ptr())
    }
}
