/*
 * Created on Sun Apr 07 2024
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
    sharded block cache
    ---
    16 independent LRU shards, selected by the top bits of the key hash.
    Each shard has its own mutex; no operation ever holds two shard locks,
    so there is no ordering hazard. Deleters run after the shard lock is
    released, which means a deleter may safely re-enter the cache.

    A handle pins its entry: the entry is not destroyed while any handle is
    live, even if it has been erased or evicted behind the caller's back.
    Dropping the handle releases the pin (there is no separate release
    call; drop IS release).
*/

mod lru;

pub use lru::DeleterFn;

use {
    self::lru::{free_entry, Garbage, LruCache, LruEntry},
    crate::{
        hash::hash32,
        mem::CachePadded,
        sync::ORD_RLX,
    },
    core::{ptr::NonNull, sync::atomic::AtomicU64},
    parking_lot::Mutex,
};

pub const CACHE_SHARD_BITS: usize = 4;
const NUM_SHARDS: usize = 1 << CACHE_SHARD_BITS;

pub struct ShardedCache<V> {
    shards: [CachePadded<Mutex<LruCache<V>>>; NUM_SHARDS],
    last_id: AtomicU64,
}

// UNSAFE(@ohsayan): entries are plain heap allocations handed between threads under the shard
// mutexes; V crosses threads by value (insert/deleter) and by shared ref (handles)
unsafe impl<V: Send> Send for ShardedCache<V> {}
unsafe impl<V: Send + Sync> Sync for ShardedCache<V> {}

impl<V> ShardedCache<V> {
    /// A cache distributing `capacity` across 16 shards. `capacity == 0`
    /// turns caching off (entries live only as long as their handles)
    pub fn new(capacity: usize) -> Self {
        let per_shard = (capacity + (NUM_SHARDS - 1)) / NUM_SHARDS;
        Self {
            shards: core::array::from_fn(|_| CachePadded::new(Mutex::new(LruCache::new(per_shard)))),
            last_id: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    fn shard_for(hash: u32) -> usize {
        (hash >> (32 - CACHE_SHARD_BITS as u32)) as usize
    }

    #[inline(always)]
    fn hash_key(key: &[u8]) -> u32 {
        hash32(key, 0)
    }

    /// Insert a mapping. Always succeeds; the returned handle pins the new
    /// entry (an older mapping for the same key is detached immediately,
    /// though outstanding handles keep it alive)
    pub fn insert(
        &self,
        key: &[u8],
        value: V,
        charge: usize,
        deleter: Option<DeleterFn<V>>,
    ) -> CacheHandle<'_, V> {
        let hash = Self::hash_key(key);
        let mut gc = Garbage::new();
        let entry = {
            let mut shard = self.shards[Self::shard_for(hash)].lock();
            shard.insert(key, hash, value, charge, deleter, &mut gc)
        };
        run_deleters(gc);
        CacheHandle {
            cache: self,
            entry: unsafe {
                // UNSAFE(@ohsayan): insert never returns null
                NonNull::new_unchecked(entry)
            },
        }
    }

    /// Look a key up and pin the entry if present
    pub fn lookup(&self, key: &[u8]) -> Option<CacheHandle<'_, V>> {
        let hash = Self::hash_key(key);
        let entry = self.shards[Self::shard_for(hash)].lock().lookup(key, hash);
        NonNull::new(entry).map(|entry| CacheHandle { cache: self, entry })
    }

    /// Drop the mapping if present. Pinned entries survive until their last
    /// handle goes away; lookups miss immediately either way
    pub fn erase(&self, key: &[u8]) {
        let hash = Self::hash_key(key);
        let mut gc = Garbage::new();
        self.shards[Self::shard_for(hash)]
            .lock()
            .erase(key, hash, &mut gc);
        run_deleters(gc);
    }

    /// Evict every unpinned entry in every shard
    pub fn prune(&self) {
        for shard in &self.shards {
            let mut gc = Garbage::new();
            shard.lock().prune(&mut gc);
            run_deleters(gc);
        }
    }

    /// Sum of the charges of all resident entries
    pub fn total_charge(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().total_charge())
            .sum()
    }

    /// A process-unique id, for clients that partition one cache between
    /// multiple users
    pub fn new_id(&self) -> u64 {
        self.last_id.fetch_add(1, ORD_RLX) + 1
    }
}

fn run_deleters<V>(gc: Garbage<V>) {
    for entry in gc {
        unsafe {
            // UNSAFE(@ohsayan): every pointer in the garbage list had its refcount drop to zero
            // under the shard lock and is reachable from nowhere else
            free_entry(entry)
        }
    }
}

/// A pinned cache entry. The value stays readable (and the entry alive) for
/// as long as the handle exists; dropping it releases the pin
pub struct CacheHandle<'a, V> {
    cache: &'a ShardedCache<V>,
    entry: NonNull<LruEntry<V>>,
}

impl<'a, V> CacheHandle<'a, V> {
    pub fn value(&self) -> &V {
        unsafe {
            // UNSAFE(@ohsayan): pinned entries are never destroyed, and the value field is
            // immutable after insert
            self.entry.as_ref().value_ref()
        }
    }
}

impl<'a, V> Drop for CacheHandle<'a, V> {
    fn drop(&mut self) {
        let hash = unsafe { self.entry.as_ref().hash_code() };
        let mut gc = Garbage::new();
        self.cache.shards[ShardedCache::<V>::shard_for(hash)]
            .lock()
            .release(self.entry.as_ptr(), &mut gc);
        run_deleters(gc);
    }
}
