/*
 * Created on Fri Apr 05 2024
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
    single-shard lru
    ---
    For the ordered eviction impl we resort to intrusive raw-pointer lists,
    because an entry lives in two structures at once (a hash chain and one
    of two rings) while also being pinned by callers. NOTHING in this file
    is exported beyond the cache module; misuse of a dangling entry pointer
    will segfault, so every pointer that leaves a method is accounted for
    by the refcount protocol below.

    Entry state machine:
      refs >= 1, in_cache        -> reachable via the table
      refs == 1, in_cache        -> on the `lru` ring (evictable)
      refs >= 2, in_cache        -> on the `in_use` ring (pinned)
      refs >= 1, !in_cache       -> erased but still pinned; on no ring
      refs == 0                  -> freed (deleter runs exactly here)

    `finish_erase` is the ONLY transition from in_cache to !in_cache and
    the only place charge is subtracted.
*/

use {
    crate::mem::unsafe_apis,
    core::ptr,
    std::alloc::Layout,
};

/// Runs when an entry is destroyed: after the last unpin, or at cache drop
pub type DeleterFn<V> = Box<dyn FnOnce(&[u8], V) + Send>;

pub(super) struct LruEntry<V> {
    key: Box<[u8]>,
    hash: u32,
    value: V,
    charge: usize,
    deleter: Option<DeleterFn<V>>,
    next_hash: *mut LruEntry<V>,
    next: *mut LruEntry<V>,
    prev: *mut LruEntry<V>,
    refs: u32,
    in_cache: bool,
}

impl<V> LruEntry<V> {
    const LAYOUT: Layout = Layout::new::<Self>();
    pub(super) fn value_ref(&self) -> &V {
        &self.value
    }
    pub(super) fn hash_code(&self) -> u32 {
        self.hash
    }
    /// Unhook from whichever ring the entry is on
    #[inline(always)]
    unsafe fn ring_remove(e: *mut Self) {
        (*(*e).prev).next = (*e).next;
        (*(*e).next).prev = (*e).prev;
    }
    /// Hook in as the newest element of the ring headed by `list`
    /// (the oldest element is `(*list).next`)
    #[inline(always)]
    unsafe fn ring_append(list: *mut Self, e: *mut Self) {
        (*e).next = list;
        (*e).prev = (*list).prev;
        (*(*e).prev).next = e;
        (*(*e).next).prev = e;
    }
    /// A ring head: only `next`/`prev` are initialized, the payload fields
    /// are garbage and must never be read or dropped
    unsafe fn alloc_sentinel() -> *mut Self {
        let p = unsafe_apis::alloc_layout::<Self>(Self::LAYOUT);
        ptr::addr_of_mut!((*p).next).write(p);
        ptr::addr_of_mut!((*p).prev).write(p);
        p
    }
}

/// Destroy an entry whose refcount reached zero. The deleter (if any) gets
/// the key and the owned value
pub(super) unsafe fn free_entry<V>(e: *mut LruEntry<V>) {
    debug_assert!((*e).refs == 0 && !(*e).in_cache);
    let entry = *Box::from_raw(e);
    let LruEntry {
        key, value, deleter, ..
    } = entry;
    if let Some(deleter) = deleter {
        deleter(&key, value)
    }
}

/*
    hash table
    ---
    open addressing into chains linked through `next_hash`. It does not own
    the entries; the refcount protocol does.
*/

pub(super) struct HandleTable<V> {
    length: usize,
    elems: usize,
    list: Vec<*mut LruEntry<V>>,
}

impl<V> HandleTable<V> {
    const INIT_BUCKETS: usize = 4;
    fn new() -> Self {
        Self {
            length: Self::INIT_BUCKETS,
            elems: 0,
            list: vec![ptr::null_mut(); Self::INIT_BUCKETS],
        }
    }
    fn lookup(&mut self, key: &[u8], hash: u32) -> *mut LruEntry<V> {
        unsafe { *self.find_pointer(key, hash) }
    }
    /// Install `e`; if an entry with the same (hash, key) existed, it is
    /// unhooked from the chain and returned for the caller to finish-erase
    fn insert(&mut self, e: *mut LruEntry<V>) -> *mut LruEntry<V> {
        unsafe {
            let slot = self.find_pointer(&(*e).key, (*e).hash);
            let old = *slot;
            (*e).next_hash = if old.is_null() {
                ptr::null_mut()
            } else {
                (*old).next_hash
            };
            *slot = e;
            if old.is_null() {
                self.elems += 1;
                if self.elems > self.length {
                    // chains average <= 1 entry; double before they grow
                    self.resize();
                }
            }
            old
        }
    }
    fn remove(&mut self, key: &[u8], hash: u32) -> *mut LruEntry<V> {
        unsafe {
            let slot = self.find_pointer(key, hash);
            let e = *slot;
            if !e.is_null() {
                *slot = (*e).next_hash;
                self.elems -= 1;
            }
            e
        }
    }
    /// The slot holding the matching entry, or the trailing null slot of
    /// the chain if absent
    fn find_pointer(&mut self, key: &[u8], hash: u32) -> *mut *mut LruEntry<V> {
        unsafe {
            // UNSAFE(@ohsayan): length is always a nonzero power of two; chain pointers are
            // maintained under the shard lock
            let mut slot = self
                .list
                .as_mut_ptr()
                .add(hash as usize & (self.length - 1));
            while !(*slot).is_null() && ((**slot).hash != hash || &(&(**slot).key)[..] != key) {
                slot = ptr::addr_of_mut!((**slot).next_hash);
            }
            slot
        }
    }
    fn resize(&mut self) {
        let mut new_length = Self::INIT_BUCKETS;
        while new_length < self.elems {
            new_length *= 2;
        }
        let mut new_list = vec![ptr::null_mut::<LruEntry<V>>(); new_length];
        let mut moved = 0;
        for &head in &self.list {
            let mut e = head;
            while !e.is_null() {
                unsafe {
                    let next = (*e).next_hash;
                    let slot = new_list
                        .as_mut_ptr()
                        .add((*e).hash as usize & (new_length - 1));
                    (*e).next_hash = *slot;
                    *slot = e;
                    e = next;
                }
                moved += 1;
            }
        }
        debug_assert_eq!(moved, self.elems);
        self.length = new_length;
        self.list = new_list;
    }
}

/*
    lru shard
*/

pub(super) struct LruCache<V> {
    capacity: usize,
    usage: usize,
    /// ring of in_cache entries with refs == 1, oldest at `(*lru).next`
    lru: *mut LruEntry<V>,
    /// ring of in_cache entries pinned by callers (refs >= 2)
    in_use: *mut LruEntry<V>,
    table: HandleTable<V>,
}

/// Entries whose refcount hit zero under the shard lock; the caller frees
/// them (running deleters) after unlocking
pub(super) type Garbage<V> = Vec<*mut LruEntry<V>>;

impl<V> LruCache<V> {
    pub(super) fn new(capacity: usize) -> Self {
        unsafe {
            // UNSAFE(@ohsayan): sentinel payloads are never read
            Self {
                capacity,
                usage: 0,
                lru: LruEntry::alloc_sentinel(),
                in_use: LruEntry::alloc_sentinel(),
                table: HandleTable::new(),
            }
        }
    }

    fn ref_entry(&mut self, e: *mut LruEntry<V>) {
        unsafe {
            if (*e).refs == 1 && (*e).in_cache {
                // leaving the evictable ring
                LruEntry::ring_remove(e);
                LruEntry::ring_append(self.in_use, e);
            }
            (*e).refs += 1;
        }
    }

    fn unref(&mut self, e: *mut LruEntry<V>, gc: &mut Garbage<V>) {
        unsafe {
            debug_assert!((*e).refs > 0);
            (*e).refs -= 1;
            if (*e).refs == 0 {
                gc.push(e);
            } else if (*e).in_cache && (*e).refs == 1 {
                // no outside pins left: back to the evictable ring
                LruEntry::ring_remove(e);
                LruEntry::ring_append(self.lru, e);
            }
        }
    }

    /// Detach `e` from the cache: off its ring, uncharged, unreffed. The
    /// single in_cache -> !in_cache transition
    fn finish_erase(&mut self, e: *mut LruEntry<V>, gc: &mut Garbage<V>) -> bool {
        if e.is_null() {
            return false;
        }
        unsafe {
            debug_assert!((*e).in_cache);
            LruEntry::ring_remove(e);
            (*e).in_cache = false;
            self.usage -= (*e).charge;
        }
        self.unref(e, gc);
        true
    }

    /// Always succeeds; returns the new entry pre-pinned for the caller
    /// (refs includes the caller's reference)
    pub(super) fn insert(
        &mut self,
        key: &[u8],
        hash: u32,
        value: V,
        charge: usize,
        deleter: Option<DeleterFn<V>>,
        gc: &mut Garbage<V>,
    ) -> *mut LruEntry<V> {
        let e = Box::into_raw(Box::new(LruEntry {
            key: key.into(),
            hash,
            value,
            charge,
            deleter,
            next_hash: ptr::null_mut(),
            next: ptr::null_mut(),
            prev: ptr::null_mut(),
            refs: 1, // the caller's handle
            in_cache: false,
        }));
        if self.capacity > 0 {
            unsafe {
                (*e).refs += 1; // the cache's own reference
                (*e).in_cache = true;
                LruEntry::ring_append(self.in_use, e);
                self.usage += charge;
            }
            let displaced = self.table.insert(e);
            self.finish_erase(displaced, gc);
        }
        // capacity == 0 means caching is off: the entry only lives as long
        // as the caller's handle
        while self.usage > self.capacity && !self.lru_is_empty() {
            unsafe {
                let old = (*self.lru).next;
                debug_assert!((*old).refs == 1);
                let removed = self.table.remove(&(*old).key, (*old).hash);
                debug_assert_eq!(removed, old);
                self.finish_erase(removed, gc);
            }
        }
        e
    }

    pub(super) fn lookup(&mut self, key: &[u8], hash: u32) -> *mut LruEntry<V> {
        let e = self.table.lookup(key, hash);
        if !e.is_null() {
            self.ref_entry(e);
        }
        e
    }

    /// Drop one caller pin
    pub(super) fn release(&mut self, e: *mut LruEntry<V>, gc: &mut Garbage<V>) {
        self.unref(e, gc)
    }

    pub(super) fn erase(&mut self, key: &[u8], hash: u32, gc: &mut Garbage<V>) {
        let e = self.table.remove(key, hash);
        self.finish_erase(e, gc);
    }

    /// Evict everything not currently pinned
    pub(super) fn prune(&mut self, gc: &mut Garbage<V>) {
        while !self.lru_is_empty() {
            unsafe {
                let e = (*self.lru).next;
                debug_assert!((*e).refs == 1);
                let removed = self.table.remove(&(*e).key, (*e).hash);
                debug_assert_eq!(removed, e);
                self.finish_erase(removed, gc);
            }
        }
    }

    pub(super) fn total_charge(&self) -> usize {
        self.usage
    }

    #[inline(always)]
    fn lru_is_empty(&self) -> bool {
        unsafe { (*self.lru).next == self.lru }
    }
}

impl<V> Drop for LruCache<V> {
    fn drop(&mut self) {
        unsafe {
            // handles borrow the cache, so the borrow checker has already
            // guaranteed the pinned ring is empty here
            debug_assert!((*self.in_use).next == self.in_use, "dropping pinned cache");
            let mut e = (*self.lru).next;
            while e != self.lru {
                let next = (*e).next;
                debug_assert!((*e).in_cache && (*e).refs == 1);
                (*e).in_cache = false;
                (*e).refs = 0;
                free_entry(e);
                e = next;
            }
            // the sentinels were never fully initialized: deallocate without
            // running any destructor
            unsafe_apis::dealloc_layout(self.lru as *mut u8, LruEntry::<V>::LAYOUT);
            unsafe_apis::dealloc_layout(self.in_use as *mut u8, LruEntry::<V>::LAYOUT);
        }
    }
}
