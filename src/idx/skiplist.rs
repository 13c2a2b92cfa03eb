/*
 * Created on Mon Mar 25 2024
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
    concurrent skip index
    ---
    An ordered set over copyable keys with ONE writer and any number of
    lock-free readers. Writers are serialized externally (the memtable's
    write path does this); readers only need the list to outlive them.

    Safety story, in short:
    (1) nodes are carved out of the arena and never freed or moved until
        the whole list goes away, so a reader can never chase a dangling
        pointer;
    (2) a node's payload and its forward pointers are fully initialized
        (plain/relaxed stores) before the predecessor's release store makes
        it reachable, and readers load forward pointers with acquire, so a
        reachable node is always a fully built node;
    (3) max_height is read/written relaxed: a reader that sees the bumped
        height before the linking store just finds null at the new levels
        (null sorts as +infinity) and descends normally.
*/

use {
    crate::{
        mem::Arena,
        sync::{ORD_ACQ, ORD_REL, ORD_RLX},
        util::Random,
    },
    core::{
        cell::UnsafeCell,
        cmp::Ordering,
        ptr,
        sync::atomic::{AtomicPtr, AtomicUsize},
    },
    std::sync::Arc,
};

pub const SKIP_INDEX_MAX_HEIGHT: usize = 12;
const BRANCHING: u32 = 4;

/// Three-way ordering over the index's key type. Implementations must be
/// total orders and cheap: the hot search loop calls this per hop
pub trait KeyComparator<K> {
    fn compare_keys(&self, a: &K, b: &K) -> Ordering;
}

#[repr(C)]
struct Node<K> {
    key: K,
    // variable length in practice: a node of height h is allocated with
    // room for h slots, of which this declares only the first
    next: [AtomicPtr<Node<K>>; 1],
}

impl<K> Node<K> {
    #[inline(always)]
    fn slot(&self, level: usize) -> &AtomicPtr<Node<K>> {
        unsafe {
            // UNSAFE(@ohsayan): in-bounds by the allocation contract: the node was allocated with
            // `height` slots and callers never pass a level at or above it
            &*self.next.as_ptr().add(level)
        }
    }
    /// Load with acquire so everything published before the slot was
    /// stored is visible
    #[inline(always)]
    fn next(&self, level: usize) -> *mut Node<K> {
        self.slot(level).load(ORD_ACQ)
    }
    /// Store with release, publishing the pointee
    #[inline(always)]
    fn set_next(&self, level: usize, node: *mut Node<K>) {
        self.slot(level).store(node, ORD_REL)
    }
    /// Relaxed variants for locations no reader can observe yet
    #[inline(always)]
    fn nobarrier_next(&self, level: usize) -> *mut Node<K> {
        self.slot(level).load(ORD_RLX)
    }
    #[inline(always)]
    fn nobarrier_set_next(&self, level: usize, node: *mut Node<K>) {
        self.slot(level).store(node, ORD_RLX)
    }
}

pub struct SkipList<K, C> {
    cmp: C,
    arena: Arc<Arena>,
    head: *mut Node<K>,
    max_height: AtomicUsize,
    // only the (externally serialized) writer rolls the dice
    rnd: UnsafeCell<Random>,
}

// UNSAFE(@ohsayan): raw node pointers all target arena memory owned by `arena`, which lives exactly
// as long as the list; mutation is funneled through insert() whose contract is a single writer
unsafe impl<K: Send, C: Send> Send for SkipList<K, C> {}
unsafe impl<K: Send, C: Send + Sync> Sync for SkipList<K, C> {}

impl<K: Copy, C: KeyComparator<K>> SkipList<K, C> {
    pub fn new(cmp: C, arena: Arc<Arena>) -> Self {
        debug_assert!(core::mem::align_of::<Node<K>>() <= sizeof!(*const u8).max(8));
        let mut list = Self {
            cmp,
            arena,
            head: ptr::null_mut(),
            max_height: AtomicUsize::new(1),
            rnd: UnsafeCell::new(Random::new(0xdeadbeef)),
        };
        // the head's key is never compared; only its forward pointers matter
        list.head = unsafe { list.new_node(core::mem::zeroed(), SKIP_INDEX_MAX_HEIGHT) };
        list
    }

    /// Insert `key`. The key must not already be present.
    ///
    /// Callers MUST serialize writers externally; any number of concurrent
    /// readers is fine
    pub fn insert(&self, key: K) {
        let mut prev = [ptr::null_mut(); SKIP_INDEX_MAX_HEIGHT];
        let x = self.find_greater_or_equal(&key, Some(&mut prev));
        debug_assert!(
            x.is_null() || self.cmp.compare_keys(unsafe { &(*x).key }, &key) != Ordering::Equal,
            "duplicate key insert"
        );
        let height = self.random_height();
        if height > self.height() {
            for p in prev.iter_mut().take(height).skip(self.height()) {
                *p = self.head;
            }
            // relaxed is enough: a reader observing the new height before
            // the node is linked sees null at those levels and treats it
            // as past-the-end
            self.max_height.store(height, ORD_RLX);
        }
        let x = unsafe { self.new_node(key, height) };
        for (level, &pred) in prev.iter().enumerate().take(height) {
            unsafe {
                // UNSAFE(@ohsayan): pred is either head or a node found by the descent; both are
                // valid for the lifetime of the list. The relaxed store on the new node is fine
                // since it's unreachable until pred's release store below
                (*x).nobarrier_set_next(level, (*pred).nobarrier_next(level));
                (*pred).set_next(level, x);
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        let x = self.find_greater_or_equal(key, None);
        !x.is_null() && self.cmp.compare_keys(unsafe { &(*x).key }, key) == Ordering::Equal
    }

    pub fn iter(&self) -> SkipListIter<'_, K, C> {
        SkipListIter {
            list: self,
            node: ptr::null(),
        }
    }

    #[inline(always)]
    fn height(&self) -> usize {
        self.max_height.load(ORD_RLX)
    }

    fn random_height(&self) -> usize {
        let rnd = unsafe {
            // UNSAFE(@ohsayan): only the single writer enters here, per insert()'s contract
            &mut *self.rnd.get()
        };
        let mut height = 1;
        while height < SKIP_INDEX_MAX_HEIGHT && rnd.one_in(BRANCHING) {
            height += 1;
        }
        height
    }

    unsafe fn new_node(&self, key: K, height: usize) -> *mut Node<K> {
        debug_assert!((1..=SKIP_INDEX_MAX_HEIGHT).contains(&height));
        let size = sizeof!(Node<K>) + sizeof!(AtomicPtr<Node<K>>) * (height - 1);
        let node = self.arena.alloc_aligned(size) as *mut Node<K>;
        ptr::addr_of_mut!((*node).key).write(key);
        for level in 0..height {
            ptr::addr_of_mut!((*node).next)
                .cast::<AtomicPtr<Node<K>>>()
                .add(level)
                .write(AtomicPtr::new(ptr::null_mut()));
        }
        node
    }

    #[inline(always)]
    fn key_is_after_node(&self, key: &K, n: *mut Node<K>) -> bool {
        !n.is_null() && self.cmp.compare_keys(unsafe { &(*n).key }, key) == Ordering::Less
    }

    /// First node at or past `key`. When `prev` is given, it records the
    /// rightmost node before `key` at every level (the splice points)
    fn find_greater_or_equal(
        &self,
        key: &K,
        mut prev: Option<&mut [*mut Node<K>; SKIP_INDEX_MAX_HEIGHT]>,
    ) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(p) = prev.as_mut() {
                    p[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    /// Last node strictly before `key` (head if none)
    fn find_less_than(&self, key: &K) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if !next.is_null()
                && self.cmp.compare_keys(unsafe { &(*next).key }, key) == Ordering::Less
            {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }

    /// Last node in the list (head if empty)
    fn find_last(&self) -> *mut Node<K> {
        let mut x = self.head;
        let mut level = self.height() - 1;
        loop {
            let next = unsafe { (*x).next(level) };
            if !next.is_null() {
                x = next;
            } else if level == 0 {
                return x;
            } else {
                level -= 1;
            }
        }
    }
}

/// A cursor over the index. Reads are lock-free; the iterator observes a
/// monotonically growing prefix of the writer's inserts
pub struct SkipListIter<'a, K, C> {
    list: &'a SkipList<K, C>,
    node: *const Node<K>,
}

impl<'a, K: Copy, C: KeyComparator<K>> SkipListIter<'a, K, C> {
    #[inline(always)]
    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }
    /// The key at the current position. Requires `valid()`
    pub fn key(&self) -> &K {
        debug_assert!(self.valid());
        unsafe {
            // UNSAFE(@ohsayan): valid() implies node points into live arena memory
            &(*self.node).key
        }
    }
    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.node = unsafe { (*self.node).next(0) };
    }
    /// Step back. Implemented as a fresh descent: nodes carry no back
    /// pointers
    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        let node = self.list.find_less_than(unsafe { &(*self.node).key });
        self.node = if node == self.list.head {
            ptr::null()
        } else {
            node
        };
    }
    pub fn seek(&mut self, target: &K) {
        self.node = self.list.find_greater_or_equal(target, None);
    }
    pub fn seek_to_first(&mut self) {
        self.node = unsafe { (*self.list.head).next(0) };
    }
    pub fn seek_to_last(&mut self) {
        let node = self.list.find_last();
        self.node = if node == self.list.head {
            ptr::null()
        } else {
            node
        };
    }
}
