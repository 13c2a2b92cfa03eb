/*
 * Created on Sat Mar 09 2024
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
    super::unsafe_apis,
    crate::sync::ORD_RLX,
    core::{cell::UnsafeCell, sync::atomic::AtomicUsize},
    std::alloc::Layout,
};

pub const ARENA_BLOCK_SIZE: usize = 4096;
/// Requests above this get their own block so the current block's tail
/// isn't wasted on them
const ARENA_INLINE_MAX: usize = ARENA_BLOCK_SIZE / 4;
const ARENA_ALIGN: usize = if sizeof!(*const u8) > 8 {
    sizeof!(*const u8)
} else {
    8
};

const _: () = assert!(ARENA_ALIGN & (ARENA_ALIGN - 1) == 0);

/// A monotonic bump allocator. Memory is carved out of owned blocks and is
/// never returned individually; every allocation lives until the arena
/// itself is dropped, which is what lets readers of arena-backed structures
/// hold raw pointers without reclamation protocols.
///
/// The mutating calls are `unsafe fn`s: the contract is a single mutator at
/// any point in time (callers serialize writers externally, exactly like
/// the structures built on top). [`Self::memory_usage`] may be called from
/// any thread at any time.
pub struct Arena {
    state: UnsafeCell<ArenaState>,
    usage: AtomicUsize,
}

struct ArenaState {
    head: *mut u8,
    remaining: usize,
    blocks: Vec<(*mut u8, Layout)>,
}

// UNSAFE(@ohsayan): the only mutation paths are the unsafe alloc calls whose contract demands a single
// mutator; usage is atomic. readers never touch `state`
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub const fn new() -> Self {
        Self {
            state: UnsafeCell::new(ArenaState {
                head: core::ptr::null_mut(),
                remaining: 0,
                blocks: Vec::new(),
            }),
            usage: AtomicUsize::new(0),
        }
    }
    /// Allocate `size` bytes (no alignment promise beyond 1).
    ///
    /// ## Safety
    /// Only one thread may be inside `alloc`/`alloc_aligned` at a time
    pub unsafe fn alloc(&self, size: usize) -> *mut u8 {
        debug_assert!(size > 0, "zero-sized arena request");
        let state = &mut *self.state.get();
        if size <= state.remaining {
            let p = state.head;
            state.head = state.head.add(size);
            state.remaining -= size;
            p
        } else {
            self.alloc_fallback(state, size)
        }
    }
    /// Allocate `size` bytes aligned for pointer-sized loads and stores.
    ///
    /// ## Safety
    /// Only one thread may be inside `alloc`/`alloc_aligned` at a time
    pub unsafe fn alloc_aligned(&self, size: usize) -> *mut u8 {
        let state = &mut *self.state.get();
        let misalign = state.head as usize & (ARENA_ALIGN - 1);
        let slop = if misalign == 0 {
            0
        } else {
            ARENA_ALIGN - misalign
        };
        let needed = size + slop;
        if needed <= state.remaining {
            let p = state.head.add(slop);
            state.head = state.head.add(needed);
            state.remaining -= needed;
            p
        } else {
            // fresh blocks come from the allocator already aligned
            self.alloc_fallback(state, size)
        }
    }
    unsafe fn alloc_fallback(&self, state: &mut ArenaState, size: usize) -> *mut u8 {
        if size > ARENA_INLINE_MAX {
            // dedicated block; the current block keeps serving small requests
            return self.alloc_block(state, size);
        }
        let p = self.alloc_block(state, ARENA_BLOCK_SIZE);
        state.head = p.add(size);
        state.remaining = ARENA_BLOCK_SIZE - size;
        p
    }
    unsafe fn alloc_block(&self, state: &mut ArenaState, len: usize) -> *mut u8 {
        let layout = Layout::from_size_align(len, ARENA_ALIGN).unwrap();
        let p = unsafe_apis::alloc_layout::<u8>(layout);
        state.blocks.push((p, layout));
        // block storage plus the bookkeeping pointer
        self.usage.fetch_add(len + sizeof!(usize), ORD_RLX);
        p
    }
    /// A relaxed approximation of the total memory held by the arena
    pub fn memory_usage(&self) -> usize {
        self.usage.load(ORD_RLX)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (p, layout) in state.blocks.drain(..) {
            unsafe {
                // UNSAFE(@ohsayan): allocated by us in alloc_block with this exact layout
                unsafe_apis::dealloc_layout(p, layout)
            }
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
