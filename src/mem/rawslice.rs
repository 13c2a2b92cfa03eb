/*
 * Created on Fri Mar 08 2024
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

use core::{fmt, hash::Hash, hash::Hasher, ops::Deref, slice};

/// A non-owning `(ptr, len)` view over a run of `T`s. The arena and the
/// structures on top of it (skip index nodes, memtable entries) hand these
/// out for storage they own; the view is only valid while that storage is
/// alive, which is why construction is unsafe
pub struct RawSlice<T> {
    p: *const T,
    l: usize,
}

unsafe impl<T: Send> Send for RawSlice<T> {}
unsafe impl<T: Sync> Sync for RawSlice<T> {}

impl<T> RawSlice<T> {
    #[inline(always)]
    pub unsafe fn new(p: *const T, l: usize) -> Self {
        Self { p, l }
    }
    pub fn as_slice(&self) -> &[T] {
        unsafe {
            // UNSAFE(@ohsayan): the caller of new() guaranteed that the backing storage outlives this view
            slice::from_raw_parts(self.p, self.l)
        }
    }
    /// Decay into a plain slice with the caller's choice of lifetime.
    ///
    /// ## Safety
    /// The backing storage must outlive `'a`
    pub unsafe fn into_slice<'a>(self) -> &'a [T] {
        slice::from_raw_parts(self.p, self.l)
    }
    pub unsafe fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<T: Hash> Hash for RawSlice<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl<T: PartialEq> PartialEq for RawSlice<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq> Eq for RawSlice<T> {}

impl<T: PartialOrd> PartialOrd for RawSlice<T> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord> Ord for RawSlice<T> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: fmt::Debug> fmt::Debug for RawSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T> Deref for RawSlice<T> {
    type Target = [T];
    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}
