/*
 * Created on Sun Mar 10 2024
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
    super::{Arena, RawSlice},
    crate::util::Random,
};

mod arena {
    use super::*;

    #[test]
    fn empty() {
        let a = Arena::new();
        assert_eq!(a.memory_usage(), 0);
    }

    #[test]
    fn regions_are_disjoint_and_usage_grows() {
        let arena = Arena::new();
        let mut rnd = Random::new(301);
        let mut allocated: Vec<(usize, *mut u8)> = vec![];
        let mut requested = 0usize;
        const N: usize = 2000;
        for i in 0..N {
            let mut s = if rnd.one_in(4000) {
                rnd.uniform(6000) as usize
            } else if rnd.one_in(10) {
                rnd.uniform(100) as usize
            } else {
                rnd.uniform(20) as usize
            };
            if s == 0 {
                // the arena disallows zero-sized requests
                s = 1;
            }
            let p = unsafe {
                if rnd.one_in(10) {
                    arena.alloc_aligned(s)
                } else {
                    arena.alloc(s)
                }
            };
            // stamp the region with a per-allocation pattern so any overlap
            // with a later allocation is caught below
            unsafe {
                for b in 0..s {
                    p.add(b).write((i % 256) as u8);
                }
            }
            allocated.push((s, p));
            requested += s;
            assert!(arena.memory_usage() >= requested);
            if i > N / 10 {
                assert!((arena.memory_usage() as f64) <= (requested as f64) * 1.10);
            }
        }
        for (i, (s, p)) in allocated.iter().enumerate() {
            for b in 0..*s {
                assert_eq!(unsafe { p.add(b).read() }, (i % 256) as u8);
            }
        }
    }

    #[test]
    fn aligned_is_aligned() {
        let arena = Arena::new();
        let mut rnd = Random::new(0xdeadbeef);
        for _ in 0..512 {
            // odd-sized unaligned allocs in between to knock the head around
            unsafe { arena.alloc(1 + rnd.uniform(7) as usize) };
            let p = unsafe { arena.alloc_aligned(1 + rnd.uniform(64) as usize) };
            assert_eq!(p as usize % sizeof!(*const u8).max(8), 0);
        }
    }

    #[test]
    fn large_request_gets_dedicated_block() {
        let arena = Arena::new();
        unsafe {
            let a = arena.alloc(16);
            let big = arena.alloc(4000); // > block_size / 4
            let b = arena.alloc(16);
            // the current block survived the big allocation
            assert_eq!(a.add(16), b);
            assert!(!big.is_null());
        }
    }
}

mod rawslice {
    use super::*;

    #[test]
    fn view_and_compare() {
        let backing = b"hello, skytable".to_vec();
        let full = unsafe { RawSlice::new(backing.as_ptr(), backing.len()) };
        let hello = unsafe { RawSlice::new(backing.as_ptr(), 5) };
        assert_eq!(full.as_slice(), &backing[..]);
        assert_eq!(hello.as_slice(), b"hello");
        assert!(hello < full);
        assert!(full.starts_with(hello.as_slice()));
        assert_ne!(hello, full);
    }
}
