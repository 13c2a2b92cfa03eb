/*
 * Created on Thu Apr 11 2024
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

use {super::FilterPolicy, crate::hash::hash32};

/*
    bloom filter
    ---
    Layout: bit array bytes, then one byte holding k (the probe count).
    Probing uses double hashing: one 32-bit hash, a rotate for the delta,
    k strides. All of it is on-disk format; the hash and the layout are
    frozen (see the name string).
*/

const BLOOM_SEED: u32 = 0xbc9f1d34;

fn bloom_hash(key: &[u8]) -> u32 {
    hash32(key, BLOOM_SEED)
}

pub struct BloomPolicy {
    bits_per_key: usize,
    k: usize,
}

impl BloomPolicy {
    pub fn new(bits_per_key: usize) -> Self {
        // the optimal probe count for m/n bits per key is (m/n) ln 2,
        // rounded and clamped to something sane
        let k = (bits_per_key as f64 * core::f64::consts::LN_2).round() as usize;
        Self {
            bits_per_key,
            k: k.clamp(1, 30),
        }
    }
}

impl FilterPolicy for BloomPolicy {
    fn name(&self) -> &'static str {
        "leveldb.BuiltinBloomFilter2"
    }
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        // tiny sets would get a uselessly dense array; 64 bits minimum
        let mut bits = (keys.len() * self.bits_per_key).max(64);
        let bytes = (bits + 7) / 8;
        bits = bytes * 8;

        let init_size = dst.len();
        dst.resize(init_size + bytes, 0);
        dst.push(self.k as u8);
        let array = &mut dst[init_size..init_size + bytes];
        for key in keys {
            let mut h = bloom_hash(key);
            let delta = h.rotate_right(17);
            for _ in 0..self.k {
                let bitpos = (h % bits as u32) as usize;
                array[bitpos / 8] |= 1 << (bitpos % 8);
                h = h.wrapping_add(delta);
            }
        }
    }
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        let len = filter.len();
        if len < 2 {
            return false;
        }
        let (array, k) = filter.split_at(len - 1);
        let bits = array.len() * 8;
        let k = k[0] as usize;
        if k > 30 {
            // reserved for future encodings; claim a match to stay safe
            return true;
        }
        let mut h = bloom_hash(key);
        let delta = h.rotate_right(17);
        for _ in 0..k {
            let bitpos = (h % bits as u32) as usize;
            if array[bitpos / 8] & (1 << (bitpos % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }
        true
    }
}
