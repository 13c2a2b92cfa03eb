/*
 * Created on Wed Mar 06 2024
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
    This module implements the seeded 32-bit byte hash used by the filter
    and cache layers. The mixing is murmur-flavored.

    IMPORTANT: the output is part of the on-disk filter format, so the
    function must stay bit-stable across releases. Do NOT swap this for an
    ecosystem hasher.
*/

const M: u32 = 0xc6a4a793;
const R: u32 = 24;

pub fn hash32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed ^ (data.len() as u32).wrapping_mul(M);
    let mut chunks = data.chunks_exact(4);
    for w in chunks.by_ref() {
        let w = u32::from_le_bytes([w[0], w[1], w[2], w[3]]);
        h = h.wrapping_add(w);
        h = h.wrapping_mul(M);
        h ^= h >> 16;
    }
    let rem = chunks.remainder();
    // trailing 1..3 bytes
    if rem.len() == 3 {
        h = h.wrapping_add((rem[2] as u32) << 16);
    }
    if rem.len() >= 2 {
        h = h.wrapping_add((rem[1] as u32) << 8);
    }
    if !rem.is_empty() {
        h = h.wrapping_add(rem[0] as u32);
        h = h.wrapping_mul(M);
        h ^= h >> R;
    }
    h
}
