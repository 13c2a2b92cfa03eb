/*
 * Created on Wed Mar 13 2024
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

//! # Checksum utils
//!
//! CRC32C (Castagnoli) plus the masking transform applied to checksums that
//! are themselves stored on disk. The journal stores CRCs of data that may
//! embed other CRCs; masking keeps those from validating "by accident".

use {
    crc::{Crc, Digest, CRC_32_ISCSI},
    std::fmt,
};

// CRC_32_ISCSI is the Castagnoli polynomial
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);
const MASK_DELTA: u32 = 0xa282ead8;

#[derive(Clone)]
pub struct SCrc32 {
    digest: Digest<'static, u32>,
}

impl Default for SCrc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SCrc32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SCrc32")
            .field("digest", &self.digest.clone().finalize())
            .finish()
    }
}

impl SCrc32 {
    pub const fn new() -> Self {
        Self {
            digest: CRC32C.digest(),
        }
    }
    pub fn update(&mut self, b: &[u8]) {
        self.digest.update(b)
    }
    pub fn finish(self) -> u32 {
        self.digest.finalize()
    }
}

/// One-shot CRC32C of `data`
pub fn crc32c(data: &[u8]) -> u32 {
    CRC32C.checksum(data)
}

/// Mask a CRC for storage: rotate right by 15 and add a constant
pub const fn mask(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask`]
pub const fn unmask(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        // the iSCSI check value
        assert_eq!(crc32c(b"123456789"), 0xe3069283);
        // 32 zero bytes
        assert_eq!(crc32c(&[0u8; 32]), 0x8a9136aa);
        // crc("a") != crc("foo")
        assert_ne!(crc32c(b"a"), crc32c(b"foo"));
    }

    #[test]
    fn streaming_matches_oneshot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        for split in [0, 1, 10, data.len()] {
            let mut d = SCrc32::new();
            d.update(&data[..split]);
            d.update(&data[split..]);
            assert_eq!(d.finish(), crc32c(data));
        }
    }

    #[test]
    fn extend_differs_from_fresh() {
        let mut d = SCrc32::new();
        d.update(b"hello ");
        d.update(b"world");
        assert_eq!(d.finish(), crc32c(b"hello world"));
        assert_ne!(crc32c(b"world"), crc32c(b"hello world"));
    }

    #[test]
    fn mask_roundtrip() {
        for v in [0u32, 1, 0xdeadbeef, u32::MAX, crc32c(b"foo")] {
            assert_ne!(mask(v), v);
            // masking twice must not be an identity either
            assert_ne!(mask(mask(v)), v);
            assert_eq!(unmask(mask(v)), v);
            assert_eq!(unmask(unmask(mask(mask(v)))), v);
        }
    }
}
