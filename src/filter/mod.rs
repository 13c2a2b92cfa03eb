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

mod bloom;

pub use bloom::BloomPolicy;

use crate::mtable::extract_user_key;

/// A filter summarizes a set of keys into a small byte string that can
/// answer "might this key be in the set?" with no false negatives. The name
/// is persisted next to the filter data, so changing an implementation
/// incompatibly REQUIRES a new name
pub trait FilterPolicy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Append a filter summarizing `keys` to `dst`
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>);
    /// May return false only if `key` was not in the filtered set
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// Adapts a user-key policy to internal keys by stripping the 8-byte tag
/// before hashing. Table files store internal keys, but filters must match
/// on user keys alone
pub struct InternalFilterPolicy<P> {
    user: P,
}

impl<P: FilterPolicy> InternalFilterPolicy<P> {
    pub fn new(user: P) -> Self {
        Self { user }
    }
}

impl<P: FilterPolicy> FilterPolicy for InternalFilterPolicy<P> {
    fn name(&self) -> &'static str {
        self.user.name()
    }
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        let user_keys: Vec<&[u8]> = keys.iter().map(|k| extract_user_key(k)).collect();
        self.user.create_filter(&user_keys, dst)
    }
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        self.user.key_may_match(extract_user_key(key), filter)
    }
}
