/*
 * Created on Fri Mar 29 2024
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
    super::key::{
        append_internal_key, extract_tag, extract_user_key, ParsedInternalKey,
        MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK,
    },
    core::cmp::Ordering,
};

/// A total order over user keys, plus the two key-shortening hooks the
/// table layer uses to build small index blocks. Implementations must be
/// stateless orders: two comparators with the same name must agree forever,
/// since the name is persisted
pub trait Comparator: Send + Sync {
    /// A persistent identifier for this ordering
    fn name(&self) -> &'static str;
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
    /// Shorten `start` to some key in `[start, limit)` if a shorter one
    /// exists. Pure optimization: doing nothing is always correct
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);
    /// Bump `key` to a short key `>= key`. Same correctness rule
    fn find_short_successor(&self, key: &mut Vec<u8>);
}

#[derive(Debug, Clone, Copy, Default)]
/// Plain lexicographic byte ordering
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "leveldb.BytewiseComparator"
    }
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        // find the length of the common prefix
        let min_length = start.len().min(limit.len());
        let mut diff_index = 0;
        while diff_index < min_length && start[diff_index] == limit[diff_index] {
            diff_index += 1;
        }
        if diff_index >= min_length {
            // one is a prefix of the other; no separator is shorter
            return;
        }
        let diff_byte = start[diff_index];
        if diff_byte < 0xff && diff_byte + 1 < limit[diff_index] {
            start[diff_index] += 1;
            start.truncate(diff_index + 1);
            debug_assert_eq!(self.compare(start, limit), Ordering::Less);
        }
    }
    fn find_short_successor(&self, key: &mut Vec<u8>) {
        // bump the first byte that can be bumped, drop the rest
        for i in 0..key.len() {
            if key[i] != 0xff {
                key[i] += 1;
                key.truncate(i + 1);
                return;
            }
        }
        // all 0xff: leave as-is
    }
}

#[derive(Debug, Clone, Default)]
/// Orders internal keys by user key (via the wrapped comparator) ascending,
/// then by tag descending, which puts newer entries first within one user
/// key
pub struct InternalKeyComparator<C = BytewiseComparator> {
    user: C,
}

impl<C: Comparator> InternalKeyComparator<C> {
    pub fn new(user: C) -> Self {
        Self { user }
    }
    pub fn user_comparator(&self) -> &C {
        &self.user
    }
}

impl<C: Comparator> Comparator for InternalKeyComparator<C> {
    fn name(&self) -> &'static str {
        "leveldb.InternalKeyComparator"
    }
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self
            .user
            .compare(extract_user_key(a), extract_user_key(b))
        {
            Ordering::Equal => {
                // descending on the tag
                extract_tag(b).cmp(&extract_tag(a))
            }
            ord => ord,
        }
    }
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let user_start = extract_user_key(start);
        let user_limit = extract_user_key(limit);
        let mut tmp = user_start.to_vec();
        self.user.find_shortest_separator(&mut tmp, user_limit);
        if tmp.len() < user_start.len() && self.user.compare(user_start, &tmp) == Ordering::Less {
            // the user key grew logically but shrank physically; tack on the
            // sentinel tag so it still sorts before every real entry with
            // the same user key
            append_internal_key(
                &mut tmp,
                &ParsedInternalKey::new(&[], MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK),
            );
            debug_assert_eq!(self.compare(start, &tmp), Ordering::Less);
            debug_assert_eq!(self.compare(&tmp, limit), Ordering::Less);
            *start = tmp;
        }
    }
    fn find_short_successor(&self, key: &mut Vec<u8>) {
        let user_key = extract_user_key(key);
        let mut tmp = user_key.to_vec();
        self.user.find_short_successor(&mut tmp);
        if tmp.len() < user_key.len() && self.user.compare(user_key, &tmp) == Ordering::Less {
            append_internal_key(
                &mut tmp,
                &ParsedInternalKey::new(&[], MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK),
            );
            debug_assert_eq!(self.compare(key, &tmp), Ordering::Less);
            *key = tmp;
        }
    }
}
