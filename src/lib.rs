/*
 * Created on Mon Mar 04 2024
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
    skylsm: the embedded log-structured storage core. This crate carries the
    in-memory and durability primitives that an ordered key-value engine is
    built from: the arena and the concurrent skip index on top of it, the
    versioned memtable, the block-framed write-ahead journal, the sharded
    block cache and the filter policies. Everything above this layer
    (compaction, table files, recovery) composes these parts; nothing here
    reaches back up.
*/

#[macro_use]
mod macros;
mod hash;
mod sync;
mod util;

pub mod cache;
pub mod error;
pub mod filter;
pub mod idx;
pub mod mem;
pub mod mtable;
pub mod storage;

pub use error::{Error, ErrorKind, RuntimeResult};

/// Result alias for operations that can only fail at the I/O boundary
pub type IoResult<T> = Result<T, std::io::Error>;
