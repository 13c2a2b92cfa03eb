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

macro_rules! sizeof {
    ($ty:ty) => {
        ::core::mem::size_of::<$ty>()
    };
    ($ty:ty, $by:literal) => {
        ::core::mem::size_of::<$ty>() * $by
    };
}

macro_rules! local {
    ($($(#[$attr:meta])* static $ident:ident: $ty:ty = $expr:expr;)*) => {
        ::std::thread_local! {
            $($(#[$attr])* static $ident: ::core::cell::RefCell<$ty> = ::core::cell::RefCell::new($expr);)*
        }
    };
}

macro_rules! local_ref {
    ($ident:ident, $call:expr) => {
        $ident.with(|slf| $call(&*slf.borrow()))
    };
}

macro_rules! local_mut {
    ($ident:ident, $call:expr) => {
        $ident.with(|slf| $call(&mut *slf.borrow_mut()))
    };
}
