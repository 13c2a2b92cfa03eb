/*
 * Created on Sun Mar 17 2024
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

use super::{
    fs::{File, FileExt, FileRead, FileSystem, FileWrite, FileWriteExt},
    vfs::VirtualFS,
};

#[test]
fn create_write_reopen_read() {
    let mut f = File::create("fs_test_a").unwrap();
    f.fwrite_all(b"hello, ").unwrap();
    f.fwrite_all(b"journal").unwrap();
    drop(f);
    let mut f = File::open("fs_test_a").unwrap();
    assert_eq!(f.f_len().unwrap(), 14);
    let mut buf = [0u8; 14];
    f.fread_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello, journal");
    FileSystem::remove_file("fs_test_a").unwrap();
    assert!(File::open("fs_test_a").is_err());
}

#[test]
fn create_truncates_existing() {
    let mut f = File::create("fs_test_b").unwrap();
    f.fwrite_all(b"0123456789").unwrap();
    drop(f);
    let f = File::create("fs_test_b").unwrap();
    assert_eq!(f.f_len().unwrap(), 0);
    FileSystem::remove_file("fs_test_b").unwrap();
}

#[test]
fn seek_skip_and_short_reads() {
    let mut f = File::create("fs_test_c").unwrap();
    f.fwrite_all(b"abcdefghij").unwrap();
    drop(f);
    let mut f = File::open("fs_test_c").unwrap();
    f.fskip(4).unwrap();
    let mut buf = [0u8; 16];
    // short read at eof, not an error
    assert_eq!(f.fread_upto(&mut buf).unwrap(), 6);
    assert_eq!(&buf[..6], b"efghij");
    assert_eq!(f.fread_upto(&mut buf).unwrap(), 0);
    f.f_seek_start(2).unwrap();
    let mut two = [0u8; 2];
    f.fread_exact(&mut two).unwrap();
    assert_eq!(&two, b"cd");
    // positioned reads don't care where the cursor was
    f.fread_exact_at(6, &mut two).unwrap();
    assert_eq!(&two, b"gh");
    FileSystem::remove_file("fs_test_c").unwrap();
}

#[test]
fn truncate_and_extend() {
    let mut f = File::create("fs_test_d").unwrap();
    f.fwrite_all(b"0123456789").unwrap();
    f.f_truncate(4).unwrap();
    assert_eq!(f.f_len().unwrap(), 4);
    f.f_truncate(8).unwrap();
    assert_eq!(FileSystem::read("fs_test_d").unwrap(), b"0123\0\0\0\0");
    f.fsync_all().unwrap();
    FileSystem::remove_file("fs_test_d").unwrap();
}

#[test]
fn rename_and_dirs() {
    let mut f = File::create("fs_test_e").unwrap();
    f.fwrite_all(b"migrate me").unwrap();
    drop(f);
    FileSystem::rename("fs_test_e", "fs_test_e2").unwrap();
    assert!(File::open("fs_test_e").is_err());
    assert_eq!(FileSystem::read("fs_test_e2").unwrap(), b"migrate me");
    FileSystem::remove_file("fs_test_e2").unwrap();

    FileSystem::create_dir_all("fs_test_dir/x/y").unwrap();
    assert!(VirtualFS::instance().read().fs_contains_dir("fs_test_dir/x"));
    let mut f = File::create("fs_test_dir/x/y/data").unwrap();
    f.fwrite_all(b"1").unwrap();
    drop(f);
    FileSystem::remove_dir_all("fs_test_dir/x").unwrap();
    assert!(File::open("fs_test_dir/x/y/data").is_err());
}
