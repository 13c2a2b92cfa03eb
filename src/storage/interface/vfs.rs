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

/*
    virtual fs impl
    ---
    a flat in-memory file system, keyed by full path. just enough surface
    for the storage tests to run without touching the real disk. tests
    share one global instance, so use distinct path prefixes per test.
*/

use {
    crate::{util::os::SysIOError, IoResult},
    parking_lot::RwLock,
    std::{
        collections::{HashMap, HashSet},
        io::ErrorKind,
        sync::OnceLock,
    },
};

pub struct VirtualFS {
    files: HashMap<Box<str>, VFile>,
    dirs: HashSet<Box<str>>,
}

#[derive(Debug)]
pub struct VFile {
    data: Vec<u8>,
    pos: usize,
}

#[derive(Debug)]
/// A handle to a file in the virtual fs. Holds the path; every operation
/// resolves through the global instance
pub struct VFileDescriptor(Box<str>);

impl VFile {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            pos: 0,
        }
    }
    pub fn fwrite(&mut self, buf: &[u8]) -> IoResult<u64> {
        if self.pos > self.data.len() {
            // writing past a hole zero-fills it, like a sparse file
            self.data.resize(self.pos, 0);
        }
        let overlap = (self.data.len() - self.pos).min(buf.len());
        self.data[self.pos..self.pos + overlap].copy_from_slice(&buf[..overlap]);
        self.data.extend_from_slice(&buf[overlap..]);
        self.pos += buf.len();
        Ok(buf.len() as u64)
    }
    pub fn fread_exact(&mut self, buf: &mut [u8]) -> IoResult<()> {
        if self.data.len().saturating_sub(self.pos) < buf.len() {
            return Err(SysIOError::from(ErrorKind::UnexpectedEof).into_inner());
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }
    pub fn fread_upto(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let avail = self.data.len().saturating_sub(self.pos).min(buf.len());
        buf[..avail].copy_from_slice(&self.data[self.pos..self.pos + avail]);
        self.pos += avail;
        Ok(avail)
    }
    pub fn fskip(&mut self, n: u64) -> IoResult<()> {
        self.pos = self.pos.saturating_add(n as usize);
        Ok(())
    }
    pub fn truncate(&mut self, new_size: u64) -> IoResult<()> {
        let new_size = new_size as usize;
        if new_size < self.data.len() {
            self.data.truncate(new_size);
        } else {
            self.data.resize(new_size, 0);
        }
        Ok(())
    }
    pub fn length(&self) -> u64 {
        self.data.len() as u64
    }
    pub fn cursor(&self) -> u64 {
        self.pos as u64
    }
    pub fn seek_from_start(&mut self, offset: u64) -> IoResult<()> {
        self.pos = offset as usize;
        Ok(())
    }
}

impl VirtualFS {
    pub fn instance() -> &'static RwLock<VirtualFS> {
        static INSTANCE: OnceLock<RwLock<VirtualFS>> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            RwLock::new(VirtualFS {
                files: HashMap::new(),
                dirs: HashSet::new(),
            })
        })
    }
    pub fn fs_fcreate_rw(&mut self, path: &str) -> IoResult<VFileDescriptor> {
        self.files.insert(path.into(), VFile::new());
        Ok(VFileDescriptor(path.into()))
    }
    pub fn fs_fopen_rw(&mut self, path: &str) -> IoResult<VFileDescriptor> {
        let f = self
            .files
            .get_mut(path)
            .ok_or_else(|| SysIOError::from(ErrorKind::NotFound).into_inner())?;
        f.pos = 0;
        Ok(VFileDescriptor(path.into()))
    }
    pub fn with_file_mut<T>(
        &mut self,
        fd: &VFileDescriptor,
        f: impl FnOnce(&mut VFile) -> IoResult<T>,
    ) -> IoResult<T> {
        let file = self
            .files
            .get_mut(&*fd.0)
            .ok_or_else(|| SysIOError::from(ErrorKind::NotFound).into_inner())?;
        f(file)
    }
    pub fn fs_read(&mut self, path: &str) -> IoResult<Vec<u8>> {
        self.files
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| SysIOError::from(ErrorKind::NotFound).into_inner())
    }
    pub fn fs_remove_file(&mut self, path: &str) -> IoResult<()> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| SysIOError::from(ErrorKind::NotFound).into_inner())
    }
    pub fn fs_rename(&mut self, from: &str, to: &str) -> IoResult<()> {
        let f = self
            .files
            .remove(from)
            .ok_or_else(|| SysIOError::from(ErrorKind::NotFound).into_inner())?;
        self.files.insert(to.into(), f);
        Ok(())
    }
    pub fn fs_create_dir_all(&mut self, path: &str) -> IoResult<()> {
        let mut so_far = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !so_far.is_empty() {
                so_far.push('/');
            }
            so_far.push_str(component);
            self.dirs.insert(so_far.as_str().into());
        }
        Ok(())
    }
    pub fn fs_delete_dir_all(&mut self, path: &str) -> IoResult<()> {
        if !self.dirs.contains(path) {
            return Err(SysIOError::from(ErrorKind::NotFound).into_inner());
        }
        let prefix = format!("{path}/");
        self.dirs
            .retain(|d| &**d != path && !d.starts_with(&prefix));
        self.files.retain(|p, _| !p.starts_with(&prefix));
        Ok(())
    }
    pub fn fs_contains_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }
}
