/*
 * Created on Fri Mar 15 2024
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
    file system
*/

#[cfg(test)]
use super::vfs::{VFileDescriptor, VirtualFS};
use {
    crate::IoResult,
    std::{
        fs as std_fs,
        io::{Read, Seek, SeekFrom, Write},
    },
};

pub struct FileSystem {}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum FSContext {
    Local,
    Virtual,
}

#[cfg(test)]
local! {
    // tests default to the virtual context so they never splash onto the real disk
    static CTX: FSContext = FSContext::Virtual;
}

impl FileSystem {
    #[cfg(test)]
    pub fn context() -> FSContext {
        local_ref!(CTX, |ctx: &FSContext| *ctx)
    }
    #[cfg(test)]
    pub fn set_context(context: FSContext) {
        local_mut!(CTX, |ctx: &mut FSContext| *ctx = context)
    }
}

impl FileSystem {
    #[inline(always)]
    pub fn read(path: &str) -> IoResult<Vec<u8>> {
        #[cfg(test)]
        {
            match Self::context() {
                FSContext::Local => {}
                FSContext::Virtual => return VirtualFS::instance().write().fs_read(path),
            }
        }
        std_fs::read(path)
    }
    #[inline(always)]
    pub fn create_dir_all(path: &str) -> IoResult<()> {
        #[cfg(test)]
        {
            match Self::context() {
                FSContext::Local => {}
                FSContext::Virtual => return VirtualFS::instance().write().fs_create_dir_all(path),
            }
        }
        std_fs::create_dir_all(path)
    }
    #[inline(always)]
    pub fn remove_dir_all(path: &str) -> IoResult<()> {
        #[cfg(test)]
        {
            match Self::context() {
                FSContext::Local => {}
                FSContext::Virtual => return VirtualFS::instance().write().fs_delete_dir_all(path),
            }
        }
        std_fs::remove_dir_all(path)
    }
    #[inline(always)]
    pub fn remove_file(path: &str) -> IoResult<()> {
        #[cfg(test)]
        {
            match Self::context() {
                FSContext::Local => {}
                FSContext::Virtual => return VirtualFS::instance().write().fs_remove_file(path),
            }
        }
        std_fs::remove_file(path)
    }
    #[inline(always)]
    pub fn rename(from: &str, to: &str) -> IoResult<()> {
        #[cfg(test)]
        {
            match Self::context() {
                FSContext::Local => {}
                FSContext::Virtual => return VirtualFS::instance().write().fs_rename(from, to),
            }
        }
        std_fs::rename(from, to)
    }
}

/*
    file traits
*/

pub trait FileRead {
    /// Fill the entire buffer or fail
    fn fread_exact(&mut self, buf: &mut [u8]) -> IoResult<()>;
    /// Fill as much of the buffer as the file can currently serve. A short
    /// count means EOF, never an error
    fn fread_upto(&mut self, buf: &mut [u8]) -> IoResult<usize>;
    /// Skip past `n` bytes. Skipping beyond EOF is not an error; subsequent
    /// reads simply return 0
    fn fskip(&mut self, n: u64) -> IoResult<()>;
}

pub trait FileWrite {
    fn fwrite(&mut self, buf: &[u8]) -> IoResult<u64>;
    /// Flush userspace buffers (not a durability barrier)
    fn fflush(&mut self) -> IoResult<()>;
    fn fwrite_all(&mut self, mut buf: &[u8]) -> IoResult<()> {
        while !buf.is_empty() {
            match self.fwrite(buf)? {
                0 => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "file refused to accept more bytes",
                    ))
                }
                n => buf = &buf[n as usize..],
            }
        }
        Ok(())
    }
}

pub trait FileWriteExt {
    /// Sync data and metadata permanently
    fn fsync_all(&mut self) -> IoResult<()>;
    /// Sync data permanently
    fn fsync_data(&mut self) -> IoResult<()>;
    fn f_truncate(&mut self, new_size: u64) -> IoResult<()>;
}

pub trait FileExt {
    fn f_len(&self) -> IoResult<u64>;
    fn f_cursor(&mut self) -> IoResult<u64>;
    fn f_seek_start(&mut self, offset: u64) -> IoResult<()>;
}

/*
    blanket impls over std readers/writers
*/

impl<W: Write> FileWrite for W {
    fn fwrite(&mut self, buf: &[u8]) -> IoResult<u64> {
        self.write(buf).map(|x| x as u64)
    }
    fn fflush(&mut self) -> IoResult<()> {
        self.flush()
    }
}

impl<R: Read> FileRead for R {
    fn fread_exact(&mut self, buf: &mut [u8]) -> IoResult<()> {
        self.read_exact(buf)
    }
    fn fread_upto(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
    fn fskip(&mut self, n: u64) -> IoResult<()> {
        // generic readers can only skip by draining
        std::io::copy(&mut self.by_ref().take(n), &mut std::io::sink()).map(|_| ())
    }
}

/*
    impls for local file
*/

trait LocalFile {
    fn _mut(&mut self) -> &mut std_fs::File;
    fn _ref(&self) -> &std_fs::File;
}

impl LocalFile for std_fs::File {
    fn _mut(&mut self) -> &mut std_fs::File {
        self
    }
    fn _ref(&self) -> &std_fs::File {
        self
    }
}

impl<Lf: LocalFile> FileWriteExt for Lf {
    fn fsync_all(&mut self) -> IoResult<()> {
        self._mut().sync_all()
    }
    fn fsync_data(&mut self) -> IoResult<()> {
        self._mut().sync_data()
    }
    fn f_truncate(&mut self, new_size: u64) -> IoResult<()> {
        self._mut().set_len(new_size)
    }
}

impl<Lf: LocalFile> FileExt for Lf {
    fn f_len(&self) -> IoResult<u64> {
        self._ref().metadata().map(|md| md.len())
    }
    fn f_cursor(&mut self) -> IoResult<u64> {
        self._mut().stream_position()
    }
    fn f_seek_start(&mut self, offset: u64) -> IoResult<()> {
        self._mut().seek(SeekFrom::Start(offset)).map(|_| ())
    }
}

/*
    file abstraction
*/

#[cfg(test)]
#[derive(Debug)]
enum AnyFile<Lf = std_fs::File> {
    Local(Lf),
    Virtual(VFileDescriptor),
}

#[derive(Debug)]
pub struct File {
    #[cfg(test)]
    f: AnyFile,
    #[cfg(not(test))]
    f: std_fs::File,
}

impl File {
    pub fn open(path: &str) -> IoResult<Self> {
        #[cfg(test)]
        {
            match FileSystem::context() {
                FSContext::Local => {}
                FSContext::Virtual => {
                    return VirtualFS::instance().write().fs_fopen_rw(path).map(|f| Self {
                        f: AnyFile::Virtual(f),
                    })
                }
            }
        }
        let file = std_fs::File::options().read(true).write(true).open(path)?;
        Ok(Self {
            #[cfg(test)]
            f: AnyFile::Local(file),
            #[cfg(not(test))]
            f: file,
        })
    }
    pub fn create(path: &str) -> IoResult<Self> {
        #[cfg(test)]
        {
            match FileSystem::context() {
                FSContext::Local => {}
                FSContext::Virtual => {
                    return VirtualFS::instance()
                        .write()
                        .fs_fcreate_rw(path)
                        .map(|f| Self {
                            f: AnyFile::Virtual(f),
                        })
                }
            }
        }
        let file = std_fs::File::options()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;
        Ok(Self {
            #[cfg(test)]
            f: AnyFile::Local(file),
            #[cfg(not(test))]
            f: file,
        })
    }
}

impl File {
    /// Positioned read for random-access consumers (the table layer reads
    /// blocks this way). `&mut self` keeps thread safety the caller's
    /// business; share a file between threads behind your own lock
    pub fn fread_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> IoResult<()> {
        self.f_seek_start(offset)?;
        self.fread_exact(buf)
    }
}

impl FileWrite for File {
    fn fwrite(&mut self, buf: &[u8]) -> IoResult<u64> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.fwrite(buf),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| f.fwrite(buf)),
            }
        }
        #[cfg(not(test))]
        {
            self.f.fwrite(buf)
        }
    }
    fn fflush(&mut self) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => FileWrite::fflush(lf),
                AnyFile::Virtual(_) => Ok(()),
            }
        }
        #[cfg(not(test))]
        {
            FileWrite::fflush(&mut self.f)
        }
    }
}

impl FileRead for File {
    fn fread_exact(&mut self, buf: &mut [u8]) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.fread_exact(buf),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| f.fread_exact(buf)),
            }
        }
        #[cfg(not(test))]
        {
            self.f.fread_exact(buf)
        }
    }
    fn fread_upto(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.fread_upto(buf),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| f.fread_upto(buf)),
            }
        }
        #[cfg(not(test))]
        {
            self.f.fread_upto(buf)
        }
    }
    fn fskip(&mut self, n: u64) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.seek(SeekFrom::Current(n as i64)).map(|_| ()),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| f.fskip(n)),
            }
        }
        #[cfg(not(test))]
        {
            self.f.seek(SeekFrom::Current(n as i64)).map(|_| ())
        }
    }
}

impl FileWriteExt for File {
    fn fsync_all(&mut self) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.fsync_all(),
                AnyFile::Virtual(_) => Ok(()),
            }
        }
        #[cfg(not(test))]
        {
            self.f.fsync_all()
        }
    }
    fn fsync_data(&mut self) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.fsync_data(),
                AnyFile::Virtual(_) => Ok(()),
            }
        }
        #[cfg(not(test))]
        {
            self.f.fsync_data()
        }
    }
    fn f_truncate(&mut self, new_size: u64) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.f_truncate(new_size),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| f.truncate(new_size)),
            }
        }
        #[cfg(not(test))]
        {
            self.f.f_truncate(new_size)
        }
    }
}

impl FileExt for File {
    fn f_len(&self) -> IoResult<u64> {
        #[cfg(test)]
        {
            match &self.f {
                AnyFile::Local(lf) => lf.f_len(),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| Ok(f.length())),
            }
        }
        #[cfg(not(test))]
        {
            self.f.f_len()
        }
    }
    fn f_cursor(&mut self) -> IoResult<u64> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.f_cursor(),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| Ok(f.cursor())),
            }
        }
        #[cfg(not(test))]
        {
            self.f.f_cursor()
        }
    }
    fn f_seek_start(&mut self, offset: u64) -> IoResult<()> {
        #[cfg(test)]
        {
            match &mut self.f {
                AnyFile::Local(lf) => lf.f_seek_start(offset),
                AnyFile::Virtual(vf) => VirtualFS::instance()
                    .write()
                    .with_file_mut(vf, |f| f.seek_from_start(offset)),
            }
        }
        #[cfg(not(test))]
        {
            self.f.f_seek_start(offset)
        }
    }
}
