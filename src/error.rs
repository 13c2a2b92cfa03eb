/*
 * Created on Tue Mar 05 2024
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

use core::fmt;

pub type RuntimeResult<T> = Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// Failure classes of the storage core. The happy path is `Result::Ok`;
/// there is no "ok" kind
pub enum ErrorKind {
    /// the requested item does not exist
    NotFound,
    /// on-disk or in-flight data failed validation
    Corruption,
    /// the operation is not supported by this build/configuration
    NotSupported,
    /// the caller passed something we can't work with
    InvalidArgument,
    /// the underlying I/O layer failed
    IoError,
}

impl ErrorKind {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Corruption => "corruption",
            Self::NotSupported => "not supported",
            Self::InvalidArgument => "invalid argument",
            Self::IoError => "i/o error",
        }
    }
}

#[derive(Debug)]
/// An error value carrying the failure class, a message and an optional
/// secondary detail (usually the offending path or the source error)
pub struct Error {
    kind: ErrorKind,
    message: Box<str>,
    detail: Option<Box<str>>,
}

impl Error {
    fn _new(kind: ErrorKind, message: impl Into<Box<str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }
    pub fn not_found(message: impl Into<Box<str>>) -> Self {
        Self::_new(ErrorKind::NotFound, message)
    }
    pub fn corruption(message: impl Into<Box<str>>) -> Self {
        Self::_new(ErrorKind::Corruption, message)
    }
    pub fn not_supported(message: impl Into<Box<str>>) -> Self {
        Self::_new(ErrorKind::NotSupported, message)
    }
    pub fn invalid_argument(message: impl Into<Box<str>>) -> Self {
        Self::_new(ErrorKind::InvalidArgument, message)
    }
    pub fn with_detail(mut self, detail: impl Into<Box<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::_new(ErrorKind::IoError, e.to_string())
    }
}
