// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};

/// A feature this crate deliberately does not implement yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotImplementedCause {
    /// The caller asked for range tombstones to be materialized across
    /// a combining/filtering reader boundary that does not track them.
    RangeDeletes,
    /// The caller passed a wrapping range to an entry point that only
    /// accepts already-unwrapped ranges.
    WrapAround,
}

impl std::fmt::Display for NotImplementedCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RangeDeletes => write!(f, "range deletes across this boundary"),
            Self::WrapAround => write!(f, "wrap-around ranges at this entry point"),
        }
    }
}

/// Represents errors that can occur while reading an SSTable
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// The on-disk structure violates an invariant the format requires
    /// (truncated file, bad magic bytes, out-of-order summary entries, ...)
    MalformedSstable(String),

    /// The request needs a feature this reader does not implement
    NotImplemented(NotImplementedCause),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Encode(e) => write!(f, "encode error: {e:?}"),
            Self::Decode(e) => write!(f, "decode error: {e:?}"),
            Self::MalformedSstable(msg) => write!(f, "malformed sstable: {msg}"),
            Self::NotImplemented(cause) => write!(f, "not implemented: {cause}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Construct a [`Error::MalformedSstable`] from a format string.
pub(crate) fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedSstable(message.into())
}

/// Reader result
pub type Result<T> = std::result::Result<T, Error>;
