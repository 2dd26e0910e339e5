// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An on-disk partition reader for sorted-string tables (SSTables).
//!
//! ##### About
//!
//! This crate decodes the immutable, sorted-string table files that back a
//! wide-column store's persistent storage level. It covers the binary
//! format decoder, the two-level summary+index lookup, the row/cell
//! consumer that reassembles composite column names into structured
//! mutations, and a range-aware partition iterator over a tokenized key
//! space with wrap-around semantics.
//!
//! This crate does not write SSTables, merge them during compaction, or
//! garbage-collect cells — it only reads what is already on disk.
//!
//! # Example usage
//!
//! ```
//! use sstable_reader::{
//!     fs::StdFileSystem,
//!     key::DecoratedKey,
//!     partition_reader,
//!     schema::Schema,
//!     sstable::Sstable,
//!     token::{Partitioner, Token, Xxh3Partitioner},
//! };
//! # use rustc_hash::FxHashMap;
//! # use std::path::Path;
//! #
//! # fn open(summary: &Path, index: &Path, data: &Path) -> sstable_reader::Result<()> {
//! let sstable = Sstable::<StdFileSystem>::open(summary, index, data, None)?;
//! let schema = Schema::new(1, FxHashMap::default(), true, false, None);
//!
//! let partitioner = Xxh3Partitioner;
//! let key = DecoratedKey::new(
//!     Token::from_raw(partitioner.token(b"my_key").raw()),
//!     b"my_key".as_slice().into(),
//! );
//!
//! if let Some(mutation) = partition_reader::read_row(&sstable, &schema, &key)? {
//!     println!("found partition {:?}", mutation.partition_key);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

macro_rules! fail_iter {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        }
    };
}

pub mod binary_search;

#[doc(hidden)]
pub mod bloom;

pub mod clustering;
pub mod coding;
pub mod combine;
pub mod error;

#[doc(hidden)]
pub mod file;

pub mod filter;
pub mod fs;
pub mod join;
pub mod key;
pub mod key_reader;
pub mod mutation;
pub mod partition_reader;
pub mod priority;
pub mod range;
pub mod row_consumer;
pub mod schema;
pub mod slice;
pub mod sstable;
pub mod token;

pub use {
    combine::CombiningReader,
    error::{Error, Result},
    filter::FilteringReader,
    join::JoiningReader,
    key::{DecoratedKey, RingPosition},
    mutation::Mutation,
    priority::IoPriority,
    row_consumer::RowConsumer,
    schema::Schema,
    sstable::Sstable,
    token::{Partitioner, Token},
};
