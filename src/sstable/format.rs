// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The low-level data-file event stream: a flat sequence of
//! partition-start / cell / deleted-cell / range-tombstone / partition-end
//! events, exactly the shape the row consumer (§4.4) expects to be driven
//! by. Integers are big-endian; composite names travel as raw bytes and
//! are exploded by [`crate::clustering`].

use crate::{
    error::{malformed, Result},
    mutation::Tombstone,
    slice::Slice,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{ErrorKind, Read};

/// One event emitted by the data-file format parser.
#[derive(Debug, Clone)]
pub enum FormatEvent {
    /// The start of a partition: its key, and an optional partition-level
    /// tombstone.
    RowStart {
        /// The partition key's raw bytes.
        key: Slice,
        /// The partition tombstone, if the partition was (also) deleted.
        deletion_time: Option<Tombstone>,
    },
    /// A live cell.
    Cell {
        /// The cell's raw composite column name.
        col_name: Slice,
        /// The cell's value.
        value: Slice,
        /// Write timestamp.
        timestamp: i64,
        /// Optional (ttl, expiration).
        ttl: Option<(u32, i64)>,
    },
    /// A dead cell.
    DeletedCell {
        /// The cell's raw composite column name.
        col_name: Slice,
        /// The deletion marker.
        deletion_time: Tombstone,
    },
    /// A range tombstone.
    RangeTombstone {
        /// The raw composite start bound.
        start: Slice,
        /// The raw composite end bound.
        end: Slice,
        /// The deletion marker.
        deletion_time: Tombstone,
    },
    /// The end of the current partition.
    RowEnd,
}

const TAG_ROW_END: u8 = 0;
const TAG_CELL: u8 = 1;
const TAG_DELETED_CELL: u8 = 2;
const TAG_RANGE_TOMBSTONE: u8 = 3;

const FLAG_HAS_TTL: u8 = 0b01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    ExpectPartition,
    InPartition,
}

/// Pulls [`FormatEvent`]s out of a byte stream in order.
pub struct FormatReader<R> {
    reader: R,
    state: ReaderState,
}

impl<R: Read> FormatReader<R> {
    /// Wraps `reader`, positioned at the start of a partition record.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            state: ReaderState::ExpectPartition,
        }
    }

    fn read_blob(&mut self) -> Result<Slice> {
        let len = self.reader.read_u32::<BigEndian>()?;
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf)?;
        Ok(Slice::from(&buf))
    }

    fn read_tombstone(&mut self) -> Result<Tombstone> {
        let timestamp = self.reader.read_i64::<BigEndian>()?;
        let local_deletion_time = self.reader.read_i64::<BigEndian>()?;
        Ok(Tombstone {
            timestamp,
            local_deletion_time,
        })
    }

    /// Reads the next event, or `None` at end of stream (only valid
    /// between partitions — mid-partition EOF is a format error).
    pub fn next_event(&mut self) -> Result<Option<FormatEvent>> {
        match self.state {
            ReaderState::ExpectPartition => {
                let key = match self.read_blob() {
                    Ok(key) => key,
                    Err(crate::error::Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                        return Ok(None)
                    }
                    Err(e) => return Err(e),
                };

                let has_tombstone = self.reader.read_u8()?;
                let deletion_time = match has_tombstone {
                    0 => None,
                    1 => Some(self.read_tombstone()?),
                    other => return Err(malformed(format!("invalid partition tombstone flag {other}"))),
                };

                self.state = ReaderState::InPartition;
                Ok(Some(FormatEvent::RowStart { key, deletion_time }))
            }
            ReaderState::InPartition => {
                let tag = self.reader.read_u8()?;

                match tag {
                    TAG_ROW_END => {
                        self.state = ReaderState::ExpectPartition;
                        Ok(Some(FormatEvent::RowEnd))
                    }
                    TAG_CELL => {
                        let col_name = self.read_blob()?;
                        let flags = self.reader.read_u8()?;
                        let timestamp = self.reader.read_i64::<BigEndian>()?;
                        let value = self.read_blob()?;

                        let ttl = if flags & FLAG_HAS_TTL != 0 {
                            let ttl = self.reader.read_u32::<BigEndian>()?;
                            let expiration = self.reader.read_i64::<BigEndian>()?;
                            Some((ttl, expiration))
                        } else {
                            None
                        };

                        Ok(Some(FormatEvent::Cell {
                            col_name,
                            value,
                            timestamp,
                            ttl,
                        }))
                    }
                    TAG_DELETED_CELL => {
                        let col_name = self.read_blob()?;
                        let deletion_time = self.read_tombstone()?;
                        Ok(Some(FormatEvent::DeletedCell {
                            col_name,
                            deletion_time,
                        }))
                    }
                    TAG_RANGE_TOMBSTONE => {
                        let start = self.read_blob()?;
                        let end = self.read_blob()?;
                        let deletion_time = self.read_tombstone()?;
                        Ok(Some(FormatEvent::RangeTombstone {
                            start,
                            end,
                            deletion_time,
                        }))
                    }
                    other => {
                        log::error!("invalid data-file event tag {other}, stream is corrupt");
                        Err(malformed(format!("invalid event tag {other}")))
                    }
                }
            }
        }
    }
}
