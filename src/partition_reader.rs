// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The top-level partition reader (§4.3): resolves a request — a single
//! key, the whole file, or a range — to a byte span via the summary+index,
//! then drives the data-file format parser through the row consumer.

use crate::{
    error::{malformed, Error, NotImplementedCause, Result},
    fs::FileSystem,
    key::{DecoratedKey, RingPosition},
    mutation::Mutation,
    range::Range,
    row_consumer::RowConsumer,
    schema::Schema,
    sstable::{format::FormatEvent, format::FormatReader, Boundary, Sstable},
};
use std::{fs::File, io::BufReader};

/// Reads a single partition by exact key.
///
/// Returns `None` if the Bloom filter rejects the key, or if the
/// summary/index search comes up empty (a Bloom-filter false positive,
/// already recorded on `sstable`'s counter by [`Sstable::locate`]).
pub fn read_row<FS: FileSystem>(
    sstable: &Sstable<FS>,
    schema: &Schema,
    key: &DecoratedKey,
) -> Result<Option<Mutation>> {
    let Some(position) = sstable.locate(key)? else {
        return Ok(None);
    };

    let reader = sstable.open_data_at(position)?;
    let mut format = FormatReader::new(reader);
    let mut consumer = RowConsumer::new(schema);

    let Some(event) = format.next_event()? else {
        return Ok(None);
    };

    let FormatEvent::RowStart { key: found_key, .. } = &event else {
        return Err(malformed("data stream did not start with a partition"));
    };

    if found_key.as_ref() != key.key() {
        return Err(malformed("data stream key did not match the requested key"));
    }

    let mut result = consumer.feed(event)?;

    while result.is_none() {
        let Some(event) = format.next_event()? else {
            return Err(malformed("data stream ended mid-partition"));
        };
        result = consumer.feed(event)?;
    }

    Ok(result)
}

/// A lazy sequence of mutations read from a `[start, end)` byte span of the
/// data file, in file order.
pub struct RowSequence<'a> {
    format: FormatReader<BufReader<File>>,
    schema: &'a Schema,
    end_position: u64,
    position_hint: u64,
}

impl<'a> RowSequence<'a> {
    fn open<FS: FileSystem>(sstable: &Sstable<FS>, schema: &'a Schema, start: u64, end: u64) -> Result<Self> {
        let reader = sstable.open_data_at(start)?;

        Ok(Self {
            format: FormatReader::new(reader),
            schema,
            end_position: end,
            position_hint: start,
        })
    }
}

impl Iterator for RowSequence<'_> {
    type Item = Result<Mutation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position_hint >= self.end_position {
            return None;
        }

        let mut consumer = RowConsumer::new(self.schema);

        loop {
            let event = match self.format.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => {
                    self.position_hint = self.end_position;
                    return None;
                }
                Err(e) => return Some(Err(e)),
            };

            match consumer.feed(event) {
                Ok(Some(mutation)) => return Some(Ok(mutation)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Reads every partition in the SSTable, in file order (§4.3 `read_rows`).
pub fn read_rows<'a, FS: FileSystem>(sstable: &Sstable<FS>, schema: &'a Schema) -> Result<RowSequence<'a>> {
    let end = sstable.data_size()?;
    RowSequence::open(sstable, schema, 0, end)
}

/// Reads every partition whose ring position lies in `partition_range`
/// (§4.3 `read_range_rows`).
///
/// `partition_range` must not wrap; the caller unwraps first
/// ([`crate::range::Range::unwrap_wrapped`]). A wrapping range surfaces
/// [`NotImplementedCause::WrapAround`].
pub fn read_range_rows<'a, FS: FileSystem>(
    sstable: &Sstable<FS>,
    schema: &'a Schema,
    partition_range: &Range<RingPosition>,
) -> Result<RowSequence<'a>> {
    if partition_range.is_wrap_around(ring_position_cmp) {
        return Err(Error::NotImplemented(NotImplementedCause::WrapAround));
    }

    let start = resolve_start(sstable, partition_range)?;
    let end = resolve_end(sstable, partition_range)?;

    RowSequence::open(sstable, schema, start, end.max(start))
}

fn ring_position_cmp(a: &RingPosition, b: &RingPosition) -> std::cmp::Ordering {
    a.cmp(b)
}

fn resolve_start<FS: FileSystem>(sstable: &Sstable<FS>, range: &Range<RingPosition>) -> Result<u64> {
    match range.start() {
        None => sstable.resolve_position(None, Boundary::Start),
        Some(bound) if bound.inclusive => sstable.resolve_position(Some(&bound.value), Boundary::Start),
        Some(bound) => sstable.resolve_position(Some(&bound.value), Boundary::End),
    }
}

fn resolve_end<FS: FileSystem>(sstable: &Sstable<FS>, range: &Range<RingPosition>) -> Result<u64> {
    match range.end() {
        None => sstable.resolve_position(None, Boundary::End),
        Some(bound) if bound.inclusive => sstable.resolve_position(Some(&bound.value), Boundary::End),
        Some(bound) => sstable.resolve_position(Some(&bound.value), Boundary::Start),
    }
}
