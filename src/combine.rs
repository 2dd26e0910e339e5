// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The combining reader (§4.6): merges N lazy mutation sequences sorted by
//! decorated key into one, folding sources that agree on a key via
//! per-partition, last-writer-wins-by-timestamp merge.

use crate::{
    error::Result,
    mutation::{Cell, ClusteredRow, Mutation, MutationPartition, RowMarker, Tombstone},
    slice::Slice,
};

/// One source feeding the combining reader: a mutation sequence plus the
/// partition key of its currently buffered (not-yet-consumed) mutation.
struct Source<I> {
    iter: I,
    peeked: Option<Mutation>,
}

/// Merges `sources` into a single mutation sequence ordered by
/// `mutation.partition_key`'s decorated key.
///
/// Sources must individually be in ascending decorated-key order — the
/// combining reader does not sort, only merges (§4.6). The partition key's
/// bytes are compared directly: callers are expected to hand sources drawn
/// from SSTables sharing one partitioner, so this is equivalent to
/// comparing decorated keys.
pub struct CombiningReader<I> {
    sources: Vec<Source<I>>,
}

impl<I: Iterator<Item = Result<Mutation>>> CombiningReader<I> {
    /// Builds a combining reader over `sources`.
    pub fn new(sources: Vec<I>) -> Result<Self> {
        let mut wrapped = Vec::with_capacity(sources.len());
        for mut iter in sources {
            let peeked = iter.next().transpose()?;
            wrapped.push(Source { iter, peeked });
        }
        Ok(Self { sources: wrapped })
    }

    fn advance(&mut self, index: usize) -> Result<()> {
        let source = &mut self.sources[index];
        source.peeked = source.iter.next().transpose()?;
        Ok(())
    }
}

impl<I: Iterator<Item = Result<Mutation>>> Iterator for CombiningReader<I> {
    type Item = Result<Mutation>;

    fn next(&mut self) -> Option<Self::Item> {
        let min_key = self
            .sources
            .iter()
            .filter_map(|s| s.peeked.as_ref().map(|m| m.partition_key.clone()))
            .min_by(|a, b| a.as_ref().cmp(b.as_ref()))?;

        let mut winners = Vec::new();
        for index in 0..self.sources.len() {
            let matches = self.sources[index]
                .peeked
                .as_ref()
                .is_some_and(|m| *m.partition_key == *min_key);

            if matches {
                let mutation = self.sources[index].peeked.take().expect("checked above");
                winners.push(mutation);
                fail_iter!(self.advance(index));
            }
        }

        let mut iter = winners.into_iter();
        let mut merged = iter.next()?;
        for other in iter {
            merge_partition(&mut merged.partition, other.partition);
        }

        Some(Ok(merged))
    }
}

/// Folds `other` into `target`, last-writer-wins by cell/marker timestamp.
/// Tombstones participate as ordinary timestamped entries — ties are
/// resolved in favor of whichever write has the higher timestamp; exact
/// ties keep `target`'s existing value (stable merge order).
fn merge_partition(target: &mut MutationPartition, other: MutationPartition) {
    target.partition_tombstone = merge_tombstone(target.partition_tombstone, other.partition_tombstone);

    for (name, cell) in other.static_row {
        merge_cell_into(&mut target.static_row, name, cell);
    }

    for (key, row) in other.rows {
        match target.rows.get_mut(&key) {
            Some(existing) => merge_row(existing, row),
            None => {
                target.rows.insert(key, row);
            }
        }
    }

    target.range_tombstones.extend(other.range_tombstones);
}

fn merge_row(target: &mut ClusteredRow, other: ClusteredRow) {
    target.marker = merge_marker(target.marker, other.marker);
    for (name, cell) in other.cells {
        merge_cell_into(&mut target.cells, name, cell);
    }
}

fn merge_cell_into(target: &mut std::collections::BTreeMap<Vec<u8>, Cell>, name: Vec<u8>, cell: Cell) {
    match target.get_mut(&name) {
        Some(existing) => {
            if cell_timestamp(&cell) > cell_timestamp(existing) {
                *existing = cell;
            }
        }
        None => {
            target.insert(name, cell);
        }
    }
}

fn cell_timestamp(cell: &Cell) -> i64 {
    match cell {
        Cell::Live { timestamp, .. } => *timestamp,
        Cell::Dead(tombstone) => tombstone.timestamp,
        Cell::Collection(collection) => collection
            .elements
            .values()
            .map(cell_timestamp)
            .chain(collection.collection_tombstone.map(|t| t.timestamp))
            .max()
            .unwrap_or(i64::MIN),
    }
}

fn marker_timestamp(marker: &RowMarker) -> i64 {
    match marker {
        RowMarker::Live { timestamp, .. } => *timestamp,
        RowMarker::Dead(tombstone) => tombstone.timestamp,
    }
}

fn merge_marker(a: Option<RowMarker>, b: Option<RowMarker>) -> Option<RowMarker> {
    match (a, b) {
        (None, m) | (m, None) => m,
        (Some(a), Some(b)) => {
            if marker_timestamp(&b) > marker_timestamp(&a) {
                Some(b)
            } else {
                Some(a)
            }
        }
    }
}

fn merge_tombstone(a: Option<Tombstone>, b: Option<Tombstone>) -> Option<Tombstone> {
    match (a, b) {
        (None, t) | (t, None) => t,
        (Some(a), Some(b)) => Some(if b.timestamp > a.timestamp { b } else { a }),
    }
}
