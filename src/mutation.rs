// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The structured representation a [`crate::row_consumer::RowConsumer`]
//! builds up: a [`Mutation`] per partition, holding a [`MutationPartition`]
//! with a static row, clustered rows, and range tombstones.

use crate::slice::Slice;
use std::collections::{BTreeMap, BTreeSet};

/// A clustering key: an ordered tuple of typed-but-opaque components. A
/// "prefix" is the same type with fewer components than the schema's
/// clustering arity.
pub type ClusteringKey = Vec<Slice>;

/// A deletion marker. Shadows data with timestamp ≤ `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tombstone {
    /// The deleting write's timestamp.
    pub timestamp: i64,
    /// Server-local wall-clock time the delete was applied, used for GC
    /// (not interpreted by this crate).
    pub local_deletion_time: i64,
}

/// A single regular-column cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// A live value.
    Live {
        /// Write timestamp.
        timestamp: i64,
        /// The cell's value bytes.
        value: Slice,
        /// Optional (ttl, expiration) for cells written with a TTL.
        expiry: Option<(u32, i64)>,
    },
    /// A tombstoned cell.
    Dead(Tombstone),
    /// A multi-cell collection.
    Collection(CollectionMutation),
}

/// A multi-cell collection's accumulated state: a per-element-key map of
/// cells, plus an optional collection-wide tombstone that shadows elements
/// with a lower-or-equal timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionMutation {
    /// Element key → element cell.
    pub elements: BTreeMap<Slice, Cell>,
    /// A tombstone covering every element at or below its timestamp.
    pub collection_tombstone: Option<Tombstone>,
}

/// The row marker: records that a clustering key was written to, even if
/// it carries no live cells (an `INSERT` with no non-key columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMarker {
    /// The row was created live at `timestamp`, with optional TTL.
    Live {
        /// Creation timestamp.
        timestamp: i64,
        /// Optional (ttl, expiration).
        expiry: Option<(u32, i64)>,
    },
    /// The row was deleted.
    Dead(Tombstone),
}

/// One row at a concrete clustering key.
#[derive(Debug, Clone, Default)]
pub struct ClusteredRow {
    /// The row marker, if any event established one.
    pub marker: Option<RowMarker>,
    /// Regular-column cells, keyed by column name.
    pub cells: BTreeMap<Vec<u8>, Cell>,
}

/// A range tombstone over a clustering prefix: deletes every clustering
/// key that starts with `prefix`.
///
/// The reference format allows a true `[start..end)` span over distinct
/// clustering values, but this reader only supports the case §4.4.4
/// requires it to: `start` and `end` share one clustering prefix (a
/// collection-wide delete nested under it at most). A tombstone spanning
/// multiple distinct prefixes surfaces as
/// [`crate::error::NotImplementedCause::RangeDeletes`] instead of being
/// represented here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RangeTombstoneEntry {
    /// The clustering prefix this tombstone covers.
    pub prefix: ClusteringKey,
    /// The deletion marker.
    pub deletion: Tombstone,
}

impl RangeTombstoneEntry {
    /// Whether `key` starts with this tombstone's prefix.
    #[must_use]
    pub fn covers(&self, key: &[Slice]) -> bool {
        key.get(..self.prefix.len())
            .is_some_and(|head| head == self.prefix.as_slice())
    }
}

/// A partition's decoded contents.
#[derive(Debug, Clone, Default)]
pub struct MutationPartition {
    /// A delete of the whole partition, if any.
    pub partition_tombstone: Option<Tombstone>,
    /// Static-row cells (belong to the partition, not to any clustering key).
    pub static_row: BTreeMap<Vec<u8>, Cell>,
    /// Clustered rows, sorted by clustering key.
    pub rows: BTreeMap<ClusteringKey, ClusteredRow>,
    /// Range tombstones over clustering-key prefixes.
    pub range_tombstones: BTreeSet<RangeTombstoneEntry>,
}

impl MutationPartition {
    /// Returns the row at `key`, creating an empty one if absent.
    pub fn row_mut(&mut self, key: ClusteringKey) -> &mut ClusteredRow {
        self.rows.entry(key).or_default()
    }
}

/// A fully decoded partition, ready to hand back to the caller.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// The partition key these contents belong to.
    pub partition_key: Slice,
    /// The decoded contents.
    pub partition: MutationPartition,
}

impl Mutation {
    /// Creates an empty mutation for `partition_key`.
    #[must_use]
    pub fn new(partition_key: Slice) -> Self {
        Self {
            partition_key,
            partition: MutationPartition::default(),
        }
    }
}
