// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The row consumer (§4.4): decodes composite column-name events into a
//! structured [`Mutation`], reassembling clustering keys, static rows, row
//! markers, multi-cell collections, and range tombstones.

use crate::{
    clustering::{self, Exploded, MARKER_END_OF_RANGE, MARKER_NONE, MARKER_START_OF_RANGE},
    error::{malformed, Error, NotImplementedCause, Result},
    mutation::{Cell, CollectionMutation, Mutation, RangeTombstoneEntry, RowMarker, Tombstone},
    schema::Schema,
    slice::Slice,
    sstable::format::FormatEvent,
};

/// A decoded column name: the clustering prefix it names, whether it
/// belongs to the static row, the regular-column name, and an optional
/// collection element key.
struct DecodedName {
    is_static: bool,
    clustering: Vec<Slice>,
    cell_name: Vec<u8>,
    collection_extra: Option<Slice>,
}

/// The (clustering prefix, column) tag identifying one pending collection.
#[derive(PartialEq, Eq, Clone)]
struct PendingTag {
    is_static: bool,
    clustering: Vec<Slice>,
    column_name: Vec<u8>,
}

struct Pending {
    tag: PendingTag,
    data: CollectionMutation,
}

/// Drives [`FormatEvent`]s into [`Mutation`]s, one partition at a time.
///
/// Reused across partitions: feed it events in file order and it yields a
/// completed [`Mutation`] each time a [`FormatEvent::RowEnd`] is consumed.
pub struct RowConsumer<'a> {
    schema: &'a Schema,
    mutation: Option<Mutation>,
    pending: Option<Pending>,
}

impl<'a> RowConsumer<'a> {
    /// Creates a consumer against `schema`.
    #[must_use]
    pub const fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            mutation: None,
            pending: None,
        }
    }

    /// Feeds one event. Returns `Some(mutation)` when the event was a
    /// `RowEnd` that completed a partition.
    pub fn feed(&mut self, event: FormatEvent) -> Result<Option<Mutation>> {
        match event {
            FormatEvent::RowStart { key, deletion_time } => {
                let mut mutation = Mutation::new(key);
                mutation.partition.partition_tombstone = deletion_time;
                self.mutation = Some(mutation);
                Ok(None)
            }
            FormatEvent::Cell {
                col_name,
                value,
                timestamp,
                ttl,
            } => {
                self.apply_cell(&col_name, timestamp, CellSource::Live { value, ttl })?;
                Ok(None)
            }
            FormatEvent::DeletedCell {
                col_name,
                deletion_time,
            } => {
                self.apply_cell(&col_name, deletion_time.timestamp, CellSource::Dead(deletion_time))?;
                Ok(None)
            }
            FormatEvent::RangeTombstone {
                start,
                end,
                deletion_time,
            } => {
                self.apply_range_tombstone(&start, &end, deletion_time)?;
                Ok(None)
            }
            FormatEvent::RowEnd => {
                self.flush_pending()?;
                Ok(self.mutation.take())
            }
        }
    }

    fn decode_name(&self, col_name: &[u8]) -> Result<DecodedName> {
        let (is_static, rest) = clustering::strip_static_marker(col_name);
        let exploded: Exploded = clustering::explode(rest, self.schema.is_compound())?;
        let arity = self.schema.clustering_arity();

        clustering::ensure_max_components(&exploded, arity + 2)?;

        let n = exploded.components.len();
        if n < arity {
            return Err(malformed(format!(
                "composite name has {n} components, schema requires at least {arity}"
            )));
        }

        if is_static {
            for component in exploded.components.iter().take(arity) {
                if !component.is_empty() {
                    return Err(malformed(
                        "static row composite carries non-empty clustering components",
                    ));
                }
            }
        }

        let clustering = exploded.components.get(..arity).unwrap_or(&[]).to_vec();

        // In a dense schema the column-name component is absent on the wire;
        // the cell always names the table's sole regular column.
        let cell_name = match exploded.components.get(arity) {
            Some(s) => s.to_vec(),
            None if self.schema.is_dense() => self
                .schema
                .dense_column_name()
                .ok_or_else(|| malformed("dense schema is missing its column name"))?
                .to_vec(),
            None => Vec::new(),
        };

        let collection_extra = exploded.components.get(arity + 1).cloned();

        Ok(DecodedName {
            is_static,
            clustering,
            cell_name,
            collection_extra,
        })
    }

    fn apply_cell(&mut self, col_name: &[u8], timestamp: i64, source: CellSource) -> Result<()> {
        let decoded = self.decode_name(col_name)?;

        if decoded.cell_name.is_empty() {
            // Row marker: applies to the clustering key itself.
            if decoded.is_static {
                log::warn!("ignoring row marker on static row");
                return Ok(());
            }

            let marker = match source {
                CellSource::Live { ttl, .. } => RowMarker::Live { timestamp, expiry: ttl },
                CellSource::Dead(tombstone) => RowMarker::Dead(tombstone),
            };

            self.mutation
                .as_mut()
                .ok_or_else(|| malformed("cell event before row_start"))?
                .partition
                .row_mut(decoded.clustering)
                .marker = Some(marker);

            return Ok(());
        }

        let Some(cdef) = self.schema.column(&decoded.cell_name) else {
            log::warn!("dropping cell for unknown column (schema drift)");
            return Ok(());
        };

        if timestamp <= cdef.dropped_at {
            log::warn!("dropping cell written before its column was dropped");
            return Ok(());
        }

        if cdef.column_type.is_multi_cell() != decoded.collection_extra.is_some() {
            log::warn!("dropping cell with multi-cell/atomic mismatch (schema drift)");
            return Ok(());
        }

        let cell = match source {
            CellSource::Live { value, ttl } => Cell::Live {
                timestamp,
                value,
                expiry: ttl,
            },
            CellSource::Dead(tombstone) => Cell::Dead(tombstone),
        };

        if let Some(element_key) = decoded.collection_extra {
            self.apply_to_pending_collection(
                decoded.is_static,
                decoded.clustering,
                decoded.cell_name,
                element_key,
                cell,
            )?;
            return Ok(());
        }

        let mutation = self
            .mutation
            .as_mut()
            .ok_or_else(|| malformed("cell event before row_start"))?;

        if decoded.is_static {
            mutation.partition.static_row.insert(decoded.cell_name, cell);
        } else {
            mutation
                .partition
                .row_mut(decoded.clustering)
                .cells
                .insert(decoded.cell_name, cell);
        }

        Ok(())
    }

    fn apply_to_pending_collection(
        &mut self,
        is_static: bool,
        clustering: Vec<Slice>,
        column_name: Vec<u8>,
        element_key: Slice,
        cell: Cell,
    ) -> Result<()> {
        let tag = PendingTag {
            is_static,
            clustering,
            column_name,
        };

        self.ensure_pending_tag(tag)?;

        if let Some(pending) = &mut self.pending {
            pending.data.elements.insert(element_key, cell);
        }

        Ok(())
    }

    /// Flushes the pending collection if its tag differs from `tag`,
    /// starting a fresh accumulator tagged `tag` either way.
    fn ensure_pending_tag(&mut self, tag: PendingTag) -> Result<()> {
        let needs_flush = self.pending.as_ref().is_some_and(|p| p.tag != tag);

        if needs_flush {
            self.flush_pending()?;
        }

        if self.pending.is_none() {
            self.pending = Some(Pending {
                tag,
                data: CollectionMutation::default(),
            });
        }

        Ok(())
    }

    /// Serializes the pending collection (if any) into the mutation,
    /// batched per §4.4.3 instead of merging cell-by-cell.
    fn flush_pending(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };

        let mutation = self
            .mutation
            .as_mut()
            .ok_or_else(|| malformed("pending collection with no active partition"))?;

        if pending.tag.is_static {
            mutation
                .partition
                .static_row
                .insert(pending.tag.column_name, Cell::Collection(pending.data));
        } else {
            mutation
                .partition
                .row_mut(pending.tag.clustering)
                .cells
                .insert(pending.tag.column_name, Cell::Collection(pending.data));
        }

        Ok(())
    }

    fn apply_range_tombstone(&mut self, start: &[u8], end: &[u8], deletion_time: Tombstone) -> Result<()> {
        let (_, start_rest) = clustering::strip_static_marker(start);

        let start_exploded = clustering::explode(start_rest, self.schema.is_compound())?;
        let end_exploded = clustering::explode(end, self.schema.is_compound())?;

        if end_exploded.last_marker != MARKER_END_OF_RANGE {
            return Err(malformed("range tombstone end lacks end-of-range marker"));
        }
        if !matches!(start_exploded.last_marker, MARKER_NONE | MARKER_START_OF_RANGE) {
            return Err(malformed("range tombstone start has an invalid marker"));
        }

        let arity = self.schema.clustering_arity();
        let start_prefix_len = start_exploded.components.len().min(arity);
        let end_prefix_len = end_exploded.components.len().min(arity);

        let start_prefix = start_exploded
            .components
            .get(..start_prefix_len)
            .unwrap_or(&[]);
        let end_prefix = end_exploded.components.get(..end_prefix_len).unwrap_or(&[]);

        if start_prefix_len != end_prefix_len || start_prefix != end_prefix {
            return Err(Error::NotImplemented(NotImplementedCause::RangeDeletes));
        }

        let mutation = self
            .mutation
            .as_mut()
            .ok_or_else(|| malformed("range tombstone before row_start"))?;

        if start_exploded.components.len() <= arity {
            mutation.partition.range_tombstones.insert(RangeTombstoneEntry {
                prefix: start_prefix.to_vec(),
                deletion: deletion_time,
            });
            return Ok(());
        }

        // One extra component: a multi-cell column name — a collection-wide
        // tombstone nested under this clustering prefix.
        let column_name = start_exploded
            .components
            .get(arity)
            .ok_or_else(|| malformed("range tombstone missing column component"))?;

        let Some(cdef) = self.schema.column(column_name) else {
            log::warn!("dropping range tombstone for unknown column (schema drift)");
            return Ok(());
        };

        if !cdef.column_type.is_multi_cell() {
            log::warn!("dropping range tombstone targeting a non-collection column");
            return Ok(());
        }

        if deletion_time.timestamp <= cdef.dropped_at {
            log::warn!("dropping range tombstone written before its column was dropped");
            return Ok(());
        }

        let tag = PendingTag {
            is_static: false,
            clustering: start_prefix.to_vec(),
            column_name: column_name.to_vec(),
        };

        self.ensure_pending_tag(tag)?;

        if let Some(pending) = &mut self.pending {
            pending.data.collection_tombstone = Some(deletion_time);
        }

        Ok(())
    }
}

enum CellSource {
    Live { value: Slice, ttl: Option<(u32, i64)> },
    Dead(Tombstone),
}
