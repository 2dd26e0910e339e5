// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Schema handed down by the higher (CQL) layer: clustering-key layout and
//! regular-column definitions. This crate never constructs a schema on its
//! own; it only consumes one.

use rustc_hash::FxHashMap;

/// An atomic (non-collection) column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicType {
    /// UTF-8 text.
    Text,
    /// Signed 64-bit integer.
    BigInt,
    /// Opaque byte blob.
    Blob,
    /// Boolean.
    Boolean,
}

/// A multi-cell collection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    /// Ordered list, keyed by an opaque element position.
    List,
    /// Set of unique element keys.
    Set,
    /// Map from element key to value.
    Map,
}

/// The closed variant of column types this crate understands (see the
/// design notes: no dynamic dispatch on column type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// A single-cell column.
    Atomic(AtomicType),
    /// A multi-cell column.
    Collection(CollectionType),
}

impl ColumnType {
    /// Whether this type is stored as a multi-cell collection.
    #[must_use]
    pub const fn is_multi_cell(self) -> bool {
        matches!(self, Self::Collection(_))
    }
}

/// What role a column plays in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Part of the partition key (not decoded by this crate directly).
    Partition,
    /// Part of the clustering key.
    Clustering,
    /// An ordinary value column.
    Regular,
    /// A value column that only applies to the static row.
    Static,
}

/// A regular (or static) column's definition.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    /// The column's role.
    pub kind: ColumnKind,
    /// The column's value type.
    pub column_type: ColumnType,
    /// Writes at or before this timestamp are treated as referring to a
    /// dropped column and silently discarded.
    pub dropped_at: i64,
}

/// Clustering/cell-name layout and column catalogue for one table.
#[derive(Debug, Clone)]
pub struct Schema {
    clustering_arity: usize,
    regular_columns: FxHashMap<Vec<u8>, ColumnDefinition>,
    is_compound: bool,
    is_dense: bool,
    dense_column_name: Option<Vec<u8>>,
}

impl Schema {
    /// Builds a new schema.
    ///
    /// `dense_column_name` must be `Some` when `is_dense` is `true`: dense
    /// schemas have exactly one regular column and no cell-name component
    /// names it on the wire (§4.4.1).
    #[must_use]
    pub fn new(
        clustering_arity: usize,
        regular_columns: FxHashMap<Vec<u8>, ColumnDefinition>,
        is_compound: bool,
        is_dense: bool,
        dense_column_name: Option<Vec<u8>>,
    ) -> Self {
        Self {
            clustering_arity,
            regular_columns,
            is_compound,
            is_dense,
            dense_column_name,
        }
    }

    /// The clustering key's arity (number of components).
    #[must_use]
    pub const fn clustering_arity(&self) -> usize {
        self.clustering_arity
    }

    /// Whether cell/clustering names use length-prefixed composite framing.
    #[must_use]
    pub const fn is_compound(&self) -> bool {
        self.is_compound
    }

    /// Whether this table has exactly one, unnamed, regular column.
    #[must_use]
    pub const fn is_dense(&self) -> bool {
        self.is_dense
    }

    /// The sole regular column's on-wire name in a dense schema. `None` if
    /// this schema isn't dense.
    #[must_use]
    pub fn dense_column_name(&self) -> Option<&[u8]> {
        self.dense_column_name.as_deref()
    }

    /// Looks up a regular/static column definition by its on-wire name.
    ///
    /// In a dense schema the cell-name component naming the regular column
    /// is absent on the wire; callers pass an empty slice and get back the
    /// table's sole column.
    #[must_use]
    pub fn column(&self, cell_name: &[u8]) -> Option<&ColumnDefinition> {
        if self.is_dense {
            let name = self.dense_column_name.as_deref()?;
            return self.regular_columns.get(name);
        }
        self.regular_columns.get(cell_name)
    }
}
