// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Composite column-name decoding.
//!
//! A composite name is a sequence of length-prefixed components, each
//! followed by a one-byte "end-of-component" marker. The marker is `0` on
//! every component except possibly the last, where a range tombstone may
//! carry `1` (end-of-range) or `0xFF` (start-of-range). The decoder only
//! cares about raw bytes; typed interpretation is deferred to the row
//! consumer and schema.

use crate::{
    error::{malformed, Error, Result},
    slice::Slice,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// A composite name exploded into its components.
#[derive(Debug, Clone, Default)]
pub struct Exploded {
    /// The name's components, in order.
    pub components: Vec<Slice>,
    /// The end-of-component marker carried by the last component, if any.
    /// `0` (none) for ordinary cell/clustering names.
    pub last_marker: u8,
}

/// End-of-component marker meaning "ordinary component".
pub const MARKER_NONE: u8 = 0;
/// End-of-component marker meaning "this composite bounds a range from above".
pub const MARKER_END_OF_RANGE: u8 = 1;
/// End-of-component marker meaning "this composite bounds a range from below".
pub const MARKER_START_OF_RANGE: u8 = 0xFF;

/// The fixed 2-byte prefix marking a composite name as belonging to the
/// static row.
pub const STATIC_MARKER: [u8; 2] = [0xFF, 0xFF];

/// Strips the static-row marker from `name` if present.
///
/// Returns `(is_static, remainder)`.
#[must_use]
pub fn strip_static_marker(name: &[u8]) -> (bool, &[u8]) {
    match name.get(0..2) {
        Some(prefix) if prefix == STATIC_MARKER => (true, name.get(2..).unwrap_or(&[])),
        _ => (false, name),
    }
}

/// Explodes a raw composite name into its components.
///
/// When `compound` is `false` the schema has a single clustering/cell
/// component with no length-prefix framing, so the whole buffer is taken
/// as one component verbatim.
pub fn explode(bytes: &[u8], compound: bool) -> Result<Exploded> {
    if !compound {
        return Ok(Exploded {
            components: vec![Slice::from(bytes)],
            last_marker: MARKER_NONE,
        });
    }

    let mut cursor = Cursor::new(bytes);
    let mut components = Vec::new();
    let mut last_marker = MARKER_NONE;

    while (cursor.position() as usize) < bytes.len() {
        let len = cursor
            .read_u16::<BigEndian>()
            .map_err(|_| malformed("truncated composite component length"))?;

        let mut buf = vec![0u8; len as usize];
        cursor
            .read_exact(&mut buf)
            .map_err(|_| malformed("truncated composite component value"))?;

        let marker = cursor
            .read_u8()
            .map_err(|_| malformed("truncated composite end-of-component marker"))?;

        components.push(Slice::from(&buf));
        last_marker = marker;
    }

    Ok(Exploded {
        components,
        last_marker,
    })
}

/// Encodes components back into the wire composite format. Test-only
/// helper: this crate never writes SSTables, but fixture construction
/// needs the inverse of [`explode`].
#[cfg(test)]
pub(crate) fn build(components: &[&[u8]], last_marker: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, component) in components.iter().enumerate() {
        let marker = if i + 1 == components.len() {
            last_marker
        } else {
            MARKER_NONE
        };

        #[allow(clippy::cast_possible_truncation)]
        let len = component.len() as u16;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(component);
        out.push(marker);
    }
    out
}

/// Validates that `components` never exceeds `max_len`, as required by the
/// row consumer's format-error check.
pub fn ensure_max_components(components: &Exploded, max_len: usize) -> Result<()> {
    if components.components.len() > max_len {
        return Err(Error::MalformedSstable(format!(
            "composite name has {} components, schema allows at most {max_len}",
            components.components.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn static_marker_round_trip() {
        let mut name = STATIC_MARKER.to_vec();
        name.extend_from_slice(b"rest");
        let (is_static, remainder) = strip_static_marker(&name);
        assert!(is_static);
        assert_eq!(remainder, b"rest");
    }

    #[test]
    fn non_static_name_untouched() {
        let (is_static, remainder) = strip_static_marker(b"col");
        assert!(!is_static);
        assert_eq!(remainder, b"col");
    }

    #[test]
    fn explode_compound_round_trip() {
        let raw = build(&[b"c1", b"c2", b"col"], MARKER_NONE);
        let exploded = explode(&raw, true).expect("decodes");
        assert_eq!(exploded.components.len(), 3);
        assert_eq!(&*exploded.components[0], b"c1");
        assert_eq!(&*exploded.components[1], b"c2");
        assert_eq!(&*exploded.components[2], b"col");
        assert_eq!(exploded.last_marker, MARKER_NONE);
    }

    #[test]
    fn explode_non_compound_is_single_component() {
        let exploded = explode(b"single_col", false).expect("decodes");
        assert_eq!(exploded.components.len(), 1);
        assert_eq!(&*exploded.components[0], b"single_col");
    }

    #[test]
    fn explode_preserves_range_markers() {
        let raw = build(&[b"c1"], MARKER_START_OF_RANGE);
        let exploded = explode(&raw, true).expect("decodes");
        assert_eq!(exploded.last_marker, MARKER_START_OF_RANGE);

        let raw = build(&[b"c1"], MARKER_END_OF_RANGE);
        let exploded = explode(&raw, true).expect("decodes");
        assert_eq!(exploded.last_marker, MARKER_END_OF_RANGE);
    }

    #[test]
    fn explode_truncated_is_malformed() {
        let err = explode(&[0, 5, 1, 2], true).unwrap_err();
        assert!(matches!(err, Error::MalformedSstable(_)));
    }
}
