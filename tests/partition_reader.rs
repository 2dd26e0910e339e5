// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{BigEndian, WriteBytesExt};
use rustc_hash::FxHashMap;
use sstable_reader::{
    coding::Encode,
    fs::StdFileSystem,
    key::{DecoratedKey, RingPosition},
    mutation::Cell,
    partition_reader,
    range::{Bound, Range},
    schema::{AtomicType, CollectionType, ColumnDefinition, ColumnKind, ColumnType},
    slice::Slice,
    sstable::{
        index::{IndexEntry, IndexList},
        summary::{Summary, SummaryEntry},
        Sstable,
    },
    token::{Partitioner, Token, Xxh3Partitioner},
    Schema,
};
use tempfile::TempDir;
use test_log::test;

const MARKER_NONE: u8 = 0;

fn write_blob(buf: &mut Vec<u8>, bytes: &[u8]) {
    #[allow(clippy::cast_possible_truncation)]
    buf.write_u32::<BigEndian>(bytes.len() as u32).unwrap();
    buf.extend_from_slice(bytes);
}

fn composite_name(components: &[&[u8]], last_marker: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, component) in components.iter().enumerate() {
        let marker = if i + 1 == components.len() { last_marker } else { MARKER_NONE };
        #[allow(clippy::cast_possible_truncation)]
        let len = component.len() as u16;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(component);
        out.push(marker);
    }
    out
}

fn write_cell(buf: &mut Vec<u8>, clustering: &[&[u8]], column: &[u8], value: &[u8], ts: i64) {
    buf.write_u8(1).unwrap(); // TAG_CELL
    let mut components: Vec<&[u8]> = clustering.to_vec();
    components.push(column);
    write_blob(buf, &composite_name(&components, MARKER_NONE));
    buf.write_u8(0).unwrap(); // no ttl
    buf.write_i64::<BigEndian>(ts).unwrap();
    write_blob(buf, value);
}

fn write_collection_cell(buf: &mut Vec<u8>, clustering: &[&[u8]], column: &[u8], element: &[u8], value: &[u8], ts: i64) {
    buf.write_u8(1).unwrap(); // TAG_CELL
    let mut components: Vec<&[u8]> = clustering.to_vec();
    components.push(column);
    components.push(element);
    write_blob(buf, &composite_name(&components, MARKER_NONE));
    buf.write_u8(0).unwrap(); // no ttl
    buf.write_i64::<BigEndian>(ts).unwrap();
    write_blob(buf, value);
}

fn write_deleted_collection_cell(buf: &mut Vec<u8>, clustering: &[&[u8]], column: &[u8], element: &[u8], ts: i64) {
    buf.write_u8(2).unwrap(); // TAG_DELETED_CELL
    let mut components: Vec<&[u8]> = clustering.to_vec();
    components.push(column);
    components.push(element);
    write_blob(buf, &composite_name(&components, MARKER_NONE));
    buf.write_i64::<BigEndian>(ts).unwrap(); // timestamp
    buf.write_i64::<BigEndian>(ts).unwrap(); // local_deletion_time
}

fn write_range_tombstone(buf: &mut Vec<u8>, clustering: &[u8], ts: i64) {
    const MARKER_END_OF_RANGE: u8 = 1;

    buf.write_u8(3).unwrap(); // TAG_RANGE_TOMBSTONE
    write_blob(buf, &composite_name(&[clustering], MARKER_NONE));
    write_blob(buf, &composite_name(&[clustering], MARKER_END_OF_RANGE));
    buf.write_i64::<BigEndian>(ts).unwrap(); // timestamp
    buf.write_i64::<BigEndian>(ts).unwrap(); // local_deletion_time
}

fn decorated(key: &str) -> DecoratedKey {
    DecoratedKey::new(Token::from_raw(Xxh3Partitioner.token(key.as_bytes()).raw()), key.as_bytes().into())
}

fn schema() -> Schema {
    let mut cols = FxHashMap::default();
    cols.insert(
        b"v".to_vec(),
        ColumnDefinition {
            kind: ColumnKind::Regular,
            column_type: ColumnType::Atomic(AtomicType::Text),
            dropped_at: 0,
        },
    );
    Schema::new(1, cols, true, false, None)
}

fn schema_with_collection() -> Schema {
    let mut cols = FxHashMap::default();
    cols.insert(
        b"m".to_vec(),
        ColumnDefinition {
            kind: ColumnKind::Regular,
            column_type: ColumnType::Collection(CollectionType::Map),
            dropped_at: 0,
        },
    );
    Schema::new(1, cols, true, false, None)
}

/// Lays out a single-bucket SSTable fixture: one summary entry, one dense
/// index bucket, `partitions` written back to back in the data file.
fn build_fixture(dir: &TempDir, partitions: &[(&str, Vec<u8>)]) -> Sstable<StdFileSystem> {
    let mut data = Vec::new();
    let mut offsets = Vec::new();

    for (key, body) in partitions {
        offsets.push(data.len() as u64);
        write_blob(&mut data, key.as_bytes());
        data.extend_from_slice(body);
    }

    let data_path = dir.path().join("data.db");
    std::fs::write(&data_path, &data).unwrap();

    let mut entries: Vec<IndexEntry> = partitions
        .iter()
        .zip(offsets)
        .map(|((key, _), pos)| IndexEntry {
            key: decorated(key),
            data_file_position: pos,
            promoted_index: None,
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));

    let index_path = dir.path().join("index.db");
    std::fs::write(&index_path, IndexList { entries: entries.clone() }.encode_into_vec()).unwrap();

    let summary_path = dir.path().join("summary.db");
    let summary = Summary {
        entries: vec![SummaryEntry {
            first_key: entries[0].key.clone(),
            index_file_position: 0,
        }],
    };
    std::fs::write(&summary_path, summary.encode_into_vec()).unwrap();

    Sstable::<StdFileSystem>::open(&summary_path, &index_path, &data_path, None).unwrap()
}

#[test]
fn reads_a_clustered_row_with_two_cells() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema();

    let mut body = Vec::new();
    body.write_u8(0)?; // no partition tombstone
    write_cell(&mut body, &[b"c1"], b"v", b"hello", 5);
    body.write_u8(0)?; // TAG_ROW_END

    let sstable = build_fixture(&dir, &[("pk1", body)]);

    let mutation = partition_reader::read_row(&sstable, &schema, &decorated("pk1"))?.expect("present");
    assert_eq!(&*mutation.partition_key, b"pk1");

    let row = mutation.partition.rows.values().next().expect("one row");
    match row.cells.get(b"v".as_slice()) {
        Some(Cell::Live { value, timestamp, .. }) => {
            assert_eq!(&**value, b"hello");
            assert_eq!(*timestamp, 5);
        }
        other => panic!("unexpected {other:?}"),
    }

    Ok(())
}

#[test]
fn absent_key_returns_none_and_counts_a_bloom_false_positive() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema();

    let mut body = Vec::new();
    body.write_u8(0)?;
    write_cell(&mut body, &[b"c1"], b"v", b"hello", 5);
    body.write_u8(0)?;

    let sstable = build_fixture(&dir, &[("pk1", body)]);
    assert_eq!(sstable.false_positive_count(), 0);

    let missing = decorated("does_not_exist");
    let result = partition_reader::read_row(&sstable, &schema, &missing)?;
    assert!(result.is_none());

    // No bloom filter was attached to this fixture, so `bloom_may_contain`
    // is vacuously true and the miss is recorded as a false positive.
    assert_eq!(sstable.false_positive_count(), 1);

    Ok(())
}

#[test]
fn read_rows_iterates_every_partition_in_file_order() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema();

    let mut partitions = Vec::new();
    for key in ["k1", "k2", "k3"] {
        let mut body = Vec::new();
        body.write_u8(0)?;
        write_cell(&mut body, &[b"c1"], b"v", b"x", 1);
        body.write_u8(0)?;
        partitions.push((key, body));
    }

    let sstable = build_fixture(&dir, &partitions);

    let keys: Vec<Vec<u8>> = partition_reader::read_rows(&sstable, &schema)?
        .collect::<sstable_reader::Result<Vec<_>>>()?
        .iter()
        .map(|m| m.partition_key.to_vec())
        .collect();

    assert_eq!(keys.len(), 3);
    let mut expected: Vec<Vec<u8>> = partitions.iter().map(|(k, _)| k.as_bytes().to_vec()).collect();
    expected.sort();
    let mut actual = keys;
    actual.sort();
    assert_eq!(actual, expected);

    Ok(())
}

#[test]
fn read_range_rows_excludes_the_upper_bound() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema();

    let keys = ["k1", "k2", "k3", "k4"];
    let mut partitions = Vec::new();
    for key in keys {
        let mut body = Vec::new();
        body.write_u8(0)?;
        write_cell(&mut body, &[b"c1"], b"v", b"x", 1);
        body.write_u8(0)?;
        partitions.push((key, body));
    }

    let sstable = build_fixture(&dir, &partitions);

    let mut sorted: Vec<DecoratedKey> = keys.iter().map(|k| decorated(k)).collect();
    sorted.sort();

    let range = Range::new(
        Some(Bound::new(RingPosition::Key(sorted[0].clone()), true)),
        Some(Bound::new(RingPosition::Key(sorted[2].clone()), false)),
    );

    let results: Vec<_> = partition_reader::read_range_rows(&sstable, &schema, &range)?
        .collect::<sstable_reader::Result<Vec<_>>>()?;

    let returned: Vec<Vec<u8>> = results.iter().map(|m| m.partition_key.to_vec()).collect();
    let expected: Vec<Vec<u8>> = sorted[..2].iter().map(|k| k.key().to_vec()).collect();
    assert_eq!(returned, expected);

    Ok(())
}

#[test]
fn static_row_cell_is_not_attached_to_any_clustered_row() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema();

    let mut body = Vec::new();
    body.write_u8(0)?; // no partition tombstone

    body.write_u8(1)?; // TAG_CELL
    let mut static_name = vec![0xFFu8, 0xFF];
    static_name.extend_from_slice(&composite_name(&[b"v"], MARKER_NONE));
    write_blob(&mut body, &static_name);
    body.write_u8(0)?; // no ttl
    body.write_i64::<BigEndian>(3)?;
    write_blob(&mut body, b"static_value");

    body.write_u8(0)?; // TAG_ROW_END

    let sstable = build_fixture(&dir, &[("pk1", body)]);

    let mutation = partition_reader::read_row(&sstable, &schema, &decorated("pk1"))?.expect("present");
    assert!(mutation.partition.rows.is_empty());

    match mutation.partition.static_row.get(b"v".as_slice()) {
        Some(Cell::Live { value, .. }) => assert_eq!(&**value, b"static_value"),
        other => panic!("unexpected {other:?}"),
    }

    Ok(())
}

#[test]
fn multi_cell_collection_batches_a_live_and_a_dead_element() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema_with_collection();

    let mut body = Vec::new();
    body.write_u8(0)?; // no partition tombstone
    write_collection_cell(&mut body, &[b"p"], b"m", b"a", b"1", 5);
    write_deleted_collection_cell(&mut body, &[b"p"], b"m", b"b", 6);
    body.write_u8(0)?; // TAG_ROW_END

    let sstable = build_fixture(&dir, &[("pk1", body)]);

    let mutation = partition_reader::read_row(&sstable, &schema, &decorated("pk1"))?.expect("present");
    let row = mutation.partition.rows.values().next().expect("one row");

    match row.cells.get(b"m".as_slice()) {
        Some(Cell::Collection(coll)) => {
            assert_eq!(coll.elements.len(), 2);
            assert!(matches!(coll.elements.get(b"a".as_ref()), Some(Cell::Live { .. })));
            assert!(matches!(coll.elements.get(b"b".as_ref()), Some(Cell::Dead(_))));
        }
        other => panic!("unexpected {other:?}"),
    }

    Ok(())
}

#[test]
fn range_tombstone_covers_every_key_sharing_its_clustering_prefix() -> sstable_reader::Result<()> {
    let dir = TempDir::new()?;
    let schema = schema();

    let mut body = Vec::new();
    body.write_u8(0)?; // no partition tombstone
    write_range_tombstone(&mut body, b"c1", 7);
    body.write_u8(0)?; // TAG_ROW_END

    let sstable = build_fixture(&dir, &[("pk1", body)]);

    let mutation = partition_reader::read_row(&sstable, &schema, &decorated("pk1"))?.expect("present");
    assert_eq!(mutation.partition.range_tombstones.len(), 1);

    let entry = mutation.partition.range_tombstones.iter().next().expect("one tombstone");
    assert!(entry.covers(&[Slice::from(b"c1".as_slice())]));

    Ok(())
}
