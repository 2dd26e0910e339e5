// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The key reader (§4.5): yields decorated keys only, skipping cell
//! bodies entirely, bucket by bucket.

use crate::{
    error::{Error, NotImplementedCause, Result},
    fs::FileSystem,
    key::{DecoratedKey, RingPosition},
    range::{Bound, Range},
    sstable::{index::IndexEntry, Sstable},
};

/// A lazy sequence of decorated keys over a range of summary buckets.
pub struct KeyReader<'s, FS: FileSystem> {
    sstable: &'s Sstable<FS>,
    current_bucket: usize,
    last_bucket: usize,
    buffer: std::vec::IntoIter<IndexEntry>,
    lower: Option<Bound<RingPosition>>,
    upper: Option<Bound<RingPosition>>,
    exhausted: bool,
}

impl<'s, FS: FileSystem> KeyReader<'s, FS> {
    /// Opens a key reader over every partition whose ring position lies in
    /// `range`. `range` must not wrap.
    pub fn new(sstable: &'s Sstable<FS>, range: &Range<RingPosition>) -> Result<Self> {
        if range.is_wrap_around(|a, b| a.cmp(b)) {
            return Err(Error::NotImplemented(NotImplementedCause::WrapAround));
        }

        let entries = sstable.summary_entries();

        if entries.is_empty() {
            return Ok(Self {
                sstable,
                current_bucket: 0,
                last_bucket: 0,
                buffer: Vec::new().into_iter(),
                lower: range.start().cloned(),
                upper: range.end().cloned(),
                exhausted: true,
            });
        }

        let start_bucket = range
            .start()
            .map(|bound| Self::bucket_for(entries, &bound.value))
            .unwrap_or(0);

        let end_bucket = range
            .end()
            .map(|bound| Self::bucket_for(entries, &bound.value))
            .unwrap_or(entries.len() - 1);

        let mut reader = Self {
            sstable,
            current_bucket: start_bucket,
            last_bucket: end_bucket,
            buffer: Vec::new().into_iter(),
            lower: range.start().cloned(),
            upper: range.end().cloned(),
            exhausted: start_bucket > end_bucket,
        };

        reader.load_bucket()?;
        Ok(reader)
    }

    fn bucket_for(entries: &[crate::sstable::summary::SummaryEntry], pos: &RingPosition) -> usize {
        let idx = crate::binary_search::partition_point(entries, |e| {
            RingPosition::Key(e.first_key.clone()).cmp(pos) == std::cmp::Ordering::Less
        });
        idx.saturating_sub(1)
    }

    fn load_bucket(&mut self) -> Result<()> {
        if self.current_bucket > self.last_bucket {
            self.exhausted = true;
            self.buffer = Vec::new().into_iter();
            return Ok(());
        }

        let index = self.sstable.load_index_bucket(self.current_bucket)?;
        let mut entries = index.entries;

        if self.current_bucket == 0 {
            if let Some(lower) = &self.lower {
                entries.retain(|e| {
                    let ord = RingPosition::Key(e.key.clone()).cmp(&lower.value);
                    if lower.inclusive {
                        ord != std::cmp::Ordering::Less
                    } else {
                        ord == std::cmp::Ordering::Greater
                    }
                });
            }
        }

        if self.current_bucket == self.last_bucket {
            if let Some(upper) = &self.upper {
                entries.retain(|e| {
                    let ord = RingPosition::Key(e.key.clone()).cmp(&upper.value);
                    if upper.inclusive {
                        ord != std::cmp::Ordering::Greater
                    } else {
                        ord == std::cmp::Ordering::Less
                    }
                });
            }
        }

        self.buffer = entries.into_iter();
        Ok(())
    }
}

impl<FS: FileSystem> Iterator for KeyReader<'_, FS> {
    type Item = Result<DecoratedKey>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return None;
            }

            if let Some(entry) = self.buffer.next() {
                return Some(Ok(entry.key));
            }

            if self.current_bucket >= self.last_bucket {
                self.exhausted = true;
                return None;
            }

            self.current_bucket += 1;
            if let Err(e) = self.load_bucket() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::{
        coding::Encode,
        fs::StdFileSystem,
        range::Bound,
        slice::Slice,
        sstable::{
            index::{IndexEntry, IndexList},
            summary::{Summary, SummaryEntry},
        },
        token::{Partitioner, Token, Xxh3Partitioner},
    };
    use tempfile::TempDir;
    use test_log::test;

    fn decorated(key: &str) -> DecoratedKey {
        DecoratedKey::new(
            Token::from_raw(Xxh3Partitioner.token(key.as_bytes()).raw()),
            Slice::from(key.as_bytes()),
        )
    }

    fn build_fixture(dir: &TempDir, keys: &[&str]) -> Sstable<StdFileSystem> {
        let mut entries: Vec<IndexEntry> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| IndexEntry {
                key: decorated(key),
                data_file_position: i as u64 * 10,
                promoted_index: None,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let index_list = IndexList { entries: entries.clone() };
        let index_path = dir.path().join("index.db");
        std::fs::write(&index_path, index_list.encode_into_vec()).unwrap();

        let summary = Summary {
            entries: vec![SummaryEntry {
                first_key: entries[0].key.clone(),
                index_file_position: 0,
            }],
        };
        let summary_path = dir.path().join("summary.db");
        std::fs::write(&summary_path, summary.encode_into_vec()).unwrap();

        let data_path = dir.path().join("data.db");
        std::fs::write(&data_path, []).unwrap();

        Sstable::<StdFileSystem>::open(&summary_path, &index_path, &data_path, None).unwrap()
    }

    #[test]
    fn yields_keys_in_order_over_full_range() {
        let dir = TempDir::new().unwrap();
        let sstable = build_fixture(&dir, &["k1", "k2", "k3"]);

        let reader = KeyReader::new(&sstable, &Range::all()).unwrap();
        let keys: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(keys.len(), 3);

        for pair in keys.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn narrows_to_bound() {
        let dir = TempDir::new().unwrap();
        let keys = ["k1", "k2", "k3", "k4"];
        let sstable = build_fixture(&dir, &keys);

        let mut sorted: Vec<DecoratedKey> = keys.iter().map(|k| decorated(k)).collect();
        sorted.sort();

        let range = Range::new(
            Some(Bound::new(RingPosition::Key(sorted[1].clone()), true)),
            None,
        );

        let reader = KeyReader::new(&sstable, &range).unwrap();
        let out: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].key(), sorted[1].key());
    }

    #[test]
    fn excludes_an_exclusive_start_bound() {
        let dir = TempDir::new().unwrap();
        let keys = ["k1", "k2", "k3", "k4"];
        let sstable = build_fixture(&dir, &keys);

        let mut sorted: Vec<DecoratedKey> = keys.iter().map(|k| decorated(k)).collect();
        sorted.sort();

        let range = Range::new(
            Some(Bound::new(RingPosition::Key(sorted[1].clone()), false)),
            None,
        );

        let reader = KeyReader::new(&sstable, &range).unwrap();
        let out: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        let out_keys: Vec<_> = out.iter().map(DecoratedKey::key).collect();
        let expected: Vec<_> = sorted[2..].iter().map(DecoratedKey::key).collect();
        assert_eq!(out_keys, expected);
    }

    #[test]
    fn includes_an_inclusive_end_bound() {
        let dir = TempDir::new().unwrap();
        let keys = ["k1", "k2", "k3", "k4"];
        let sstable = build_fixture(&dir, &keys);

        let mut sorted: Vec<DecoratedKey> = keys.iter().map(|k| decorated(k)).collect();
        sorted.sort();

        let range = Range::new(
            None,
            Some(Bound::new(RingPosition::Key(sorted[2].clone()), true)),
        );

        let reader = KeyReader::new(&sstable, &range).unwrap();
        let out: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        let out_keys: Vec<_> = out.iter().map(DecoratedKey::key).collect();
        let expected: Vec<_> = sorted[..3].iter().map(DecoratedKey::key).collect();
        assert_eq!(out_keys, expected);
    }

    #[test]
    fn excludes_an_exclusive_end_bound() {
        let dir = TempDir::new().unwrap();
        let keys = ["k1", "k2", "k3", "k4"];
        let sstable = build_fixture(&dir, &keys);

        let mut sorted: Vec<DecoratedKey> = keys.iter().map(|k| decorated(k)).collect();
        sorted.sort();

        let range = Range::new(
            None,
            Some(Bound::new(RingPosition::Key(sorted[2].clone()), false)),
        );

        let reader = KeyReader::new(&sstable, &range).unwrap();
        let out: Vec<_> = reader.collect::<Result<Vec<_>>>().unwrap();
        let out_keys: Vec<_> = out.iter().map(DecoratedKey::key).collect();
        let expected: Vec<_> = sorted[..2].iter().map(DecoratedKey::key).collect();
        assert_eq!(out_keys, expected);
    }
}
