// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An open SSTable: its summary, bloom filter, and the machinery to
//! resolve a range endpoint to a data-file byte position (§4.3's
//! "position resolution").

pub mod format;
pub mod index;
pub mod search;
pub mod summary;

use crate::{
    bloom::BloomFilter,
    coding::Decode,
    fs::FileSystem,
    key::{DecoratedKey, RingPosition},
    sstable::{index::IndexList, summary::Summary},
};
use std::{
    cmp::Ordering,
    io::{BufReader, Read, Seek, SeekFrom},
    marker::PhantomData,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
};

/// Which side of a search a [`Sstable::resolve_position`] call is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// `lower_bound`: the first position at or after the target.
    Start,
    /// `upper_bound`: the first position strictly after the target.
    End,
}

/// An open SSTable handle: shared-owned by every reader over it (§5).
pub struct Sstable<FS> {
    data_path: PathBuf,
    index_path: PathBuf,
    summary: Summary,
    bloom: Option<BloomFilter>,
    false_positives: AtomicU64,
    _fs: PhantomData<FS>,
}

impl<FS: FileSystem> Sstable<FS> {
    /// Opens an SSTable given its summary, index, data, and (optional)
    /// bloom-filter file paths.
    pub fn open(
        summary_path: &std::path::Path,
        index_path: &std::path::Path,
        data_path: &std::path::Path,
        bloom_path: Option<&std::path::Path>,
    ) -> crate::Result<Self> {
        let summary_bytes = FS::read(summary_path)?;
        let summary = Summary::decode_from(&mut summary_bytes.as_slice())?;

        let bloom = match bloom_path {
            Some(path) if FS::exists(path)? => {
                let bytes = FS::read(path)?;
                Some(BloomFilter::decode_from(&mut bytes.as_slice())?)
            }
            _ => None,
        };

        Ok(Self {
            data_path: data_path.to_path_buf(),
            index_path: index_path.to_path_buf(),
            summary,
            bloom,
            false_positives: AtomicU64::new(0),
            _fs: PhantomData,
        })
    }

    /// Whether the bloom filter (if any) says `key` might be present.
    /// Absence of a bloom filter always returns `true`.
    #[must_use]
    pub fn bloom_may_contain(&self, key: &[u8]) -> bool {
        self.bloom.as_ref().is_none_or(|b| b.contains(key))
    }

    /// Records that the bloom filter said "maybe" but the key search came
    /// up empty.
    pub fn record_false_positive(&self) {
        log::warn!("bloom filter false positive");
        self.false_positives.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// The number of bloom-filter false positives observed so far.
    #[must_use]
    pub fn false_positive_count(&self) -> u64 {
        self.false_positives.load(AtomicOrdering::Relaxed)
    }

    /// The data file's total size in bytes.
    pub fn data_size(&self) -> crate::Result<u64> {
        Ok(FS::open(&self.data_path)?.metadata()?.len())
    }

    /// The summary entries, for callers driving a full bucket walk (the
    /// key reader).
    #[must_use]
    pub fn summary_entries(&self) -> &[summary::SummaryEntry] {
        &self.summary.entries
    }

    /// Loads one summary bucket's dense index list.
    pub fn load_index_bucket(&self, bucket: usize) -> crate::Result<IndexList> {
        log::debug!("loading summary bucket {bucket}");

        let entry = self
            .summary
            .entries
            .get(bucket)
            .ok_or_else(|| crate::error::malformed("summary bucket index out of range"))?;

        let mut file = BufReader::new(FS::open(&self.index_path)?);
        file.seek(SeekFrom::Start(entry.index_file_position))?;
        Ok(IndexList::decode_from(&mut file)?)
    }

    /// Opens the data file positioned at `position`.
    pub fn open_data_at(&self, position: u64) -> crate::Result<BufReader<std::fs::File>> {
        let mut file = FS::open(&self.data_path)?;
        file.seek(SeekFrom::Start(position))?;
        Ok(BufReader::new(file))
    }

    /// The byte position just past the last entry of `bucket`: either the
    /// next summary bucket's first index entry's position, or the
    /// data-file size if `bucket` is the last one. The only cross-bucket
    /// read the reader performs (§4.3).
    pub fn data_end_position(&self, bucket: usize) -> crate::Result<u64> {
        if bucket + 1 >= self.summary.entries.len() {
            return self.data_size();
        }

        let next = self.load_index_bucket(bucket + 1)?;
        match next.entries.first() {
            Some(entry) => Ok(entry.data_file_position),
            None => self.data_size(),
        }
    }

    /// Resolves a range endpoint to a byte position in the data file.
    ///
    /// `pos = None` means an open bound: position `0` for [`Boundary::Start`],
    /// the data size for [`Boundary::End`].
    pub fn resolve_position(
        &self,
        pos: Option<&RingPosition>,
        boundary: Boundary,
    ) -> crate::Result<u64> {
        let Some(pos) = pos else {
            return match boundary {
                Boundary::Start => Ok(0),
                Boundary::End => self.data_size(),
            };
        };

        let Some(bucket) = self.summary_bucket_for(pos) else {
            return Ok(0);
        };

        let index = self.load_index_bucket(bucket)?;

        let idx = match boundary {
            Boundary::Start => crate::binary_search::partition_point(&index.entries, |e| {
                compare_key_to_position(&e.key, pos) == Ordering::Less
            }),
            Boundary::End => crate::binary_search::partition_point(&index.entries, |e| {
                compare_key_to_position(&e.key, pos) != Ordering::Greater
            }),
        };

        match index.entries.get(idx) {
            Some(entry) => Ok(entry.data_file_position),
            None => self.data_end_position(bucket),
        }
    }

    /// Finds "the bucket this ring position would fall into": summary
    /// search with a `less` comparator, decremented by one (§4.3).
    fn summary_bucket_for(&self, pos: &RingPosition) -> Option<usize> {
        let idx = crate::binary_search::partition_point(&self.summary.entries, |e| {
            compare_key_to_position(&e.first_key, pos) == Ordering::Less
        });
        idx.checked_sub(1)
    }

    /// Searches for an exact partition key, returning its data-file
    /// position, or `None` if the key is (believed to be) absent.
    ///
    /// Records a bloom-filter false positive when the filter admitted the
    /// key but the summary+index search came up empty.
    pub fn locate(&self, key: &DecoratedKey) -> crate::Result<Option<u64>> {
        if !self.bloom_may_contain(key.key()) {
            return Ok(None);
        }

        let summary_raw = search::binary_search(&self.summary.entries, key, |e| &e.first_key);
        let bucket = search::resolve_floor(summary_raw);

        if bucket < 0 {
            self.record_false_positive();
            return Ok(None);
        }

        #[allow(clippy::cast_sign_loss)]
        let bucket = bucket as usize;
        let index = self.load_index_bucket(bucket)?;

        let index_raw = search::binary_search(&index.entries, key, |e| &e.key);
        if index_raw < 0 {
            self.record_false_positive();
            return Ok(None);
        }

        #[allow(clippy::cast_sign_loss)]
        let entry = index
            .entries
            .get(index_raw as usize)
            .ok_or_else(|| crate::error::malformed("index search returned out-of-range entry"))?;

        Ok(Some(entry.data_file_position))
    }
}

fn compare_key_to_position(key: &DecoratedKey, pos: &RingPosition) -> Ordering {
    RingPosition::Key(key.clone()).cmp(pos)
}
