// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The dense per-bucket index: every key in one summary bucket, with its
//! data-file byte position and an optional promoted index (opaque to this
//! crate — it is forwarded to the row consumer unparsed).

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    key::DecoratedKey,
    slice::Slice,
    token::Token,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// One dense index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The partition key this entry describes.
    pub key: DecoratedKey,
    /// The partition's byte position in the data file.
    pub data_file_position: u64,
    /// An opaque promoted index blob, present when the partition is large
    /// enough that the writer emitted clustering-level shortcuts.
    pub promoted_index: Option<Slice>,
}

impl Encode for IndexEntry {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<BigEndian>(self.key.token().raw())?;

        #[allow(clippy::cast_possible_truncation)]
        let key_len = self.key.key().len() as u32;
        writer.write_u32::<BigEndian>(key_len)?;
        writer.write_all(self.key.key())?;
        writer.write_u64::<BigEndian>(self.data_file_position)?;

        match &self.promoted_index {
            Some(blob) => {
                #[allow(clippy::cast_possible_truncation)]
                let len = blob.len() as u32;
                writer.write_u32::<BigEndian>(len)?;
                writer.write_all(blob)?;
            }
            None => writer.write_u32::<BigEndian>(0)?,
        }

        Ok(())
    }
}

impl Decode for IndexEntry {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let token = reader.read_u64::<BigEndian>()?;
        let key_len = reader.read_u32::<BigEndian>()?;

        let mut key = vec![0u8; key_len as usize];
        reader.read_exact(&mut key)?;

        let data_file_position = reader.read_u64::<BigEndian>()?;

        let promoted_len = reader.read_u32::<BigEndian>()?;
        let promoted_index = if promoted_len == 0 {
            None
        } else {
            let mut buf = vec![0u8; promoted_len as usize];
            reader.read_exact(&mut buf)?;
            Some(Slice::from(&buf))
        };

        Ok(Self {
            key: DecoratedKey::new(Token::from_raw(token), key.into()),
            data_file_position,
            promoted_index,
        })
    }
}

/// One summary bucket's dense index entries, sorted by `(token, key-bytes)`.
#[derive(Debug, Clone, Default)]
pub struct IndexList {
    /// The bucket's entries.
    pub entries: Vec<IndexEntry>,
}

impl Encode for IndexList {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let count = self.entries.len() as u64;
        writer.write_u64::<BigEndian>(count)?;

        for entry in &self.entries {
            entry.encode_into(writer)?;
        }
        Ok(())
    }
}

impl Decode for IndexList {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let count = reader.read_u64::<BigEndian>()?;
        let mut entries = Vec::with_capacity(count as usize);

        for _ in 0..count {
            entries.push(IndexEntry::decode_from(reader)?);
        }

        Ok(Self { entries })
    }
}
