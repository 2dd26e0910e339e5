// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The sparse summary: one entry per index-file bucket, recording the
//! bucket's first key and its byte position in the index file.

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    key::DecoratedKey,
    token::Token,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// One sparse summary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// The first key of the bucket this entry describes.
    pub first_key: DecoratedKey,
    /// The bucket's byte position in the index file.
    pub index_file_position: u64,
}

impl Encode for SummaryEntry {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<BigEndian>(self.first_key.token().raw())?;

        #[allow(clippy::cast_possible_truncation)]
        let key_len = self.first_key.key().len() as u32;
        writer.write_u32::<BigEndian>(key_len)?;
        writer.write_all(self.first_key.key())?;
        writer.write_u64::<BigEndian>(self.index_file_position)?;
        Ok(())
    }
}

impl Decode for SummaryEntry {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let token = reader.read_u64::<BigEndian>()?;
        let key_len = reader.read_u32::<BigEndian>()?;

        let mut key = vec![0u8; key_len as usize];
        reader.read_exact(&mut key)?;

        let index_file_position = reader.read_u64::<BigEndian>()?;

        Ok(Self {
            first_key: DecoratedKey::new(Token::from_raw(token), key.into()),
            index_file_position,
        })
    }
}

/// The full sparse summary for one SSTable.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// Entries, sorted by `(token, key-bytes)`.
    pub entries: Vec<SummaryEntry>,
}

impl Encode for Summary {
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

impl Decode for Summary {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let count = reader.read_u64::<BigEndian>()?;
        let mut entries = Vec::with_capacity(count as usize);

        for _ in 0..count {
            entries.push(SummaryEntry::decode_from(reader)?);
        }

        Ok(Self { entries })
    }
}
