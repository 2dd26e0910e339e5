// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The filtering reader (§4.6): wraps a mutation sequence and a predicate,
//! skipping mutations the predicate rejects.

use crate::{error::Result, mutation::Mutation};

/// Wraps `inner`, yielding only mutations for which `predicate` returns
/// `true`. I/O failures from `inner` pass through unfiltered.
pub struct FilteringReader<I, P> {
    inner: I,
    predicate: P,
}

impl<I, P> FilteringReader<I, P>
where
    I: Iterator<Item = Result<Mutation>>,
    P: FnMut(&Mutation) -> bool,
{
    /// Wraps `inner` with `predicate`.
    pub const fn new(inner: I, predicate: P) -> Self {
        Self { inner, predicate }
    }
}

impl<I, P> Iterator for FilteringReader<I, P>
where
    I: Iterator<Item = Result<Mutation>>,
    P: FnMut(&Mutation) -> bool,
{
    type Item = Result<Mutation>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(mutation) if (self.predicate)(&mutation) => return Some(Ok(mutation)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::Slice;
    use test_log::test;

    #[test]
    fn drops_mutations_failing_predicate() {
        let source = vec![
            Ok(Mutation::new(Slice::from(b"k1".as_slice()))),
            Ok(Mutation::new(Slice::from(b"k2".as_slice()))),
            Ok(Mutation::new(Slice::from(b"k3".as_slice()))),
        ]
        .into_iter();

        let filtered = FilteringReader::new(source, |m: &Mutation| m.partition_key.as_ref() != b"k2");
        let keys: Vec<Vec<u8>> = filtered.map(|m| m.unwrap().partition_key.to_vec()).collect();

        assert_eq!(keys, vec![b"k1".to_vec(), b"k3".to_vec()]);
    }

    #[test]
    fn propagates_errors_unfiltered() {
        let source = vec![
            Ok(Mutation::new(Slice::from(b"k1".as_slice()))),
            Err(crate::error::Error::MalformedSstable("boom".into())),
        ]
        .into_iter();

        let mut filtered = FilteringReader::new(source, |_: &Mutation| false);
        assert!(filtered.next().unwrap().is_err());
    }
}
