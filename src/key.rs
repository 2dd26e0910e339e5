// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Decorated keys and ring positions.

use crate::{slice::Slice, token::Token};
use std::cmp::Ordering;

/// A partition key together with its ring [`Token`].
///
/// Ordering is lexicographic on `(token, key bytes)`, as required by
/// the on-disk summary/index invariants.
#[derive(Debug, Clone)]
pub struct DecoratedKey {
    token: Token,
    key: Slice,
}

impl DecoratedKey {
    /// Builds a decorated key from an already-computed token.
    #[must_use]
    pub const fn new(token: Token, key: Slice) -> Self {
        Self { token, key }
    }

    /// The key's ring token.
    #[must_use]
    pub const fn token(&self) -> Token {
        self.token
    }

    /// The raw partition-key bytes.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The raw partition-key bytes as a cheaply-cloneable [`Slice`].
    #[must_use]
    pub fn key_slice(&self) -> Slice {
        self.key.clone()
    }
}

impl PartialEq for DecoratedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DecoratedKey {}

impl PartialOrd for DecoratedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecoratedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token
            .cmp(&other.token)
            .then_with(|| (*self.key).cmp(&*other.key))
    }
}

/// Which side of a token a [`RingPosition::TokenBound`] sits on, used to
/// express range endpoints without materializing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRelation {
    /// Sorts before every decorated key with this token.
    BeforeAllKeys,
    /// Sorts after every decorated key with this token.
    AfterAllKeys,
}

/// A range endpoint: either a concrete decorated key, or a bare token with
/// a relation to the keys that share it.
#[derive(Debug, Clone)]
pub enum RingPosition {
    /// An exact decorated key.
    Key(DecoratedKey),
    /// A token with a before/after relation to its keys.
    TokenBound(Token, TokenRelation),
}

impl RingPosition {
    /// The token this position is anchored to.
    #[must_use]
    pub const fn token(&self) -> Token {
        match self {
            Self::Key(k) => k.token(),
            Self::TokenBound(t, _) => *t,
        }
    }
}

impl PartialEq for RingPosition {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RingPosition {}

impl PartialOrd for RingPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RingPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token().cmp(&other.token()).then_with(|| {
            // Within one token: BeforeAllKeys < any key < AfterAllKeys.
            fn rank(p: &RingPosition) -> (u8, Option<&Slice>) {
                match p {
                    RingPosition::TokenBound(_, TokenRelation::BeforeAllKeys) => (0, None),
                    RingPosition::Key(k) => (1, Some(&k.key)),
                    RingPosition::TokenBound(_, TokenRelation::AfterAllKeys) => (2, None),
                }
            }

            let (ra, ka) = rank(self);
            let (rb, kb) = rank(other);

            ra.cmp(&rb).then_with(|| match (ka, kb) {
                (Some(a), Some(b)) => (**a).cmp(&**b),
                _ => Ordering::Equal,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn key(token: u64, bytes: &[u8]) -> DecoratedKey {
        DecoratedKey::new(Token::from_raw(token), bytes.into())
    }

    #[test]
    fn orders_by_token_then_bytes() {
        let a = key(1, b"a");
        let b = key(1, b"b");
        let c = key(2, b"a");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn token_bound_brackets_same_token_keys() {
        let before = RingPosition::TokenBound(Token::from_raw(5), TokenRelation::BeforeAllKeys);
        let after = RingPosition::TokenBound(Token::from_raw(5), TokenRelation::AfterAllKeys);
        let k = RingPosition::Key(key(5, b"mid"));
        assert!(before < k);
        assert!(k < after);
    }
}
