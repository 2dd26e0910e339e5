// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The summary/index binary-search contract (§4.2): a signed result that
//! distinguishes "found" from "not found, would sort here".

use crate::key::DecoratedKey;
use std::cmp::Ordering;

/// Searches `entries` (sorted by `key_of`) for `target`.
///
/// Returns:
/// - `i >= 0` when `entries[i]` matches `target` exactly;
/// - `-1` when `target` sorts before every entry;
/// - a value `<= -2` encoding the insertion point `gt` (`gt >= 1`, the
///   index `target` would be inserted before) as `-gt - 1`.
pub fn binary_search<T>(
    entries: &[T],
    target: &DecoratedKey,
    key_of: impl Fn(&T) -> &DecoratedKey,
) -> i64 {
    let gt = crate::binary_search::partition_point(entries, |e| key_of(e) < target);

    if let Some(entry) = entries.get(gt) {
        if key_of(entry) == target {
            return i64_from_usize(gt);
        }
    }

    -i64_from_usize(gt) - 1
}

/// Converts a raw [`binary_search`] result into "the bucket/entry this key
/// belongs to": the last entry whose key is `<=` the query key, or `-1` if
/// none is.
#[must_use]
pub fn resolve_floor(raw: i64) -> i64 {
    if raw < 0 {
        (-raw - 1) - 1
    } else {
        raw
    }
}

fn i64_from_usize(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::token::Token;
    use test_log::test;

    fn keys(tokens: &[u64]) -> Vec<DecoratedKey> {
        tokens
            .iter()
            .map(|&t| DecoratedKey::new(Token::from_raw(t), format!("k{t}").as_str().into()))
            .collect()
    }

    #[test]
    fn finds_exact_match() {
        let entries = keys(&[1, 2, 3, 4, 5]);
        let result = binary_search(&entries, &entries[2], |e| e);
        assert_eq!(result, 2);
    }

    #[test]
    fn before_first_is_negative_one() {
        let entries = keys(&[10, 20, 30]);
        let target = DecoratedKey::new(Token::from_raw(1), "k1".into());
        let result = binary_search(&entries, &target, |e| e);
        assert_eq!(result, -1);
    }

    #[test]
    fn not_found_encodes_insertion_point() {
        let entries = keys(&[10, 20, 30]);
        let target = DecoratedKey::new(Token::from_raw(25), "k25".into());
        let result = binary_search(&entries, &target, |e| e);
        // would insert before index 2 (gt=2) => -2-1 = -3
        assert_eq!(result, -3);
        assert_eq!(resolve_floor(result), 0);
    }

    #[test]
    fn not_found_after_all_resolves_to_last() {
        let entries = keys(&[10, 20, 30]);
        let target = DecoratedKey::new(Token::from_raw(99), "k99".into());
        let result = binary_search(&entries, &target, |e| e);
        assert_eq!(resolve_floor(result), 2);
    }

    #[test]
    fn empty_entries() {
        let entries: Vec<DecoratedKey> = vec![];
        let target = DecoratedKey::new(Token::from_raw(1), "k1".into());
        let result = binary_search(&entries, &target, |e| e);
        assert_eq!(result, -1);
        assert_eq!(resolve_floor(result), -1);
    }
}
