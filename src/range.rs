// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Generic wrap-around range algebra, shared by token ranges and clustering
//! ranges.
//!
//! Ported from the reference cluster's `range<T>`: a range holds two
//! optional bounds, each a `(value, inclusive)` pair, and compares bounds
//! against each other using a tri-state adjustment instead of perturbing
//! values, so it works for any `Ord` type without needing a successor
//! function.

use std::cmp::Ordering;

/// One side of a [`Range`]: a value plus whether it is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound<T> {
    /// The bound's value.
    pub value: T,
    /// Whether the bound itself is part of the range.
    pub inclusive: bool,
}

impl<T> Bound<T> {
    /// Creates a new bound.
    pub const fn new(value: T, inclusive: bool) -> Self {
        Self { value, inclusive }
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Bound<U> {
        Bound::new(f(self.value), self.inclusive)
    }
}

/// A (possibly wrap-around) range over a totally-ordered `T`.
///
/// An absent start bound means "open at the bottom" (−∞); an absent end
/// bound means "open at the top" (+∞). `singular` marks a range that
/// contains exactly one value (`start == end`, both inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range<T> {
    start: Option<Bound<T>>,
    end: Option<Bound<T>>,
    singular: bool,
}

impl<T> Range<T> {
    /// A range covering every value.
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
            singular: false,
        }
    }

    /// A range with explicit (possibly absent) start/end bounds.
    pub const fn new(start: Option<Bound<T>>, end: Option<Bound<T>>) -> Self {
        Self {
            start,
            end,
            singular: false,
        }
    }

    /// A range containing exactly one value.
    pub fn singular(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            start: Some(Bound::new(value.clone(), true)),
            end: Some(Bound::new(value, true)),
            singular: true,
        }
    }

    /// The start bound, if any.
    pub const fn start(&self) -> Option<&Bound<T>> {
        self.start.as_ref()
    }

    /// The end bound, if any.
    pub const fn end(&self) -> Option<&Bound<T>> {
        self.end.as_ref()
    }

    /// Whether this range is known to contain exactly one value.
    pub const fn is_singular(&self) -> bool {
        self.singular
    }

    /// Maps both bounds through `f`, preserving inclusivity and singularity.
    pub fn transform<U>(self, mut f: impl FnMut(T) -> U) -> Range<U> {
        Range {
            start: self.start.map(|b| b.map(&mut f)),
            end: self.end.map(|b| b.map(&mut f)),
            singular: self.singular,
        }
    }
}

/// Three-valued comparison of two bounds of the *same* side (both starts,
/// or both ends), honoring the "infinitesimal shift" rule from §4.1: an
/// exclusive bound compares as if its value were shifted by ±1 away from
/// the range's interior, without ever perturbing the stored value.
///
/// `start_side` selects which shift direction applies: for start bounds an
/// exclusive bound acts as if it were one step *larger* (it excludes its
/// own value and everything below); for end bounds, one step *smaller*.
fn compare_bounds<T>(
    cmp: impl Fn(&T, &T) -> Ordering,
    a: &Bound<T>,
    b: &Bound<T>,
    start_side: bool,
) -> Ordering {
    match cmp(&a.value, &b.value) {
        Ordering::Equal => {
            if a.inclusive == b.inclusive {
                Ordering::Equal
            } else if start_side {
                // inclusive start sorts before exclusive start at the same value
                if a.inclusive {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            } else {
                // inclusive end sorts after exclusive end at the same value
                if a.inclusive {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
        }
        other => other,
    }
}

/// Compares a start bound to an end bound — used to decide whether a range
/// is empty, wraps, or is well-formed.
fn compare_start_to_end<T>(cmp: impl Fn(&T, &T) -> Ordering, start: &Bound<T>, end: &Bound<T>) -> Ordering {
    match cmp(&start.value, &end.value) {
        Ordering::Equal => {
            if start.inclusive && end.inclusive {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        other => other,
    }
}

impl<T> Range<T> {
    /// Whether `point` lies within this (non-wrapping) range.
    ///
    /// For a wrap-around range, `point` is contained if it falls in either
    /// half of [`Self::unwrap`].
    pub fn contains_point(&self, point: &T, cmp: impl Fn(&T, &T) -> Ordering + Copy) -> bool {
        if self.is_wrap_around(cmp) {
            let (lower, upper) = self.clone().unwrap_wrapped(cmp);
            return lower.contains_point(point, cmp) || upper.contains_point(point, cmp);
        }

        let after_start = self.start.as_ref().is_none_or(|b| {
            let o = cmp(point, &b.value);
            o == Ordering::Greater || (o == Ordering::Equal && b.inclusive)
        });

        let before_end = self.end.as_ref().is_none_or(|b| {
            let o = cmp(point, &b.value);
            o == Ordering::Less || (o == Ordering::Equal && b.inclusive)
        });

        after_start && before_end
    }

    /// Whether `point` sorts strictly before this range's contained values.
    pub fn before(&self, point: &T, cmp: impl Fn(&T, &T) -> Ordering) -> bool {
        match &self.start {
            None => false,
            Some(b) => {
                let o = cmp(point, &b.value);
                o == Ordering::Less || (o == Ordering::Equal && !b.inclusive)
            }
        }
    }

    /// Whether `point` sorts strictly after this range's contained values.
    pub fn after(&self, point: &T, cmp: impl Fn(&T, &T) -> Ordering) -> bool {
        match &self.end {
            None => false,
            Some(b) => {
                let o = cmp(point, &b.value);
                o == Ordering::Greater || (o == Ordering::Equal && !b.inclusive)
            }
        }
    }

    /// A range wraps around when its end precedes its start, or they're
    /// equal with either bound exclusive (an empty-but-not-open interval,
    /// which the reference implementation also treats as wrapping).
    pub fn is_wrap_around(&self, cmp: impl Fn(&T, &T) -> Ordering) -> bool {
        match (&self.start, &self.end) {
            (Some(s), Some(e)) => compare_start_to_end(cmp, s, e) == Ordering::Greater,
            _ => false,
        }
    }

    /// Splits a wrap-around range into its two non-wrapping halves,
    /// `(-inf..end], [start..+inf)` (respecting each side's inclusivity).
    /// Precondition: `self.is_wrap_around()`.
    pub fn unwrap_wrapped(self, cmp: impl Fn(&T, &T) -> Ordering + Copy) -> (Self, Self)
    where
        T: Clone,
    {
        debug_assert!(self.is_wrap_around(cmp));

        let lower = Self {
            start: None,
            end: self.end.clone(),
            singular: false,
        };
        let upper = Self {
            start: self.start.clone(),
            end: None,
            singular: false,
        };
        (lower, upper)
    }

    /// Whether two ranges share any point. If both wrap, they're taken to
    /// overlap trivially (they both cover the ring's cut point).
    pub fn overlaps(&self, other: &Self, cmp: impl Fn(&T, &T) -> Ordering + Copy) -> bool
    where
        T: Clone,
    {
        let self_wraps = self.is_wrap_around(cmp);
        let other_wraps = other.is_wrap_around(cmp);

        if self_wraps && other_wraps {
            return true;
        }

        if self_wraps {
            let (l, u) = self.clone().unwrap_wrapped(cmp);
            return l.overlaps(other, cmp) || u.overlaps(other, cmp);
        }

        if other_wraps {
            let (l, u) = other.clone().unwrap_wrapped(cmp);
            return self.overlaps(&l, cmp) || self.overlaps(&u, cmp);
        }

        // Neither wraps: overlap iff self.start <= other.end && other.start <= self.end.
        let start_le_end = |a: Option<&Bound<T>>, b: Option<&Bound<T>>| -> bool {
            match (a, b) {
                (None, _) | (_, None) => true,
                (Some(a), Some(b)) => {
                    let o = cmp(&a.value, &b.value);
                    o == Ordering::Less || (o == Ordering::Equal && a.inclusive && b.inclusive)
                }
            }
        };

        start_le_end(self.start.as_ref(), other.end.as_ref())
            && start_le_end(other.start.as_ref(), self.end.as_ref())
    }

    /// Whether this range fully contains `other` (handles wrap on either
    /// side by unwrapping first).
    pub fn contains_range(&self, other: &Self, cmp: impl Fn(&T, &T) -> Ordering + Copy) -> bool
    where
        T: Clone,
    {
        if self.is_wrap_around(cmp) {
            let (l, u) = self.clone().unwrap_wrapped(cmp);
            if other.is_wrap_around(cmp) {
                let (ol, ou) = other.clone().unwrap_wrapped(cmp);
                return (l.contains_range(&ol, cmp) || u.contains_range(&ol, cmp))
                    && (l.contains_range(&ou, cmp) || u.contains_range(&ou, cmp));
            }
            return l.contains_range(other, cmp) || u.contains_range(other, cmp);
        }

        if other.is_wrap_around(cmp) {
            return false;
        }

        let start_le = match (&self.start, &other.start) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => {
                compare_bounds(cmp, a, b, true) != Ordering::Greater
            }
        };
        let end_ge = match (&self.end, &other.end) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => compare_bounds(cmp, a, b, false) != Ordering::Less,
        };

        start_le && end_ge
    }

    /// Splits this (non-wrapping) range at `point`, which must be contained.
    /// The left half includes `point`.
    pub fn split(&self, point: T, cmp: impl Fn(&T, &T) -> Ordering + Copy) -> (Self, Self)
    where
        T: Clone,
    {
        debug_assert!(self.contains_point(&point, cmp));

        let left = Self {
            start: self.start.clone(),
            end: Some(Bound::new(point.clone(), true)),
            singular: false,
        };
        let right = Self {
            start: Some(Bound::new(point, false)),
            end: self.end.clone(),
            singular: false,
        };
        (left, right)
    }

    /// Returns the sorted, non-overlapping ranges covering values in `self`
    /// but not in `other`.
    pub fn subtract(&self, other: &Self, cmp: impl Fn(&T, &T) -> Ordering + Copy) -> Vec<Self>
    where
        T: Clone,
    {
        if !self.overlaps(other, cmp) {
            return vec![self.clone()];
        }

        if self.is_wrap_around(cmp) {
            let (l, u) = self.clone().unwrap_wrapped(cmp);
            let mut out = l.subtract(other, cmp);
            out.extend(u.subtract(other, cmp));
            return out;
        }

        if other.is_wrap_around(cmp) {
            // other = ol ∪ ou (its two non-wrapping halves); self \ other is
            // self with each half subtracted in turn.
            let (ol, ou) = other.clone().unwrap_wrapped(cmp);
            let mut out = Vec::new();
            for piece in self.subtract(&ol, cmp) {
                out.extend(piece.subtract(&ou, cmp));
            }
            return out;
        }

        let mut out = Vec::new();

        // Left remainder: self.start .. other.start (exclusive of other.start)
        if let Some(ob) = &other.start {
            let keep = match &self.start {
                None => true,
                Some(sb) => compare_bounds(cmp, sb, ob, true) == Ordering::Less,
            };
            if keep {
                out.push(Self {
                    start: self.start.clone(),
                    end: Some(Bound::new(ob.value.clone(), !ob.inclusive)),
                    singular: false,
                });
            }
        }

        // Right remainder: other.end .. self.end (exclusive of other.end)
        if let Some(ob) = &other.end {
            let keep = match &self.end {
                None => true,
                Some(sb) => compare_bounds(cmp, sb, ob, false) == Ordering::Greater,
            };
            if keep {
                out.push(Self {
                    start: Some(Bound::new(ob.value.clone(), !ob.inclusive)),
                    end: self.end.clone(),
                    singular: false,
                });
            }
        }

        out
    }

    /// Wire-compatible hash: `31 * hash(start_or_0) + hash(end_or_0)`.
    pub fn range_hash(&self, hash_value: impl Fn(&T) -> u64) -> u64 {
        let start_hash = self.start.as_ref().map_or(0, |b| hash_value(&b.value));
        let end_hash = self.end.as_ref().map_or(0, |b| hash_value(&b.value));
        31u64.wrapping_mul(start_hash).wrapping_add(end_hash)
    }
}
