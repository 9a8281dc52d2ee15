use std::{fmt, ops};

/// Upper bound of the final free range. Stands in for "every key above the
/// high-water mark is free" and is never handed out.
pub const SENTINEL: usize = usize::MAX;

/// inclusive
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct KeyRange {
    pub(crate) start: usize,
    pub(crate) last: usize,
}

impl KeyRange {
    #[inline]
    pub fn new(start: usize, last: usize) -> Self {
        debug_assert!(start <= last);
        KeyRange { start, last }
    }

    #[inline]
    pub(crate) fn single(key: usize) -> Self {
        KeyRange {
            start: key,
            last: key,
        }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn last(&self) -> usize {
        self.last
    }

    /// Saturates at `usize::MAX` for the range `[0, SENTINEL]`.
    #[inline]
    pub fn len(&self) -> usize {
        (self.last - self.start).saturating_add(1)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether this range runs up to the sentinel.
    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.last == SENTINEL
    }

    #[inline]
    pub fn contains_n(&self, n: usize) -> bool {
        self.start <= n && n <= self.last
    }

    /// Overlapping or touching, e.g. `[0, 4]` and `[5, 9]`.
    #[inline]
    pub fn intersects_or_adjacent(&self, other: &Self) -> bool {
        self.start <= other.last.saturating_add(1) && self.last.saturating_add(1) >= other.start
    }

    /// Smallest range covering both, or `None` when a gap separates them.
    #[inline]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        self.intersects_or_adjacent(other).then(|| {
            let start = self.start.min(other.start);
            let last = self.last.max(other.last);
            KeyRange::new(start, last)
        })
    }
}

impl fmt::Debug for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "{}..", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.last)
        }
    }
}

impl From<&ops::RangeInclusive<usize>> for KeyRange {
    fn from(rng: &ops::RangeInclusive<usize>) -> Self {
        KeyRange::new(*rng.start(), *rng.end())
    }
}

impl From<(usize, usize)> for KeyRange {
    #[inline]
    fn from(rng: (usize, usize)) -> Self {
        KeyRange::new(rng.0, rng.1)
    }
}

impl From<KeyRange> for ops::RangeInclusive<usize> {
    #[inline]
    fn from(rng: KeyRange) -> Self {
        rng.start..=rng.last
    }
}
