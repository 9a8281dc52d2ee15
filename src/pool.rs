use std::{fmt, iter::FusedIterator, slice};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, error, trace};

use crate::{
    config::{PoolConfig, ProbeStrategy},
    error::{Error, InvalidKeyReason, Result},
    range::{KeyRange, SENTINEL},
};

/// Hands out the lowest free integer key and takes keys back for reuse.
///
/// Free keys are kept as a sorted vector of disjoint, non-adjacent inclusive
/// ranges. The last range always runs up to [`SENTINEL`], so the vector is
/// never empty and every key above the high-water mark is free.
///
/// ```
/// use keypool::KeyPool;
///
/// let mut pool = KeyPool::new();
/// let a = pool.allocate().unwrap(); // 0
/// let _b = pool.allocate().unwrap(); // 1
/// pool.release(a).unwrap();
/// assert_eq!(pool.allocate().unwrap(), 0);
/// ```
#[derive(Clone)]
pub struct KeyPool {
    start: usize,
    free: Vec<KeyRange>,
    strategy: ProbeStrategy,
    rng: StdRng,
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.free.iter()).finish()
    }
}

impl KeyPool {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_start(start: usize) -> Self {
        Self::with_config(PoolConfig::new().with_start(start))
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        KeyPool {
            start: config.start,
            free: vec![KeyRange::new(config.start, SENTINEL)],
            strategy: config.strategy,
            rng,
        }
    }

    /// Lowest key this pool manages.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Lowest key that has never been handed out.
    #[inline]
    pub fn high_water(&self) -> usize {
        self.free.last().map_or(SENTINEL, KeyRange::start)
    }

    /// Removes and returns the smallest free key.
    ///
    /// Fails with [`Error::Exhausted`] only once every key below
    /// [`SENTINEL`] is allocated.
    pub fn allocate(&mut self) -> Result<usize> {
        let Some(first) = self.free.first_mut() else {
            error!("free-range sequence is empty");
            return Err(Error::Exhausted);
        };
        let key = first.start;
        if key == SENTINEL {
            return Err(Error::Exhausted);
        }
        if first.start == first.last {
            self.free.remove(0);
        } else {
            first.start += 1;
        }
        trace!(key, "allocated key");
        Ok(key)
    }

    /// Returns an allocated key to the pool, coalescing it with the free
    /// ranges on either side.
    ///
    /// Keys below [`start`](Self::start), keys never handed out and keys
    /// already free are rejected with [`Error::InvalidKey`]; the pool is left
    /// untouched in that case.
    pub fn release(&mut self, key: usize) -> Result<()> {
        self.check_managed(key)?;
        let slot = match self.strategy {
            ProbeStrategy::Randomized => match self.probe(key)? {
                Some(slot) => slot,
                None => {
                    debug!(
                        key,
                        ranges = self.free.len(),
                        "probe budget exhausted, falling back to binary search"
                    );
                    self.search(key)?
                }
            },
            ProbeStrategy::Binary => self.search(key)?,
        };
        self.insert_coalesced(slot, key);
        trace!(key, slot, "released key");
        Ok(())
    }

    /// Takes one specific free key out of the pool, as if it had been
    /// allocated.
    pub fn claim(&mut self, key: usize) -> Result<()> {
        self.check_managed(key)?;
        if key == SENTINEL {
            return Err(self.reject(key, InvalidKeyReason::Sentinel));
        }
        let p = self.free.partition_point(|rng| rng.last < key);
        let Some(rng) = self.free.get(p).copied() else {
            return Err(self.inconsistent(key));
        };
        if !rng.contains_n(key) {
            return Err(self.reject(key, InvalidKeyReason::AlreadyAllocated));
        }
        match (rng.start == key, rng.last == key) {
            (true, true) => {
                self.free.remove(p);
            }
            (true, false) => self.free[p].start += 1,
            (false, true) => self.free[p].last -= 1,
            (false, false) => {
                self.free[p].last = key - 1;
                self.free.insert(p + 1, KeyRange::new(key + 1, rng.last));
            }
        }
        trace!(key, "claimed key");
        Ok(())
    }

    pub fn is_free(&self, key: usize) -> bool {
        if key < self.start {
            return false;
        }
        let p = self.free.partition_point(|rng| rng.last < key);
        self.free.get(p).is_some_and(|rng| rng.start <= key)
    }

    pub fn is_allocated(&self, key: usize) -> bool {
        key >= self.start && !self.is_free(key)
    }

    /// Number of keys currently handed out.
    pub fn allocated_len(&self) -> usize {
        let holes: usize = self
            .free
            .iter()
            .filter(|rng| !rng.is_unbounded())
            .map(KeyRange::len)
            .sum();
        self.high_water() - self.start - holes
    }

    /// The free ranges in ascending order. The last one is unbounded.
    pub fn free_ranges(&self) -> impl ExactSizeIterator<Item = KeyRange> + '_ {
        self.free.iter().copied()
    }

    /// Maximal runs of allocated keys in ascending order.
    pub fn allocated_ranges(&self) -> AllocatedRanges<'_> {
        AllocatedRanges {
            free: self.free.iter(),
            next_start: self.start,
        }
    }

    /// Frees every key.
    pub fn reset(&mut self) {
        self.free.clear();
        self.free.push(KeyRange::new(self.start, SENTINEL));
    }

    fn check_managed(&self, key: usize) -> Result<()> {
        if key < self.start {
            return Err(self.reject(
                key,
                InvalidKeyReason::BelowStart { start: self.start },
            ));
        }
        Ok(())
    }

    /// Whether `key` lies in the gap right before range `p`, i.e. `p` is
    /// where a singleton for `key` belongs.
    fn gap_before(&self, p: usize, key: usize) -> bool {
        let above_prev = match p.checked_sub(1) {
            Some(prev) => key > self.free[prev].last,
            None => key >= self.start,
        };
        above_prev && key < self.free[p].start
    }

    /// Randomized walk toward the slot for `key`. `Ok(None)` means the step
    /// budget ran out before the slot was found.
    fn probe(&mut self, key: usize) -> Result<Option<usize>> {
        let len = self.free.len();
        if len == 0 {
            return Ok(None);
        }
        let budget = (len as f64).ln() as usize + 1;
        let mut p = self.rng.random_range(0..len);
        for _ in 0..budget {
            if self.gap_before(p, key) {
                return Ok(Some(p));
            }
            let rng = self.free[p];
            if rng.contains_n(key) {
                return Err(self.reject(key, InvalidKeyReason::NotAllocated));
            }
            if key < rng.start {
                p /= 2;
            } else {
                p += (len - p) / 2;
            }
        }
        Ok(None)
    }

    fn search(&self, key: usize) -> Result<usize> {
        let p = self.free.partition_point(|rng| rng.last < key);
        match self.free.get(p) {
            Some(rng) if rng.start <= key => {
                Err(self.reject(key, InvalidKeyReason::NotAllocated))
            }
            Some(_) => Ok(p),
            None => Err(self.inconsistent(key)),
        }
    }

    fn insert_coalesced(&mut self, slot: usize, key: usize) {
        self.free.insert(slot, KeyRange::single(key));
        if let Some(next) = self.free.get(slot + 1).copied()
            && let Some(merged) = self.free[slot].merge(&next)
        {
            self.free[slot] = merged;
            self.free.remove(slot + 1);
        }
        if let Some(prev) = slot.checked_sub(1)
            && let Some(merged) = self.free[prev].merge(&self.free[slot])
        {
            self.free[prev] = merged;
            self.free.remove(slot);
        }
    }

    fn reject(&self, key: usize, reason: InvalidKeyReason) -> Error {
        debug!(key, %reason, "rejected key");
        Error::invalid(key, reason)
    }

    fn inconsistent(&self, key: usize) -> Error {
        error!(key, ranges = ?self, "no free range reaches key");
        Error::Inconsistent { key }
    }
}

/// Iterator over allocated runs, see [`KeyPool::allocated_ranges`].
#[derive(Debug, Clone)]
pub struct AllocatedRanges<'a> {
    free: slice::Iter<'a, KeyRange>,
    next_start: usize,
}

impl Iterator for AllocatedRanges<'_> {
    type Item = KeyRange;

    fn next(&mut self) -> Option<Self::Item> {
        for rng in self.free.by_ref() {
            let gap_start = self.next_start;
            self.next_start = rng.last.saturating_add(1);
            if rng.start > gap_start {
                return Some(KeyRange::new(gap_start, rng.start - 1));
            }
        }
        None
    }
}

impl FusedIterator for AllocatedRanges<'_> {}
