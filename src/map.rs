use std::collections::{BTreeMap, btree_map};

use tracing::warn;

use crate::{
    config::PoolConfig,
    error::{Error, Result},
    pool::KeyPool,
};

/// An ordered map whose keys are handed out by a [`KeyPool`].
///
/// ```
/// use keypool::KeyPoolMap;
///
/// let mut items = KeyPoolMap::new();
/// let hello = items.insert("hello").unwrap();
/// let world = items.insert("world").unwrap();
/// assert_eq!((hello, world), (0, 1));
///
/// items.remove(hello).unwrap();
/// assert_eq!(items.insert("again").unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct KeyPoolMap<V> {
    values: BTreeMap<usize, V>,
    pool: KeyPool,
}

impl<V> Default for KeyPoolMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyPoolMap<V> {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_start(start: usize) -> Self {
        Self::with_config(PoolConfig::new().with_start(start))
    }

    pub fn with_config(config: PoolConfig) -> Self {
        KeyPoolMap {
            values: BTreeMap::new(),
            pool: KeyPool::with_config(config),
        }
    }

    #[inline]
    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Stores `value` under a freshly allocated key and returns the key.
    pub fn insert(&mut self, value: V) -> Result<usize> {
        let key = self.pool.allocate()?;
        self.values.insert(key, value);
        Ok(key)
    }

    /// Stores `value` under a key chosen by the caller, returning the value
    /// it replaces.
    ///
    /// A free key inside the pool's range is claimed, so later calls to
    /// [`insert`](Self::insert) will not hand it out. Keys below the pool
    /// start are stored without involving the pool.
    pub fn insert_at(&mut self, key: usize, value: V) -> Result<Option<V>> {
        if self.pool.is_free(key) {
            self.pool.claim(key)?;
        }
        Ok(self.values.insert(key, value))
    }

    /// Allocates a key now and lets the caller decide later whether to fill
    /// it. Dropping the returned guard unfilled gives the key back.
    pub fn vacant_key(&mut self) -> Result<VacantKey<'_, V>> {
        let key = self.pool.allocate()?;
        Ok(VacantKey {
            map: self,
            key,
            filled: false,
        })
    }

    pub fn get(&self, key: usize) -> Result<&V> {
        self.values.get(&key).ok_or(Error::NotFound(key))
    }

    pub fn get_mut(&mut self, key: usize) -> Result<&mut V> {
        self.values.get_mut(&key).ok_or(Error::NotFound(key))
    }

    /// Removes the value stored under `key` and frees the key for reuse.
    pub fn remove(&mut self, key: usize) -> Result<V> {
        if !self.values.contains_key(&key) {
            return Err(Error::NotFound(key));
        }
        if key >= self.pool.start() {
            self.pool.release(key)?;
        }
        self.values.remove(&key).ok_or(Error::NotFound(key))
    }

    #[inline]
    pub fn contains_key(&self, key: usize) -> bool {
        self.values.contains_key(&key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drops every value and frees every key.
    pub fn clear(&mut self) {
        self.values.clear();
        self.pool.reset();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, &V)> + '_ {
        self.values.iter().map(|(&key, value)| (key, value))
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.values.keys().copied()
    }

    pub fn values(&self) -> btree_map::Values<'_, usize, V> {
        self.values.values()
    }
}

/// A key taken from a [`KeyPoolMap`] that has no value yet.
#[derive(Debug)]
pub struct VacantKey<'a, V> {
    map: &'a mut KeyPoolMap<V>,
    key: usize,
    filled: bool,
}

impl<V> VacantKey<'_, V> {
    #[inline]
    pub fn key(&self) -> usize {
        self.key
    }

    pub fn insert(mut self, value: V) -> usize {
        self.map.values.insert(self.key, value);
        self.filled = true;
        self.key
    }
}

impl<V> Drop for VacantKey<'_, V> {
    fn drop(&mut self) {
        if self.filled {
            return;
        }
        if let Err(err) = self.map.pool.release(self.key) {
            warn!(key = self.key, %err, "could not return unused key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::KeyPoolMap;
    use crate::{
        error::{Error, InvalidKeyReason},
        range::{KeyRange, SENTINEL},
    };

    #[test]
    fn test_no_intermediate_assignment() {
        let mut items = KeyPoolMap::new();
        for value in ["a", "b", "c"] {
            items.insert(value).unwrap();
        }
        assert_eq!(items.remove(0), Ok("a"));
        assert!(!items.contains_key(0));
        assert!(items.contains_key(1));
        assert!(items.contains_key(2));

        assert_eq!(items.insert("d"), Ok(0));
        assert_eq!(items.get(0), Ok(&"d"));
    }

    #[test]
    fn test_reuse_after_removing_everything() {
        let mut items = KeyPoolMap::new();
        let keys: Vec<_> = (0..100).map(|i| items.insert(i).unwrap()).collect();
        let stored: Vec<_> = items.keys().collect();
        for key in stored.into_iter().rev() {
            items.remove(key).unwrap();
        }
        assert!(items.is_empty());
        let again: Vec<_> = (0..100).map(|i| items.insert(i).unwrap()).collect();
        assert_eq!(keys, again);
        assert_eq!(
            items.pool().free_ranges().collect::<Vec<_>>(),
            vec![KeyRange::new(100, SENTINEL)]
        );
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let mut items: KeyPoolMap<&str> = KeyPoolMap::new();
        assert_eq!(items.get(3), Err(Error::NotFound(3)));
        assert_eq!(items.get_mut(3), Err(Error::NotFound(3)));
        assert_eq!(items.remove(3), Err(Error::NotFound(3)));
        assert_eq!(items.pool().allocated_len(), 0);
    }

    #[test]
    fn test_get_mut_updates_value() {
        let mut items = KeyPoolMap::new();
        let key = items.insert(String::from("hello")).unwrap();
        items.get_mut(key).unwrap().push_str(", world");
        assert_eq!(items.get(key).unwrap(), "hello, world");
    }

    #[test]
    fn test_insert_at_claims_free_key() {
        let mut items = KeyPoolMap::new();
        assert_eq!(items.insert_at(2, "two"), Ok(None));
        assert!(items.pool().is_allocated(2));

        let keys: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|value| items.insert(value).unwrap())
            .collect();
        assert_eq!(keys, vec![0, 1, 3]);

        assert_eq!(items.insert_at(2, "deux"), Ok(Some("two")));
        assert_eq!(items.remove(2), Ok("deux"));
        assert_eq!(items.insert("e"), Ok(2));
    }

    #[test]
    fn test_insert_at_below_start_is_unmanaged() {
        let mut items = KeyPoolMap::with_start(100);
        assert_eq!(items.insert_at(7, "seven"), Ok(None));
        assert_eq!(items.insert("first"), Ok(100));
        assert_eq!(items.pool().allocated_len(), 1);

        assert_eq!(items.remove(7), Ok("seven"));
        assert_eq!(items.pool().allocated_len(), 1);
        assert_eq!(items.iter().collect::<Vec<_>>(), vec![(100, &"first")]);
    }

    #[test]
    fn test_insert_at_sentinel_is_rejected() {
        let mut items = KeyPoolMap::new();
        assert_eq!(
            items.insert_at(SENTINEL, ()),
            Err(Error::InvalidKey {
                key: SENTINEL,
                reason: InvalidKeyReason::Sentinel
            })
        );
        assert!(items.is_empty());
    }

    #[test]
    fn test_vacant_key_filled() {
        let mut items = KeyPoolMap::new();
        let vacant = items.vacant_key().unwrap();
        assert_eq!(vacant.key(), 0);
        let key = vacant.insert(format!("value for {}", 0));
        assert_eq!(key, 0);
        assert_eq!(items.get(0).unwrap(), "value for 0");
        assert_eq!(items.insert(String::new()), Ok(1));
    }

    #[test]
    fn test_vacant_key_dropped_returns_key() {
        let mut items = KeyPoolMap::new();
        items.insert("kept").unwrap();
        {
            let vacant = items.vacant_key().unwrap();
            assert_eq!(vacant.key(), 1);
        }
        assert_eq!(items.pool().allocated_len(), 1);
        assert_eq!(items.insert("next"), Ok(1));
    }

    #[test]
    fn test_clear_resets_pool() {
        let mut items = KeyPoolMap::with_start(5);
        for value in 0..10 {
            items.insert(value).unwrap();
        }
        items.clear();
        assert!(items.is_empty());
        assert_eq!(items.pool().high_water(), 5);
        assert_eq!(items.insert(42), Ok(5));
    }

    #[test]
    fn test_iteration_is_ordered() {
        let mut items = KeyPoolMap::new();
        for value in ["a", "b", "c", "d"] {
            items.insert(value).unwrap();
        }
        items.remove(1).unwrap();
        assert_eq!(items.keys().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(items.values().copied().collect::<Vec<_>>(), vec!["a", "c", "d"]);
        assert_eq!(items.len(), 3);
    }
}
