//! GuardedMap: key -> value map over `HashTable` with an `AccessGuard`.

use crate::access_guard::{AccessGuard, GuardPolicy};
use crate::comparer::{DefaultComparer, EqualityComparer};
use crate::enumerator::{Enumerator, Sealed, Source};
use crate::error::{Error, Result};
use crate::hash_table::{HashTable, InsertOutcome};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::cell::RefCell;
use core::fmt;

/// Hash map that rejects structural changes while it is being enumerated
/// and, under [`GuardPolicy::THREAD_AFFINE`], any access from a thread other
/// than its owner.
///
/// All operations take `&self`; the map is `Send` but not `Sync`.
pub struct GuardedMap<K, V, C = DefaultComparer> {
    table: RefCell<HashTable<K, V>>,
    comparer: C,
    guard: AccessGuard,
    reentrancy: DebugReentrancy,
}

impl<K, V> GuardedMap<K, V> {
    pub fn new() -> Self {
        Self::from_parts(HashTable::new(), DefaultComparer::default(), GuardPolicy::default())
    }

    /// Fails with `CapacityOverflow` past the largest supported table size.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(capacity, DefaultComparer::default(), GuardPolicy::default())
    }

    pub fn with_policy(policy: GuardPolicy) -> Self {
        Self::from_parts(HashTable::new(), DefaultComparer::default(), policy)
    }
}

impl<K, V> Default for GuardedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> GuardedMap<K, V>
where
    K: core::hash::Hash + Eq,
{
    /// Seeds a map from `entries`; fails on the first duplicate key.
    pub fn try_from_iter<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = entries.into_iter();
        let map = Self::with_capacity(entries.size_hint().0)?;
        for (k, v) in entries {
            map.insert(k, v)?;
        }
        Ok(map)
    }
}

impl<K, V, C> GuardedMap<K, V, C> {
    pub fn with_comparer(comparer: C) -> Self {
        Self::from_parts(HashTable::new(), comparer, GuardPolicy::default())
    }

    pub fn with_capacity_and_comparer(capacity: usize, comparer: C) -> Result<Self> {
        Self::with_config(capacity, comparer, GuardPolicy::default())
    }

    pub fn with_config(capacity: usize, comparer: C, policy: GuardPolicy) -> Result<Self> {
        Ok(Self::from_parts(HashTable::with_capacity(capacity)?, comparer, policy))
    }

    fn from_parts(table: HashTable<K, V>, comparer: C, policy: GuardPolicy) -> Self {
        Self {
            table: RefCell::new(table),
            comparer,
            guard: AccessGuard::new(policy),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn comparer(&self) -> &C {
        &self.comparer
    }

    /// Guard state, for diagnostics.
    pub fn access_guard(&self) -> &AccessGuard {
        &self.guard
    }

    /// Releases thread ownership so another thread may take the map over.
    pub fn release_thread_affinity(&self) -> Result<()> {
        self.guard.release_thread()
    }

    pub fn len(&self) -> Result<usize> {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        Ok(self.table.borrow().len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> Result<usize> {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        Ok(self.table.borrow().capacity())
    }

    /// Enumerates `(key, value)` pairs.
    ///
    /// Called from a thread the map does not belong to, the enumerator is
    /// not registered and its first step fails with `CrossThreadAccess`.
    pub fn iter(&self) -> Iter<'_, K, V, C>
    where
        K: Clone,
        V: Clone,
    {
        Enumerator::new(MapSource {
            map: self,
            project: |k, v| (k.clone(), v.clone()),
        })
    }

    /// Read-only view of the keys.
    pub fn keys(&self) -> Keys<'_, K, V, C> {
        Keys { map: self }
    }

    /// Read-only view of the values.
    pub fn values(&self) -> Values<'_, K, V, C> {
        Values { map: self }
    }

    pub fn contains_value(&self, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let table = self.table.borrow();
        let found = table.iter().any(|(_, _, v)| v == value);
        Ok(found)
    }

    pub fn clear(&self) -> Result<()> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let mut table = self.table.borrow_mut();
        if table.is_empty() {
            return Ok(());
        }
        table.clear();
        self.guard.bump_version();
        Ok(())
    }

    /// Removes every entry for which `keep` returns false.
    pub fn retain(&self, keep: impl FnMut(&K, &V) -> bool) -> Result<usize> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let removed = self.table.borrow_mut().retain(keep);
        if removed > 0 {
            self.guard.bump_version();
        }
        Ok(removed)
    }

    /// Compacts storage to the smallest prime table that holds every entry.
    pub fn trim_excess(&self) -> Result<()> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        self.table.borrow_mut().trim_excess();
        self.guard.bump_version();
        Ok(())
    }
}

impl<K, V, C> GuardedMap<K, V, C>
where
    C: EqualityComparer<K>,
{
    fn validate_key(&self, key: &K) -> Result<()> {
        if self.comparer.eq(key, key) {
            Ok(())
        } else {
            Err(Error::InvalidKey)
        }
    }

    fn find<Q>(&self, table: &HashTable<K, V>, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let hash = EqualityComparer::<Q>::hash(&self.comparer, q);
        table.find(hash, |k| EqualityComparer::<Q>::eq(&self.comparer, k.borrow(), q))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let table = self.table.borrow();
        Ok(self.find(&table, key).is_some())
    }

    /// Runs `f` on the value for `key` without cloning it.
    pub fn get_with<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Result<Option<R>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let table = self.table.borrow();
        Ok(self
            .find(&table, key)
            .and_then(|i| table.entry_at(i))
            .map(|(_, v)| f(v)))
    }

    pub fn try_get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Value for `key`; `KeyNotFound` when absent.
    pub fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
        V: Clone,
    {
        self.try_get(key)?.ok_or(Error::KeyNotFound)
    }

    /// Adds a new entry; `DuplicateKey` if `key` is present.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        match self.put(key, value, false)? {
            InsertOutcome::Inserted(_) => Ok(()),
            InsertOutcome::Overwritten(_) => Err(Error::DuplicateKey),
        }
    }

    /// Adds a new entry; `Ok(false)` instead of an error if `key` is present.
    /// Still a write: it fails during enumeration even when the key exists.
    pub fn try_add(&self, key: K, value: V) -> Result<bool> {
        match self.put(key, value, false) {
            Ok(_) => Ok(true),
            Err(Error::DuplicateKey) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Inserts or replaces the value for `key`, returning the old value.
    pub fn set(&self, key: K, value: V) -> Result<Option<V>> {
        match self.put(key, value, true)? {
            InsertOutcome::Inserted(_) => Ok(None),
            InsertOutcome::Overwritten(old) => Ok(Some(old)),
        }
    }

    fn put(&self, key: K, value: V, overwrite: bool) -> Result<InsertOutcome<V>> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        self.validate_key(&key)?;
        let hash = self.comparer.hash(&key);
        let outcome = self.table.borrow_mut().insert(hash, key, value, overwrite, |a, b| {
            self.comparer.eq(a, b)
        })?;
        self.guard.bump_version();
        Ok(outcome)
    }

    pub fn remove<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        Ok(self.remove_entry(key)?.is_some())
    }

    pub fn remove_entry<Q>(&self, key: &Q) -> Result<Option<(K, V)>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let mut table = self.table.borrow_mut();
        let removed = match self.find(&table, key) {
            Some(i) => table.remove_slot(i),
            None => None,
        };
        drop(table);
        if removed.is_some() {
            self.guard.bump_version();
        }
        Ok(removed)
    }
}

impl<K, V, C> fmt::Debug for GuardedMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GuardedMap");
        if let Ok(table) = self.table.try_borrow() {
            s.field("len", &table.len());
            s.field("capacity", &table.capacity());
        }
        s.field("version", &self.guard.version())
            .field("enumerations", &self.guard.active_enumerations())
            .field("policy", &self.guard.policy())
            .finish()
    }
}

/// Walks a map's slots, projecting each live entry.
pub struct MapSource<'a, K, V, C, T> {
    map: &'a GuardedMap<K, V, C>,
    project: fn(&K, &V) -> T,
}

impl<K, V, C, T> Sealed for MapSource<'_, K, V, C, T> {}

impl<'a, K, V, C, T> Source<'a> for MapSource<'a, K, V, C, T> {
    type Item = T;

    fn guard(&self) -> &'a AccessGuard {
        &self.map.guard
    }

    fn fetch(&self, pos: usize) -> Option<(usize, T)> {
        let _g = self.map.reentrancy.enter();
        let table = self.map.table.borrow();
        let at = table.next_occupied(pos)?;
        let (k, v) = table.entry_at(at)?;
        Some((at, (self.project)(k, v)))
    }
}

pub type Iter<'a, K, V, C = DefaultComparer> = Enumerator<'a, MapSource<'a, K, V, C, (K, V)>>;
pub type KeysIter<'a, K, V, C = DefaultComparer> = Enumerator<'a, MapSource<'a, K, V, C, K>>;
pub type ValuesIter<'a, K, V, C = DefaultComparer> = Enumerator<'a, MapSource<'a, K, V, C, V>>;

impl<'a, K: Clone, V: Clone, C> IntoIterator for &'a GuardedMap<K, V, C> {
    type Item = Result<(K, V)>;
    type IntoIter = Iter<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-only view of a map's keys. Each `iter` call is a separate,
/// guard-tracked enumeration of the owning map.
pub struct Keys<'a, K, V, C = DefaultComparer> {
    map: &'a GuardedMap<K, V, C>,
}

impl<K, V, C> Clone for Keys<'_, K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, C> Copy for Keys<'_, K, V, C> {}

impl<'a, K, V, C> Keys<'a, K, V, C> {
    pub fn len(&self) -> Result<usize> {
        self.map.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.map.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<K> + EqualityComparer<Q>,
    {
        self.map.contains_key(key)
    }

    pub fn iter(&self) -> KeysIter<'a, K, V, C>
    where
        K: Clone,
    {
        Enumerator::new(MapSource {
            map: self.map,
            project: |k, _| k.clone(),
        })
    }
}

impl<'a, K: Clone, V, C> IntoIterator for Keys<'a, K, V, C> {
    type Item = Result<K>;
    type IntoIter = KeysIter<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-only view of a map's values.
pub struct Values<'a, K, V, C = DefaultComparer> {
    map: &'a GuardedMap<K, V, C>,
}

impl<K, V, C> Clone for Values<'_, K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, C> Copy for Values<'_, K, V, C> {}

impl<'a, K, V, C> Values<'a, K, V, C> {
    pub fn len(&self) -> Result<usize> {
        self.map.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.map.is_empty()
    }

    pub fn contains(&self, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.map.contains_value(value)
    }

    pub fn iter(&self) -> ValuesIter<'a, K, V, C>
    where
        V: Clone,
    {
        Enumerator::new(MapSource {
            map: self.map,
            project: |_, v| v.clone(),
        })
    }
}

impl<'a, K, V: Clone, C> IntoIterator for Values<'a, K, V, C> {
    type Item = Result<V>;
    type IntoIter = ValuesIter<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::EnumeratorState;

    fn sample() -> GuardedMap<i32, String> {
        let m = GuardedMap::new();
        m.insert(1, "one".to_string()).unwrap();
        m.insert(2, "two".to_string()).unwrap();
        m.insert(3, "three".to_string()).unwrap();
        m
    }

    /// Invariant: a drifted version fails the next advance even though no
    /// enumeration-aware mutation happened.
    #[test]
    fn version_drift_fails_next_advance() {
        let m = sample();
        let mut it = m.iter();
        assert!(it.advance().unwrap());
        m.guard.bump_version();
        assert!(matches!(
            it.advance(),
            Err(Error::ConcurrentModification { .. })
        ));
        assert_eq!(it.state(), EnumeratorState::Faulted);
        assert!(matches!(it.advance(), Err(Error::InvalidEnumeratorState)));
        drop(it);
        assert_eq!(m.guard.active_enumerations(), 0);
        assert!(m.insert(4, "four".to_string()).is_ok());
    }

    #[test]
    fn rejected_write_does_not_bump_version() {
        let m = sample();
        let v = m.guard.version();
        let it = m.iter();
        assert!(m.insert(9, "nine".to_string()).is_err());
        assert_eq!(m.guard.version(), v);
        drop(it);
        assert!(matches!(
            m.insert(1, "uno".to_string()),
            Err(Error::DuplicateKey)
        ));
        assert_eq!(m.guard.version(), v);
    }

    #[test]
    fn each_mutation_bumps_version_once() {
        let m: GuardedMap<i32, i32> = GuardedMap::new();
        m.insert(1, 1).unwrap();
        assert_eq!(m.guard.version(), 1);
        m.set(1, 2).unwrap();
        assert_eq!(m.guard.version(), 2);
        m.remove(&1).unwrap();
        assert_eq!(m.guard.version(), 3);
        // No-op remove and clear of an empty map are not mutations.
        m.remove(&1).unwrap();
        m.clear().unwrap();
        assert_eq!(m.guard.version(), 3);
    }

    #[test]
    fn debug_output_reports_state() {
        let m = sample();
        let s = format!("{:?}", m);
        assert!(s.contains("len: 3"));
        assert!(s.contains("version: 3"));
    }
}
