//! HashTable: open-chained hash table engine behind `GuardedMap` and
//! `GuardedSet`.
//!
//! Layout
//! - `buckets[hash % buckets.len()]` holds the index of the first slot of
//!   that bucket's chain, or `None`.
//! - `slots` is a dense array of `Slot`s. Live slots link to the next slot of
//!   their chain; free slots link to the next free slot. The variant is the
//!   discriminant, so the two link meanings never mix.
//! - `slots.len()` is the high-water mark. New entries reuse a free slot
//!   first and otherwise append; the slot array grows (and every live entry
//!   is rehashed) only when it is full and the free list is empty.
//! - `buckets.len()` is the capacity, always a prime from `primes`.
//!
//! Invariants
//! - Every live slot is reachable from exactly one bucket chain.
//! - `free_count` equals the length of the chain starting at `free_list`.
//! - `len() == slots.len() - free_count <= capacity()`.
//!
//! The table never hashes keys itself: callers pass the hash and an
//! equality predicate, and stored hashes are reused on rehash. This keeps
//! user code out of growth.

use crate::error::{Error, Result};
use crate::primes;
use core::mem;

#[derive(Debug)]
enum Slot<K, V> {
    Live {
        hash: u64,
        next: Option<usize>,
        key: K,
        value: V,
    },
    Free {
        next_free: Option<usize>,
    },
}

/// Result of a successful `insert`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InsertOutcome<V> {
    Inserted(usize),
    /// The key was present and overwriting was allowed; carries the old value.
    Overwritten(V),
}

#[derive(Debug)]
pub(crate) struct HashTable<K, V> {
    buckets: Vec<Option<usize>>,
    slots: Vec<Slot<K, V>>,
    free_list: Option<usize>,
    free_count: usize,
}

impl<K, V> HashTable<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            buckets: Vec::new(),
            slots: Vec::new(),
            free_list: None,
            free_count: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity > primes::MAX_PRIME_ARRAY_LENGTH {
            return Err(Error::CapacityOverflow);
        }
        let mut table = Self::new();
        if capacity > 0 {
            table.initialize(capacity);
        }
        Ok(table)
    }

    fn initialize(&mut self, capacity: usize) {
        let size = primes::get_prime(capacity);
        self.buckets = vec![None; size];
        self.slots = Vec::with_capacity(size);
        self.free_list = None;
        self.free_count = 0;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_count
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Number of slot positions an enumerator has to walk.
    #[inline]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Index of the live slot whose key matches, if any.
    pub(crate) fn find(&self, hash: u64, mut eq: impl FnMut(&K) -> bool) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut cursor = self.buckets[self.bucket_of(hash)];
        while let Some(i) = cursor {
            match &self.slots[i] {
                Slot::Live {
                    hash: h, next, key, ..
                } => {
                    if *h == hash && eq(key) {
                        return Some(i);
                    }
                    cursor = *next;
                }
                Slot::Free { .. } => {
                    debug_assert!(false, "free slot {i} linked from a bucket chain");
                    break;
                }
            }
        }
        None
    }

    /// Inserts `key`/`value` under `hash`. `eq(stored, new)` decides key
    /// equality.
    ///
    /// With `overwrite == false` an existing key fails with `DuplicateKey`
    /// before any slot is touched.
    pub(crate) fn insert(
        &mut self,
        hash: u64,
        key: K,
        value: V,
        overwrite: bool,
        mut eq: impl FnMut(&K, &K) -> bool,
    ) -> Result<InsertOutcome<V>> {
        if let Some(i) = self.find(hash, |stored| eq(stored, &key)) {
            if !overwrite {
                return Err(Error::DuplicateKey);
            }
            return match &mut self.slots[i] {
                Slot::Live { value: slot, .. } => {
                    Ok(InsertOutcome::Overwritten(mem::replace(slot, value)))
                }
                Slot::Free { .. } => unreachable!("find returned a free slot"),
            };
        }
        self.insert_new(hash, key, value).map(InsertOutcome::Inserted)
    }

    /// Inserts an entry the caller has already checked to be absent.
    pub(crate) fn insert_new(&mut self, hash: u64, key: K, value: V) -> Result<usize> {
        if self.buckets.is_empty() {
            self.initialize(0);
        }
        let index = match self.free_list {
            Some(free) => {
                let next_free = match &self.slots[free] {
                    Slot::Free { next_free } => *next_free,
                    Slot::Live { .. } => unreachable!("live slot {free} on the free list"),
                };
                self.free_list = next_free;
                self.free_count -= 1;
                free
            }
            None => {
                if self.slots.len() == self.buckets.len() {
                    self.grow()?;
                }
                self.slots.push(Slot::Free { next_free: None });
                self.slots.len() - 1
            }
        };
        let bucket = self.bucket_of(hash);
        self.slots[index] = Slot::Live {
            hash,
            next: self.buckets[bucket],
            key,
            value,
        };
        self.buckets[bucket] = Some(index);
        Ok(index)
    }

    /// Removes the entry matching `eq`, returning it.
    pub(crate) fn remove(&mut self, hash: u64, eq: impl FnMut(&K) -> bool) -> Option<(K, V)> {
        let index = self.find(hash, eq)?;
        self.remove_slot(index)
    }

    /// Unlinks slot `index` from its bucket chain and puts it on the free list.
    pub(crate) fn remove_slot(&mut self, index: usize) -> Option<(K, V)> {
        let (hash, next) = match self.slots.get(index)? {
            Slot::Live { hash, next, .. } => (*hash, *next),
            Slot::Free { .. } => return None,
        };
        let bucket = self.bucket_of(hash);
        if self.buckets[bucket] == Some(index) {
            self.buckets[bucket] = next;
        } else {
            let mut cursor = self.buckets[bucket];
            while let Some(i) = cursor {
                match &mut self.slots[i] {
                    Slot::Live { next: link, .. } => {
                        if *link == Some(index) {
                            *link = next;
                            break;
                        }
                        cursor = *link;
                    }
                    Slot::Free { .. } => break,
                }
            }
        }
        let freed = mem::replace(
            &mut self.slots[index],
            Slot::Free {
                next_free: self.free_list,
            },
        );
        self.free_list = Some(index);
        self.free_count += 1;
        if self.is_empty() {
            // Restart from slot 0 once the last entry is gone.
            self.slots.clear();
            self.free_list = None;
            self.free_count = 0;
        }
        match freed {
            Slot::Live { key, value, .. } => Some((key, value)),
            Slot::Free { .. } => None,
        }
    }

    /// Doubles the table to the next prime and rehashes every live entry.
    fn grow(&mut self) -> Result<()> {
        let new_size = primes::expand_prime(self.slots.len())?;
        log::debug!(
            "hash table grow: {} -> {} ({} live)",
            self.buckets.len(),
            new_size,
            self.len()
        );
        self.slots.reserve_exact(new_size - self.slots.len());
        self.rebuild_buckets(new_size);
        Ok(())
    }

    fn rebuild_buckets(&mut self, size: usize) {
        let mut buckets = vec![None; size];
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Slot::Live { hash, next, .. } = slot {
                let b = (*hash % size as u64) as usize;
                *next = buckets[b];
                buckets[b] = Some(i);
            }
        }
        self.buckets = buckets;
    }

    /// Drops every entry; capacity is kept.
    pub(crate) fn clear(&mut self) {
        self.buckets.fill(None);
        self.slots.clear();
        self.free_list = None;
        self.free_count = 0;
    }

    /// Compacts live entries into the smallest prime table that holds them,
    /// or releases storage entirely when empty.
    pub(crate) fn trim_excess(&mut self) {
        if self.is_empty() {
            *self = Self::new();
            return;
        }
        let size = primes::get_prime(self.len());
        let mut slots = Vec::with_capacity(size);
        for slot in self.slots.drain(..) {
            if let live @ Slot::Live { .. } = slot {
                slots.push(live);
            }
        }
        self.slots = slots;
        self.free_list = None;
        self.free_count = 0;
        self.rebuild_buckets(size);
    }

    /// Removes every entry for which `keep` returns false. Returns the number
    /// removed.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let mut removed = 0;
        let mut i = 0;
        // remove_slot may reset `slots` when the last entry goes.
        while i < self.slots.len() {
            let drop_it = match &self.slots[i] {
                Slot::Live { key, value, .. } => !keep(key, value),
                Slot::Free { .. } => false,
            };
            if drop_it && self.remove_slot(i).is_some() {
                removed += 1;
            }
            i += 1;
        }
        removed
    }

    /// Key and value stored at `index`, if that slot is live.
    #[inline]
    pub(crate) fn entry_at(&self, index: usize) -> Option<(&K, &V)> {
        match self.slots.get(index)? {
            Slot::Live { key, value, .. } => Some((key, value)),
            Slot::Free { .. } => None,
        }
    }

    /// First live slot at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.slots.len()).find(|&i| matches!(self.slots[i], Slot::Live { .. }))
    }

    /// Live entries in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &K, &V)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Live { key, value, .. } => Some((i, key, value)),
            Slot::Free { .. } => None,
        })
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(_, key, _)| key)
    }

    #[cfg(test)]
    pub(crate) fn free_list_len(&self) -> usize {
        let mut n = 0;
        let mut cursor = self.free_list;
        while let Some(i) = cursor {
            n += 1;
            cursor = match &self.slots[i] {
                Slot::Free { next_free } => *next_free,
                Slot::Live { .. } => panic!("live slot {i} on the free list"),
            };
        }
        n
    }

    #[cfg(test)]
    pub(crate) fn chained_len(&self) -> usize {
        let mut n = 0;
        for head in &self.buckets {
            let mut cursor = *head;
            while let Some(i) = cursor {
                n += 1;
                cursor = match &self.slots[i] {
                    Slot::Live { next, .. } => *next,
                    Slot::Free { .. } => panic!("free slot {i} in a bucket chain"),
                };
            }
        }
        n
    }
}

impl<K, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(k: u64) -> u64 {
        k.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    fn insert(t: &mut HashTable<u64, String>, k: u64, v: &str) -> Result<InsertOutcome<String>> {
        t.insert(h(k), k, v.to_string(), false, |a, b| a == b)
    }

    fn get(t: &HashTable<u64, String>, k: u64) -> Option<&String> {
        t.find(h(k), |x| *x == k)
            .and_then(|i| t.entry_at(i))
            .map(|(_, v)| v)
    }

    fn assert_consistent<K, V>(t: &HashTable<K, V>) {
        assert_eq!(t.free_list_len(), t.free_count);
        assert_eq!(t.chained_len(), t.len());
        assert!(t.len() <= t.capacity() || t.capacity() == 0);
    }

    /// Invariant: count equals live slots after adds and removes.
    #[test]
    fn count_tracks_live_slots() {
        let mut t = HashTable::new();
        for k in 1..=3 {
            insert(&mut t, k, "v").unwrap();
        }
        assert!(t.remove(h(2), |x| *x == 2).is_some());
        assert_eq!(t.len(), 2);
        assert_consistent(&t);
    }

    /// Invariant: duplicate insert fails and leaves storage untouched.
    #[test]
    fn duplicate_insert_is_storage_noop() {
        let mut t = HashTable::new();
        insert(&mut t, 7, "a").unwrap();
        let slots_before = t.slot_count();
        assert!(matches!(insert(&mut t, 7, "b"), Err(Error::DuplicateKey)));
        assert_eq!(t.slot_count(), slots_before);
        assert_eq!(get(&t, 7).map(String::as_str), Some("a"));
    }

    #[test]
    fn overwrite_returns_old_value() {
        let mut t = HashTable::new();
        insert(&mut t, 1, "a").unwrap();
        let out = t.insert(h(1), 1, "b".to_string(), true, |a, b| a == b).unwrap();
        assert_eq!(out, InsertOutcome::Overwritten("a".to_string()));
        assert_eq!(t.len(), 1);
        assert_eq!(get(&t, 1).map(String::as_str), Some("b"));
    }

    #[test]
    fn removing_missing_key_returns_none() {
        let mut t: HashTable<u64, String> = HashTable::new();
        assert!(t.remove(h(1), |x| *x == 1).is_none());
        insert(&mut t, 1, "a").unwrap();
        assert!(t.remove(h(2), |x| *x == 2).is_none());
        assert_eq!(t.len(), 1);
    }

    /// Invariant: freed slots are reused before the slot array grows.
    #[test]
    fn free_slots_are_reused() {
        let mut t = HashTable::with_capacity(7).unwrap();
        for k in 0..5 {
            insert(&mut t, k, "v").unwrap();
        }
        t.remove(h(1), |x| *x == 1).unwrap();
        t.remove(h(3), |x| *x == 3).unwrap();
        assert_eq!(t.free_count, 2);
        assert_consistent(&t);
        let slots = t.slot_count();
        insert(&mut t, 10, "v").unwrap();
        insert(&mut t, 11, "v").unwrap();
        assert_eq!(t.slot_count(), slots);
        assert_eq!(t.free_count, 0);
        assert_consistent(&t);
    }

    /// Invariant: every key survives at least two grow operations.
    #[test]
    fn resize_preserves_entries() {
        let mut t = HashTable::new();
        let n = 200u64;
        for k in 0..n {
            insert(&mut t, k, &format!("v{k}")).unwrap();
        }
        // 3 -> 7 -> 17 -> 37 -> 89 -> 197 -> 431
        assert!(t.capacity() >= n as usize);
        assert!(primes::is_prime(t.capacity()));
        for k in 0..n {
            assert_eq!(get(&t, k), Some(&format!("v{k}")));
        }
        assert_consistent(&t);
    }

    #[test]
    fn colliding_hashes_chain_correctly() {
        let mut t = HashTable::new();
        for k in 0..20u64 {
            t.insert(42, k, k * 10, false, |a, b| a == b).unwrap();
        }
        for k in 0..20u64 {
            let i = t.find(42, |x| *x == k).unwrap();
            assert_eq!(t.entry_at(i), Some((&k, &(k * 10))));
        }
        // Remove from the middle of the chain.
        assert_eq!(t.remove(42, |x| *x == 7), Some((7, 70)));
        assert!(t.find(42, |x| *x == 7).is_none());
        assert_eq!(t.len(), 19);
        assert_consistent(&t);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut t = HashTable::new();
        for k in 0..50 {
            insert(&mut t, k, "v").unwrap();
        }
        let cap = t.capacity();
        t.clear();
        assert_eq!(t.len(), 0);
        assert_eq!(t.capacity(), cap);
        assert!(get(&t, 3).is_none());
        insert(&mut t, 3, "again").unwrap();
        assert_eq!(get(&t, 3).map(String::as_str), Some("again"));
    }

    #[test]
    fn removing_last_entry_resets_slots() {
        let mut t = HashTable::new();
        insert(&mut t, 1, "a").unwrap();
        insert(&mut t, 2, "b").unwrap();
        t.remove(h(1), |x| *x == 1).unwrap();
        t.remove(h(2), |x| *x == 2).unwrap();
        assert_eq!(t.slot_count(), 0);
        assert_eq!(t.free_count, 0);
        assert!(t.free_list.is_none());
    }

    #[test]
    fn retain_removes_matching_entries() {
        let mut t = HashTable::new();
        for k in 0..30u64 {
            t.insert(h(k), k, (), false, |a, b| a == b).unwrap();
        }
        let removed = t.retain(|k, _| k % 3 == 0);
        assert_eq!(removed, 20);
        assert_eq!(t.len(), 10);
        assert!(t.iter().all(|(_, k, _)| k % 3 == 0));
        assert_consistent(&t);
    }

    #[test]
    fn retain_everything_away() {
        let mut t = HashTable::new();
        for k in 0..5u64 {
            t.insert(h(k), k, (), false, |a, b| a == b).unwrap();
        }
        assert_eq!(t.retain(|_, _| false), 5);
        assert!(t.is_empty());
        assert_consistent(&t);
    }

    #[test]
    fn trim_excess_compacts() {
        let mut t = HashTable::new();
        for k in 0..100 {
            insert(&mut t, k, "v").unwrap();
        }
        for k in 0..95 {
            t.remove(h(k), |x| *x == k).unwrap();
        }
        t.trim_excess();
        assert_eq!(t.len(), 5);
        assert_eq!(t.slot_count(), 5);
        assert_eq!(t.capacity(), 7);
        for k in 95..100 {
            assert!(get(&t, k).is_some());
        }
        assert_consistent(&t);

        t.clear();
        t.trim_excess();
        assert_eq!(t.capacity(), 0);
    }

    #[test]
    fn next_occupied_skips_free_slots() {
        let mut t = HashTable::with_capacity(7).unwrap();
        for k in 0..4 {
            insert(&mut t, k, "v").unwrap();
        }
        let i1 = t.find(h(1), |x| *x == 1).unwrap();
        t.remove_slot(i1).unwrap();
        let mut seen = Vec::new();
        let mut pos = 0;
        while let Some(i) = t.next_occupied(pos) {
            seen.push(*t.entry_at(i).unwrap().0);
            pos = i + 1;
        }
        seen.sort();
        assert_eq!(seen, vec![0, 2, 3]);
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        assert!(matches!(
            HashTable::<u32, ()>::with_capacity(usize::MAX),
            Err(Error::CapacityOverflow)
        ));
        assert!(HashTable::<u32, ()>::with_capacity(primes::MAX_PRIME_ARRAY_LENGTH + 1).is_err());
        let t = HashTable::<u32, ()>::with_capacity(100).unwrap();
        assert!(t.capacity() >= 100);
    }
}
