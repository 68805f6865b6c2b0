//! GuardedSet: hash set over `HashTable<T, ()>` with an `AccessGuard`.
//!
//! Set algebra takes another `GuardedSet` as its argument. Writes check this
//! set's guard, and every operation also checks the argument's thread
//! affinity because the argument is read. Passing a set to its own algebra
//! operation is allowed: `except_with` and `symmetric_except_with` empty the
//! set, `union_with` and `intersect_with` leave it unchanged.

use crate::access_guard::{AccessGuard, GuardPolicy};
use crate::comparer::{DefaultComparer, EqualityComparer};
use crate::enumerator::{Enumerator, Sealed, Source};
use crate::error::{Error, Result};
use crate::hash_table::{HashTable, InsertOutcome};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::cell::{RefCell, RefMut};
use core::fmt;

pub struct GuardedSet<T, C = DefaultComparer> {
    table: RefCell<HashTable<T, ()>>,
    comparer: C,
    guard: AccessGuard,
    reentrancy: DebugReentrancy,
}

fn same_object<A, B>(a: &A, b: &B) -> bool {
    core::ptr::eq(a as *const A as *const u8, b as *const B as *const u8)
}

fn borrowed<'a, T: 'a, B: Borrow<T>>(items: &'a [B]) -> impl Iterator<Item = &'a T> + 'a {
    items.iter().map(|b| <B as Borrow<T>>::borrow(b))
}

impl<T> GuardedSet<T> {
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

impl<T> Default for GuardedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: core::hash::Hash + Eq> GuardedSet<T> {
    /// Builds a set from `items`; duplicates collapse.
    pub fn try_from_iter<I: IntoIterator<Item = T>>(items: I) -> Result<Self> {
        let set = Self::new();
        set.insert_all(items)?;
        Ok(set)
    }
}

impl<T, C> GuardedSet<T, C> {
    pub fn with_comparer(comparer: C) -> Self {
        Self::from_parts(HashTable::new(), comparer, GuardPolicy::default())
    }

    pub fn with_capacity_and_comparer(capacity: usize, comparer: C) -> Result<Self> {
        Self::with_config(capacity, comparer, GuardPolicy::default())
    }

    pub fn with_config(capacity: usize, comparer: C, policy: GuardPolicy) -> Result<Self> {
        Ok(Self::from_parts(HashTable::with_capacity(capacity)?, comparer, policy))
    }

    fn from_parts(table: HashTable<T, ()>, comparer: C, policy: GuardPolicy) -> Self {
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

    pub fn access_guard(&self) -> &AccessGuard {
        &self.guard
    }

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

    pub fn iter(&self) -> Iter<'_, T, C>
    where
        T: Clone,
    {
        Enumerator::new(SetSource { set: self })
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

    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> Result<usize> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let removed = self.table.borrow_mut().retain(|item, _| keep(item));
        if removed > 0 {
            self.guard.bump_version();
        }
        Ok(removed)
    }

    pub fn trim_excess(&self) -> Result<()> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        self.table.borrow_mut().trim_excess();
        self.guard.bump_version();
        Ok(())
    }
}

impl<T, C> GuardedSet<T, C>
where
    C: EqualityComparer<T>,
{
    fn find<Q>(&self, table: &HashTable<T, ()>, q: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let hash = EqualityComparer::<Q>::hash(&self.comparer, q);
        table.find(hash, |k| EqualityComparer::<Q>::eq(&self.comparer, k.borrow(), q))
    }

    fn validate_all<'i>(&self, items: impl IntoIterator<Item = &'i T>) -> Result<()>
    where
        T: 'i,
    {
        if items.into_iter().all(|x| self.comparer.eq(x, x)) {
            Ok(())
        } else {
            Err(Error::InvalidKey)
        }
    }

    /// Inserts already-validated items, bumping the version once if any
    /// was new.
    fn add_many(&self, items: Vec<T>) -> Result<usize> {
        let mut table = self.table.borrow_mut();
        let mut added = 0;
        let mut outcome = Ok(());
        for item in items {
            match self.add_to(&mut table, item) {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        drop(table);
        if added > 0 {
            self.guard.bump_version();
        }
        outcome.map(|()| added)
    }

    /// Inserts into `table` unless an equal element is present.
    fn add_to(&self, table: &mut HashTable<T, ()>, item: T) -> Result<bool> {
        if !self.comparer.eq(&item, &item) {
            return Err(Error::InvalidKey);
        }
        let hash = self.comparer.hash(&item);
        match table.insert(hash, item, (), false, |a, b| self.comparer.eq(a, b)) {
            Ok(InsertOutcome::Inserted(_)) => Ok(true),
            Ok(InsertOutcome::Overwritten(())) | Err(Error::DuplicateKey) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn contains<Q>(&self, item: &Q) -> Result<bool>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let table = self.table.borrow();
        Ok(self.find(&table, item).is_some())
    }

    /// The stored element equal to `item`.
    pub fn get<Q>(&self, item: &Q) -> Result<Option<T>>
    where
        T: Borrow<Q> + Clone,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let table = self.table.borrow();
        Ok(self
            .find(&table, item)
            .and_then(|i| table.entry_at(i))
            .map(|(k, _)| k.clone()))
    }

    /// Adds `item`; `Ok(false)` if an equal element is already present.
    /// Checked as a write either way.
    pub fn insert(&self, item: T) -> Result<bool> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let added = self.add_to(&mut self.table.borrow_mut(), item)?;
        if added {
            self.guard.bump_version();
        }
        Ok(added)
    }

    /// Adds every element of `items`, returning how many were new.
    pub fn insert_all<I: IntoIterator<Item = T>>(&self, items: I) -> Result<usize> {
        let items: Vec<T> = items.into_iter().collect();
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        self.validate_all(&items)?;
        self.add_many(items)
    }

    pub fn remove<Q>(&self, item: &Q) -> Result<bool>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        Ok(self.take(item)?.is_some())
    }

    /// Removes and returns the stored element equal to `item`.
    pub fn take<Q>(&self, item: &Q) -> Result<Option<T>>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: EqualityComparer<Q>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let mut table = self.table.borrow_mut();
        let taken = match self.find(&table, item) {
            Some(i) => table.remove_slot(i).map(|(k, ())| k),
            None => None,
        };
        drop(table);
        if taken.is_some() {
            self.guard.bump_version();
        }
        Ok(taken)
    }

    /// Adds every element of `other`.
    pub fn union_with<C2>(&self, other: &GuardedSet<T, C2>) -> Result<()>
    where
        T: Clone,
        C2: EqualityComparer<T>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        if same_object(self, other) {
            return Ok(());
        }
        let _o = other.reentrancy.enter();
        other.guard.check_read()?;
        let theirs = other.table.borrow();
        self.validate_all(theirs.keys())?;
        let items: Vec<T> = theirs.keys().cloned().collect();
        self.add_many(items).map(|_| ())
    }

    /// Keeps only elements also present in `other`.
    pub fn intersect_with<C2>(&self, other: &GuardedSet<T, C2>) -> Result<()>
    where
        C2: EqualityComparer<T>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        if same_object(self, other) {
            return Ok(());
        }
        let _o = other.reentrancy.enter();
        other.guard.check_read()?;
        let theirs = other.table.borrow();
        let removed = self
            .table
            .borrow_mut()
            .retain(|item, _| other.find(&theirs, item).is_some());
        if removed > 0 {
            self.guard.bump_version();
        }
        Ok(())
    }

    /// Removes every element present in `other`.
    pub fn except_with<C2>(&self, other: &GuardedSet<T, C2>) -> Result<()>
    where
        C2: EqualityComparer<T>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        if same_object(self, other) {
            return self.clear_unchecked();
        }
        let _o = other.reentrancy.enter();
        other.guard.check_read()?;
        let theirs = other.table.borrow();
        let mut table = self.table.borrow_mut();
        let mut removed = 0;
        for item in theirs.keys() {
            if let Some(i) = self.find(&table, item) {
                table.remove_slot(i);
                removed += 1;
            }
        }
        drop(table);
        if removed > 0 {
            self.guard.bump_version();
        }
        Ok(())
    }

    /// Keeps elements present in exactly one of the two sets.
    pub fn symmetric_except_with<C2>(&self, other: &GuardedSet<T, C2>) -> Result<()>
    where
        T: Clone,
        C2: EqualityComparer<T>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        if same_object(self, other) {
            return self.clear_unchecked();
        }
        let _o = other.reentrancy.enter();
        other.guard.check_read()?;
        let theirs = other.table.borrow();
        let table = self.table.borrow_mut();

        // Decide against the original contents before touching anything.
        let mut shared = Vec::new();
        let mut missing = Vec::new();
        for item in theirs.keys() {
            match self.find(&table, item) {
                Some(i) => shared.push(i),
                None => missing.push(item.clone()),
            }
        }
        self.toggle(table, shared, missing)
    }

    /// Removes the `shared` slots and adds `missing`, bumping the version
    /// once. Nothing changes if any of `missing` is invalid.
    fn toggle(
        &self,
        mut table: RefMut<'_, HashTable<T, ()>>,
        mut shared: Vec<usize>,
        missing: Vec<T>,
    ) -> Result<()> {
        self.validate_all(&missing)?;
        shared.sort_unstable();
        shared.dedup();
        let removed = !shared.is_empty();
        for i in shared {
            table.remove_slot(i);
        }
        drop(table);
        let added = self.add_many(missing);
        if removed && !matches!(added, Ok(n) if n > 0) {
            self.guard.bump_version();
        }
        added.map(|_| ())
    }

    fn clear_unchecked(&self) -> Result<()> {
        let mut table = self.table.borrow_mut();
        if !table.is_empty() {
            table.clear();
            self.guard.bump_version();
        }
        Ok(())
    }

    /// Runs a read-only comparison against `other`, or `same` when `other`
    /// is this set.
    fn compare<C2, R>(
        &self,
        other: &GuardedSet<T, C2>,
        same: impl FnOnce(usize) -> R,
        f: impl FnOnce(&HashTable<T, ()>, &HashTable<T, ()>) -> R,
    ) -> Result<R>
    where
        C2: EqualityComparer<T>,
    {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let ours = self.table.borrow();
        if same_object(self, other) {
            return Ok(same(ours.len()));
        }
        let _o = other.reentrancy.enter();
        other.guard.check_read()?;
        let theirs = other.table.borrow();
        Ok(f(&ours, &theirs))
    }

    /// Distinct elements of this set found in `items`, and items with no
    /// match here (duplicates counted each time).
    fn tally<'i>(
        &self,
        ours: &HashTable<T, ()>,
        items: impl IntoIterator<Item = &'i T>,
    ) -> (usize, usize)
    where
        T: 'i,
    {
        let mut found = vec![false; ours.slot_count()];
        let mut unique_found = 0;
        let mut unfound = 0;
        for item in items {
            match self.find(ours, item) {
                Some(i) if !found[i] => {
                    found[i] = true;
                    unique_found += 1;
                }
                Some(_) => {}
                None => unfound += 1,
            }
        }
        (unique_found, unfound)
    }

    pub fn is_subset_of<C2>(&self, other: &GuardedSet<T, C2>) -> Result<bool>
    where
        C2: EqualityComparer<T>,
    {
        self.compare(
            other,
            |_| true,
            |ours, theirs| ours.is_empty() || self.tally(ours, theirs.keys()).0 == ours.len(),
        )
    }

    pub fn is_proper_subset_of<C2>(&self, other: &GuardedSet<T, C2>) -> Result<bool>
    where
        C2: EqualityComparer<T>,
    {
        self.compare(
            other,
            |_| false,
            |ours, theirs| {
                let (unique_found, unfound) = self.tally(ours, theirs.keys());
                unique_found == ours.len() && unfound > 0
            },
        )
    }

    pub fn is_superset_of<C2>(&self, other: &GuardedSet<T, C2>) -> Result<bool>
    where
        C2: EqualityComparer<T>,
    {
        self.compare(
            other,
            |_| true,
            |ours, theirs| theirs.keys().all(|item| self.find(ours, item).is_some()),
        )
    }

    pub fn is_proper_superset_of<C2>(&self, other: &GuardedSet<T, C2>) -> Result<bool>
    where
        C2: EqualityComparer<T>,
    {
        self.compare(
            other,
            |_| false,
            |ours, theirs| {
                if ours.is_empty() {
                    return false;
                }
                if theirs.is_empty() {
                    return true;
                }
                let (unique_found, unfound) = self.tally(ours, theirs.keys());
                unique_found < ours.len() && unfound == 0
            },
        )
    }

    pub fn overlaps<C2>(&self, other: &GuardedSet<T, C2>) -> Result<bool>
    where
        C2: EqualityComparer<T>,
    {
        self.compare(
            other,
            |len| len > 0,
            |ours, theirs| theirs.keys().any(|item| self.find(ours, item).is_some()),
        )
    }

    pub fn set_equals<C2>(&self, other: &GuardedSet<T, C2>) -> Result<bool>
    where
        C2: EqualityComparer<T>,
    {
        self.compare(
            other,
            |_| true,
            |ours, theirs| {
                let (unique_found, unfound) = self.tally(ours, theirs.keys());
                unique_found == ours.len() && unfound == 0
            },
        )
    }

    // Sequence forms. `items` is drained before this set is touched, so it
    // may itself read from the set; duplicates in it are harmless.

    /// Adds every item; equivalent to [`insert_all`](Self::insert_all).
    pub fn union_with_iter<I: IntoIterator<Item = T>>(&self, items: I) -> Result<()> {
        self.insert_all(items).map(|_| ())
    }

    /// Keeps only elements matched by some item.
    pub fn intersect_with_iter<B, I>(&self, items: I) -> Result<()>
    where
        B: Borrow<T>,
        I: IntoIterator<Item = B>,
    {
        let items: Vec<B> = items.into_iter().collect();
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let mut table = self.table.borrow_mut();
        let mut keep = vec![false; table.slot_count()];
        for item in borrowed::<T, B>(&items) {
            if let Some(i) = self.find(&table, item) {
                keep[i] = true;
            }
        }
        let doomed: Vec<usize> = table
            .iter()
            .filter_map(|(i, _, _)| (!keep[i]).then_some(i))
            .collect();
        for &i in &doomed {
            table.remove_slot(i);
        }
        drop(table);
        if !doomed.is_empty() {
            self.guard.bump_version();
        }
        Ok(())
    }

    /// Removes every element matched by some item.
    pub fn except_with_iter<B, I>(&self, items: I) -> Result<()>
    where
        B: Borrow<T>,
        I: IntoIterator<Item = B>,
    {
        let items: Vec<B> = items.into_iter().collect();
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let mut table = self.table.borrow_mut();
        let mut removed = 0;
        for item in borrowed::<T, B>(&items) {
            if let Some(i) = self.find(&table, item) {
                table.remove_slot(i);
                removed += 1;
            }
        }
        drop(table);
        if removed > 0 {
            self.guard.bump_version();
        }
        Ok(())
    }

    /// Toggles membership of each distinct item against the original
    /// contents: matched elements go, unmatched items are added once.
    pub fn symmetric_except_with_iter<I: IntoIterator<Item = T>>(&self, items: I) -> Result<()> {
        let items: Vec<T> = items.into_iter().collect();
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let table = self.table.borrow_mut();
        let mut shared = Vec::new();
        let mut missing = Vec::new();
        for item in items {
            match self.find(&table, &item) {
                Some(i) => shared.push(i),
                None => missing.push(item),
            }
        }
        self.toggle(table, shared, missing)
    }

    fn compare_items<B, R>(
        &self,
        items: impl IntoIterator<Item = B>,
        f: impl FnOnce(&HashTable<T, ()>, &[B]) -> R,
    ) -> Result<R>
    where
        B: Borrow<T>,
    {
        let items: Vec<B> = items.into_iter().collect();
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let ours = self.table.borrow();
        Ok(f(&ours, &items))
    }

    pub fn is_subset_of_iter<B: Borrow<T>>(
        &self,
        items: impl IntoIterator<Item = B>,
    ) -> Result<bool> {
        self.compare_items(items, |ours, items| {
            ours.is_empty() || self.tally(ours, borrowed::<T, B>(items)).0 == ours.len()
        })
    }

    pub fn is_proper_subset_of_iter<B: Borrow<T>>(
        &self,
        items: impl IntoIterator<Item = B>,
    ) -> Result<bool> {
        self.compare_items(items, |ours, items| {
            let (unique_found, unfound) = self.tally(ours, borrowed::<T, B>(items));
            unique_found == ours.len() && unfound > 0
        })
    }

    pub fn is_superset_of_iter<B: Borrow<T>>(
        &self,
        items: impl IntoIterator<Item = B>,
    ) -> Result<bool> {
        self.compare_items(items, |ours, items| {
            borrowed::<T, B>(items).all(|item| self.find(ours, item).is_some())
        })
    }

    pub fn is_proper_superset_of_iter<B: Borrow<T>>(
        &self,
        items: impl IntoIterator<Item = B>,
    ) -> Result<bool> {
        self.compare_items(items, |ours, items| {
            if ours.is_empty() {
                return false;
            }
            if items.is_empty() {
                return true;
            }
            let (unique_found, unfound) = self.tally(ours, borrowed::<T, B>(items));
            unique_found < ours.len() && unfound == 0
        })
    }

    pub fn overlaps_iter<B: Borrow<T>>(&self, items: impl IntoIterator<Item = B>) -> Result<bool> {
        self.compare_items(items, |ours, items| {
            borrowed::<T, B>(items).any(|item| self.find(ours, item).is_some())
        })
    }

    pub fn set_equals_iter<B: Borrow<T>>(
        &self,
        items: impl IntoIterator<Item = B>,
    ) -> Result<bool> {
        self.compare_items(items, |ours, items| {
            let (unique_found, unfound) = self.tally(ours, borrowed::<T, B>(items));
            unique_found == ours.len() && unfound == 0
        })
    }
}

impl<T, C> fmt::Debug for GuardedSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GuardedSet");
        if let Ok(table) = self.table.try_borrow() {
            s.field("len", &table.len());
        }
        s.field("version", &self.guard.version())
            .field("enumerations", &self.guard.active_enumerations())
            .field("policy", &self.guard.policy())
            .finish()
    }
}

pub struct SetSource<'a, T, C> {
    set: &'a GuardedSet<T, C>,
}

impl<T, C> Sealed for SetSource<'_, T, C> {}

impl<'a, T: Clone, C> Source<'a> for SetSource<'a, T, C> {
    type Item = T;

    fn guard(&self) -> &'a AccessGuard {
        &self.set.guard
    }

    fn fetch(&self, pos: usize) -> Option<(usize, T)> {
        let _g = self.set.reentrancy.enter();
        let table = self.set.table.borrow();
        let at = table.next_occupied(pos)?;
        let (item, _) = table.entry_at(at)?;
        Some((at, item.clone()))
    }
}

pub type Iter<'a, T, C = DefaultComparer> = Enumerator<'a, SetSource<'a, T, C>>;

impl<'a, T: Clone, C> IntoIterator for &'a GuardedSet<T, C> {
    type Item = Result<T>;
    type IntoIter = Iter<'a, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(items: &[i32]) -> GuardedSet<i32> {
        GuardedSet::try_from_iter(items.iter().copied()).unwrap()
    }

    #[test]
    fn tally_counts_each_local_element_once() {
        let a = set_of(&[1, 2, 3]);
        let b = set_of(&[2, 3, 4, 5]);
        let ours = a.table.borrow();
        let theirs = b.table.borrow();
        assert_eq!(a.tally(&ours, theirs.keys()), (2, 2));
    }

    /// Invariant: an algebra write with nothing to do leaves the version alone.
    #[test]
    fn no_op_algebra_does_not_bump_version() {
        let a = set_of(&[1, 2]);
        let b = set_of(&[1, 2]);
        let before = a.guard.version();
        a.union_with(&b).unwrap();
        a.intersect_with(&b).unwrap();
        a.except_with(&set_of(&[9])).unwrap();
        assert_eq!(a.guard.version(), before);
        a.symmetric_except_with(&b).unwrap();
        assert_eq!(a.guard.version(), before + 1);
        assert!(a.is_empty().unwrap());
    }

    #[test]
    fn self_algebra_is_handled_without_reentering() {
        let a = set_of(&[1, 2, 3]);
        a.union_with(&a).unwrap();
        a.intersect_with(&a).unwrap();
        assert_eq!(a.len().unwrap(), 3);
        assert!(a.is_subset_of(&a).unwrap());
        assert!(!a.is_proper_subset_of(&a).unwrap());
        assert!(a.set_equals(&a).unwrap());
        assert!(a.overlaps(&a).unwrap());
        a.symmetric_except_with(&a).unwrap();
        assert!(a.is_empty().unwrap());
        assert!(!a.overlaps(&a).unwrap());
    }

    #[test]
    fn invalid_element_rejects_whole_batch() {
        let s = GuardedSet::with_comparer(crate::FnComparer::new(
            |x: &f64| x.to_bits(),
            |a: &f64, b: &f64| a == b,
        ));
        s.insert(1.0).unwrap();
        let before = s.guard.version();
        assert!(matches!(
            s.insert_all([2.0, f64::NAN, 3.0]),
            Err(Error::InvalidKey)
        ));
        assert_eq!(s.len().unwrap(), 1);
        assert_eq!(s.guard.version(), before);
    }
}
