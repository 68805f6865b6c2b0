//! GuardedVec: ordered, index-addressable sequence over `ArrayBuffer`.

use crate::access_guard::{AccessGuard, GuardPolicy};
use crate::array_buffer::ArrayBuffer;
use crate::enumerator::{Enumerator, Sealed, Source};
use crate::error::Result;
use crate::reentrancy::DebugReentrancy;
use core::cell::RefCell;
use core::cmp::Ordering;
use core::fmt;

/// Growable array with the same enumeration and thread-affinity checks as
/// [`GuardedMap`](crate::GuardedMap).
///
/// `set` replaces an element in place but is still a structural write: it
/// bumps the version and fails while an enumeration is live. Callbacks
/// (`retain`, `sort_by`, `find_index`) must not call back into the vector.
pub struct GuardedVec<T> {
    buf: RefCell<ArrayBuffer<T>>,
    guard: AccessGuard,
    reentrancy: DebugReentrancy,
}

impl<T> GuardedVec<T> {
    pub fn new() -> Self {
        Self::with_policy(GuardPolicy::default())
    }

    pub fn with_policy(policy: GuardPolicy) -> Self {
        Self::from_parts(ArrayBuffer::new(), policy)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(capacity, GuardPolicy::default())
    }

    pub fn with_config(capacity: usize, policy: GuardPolicy) -> Result<Self> {
        Ok(Self::from_parts(ArrayBuffer::with_capacity(capacity)?, policy))
    }

    /// Takes ownership of `items`; capacity starts at `items.len()`.
    pub fn from_vec(items: Vec<T>) -> Result<Self> {
        Self::from_vec_with_policy(items, GuardPolicy::default())
    }

    pub fn from_vec_with_policy(items: Vec<T>, policy: GuardPolicy) -> Result<Self> {
        Ok(Self::from_parts(ArrayBuffer::from_vec(items)?, policy))
    }

    fn from_parts(buf: ArrayBuffer<T>, policy: GuardPolicy) -> Self {
        Self {
            buf: RefCell::new(buf),
            guard: AccessGuard::new(policy),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn access_guard(&self) -> &AccessGuard {
        &self.guard
    }

    pub fn release_thread_affinity(&self) -> Result<()> {
        self.guard.release_thread()
    }

    fn read<R>(&self, f: impl FnOnce(&ArrayBuffer<T>) -> R) -> Result<R> {
        let _g = self.reentrancy.enter();
        self.guard.check_read()?;
        let buf = self.buf.borrow();
        Ok(f(&*buf))
    }

    /// Runs a structural write; the version moves only if `f` succeeds and
    /// reports a change.
    fn write<R>(&self, f: impl FnOnce(&mut ArrayBuffer<T>) -> Result<(R, bool)>) -> Result<R> {
        let _g = self.reentrancy.enter();
        self.guard.check_write()?;
        let (out, changed) = f(&mut *self.buf.borrow_mut())?;
        if changed {
            self.guard.bump_version();
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<usize> {
        self.read(|b| b.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> Result<usize> {
        self.read(|b| b.capacity())
    }

    pub fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.read(|b| b.get(index).cloned())?
    }

    pub fn get_with<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.read(|b| b.get(index).map(f))?
    }

    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.read(|b| b.as_slice().contains(value))
    }

    pub fn index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.read(|b| b.as_slice().iter().position(|x| x == value))
    }

    pub fn last_index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.read(|b| b.as_slice().iter().rposition(|x| x == value))
    }

    pub fn find_index(&self, pred: impl FnMut(&T) -> bool) -> Result<Option<usize>> {
        self.read(|b| b.as_slice().iter().position(pred))
    }

    /// Snapshot of the current contents.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.read(|b| b.as_slice().to_vec())
    }

    /// Enumerates elements in order. Thread affinity is checked here; a
    /// foreign thread gets an enumerator whose first step fails.
    pub fn iter(&self) -> Iter<'_, T>
    where
        T: Clone,
    {
        Enumerator::new(VecSource { vec: self })
    }

    pub fn push(&self, value: T) -> Result<()> {
        self.write(|b| b.push(value).map(|()| ((), true)))
    }

    /// Inserts at `index` in `[0, len]`.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        self.write(|b| b.insert_at(index, value).map(|()| ((), true)))
    }

    pub fn insert_range<I: IntoIterator<Item = T>>(&self, index: usize, values: I) -> Result<usize> {
        let values: Vec<T> = values.into_iter().collect();
        self.write(|b| b.insert_range(index, values).map(|n| (n, n > 0)))
    }

    /// Appends every element of `values`.
    pub fn extend_from<I: IntoIterator<Item = T>>(&self, values: I) -> Result<usize> {
        let values: Vec<T> = values.into_iter().collect();
        self.write(|b| {
            let at = b.len();
            b.insert_range(at, values).map(|n| (n, n > 0))
        })
    }

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&self, index: usize, value: T) -> Result<T> {
        self.write(|b| {
            let slot = b.get_mut(index)?;
            Ok((core::mem::replace(slot, value), true))
        })
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.write(|b| match b.as_slice().iter().position(|x| x == value) {
            Some(i) => b.remove_at(i).map(|_| (true, true)),
            None => Ok((false, false)),
        })
    }

    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.write(|b| b.remove_at(index).map(|v| (v, true)))
    }

    pub fn remove_range(&self, index: usize, count: usize) -> Result<()> {
        self.write(|b| b.remove_range(index, count).map(|()| ((), count > 0)))
    }

    pub fn retain(&self, keep: impl FnMut(&T) -> bool) -> Result<usize> {
        self.write(|b| {
            let removed = b.retain(keep);
            Ok((removed, removed > 0))
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.write(|b| {
            let changed = b.len() > 0;
            b.clear();
            Ok(((), changed))
        })
    }

    pub fn reverse(&self) -> Result<()> {
        self.write(|b| {
            b.reverse();
            Ok(((), b.len() > 1))
        })
    }

    pub fn sort(&self) -> Result<()>
    where
        T: Ord,
    {
        self.sort_by(T::cmp)
    }

    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Result<()> {
        self.write(|b| {
            b.sort_by(compare);
            Ok(((), b.len() > 1))
        })
    }

    /// Reallocates to exactly `capacity`; `InvalidCapacity` below `len`.
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        self.write(|b| {
            let changed = b.capacity() != capacity;
            b.set_capacity(capacity).map(|()| ((), changed))
        })
    }

    pub fn trim_excess(&self) -> Result<()> {
        self.write(|b| {
            let before = b.capacity();
            b.trim_excess()?;
            Ok(((), b.capacity() != before))
        })
    }
}

impl<T> Default for GuardedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for GuardedVec<T> {
    /// Panics if the input exceeds the maximum array length, like
    /// `Vec::from_iter` on capacity overflow.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        match Self::from_vec(iter.into_iter().collect()) {
            Ok(v) => v,
            Err(e) => panic!("GuardedVec::from_iter: {e}"),
        }
    }
}

impl<T> fmt::Debug for GuardedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("GuardedVec");
        if let Ok(buf) = self.buf.try_borrow() {
            s.field("len", &buf.len());
            s.field("capacity", &buf.capacity());
        }
        s.field("version", &self.guard.version())
            .field("enumerations", &self.guard.active_enumerations())
            .finish()
    }
}

pub struct VecSource<'a, T> {
    vec: &'a GuardedVec<T>,
}

impl<T> Sealed for VecSource<'_, T> {}

impl<'a, T: Clone> Source<'a> for VecSource<'a, T> {
    type Item = T;

    fn guard(&self) -> &'a AccessGuard {
        &self.vec.guard
    }

    fn fetch(&self, pos: usize) -> Option<(usize, T)> {
        let _g = self.vec.reentrancy.enter();
        let buf = self.vec.buf.borrow();
        buf.as_slice().get(pos).map(|x| (pos, x.clone()))
    }
}

pub type Iter<'a, T> = Enumerator<'a, VecSource<'a, T>>;

impl<'a, T: Clone> IntoIterator for &'a GuardedVec<T> {
    type Item = Result<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
