//! ArrayBuffer: growable contiguous storage behind `GuardedVec`.
//!
//! Capacity is tracked explicitly rather than read back from `Vec`, so the
//! growth policy (double, floor of four, capped) is deterministic.

use crate::error::{Error, Result};

pub(crate) const DEFAULT_CAPACITY: usize = 4;
pub(crate) const MAX_ARRAY_LENGTH: usize = 0x7FEF_FFFF;

#[derive(Debug)]
pub(crate) struct ArrayBuffer<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> ArrayBuffer<T> {
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            capacity: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity > MAX_ARRAY_LENGTH {
            return Err(Error::CapacityOverflow);
        }
        Ok(Self {
            items: Vec::with_capacity(capacity),
            capacity,
        })
    }

    pub(crate) fn from_vec(items: Vec<T>) -> Result<Self> {
        if items.len() > MAX_ARRAY_LENGTH {
            return Err(Error::CapacityOverflow);
        }
        let capacity = items.len();
        Ok(Self { items, capacity })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Result<&T> {
        let len = self.items.len();
        self.items
            .get(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Grows to at least `min`: double the current capacity (four when
    /// empty), capped at `MAX_ARRAY_LENGTH`, and never less than `min`.
    pub(crate) fn ensure_capacity(&mut self, min: usize) -> Result<()> {
        if self.capacity >= min {
            return Ok(());
        }
        if min > MAX_ARRAY_LENGTH {
            return Err(Error::CapacityOverflow);
        }
        let doubled = if self.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity.saturating_mul(2).min(MAX_ARRAY_LENGTH)
        };
        self.set_capacity(doubled.max(min))
    }

    /// Reallocates to exactly `capacity` slots.
    pub(crate) fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        let len = self.items.len();
        if capacity < len {
            return Err(Error::InvalidCapacity {
                requested: capacity,
                len,
            });
        }
        if capacity > MAX_ARRAY_LENGTH {
            return Err(Error::CapacityOverflow);
        }
        if capacity == self.capacity {
            return Ok(());
        }
        log::debug!("array buffer realloc: {} -> {}", self.capacity, capacity);
        if capacity > self.items.capacity() {
            self.items.reserve_exact(capacity - len);
        } else {
            self.items.shrink_to(capacity);
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Shrinks to `len` when less than 90% of capacity is in use.
    pub(crate) fn trim_excess(&mut self) -> Result<()> {
        let threshold = (self.capacity as f64 * 0.9) as usize;
        if self.items.len() >= threshold {
            return Ok(());
        }
        self.set_capacity(self.items.len())
    }

    pub(crate) fn push(&mut self, value: T) -> Result<()> {
        let len = self.items.len();
        if len == self.capacity {
            self.ensure_capacity(len + 1)?;
        }
        self.items.push(value);
        Ok(())
    }

    /// Inserts at `index` in `[0, len]`, shifting later elements up.
    pub(crate) fn insert_at(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.items.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if len == self.capacity {
            self.ensure_capacity(len + 1)?;
        }
        self.items.insert(index, value);
        Ok(())
    }

    /// Inserts all of `values` at `index`, preserving their order.
    pub(crate) fn insert_range(&mut self, index: usize, values: Vec<T>) -> Result<usize> {
        let len = self.items.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let count = values.len();
        if count == 0 {
            return Ok(0);
        }
        self.ensure_capacity(len.checked_add(count).ok_or(Error::CapacityOverflow)?)?;
        self.items.splice(index..index, values);
        Ok(count)
    }

    /// Removes and returns the element at `index` in `[0, len)`.
    pub(crate) fn remove_at(&mut self, index: usize) -> Result<T> {
        let len = self.items.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        Ok(self.items.remove(index))
    }

    pub(crate) fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        let len = self.items.len();
        let end = index.checked_add(count).filter(|&end| end <= len).ok_or(
            Error::IndexOutOfRange {
                index: index.saturating_add(count),
                len,
            },
        )?;
        self.items.drain(index..end);
        Ok(())
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|x| keep(x));
        before - self.items.len()
    }

    pub(crate) fn reverse(&mut self) {
        self.items.reverse();
    }

    pub(crate) fn sort_by(&mut self, compare: impl FnMut(&T, &T) -> core::cmp::Ordering) {
        self.items.sort_by(compare);
    }

    /// Drops all elements; capacity is kept.
    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> Default for ArrayBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
