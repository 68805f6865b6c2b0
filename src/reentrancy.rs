//! Debug-only reentrancy guard.
//!
//! Containers run user code (comparers, `Clone`, predicates) while their
//! storage is borrowed. Calling back into the same container from that code
//! is a bug; in debug builds it panics here with a clear message instead of
//! surfacing as a `RefCell` borrow failure. In release builds `enter` does
//! nothing.
//!
//! Unlike [`AccessGuard`](crate::AccessGuard), this is not a reportable
//! hazard: it protects the container's own invariants.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-container busy flag. Guard storage-touching sections with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug, Default)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // !Sync in every build; still Send so containers can change threads.
    _not_sync: PhantomData<Cell<()>>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _not_sync: PhantomData,
        }
    }

    /// Marks the container busy until the returned section is dropped.
    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        if self.busy.replace(true) {
            panic!("reentrancy detected: collection accessed from its own comparer or callback");
        }
        Section { owner: self }
    }
}

pub(crate) struct Section<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    owner: &'a DebugReentrancy,
}

impl Drop for Section<'_> {
    #[inline]
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}
