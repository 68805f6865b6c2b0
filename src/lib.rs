//! guarded-collections: hash map, hash set and growable array that fail
//! loudly when they are changed while being enumerated, or touched from a
//! thread other than their owner.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: turn two classic collection hazards into synchronous errors
//!   instead of corrupted state.
//!   - Structural change during enumeration, including from the body of
//!     the loop that is doing the enumerating.
//!   - Use from a second thread of a container that assumes one owner.
//! - Layers:
//!   - AccessGuard: version counter, registry of live enumerations and
//!     recorded owner thread. Knows nothing about storage.
//!   - HashTable<K, V> / ArrayBuffer<T>: storage engines. Chained buckets
//!     over a slot array with a free list and prime growth; a `Vec` with an
//!     explicitly tracked capacity. Neither checks anything.
//!   - GuardedMap / GuardedSet / GuardedVec: compose one engine with one
//!     guard. Every public operation is classified as a read or a write
//!     and checks the guard before touching storage.
//!   - Enumerator<'a, S>: registers with the guard on creation, releases
//!     on drop, re-validates the version on every step.
//!
//! Constraints
//! - Containers take `&self` everywhere and keep storage in a `RefCell`.
//!   This is what lets a `for` loop over `map.iter()` call `map.insert` at
//!   all; the borrow checker would otherwise reject it statically.
//! - `Send` but not `Sync`: a container may be handed to another thread,
//!   never shared between two.
//! - The guard detects misuse; it does not lock. Two threads racing on
//!   one container is impossible through safe code (`!Sync`), and the
//!   affinity policy reports the hand-off cases that remain.
//! - A rejected operation changes nothing: not the storage, not the
//!   version, not the recorded owner thread.
//!
//! Operation classes
//! - Read (R): thread-affinity check only. Allowed during enumeration.
//! - Write (W): thread-affinity check, then the enumeration check, then
//!   the change, then one version bump if anything changed.
//! - In-place replacement (`GuardedMap::set`, `GuardedVec::set`) counts as
//!   a write.
//!
//! Policies
//! - `GuardPolicy::VERSIONED` (default) rejects writes while enumerations
//!   are live. `THREAD_AFFINE` rejects foreign threads. `STRICT` does both;
//!   `UNGUARDED` neither. Enumerators compare versions under every policy,
//!   so a write that slips past a relaxed policy still faults the next
//!   `advance`.
//!
//! Reentrancy policy
//! - User code runs inside container operations through comparers,
//!   `Hash`/`Eq`, `Clone` during enumeration and `retain`/`sort_by`
//!   callbacks. Calling back into the same container from there is a
//!   programming error: a debug-only reentrancy guard panics, and in
//!   release builds the `RefCell` borrow panics instead.
//!
//! Hasher and rehashing invariants
//! - Each slot stores the `u64` hash produced at insertion; growth and
//!   compaction reuse it and never call the comparer.
//!
//! Notes and non-goals
//! - No iteration-order guarantees across legal mutations.
//! - No recovery: an enumerator that observed a hazard stays faulted.
//! - Enumerators yield clones; storage cannot stay borrowed between steps.

mod access_guard;
mod array_buffer;
mod comparer;
mod enumerator;
mod error;
mod guarded_map;
mod guarded_set;
mod guarded_vec;
mod hash_table;
mod hash_table_proptest;
mod primes;
mod reentrancy;

// Public surface
pub use access_guard::{AccessGuard, EnumerationClaim, EnumerationHandle, GuardPolicy, TraceCapture};
pub use comparer::{DefaultComparer, EqualityComparer, FnComparer};
pub use enumerator::{Enumerator, EnumeratorState, Source};
pub use error::{EnumerationInfo, Error, Result};
pub use guarded_map::{GuardedMap, Keys, KeysIter, MapSource, Values, ValuesIter};
pub use guarded_set::{GuardedSet, SetSource};
pub use guarded_vec::{GuardedVec, VecSource};

/// Enumerator type aliases, one per container.
pub mod iter {
    pub use crate::guarded_map::Iter as MapIter;
    pub use crate::guarded_set::Iter as SetIter;
    pub use crate::guarded_vec::Iter as VecIter;
}
