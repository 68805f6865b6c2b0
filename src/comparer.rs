//! Injected equality/hash strategies.

use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

/// Hashing and equality used by the hash-based containers.
///
/// Implementations must keep `eq(a, b) => hash(a) == hash(b)`. The
/// containers store each entry's hash at insertion time and never call
/// `hash` on a stored key again.
pub trait EqualityComparer<T: ?Sized> {
    fn hash(&self, value: &T) -> u64;
    fn eq(&self, a: &T, b: &T) -> bool;
}

/// `Hash` + `Eq` through a `BuildHasher`, `RandomState` by default.
#[derive(Clone, Debug, Default)]
pub struct DefaultComparer<S = RandomState> {
    hasher: S,
}

impl<S> DefaultComparer<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }
}

impl<T, S> EqualityComparer<T> for DefaultComparer<S>
where
    T: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        self.hasher.hash_one(value)
    }

    #[inline]
    fn eq(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

/// Comparer built from a pair of closures.
#[derive(Clone)]
pub struct FnComparer<H, E> {
    hash: H,
    eq: E,
}

impl<H, E> FnComparer<H, E> {
    pub fn new(hash: H, eq: E) -> Self {
        Self { hash, eq }
    }
}

impl<T, H, E> EqualityComparer<T> for FnComparer<H, E>
where
    T: ?Sized,
    H: Fn(&T) -> u64,
    E: Fn(&T, &T) -> bool,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        (self.hash)(value)
    }

    #[inline]
    fn eq(&self, a: &T, b: &T) -> bool {
        (self.eq)(a, b)
    }
}

impl<H, E> core::fmt::Debug for FnComparer<H, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("FnComparer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_comparer_is_consistent_with_eq() {
        let c = DefaultComparer::<RandomState>::default();
        assert!(EqualityComparer::<str>::eq(&c, "a", "a"));
        assert!(!EqualityComparer::<str>::eq(&c, "a", "b"));
        assert_eq!(
            EqualityComparer::<str>::hash(&c, "abc"),
            EqualityComparer::<str>::hash(&c, "abc")
        );
        // String and str hash identically, which borrowed lookups rely on.
        assert_eq!(
            EqualityComparer::<String>::hash(&c, &"abc".to_string()),
            EqualityComparer::<str>::hash(&c, "abc")
        );
    }

    #[test]
    fn fn_comparer_case_insensitive() {
        let c = FnComparer::new(
            |s: &str| {
                s.bytes()
                    .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b.to_ascii_lowercase() as u64))
            },
            |a: &str, b: &str| a.eq_ignore_ascii_case(b),
        );
        assert!(c.eq("Key", "kEY"));
        assert_eq!(c.hash("Key"), c.hash("KEY"));
    }
}
