//! Versioned enumerator shared by every guarded container.
//!
//! An `Enumerator` registers with its container's [`AccessGuard`] when it is
//! created and deregisters when dropped, so breaking out of a loop, `?`
//! propagation or a panic unwinding through the loop body all release the
//! claim. Every step re-checks thread affinity and the container version.
//!
//! Creation checks thread affinity first. An enumerator created on a
//! foreign thread registers nothing and reports `CrossThreadAccess` from its
//! first step.
//!
//! State machine: `Created -> Active -> Exhausted`; a failed step moves to
//! `Faulted`. Dropping (or [`Enumerator::dispose`]) is valid from any state.

use crate::access_guard::{AccessGuard, EnumerationClaim};
use crate::error::{Error, Result};
use core::iter::FusedIterator;

mod sealed {
    pub trait Sealed {}
}

/// Storage walked by an [`Enumerator`]. Implemented by the crate's
/// container views only.
pub trait Source<'a>: sealed::Sealed {
    type Item;

    fn guard(&self) -> &'a AccessGuard;

    /// The element at the first occupied position `>= pos`, with that
    /// position.
    fn fetch(&self, pos: usize) -> Option<(usize, Self::Item)>;
}

pub(crate) use sealed::Sealed;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnumeratorState {
    Created,
    Active,
    Exhausted,
    Faulted,
}

pub struct Enumerator<'a, S: Source<'a>> {
    source: S,
    guard: &'a AccessGuard,
    _claim: Option<EnumerationClaim<'a>>,
    refused: Option<Error>,
    version: u64,
    pos: usize,
    state: EnumeratorState,
    current: Option<S::Item>,
}

impl<'a, S: Source<'a>> Enumerator<'a, S> {
    pub(crate) fn new(source: S) -> Self {
        let guard = source.guard();
        let (claim, refused) = match guard.check_read() {
            Ok(()) => (Some(guard.claim()), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            version: guard.version(),
            source,
            guard,
            _claim: claim,
            refused,
            pos: 0,
            state: EnumeratorState::Created,
            current: None,
        }
    }

    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    fn step(&mut self) -> Result<Option<S::Item>> {
        self.current = None;
        match self.state {
            EnumeratorState::Faulted => return Err(Error::InvalidEnumeratorState),
            EnumeratorState::Exhausted => return Ok(None),
            EnumeratorState::Created | EnumeratorState::Active => {}
        }
        if let Some(e) = self.refused.take() {
            self.state = EnumeratorState::Faulted;
            return Err(e);
        }
        let guard = self.guard;
        if let Err(e) = guard
            .check_read()
            .and_then(|()| guard.check_version(self.version))
        {
            self.state = EnumeratorState::Faulted;
            return Err(e);
        }
        match self.source.fetch(self.pos) {
            Some((at, item)) => {
                self.pos = at + 1;
                self.state = EnumeratorState::Active;
                Ok(Some(item))
            }
            None => {
                self.state = EnumeratorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Moves to the next element. `Ok(false)` once storage is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        let item = self.step()?;
        let more = item.is_some();
        self.current = item;
        Ok(more)
    }

    /// The element produced by the last successful `advance`.
    pub fn current(&self) -> Result<&S::Item> {
        match (&self.current, self.state) {
            (Some(item), EnumeratorState::Active) => {
                self.guard.check_version(self.version)?;
                Ok(item)
            }
            _ => Err(Error::InvalidEnumeratorState),
        }
    }

    /// Ends the enumeration now instead of at scope exit.
    pub fn dispose(self) {}
}

impl<'a, S: Source<'a>> Iterator for Enumerator<'a, S> {
    type Item = Result<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            EnumeratorState::Exhausted | EnumeratorState::Faulted => None,
            EnumeratorState::Created | EnumeratorState::Active => self.step().transpose(),
        }
    }
}

impl<'a, S: Source<'a>> FusedIterator for Enumerator<'a, S> {}

impl<'a, S: Source<'a>> core::fmt::Debug for Enumerator<'a, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Enumerator")
            .field("version", &self.version)
            .field("pos", &self.pos)
            .field("state", &self.state)
            .finish()
    }
}
