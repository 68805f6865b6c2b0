//! Access guard: version counter, enumeration registry and thread affinity.
//!
//! The guard knows nothing about container storage. A container owns one
//! guard and calls into it around every operation:
//!
//! - reads call [`AccessGuard::check_read`] (thread affinity only);
//! - structural writes call [`AccessGuard::check_write`] before touching
//!   storage and [`AccessGuard::bump_version`] after the change is applied;
//! - enumerators hold an [`EnumerationHandle`] between
//!   [`AccessGuard::begin_enumeration`] and [`AccessGuard::end_enumeration`].
//!
//! The two checks are independent and selected through [`GuardPolicy`].
//! Neither takes a lock: the guard detects misuse, it does not make
//! concurrent use safe.

use crate::error::{EnumerationInfo, Error, Result};
use core::cell::{Cell, RefCell};
use slotmap::{new_key_type, SlotMap};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;
use std::thread::{self, ThreadId};

new_key_type! {
    struct EnumerationKey;
}

/// Whether enumeration start sites are captured for diagnostics.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TraceCapture {
    /// Never capture.
    Off,
    /// Capture when `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` enable it.
    #[default]
    Env,
    /// Always capture, regardless of environment.
    Always,
}

/// Selects which hazards a guard reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GuardPolicy {
    /// Reject structural writes while any enumeration is live.
    pub detect_modification: bool,
    /// Reject any access from a thread other than the recorded owner.
    pub thread_affinity: bool,
    pub trace_capture: TraceCapture,
}

impl GuardPolicy {
    /// Version + enumeration tracking; any thread may call.
    pub const VERSIONED: GuardPolicy = GuardPolicy {
        detect_modification: true,
        thread_affinity: false,
        trace_capture: TraceCapture::Env,
    };

    /// Single owning thread; enumeration state is not consulted.
    pub const THREAD_AFFINE: GuardPolicy = GuardPolicy {
        detect_modification: false,
        thread_affinity: true,
        trace_capture: TraceCapture::Env,
    };

    /// Both checks.
    pub const STRICT: GuardPolicy = GuardPolicy {
        detect_modification: true,
        thread_affinity: true,
        trace_capture: TraceCapture::Env,
    };

    /// No up-front checks. Enumerators still validate the version.
    pub const UNGUARDED: GuardPolicy = GuardPolicy {
        detect_modification: false,
        thread_affinity: false,
        trace_capture: TraceCapture::Off,
    };

    pub const fn with_trace_capture(mut self, trace_capture: TraceCapture) -> Self {
        self.trace_capture = trace_capture;
        self
    }
}

impl Default for GuardPolicy {
    fn default() -> Self {
        GuardPolicy::VERSIONED
    }
}

/// Proof of one registered enumeration. Must be returned to
/// [`AccessGuard::end_enumeration`] exactly once.
#[derive(Debug)]
pub struct EnumerationHandle(EnumerationKey);

/// Per-container guard state.
#[derive(Debug)]
pub struct AccessGuard {
    policy: GuardPolicy,
    version: Cell<u64>,
    enumerations: RefCell<SlotMap<EnumerationKey, EnumerationInfo>>,
    owner: Cell<Option<ThreadId>>,
}

impl AccessGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self {
            policy,
            version: Cell::new(0),
            enumerations: RefCell::new(SlotMap::with_key()),
            owner: Cell::new(None),
        }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    pub fn version(&self) -> u64 {
        self.version.get()
    }

    pub fn active_enumerations(&self) -> usize {
        self.enumerations.borrow().len()
    }

    /// Thread recorded by the affinity check, if any access has happened yet.
    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.owner.get()
    }

    /// Registers a new enumeration on the calling thread.
    pub fn begin_enumeration(&self) -> EnumerationHandle {
        // A disabled or unsupported capture carries no frames; keep none.
        let started_at = match self.policy.trace_capture {
            TraceCapture::Off => None,
            TraceCapture::Env => Some(Backtrace::capture()),
            TraceCapture::Always => Some(Backtrace::force_capture()),
        }
        .filter(|bt| bt.status() == BacktraceStatus::Captured)
        .map(Arc::new);
        let thread = thread::current().id();
        let key = self
            .enumerations
            .borrow_mut()
            .insert(EnumerationInfo { thread, started_at });
        log::trace!(
            "enumeration begin on {:?} ({} active)",
            thread,
            self.active_enumerations()
        );
        EnumerationHandle(key)
    }

    pub fn end_enumeration(&self, handle: EnumerationHandle) {
        let removed = self.enumerations.borrow_mut().remove(handle.0);
        match removed {
            Some(info) => log::trace!(
                "enumeration end on {:?} ({} active)",
                info.thread,
                self.active_enumerations()
            ),
            None => log::error!("ended an enumeration this guard does not know about"),
        }
    }

    /// RAII form of `begin_enumeration`/`end_enumeration`.
    pub fn claim(&self) -> EnumerationClaim<'_> {
        EnumerationClaim {
            guard: self,
            handle: Some(self.begin_enumeration()),
        }
    }

    /// Fails with `ConcurrentModification` while any enumeration is live,
    /// including one driven by the caller itself.
    pub fn check_mutation_allowed(&self) -> Result<()> {
        if !self.policy.detect_modification {
            return Ok(());
        }
        let enumerations = self.enumerations.borrow();
        if enumerations.is_empty() {
            return Ok(());
        }
        let err = Error::ConcurrentModification {
            thread: thread::current().id(),
            enumerations: enumerations.values().cloned().collect(),
        };
        log::warn!("{err}");
        Err(err)
    }

    /// Records the owning thread on first access; fails with
    /// `CrossThreadAccess` for any other thread until ownership is released.
    /// A rejected access does not change the recorded owner.
    pub fn check_thread_affinity(&self) -> Result<()> {
        if !self.policy.thread_affinity {
            return Ok(());
        }
        let current = thread::current().id();
        match self.owner.get() {
            None => {
                self.owner.set(Some(current));
                Ok(())
            }
            Some(owner) if owner == current => Ok(()),
            Some(owner) => {
                let err = Error::CrossThreadAccess {
                    owner,
                    thread: current,
                };
                log::warn!("{err}");
                Err(err)
            }
        }
    }

    #[inline]
    pub fn check_read(&self) -> Result<()> {
        self.check_thread_affinity()
    }

    #[inline]
    pub fn check_write(&self) -> Result<()> {
        self.check_thread_affinity()?;
        self.check_mutation_allowed()
    }

    /// Called once per completed structural mutation.
    #[inline]
    pub fn bump_version(&self) {
        self.version.set(self.version.get().wrapping_add(1));
    }

    /// Reports drift between a version captured by an enumerator and the
    /// current one.
    pub(crate) fn check_version(&self, captured: u64) -> Result<()> {
        if captured == self.version.get() {
            return Ok(());
        }
        let err = Error::ConcurrentModification {
            thread: thread::current().id(),
            enumerations: self.enumerations.borrow().values().cloned().collect(),
        };
        log::warn!("collection changed during enumeration: {err}");
        Err(err)
    }

    /// Hands the container off: the owner clears the recorded thread so the
    /// next accessor, on any thread, becomes the owner.
    pub fn release_thread(&self) -> Result<()> {
        self.check_thread_affinity()?;
        self.owner.set(None);
        Ok(())
    }
}

impl Default for AccessGuard {
    fn default() -> Self {
        Self::new(GuardPolicy::default())
    }
}

/// Ends its enumeration when dropped.
#[derive(Debug)]
pub struct EnumerationClaim<'g> {
    guard: &'g AccessGuard,
    handle: Option<EnumerationHandle>,
}

impl<'g> EnumerationClaim<'g> {
    pub fn guard(&self) -> &'g AccessGuard {
        self.guard
    }
}

impl Drop for EnumerationClaim<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.guard.end_enumeration(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_allowed_without_enumerations() {
        let g = AccessGuard::default();
        assert!(g.check_write().is_ok());
        g.bump_version();
        assert_eq!(g.version(), 1);
    }

    #[test]
    fn live_claim_blocks_mutation_until_dropped() {
        let g = AccessGuard::default();
        let claim = g.claim();
        match g.check_mutation_allowed() {
            Err(Error::ConcurrentModification {
                thread,
                enumerations,
            }) => {
                assert_eq!(thread, thread::current().id());
                assert_eq!(enumerations.len(), 1);
                assert_eq!(enumerations[0].thread, thread::current().id());
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // Reads are unaffected.
        assert!(g.check_read().is_ok());
        drop(claim);
        assert!(g.check_mutation_allowed().is_ok());
    }

    #[test]
    fn nested_claims_are_tracked_individually() {
        let g = AccessGuard::default();
        let outer = g.begin_enumeration();
        let inner = g.begin_enumeration();
        assert_eq!(g.active_enumerations(), 2);
        g.end_enumeration(inner);
        assert_eq!(g.active_enumerations(), 1);
        assert!(g.check_mutation_allowed().is_err());
        g.end_enumeration(outer);
        assert!(g.check_mutation_allowed().is_ok());
    }

    #[test]
    fn thread_affine_policy_ignores_enumerations() {
        let g = AccessGuard::new(GuardPolicy::THREAD_AFFINE);
        let _claim = g.claim();
        assert!(g.check_write().is_ok());
    }

    #[test]
    fn trace_capture_always_records_start_site() {
        let g = AccessGuard::new(GuardPolicy::VERSIONED.with_trace_capture(TraceCapture::Always));
        let _claim = g.claim();
        let err = g.check_mutation_allowed().unwrap_err();
        match err {
            Error::ConcurrentModification { enumerations, .. } => {
                assert!(enumerations[0].started_at.is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn trace_capture_off_records_nothing() {
        let g = AccessGuard::new(GuardPolicy::VERSIONED.with_trace_capture(TraceCapture::Off));
        let _claim = g.claim();
        match g.check_mutation_allowed() {
            Err(Error::ConcurrentModification { enumerations, .. }) => {
                assert!(enumerations[0].started_at.is_none());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    /// Invariant: a recorded start site always holds captured frames, so
    /// the error message never shows a disabled trace.
    #[test]
    fn trace_capture_env_keeps_only_captured_traces() {
        let g = AccessGuard::new(GuardPolicy::VERSIONED.with_trace_capture(TraceCapture::Env));
        let _claim = g.claim();
        let err = g.check_mutation_allowed().unwrap_err();
        match &err {
            Error::ConcurrentModification { enumerations, .. } => {
                if let Some(bt) = &enumerations[0].started_at {
                    assert_eq!(bt.status(), BacktraceStatus::Captured);
                }
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.to_string().contains("disabled backtrace"));
    }

    #[test]
    fn version_drift_is_reported() {
        let g = AccessGuard::default();
        let v0 = g.version();
        assert!(g.check_version(v0).is_ok());
        g.bump_version();
        assert!(matches!(
            g.check_version(v0),
            Err(Error::ConcurrentModification { .. })
        ));
    }

    #[test]
    fn affinity_rejects_other_thread_and_keeps_owner() {
        let g = AccessGuard::new(GuardPolicy::THREAD_AFFINE);
        assert!(g.check_read().is_ok());
        let owner = g.owner_thread().expect("owner recorded");
        let g = std::thread::spawn(move || {
            match g.check_read() {
                Err(Error::CrossThreadAccess { owner: o, thread }) => {
                    assert_eq!(o, owner);
                    assert_ne!(thread, owner);
                }
                other => panic!("unexpected result: {:?}", other),
            }
            g
        })
        .join()
        .unwrap();
        assert!(g.check_read().is_ok());
    }

    #[test]
    fn released_guard_is_claimed_by_next_thread() {
        let g = AccessGuard::new(GuardPolicy::THREAD_AFFINE);
        g.check_read().unwrap();
        g.release_thread().unwrap();
        let g = std::thread::spawn(move || {
            assert!(g.check_write().is_ok());
            g
        })
        .join()
        .unwrap();
        assert!(matches!(
            g.check_read(),
            Err(Error::CrossThreadAccess { .. })
        ));
    }
}
