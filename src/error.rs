//! Error type shared by every guarded container.

use core::fmt;
use std::backtrace::Backtrace;
use std::sync::Arc;
use std::thread::ThreadId;

/// Diagnostic snapshot of one live enumeration.
#[derive(Clone, Debug)]
pub struct EnumerationInfo {
    /// Thread that started the enumeration.
    pub thread: ThreadId,
    /// Where the enumeration started, when trace capture is enabled and
    /// produced frames.
    pub started_at: Option<Arc<Backtrace>>,
}

impl fmt::Display for EnumerationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enumeration on {:?}", self.thread)?;
        if let Some(trace) = &self.started_at {
            write!(f, ", started at:\n{trace}")?;
        }
        Ok(())
    }
}

struct EnumerationList<'a>(&'a [EnumerationInfo]);

impl fmt::Display for EnumerationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for info in self.0 {
            writeln!(f)?;
            write!(f, "  {info}")?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "attempted to modify collection from {thread:?} while it is being enumerated in {} place(s){}",
        .enumerations.len(),
        EnumerationList(.enumerations)
    )]
    ConcurrentModification {
        thread: ThreadId,
        enumerations: Vec<EnumerationInfo>,
    },
    #[error("collection owned by {owner:?} was accessed from {thread:?}")]
    CrossThreadAccess { owner: ThreadId, thread: ThreadId },
    #[error("an entry with the same key already exists")]
    DuplicateKey,
    #[error("the given key was not present")]
    KeyNotFound,
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("key is not equal to itself under the collection's comparer")]
    InvalidKey,
    #[error("enumerator is not positioned on an element")]
    InvalidEnumeratorState,
    #[error("capacity overflow")]
    CapacityOverflow,
    #[error("requested capacity {requested} is smaller than length {len}")]
    InvalidCapacity { requested: usize, len: usize },
}

impl Error {
    /// Number of enumerations that were live when a modification was rejected.
    pub fn active_enumerations(&self) -> Option<usize> {
        match self {
            Error::ConcurrentModification { enumerations, .. } => Some(enumerations.len()),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
