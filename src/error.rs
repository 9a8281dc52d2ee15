use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid key {key}: {reason}")]
    InvalidKey { key: usize, reason: InvalidKeyReason },
    #[error("no value stored under key {0}")]
    NotFound(usize),
    /// The free-range sequence lost an invariant and no slot exists for `key`.
    #[error("free-range bookkeeping is inconsistent, cannot place key {key}")]
    Inconsistent { key: usize },
    #[error("key space exhausted")]
    Exhausted,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidKeyReason {
    #[error("below the pool start {start}")]
    BelowStart { start: usize },
    #[error("not currently allocated")]
    NotAllocated,
    #[error("already allocated")]
    AlreadyAllocated,
    #[error("reserved as the upper bound of the key space")]
    Sentinel,
}

impl Error {
    pub(crate) fn invalid(key: usize, reason: InvalidKeyReason) -> Self {
        Error::InvalidKey { key, reason }
    }
}
