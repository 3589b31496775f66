use thiserror::Error;

use crate::constants::Address;

use super::memory::MemoryError;

/// Recoverable faults raised while executing an instruction
///
/// The machine stops on the faulting instruction and keeps its last good
/// state, so it can still be inspected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    #[error("address {0} is out of range")]
    OutOfRange(i64),

    #[error("double indirection through address {0} is not supported")]
    DoubleIndirect(Address),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack overflow")]
    StackOverflow,

    #[error("{0} can not be used as an address")]
    NotAnAddress(String),

    #[error("invalid shift amount {0}")]
    InvalidShift(String),
}

impl From<MemoryError> for Exception {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::OutOfRange(address) => Self::OutOfRange(address),
        }
    }
}

impl Exception {
    /// Short stable name of the exception, used in structured logs
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::OutOfRange(_) => "out-of-range",
            Self::DoubleIndirect(_) => "double-indirect",
            Self::StackUnderflow => "stack-underflow",
            Self::StackOverflow => "stack-overflow",
            Self::NotAnAddress(_) => "not-an-address",
            Self::InvalidShift(_) => "invalid-shift",
        }
    }
}
