use thiserror::Error;

use crate::crypto::attack::Phase;

/// Everything that can go wrong in this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Padding(#[from] PaddingError),

    #[error(transparent)]
    Length(#[from] LengthError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Phase 4 tried all 256 candidates without reproducing the target block.
    #[error("no candidate byte reproduced block {block} at position {position}")]
    Recovery { block: usize, position: usize },

    #[error("query budget of {limit} exhausted during {phase}")]
    QueryBudgetExhausted { phase: Phase, limit: usize },

    #[error("CTR counter exhausted after {blocks} blocks")]
    CounterExhausted { blocks: u64 },

    #[error("block cipher failure: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Malformed PKCS#7 trailer. Always surfaced, never corrected.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum PaddingError {
    #[error("cannot unpad an empty buffer")]
    Empty,

    #[error("padding byte {value:#04x} is outside 1..={block_size}")]
    OutOfRange { value: u8, block_size: usize },

    #[error("padding byte {value:#04x} exceeds buffer length {len}")]
    Overrun { value: u8, len: usize },

    #[error("final {value} bytes are not all {value:#04x}")]
    Inconsistent { value: u8 },
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum LengthError {
    #[error("{what} must be {expected} bytes, got {actual}")]
    Exact {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} must be shorter than {limit} bytes, got {actual}")]
    TooLong {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("{what} must be a multiple of {block_size} bytes, got {actual}")]
    NotBlockMultiple {
        what: &'static str,
        block_size: usize,
        actual: usize,
    },
}

/// The attack could not derive the oracle's parameters.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum CalibrationError {
    #[error("oracle output does not depend on attacker input")]
    NoDivergence,

    #[error("no block size found up to {ceiling} bytes")]
    BlockSizeNotFound { ceiling: usize },

    #[error("unchanged prefix of {unchanged} bytes is not a multiple of block size {block_size}")]
    MisalignedPrefix { unchanged: usize, block_size: usize },

    #[error("suffix length not found within one block of filler")]
    SuffixLengthNotFound,

    #[error("oracle does not encrypt identical blocks identically, not ECB")]
    NotEcb,
}
