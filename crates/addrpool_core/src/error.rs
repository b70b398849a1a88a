//! # Allocation Error Types
//!
//! All errors that can occur while allocating, freeing or resizing.
//!
//! Addresses and sizes are widened to `u64` so one error type serves every
//! address width.

use thiserror::Error;

/// Errors that can occur in the address allocators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The free list is empty.
    #[error("allocator exhausted: all {block_count} blocks are in use")]
    Exhausted {
        /// Number of blocks managed by the allocator.
        block_count: u64,
    },

    /// Requested alignment exceeds what the allocator can guarantee.
    #[error("alignment {requested} exceeds maximum requestable alignment {max}")]
    AlignmentTooLarge {
        /// Alignment asked for.
        requested: u64,
        /// Maximum alignment the allocator was configured with.
        max: u64,
    },

    /// Zero-byte requests are rejected.
    #[error("zero-sized allocation request")]
    ZeroSize,

    /// The pool strategy cannot satisfy a request larger than one block.
    #[error("request of {requested} bytes exceeds block size {block_size}")]
    RequestTooLarge {
        /// Bytes asked for.
        requested: u64,
        /// Size of a single block.
        block_size: u64,
    },

    /// Address does not name a block owned by this allocator.
    #[error("invalid address {0:#x}")]
    InvalidAddress(u64),

    /// Address was freed while already free.
    #[error("double free of address {0:#x}")]
    DoubleFree(u64),

    /// Reserved metadata region cannot hold the free list.
    #[error("reserved space too small: need {required} entries, have {available}")]
    ReservedTooSmall {
        /// Entries the free list needs.
        required: u64,
        /// Entries the reserved region provides.
        available: u64,
    },

    /// Block size must be non-zero.
    #[error("invalid block size {0}")]
    InvalidBlockSize(u64),

    /// Alignment must be a non-zero power of two.
    #[error("invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(u64),

    /// A data buffer is shorter than the size it was declared with.
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        required: u64,
        /// Bytes provided.
        available: u64,
    },

    /// Grow called with a smaller size, or shrink with a larger one.
    #[error("invalid resize from {from} to {to} blocks")]
    InvalidResize {
        /// Current block count.
        from: u64,
        /// Requested block count.
        to: u64,
    },

    /// Shrinking would cut off a live allocation.
    #[error("cannot shrink below live allocations: need at least {required} bytes")]
    ShrinkBelowLive {
        /// Smallest buffer size that keeps every live block.
        required: u64,
    },

    /// A size or offset does not fit the address type.
    #[error("value {0} does not fit the address type")]
    AddressOverflow(u64),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for allocator operations.
pub type AllocResult<T> = Result<T, AllocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AllocError::AlignmentTooLarge { requested: 128, max: 64 };
        assert_eq!(
            err.to_string(),
            "alignment 128 exceeds maximum requestable alignment 64"
        );
        assert_eq!(AllocError::DoubleFree(0x40).to_string(), "double free of address 0x40");
    }
}
