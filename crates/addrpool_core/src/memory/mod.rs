//! # Memory Management
//!
//! Reference consumers of the address allocators.
//!
//! ## Design Philosophy
//!
//! All memory is allocated once up front. Afterwards:
//! - No heap allocations per block
//! - Growth only when the configured policy allows it
//! - Live block addresses stay stable across growth

mod arena;

pub use arena::PoolArena;
