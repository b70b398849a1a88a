//! # Pool Arena
//!
//! A backing store that owns its data buffer and hands out fixed-size
//! blocks of it through a [`PoolAddressAllocator`].

use tracing::info;

use crate::address::Address;
use crate::alloc::{
    AddressAllocator, AddressAllocatorBase, BufferPair, PoolAddressAllocator, RelocatedRange,
    ReservedSpace,
};
use crate::config::PoolConfig;
use crate::error::{AllocError, AllocResult};

/// Block arena over an owned, aligned byte buffer.
///
/// The data window inside the buffer always starts on `max_alignment`, so
/// block addresses survive growth and shrinking unchanged.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = PoolArena::<u32>::new(PoolConfig::fixed(1024, 64))?;
///
/// let addr = arena.alloc()?;
/// arena.block_mut(addr).unwrap().fill(0xFF);
/// arena.free(addr)?;
/// ```
#[derive(Debug)]
pub struct PoolArena<A: Address = u32> {
    /// Backing storage, over-allocated so an aligned window fits.
    storage: Box<[u8]>,
    /// Start of the aligned data window inside `storage`.
    window: usize,
    /// Offset bookkeeping for the window.
    allocator: PoolAddressAllocator<A>,
    /// Sizing and growth policy.
    config: PoolConfig,
}

impl<A: Address> PoolArena<A> {
    /// Creates an arena as described by `config`.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] for an invalid configuration and
    /// [`AllocError::AddressOverflow`] if sizes do not fit `A`.
    pub fn new(config: PoolConfig) -> AllocResult<Self> {
        config.validate()?;
        let (size, block_size, max_alignment) = config.sizes::<A>()?;

        let (storage, window) = carve(size, max_alignment)?;
        let reserved = ReservedSpace::for_pool(size, max_alignment, block_size)?;
        let data = &storage[window..window + size.try_to_usize()?];
        let allocator = PoolAddressAllocator::new(reserved, Some(data), max_alignment, size, block_size)?;

        Ok(Self {
            storage,
            window,
            allocator,
            config,
        })
    }

    /// Size of the data window in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> A {
        self.allocator.get_total_size()
    }

    /// Bytes held by live blocks.
    #[inline]
    #[must_use]
    pub fn used(&self) -> A {
        self.allocator.get_allocated_size()
    }

    /// Bytes available without growing.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> A {
        self.allocator.get_free_size()
    }

    /// The configuration the arena was built from, with the current size.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Read access to the underlying allocator.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &PoolAddressAllocator<A> {
        &self.allocator
    }

    /// Allocates one block.
    ///
    /// When the arena is full and the config allows growth, the buffer is
    /// doubled (up to `max_buffer_size`) and the allocation retried.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Exhausted`] when full and unable to grow.
    pub fn alloc(&mut self) -> AllocResult<A> {
        let block_size = self.allocator.block_size();
        match self.allocator.try_alloc_addr(block_size, A::ONE, A::ZERO) {
            Err(AllocError::Exhausted { .. }) if self.config.grow_on_exhaustion => {
                let target = self.growth_target()?;
                self.grow(target)?;
                self.allocator.try_alloc_addr(block_size, A::ONE, A::ZERO)
            }
            result => result,
        }
    }

    /// Returns a block to the arena.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidAddress`] or [`AllocError::DoubleFree`].
    pub fn free(&mut self, addr: A) -> AllocResult<()> {
        let block_size = self.allocator.block_size();
        self.allocator.try_free_addr(addr, block_size)
    }

    /// Bytes of the block at `addr`.
    #[must_use]
    pub fn block(&self, addr: A) -> Option<&[u8]> {
        let range = self.block_range(addr)?;
        self.storage.get(range)
    }

    /// Mutable bytes of the block at `addr`.
    pub fn block_mut(&mut self, addr: A) -> Option<&mut [u8]> {
        let range = self.block_range(addr)?;
        self.storage.get_mut(range)
    }

    /// Frees every block. Previous addresses become invalid.
    pub fn reset(&mut self) {
        self.allocator.reset();
    }

    /// Grows the data window to `new_size` bytes, keeping every live block.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidResize`] if `new_size` holds fewer blocks.
    pub fn grow(&mut self, new_size: A) -> AllocResult<Vec<RelocatedRange<A>>> {
        let relocations = self.rebuild(new_size, true)?;
        info!(
            capacity = self.capacity().to_u64(),
            live = self.used().to_u64(),
            "pool arena grown"
        );
        Ok(relocations)
    }

    /// Shrinks the data window as far as live blocks allow.
    ///
    /// # Errors
    ///
    /// Propagates resize errors; the arena is unchanged on failure.
    pub fn shrink_to_fit(&mut self) -> AllocResult<Vec<RelocatedRange<A>>> {
        let (_, block_size, max_alignment) = self.config.sizes::<A>()?;
        let target = self
            .allocator
            .safe_shrink_size(block_size, max_alignment)
            .min(self.capacity());
        self.rebuild(target, false)
    }

    fn rebuild(&mut self, new_size: A, grow: bool) -> AllocResult<Vec<RelocatedRange<A>>> {
        let (_, block_size, max_alignment) = self.config.sizes::<A>()?;
        let (mut storage, window) = carve(new_size, max_alignment)?;
        let reserved = ReservedSpace::for_pool(new_size, max_alignment, block_size)?;

        let old_len = self.capacity().try_to_usize()?;
        let new_len = new_size.try_to_usize()?;
        let buffers = BufferPair::Migrate {
            old: &self.storage[self.window..self.window + old_len],
            new: &mut storage[window..window + new_len],
        };
        let (relocations, _) = if grow {
            self.allocator.grow_in_place(reserved, new_size, buffers)?
        } else {
            self.allocator.shrink_in_place(reserved, new_size, buffers)?
        };

        self.storage = storage;
        self.window = window;
        self.config.buffer_size = new_size.to_u64();
        Ok(relocations)
    }

    /// Next size when growing on exhaustion.
    fn growth_target(&self) -> AllocResult<A> {
        let current = self.config.buffer_size;
        let doubled = current.saturating_mul(2).max(self.config.block_size);
        let target = self.config.max_buffer_size.map_or(doubled, |max| doubled.min(max));
        if target <= current {
            return Err(AllocError::Exhausted {
                block_count: self.allocator.block_count().to_u64(),
            });
        }
        A::try_from_u64(target)
    }

    fn block_range(&self, addr: A) -> Option<std::ops::Range<usize>> {
        self.allocator.address_to_block_id(addr)?;
        let start = self.window + addr.to_usize()?;
        Some(start..start + self.allocator.block_size().to_usize()?)
    }
}

/// Allocates `size` bytes plus room to start a window on `alignment`.
fn carve<A: Address>(size: A, alignment: A) -> AllocResult<(Box<[u8]>, usize)> {
    let len = size
        .try_to_usize()?
        .checked_add(alignment.try_to_usize()?.saturating_sub(1))
        .ok_or(AllocError::AddressOverflow(size.to_u64()))?;
    let storage = vec![0u8; len].into_boxed_slice();
    let window =
        AddressAllocatorBase::<A>::align_up_offset(storage.as_ptr() as usize, alignment)?.try_to_usize()?;
    Ok((storage, window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_allocation() {
        let mut arena = PoolArena::<u32>::new(PoolConfig::fixed(8, 64)).unwrap();
        assert_eq!(arena.capacity(), 512);
        assert_eq!(arena.allocator().align_offset(), 0);

        let addr = arena.alloc().unwrap();
        assert_eq!(addr, 0);
        assert_eq!(arena.block(addr).unwrap().len(), 64);
        assert_eq!(arena.used(), 64);
        assert_eq!(arena.remaining(), 448);
    }

    #[test]
    fn test_arena_reset() {
        let mut arena = PoolArena::<u32>::new(PoolConfig::fixed(4, 64)).unwrap();
        for _ in 0..4 {
            arena.alloc().unwrap();
        }
        assert!(matches!(arena.alloc(), Err(AllocError::Exhausted { .. })));

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.alloc(), Ok(0));
    }

    #[test]
    fn test_arena_grows_on_exhaustion() {
        let config = PoolConfig {
            grow_on_exhaustion: true,
            max_buffer_size: Some(1024),
            ..PoolConfig::fixed(4, 64)
        };
        let mut arena = PoolArena::<u32>::new(config).unwrap();

        let first = arena.alloc().unwrap();
        arena.block_mut(first).unwrap().fill(0x5A);
        for _ in 0..3 {
            arena.alloc().unwrap();
        }

        assert_eq!(arena.alloc(), Ok(256));
        assert_eq!(arena.capacity(), 512);
        assert!(arena.block(first).unwrap().iter().all(|&b| b == 0x5A));

        for _ in 0..11 {
            arena.alloc().unwrap();
        }
        assert_eq!(arena.capacity(), 1024);
        assert!(matches!(arena.alloc(), Err(AllocError::Exhausted { .. })));
    }

    #[test]
    fn test_arena_rejects_unrepresentable_size() {
        let config = PoolConfig::fixed(u64::MAX, 2);
        assert_eq!(config.buffer_size, u64::MAX);

        assert!(matches!(
            PoolArena::<u32>::new(config.clone()),
            Err(AllocError::AddressOverflow(_))
        ));
        assert!(matches!(
            PoolArena::<u64>::new(config),
            Err(AllocError::AddressOverflow(_))
        ));
    }

    #[test]
    fn test_arena_shrink_to_fit() {
        let mut arena = PoolArena::<u64>::new(PoolConfig::fixed(16, 128)).unwrap();
        let a = arena.alloc().unwrap();
        let b = arena.alloc().unwrap();
        arena.block_mut(b).unwrap()[0] = 7;

        let relocations = arena.shrink_to_fit().unwrap();
        assert!(relocations.is_empty());
        assert_eq!(arena.capacity(), 256);
        assert_eq!(arena.block(b).unwrap()[0], 7);

        arena.free(a).unwrap();
        arena.free(b).unwrap();
        assert_eq!(arena.free(a), Err(AllocError::DoubleFree(a)));
        assert!(arena.block(1).is_none());
    }
}
