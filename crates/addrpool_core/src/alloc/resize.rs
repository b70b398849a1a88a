//! # Pool Resize
//!
//! Rebuilding a pool over a larger or smaller buffer pair.
//!
//! The old allocator is consumed and a new one is built over the new
//! reserved region. Surviving payload is migrated by raw copy, free entries
//! that no longer fit are dropped, and every live range whose offset moved
//! is reported back to the consumer.

use std::cmp::Ordering;

use tracing::{debug, warn};

use super::base::AddressAllocatorBase;
use super::pool::{check_buffer_len, descending_blocks};
use super::reserved::ReservedSpace;
use super::{AddressAllocator, PoolAddressAllocator};
use crate::address::Address;
use crate::error::{AllocError, AllocResult};

/// Data buffers taking part in a resize.
#[derive(Debug)]
pub enum BufferPair<'a> {
    /// Offsets only; the data lives elsewhere and is not copied.
    Detached,
    /// Copy surviving payload from `old` into `new`.
    Migrate {
        /// Buffer the old allocator was built over.
        old: &'a [u8],
        /// Buffer the new allocator is built over.
        new: &'a mut [u8],
    },
}

/// A live range that moved during a resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RelocatedRange<A: Address> {
    /// Offset in the old buffer.
    pub old_addr: A,
    /// Offset in the new buffer.
    pub new_addr: A,
    /// Length in bytes.
    pub len: A,
}

impl<A: Address> RelocatedRange<A> {
    /// Translates `addr` if it lies inside this range.
    #[must_use]
    pub fn translate(&self, addr: A) -> Option<A> {
        if addr >= self.old_addr && addr - self.old_addr < self.len {
            Some(self.new_addr + (addr - self.old_addr))
        } else {
            None
        }
    }
}

/// Outcome of a resize.
#[derive(Debug)]
pub struct Resized<A: Address> {
    /// Allocator over the new buffers.
    pub allocator: PoolAddressAllocator<A>,
    /// Live ranges whose offset changed, in ascending order.
    pub relocations: Vec<RelocatedRange<A>>,
    /// Reserved region retired from the old allocator.
    pub old_reserved: ReservedSpace<A>,
}

impl<A: Address> Resized<A> {
    /// Maps an old live address to its new offset.
    #[must_use]
    pub fn translate(&self, addr: A) -> A {
        self.relocations
            .iter()
            .find_map(|range| range.translate(addr))
            .unwrap_or(addr)
    }
}

/// Everything a rebuild needs, validated before the old allocator is consumed.
struct ResizePlan<A: Address> {
    base: AddressAllocatorBase<A>,
    new_count: A,
    relocations: Vec<RelocatedRange<A>>,
    /// Byte ranges `(src, dst, len)` of the payload copy.
    copy: (usize, usize, usize),
}

impl<A: Address> PoolAddressAllocator<A> {
    /// Rebuilds the pool over a buffer of at least as many blocks.
    ///
    /// Blocks gained by growth are free and handed out after the blocks
    /// that were already free.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidResize`] if the new buffer holds fewer
    /// blocks, and the errors of [`new`](Self::new) for bad buffers.
    pub fn grow_to(
        self,
        new_reserved: ReservedSpace<A>,
        new_buffer_size: A,
        buffers: BufferPair<'_>,
    ) -> AllocResult<Resized<A>> {
        let plan = self.plan(&new_reserved, new_buffer_size, &buffers, Ordering::Greater)?;
        Ok(self.apply(plan, new_reserved, buffers))
    }

    /// Rebuilds the pool over a buffer of at most as many blocks.
    ///
    /// Every live block must lie below the new block count; size the new
    /// buffer with [`safe_shrink_size`](AddressAllocator::safe_shrink_size).
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ShrinkBelowLive`] if a live block would be cut
    /// off, [`AllocError::InvalidResize`] if the new buffer holds more
    /// blocks, and the errors of [`new`](Self::new) for bad buffers.
    pub fn shrink_to(
        self,
        new_reserved: ReservedSpace<A>,
        new_buffer_size: A,
        buffers: BufferPair<'_>,
    ) -> AllocResult<Resized<A>> {
        let plan = self.plan(&new_reserved, new_buffer_size, &buffers, Ordering::Less)?;
        Ok(self.apply(plan, new_reserved, buffers))
    }

    /// [`grow_to`](Self::grow_to) on a pool behind `&mut`.
    ///
    /// On error the pool is left untouched. On success it is replaced and
    /// the relocations plus the retired reserved region are returned.
    ///
    /// # Errors
    ///
    /// Same as [`grow_to`](Self::grow_to).
    pub fn grow_in_place(
        &mut self,
        new_reserved: ReservedSpace<A>,
        new_buffer_size: A,
        buffers: BufferPair<'_>,
    ) -> AllocResult<(Vec<RelocatedRange<A>>, ReservedSpace<A>)> {
        let plan = self.plan(&new_reserved, new_buffer_size, &buffers, Ordering::Greater)?;
        Ok(self.apply_in_place(plan, new_reserved, buffers))
    }

    /// [`shrink_to`](Self::shrink_to) on a pool behind `&mut`.
    ///
    /// # Errors
    ///
    /// Same as [`shrink_to`](Self::shrink_to); the pool is left untouched.
    pub fn shrink_in_place(
        &mut self,
        new_reserved: ReservedSpace<A>,
        new_buffer_size: A,
        buffers: BufferPair<'_>,
    ) -> AllocResult<(Vec<RelocatedRange<A>>, ReservedSpace<A>)> {
        let plan = self.plan(&new_reserved, new_buffer_size, &buffers, Ordering::Less)?;
        Ok(self.apply_in_place(plan, new_reserved, buffers))
    }

    fn apply_in_place(
        &mut self,
        plan: ResizePlan<A>,
        new_reserved: ReservedSpace<A>,
        buffers: BufferPair<'_>,
    ) -> (Vec<RelocatedRange<A>>, ReservedSpace<A>) {
        let resized = std::mem::take(self).apply(plan, new_reserved, buffers);
        *self = resized.allocator;
        (resized.relocations, resized.old_reserved)
    }

    /// Validates a resize without touching anything.
    fn plan(
        &self,
        new_reserved: &ReservedSpace<A>,
        new_buffer_size: A,
        buffers: &BufferPair<'_>,
        direction: Ordering,
    ) -> AllocResult<ResizePlan<A>> {
        let new_start = match buffers {
            BufferPair::Detached => None,
            BufferPair::Migrate { new, .. } => {
                check_buffer_len(new, new_buffer_size)?;
                Some(new.as_ptr() as usize)
            }
        };

        let base = self.base.rebased(new_start)?;
        let old_offset = self.base.align_offset();
        let new_offset = base.align_offset();
        let block_size = self.block_size;
        let old_count = self.block_count;
        let new_count = new_buffer_size.saturating_sub(new_offset) / block_size;

        if new_count.cmp(&old_count) == direction.reverse() {
            return Err(AllocError::InvalidResize {
                from: old_count.to_u64(),
                to: new_count.to_u64(),
            });
        }

        let old_blocks = old_count.try_to_usize()?;
        let new_blocks = new_count.try_to_usize()?;
        new_reserved.ensure_capacity(new_blocks)?;

        let mut is_free = vec![false; old_blocks];
        for addr in self.free_stack.iter() {
            if let Some(block) = self.address_to_block_id(addr) {
                is_free[block.try_to_usize()?] = true;
            }
        }
        if is_free.iter().skip(new_blocks).any(|free| !free) {
            let required = self.safe_shrink_size(A::ZERO, A::ONE);
            warn!(
                required = required.to_u64(),
                requested = new_buffer_size.to_u64(),
                "refusing to shrink below live allocations"
            );
            return Err(AllocError::ShrinkBelowLive {
                required: required.to_u64(),
            });
        }

        let kept_blocks = old_blocks.min(new_blocks);
        let kept_bytes = kept_blocks * block_size.try_to_usize()?;
        let src = old_offset.try_to_usize()?;
        let dst = new_offset.try_to_usize()?;
        if let BufferPair::Migrate { old, .. } = buffers {
            check_buffer_len(old, A::try_from_usize(src + kept_bytes)?)?;
        }

        let relocations = if old_offset == new_offset {
            Vec::new()
        } else {
            live_runs(&is_free[..kept_blocks], old_offset, new_offset, block_size)?
        };

        Ok(ResizePlan {
            base,
            new_count,
            relocations,
            copy: (src, dst, kept_bytes),
        })
    }

    /// Consumes the old pool and builds the new one from a validated plan.
    fn apply(
        self,
        plan: ResizePlan<A>,
        mut new_reserved: ReservedSpace<A>,
        buffers: BufferPair<'_>,
    ) -> Resized<A> {
        let ResizePlan {
            base,
            new_count,
            relocations,
            copy: (src, dst, len),
        } = plan;

        if let BufferPair::Migrate { old, new } = buffers {
            new[dst..dst + len].copy_from_slice(&old[src..src + len]);
        }

        let old_offset = self.base.align_offset();
        let new_offset = base.align_offset();
        let block_size = self.block_size;
        let old_count = self.block_count;

        // Gained blocks sink to the bottom; surviving free entries keep their order.
        let gained = descending_blocks(old_count, new_count, block_size, new_offset);
        let surviving = self
            .free_stack
            .iter()
            .map(|addr| (addr - old_offset) / block_size)
            .filter(|&block| block < new_count)
            .map(|block| new_offset + block * block_size);
        new_reserved.refill(gained.chain(surviving));

        let allocator = Self {
            base,
            block_count: new_count,
            block_size,
            free_stack: new_reserved,
        };
        debug!(
            from_blocks = old_count.to_u64(),
            to_blocks = new_count.to_u64(),
            relocated = relocations.len(),
            free_blocks = allocator.free_block_count(),
            "pool allocator resized"
        );

        Resized {
            allocator,
            relocations,
            old_reserved: self.free_stack,
        }
    }
}

/// Coalesced runs of live blocks, shifted from `old_offset` to `new_offset`.
fn live_runs<A: Address>(
    is_free: &[bool],
    old_offset: A,
    new_offset: A,
    block_size: A,
) -> AllocResult<Vec<RelocatedRange<A>>> {
    let mut runs: Vec<RelocatedRange<A>> = Vec::new();
    let mut previous_live = false;
    for (block, &free) in is_free.iter().enumerate() {
        if free {
            previous_live = false;
            continue;
        }
        let block = A::try_from_usize(block)?;
        if previous_live {
            if let Some(run) = runs.last_mut() {
                run.len = run.len + block_size;
            }
        } else {
            runs.push(RelocatedRange {
                old_addr: old_offset + block * block_size,
                new_addr: new_offset + block * block_size,
                len: block_size,
            });
        }
        previous_live = true;
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached(buffer_size: u32) -> PoolAddressAllocator<u32> {
        let reserved = ReservedSpace::for_pool(buffer_size, 64, 64).unwrap();
        PoolAddressAllocator::new(reserved, None, 64, buffer_size, 64).unwrap()
    }

    #[test]
    fn test_grow_adds_free_blocks_after_existing_ones() {
        let mut pool = detached(256);
        let a = pool.alloc_addr(64, 1, 0);
        let b = pool.alloc_addr(64, 1, 0);
        assert_eq!((a, b), (0, 64));

        let reserved = ReservedSpace::for_pool(512, 64, 64).unwrap();
        let resized = pool.grow_to(reserved, 512, BufferPair::Detached).unwrap();
        let mut pool = resized.allocator;
        assert!(resized.relocations.is_empty());
        assert_eq!(pool.block_count(), 8);
        assert_eq!(pool.get_allocated_size(), 128);

        let next: Vec<u32> = (0..6).map(|_| pool.alloc_addr(64, 1, 0)).collect();
        assert_eq!(next, vec![128, 192, 256, 320, 384, 448]);
        assert_eq!(pool.alloc_addr(64, 1, 0), u32::MAX);
    }

    #[test]
    fn test_grow_rejects_smaller_buffer() {
        let pool = detached(512);
        let reserved = ReservedSpace::for_pool(256, 64, 64).unwrap();
        assert_eq!(
            pool.grow_to(reserved, 256, BufferPair::Detached).unwrap_err(),
            AllocError::InvalidResize { from: 8, to: 4 }
        );
    }

    #[test]
    fn test_shrink_drops_trailing_free_entries() {
        let mut pool = detached(512);
        for _ in 0..3 {
            pool.alloc_addr(64, 1, 0);
        }
        let target = pool.safe_shrink_size(0, 64);
        assert_eq!(target, 192);

        let reserved = ReservedSpace::for_pool(target, 64, 64).unwrap();
        let resized = pool.shrink_to(reserved, target, BufferPair::Detached).unwrap();
        assert_eq!(resized.old_reserved.capacity(), 8);

        let mut pool = resized.allocator;
        assert_eq!(pool.block_count(), 3);
        assert_eq!(pool.free_block_count(), 0);
        assert_eq!(pool.alloc_addr(64, 1, 0), u32::MAX);
        pool.free_addr(128, 64);
        assert_eq!(pool.alloc_addr(64, 1, 0), 128);
    }

    #[test]
    fn test_shrink_below_live_block_fails() {
        let mut pool = detached(512);
        for _ in 0..8 {
            pool.alloc_addr(64, 1, 0);
        }
        pool.free_addr(0, 64);

        let reserved = ReservedSpace::for_pool(448, 64, 64).unwrap();
        assert_eq!(
            pool.shrink_to(reserved, 448, BufferPair::Detached).unwrap_err(),
            AllocError::ShrinkBelowLive { required: 576 }
        );
    }

    #[test]
    fn test_failed_in_place_resize_keeps_pool() {
        let mut pool = detached(512);
        for _ in 0..8 {
            pool.alloc_addr(64, 1, 0);
        }
        pool.free_addr(64, 64);

        let reserved = ReservedSpace::for_pool(256, 64, 64).unwrap();
        assert!(pool.shrink_in_place(reserved, 256, BufferPair::Detached).is_err());
        assert_eq!(pool.block_count(), 8);
        assert_eq!(pool.alloc_addr(64, 1, 0), 64);

        let reserved = ReservedSpace::for_pool(1024, 64, 64).unwrap();
        let (relocations, old_reserved) =
            pool.grow_in_place(reserved, 1024, BufferPair::Detached).unwrap();
        assert!(relocations.is_empty());
        assert_eq!(old_reserved.capacity(), 8);
        assert_eq!(pool.block_count(), 16);
        assert_eq!(pool.alloc_addr(64, 1, 0), 512);
    }

    #[test]
    fn test_migrate_copies_payload_and_reports_moves() {
        // Over-allocate so both buffers can be carved at chosen alignments.
        let mut old_storage = vec![0u8; 1024];
        let mut new_storage = vec![0u8; 1024];
        let old_skip = (64 - old_storage.as_ptr() as usize % 64) % 64;
        let new_skip = (64 - new_storage.as_ptr() as usize % 64) % 64 + 16;

        let old_buf = &mut old_storage[old_skip..old_skip + 256];
        let reserved = ReservedSpace::<u32>::for_pool(256, 64, 64).unwrap();
        let mut pool = PoolAddressAllocator::new(reserved, Some(&*old_buf), 64, 256, 64).unwrap();
        assert_eq!(pool.align_offset(), 0);

        let a = pool.alloc_addr(64, 1, 0);
        let b = pool.alloc_addr(64, 1, 0);
        let c = pool.alloc_addr(64, 1, 0);
        pool.free_addr(b, 64);
        old_buf[a as usize] = 0xAA;
        old_buf[c as usize + 63] = 0xCC;

        let new_buf = &mut new_storage[new_skip..new_skip + 576];
        let reserved = ReservedSpace::for_pool(576, 64, 64).unwrap();
        let resized = pool
            .grow_to(
                reserved,
                576,
                BufferPair::Migrate {
                    old: &*old_buf,
                    new: &mut *new_buf,
                },
            )
            .unwrap();

        assert_eq!(resized.allocator.align_offset(), 48);
        assert_eq!(resized.allocator.block_count(), 8);
        assert_eq!(
            resized.relocations,
            vec![
                RelocatedRange { old_addr: 0, new_addr: 48, len: 64 },
                RelocatedRange { old_addr: 128, new_addr: 176, len: 64 },
            ]
        );

        let new_a = resized.translate(a);
        let new_c = resized.translate(c);
        assert_eq!(new_buf[new_a as usize], 0xAA);
        assert_eq!(new_buf[new_c as usize + 63], 0xCC);
        assert!(resized.allocator.is_block_free(b + 48));
    }

    #[test]
    fn test_live_runs_coalesce() {
        let runs = live_runs::<u32>(&[false, false, true, false], 0, 8, 16).unwrap();
        assert_eq!(
            runs,
            vec![
                RelocatedRange { old_addr: 0, new_addr: 8, len: 32 },
                RelocatedRange { old_addr: 48, new_addr: 56, len: 16 },
            ]
        );
    }
}
