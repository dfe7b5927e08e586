//! Free list of fixed-size blocks.

use super::events::Events;
use crate::{buf::Block, Error, PoolConfig};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

/// The small pool: a LIFO free list of blocks, each exactly `block_size`
/// bytes.
///
/// LIFO keeps recently-returned (cache-warm) blocks circulating. Counters
/// are mutated inside the same critical section as the free list, so
/// `free_bytes` always equals the bytes actually sitting in the list.
pub(crate) struct SmallPool {
    block_size: usize,
    /// Cap on `free_bytes`. Zero means unbounded.
    maximum_free_bytes: usize,
    free: Mutex<Vec<Block>>,
    free_bytes: AtomicU64,
    in_use_bytes: AtomicU64,
}

impl SmallPool {
    pub(crate) fn new(config: &PoolConfig) -> Self {
        Self {
            block_size: config.block_size.get(),
            maximum_free_bytes: config.maximum_free_small_bytes,
            free: Mutex::new(Vec::new()),
            free_bytes: AtomicU64::new(0),
            in_use_bytes: AtomicU64::new(0),
        }
    }

    pub(crate) fn free_bytes(&self) -> u64 {
        self.free_bytes.load(Ordering::Acquire)
    }

    pub(crate) fn in_use_bytes(&self) -> u64 {
        self.in_use_bytes.load(Ordering::Acquire)
    }

    /// Rents one block, reusing a free one if any.
    ///
    /// Handed-out blocks are always zero-filled, so reads from a logical
    /// gap in a stream observe zeros regardless of the block's history.
    pub(crate) fn acquire(&self, events: &Events) -> Block {
        let size = self.block_size as u64;
        let reused = {
            let mut free = self.free.lock().unwrap();
            let block = free.pop();
            if block.is_some() {
                self.free_bytes.fetch_sub(size, Ordering::Release);
            }
            block
        };

        // Zeroing happens outside the critical section.
        let block = match reused {
            Some(mut block) => {
                block.zero();
                block
            }
            None => {
                events.block_created();
                Block::zeroed(self.block_size)
            }
        };

        self.in_use_bytes.fetch_add(size, Ordering::Release);
        events.small_pool_sizes(self.free_bytes(), self.in_use_bytes());
        block
    }

    /// Returns a batch of blocks.
    ///
    /// The whole batch is validated before any counter moves: one
    /// wrong-sized block (e.g. minted by a manager with different
    /// geometry) rejects the batch with no state change. Accepted blocks
    /// are pushed to the free list until the free cap would be exceeded;
    /// the rest are dropped.
    pub(crate) fn release(&self, blocks: Vec<Block>, events: &Events) -> Result<(), Error> {
        if blocks.iter().any(|block| block.len() != self.block_size) {
            return Err(Error::BlockSizeMismatch);
        }

        let size = self.block_size as u64;
        let mut discarded = 0;
        {
            let mut free = self.free.lock().unwrap();
            for block in blocks {
                self.in_use_bytes.fetch_sub(size, Ordering::Release);
                let would_hold = self.free_bytes.load(Ordering::Acquire) + size;
                if self.maximum_free_bytes == 0 || would_hold <= self.maximum_free_bytes as u64 {
                    self.free_bytes.fetch_add(size, Ordering::Release);
                    free.push(block);
                } else {
                    discarded += 1;
                }
            }
        }

        for _ in 0..discarded {
            events.block_discarded();
        }
        events.small_pool_sizes(self.free_bytes(), self.in_use_bytes());
        Ok(())
    }
}
