//! Bucketed free lists of large contiguous buffers.

use super::events::Events;
use crate::{buf::LargeBuffer, DiscardReason, Error, PoolConfig};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

/// The large pool: one free list per permitted buffer size.
///
/// Permitted sizes follow the configured [`Growth`](crate::Growth) rule.
/// Requests above the maximum buffer size are satisfied with oversize
/// buffers that follow the same rule but are dropped (never pooled) on
/// return.
pub(crate) struct LargePool {
    config: PoolConfig,
    /// One LIFO free list per bucket, all behind one lock so the free
    /// counter moves with the lists.
    buckets: Mutex<Vec<Vec<LargeBuffer>>>,
    free_bytes: AtomicU64,
    in_use_bytes: AtomicU64,
}

impl LargePool {
    pub(crate) fn new(config: &PoolConfig) -> Self {
        let buckets = (0..config.num_buckets()).map(|_| Vec::new()).collect();
        Self {
            config: config.clone(),
            buckets: Mutex::new(buckets),
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

    /// Rents a buffer whose length is the smallest permitted size >=
    /// `required`, or an oversize buffer when `required` exceeds the
    /// maximum buffer size.
    ///
    /// Handed-out buffers are always zero-filled.
    pub(crate) fn acquire(&self, required: usize, events: &Events) -> LargeBuffer {
        let Some(bucket) = self.config.bucket_for(required) else {
            // Oversize rent: counted in-use, never pooled on return.
            let size = self.config.oversize_size(required);
            self.in_use_bytes.fetch_add(size as u64, Ordering::Release);
            events.non_pooled_large_buffer_created(size);
            events.large_pool_sizes(self.free_bytes(), self.in_use_bytes());
            return LargeBuffer::zeroed(size);
        };

        let size = self.config.bucket_size(bucket);
        let reused = {
            let mut buckets = self.buckets.lock().unwrap();
            let buffer = buckets[bucket].pop();
            if buffer.is_some() {
                self.free_bytes.fetch_sub(size as u64, Ordering::Release);
            }
            buffer
        };

        let buffer = match reused {
            Some(mut buffer) => {
                buffer.zero();
                buffer
            }
            None => {
                events.large_buffer_created(size);
                LargeBuffer::zeroed(size)
            }
        };

        self.in_use_bytes.fetch_add(size as u64, Ordering::Release);
        events.large_pool_sizes(self.free_bytes(), self.in_use_bytes());
        buffer
    }

    /// Returns a buffer.
    ///
    /// A buffer whose length is not a permitted pool size (an oversize
    /// rent) is dropped but still leaves the in-use count. A permitted
    /// buffer is pooled unless the free cap would be exceeded.
    pub(crate) fn release(&self, buffer: LargeBuffer, events: &Events) -> Result<(), Error> {
        if buffer.is_empty() {
            return Err(Error::EmptyBuffer);
        }

        let len = buffer.len();
        self.in_use_bytes.fetch_sub(len as u64, Ordering::Release);

        match self.config.bucket_of_exact(len) {
            None => {
                drop(buffer);
                events.large_buffer_discarded(len, DiscardReason::TooLarge);
            }
            Some(bucket) => {
                let cap = self.config.maximum_free_large_bytes as u64;
                let kept = {
                    let mut buckets = self.buckets.lock().unwrap();
                    let would_hold = self.free_bytes.load(Ordering::Acquire) + len as u64;
                    if cap == 0 || would_hold <= cap {
                        self.free_bytes.fetch_add(len as u64, Ordering::Release);
                        buckets[bucket].push(buffer);
                        true
                    } else {
                        false
                    }
                };
                if !kept {
                    events.large_buffer_discarded(len, DiscardReason::PoolFull);
                }
            }
        }

        events.large_pool_sizes(self.free_bytes(), self.in_use_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Growth;

    const MIB: usize = 1024 * 1024;

    fn test_pool(maximum_free_bytes: usize) -> LargePool {
        let config = PoolConfig::new(16384, MIB, 8 * MIB, Growth::Linear)
            .with_maximum_free_large_bytes(maximum_free_bytes);
        LargePool::new(&config)
    }

    #[test]
    fn test_acquire_rounds_up_to_bucket() {
        let events = Events::new();
        let pool = test_pool(0);

        let buffer = pool.acquire(1, &events);
        assert_eq!(buffer.len(), MIB);
        assert_eq!(pool.in_use_bytes(), MIB as u64);

        let buffer2 = pool.acquire(MIB + 1, &events);
        assert_eq!(buffer2.len(), 2 * MIB);
        assert_eq!(pool.in_use_bytes(), 3 * MIB as u64);
    }

    #[test]
    fn test_reuse_from_bucket() {
        let events = Events::new();
        let pool = test_pool(0);

        let mut buffer = pool.acquire(MIB, &events);
        buffer.as_mut().fill(0xCD);
        pool.release(buffer, &events).unwrap();
        assert_eq!(pool.free_bytes(), MIB as u64);

        let buffer = pool.acquire(MIB, &events);
        assert!(buffer.iter().all(|&b| b == 0));
        assert_eq!(pool.free_bytes(), 0);
        assert_eq!(pool.in_use_bytes(), MIB as u64);
    }

    #[test]
    fn test_oversize_rent_and_drop() {
        let events = Events::new();
        let pool = test_pool(0);

        let buffer = pool.acquire(8 * MIB + 1, &events);
        assert_eq!(buffer.len(), 9 * MIB);
        assert_eq!(pool.in_use_bytes(), 9 * MIB as u64);

        pool.release(buffer, &events).unwrap();
        assert_eq!(pool.in_use_bytes(), 0);
        assert_eq!(pool.free_bytes(), 0);
    }

    #[test]
    fn test_exponential_sizing() {
        let events = Events::new();
        let config = PoolConfig::new(100, 1000, 8000, Growth::Exponential);
        let pool = LargePool::new(&config);

        for (required, expected) in [(1000, 1000), (2000, 2000), (4000, 4000), (8000, 8000)] {
            let buffer = pool.acquire(required, &events);
            assert_eq!(buffer.len(), expected);
            pool.release(buffer, &events).unwrap();
        }
        let buffer = pool.acquire(5000, &events);
        assert_eq!(buffer.len(), 8000);
    }

    #[test]
    fn test_free_cap_drops_overflow() {
        let events = Events::new();
        let pool = test_pool(2 * MIB);

        let a = pool.acquire(MIB, &events);
        let b = pool.acquire(MIB, &events);
        let c = pool.acquire(MIB, &events);
        pool.release(a, &events).unwrap();
        pool.release(b, &events).unwrap();
        pool.release(c, &events).unwrap();

        assert_eq!(pool.free_bytes(), 2 * MIB as u64);
        assert_eq!(pool.in_use_bytes(), 0);
    }
}
