//! Subscribable event sink for pool and stream lifecycle transitions.

/// Why a buffer returned to a pool was dropped instead of retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The buffer's length is not a permitted pool size (an oversize rent).
    TooLarge,
    /// Retaining the buffer would push the free pool past its cap.
    PoolFull,
}

/// Hooks invoked by a [`PoolManager`](crate::PoolManager) on notable
/// transitions.
///
/// All methods default to no-ops; implement only the ones of interest.
/// Subscribers are invoked synchronously on the thread performing the
/// transition, so implementations should be quick and must not call back
/// into the pool that produced the event.
#[allow(unused_variables)]
pub trait Observer: Send + Sync {
    /// A fresh block was allocated because the small pool's free list was
    /// empty.
    fn block_created(&self) {}

    /// A returned block was dropped because the small pool's free cap would
    /// have been exceeded.
    fn block_discarded(&self) {}

    /// A fresh large buffer of `size` bytes was allocated because the
    /// matching bucket's free list was empty.
    fn large_buffer_created(&self, size: usize) {}

    /// An oversize buffer of `size` bytes was allocated; it will never be
    /// pooled.
    fn non_pooled_large_buffer_created(&self, size: usize) {}

    /// A returned large buffer of `size` bytes was dropped.
    fn large_buffer_discarded(&self, size: usize, reason: DiscardReason) {}

    /// A stream was created.
    fn stream_created(&self) {}

    /// A stream was closed and its storage returned to the pools.
    fn stream_disposed(&self) {}

    /// A stream was closed more than once. Fires on every close after the
    /// first.
    fn stream_double_dispose(&self) {}

    /// A stream's logical content was copied out into a fresh array.
    fn stream_converted_to_array(&self) {}

    /// A stream refused to grow past the manager's maximum stream capacity.
    fn stream_over_capacity(&self) {}
}
