//! Pooled, seekable byte streams.
//!
//! This crate provides stream-shaped buffers (read/write/seek like an
//! in-memory file) whose backing storage is rented from, and returned to, a
//! process-wide pool. Workloads that construct many medium-to-large transient
//! byte buffers (serialization, protocol framing, snapshotting) pay repeated
//! large-allocation and copy costs on the general-purpose heap; recycling
//! fixed-size blocks and pre-sized contiguous buffers removes most of them.
//!
//! # Overview
//!
//! A [`PoolManager`] owns two pools:
//!
//! - a **small pool** of fixed-size blocks, each exactly
//!   [`PoolConfig::block_size`] bytes, and
//! - a **large pool** of contiguous buffers whose lengths follow a linear or
//!   exponential sizing rule (see [`Growth`]).
//!
//! Callers acquire a [`Stream`] from the manager and write, read, and seek
//! through it. The stream pulls blocks on demand and, when a contiguous view
//! is requested via [`Stream::make_contiguous`] and the content no longer
//! fits a single block, migrates to one large buffer. All storage returns to
//! the pools when the stream is closed or dropped.
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Seek, SeekFrom, Write};
//! use poolstream::{PoolConfig, PoolManager};
//!
//! let manager = PoolManager::new(PoolConfig::default());
//!
//! let mut stream = manager.tagged_stream("example");
//! stream.write_all(b"hello pooled world").unwrap();
//! stream.seek(SeekFrom::Start(6)).unwrap();
//!
//! let mut out = String::new();
//! stream.read_to_string(&mut out).unwrap();
//! assert_eq!(out, "pooled world");
//!
//! // Storage returns to the manager when the stream goes away.
//! drop(stream);
//! assert_eq!(manager.small_pool_in_use_bytes(), 0);
//! ```
//!
//! # Thread Safety
//!
//! The manager is `Clone + Send + Sync` and may be shared freely. Individual
//! streams are single-writer: mutating operations take `&mut self`. The
//! positionless [`Stream::read_at`] family and [`Stream::close`] take
//! `&self` and are safe to call concurrently from any number of threads.

mod buf;
mod observer;
mod pool;
mod stream;

pub use buf::{Block, LargeBuffer};
pub use observer::{DiscardReason, Observer};
pub use pool::{Growth, PoolConfig, PoolManager};
pub use stream::{Stream, StreamId, MAX_STREAM_LEN};

use thiserror::Error;

/// Errors returned by pool and stream operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The stream has been closed; only `close` is permitted.
    #[error("stream closed")]
    StreamClosed,
    /// A write would push the stream past [`MAX_STREAM_LEN`].
    #[error("stream would exceed maximum length")]
    StreamTooLong,
    /// A seek resolved to a negative absolute position.
    #[error("seek to a negative position")]
    SeekNegative,
    /// A position past [`MAX_STREAM_LEN`] was requested.
    #[error("position out of range")]
    PositionOutOfRange,
    /// A length past [`MAX_STREAM_LEN`] was requested.
    #[error("length out of range")]
    LengthOutOfRange,
    /// The operation would grow the stream past the manager's
    /// maximum stream capacity.
    #[error("stream capacity limit exceeded")]
    OverCapacity,
    /// A returned batch contained a block whose length does not match the
    /// pool's block size. The whole batch is rejected; no counters move.
    #[error("block length does not match pool block size")]
    BlockSizeMismatch,
    /// A zero-length buffer was returned to the large pool.
    #[error("buffer is empty")]
    EmptyBuffer,
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        let kind = match err {
            Error::SeekNegative | Error::PositionOutOfRange | Error::LengthOutOfRange => {
                ErrorKind::InvalidInput
            }
            Error::StreamClosed => ErrorKind::BrokenPipe,
            Error::StreamTooLong => ErrorKind::FileTooLarge,
            Error::OverCapacity => ErrorKind::OutOfMemory,
            Error::BlockSizeMismatch | Error::EmptyBuffer => ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}
