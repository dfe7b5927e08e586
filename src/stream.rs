//! The pooled, seekable byte stream.

use crate::{
    buf::{Block, LargeBuffer},
    Error, PoolManager,
};
use bytes::Buf;
use std::{
    backtrace::Backtrace,
    io::{self, SeekFrom},
    mem,
    sync::{
        atomic::{AtomicU8, Ordering},
        Mutex, RwLock,
    },
};
use tracing::debug;

/// Largest legal stream length and position.
pub const MAX_STREAM_LEN: u64 = (1 << 31) - 1;

const LIVE: u8 = 0;
const CLOSED: u8 = 1;

/// Opaque 128-bit stream identity, unique per stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u128);

impl StreamId {
    fn generate() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl std::fmt::Debug for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StreamId({:032x})", self.0)
    }
}

/// Backing storage of a stream.
///
/// A stream starts in block mode and migrates to a single large buffer the
/// first time a contiguous view is demanded for content that no longer fits
/// one block (or immediately, for contiguous construction). It never
/// migrates back.
enum Backing {
    /// Ordered list of fixed-size blocks; capacity is
    /// `blocks.len() * block_size`. An empty list is a fresh stream.
    Blocks(Vec<Block>),
    /// One contiguous buffer.
    ///
    /// `retired` holds superseded large buffers and `blocks` the original
    /// block list; both stay attached until close unless the manager is in
    /// aggressive-return mode, in which case they are returned at migration
    /// time and these are empty.
    Large {
        current: LargeBuffer,
        retired: Vec<LargeBuffer>,
        blocks: Vec<Block>,
    },
}

/// Logical content and its storage, guarded together so positionless reads
/// observe a consistent pair.
struct Body {
    backing: Backing,
    length: u64,
}

impl Body {
    /// Bytes of backing storage.
    fn capacity(&self, block_size: usize) -> u64 {
        match &self.backing {
            Backing::Blocks(blocks) => (blocks.len() * block_size) as u64,
            Backing::Large { current, .. } => current.len() as u64,
        }
    }

    /// Copies `out.len()` bytes starting at `pos`. The range must lie
    /// within the backing capacity.
    fn copy_out(&self, pos: u64, out: &mut [u8], block_size: usize) {
        match &self.backing {
            Backing::Blocks(blocks) => {
                let pos = pos as usize;
                let mut copied = 0;
                while copied < out.len() {
                    let at = pos + copied;
                    let (index, offset) = (at / block_size, at % block_size);
                    let n = (block_size - offset).min(out.len() - copied);
                    out[copied..copied + n].copy_from_slice(&blocks[index][offset..offset + n]);
                    copied += n;
                }
            }
            Backing::Large { current, .. } => {
                let pos = pos as usize;
                out.copy_from_slice(&current[pos..pos + out.len()]);
            }
        }
    }

    /// Writes `data` starting at `pos`. Capacity must already cover the
    /// range.
    fn write_in(&mut self, pos: u64, data: &[u8], block_size: usize) {
        match &mut self.backing {
            Backing::Blocks(blocks) => {
                let mut pos = pos as usize;
                let mut data = data;
                while !data.is_empty() {
                    let (index, offset) = (pos / block_size, pos % block_size);
                    let n = (block_size - offset).min(data.len());
                    blocks[index][offset..offset + n].copy_from_slice(&data[..n]);
                    pos += n;
                    data = &data[n..];
                }
            }
            Backing::Large { current, .. } => {
                let pos = pos as usize;
                current[pos..pos + data.len()].copy_from_slice(data);
            }
        }
    }

    /// Zero-fills `[from, to)`. Capacity must already cover the range.
    ///
    /// Blocks and large buffers are zeroed when rented, but a shrink
    /// followed by a regrow re-exposes bytes this stream itself wrote, so
    /// logical extensions always clear the gap.
    fn zero_range(&mut self, from: u64, to: u64, block_size: usize) {
        match &mut self.backing {
            Backing::Blocks(blocks) => {
                let mut pos = from as usize;
                let end = to as usize;
                while pos < end {
                    let (index, offset) = (pos / block_size, pos % block_size);
                    let n = (block_size - offset).min(end - pos);
                    blocks[index][offset..offset + n].fill(0);
                    pos += n;
                }
            }
            Backing::Large { current, .. } => {
                current[from as usize..to as usize].fill(0);
            }
        }
    }

    /// Reads up to `buf.len()` bytes starting at `pos`, clamped to the
    /// logical length. Returns the byte count, zero at or past the end.
    fn read_into(&self, pos: u64, buf: &mut [u8], block_size: usize) -> usize {
        if pos >= self.length {
            return 0;
        }
        let n = (buf.len() as u64).min(self.length - pos) as usize;
        self.copy_out(pos, &mut buf[..n], block_size);
        n
    }
}

/// Grows `body` so its capacity covers `required` bytes.
///
/// In block mode, whole blocks are rented; in large mode, the current
/// buffer is replaced by one of the smallest permitted size >= `required`
/// and the logical content is copied across. Fails (mutating nothing) if
/// `required` exceeds the manager's maximum stream capacity.
fn grow(manager: &PoolManager, id: StreamId, body: &mut Body, required: u64) -> Result<(), Error> {
    let block_size = manager.config().block_size.get();
    if required <= body.capacity(block_size) {
        return Ok(());
    }
    let maximum = manager.maximum_stream_capacity();
    if maximum > 0 && required > maximum {
        manager.events().stream_over_capacity(&id.to_string());
        return Err(Error::OverCapacity);
    }

    let length = body.length as usize;
    match &mut body.backing {
        Backing::Blocks(blocks) => {
            let needed = required.div_ceil(block_size as u64) as usize;
            while blocks.len() < needed {
                blocks.push(manager.get_block());
            }
        }
        Backing::Large {
            current, retired, ..
        } => {
            let mut replacement = manager.get_large_buffer(required as usize);
            replacement[..length].copy_from_slice(&current[..length]);
            let superseded = mem::replace(current, replacement);
            if manager.aggressive_return() {
                manager.return_large_buffer(superseded)?;
            } else {
                retired.push(superseded);
            }
        }
    }
    Ok(())
}

/// Returns all storage held by `body` to the pools, leaving it empty.
fn release_storage(manager: &PoolManager, body: &mut Body) {
    body.length = 0;
    match mem::replace(&mut body.backing, Backing::Blocks(Vec::new())) {
        Backing::Blocks(blocks) => {
            if !blocks.is_empty() {
                let _ = manager.return_blocks(blocks);
            }
        }
        Backing::Large {
            current,
            retired,
            blocks,
        } => {
            let _ = manager.return_large_buffer(current);
            for buffer in retired {
                let _ = manager.return_large_buffer(buffer);
            }
            if !blocks.is_empty() {
                let _ = manager.return_blocks(blocks);
            }
        }
    }
}

/// Backtraces recorded at close time when stack capture is enabled.
#[derive(Default)]
struct CloseStacks {
    first: Option<Backtrace>,
    second: Option<Backtrace>,
}

/// A seekable byte stream backed by pooled storage.
///
/// Behaves like an in-memory file: write, read, and seek against a logical
/// position, with the length tracking the furthest byte written. Storage is
/// rented from the manager block by block; requesting a contiguous view via
/// [`Self::make_contiguous`] migrates content that outgrew one block into a
/// single large buffer.
///
/// # Lifecycle
///
/// ```text
/// Fresh ──write──► InBlocks ──make_contiguous──► InLarge ──close──► Closed
///   └───────────────────────────close────────────────────────────────┘
/// ```
///
/// Every state can close; backing never moves backwards. Closing returns
/// all storage to the pools; dropping an open stream does the same.
/// After close, every operation other than [`Self::close`] fails with
/// [`Error::StreamClosed`].
///
/// # Thread Safety
///
/// Mutating operations take `&mut self` and are single-threaded by
/// construction. [`Self::read_at`], [`Self::read_byte_at`],
/// [`Self::write_to`], [`Self::to_vec`], and [`Self::close`] take `&self`
/// and may run concurrently from any number of threads; the borrow checker
/// guarantees no mutator runs at the same time.
pub struct Stream {
    manager: PoolManager,
    id: StreamId,
    tag: Option<String>,
    /// Read/write cursor. May point past the length; the gap zero-fills on
    /// the next write.
    position: u64,
    state: AtomicU8,
    body: RwLock<Body>,
    allocation_stack: Option<Backtrace>,
    close_stacks: Mutex<CloseStacks>,
}

impl Stream {
    /// Creates an empty, untagged stream drawing from `manager`.
    pub fn new(manager: &PoolManager) -> Self {
        Self::construct(manager, StreamId::generate(), None, Backing::Blocks(Vec::new()))
    }

    /// Creates an empty stream carrying a diagnostic tag.
    pub fn with_tag(manager: &PoolManager, tag: &str) -> Self {
        Self::construct(
            manager,
            StreamId::generate(),
            Some(tag),
            Backing::Blocks(Vec::new()),
        )
    }

    /// Creates a stream whose capacity already covers `capacity` bytes.
    pub fn with_capacity(
        manager: &PoolManager,
        tag: Option<&str>,
        capacity: u64,
    ) -> Result<Self, Error> {
        Self::build(manager, tag, capacity, false)
    }

    pub(crate) fn build(
        manager: &PoolManager,
        tag: Option<&str>,
        capacity: u64,
        contiguous: bool,
    ) -> Result<Self, Error> {
        let id = StreamId::generate();
        if capacity > MAX_STREAM_LEN {
            return Err(Error::LengthOutOfRange);
        }
        let maximum = manager.maximum_stream_capacity();
        if maximum > 0 && capacity > maximum {
            manager.events().stream_over_capacity(&id.to_string());
            return Err(Error::OverCapacity);
        }

        let block_size = manager.config().block_size.get();
        let backing = if contiguous && capacity > block_size as u64 {
            Backing::Large {
                current: manager.get_large_buffer(capacity as usize),
                retired: Vec::new(),
                blocks: Vec::new(),
            }
        } else {
            let needed = capacity.div_ceil(block_size as u64) as usize;
            Backing::Blocks((0..needed).map(|_| manager.get_block()).collect())
        };
        Ok(Self::construct(manager, id, tag, backing))
    }

    fn construct(
        manager: &PoolManager,
        id: StreamId,
        tag: Option<&str>,
        backing: Backing,
    ) -> Self {
        let allocation_stack = manager.capture_stacks().then(Backtrace::force_capture);
        let stream = Self {
            manager: manager.clone(),
            id,
            tag: tag.map(str::to_owned),
            position: 0,
            state: AtomicU8::new(LIVE),
            body: RwLock::new(Body {
                backing,
                length: 0,
            }),
            allocation_stack,
            close_stacks: Mutex::new(CloseStacks::default()),
        };
        debug!(id = %stream.id, tag = ?stream.tag, "stream created");
        manager.events().stream_created();
        stream
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.state.load(Ordering::Acquire) == CLOSED {
            return Err(Error::StreamClosed);
        }
        Ok(())
    }

    /// Whether the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    /// The stream's unique identity.
    pub fn id(&self) -> Result<StreamId, Error> {
        self.ensure_open()?;
        Ok(self.id)
    }

    /// The caller-supplied diagnostic tag, if any.
    pub fn tag(&self) -> Result<Option<&str>, Error> {
        self.ensure_open()?;
        Ok(self.tag.as_deref())
    }

    /// The manager this stream draws storage from.
    pub fn manager(&self) -> &PoolManager {
        &self.manager
    }

    /// Logical byte count.
    pub fn len(&self) -> Result<u64, Error> {
        self.ensure_open()?;
        Ok(self.body.read().unwrap().length)
    }

    /// Whether the logical content is empty.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Bytes of backing storage currently rented.
    pub fn capacity(&self) -> Result<u64, Error> {
        self.ensure_open()?;
        let block_size = self.manager.config().block_size.get();
        Ok(self.body.read().unwrap().capacity(block_size))
    }

    /// The read/write cursor.
    pub fn position(&self) -> Result<u64, Error> {
        self.ensure_open()?;
        Ok(self.position)
    }

    /// Moves the cursor. Positions past the length are legal and allocate
    /// nothing; the gap zero-fills on the next write.
    pub fn set_position(&mut self, position: u64) -> Result<(), Error> {
        self.ensure_open()?;
        if position > MAX_STREAM_LEN {
            return Err(Error::PositionOutOfRange);
        }
        self.position = position;
        Ok(())
    }

    /// Writes all of `data` at the cursor, growing capacity as needed.
    ///
    /// On failure nothing changes: not the length, the position, nor the
    /// capacity.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(());
        }
        let end = self
            .position
            .checked_add(data.len() as u64)
            .filter(|&end| end <= MAX_STREAM_LEN)
            .ok_or(Error::StreamTooLong)?;

        let body = self.body.get_mut().unwrap();
        grow(&self.manager, self.id, body, end)?;

        let block_size = self.manager.config().block_size.get();
        if self.position > body.length {
            let from = body.length;
            body.zero_range(from, self.position, block_size);
        }
        body.write_in(self.position, data, block_size);
        self.position = end;
        body.length = body.length.max(end);
        Ok(())
    }

    /// Writes a single byte. Never grows capacity when the cursor is
    /// strictly inside it.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.write(&[byte])
    }

    /// Writes every chunk of `src` at the cursor.
    ///
    /// The endpoint and capacity are checked up front, so a refused write
    /// mutates nothing even when `src` is chunked.
    pub fn put(&mut self, mut src: impl Buf) -> Result<(), Error> {
        self.ensure_open()?;
        let total = src.remaining() as u64;
        if total == 0 {
            return Ok(());
        }
        let end = self
            .position
            .checked_add(total)
            .filter(|&end| end <= MAX_STREAM_LEN)
            .ok_or(Error::StreamTooLong)?;

        let body = self.body.get_mut().unwrap();
        grow(&self.manager, self.id, body, end)?;

        let block_size = self.manager.config().block_size.get();
        if self.position > body.length {
            let from = body.length;
            body.zero_range(from, self.position, block_size);
        }
        while src.has_remaining() {
            let chunk = src.chunk();
            body.write_in(self.position, chunk, block_size);
            self.position += chunk.len() as u64;
            let n = chunk.len();
            src.advance(n);
        }
        debug_assert_eq!(self.position, end);
        body.length = body.length.max(end);
        Ok(())
    }

    /// Reads up to `buf.len()` bytes at the cursor, advancing it by the
    /// count actually read. Returns zero at or past the end.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        self.ensure_open()?;
        let block_size = self.manager.config().block_size.get();
        let body = self.body.get_mut().unwrap();
        let n = body.read_into(self.position, buf, block_size);
        self.position += n as u64;
        Ok(n)
    }

    /// Reads one byte at the cursor, or `None` at the end.
    pub fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut byte = [0u8];
        Ok((self.read(&mut byte)? == 1).then(|| byte[0]))
    }

    /// Reads up to `buf.len()` bytes at the external cursor `pos`,
    /// advancing it by the count actually read.
    ///
    /// The stream's own position is neither read nor written, so any number
    /// of threads may call this concurrently with independent cursors.
    pub fn read_at(&self, buf: &mut [u8], pos: &mut u64) -> Result<usize, Error> {
        self.ensure_open()?;
        let block_size = self.manager.config().block_size.get();
        let body = self.body.read().unwrap();
        let n = body.read_into(*pos, buf, block_size);
        *pos += n as u64;
        Ok(n)
    }

    /// Reads one byte at the external cursor `pos`, or `None` at the end.
    pub fn read_byte_at(&self, pos: &mut u64) -> Result<Option<u8>, Error> {
        let mut byte = [0u8];
        Ok((self.read_at(&mut byte, pos)? == 1).then(|| byte[0]))
    }

    /// Moves the cursor relative to the start, the cursor, or the end.
    ///
    /// Seeking past the end is legal and does not extend the stream.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
        self.ensure_open()?;
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => {
                if offset > MAX_STREAM_LEN {
                    return Err(Error::PositionOutOfRange);
                }
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::Current(delta) => (self.position, delta),
            SeekFrom::End(delta) => (self.body.get_mut().unwrap().length, delta),
        };
        let target = base as i128 + delta as i128;
        if target < 0 {
            return Err(Error::SeekNegative);
        }
        if target > MAX_STREAM_LEN as i128 {
            return Err(Error::PositionOutOfRange);
        }
        self.position = target as u64;
        Ok(self.position)
    }

    /// Sets the logical length, growing capacity if needed.
    ///
    /// Shrinking clamps a cursor past the new end down to it; growing
    /// zero-fills the extension and leaves the cursor alone.
    pub fn set_len(&mut self, length: u64) -> Result<(), Error> {
        self.ensure_open()?;
        if length > MAX_STREAM_LEN {
            return Err(Error::LengthOutOfRange);
        }
        let body = self.body.get_mut().unwrap();
        grow(&self.manager, self.id, body, length)?;
        let old = body.length;
        if length > old {
            let block_size = self.manager.config().block_size.get();
            body.zero_range(old, length, block_size);
        }
        body.length = length;
        if self.position > length {
            self.position = length;
        }
        Ok(())
    }

    /// Grows capacity to cover at least `capacity` bytes. Never shrinks.
    ///
    /// On failure nothing changes.
    pub fn ensure_capacity(&mut self, capacity: u64) -> Result<(), Error> {
        self.ensure_open()?;
        if capacity > MAX_STREAM_LEN {
            return Err(Error::LengthOutOfRange);
        }
        let body = self.body.get_mut().unwrap();
        grow(&self.manager, self.id, body, capacity)
    }

    /// Returns the whole backing as one contiguous mutable slice.
    ///
    /// Content that fits a single block is served from it (a fresh stream
    /// rents one); anything larger migrates to a large buffer of the
    /// smallest permitted size covering the length, copying the logical
    /// content across. Superseded blocks stay attached until close unless
    /// the manager is in aggressive-return mode. Repeated calls return the
    /// same buffer until a capacity-growing operation replaces it.
    ///
    /// The slice spans the full capacity; bytes past [`Self::len`] are
    /// whatever the stream last put there.
    pub fn make_contiguous(&mut self) -> Result<&mut [u8], Error> {
        self.ensure_open()?;
        let block_size = self.manager.config().block_size.get();
        let body = self.body.get_mut().unwrap();
        let length = body.length;

        if let Backing::Blocks(blocks) = &mut body.backing {
            if blocks.is_empty() {
                blocks.push(self.manager.get_block());
            } else if blocks.len() > 1 {
                // Outgrew one block: migrate to a single large buffer.
                let required = length.max(block_size as u64 + 1);
                let mut large = self.manager.get_large_buffer(required as usize);
                let mut copied = 0;
                for block in blocks.iter() {
                    let n = block_size.min(length as usize - copied);
                    large[copied..copied + n].copy_from_slice(&block[..n]);
                    copied += n;
                    if copied == length as usize {
                        break;
                    }
                }
                let superseded = mem::take(blocks);
                let blocks = if self.manager.aggressive_return() {
                    self.manager.return_blocks(superseded)?;
                    Vec::new()
                } else {
                    superseded
                };
                body.backing = Backing::Large {
                    current: large,
                    retired: Vec::new(),
                    blocks,
                };
            }
        }

        match &mut body.backing {
            Backing::Blocks(blocks) => Ok(&mut blocks[0][..]),
            Backing::Large { current, .. } => Ok(&mut current[..]),
        }
    }

    /// Copies the logical content into a fresh `Vec`.
    ///
    /// The result never aliases the backing storage.
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        self.ensure_open()?;
        let block_size = self.manager.config().block_size.get();
        let out = {
            let body = self.body.read().unwrap();
            let mut out = vec![0u8; body.length as usize];
            body.copy_out(0, &mut out, block_size);
            out
        };
        self.manager.events().stream_converted_to_array();
        Ok(out)
    }

    /// Writes the full logical content to `target`. The cursor does not
    /// move.
    pub fn write_to<W: io::Write>(&self, target: &mut W) -> io::Result<()> {
        self.ensure_open()?;
        let block_size = self.manager.config().block_size.get();
        let body = self.body.read().unwrap();
        let length = body.length as usize;
        match &body.backing {
            Backing::Blocks(blocks) => {
                let mut remaining = length;
                for block in blocks {
                    if remaining == 0 {
                        break;
                    }
                    let n = block_size.min(remaining);
                    target.write_all(&block[..n])?;
                    remaining -= n;
                }
            }
            Backing::Large { current, .. } => {
                target.write_all(&current[..length])?;
            }
        }
        Ok(())
    }

    /// Closes the stream, returning all storage to the pools.
    ///
    /// Idempotent and safe to call concurrently: exactly one caller
    /// performs the return; every later (or losing) call is recorded as a
    /// double close.
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(LIVE, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if self.manager.capture_stacks() {
                self.close_stacks.lock().unwrap().first = Some(Backtrace::force_capture());
            }
            let mut body = self.body.write().unwrap();
            release_storage(&self.manager, &mut body);
            drop(body);
            debug!(id = %self.id, tag = ?self.tag, "stream disposed");
            self.manager.events().stream_disposed();
        } else {
            if self.manager.capture_stacks() {
                let mut stacks = self.close_stacks.lock().unwrap();
                if stacks.second.is_none() {
                    stacks.second = Some(Backtrace::force_capture());
                }
            }
            self.manager.events().stream_double_dispose(&self.id.to_string());
        }
    }

    /// The backtrace captured at construction, when stack capture was
    /// enabled. Available after close for leak hunting.
    pub fn allocation_stack(&self) -> Option<String> {
        self.allocation_stack.as_ref().map(|b| b.to_string())
    }

    /// The backtrace of the close that released storage.
    pub fn close_stack(&self) -> Option<String> {
        self.close_stacks.lock().unwrap().first.as_ref().map(|b| b.to_string())
    }

    /// The backtrace of the first redundant close, if any happened.
    pub fn second_close_stack(&self) -> Option<String> {
        self.close_stacks.lock().unwrap().second.as_ref().map(|b| b.to_string())
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if self
            .state
            .compare_exchange(LIVE, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let body = self.body.get_mut().unwrap();
            release_storage(&self.manager, body);
            debug!(id = %self.id, tag = ?self.tag, "stream dropped while open");
            self.manager.events().stream_disposed();
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = self.body.read().unwrap().length;
        write!(
            f,
            "stream {} (tag: {}, length: {} bytes, position: {}, {})",
            self.id,
            self.tag.as_deref().unwrap_or("-"),
            group_digits(length),
            group_digits(self.position),
            if self.is_closed() { "closed" } else { "open" },
        )
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("length", &self.body.read().unwrap().length)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl io::Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Stream::read(self, buf)?)
    }
}

impl io::Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Stream::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Stream::seek(self, pos)?)
    }
}

/// Formats `value` with a comma every three digits.
fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
