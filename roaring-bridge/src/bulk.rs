//! Bulk transfer of elements through one fixed-size shared buffer.
//!
//! A [`BulkChannel`] owns the buffer. Sessions pin a bitmap and move data
//! between it and the buffer in chunks:
//!
//! * [`BulkReadSession`] fills the buffer with the next elements of a bitmap,
//! * [`BulkAddSession`] inserts the elements the caller wrote to the buffer,
//! * [`BulkRemoveSession`] removes them.
//!
//! Only the most recently started session of a channel is usable. Beginning a
//! session invalidates the previous one, whatever its kind, and the stale
//! session then fails with [`Error::SessionInvalidated`].
//!
//! # Examples
//!
//! ```
//! use roaring_bridge::{Bitmap, BulkChannel};
//!
//! let bitmap = Bitmap::from_range(0.0, 10.0, 1.0).unwrap();
//! let mut channel = BulkChannel::with_capacity(4);
//!
//! let mut session = channel.begin_read(Some(&bitmap), 6.0).unwrap();
//! let mut read = Vec::new();
//! loop {
//!     let n = session.drain(&mut channel).unwrap();
//!     if n == 0 {
//!         break;
//!     }
//!     read.extend_from_slice(&channel.buffer()[..n]);
//! }
//! assert_eq!(read, [0, 1, 2, 3, 4, 5]);
//! ```

use std::marker::PhantomData;

use tracing::debug;

use crate::iter::Cursor;
use crate::range;
use crate::{Bitmap, Error, Result};

/// The shared element buffer plus the identity of the active session.
pub struct BulkChannel {
    buffer: Box<[u32]>,
    active: u64,
}

impl BulkChannel {
    /// Elements held by a channel created with [`BulkChannel::new`].
    pub const DEFAULT_CAPACITY: usize = 65536 * 15;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a channel whose buffer holds `capacity` elements (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        BulkChannel {
            buffer: vec![0; capacity.max(1)].into_boxed_slice(),
            active: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The shared buffer. After a drain its first `n` elements are valid.
    #[inline]
    pub fn buffer(&self) -> &[u32] {
        &self.buffer
    }

    /// The shared buffer, for staging elements before an apply.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [u32] {
        &mut self.buffer
    }

    fn begin(&mut self, kind: &'static str) -> u64 {
        if self.active != 0 {
            debug!(previous = self.active, "bulk session invalidated");
        }
        self.active += 1;
        debug!(session = self.active, kind, "bulk session started");
        self.active
    }

    fn check(&self, session: u64) -> Result<()> {
        if self.active == session {
            Ok(())
        } else {
            Err(Error::SessionInvalidated)
        }
    }

    fn check_chunk(&self, count: usize) -> Result<()> {
        if count > self.capacity() {
            return Err(Error::ChunkOverflow {
                count,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    /// Starts reading at most `max_count` elements of `bitmap`.
    ///
    /// Returns `None` when the bitmap is missing or `max_count` is NaN or
    /// below one; the previous session is invalidated either way. Counts
    /// above `2^53 - 1` are clamped.
    pub fn begin_read<'b>(&mut self, bitmap: Option<&'b Bitmap>, max_count: f64) -> Option<BulkReadSession<'b>> {
        let session = self.begin("read");
        let bitmap = bitmap?;
        let remaining = range::normalize_count(max_count)?;
        Some(BulkReadSession {
            cursor: Cursor::new(bitmap),
            remaining,
            session,
            _bitmap: PhantomData,
        })
    }

    /// Starts inserting buffer chunks into `bitmap`.
    pub fn begin_add<'b>(&mut self, bitmap: &'b mut Bitmap) -> BulkAddSession<'b> {
        let session = self.begin("add");
        BulkAddSession {
            bitmap,
            // SAFETY: the engine expects a zeroed context for a new batch
            context: unsafe { std::mem::zeroed() },
            session,
        }
    }

    /// Starts removing buffer chunks from `bitmap`.
    pub fn begin_remove<'b>(&mut self, bitmap: &'b mut Bitmap) -> BulkRemoveSession<'b> {
        let session = self.begin("remove");
        BulkRemoveSession { bitmap, session }
    }
}

impl Default for BulkChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Materializes a bitmap's elements, in ascending order, one buffer at a time.
pub struct BulkReadSession<'b> {
    cursor: Cursor,
    remaining: u64,
    session: u64,
    // The bitmap stays borrowed, so the cursor cannot go stale.
    _bitmap: PhantomData<&'b Bitmap>,
}

impl<'b> BulkReadSession<'b> {
    /// Fills the channel's buffer with the next elements and returns how many
    /// were written. Zero means the budget or the bitmap is exhausted.
    pub fn drain(&mut self, channel: &mut BulkChannel) -> Result<usize> {
        channel.check(self.session)?;
        Ok(self.read(channel))
    }

    /// Like [`drain`](Self::drain), but first moves forward to the first
    /// element `>= minimum`. Elements already drained are never read again,
    /// so a minimum behind the session's position does not move it. A NaN or
    /// infinite minimum, or one past the last possible element, ends the
    /// session.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, BulkChannel};
    ///
    /// let bitmap = Bitmap::of(&[1, 5, 9, 12]);
    /// let mut channel = BulkChannel::new();
    ///
    /// let mut session = channel.begin_read(Some(&bitmap), f64::INFINITY).unwrap();
    /// assert_eq!(session.drain_from(&mut channel, 4.5).unwrap(), 3);
    /// assert_eq!(&channel.buffer()[..3], [5, 9, 12]);
    /// assert_eq!(session.drain(&mut channel).unwrap(), 0);
    /// ```
    pub fn drain_from(&mut self, channel: &mut BulkChannel, minimum: f64) -> Result<usize> {
        channel.check(self.session)?;
        if self.remaining == 0 {
            return Ok(0);
        }
        match range::normalize_seek(minimum) {
            Some(minimum) if self.cursor.current().is_some_and(|value| value < minimum) => {
                // SAFETY: the bitmap is borrowed for the session's lifetime
                unsafe { self.cursor.reset_at_or_after(minimum) };
            }
            Some(_) => {}
            None => self.remaining = 0,
        }
        Ok(self.read(channel))
    }

    /// Elements still allowed by the session's budget.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn read(&mut self, channel: &mut BulkChannel) -> usize {
        if self.remaining == 0 {
            return 0;
        }
        let len = usize::try_from(self.remaining).map_or(channel.capacity(), |n| n.min(channel.capacity()));
        // SAFETY: the bitmap is borrowed for the session's lifetime
        let written = unsafe { self.cursor.next_many(&mut channel.buffer[..len]) };
        if written < len {
            self.remaining = 0;
        } else {
            self.remaining -= written as u64;
        }
        written
    }
}

/// Inserts chunks staged in the channel's buffer into a bitmap.
pub struct BulkAddSession<'b> {
    bitmap: &'b mut Bitmap,
    context: ffi::roaring_bulk_context_t,
    session: u64,
}

impl<'b> BulkAddSession<'b> {
    /// Inserts the first `count` elements of the channel's buffer.
    ///
    /// Elements may be unsorted and repeated. The insertion context is kept
    /// between chunks, so clustered input stays cheap across calls.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, BulkChannel};
    ///
    /// let mut bitmap = Bitmap::create();
    /// let mut channel = BulkChannel::new();
    ///
    /// let mut session = channel.begin_add(&mut bitmap);
    /// channel.buffer_mut()[..4].copy_from_slice(&[5, 1, 5, 3]);
    /// session.apply(&channel, 4).unwrap();
    /// drop(session);
    ///
    /// assert_eq!(bitmap.to_vec(), [1, 3, 5]);
    /// ```
    pub fn apply(&mut self, channel: &BulkChannel, count: usize) -> Result<()> {
        channel.check(self.session)?;
        channel.check_chunk(count)?;
        let bitmap = self.bitmap.as_mut_ptr();
        for &value in &channel.buffer[..count] {
            // SAFETY: the bitmap is exclusively borrowed by this session, so
            // the context only ever saw containers of this bitmap
            unsafe { ffi::roaring_bitmap_add_bulk(bitmap, &mut self.context, value) };
        }
        Ok(())
    }
}

/// Removes chunks staged in the channel's buffer from a bitmap.
pub struct BulkRemoveSession<'b> {
    bitmap: &'b mut Bitmap,
    session: u64,
}

impl<'b> BulkRemoveSession<'b> {
    /// Removes the first `count` elements of the channel's buffer in one
    /// engine call.
    pub fn apply(&mut self, channel: &BulkChannel, count: usize) -> Result<()> {
        channel.check(self.session)?;
        channel.check_chunk(count)?;
        self.bitmap.remove_many(&channel.buffer[..count]);
        Ok(())
    }
}
