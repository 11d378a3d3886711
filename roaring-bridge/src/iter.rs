//! Iteration that survives mutation of the bitmap between calls.
//!
//! A [`VersionedIterator`] does not borrow the bitmap it walks. Each call
//! hands the bitmap back in together with a caller-maintained version token;
//! if the bitmap, the token, or the bitmap's own mutation stamp differ from
//! what the iterator last saw, the engine cursor is rebuilt and moved to the
//! smallest value the caller has not been given yet.

use std::marker::PhantomData;
use std::mem::MaybeUninit;

use tracing::trace;

use crate::range;
use crate::Bitmap;

/// Raw engine cursor.
///
/// It holds pointers into the bitmap it was created on. The `unsafe`
/// methods dereference them and may only be called while that bitmap is
/// alive and has not been mutated since the cursor was created.
#[derive(Clone)]
pub(crate) struct Cursor {
    raw: ffi::roaring_uint32_iterator_t,
    // Raw pointers inside `raw`; opt out of auto traits like the engine does.
    _marker: PhantomData<*const Bitmap>,
}

impl Cursor {
    pub(crate) fn new(bitmap: &Bitmap) -> Self {
        let mut raw = MaybeUninit::uninit();
        unsafe { ffi::roaring_iterator_init(bitmap.as_ptr(), raw.as_mut_ptr()) };
        Cursor {
            raw: unsafe { raw.assume_init() },
            _marker: PhantomData,
        }
    }

    /// Cursor positioned on the first element `>= value`.
    pub(crate) fn at_or_after(bitmap: &Bitmap, value: u32) -> Self {
        let mut cursor = Self::new(bitmap);
        if value > 0 {
            // SAFETY: freshly created on a borrowed bitmap
            unsafe { cursor.reset_at_or_after(value) };
        }
        cursor
    }

    #[inline]
    pub(crate) fn current(&self) -> Option<u32> {
        self.raw.has_value.then_some(self.raw.current_value)
    }

    #[inline]
    pub(crate) fn parent(&self) -> *const ffi::roaring_bitmap_t {
        self.raw.parent
    }

    #[inline]
    pub(crate) unsafe fn advance(&mut self) -> bool {
        ffi::roaring_uint32_iterator_advance(&mut self.raw)
    }

    /// Moves to the first element `>= value`, forwards or backwards.
    #[inline]
    pub(crate) unsafe fn reset_at_or_after(&mut self, value: u32) -> bool {
        ffi::roaring_uint32_iterator_move_equalorlarger(&mut self.raw, value)
    }

    /// Reads up to `dst.len()` elements, returning how many were written.
    #[inline]
    pub(crate) unsafe fn next_many(&mut self, dst: &mut [u32]) -> usize {
        let count = u32::try_from(dst.len()).unwrap_or(u32::MAX);
        let result = ffi::roaring_uint32_iterator_read(&mut self.raw, dst.as_mut_ptr(), count);
        debug_assert!(result <= count);
        result as usize
    }
}

/// Observable lifecycle of a [`VersionedIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Created on a non-empty bitmap, nothing reported yet
    Fresh,
    /// At least one element was reported or seeked to
    Positioned,
    /// End of sequence was reported; terminal
    Exhausted,
}

#[derive(Clone)]
struct Live {
    cursor: Cursor,
    version: u64,
    stamp: u64,
    // Smallest value not yet handed out; may be 2^32 after reporting u32::MAX.
    resume_at: u64,
    positioned: bool,
}

impl Live {
    fn is_stale(&self, bitmap: &Bitmap, version: u64) -> bool {
        self.cursor.parent() != bitmap.as_ptr() || self.version != version || self.stamp != bitmap.stamp()
    }

    fn resync(&mut self, bitmap: &Bitmap, version: u64, target: u32) {
        trace!(resume_at = target, version, "re-synchronizing bitmap iterator");
        self.cursor = Cursor::at_or_after(bitmap, target);
        self.version = version;
        self.stamp = bitmap.stamp();
    }

    fn next(&mut self, bitmap: Option<&Bitmap>, version: u64) -> Option<u32> {
        let bitmap = bitmap?;
        if self.is_stale(bitmap, version) {
            let target = u32::try_from(self.resume_at).ok()?;
            self.resync(bitmap, version, target);
        }
        let value = self.cursor.current()?;
        // SAFETY: not stale, so the cursor was built on `bitmap` and nothing
        // mutated it since
        unsafe { self.cursor.advance() };
        self.resume_at = u64::from(value) + 1;
        self.positioned = true;
        Some(value)
    }

    fn seek(&mut self, bitmap: Option<&Bitmap>, version: u64, minimum: f64) -> Option<u32> {
        let bitmap = bitmap?;
        let minimum = range::normalize_seek(minimum)?;
        if self.is_stale(bitmap, version) {
            self.resync(bitmap, version, minimum);
        } else if self.cursor.current()? < minimum {
            // SAFETY: not stale
            unsafe { self.cursor.reset_at_or_after(minimum) };
        }
        let value = self.cursor.current()?;
        self.resume_at = u64::from(value);
        self.positioned = true;
        Some(value)
    }
}

#[derive(Clone)]
enum State {
    Live(Live),
    Exhausted,
}

/// A cursor over a bitmap's ascending elements that tolerates mutation of
/// the bitmap between calls.
///
/// The caller passes the bitmap and a version token on every call and must
/// bump the token whenever it changes the bitmap. A changed token, a
/// different bitmap, or an unreported mutation all make the iterator
/// re-synchronize: it restarts the engine traversal at the smallest value it
/// has not reported yet, so reported values keep increasing.
///
/// Once end-of-sequence has been reported the iterator is exhausted for good.
/// Clones continue independently from the same position.
///
/// # Examples
///
/// ```
/// use roaring_bridge::{Bitmap, IteratorState, VersionedIterator};
///
/// let mut bitmap = Bitmap::of(&[1, 2, 3, 10]);
/// let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
/// assert_eq!(iter.state(), IteratorState::Fresh);
///
/// assert_eq!(iter.next(Some(&bitmap), 0), Some(1));
/// assert_eq!(iter.state(), IteratorState::Positioned);
///
/// bitmap.remove(2);
/// bitmap.add(5);
/// assert_eq!(iter.next(Some(&bitmap), 1), Some(3));
/// assert_eq!(iter.next(Some(&bitmap), 1), Some(5));
/// assert_eq!(iter.next(Some(&bitmap), 1), Some(10));
/// assert_eq!(iter.next(Some(&bitmap), 1), None);
/// assert!(iter.is_exhausted());
///
/// bitmap.add(20);
/// assert_eq!(iter.next(Some(&bitmap), 2), None);
/// ```
#[derive(Clone)]
pub struct VersionedIterator {
    state: State,
}

// The cursor is only dereferenced after checking it against a `&Bitmap`
// supplied by the caller on the current thread.
unsafe impl Send for VersionedIterator {}

impl VersionedIterator {
    /// Creates an iterator on the first element `>= minimum`.
    ///
    /// A NaN or negative minimum starts at the first element. The iterator
    /// is created exhausted when the bitmap is missing or has no qualifying
    /// element.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, VersionedIterator};
    ///
    /// let bitmap = Bitmap::of(&[1, 5, 9]);
    ///
    /// let mut iter = VersionedIterator::new(Some(&bitmap), 0, 4.5);
    /// assert_eq!(iter.next(Some(&bitmap), 0), Some(5));
    ///
    /// assert!(VersionedIterator::new(Some(&bitmap), 0, 10.0).is_exhausted());
    /// assert!(VersionedIterator::new(None, 0, 0.0).is_exhausted());
    /// ```
    pub fn new(bitmap: Option<&Bitmap>, version: u64, minimum: f64) -> Self {
        let live = bitmap.zip(range::normalize_minimum(minimum)).and_then(|(bitmap, minimum)| {
            let cursor = Cursor::at_or_after(bitmap, minimum);
            cursor.current()?;
            Some(Live {
                cursor,
                version,
                stamp: bitmap.stamp(),
                resume_at: u64::from(minimum),
                positioned: false,
            })
        });
        let state = match live {
            Some(live) => State::Live(live),
            None => State::Exhausted,
        };
        VersionedIterator { state }
    }

    /// Reports the next element, or `None` once the sequence is over.
    ///
    /// `bitmap` must be the bitmap the caller wants to continue over, usually
    /// the one the iterator was created on. Passing `None` ends iteration.
    pub fn next(&mut self, bitmap: Option<&Bitmap>, version: u64) -> Option<u32> {
        let value = match &mut self.state {
            State::Live(live) => live.next(bitmap, version),
            State::Exhausted => return None,
        };
        if value.is_none() {
            self.state = State::Exhausted;
        }
        value
    }

    /// Moves to the first element `>= minimum` and reports it without
    /// consuming it; the following [`next`](Self::next) returns it again.
    ///
    /// On an up-to-date iterator this only moves forward. After a mutation
    /// the traversal restarts at `minimum`, which may be behind the previous
    /// position. A NaN or infinite minimum, or one past the last possible
    /// element, ends iteration.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, VersionedIterator};
    ///
    /// let bitmap = Bitmap::of(&[1, 5, 9]);
    /// let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    ///
    /// assert_eq!(iter.seek_min(Some(&bitmap), 0, 4.0), Some(5));
    /// assert_eq!(iter.seek_min(Some(&bitmap), 0, 2.0), Some(5));
    /// assert_eq!(iter.next(Some(&bitmap), 0), Some(5));
    /// assert_eq!(iter.seek_min(Some(&bitmap), 0, 1e10), None);
    /// assert!(iter.is_exhausted());
    ///
    /// let mut iter = VersionedIterator::new(Some(&bitmap), 0, f64::NAN);
    /// assert_eq!(iter.seek_min(Some(&bitmap), 0, f64::NAN), None);
    /// assert!(iter.is_exhausted());
    /// ```
    pub fn seek_min(&mut self, bitmap: Option<&Bitmap>, version: u64, minimum: f64) -> Option<u32> {
        let value = match &mut self.state {
            State::Live(live) => live.seek(bitmap, version, minimum),
            State::Exhausted => return None,
        };
        if value.is_none() {
            self.state = State::Exhausted;
        }
        value
    }

    pub fn state(&self) -> IteratorState {
        match &self.state {
            State::Live(live) if live.positioned => IteratorState::Positioned,
            State::Live(_) => IteratorState::Fresh,
            State::Exhausted => IteratorState::Exhausted,
        }
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// Adapts the iterator to a standard [`Iterator`] over one bitmap and
    /// version, for stretches where the caller does not mutate.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, VersionedIterator};
    ///
    /// let bitmap = Bitmap::of(&[1, 5, 9]);
    /// let mut iter = VersionedIterator::new(Some(&bitmap), 0, 2.0);
    ///
    /// assert_eq!(iter.iter(&bitmap, 0).collect::<Vec<_>>(), [5, 9]);
    /// ```
    pub fn iter<'a>(&'a mut self, bitmap: &'a Bitmap, version: u64) -> impl Iterator<Item = u32> + 'a {
        std::iter::from_fn(move || self.next(Some(bitmap), version))
    }
}
