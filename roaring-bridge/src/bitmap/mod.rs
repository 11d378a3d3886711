//! The bitmap facade: one owned CRoaring bitmap behind a stable handle.
//!
//! # Example
//!
//! ```rust
//! use roaring_bridge::bitmap::{self, Bitmap, NullableBitmap};
//!
//! let mut rb1 = Bitmap::of(&[1, 2, 3, 4, 5, 100, 1000]);
//! rb1.optimize();
//!
//! let rb2 = Bitmap::of(&[3, 4, 1000]);
//!
//! assert_eq!(rb1.cardinality(), 7);
//! assert!(rb1.contains(3));
//! assert!(rb1.has(3.0));
//! assert!(!rb1.has(3.5));
//!
//! let and = bitmap::and(Some(&rb1), Some(&rb2)).unwrap();
//! assert_eq!(and.to_vec(), [3, 4, 1000]);
//!
//! // A missing bitmap reads as the empty set
//! let missing: Option<&Bitmap> = None;
//! assert_eq!(missing.cardinality(), 0);
//! assert!(bitmap::and(Some(&rb1), missing).is_none());
//! assert_eq!(bitmap::or(missing, Some(&rb2)).unwrap(), rb2);
//! ```

use std::alloc::{handle_alloc_error, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// A compressed bitmap of `u32` elements
///
/// The engine bitmap lives on the heap, so its address identifies it for
/// the lifetime of the handle, even when the `Bitmap` itself moves.
pub struct Bitmap {
    bitmap: NonNull<ffi::roaring_bitmap_t>,
    // Refreshed from `STAMPS` on creation and on every mutable access.
    stamp: u64,
}

unsafe impl Sync for Bitmap {}
unsafe impl Send for Bitmap {}

/// Detailed statistics on the composition of a bitmap
pub type Statistics = ffi::roaring_statistics_s;

static STAMPS: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_stamp() -> u64 {
    STAMPS.fetch_add(1, Ordering::Relaxed)
}

impl Bitmap {
    /// Takes ownership of a heap bitmap returned by the engine.
    ///
    /// Aborts through [`handle_alloc_error`] if the engine failed to allocate.
    #[inline]
    pub(crate) unsafe fn take_heap(p: *mut ffi::roaring_bitmap_t) -> Self {
        match Self::try_take_heap(p) {
            Some(bitmap) => bitmap,
            None => handle_alloc_error(Layout::new::<ffi::roaring_bitmap_t>()),
        }
    }

    #[inline]
    pub(crate) unsafe fn try_take_heap(p: *mut ffi::roaring_bitmap_t) -> Option<Self> {
        NonNull::new(p).map(|bitmap| Bitmap {
            bitmap,
            stamp: next_stamp(),
        })
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const ffi::roaring_bitmap_t {
        self.bitmap.as_ptr()
    }

    /// Pointer for a mutating engine call. Invalidates every cursor taken
    /// on this bitmap so far.
    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::roaring_bitmap_t {
        self.stamp = next_stamp();
        self.bitmap.as_ptr()
    }

    /// Changes whenever the bitmap may have been modified.
    #[inline]
    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }
}

mod imp;
mod ops;

pub use self::ops::{add_offset, and, andnot, flip_range, jaccard_index, or, xor, NullableBitmap};
