use std::ffi::CStr;
use std::mem;
use std::ptr;

use crate::iter::Cursor;
use crate::range::{self, NormalizedRange};
use crate::serialization::{Deserializer, Serializer};
use crate::Result;

use super::{Bitmap, Statistics};

/// Upper bound on `run_optimize` + `shrink_to_fit` passes in [`Bitmap::optimize`].
const OPTIMIZE_ROUNDS: usize = 4;

impl Bitmap {
    /// Creates a new bitmap (initially empty)
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::create();
    ///
    /// assert!(bitmap.is_empty());
    /// ```
    #[inline]
    pub fn create() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new bitmap (initially empty) with a provided
    /// container-storage capacity (it is a performance hint).
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::with_capacity(100_000);
    ///
    /// assert!(bitmap.is_empty());
    /// ```
    #[inline]
    pub fn with_capacity(capacity: u32) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_create_with_capacity(capacity)) }
    }

    /// Creates a new bitmap from a slice of u32 integers
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let elements = vec![1, 2];
    ///
    /// let bitmap = Bitmap::of(&elements);
    ///
    /// let mut bitmap2 = Bitmap::create();
    ///
    /// for element in &elements {
    ///     bitmap2.add(*element);
    /// }
    ///
    /// assert!(bitmap.contains(1));
    /// assert!(bitmap.contains(2));
    /// assert!(!bitmap.contains(3));
    /// assert_eq!(bitmap, bitmap2);
    /// ```
    #[inline]
    pub fn of(elements: &[u32]) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_of_ptr(elements.len(), elements.as_ptr())) }
    }

    /// Like [`Bitmap::of`], but reports an allocation failure instead of aborting.
    pub(crate) fn try_of(elements: &[u32]) -> Option<Self> {
        unsafe { Self::try_take_heap(ffi::roaring_bitmap_of_ptr(elements.len(), elements.as_ptr())) }
    }

    /// Creates a bitmap holding every `step`-th element of `[minimum, maximum)`.
    ///
    /// The bounds go through [`NormalizedRange::new`]; a NaN or sub-one step
    /// becomes one. Returns `None` for an invalid or empty range.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::from_range(0.0, 10.0, 2.0).unwrap();
    /// assert_eq!(bitmap.to_vec(), [0, 2, 4, 6, 8]);
    ///
    /// let bitmap = Bitmap::from_range(-5.0, 3.0, f64::NAN).unwrap();
    /// assert_eq!(bitmap.to_vec(), [0, 1, 2]);
    ///
    /// assert!(Bitmap::from_range(10.0, 10.0, 1.0).is_none());
    /// ```
    pub fn from_range(minimum: f64, maximum: f64, step: f64) -> Option<Self> {
        let range = NormalizedRange::new(minimum, maximum)?;
        let step = range::normalize_step(step);
        Some(unsafe { Self::take_heap(ffi::roaring_bitmap_from_range(range.start(), range.end(), step)) })
    }

    /// Add the integer element to the bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// assert!(bitmap.is_empty());
    /// bitmap.add(1);
    /// assert!(!bitmap.is_empty());
    /// ```
    #[inline]
    pub fn add(&mut self, element: u32) {
        unsafe { ffi::roaring_bitmap_add(self.as_mut_ptr(), element) }
    }

    /// Add the integer element to the bitmap. Returns true if the value was
    /// added, false if the value was already in the bitmap.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// assert!(bitmap.add_checked(1));
    /// assert!(!bitmap.add_checked(1));
    /// ```
    #[inline]
    pub fn add_checked(&mut self, element: u32) -> bool {
        unsafe { ffi::roaring_bitmap_add_checked(self.as_mut_ptr(), element) }
    }

    /// Add many integer elements to the bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// bitmap.add_many(&[1, 2, 3]);
    ///
    /// assert!(!bitmap.is_empty());
    /// assert!(bitmap.contains(1));
    /// assert!(bitmap.contains(2));
    /// assert!(bitmap.contains(3));
    /// ```
    #[inline]
    pub fn add_many(&mut self, elements: &[u32]) {
        unsafe { ffi::roaring_bitmap_add_many(self.as_mut_ptr(), elements.len(), elements.as_ptr()) }
    }

    /// Remove the integer element from the bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// bitmap.add(1);
    /// bitmap.remove(1);
    ///
    /// assert!(bitmap.is_empty());
    /// ```
    #[inline]
    pub fn remove(&mut self, element: u32) {
        unsafe { ffi::roaring_bitmap_remove(self.as_mut_ptr(), element) }
    }

    /// Remove the integer element from the bitmap. Returns true if the value
    /// was removed, false if the value was not in the bitmap.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// bitmap.add(1);
    /// assert!(bitmap.remove_checked(1));
    /// assert!(!bitmap.remove_checked(1));
    /// ```
    #[inline]
    pub fn remove_checked(&mut self, element: u32) -> bool {
        unsafe { ffi::roaring_bitmap_remove_checked(self.as_mut_ptr(), element) }
    }

    /// Remove many integer elements in a single engine call
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::of(&[1, 2, 3, 4]);
    /// bitmap.remove_many(&[4, 2, 9]);
    ///
    /// assert_eq!(bitmap.to_vec(), [1, 3]);
    /// ```
    #[inline]
    pub fn remove_many(&mut self, elements: &[u32]) {
        unsafe { ffi::roaring_bitmap_remove_many(self.as_mut_ptr(), elements.len(), elements.as_ptr()) }
    }

    /// Empties the bitmap
    #[inline]
    pub fn clear(&mut self) {
        unsafe { ffi::roaring_bitmap_clear(self.as_mut_ptr()) }
    }

    /// Returns true if the integer element is contained in the bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// bitmap.add(1);
    ///
    /// assert!(bitmap.contains(1));
    /// assert!(!bitmap.contains(2));
    /// ```
    #[inline]
    pub fn contains(&self, element: u32) -> bool {
        unsafe { ffi::roaring_bitmap_contains(self.as_ptr(), element) }
    }

    /// Membership test for a value given as a double.
    ///
    /// Only exact integers in `[0, 2^32 - 1]` can be members.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[1, u32::MAX]);
    ///
    /// assert!(bitmap.has(1.0));
    /// assert!(bitmap.has(4294967295.0));
    /// assert!(!bitmap.has(1.5));
    /// assert!(!bitmap.has(-1.0));
    /// assert!(!bitmap.has(f64::NAN));
    /// ```
    #[inline]
    pub fn has(&self, value: f64) -> bool {
        range::normalize_value(value).map_or(false, |element| self.contains(element))
    }

    /// Returns the number of integers contained in the bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// bitmap.add(1);
    ///
    /// assert_eq!(bitmap.cardinality(), 1);
    ///
    /// bitmap.add(2);
    ///
    /// assert_eq!(bitmap.cardinality(), 2);
    /// ```
    #[inline]
    pub fn cardinality(&self) -> u64 {
        unsafe { ffi::roaring_bitmap_get_cardinality(self.as_ptr()) }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        unsafe { ffi::roaring_bitmap_is_empty(self.as_ptr()) }
    }

    /// Returns the smallest value in the set, or `None` if the set is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap: Bitmap = (5..10).collect();
    /// assert_eq!(bitmap.minimum(), Some(5));
    /// assert_eq!(Bitmap::create().minimum(), None);
    /// ```
    #[inline]
    pub fn minimum(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(unsafe { ffi::roaring_bitmap_minimum(self.as_ptr()) })
        }
    }

    /// Returns the greatest value in the set, or `None` if the set is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap: Bitmap = (5..10).collect();
    /// assert_eq!(bitmap.maximum(), Some(9));
    ///
    /// bitmap.add(15);
    /// assert_eq!(bitmap.maximum(), Some(15));
    /// ```
    #[inline]
    pub fn maximum(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(unsafe { ffi::roaring_bitmap_maximum(self.as_ptr()) })
        }
    }

    /// Rank returns the number of values smaller or equal to x.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap: Bitmap = (5..10).collect();
    ///
    /// assert_eq!(bitmap.rank(8), 4);
    ///
    /// bitmap.add(15);
    ///
    /// assert_eq!(bitmap.rank(11), 5);
    /// assert_eq!(bitmap.rank(15), 6);
    /// ```
    #[inline]
    pub fn rank(&self, x: u32) -> u64 {
        unsafe { ffi::roaring_bitmap_rank(self.as_ptr(), x) }
    }

    /// Returns the element of the given zero-based rank.
    ///
    /// `None` stands in for "not a number": the rank is NaN, outside
    /// `(-1, 2^32)`, or not smaller than the cardinality. Fractional ranks
    /// are truncated.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap: Bitmap = (5..10).collect();
    ///
    /// assert_eq!(bitmap.select(0.0), Some(5));
    /// assert_eq!(bitmap.select(4.0), Some(9));
    /// assert_eq!(bitmap.select(4.9), Some(9));
    /// assert_eq!(bitmap.select(5.0), None);
    /// assert_eq!(bitmap.select(-1.0), None);
    /// assert_eq!(bitmap.select(f64::NAN), None);
    /// ```
    #[inline]
    pub fn select(&self, rank: f64) -> Option<u32> {
        let rank = range::normalize_rank(rank)?;
        let mut element: u32 = 0;
        let found = unsafe { ffi::roaring_bitmap_select(self.as_ptr(), rank, &mut element) };
        found.then_some(element)
    }

    /// Returns the zero-based position of `value` in the sorted set, or
    /// `None` when it is not a member.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[10, 20, 30]);
    ///
    /// assert_eq!(bitmap.index_of(20.0), Some(1));
    /// assert_eq!(bitmap.index_of(25.0), None);
    /// assert_eq!(bitmap.index_of(-3.0), None);
    /// ```
    #[inline]
    pub fn index_of(&self, value: f64) -> Option<u64> {
        let value = range::normalize_rank(value)?;
        let index = unsafe { ffi::roaring_bitmap_get_index(self.as_ptr(), value) };
        u64::try_from(index).ok()
    }

    /// Returns the element at a signed position; negative indices count
    /// from the end.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[10, 20, 30]);
    ///
    /// assert_eq!(bitmap.at(0.0), Some(10));
    /// assert_eq!(bitmap.at(-1.0), Some(30));
    /// assert_eq!(bitmap.at(-3.0), Some(10));
    /// assert_eq!(bitmap.at(-4.0), None);
    /// assert_eq!(bitmap.at(3.0), None);
    /// assert_eq!(bitmap.at(1.7), Some(20));
    /// ```
    pub fn at(&self, index: f64) -> Option<u32> {
        if index.is_nan() {
            return None;
        }
        let mut index = index.trunc();
        if index < 0.0 {
            index += self.cardinality() as f64;
            if index < 0.0 {
                return None;
            }
        }
        if index > f64::from(u32::MAX) {
            return None;
        }
        let mut element: u32 = 0;
        let found = unsafe { ffi::roaring_bitmap_select(self.as_ptr(), index as u32, &mut element) };
        found.then_some(element)
    }

    /// Returns true if every element of `[minimum, maximum)` is in the bitmap.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::from_range(10.0, 20.0, 1.0).unwrap();
    ///
    /// assert!(bitmap.contains_range(10.0, 20.0));
    /// assert!(bitmap.contains_range(9.5, 19.2));
    /// assert!(!bitmap.contains_range(10.0, 21.0));
    /// assert!(!bitmap.contains_range(15.0, 15.0));
    /// ```
    pub fn contains_range(&self, minimum: f64, maximum: f64) -> bool {
        NormalizedRange::new(minimum, maximum).map_or(false, |range| unsafe {
            ffi::roaring_bitmap_contains_range(self.as_ptr(), range.start(), range.end())
        })
    }

    /// Number of elements of the bitmap inside `[minimum, maximum)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[1, 5, 10, u32::MAX]);
    ///
    /// assert_eq!(bitmap.range_cardinality(0.0, 10.0), 2);
    /// assert_eq!(bitmap.range_cardinality(0.0, f64::INFINITY), 4);
    /// assert_eq!(bitmap.range_cardinality(f64::NAN, 10.0), 0);
    /// ```
    pub fn range_cardinality(&self, minimum: f64, maximum: f64) -> u64 {
        NormalizedRange::new(minimum, maximum).map_or(0, |range| unsafe {
            ffi::roaring_bitmap_range_cardinality(self.as_ptr(), range.start(), range.end())
        })
    }

    /// Adds every element of `[minimum, maximum)`. Returns false, without
    /// touching the bitmap, when the range is invalid or empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// assert!(bitmap.add_range(1.0, 4.0));
    /// assert_eq!(bitmap.to_vec(), [1, 2, 3]);
    ///
    /// assert!(bitmap.add_range(4294967294.0, 1e30));
    /// assert_eq!(bitmap.maximum(), Some(u32::MAX));
    ///
    /// assert!(!bitmap.add_range(5.0, 5.0));
    /// assert_eq!(bitmap.cardinality(), 5);
    /// ```
    pub fn add_range(&mut self, minimum: f64, maximum: f64) -> bool {
        match NormalizedRange::new(minimum, maximum) {
            Some(range) => {
                unsafe { ffi::roaring_bitmap_add_range_closed(self.as_mut_ptr(), range.first(), range.last()) };
                true
            }
            None => false,
        }
    }

    /// Removes every element of `[minimum, maximum)`. Returns false, without
    /// touching the bitmap, when the range is invalid or empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::of(&[1, 2, 3, 4]);
    /// assert!(bitmap.remove_range(2.0, 4.0));
    /// assert_eq!(bitmap.to_vec(), [1, 4]);
    /// ```
    pub fn remove_range(&mut self, minimum: f64, maximum: f64) -> bool {
        match NormalizedRange::new(minimum, maximum) {
            Some(range) => {
                unsafe { ffi::roaring_bitmap_remove_range_closed(self.as_mut_ptr(), range.first(), range.last()) };
                true
            }
            None => false,
        }
    }

    /// Negates the elements of `[minimum, maximum)` in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::of(&[1, 3]);
    /// assert!(bitmap.flip_range_inplace(0.0, 4.0));
    /// assert_eq!(bitmap.to_vec(), [0, 2]);
    /// assert!(!bitmap.flip_range_inplace(f64::NAN, 4.0));
    /// ```
    pub fn flip_range_inplace(&mut self, minimum: f64, maximum: f64) -> bool {
        match NormalizedRange::new(minimum, maximum) {
            Some(range) => {
                unsafe { ffi::roaring_bitmap_flip_inplace(self.as_mut_ptr(), range.start(), range.end()) };
                true
            }
            None => false,
        }
    }

    /// Returns a copy of the bitmap with the elements of `[minimum, maximum)`
    /// negated, or `None` for an invalid or empty range.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[1, 3]);
    /// let flipped = bitmap.flip_range(0.0, 4.0).unwrap();
    ///
    /// assert_eq!(flipped.to_vec(), [0, 2]);
    /// assert_eq!(bitmap.to_vec(), [1, 3]);
    /// ```
    pub fn flip_range(&self, minimum: f64, maximum: f64) -> Option<Self> {
        let range = NormalizedRange::new(minimum, maximum)?;
        Some(unsafe { Self::take_heap(ffi::roaring_bitmap_flip(self.as_ptr(), range.start(), range.end())) })
    }

    /// Returns true if at least one element of `[minimum, maximum)` is in
    /// the bitmap.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[10, 20]);
    ///
    /// assert!(bitmap.intersects_range(0.0, 11.0));
    /// assert!(!bitmap.intersects_range(11.0, 20.0));
    /// assert!(bitmap.intersects_range(11.0, 20.5));
    /// ```
    pub fn intersects_range(&self, minimum: f64, maximum: f64) -> bool {
        NormalizedRange::new(minimum, maximum).map_or(false, |range| unsafe {
            ffi::roaring_bitmap_intersect_with_range(self.as_ptr(), range.start(), range.end())
        })
    }

    /// Returns a copy of the bitmap with every element shifted by `offset`.
    ///
    /// The offset is clamped to `[-2^32, 2^32]` and NaN means no shift.
    /// Elements shifted out of `[0, 2^32)` are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[0, 5, u32::MAX]);
    ///
    /// assert_eq!(bitmap.add_offset(10.0).to_vec(), [10, 15]);
    /// assert_eq!(bitmap.add_offset(-5.0).to_vec(), [0, u32::MAX - 5]);
    /// assert_eq!(bitmap.add_offset(f64::NAN), bitmap);
    /// assert!(bitmap.add_offset(1e20).is_empty());
    /// ```
    pub fn add_offset(&self, offset: f64) -> Self {
        let offset = range::normalize_offset(offset);
        if offset == 0 {
            return self.clone();
        }
        unsafe { Self::take_heap(ffi::roaring_bitmap_add_offset(self.as_ptr(), offset)) }
    }

    /// Materializes the elements inside `[minimum, maximum)`, at most `limit`
    /// of them, in ascending order.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::from_range(0.0, 100.0, 10.0).unwrap();
    ///
    /// assert_eq!(bitmap.range_to_vec(15.0, 55.0, f64::INFINITY), [20, 30, 40, 50]);
    /// assert_eq!(bitmap.range_to_vec(15.0, 55.0, 2.0), [20, 30]);
    /// assert!(bitmap.range_to_vec(15.0, 55.0, 0.0).is_empty());
    /// ```
    pub fn range_to_vec(&self, minimum: f64, maximum: f64, limit: f64) -> Vec<u32> {
        let mut result = Vec::new();
        let (Some(range), Some(limit)) = (NormalizedRange::new(minimum, maximum), range::normalize_count(limit)) else {
            return result;
        };
        let limit = limit.min(range.len());
        let mut cursor = Cursor::at_or_after(self, range.first());
        while let Some(value) = cursor.current() {
            if u64::from(value) >= range.end() || result.len() as u64 >= limit {
                break;
            }
            result.push(value);
            // SAFETY: `self` is borrowed for the whole loop, so the cursor
            // position is still valid.
            unsafe { cursor.advance() };
        }
        result
    }

    /// Materializes the elements at positions `[start, end)` in ascending
    /// order. Bounds behave like array slice bounds: fractions truncate,
    /// negatives count from the end and both are clamped to the cardinality.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::of(&[1, 2, 3, 4, 5]);
    ///
    /// assert_eq!(bitmap.slice_to_vec(1.0, 3.0), [2, 3]);
    /// assert_eq!(bitmap.slice_to_vec(-3.0, -1.0), [3, 4]);
    /// assert_eq!(bitmap.slice_to_vec(2.0, f64::INFINITY), [3, 4, 5]);
    /// assert!(bitmap.slice_to_vec(6.0, 10.0).is_empty());
    /// ```
    pub fn slice_to_vec(&self, start: f64, end: f64) -> Vec<u32> {
        let cardinality = self.cardinality();
        let start = range::normalize_slice_index(start, cardinality);
        let end = range::normalize_slice_index(end, cardinality);
        if start >= end {
            return Vec::new();
        }
        let (Ok(rank), Ok(len)) = (u32::try_from(start), usize::try_from(end - start)) else {
            return Vec::new();
        };
        let mut first: u32 = 0;
        if !unsafe { ffi::roaring_bitmap_select(self.as_ptr(), rank, &mut first) } {
            return Vec::new();
        }
        let mut cursor = Cursor::at_or_after(self, first);
        let mut result = vec![0; len];
        let mut written = 0;
        while written < len {
            // SAFETY: `self` is borrowed for the whole read, so the cursor is
            // still valid.
            let n = unsafe { cursor.next_many(&mut result[written..]) };
            if n == 0 {
                break;
            }
            written += n;
        }
        result.truncate(written);
        result
    }

    /// Convert the bitmap to an array of u32 integers
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::create();
    /// bitmap.add(15);
    /// bitmap.add(25);
    ///
    /// assert_eq!(bitmap.to_vec(), [15, 25]);
    /// ```
    pub fn to_vec(&self) -> Vec<u32> {
        let len = self.cardinality() as usize;
        let mut vec = Vec::with_capacity(len);
        unsafe {
            ffi::roaring_bitmap_to_uint32_array(self.as_ptr(), vec.as_mut_ptr());
            vec.set_len(len);
        }
        vec
    }

    /// Compresses runs and trims slack storage, repeating (a bounded number
    /// of times) while a round still changes something. Returns true if
    /// anything changed.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap = Bitmap::from_range(0.0, 10_000.0, 1.0).unwrap();
    /// bitmap.add(50_000);
    ///
    /// bitmap.optimize();
    /// assert!(!bitmap.optimize());
    /// ```
    pub fn optimize(&mut self) -> bool {
        let mut changed = false;
        for _ in 0..OPTIMIZE_ROUNDS {
            let before = self.container_layout();
            self.run_optimize();
            let freed = self.shrink_to_fit();
            let round_changed = freed > 0 || self.container_layout() != before;
            if !round_changed {
                break;
            }
            changed = true;
        }
        changed
    }

    /// Converts array and bitmap containers to run containers where that is
    /// more compact. Returns true if the result has at least one run
    /// container.
    #[inline]
    pub fn run_optimize(&mut self) -> bool {
        unsafe { ffi::roaring_bitmap_run_optimize(self.as_mut_ptr()) }
    }

    /// Releases unused container capacity, returning the number of bytes freed.
    #[inline]
    pub fn shrink_to_fit(&mut self) -> usize {
        unsafe { ffi::roaring_bitmap_shrink_to_fit(self.as_mut_ptr()) }
    }

    /// Returns statistics about the composition of a roaring bitmap.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let mut bitmap: Bitmap = (1..100).collect();
    /// let statistics = bitmap.statistics();
    ///
    /// assert_eq!(statistics.n_containers, 1);
    /// assert_eq!(statistics.n_array_containers, 1);
    /// assert_eq!(statistics.n_run_containers, 0);
    /// assert_eq!(statistics.cardinality, 99);
    ///
    /// bitmap.run_optimize();
    /// let statistics = bitmap.statistics();
    ///
    /// assert_eq!(statistics.n_array_containers, 0);
    /// assert_eq!(statistics.n_run_containers, 1);
    /// ```
    pub fn statistics(&self) -> Statistics {
        let mut statistics: Statistics = unsafe { mem::zeroed() };

        unsafe { ffi::roaring_bitmap_statistics(self.as_ptr(), &mut statistics) };

        statistics
    }

    /// Ensures the engine's internal invariants hold for this bitmap.
    ///
    /// Bitmaps built through this crate are always valid; decoded input is
    /// checked with this before it is handed out.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap = Bitmap::from_range(0.0, 100.0, 1.0).unwrap();
    /// bitmap.internal_validate().unwrap();
    /// ```
    #[doc(hidden)]
    pub fn internal_validate(&self) -> std::result::Result<(), &'static str> {
        let mut error_str = ptr::null();
        let valid = unsafe { ffi::roaring_bitmap_internal_validate(self.as_ptr(), &mut error_str) };
        if valid {
            Ok(())
        } else {
            if error_str.is_null() {
                return Err("Unknown error");
            }
            let reason = unsafe { CStr::from_ptr(error_str) };
            Err(reason.to_str().unwrap_or("Invalid UTF-8 in error message"))
        }
    }

    fn container_layout(&self) -> [u32; 4] {
        let statistics = self.statistics();
        [
            statistics.n_containers,
            statistics.n_array_containers,
            statistics.n_run_containers,
            statistics.n_bitset_containers,
        ]
    }

    /// Serializes the bitmap into a new buffer using format `S`.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, Native, Portable, Uint32Array};
    ///
    /// let bitmap = Bitmap::of(&[1, 2, 3]);
    ///
    /// let native = bitmap.serialize::<Native>();
    /// assert_eq!(native.len(), bitmap.get_serialized_size_in_bytes::<Native>());
    ///
    /// let portable = bitmap.serialize::<Portable>();
    /// assert_eq!(Bitmap::try_deserialize::<Portable>(&portable).unwrap(), bitmap);
    ///
    /// let array = bitmap.serialize::<Uint32Array>();
    /// assert_eq!(array, [1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
    /// ```
    pub fn serialize<S: Serializer>(&self) -> Vec<u8> {
        let mut dst = Vec::new();
        S::serialize_into(self, &mut dst);
        dst
    }

    /// Appends the serialized bitmap to `dst`, returning the appended bytes.
    pub fn serialize_into<'a, S: Serializer>(&self, dst: &'a mut Vec<u8>) -> &'a [u8] {
        S::serialize_into(self, dst)
    }

    #[inline]
    pub fn get_serialized_size_in_bytes<S: Serializer>(&self) -> usize {
        S::get_serialized_size_in_bytes(self)
    }

    /// Decodes a bitmap serialized with format `D`.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, Error, Native};
    ///
    /// let bitmap = Bitmap::of(&[7, 8, 9]);
    /// let data = bitmap.serialize::<Native>();
    ///
    /// assert_eq!(Bitmap::try_deserialize::<Native>(&data).unwrap(), bitmap);
    /// assert!(Bitmap::try_deserialize::<Native>(&[]).unwrap().is_empty());
    /// assert_eq!(Bitmap::try_deserialize::<Native>(&[9]), Err(Error::UnknownFormat(9)));
    /// ```
    pub fn try_deserialize<D: Deserializer>(data: &[u8]) -> Result<Self> {
        D::try_deserialize(data)
    }

    /// Replaces the contents of the bitmap with a decoded one. On error the
    /// bitmap is left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::{Bitmap, Native};
    ///
    /// let mut bitmap = Bitmap::of(&[1]);
    ///
    /// assert!(bitmap.deserialize_in_place::<Native>(&[1, 5, 0, 0, 0]).is_err());
    /// assert_eq!(bitmap.to_vec(), [1]);
    ///
    /// let data = Bitmap::of(&[2, 3]).serialize::<Native>();
    /// bitmap.deserialize_in_place::<Native>(&data).unwrap();
    /// assert_eq!(bitmap.to_vec(), [2, 3]);
    /// ```
    pub fn deserialize_in_place<D: Deserializer>(&mut self, data: &[u8]) -> Result<()> {
        let mut decoded = D::try_deserialize(data)?;
        mem::swap(self, &mut decoded);
        Ok(())
    }
}
