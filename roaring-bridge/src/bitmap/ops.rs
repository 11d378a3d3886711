use std::fmt;
use std::iter::FromIterator;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Sub, SubAssign};

use crate::range::NormalizedRange;
use crate::serialization::Serializer;

use super::Bitmap;

impl Bitmap {
    /// Computes the intersection between two bitmaps and returns the result
    /// as a new bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap1 = Bitmap::of(&[1]);
    /// let bitmap2 = Bitmap::of(&[1, 2]);
    ///
    /// let bitmap3 = bitmap1.and(&bitmap2);
    ///
    /// assert!(bitmap3.contains(1));
    /// assert!(!bitmap3.contains(2));
    /// ```
    #[inline]
    pub fn and(&self, other: &Self) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_and(self.as_ptr(), other.as_ptr())) }
    }

    /// Computes the intersection between two bitmaps and stores the result
    /// in the current bitmap
    #[inline]
    pub fn and_inplace(&mut self, other: &Self) {
        unsafe { ffi::roaring_bitmap_and_inplace(self.as_mut_ptr(), other.as_ptr()) }
    }

    /// Computes the union between two bitmaps and returns the result
    /// as a new bitmap
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap1 = Bitmap::of(&[15]);
    /// let bitmap2 = Bitmap::of(&[25]);
    ///
    /// let bitmap3 = bitmap1.or(&bitmap2);
    ///
    /// assert_eq!(bitmap3.cardinality(), 2);
    /// assert!(bitmap3.contains(15));
    /// assert!(bitmap3.contains(25));
    /// ```
    #[inline]
    pub fn or(&self, other: &Self) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_or(self.as_ptr(), other.as_ptr())) }
    }

    #[inline]
    pub fn or_inplace(&mut self, other: &Self) {
        unsafe { ffi::roaring_bitmap_or_inplace(self.as_mut_ptr(), other.as_ptr()) }
    }

    /// Computes the symmetric difference (xor) between two bitmaps
    /// and returns a new bitmap.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap1 = Bitmap::of(&[15, 25]);
    /// let bitmap2 = Bitmap::of(&[25, 35]);
    ///
    /// assert_eq!(bitmap1.xor(&bitmap2).to_vec(), [15, 35]);
    /// ```
    #[inline]
    pub fn xor(&self, other: &Self) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_xor(self.as_ptr(), other.as_ptr())) }
    }

    #[inline]
    pub fn xor_inplace(&mut self, other: &Self) {
        unsafe { ffi::roaring_bitmap_xor_inplace(self.as_mut_ptr(), other.as_ptr()) }
    }

    /// Computes the difference between two bitmaps and returns the result.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap1 = Bitmap::of(&[15, 25]);
    /// let bitmap2 = Bitmap::of(&[25, 35]);
    ///
    /// assert_eq!(bitmap1.andnot(&bitmap2).to_vec(), [15]);
    /// assert_eq!(bitmap2.andnot(&bitmap1).to_vec(), [35]);
    /// ```
    #[inline]
    pub fn andnot(&self, other: &Self) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_andnot(self.as_ptr(), other.as_ptr())) }
    }

    #[inline]
    pub fn andnot_inplace(&mut self, other: &Self) {
        unsafe { ffi::roaring_bitmap_andnot_inplace(self.as_mut_ptr(), other.as_ptr()) }
    }

    #[inline]
    pub fn and_cardinality(&self, other: &Self) -> u64 {
        unsafe { ffi::roaring_bitmap_and_cardinality(self.as_ptr(), other.as_ptr()) }
    }

    #[inline]
    pub fn or_cardinality(&self, other: &Self) -> u64 {
        unsafe { ffi::roaring_bitmap_or_cardinality(self.as_ptr(), other.as_ptr()) }
    }

    #[inline]
    pub fn xor_cardinality(&self, other: &Self) -> u64 {
        unsafe { ffi::roaring_bitmap_xor_cardinality(self.as_ptr(), other.as_ptr()) }
    }

    #[inline]
    pub fn andnot_cardinality(&self, other: &Self) -> u64 {
        unsafe { ffi::roaring_bitmap_andnot_cardinality(self.as_ptr(), other.as_ptr()) }
    }

    /// Returns true if the two bitmaps share at least one element
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        unsafe { ffi::roaring_bitmap_intersect(self.as_ptr(), other.as_ptr()) }
    }

    /// Return true if all the elements of Self are in &other.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap1: Bitmap = (5..10).collect();
    /// let bitmap2: Bitmap = (5..8).collect();
    ///
    /// assert!(bitmap2.is_subset(&bitmap1));
    /// assert!(bitmap1.is_subset(&bitmap1));
    /// assert!(!bitmap1.is_strict_subset(&bitmap1));
    /// ```
    #[inline]
    pub fn is_subset(&self, other: &Self) -> bool {
        unsafe { ffi::roaring_bitmap_is_subset(self.as_ptr(), other.as_ptr()) }
    }

    #[inline]
    pub fn is_strict_subset(&self, other: &Self) -> bool {
        unsafe { ffi::roaring_bitmap_is_strict_subset(self.as_ptr(), other.as_ptr()) }
    }

    /// Computes the Jaccard index between two bitmaps.
    ///
    /// Two empty bitmaps have an undefined similarity: the result is NaN.
    #[inline]
    pub fn jaccard_index(&self, other: &Self) -> f64 {
        jaccard_index(Some(self), Some(other))
    }
}

/// Intersection of two possibly missing bitmaps.
///
/// A missing operand is the empty set, so the result is missing too.
pub fn and(lhs: Option<&Bitmap>, rhs: Option<&Bitmap>) -> Option<Bitmap> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(lhs.and(rhs)),
        _ => None,
    }
}

/// Union of two possibly missing bitmaps. With one operand missing, the
/// result is a copy of the other.
pub fn or(lhs: Option<&Bitmap>, rhs: Option<&Bitmap>) -> Option<Bitmap> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(lhs.or(rhs)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

/// Symmetric difference of two possibly missing bitmaps. With one operand
/// missing, the result is a copy of the other.
pub fn xor(lhs: Option<&Bitmap>, rhs: Option<&Bitmap>) -> Option<Bitmap> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(lhs.xor(rhs)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

/// Difference of two possibly missing bitmaps: missing when `lhs` is
/// missing, a copy of `lhs` when `rhs` is.
pub fn andnot(lhs: Option<&Bitmap>, rhs: Option<&Bitmap>) -> Option<Bitmap> {
    let lhs = lhs?;
    Some(match rhs {
        Some(rhs) => lhs.andnot(rhs),
        None => lhs.clone(),
    })
}

/// `|A ∩ B| / (|A| + |B| - |A ∩ B|)`, with missing bitmaps read as empty.
///
/// # Examples
///
/// ```
/// use roaring_bridge::{bitmap, Bitmap};
///
/// let a = Bitmap::of(&[1, 2, 3, 4]);
/// let b = Bitmap::of(&[3, 4, 5, 6]);
///
/// assert_eq!(bitmap::jaccard_index(Some(&a), Some(&b)), 2.0 / 6.0);
/// assert_eq!(bitmap::jaccard_index(Some(&a), None), 0.0);
/// assert!(bitmap::jaccard_index(None, None).is_nan());
/// ```
pub fn jaccard_index(lhs: Option<&Bitmap>, rhs: Option<&Bitmap>) -> f64 {
    let c1 = lhs.map_or(0, Bitmap::cardinality);
    let c2 = rhs.map_or(0, Bitmap::cardinality);
    let intersection = match (lhs, rhs) {
        (Some(lhs), Some(rhs)) if c1 != 0 && c2 != 0 => lhs.and_cardinality(rhs),
        _ => 0,
    };
    intersection as f64 / (c1 + c2 - intersection) as f64
}

/// Shifted copy of a possibly missing bitmap. See [`Bitmap::add_offset`].
pub fn add_offset(bitmap: Option<&Bitmap>, offset: f64) -> Option<Bitmap> {
    bitmap.map(|bitmap| bitmap.add_offset(offset))
}

/// Copy of a possibly missing bitmap with `[minimum, maximum)` negated.
///
/// Flipping a range of the empty set yields the range itself.
///
/// # Examples
///
/// ```
/// use roaring_bridge::bitmap;
///
/// let flipped = bitmap::flip_range(None, 2.0, 5.0).unwrap();
/// assert_eq!(flipped.to_vec(), [2, 3, 4]);
/// assert!(bitmap::flip_range(None, 5.0, 2.0).is_none());
/// ```
pub fn flip_range(bitmap: Option<&Bitmap>, minimum: f64, maximum: f64) -> Option<Bitmap> {
    match bitmap {
        Some(bitmap) => bitmap.flip_range(minimum, maximum),
        None => Bitmap::from_range(minimum, maximum, 1.0),
    }
}

/// Read access to a bitmap that may be missing.
///
/// A missing bitmap answers every query as the empty set would.
pub trait NullableBitmap {
    fn cardinality(&self) -> u64;
    fn is_empty(&self) -> bool;
    fn has(&self, value: f64) -> bool;
    fn select(&self, rank: f64) -> Option<u32>;
    fn index_of(&self, value: f64) -> Option<u64>;
    fn at(&self, index: f64) -> Option<u32>;
    fn contains_range(&self, minimum: f64, maximum: f64) -> bool;
    fn range_cardinality(&self, minimum: f64, maximum: f64) -> u64;
    fn intersects_range(&self, minimum: f64, maximum: f64) -> bool;
    fn slice_to_vec(&self, start: f64, end: f64) -> Vec<u32>;
    fn to_vec(&self) -> Vec<u32>;
    fn serialize<S: Serializer>(&self) -> Vec<u8>;
}

impl NullableBitmap for Option<&Bitmap> {
    fn cardinality(&self) -> u64 {
        self.map_or(0, Bitmap::cardinality)
    }

    fn is_empty(&self) -> bool {
        self.map_or(true, Bitmap::is_empty)
    }

    fn has(&self, value: f64) -> bool {
        self.map_or(false, |bitmap| bitmap.has(value))
    }

    fn select(&self, rank: f64) -> Option<u32> {
        self.and_then(|bitmap| bitmap.select(rank))
    }

    fn index_of(&self, value: f64) -> Option<u64> {
        self.and_then(|bitmap| bitmap.index_of(value))
    }

    fn at(&self, index: f64) -> Option<u32> {
        self.and_then(|bitmap| bitmap.at(index))
    }

    fn contains_range(&self, minimum: f64, maximum: f64) -> bool {
        self.map_or(false, |bitmap| bitmap.contains_range(minimum, maximum))
    }

    fn range_cardinality(&self, minimum: f64, maximum: f64) -> u64 {
        self.map_or(0, |bitmap| bitmap.range_cardinality(minimum, maximum))
    }

    fn intersects_range(&self, minimum: f64, maximum: f64) -> bool {
        self.map_or(false, |bitmap| bitmap.intersects_range(minimum, maximum))
    }

    fn slice_to_vec(&self, start: f64, end: f64) -> Vec<u32> {
        self.map_or_else(Vec::new, |bitmap| bitmap.slice_to_vec(start, end))
    }

    fn to_vec(&self) -> Vec<u32> {
        self.map_or_else(Vec::new, Bitmap::to_vec)
    }

    fn serialize<S: Serializer>(&self) -> Vec<u8> {
        match self {
            Some(bitmap) => bitmap.serialize::<S>(),
            None => Bitmap::create().serialize::<S>(),
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.minimum(), self.maximum()) {
            (Some(minimum), Some(maximum)) if self.cardinality() >= 32 => write!(
                f,
                "Bitmap<{:?} values between {:?} and {:?}>",
                self.cardinality(),
                minimum,
                maximum
            ),
            _ => write!(f, "Bitmap<{:?}>", self.to_vec()),
        }
    }
}

impl PartialEq for Bitmap {
    #[inline]
    fn eq(&self, other: &Bitmap) -> bool {
        unsafe { ffi::roaring_bitmap_equals(self.as_ptr(), other.as_ptr()) }
    }
}

impl Eq for Bitmap {}

impl Clone for Bitmap {
    /// Create a copy of a Bitmap
    ///
    /// The copy is a distinct handle: iterators created on the original
    /// re-synchronize when pointed at the copy.
    #[inline]
    fn clone(&self) -> Bitmap {
        unsafe { Self::take_heap(ffi::roaring_bitmap_copy(self.as_ptr())) }
    }
}

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe { ffi::roaring_bitmap_free(self.bitmap.as_ptr()) }
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::create()
    }
}

impl FromIterator<u32> for Bitmap {
    /// Convenience method for creating bitmap from iterator.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap: Bitmap = (1..3).collect();
    ///
    /// assert!(!bitmap.is_empty());
    /// assert!(bitmap.contains(1));
    /// assert!(bitmap.contains(2));
    /// assert_eq!(bitmap.cardinality(), 2);
    /// ```
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let elements: Vec<u32> = iter.into_iter().collect();
        Bitmap::of(&elements)
    }
}

impl Extend<u32> for Bitmap {
    fn extend<T: IntoIterator<Item = u32>>(&mut self, iter: T) {
        let elements: Vec<u32> = iter.into_iter().collect();
        self.add_many(&elements);
    }
}

impl<'a, 'b> BitAnd<&'a Bitmap> for &'b Bitmap {
    type Output = Bitmap;

    /// Syntactic sugar for `.and`
    #[inline]
    fn bitand(self, other: &'a Bitmap) -> Bitmap {
        self.and(other)
    }
}

impl<'a> BitAndAssign<&'a Bitmap> for Bitmap {
    #[inline]
    fn bitand_assign(&mut self, other: &'a Bitmap) {
        self.and_inplace(other)
    }
}

impl<'a, 'b> BitOr<&'a Bitmap> for &'b Bitmap {
    type Output = Bitmap;

    /// Syntactic sugar for `.or`
    #[inline]
    fn bitor(self, other: &'a Bitmap) -> Bitmap {
        self.or(other)
    }
}

impl<'a> BitOrAssign<&'a Bitmap> for Bitmap {
    #[inline]
    fn bitor_assign(&mut self, other: &'a Bitmap) {
        self.or_inplace(other)
    }
}

impl<'a, 'b> BitXor<&'a Bitmap> for &'b Bitmap {
    type Output = Bitmap;

    /// Syntactic sugar for `.xor`
    #[inline]
    fn bitxor(self, other: &'a Bitmap) -> Bitmap {
        self.xor(other)
    }
}

impl<'a> BitXorAssign<&'a Bitmap> for Bitmap {
    #[inline]
    fn bitxor_assign(&mut self, other: &'a Bitmap) {
        self.xor_inplace(other)
    }
}

impl<'a, 'b> Sub<&'a Bitmap> for &'b Bitmap {
    type Output = Bitmap;

    /// Syntactic sugar for `.andnot`
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::Bitmap;
    ///
    /// let bitmap1 = Bitmap::of(&[15, 25]);
    /// let bitmap2 = Bitmap::of(&[25, 35]);
    ///
    /// assert_eq!((&bitmap1 - &bitmap2).to_vec(), [15]);
    /// ```
    #[inline]
    fn sub(self, other: &'a Bitmap) -> Bitmap {
        self.andnot(other)
    }
}

impl<'a> SubAssign<&'a Bitmap> for Bitmap {
    #[inline]
    fn sub_assign(&mut self, other: &'a Bitmap) {
        self.andnot_inplace(other)
    }
}

impl From<NormalizedRange> for Bitmap {
    fn from(range: NormalizedRange) -> Self {
        unsafe { Self::take_heap(ffi::roaring_bitmap_from_range(range.start(), range.end(), 1)) }
    }
}
