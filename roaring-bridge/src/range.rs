//! Normalization of host-supplied doubles into exact engine parameters.
//!
//! Every bound, rank, offset and count enters the bridge as an `f64`. The
//! functions here are the only place where those doubles are turned into
//! integers, so the NaN / negative / overflow / empty-interval policy is
//! applied identically by every operation.

use std::ops::Range;

/// One past the largest element, `2^32`.
pub const DOMAIN_END: u64 = 1 << 32;

/// The largest integer a double represents exactly, `2^53 - 1`.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const DOMAIN_END_F64: f64 = DOMAIN_END as f64;
const MAX_ELEMENT_F64: f64 = u32::MAX as f64;

/// A validated, non-empty, half-open interval `[start, end)` of elements.
///
/// `start < end <= 2^32` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NormalizedRange {
    start: u64,
    end: u64,
}

impl NormalizedRange {
    /// Normalizes `[minimum, maximum)`.
    ///
    /// Returns `None` when either bound is NaN, when `maximum <= 0`, when the
    /// rounded minimum is past the last element, or when the interval is
    /// empty after clamping. A negative minimum is clamped to zero and both
    /// bounds are rounded up.
    ///
    /// # Examples
    ///
    /// ```
    /// use roaring_bridge::NormalizedRange;
    ///
    /// let range = NormalizedRange::new(-3.0, 10.5).unwrap();
    /// assert_eq!(range.as_range(), 0..11);
    ///
    /// let range = NormalizedRange::new(1.2, f64::INFINITY).unwrap();
    /// assert_eq!(range.as_range(), 2..(1 << 32));
    ///
    /// assert_eq!(NormalizedRange::new(f64::NAN, 10.0), None);
    /// assert_eq!(NormalizedRange::new(0.0, 0.0), None);
    /// assert_eq!(NormalizedRange::new(5.0, 5.0), None);
    /// assert_eq!(NormalizedRange::new(4294967296.0, f64::INFINITY), None);
    /// ```
    pub fn new(minimum: f64, maximum: f64) -> Option<Self> {
        if minimum.is_nan() || maximum.is_nan() || maximum <= 0.0 {
            return None;
        }
        let minimum = minimum.max(0.0).ceil();
        let maximum = maximum.ceil().min(DOMAIN_END_F64);
        if minimum > MAX_ELEMENT_F64 || minimum >= maximum {
            return None;
        }
        Some(Self {
            start: minimum as u64,
            end: maximum as u64,
        })
    }

    /// First element of the interval.
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// One past the last element of the interval, at most `2^32`.
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// First element, as an element.
    #[inline]
    pub fn first(&self) -> u32 {
        self.start as u32
    }

    /// Last element contained in the interval.
    #[inline]
    pub fn last(&self) -> u32 {
        (self.end - 1) as u32
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Always `false`: a normalized range holds at least one element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn as_range(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Clamps a positional offset to `[-2^32, 2^32]`. NaN is treated as zero.
///
/// # Examples
///
/// ```
/// use roaring_bridge::range::normalize_offset;
///
/// assert_eq!(normalize_offset(1e20), 1 << 32);
/// assert_eq!(normalize_offset(-1e20), -(1 << 32));
/// assert_eq!(normalize_offset(f64::NAN), 0);
/// assert_eq!(normalize_offset(-7.9), -7);
/// ```
pub fn normalize_offset(offset: f64) -> i64 {
    if offset.is_nan() {
        return 0;
    }
    offset.clamp(-DOMAIN_END_F64, DOMAIN_END_F64) as i64
}

/// Step for `from_range`: NaN or anything below one becomes one, anything
/// above `2^32 - 1` is clamped to it. Fractions are truncated.
pub fn normalize_step(step: f64) -> u32 {
    if step.is_nan() || step < 1.0 {
        1
    } else if step > MAX_ELEMENT_F64 {
        u32::MAX
    } else {
        step as u32
    }
}

/// An element given as a double. Only exact integers in `[0, 2^32 - 1]` map
/// to an element.
pub fn normalize_value(value: f64) -> Option<u32> {
    if value.is_nan() || value < 0.0 || value > MAX_ELEMENT_F64 {
        return None;
    }
    let element = value as u32;
    (f64::from(element) == value).then_some(element)
}

/// A rank or value lookup key: NaN and anything outside `(-1, 2^32)` is
/// rejected, the rest is truncated toward zero.
pub fn normalize_rank(rank: f64) -> Option<u32> {
    if rank.is_nan() || rank <= -1.0 || rank >= DOMAIN_END_F64 {
        return None;
    }
    Some(rank as u32)
}

/// Lower bound for seeks. NaN and negatives mean "from the start"; a bound
/// past the last element can never be satisfied and yields `None`.
pub fn normalize_minimum(minimum: f64) -> Option<u32> {
    let minimum = minimum.ceil();
    if minimum.is_nan() || minimum < 0.0 {
        Some(0)
    } else if minimum > MAX_ELEMENT_F64 {
        None
    } else {
        Some(minimum as u32)
    }
}

/// Target of an explicit seek. Unlike [`normalize_minimum`], a non-finite
/// target is rejected, as is one past the last element; negatives still
/// seek from the start.
pub fn normalize_seek(minimum: f64) -> Option<u32> {
    if !minimum.is_finite() {
        return None;
    }
    normalize_minimum(minimum)
}

/// Resolves a slice bound against a sequence of `len` elements: fractions
/// truncate, negatives count from the end, and the result is clamped to
/// `[0, len]`. NaN resolves to zero.
pub fn normalize_slice_index(index: f64, len: u64) -> u64 {
    if index.is_nan() {
        return 0;
    }
    let index = index.trunc();
    let len_f64 = len as f64;
    if index < 0.0 {
        (index + len_f64).max(0.0) as u64
    } else {
        index.min(len_f64) as u64
    }
}

/// Element budget for a bulk read. NaN and anything below one is rejected;
/// the budget never exceeds [`MAX_SAFE_INTEGER`].
pub fn normalize_count(count: f64) -> Option<u64> {
    if count.is_nan() || count < 1.0 {
        return None;
    }
    Some(count.min(MAX_SAFE_INTEGER) as u64)
}
