use libfuzzer_sys::arbitrary::{self, Arbitrary, Unstructured};
use roaring_bridge::{bitmap, Bitmap, BulkChannel, NormalizedRange, VersionedIterator};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Num(pub u32);

pub const MAX_NUM: u32 = 0x1_0000 * 4;

impl<'a> Arbitrary<'a> for Num {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self(u.int_in_range(0..=(MAX_NUM - 1))?))
    }
}

/// A host-supplied double: mostly near the element domain, sometimes hostile.
#[derive(Debug, Copy, Clone)]
pub struct Double(pub f64);

impl<'a> Arbitrary<'a> for Double {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let value = match u.int_in_range(0..=7u8)? {
            0 => f64::NAN,
            1 => f64::INFINITY,
            2 => f64::NEG_INFINITY,
            3 => f64::arbitrary(u)?,
            4 => 4294967296.0 - f64::from(u.int_in_range(0..=4u8)?),
            5 => f64::from(u.int_in_range(0..=MAX_NUM)?) + 0.5,
            _ => f64::from(u.int_in_range(-4..=MAX_NUM as i32)?),
        };
        Ok(Self(value))
    }
}

#[derive(Arbitrary, Debug)]
pub enum MutableBitmapOperation {
    Add(Num),
    AddChecked(Num),
    AddMany(Vec<Num>),
    AddRange(Double, Double),
    RemoveRange(Double, Double),
    Clear,
    Remove(Num),
    RemoveChecked(Num),
    FlipRangeInplace(Double, Double),
    ShrinkToFit,
    RunOptimize,
    Optimize,
    BulkAdd(Vec<Num>),
    BulkRemove(Vec<Num>),
}

#[derive(Arbitrary, Debug)]
pub enum ReadBitmapOp {
    ContainsRange(Double, Double),
    Has(Double),
    RangeCardinality(Double, Double),
    IntersectsRange(Double, Double),
    FlipRange(Double, Double),
    AddOffset(Double),
    Select(Double),
    At(Double),
    IndexOf(Double),
    RangeToVec(Double, Double, Double),
    SliceToVec(Double, Double),
    BulkRead(Double, Option<Double>, u8),
    Minimum,
    Maximum,
}

#[derive(Arbitrary, Debug)]
pub enum BitmapCompOperation {
    And,
    Or,
    Xor,
    AndNot,
    Jaccard,
    MissingLhs,
    MissingRhs,
}

#[derive(Arbitrary, Debug)]
pub enum IterOperation {
    Next,
    SeekMin(Double),
    Mutate(MutableBitmapOperation),
    MutateWithoutBump(MutableBitmapOperation),
}

impl MutableBitmapOperation {
    pub fn on_roaring(&self, b: &mut Bitmap, channel: &mut BulkChannel) {
        match *self {
            MutableBitmapOperation::Add(i) => b.add(i.0),
            MutableBitmapOperation::AddChecked(i) => {
                let expected = !b.contains(i.0);
                assert_eq!(expected, b.add_checked(i.0));
            }
            MutableBitmapOperation::AddMany(ref items) => {
                let items: Vec<u32> = items.iter().map(|i| i.0).collect();
                b.add_many(&items);
                assert!(items.iter().all(|&i| b.contains(i)));
            }
            MutableBitmapOperation::AddRange(min, max) => {
                let valid = NormalizedRange::new(min.0, max.0).is_some();
                assert_eq!(valid, b.add_range(min.0, max.0));
                assert_eq!(valid, b.contains_range(min.0, max.0));
            }
            MutableBitmapOperation::RemoveRange(min, max) => {
                b.remove_range(min.0, max.0);
                assert_eq!(b.range_cardinality(min.0, max.0), 0);
            }
            MutableBitmapOperation::Clear => b.clear(),
            MutableBitmapOperation::Remove(i) => {
                b.remove(i.0);
                assert!(!b.contains(i.0));
            }
            MutableBitmapOperation::RemoveChecked(i) => {
                let expected = b.contains(i.0);
                assert_eq!(expected, b.remove_checked(i.0));
            }
            MutableBitmapOperation::FlipRangeInplace(min, max) => {
                let before = b.clone();
                b.flip_range_inplace(min.0, max.0);
                let mut twice = b.clone();
                twice.flip_range_inplace(min.0, max.0);
                assert_eq!(twice, before);
            }
            MutableBitmapOperation::ShrinkToFit => {
                b.shrink_to_fit();
            }
            MutableBitmapOperation::RunOptimize => {
                b.run_optimize();
            }
            MutableBitmapOperation::Optimize => {
                let before = b.clone();
                b.optimize();
                assert!(!b.optimize());
                assert_eq!(*b, before);
            }
            MutableBitmapOperation::BulkAdd(ref items) => {
                let items: Vec<u32> = items.iter().take(channel.capacity()).map(|i| i.0).collect();
                let mut session = channel.begin_add(b);
                channel.buffer_mut()[..items.len()].copy_from_slice(&items);
                session.apply(channel, items.len()).unwrap();
                drop(session);
                assert!(items.iter().all(|&i| b.contains(i)));
            }
            MutableBitmapOperation::BulkRemove(ref items) => {
                let items: Vec<u32> = items.iter().take(channel.capacity()).map(|i| i.0).collect();
                let mut session = channel.begin_remove(b);
                channel.buffer_mut()[..items.len()].copy_from_slice(&items);
                session.apply(channel, items.len()).unwrap();
                drop(session);
                assert!(items.iter().all(|&i| !b.contains(i)));
            }
        }
    }
}

impl ReadBitmapOp {
    pub fn on_roaring(&self, b: &Bitmap, channel: &mut BulkChannel) {
        match *self {
            ReadBitmapOp::ContainsRange(min, max) => {
                let contained = b.contains_range(min.0, max.0);
                if let Some(range) = NormalizedRange::new(min.0, max.0) {
                    assert_eq!(contained, b.range_cardinality(min.0, max.0) == range.len());
                } else {
                    assert!(!contained);
                }
            }
            ReadBitmapOp::Has(value) => {
                let has = b.has(value.0);
                assert!(!has || value.0.fract() == 0.0);
            }
            ReadBitmapOp::RangeCardinality(min, max) => {
                assert!(b.range_cardinality(min.0, max.0) <= b.cardinality());
            }
            ReadBitmapOp::IntersectsRange(min, max) => {
                assert_eq!(b.intersects_range(min.0, max.0), b.range_cardinality(min.0, max.0) > 0);
            }
            ReadBitmapOp::FlipRange(min, max) => {
                let flipped = b.flip_range(min.0, max.0);
                assert_eq!(flipped.is_some(), NormalizedRange::new(min.0, max.0).is_some());
            }
            ReadBitmapOp::AddOffset(offset) => {
                let shifted = b.add_offset(offset.0);
                assert!(shifted.cardinality() <= b.cardinality());
            }
            ReadBitmapOp::Select(rank) => {
                if let Some(value) = b.select(rank.0) {
                    assert_eq!(b.index_of(f64::from(value)), Some(rank.0.max(0.0) as u64));
                }
            }
            ReadBitmapOp::At(index) => {
                if let Some(value) = b.at(index.0) {
                    assert!(b.contains(value));
                }
            }
            ReadBitmapOp::IndexOf(value) => {
                if let Some(index) = b.index_of(value.0) {
                    assert_eq!(b.select(index as f64).map(f64::from), Some(value.0.max(0.0).trunc()));
                }
            }
            ReadBitmapOp::SliceToVec(start, end) => {
                let values = b.slice_to_vec(start.0, end.0);
                assert!(values.windows(2).all(|w| w[0] < w[1]));
                assert!(values.len() as u64 <= b.cardinality());
                if let Some(&first) = values.first() {
                    assert_eq!(b.rank(first) - 1 + values.len() as u64, b.rank(*values.last().unwrap()));
                }
            }
            ReadBitmapOp::RangeToVec(min, max, limit) => {
                let values = b.range_to_vec(min.0, max.0, limit.0);
                assert!(values.windows(2).all(|w| w[0] < w[1]));
                assert!(values.len() as u64 <= b.range_cardinality(min.0, max.0));
            }
            ReadBitmapOp::BulkRead(max_count, minimum, chunk) => {
                let Some(mut session) = channel.begin_read(Some(b), max_count.0) else {
                    return;
                };
                let mut read = Vec::new();
                let mut n = match minimum {
                    Some(minimum) => session.drain_from(channel, minimum.0).unwrap(),
                    None => session.drain(channel).unwrap(),
                };
                while n > 0 {
                    read.extend_from_slice(&channel.buffer()[..n]);
                    if read.len() > usize::from(chunk) * channel.capacity() {
                        break;
                    }
                    n = session.drain(channel).unwrap();
                }
                assert!(read.windows(2).all(|w| w[0] < w[1]));
                assert!(read.iter().all(|&v| b.contains(v)));
            }
            ReadBitmapOp::Minimum => {
                assert_eq!(b.minimum(), b.select(0.0));
            }
            ReadBitmapOp::Maximum => {
                assert_eq!(b.maximum(), b.at(-1.0));
            }
        }
    }
}

impl BitmapCompOperation {
    pub fn on_roaring(&self, lhs: &mut Bitmap, rhs: &Bitmap) {
        match *self {
            BitmapCompOperation::And => {
                let expected = lhs.and_cardinality(rhs);
                lhs.and_inplace(rhs);
                assert_eq!(lhs.cardinality(), expected);
            }
            BitmapCompOperation::Or => {
                let expected = lhs.or(rhs);
                lhs.or_inplace(rhs);
                assert_eq!(*lhs, expected);
            }
            BitmapCompOperation::Xor => {
                let expected = lhs.xor_cardinality(rhs);
                lhs.xor_inplace(rhs);
                assert_eq!(lhs.cardinality(), expected);
            }
            BitmapCompOperation::AndNot => {
                let expected = lhs.andnot(rhs);
                lhs.andnot_inplace(rhs);
                assert_eq!(*lhs, expected);
            }
            BitmapCompOperation::Jaccard => {
                let index = lhs.jaccard_index(rhs);
                assert!(index.is_nan() || (0.0..=1.0).contains(&index));
                assert_eq!(index.is_nan(), lhs.is_empty() && rhs.is_empty());
            }
            BitmapCompOperation::MissingLhs => {
                assert!(bitmap::and(None, Some(rhs)).is_none());
                assert!(bitmap::andnot(None, Some(rhs)).is_none());
                assert_eq!(bitmap::or(None, Some(rhs)).as_ref(), Some(rhs));
                assert_eq!(bitmap::xor(None, Some(rhs)).as_ref(), Some(rhs));
            }
            BitmapCompOperation::MissingRhs => {
                assert!(bitmap::and(Some(&*lhs), None).is_none());
                assert_eq!(bitmap::andnot(Some(&*lhs), None).as_ref(), Some(&*lhs));
                assert_eq!(bitmap::or(Some(&*lhs), None).as_ref(), Some(&*lhs));
            }
        }
    }
}

/// Walks `b` with one iterator while the operations mutate it, checking
/// that every reported element is the smallest member past the last one.
pub fn check_iteration(b: &mut Bitmap, ops: &[IterOperation], channel: &mut BulkChannel) {
    let mut version = 0u64;
    let mut iter = VersionedIterator::new(Some(b), version, 0.0);
    let mut resume_at = 0u64;

    for op in ops {
        match op {
            IterOperation::Next => {
                let exhausted = iter.is_exhausted();
                match iter.next(Some(b), version) {
                    Some(value) => {
                        assert!(u64::from(value) >= resume_at);
                        assert!(b.contains(value));
                        assert_eq!(b.range_cardinality(resume_at as f64, f64::from(value)), 0);
                        resume_at = u64::from(value) + 1;
                    }
                    None if !exhausted => {
                        assert_eq!(b.range_cardinality(resume_at as f64, f64::INFINITY), 0);
                    }
                    None => {}
                }
            }
            IterOperation::SeekMin(minimum) => {
                if let Some(value) = iter.seek_min(Some(b), version, minimum.0) {
                    assert!(b.contains(value));
                    resume_at = u64::from(value);
                }
            }
            IterOperation::Mutate(op) => {
                op.on_roaring(b, channel);
                version += 1;
            }
            IterOperation::MutateWithoutBump(op) => {
                op.on_roaring(b, channel);
            }
        }
    }
}
