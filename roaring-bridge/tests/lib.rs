use std::collections::BTreeSet;

use proptest::prelude::*;
use roaring::RoaringBitmap;
use roaring_bridge::bitmap::{self, NullableBitmap};
use roaring_bridge::{
    Bitmap, BulkChannel, Error, IteratorState, Native, NormalizedRange, Portable, Uint32Array, VersionedIterator,
};

// borrowed and adapted from https://github.com/Nemo157/roaring-rs/blob/5089f180ca7e17db25f5c58023f4460d973e747f/tests/lib.rs#L7-L37
#[test]
fn smoke1() {
    let mut bitmap = Bitmap::create();
    assert_eq!(bitmap.cardinality(), 0);
    assert!(bitmap.is_empty());
    assert!(!bitmap.remove_checked(0));
    assert_eq!(bitmap.cardinality(), 0);
    assert!(bitmap.add_checked(1));
    assert!(!bitmap.add_checked(1));
    assert!(bitmap.has(1.0));
    assert_eq!(bitmap.cardinality(), 1);
    assert!(!bitmap.is_empty());
    bitmap.add(u32::MAX - 2);
    assert!(bitmap.contains(u32::MAX - 2));
    assert_eq!(bitmap.cardinality(), 2);
    bitmap.add(u32::MAX);
    assert!(bitmap.has(4294967295.0));
    assert_eq!(bitmap.cardinality(), 3);
    bitmap.add(2);
    assert!(bitmap.contains(2));
    assert_eq!(bitmap.cardinality(), 4);
    assert!(bitmap.remove_checked(2));
    assert!(!bitmap.contains(2));
    assert_eq!(bitmap.cardinality(), 3);
    assert!(!bitmap.contains(0));
    assert!(!bitmap.has(-0.5));
    assert!(!bitmap.has(4294967296.0));
    assert_eq!(bitmap.minimum(), Some(1));
    assert_eq!(bitmap.maximum(), Some(u32::MAX));
    bitmap.clear();
    assert_eq!(bitmap.cardinality(), 0);
    assert!(bitmap.is_empty());
    assert_eq!(bitmap.minimum(), None);
}

// borrowed and adapted from https://github.com/RoaringBitmap/gocroaring/blob/4a2fc02f79b1c36b904301e7d052f7f0017b6973/gocroaring_test.go#L24-L64
#[test]
fn smoke2() {
    let mut rb1 = Bitmap::of(&[1, 2, 3, 4, 5, 100, 1000]);
    rb1.optimize();

    let mut rb2 = Bitmap::of(&[3, 4, 1000]);
    rb2.optimize();

    let mut rb3 = Bitmap::create();

    assert_eq!(rb1.cardinality(), 7);
    assert!(rb1.contains(3));

    rb1.and_inplace(&rb2);
    rb3.add(5);
    rb3.or_inplace(&rb1);

    assert_eq!(rb1.to_vec(), [3, 4, 1000]);
    assert_eq!(rb3.to_vec(), [3, 4, 5, 1000]);
    assert_eq!(rb3.and_cardinality(&rb2), 3);
    assert!(rb2.is_strict_subset(&rb3));
    assert!(rb2.is_subset(&rb1));
    assert!(!rb2.is_strict_subset(&rb1));
    assert_eq!(rb3.jaccard_index(&rb2), 0.75);
}

#[test]
fn from_range_then_iterate() {
    let bitmap = Bitmap::from_range(0.0, 10.0, 2.0).unwrap();
    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);

    let mut seen = Vec::new();
    while let Some(value) = iter.next(Some(&bitmap), 0) {
        seen.push(value);
    }
    assert_eq!(seen, [0, 2, 4, 6, 8]);
    assert_eq!(iter.state(), IteratorState::Exhausted);
}

#[test]
fn bulk_add_unsorted_chunk_with_duplicates() {
    let mut bitmap = Bitmap::create();
    let mut channel = BulkChannel::new();

    let mut session = channel.begin_add(&mut bitmap);
    channel.buffer_mut()[..4].copy_from_slice(&[5, 1, 5, 3]);
    session.apply(&channel, 4).unwrap();
    drop(session);

    assert_eq!(bitmap.cardinality(), 3);
    assert_eq!(bitmap.to_vec(), [1, 3, 5]);
}

#[test]
fn select_past_cardinality() {
    let bitmap = Bitmap::of(&[3, 30, 300]);
    assert_eq!(bitmap.select(0.0), Some(3));
    assert_eq!(bitmap.select(2.0), Some(300));
    assert_eq!(bitmap.select(3.0), None);
    assert_eq!(bitmap.select(1e12), None);

    let missing: Option<&Bitmap> = None;
    assert_eq!(missing.select(0.0), None);
}

#[test]
fn add_offset_is_clamped() {
    let bitmap = Bitmap::of(&[0, 1, u32::MAX]);
    assert!(bitmap.add_offset(1e20).is_empty());
    assert!(bitmap.add_offset(-1e20).is_empty());
    assert!(bitmap.add_offset(f64::INFINITY).is_empty());
    assert_eq!(bitmap.add_offset(4294967295.0).to_vec(), [u32::MAX]);
    assert_eq!(bitmap.add_offset(-4294967295.0).to_vec(), [0]);

    assert!(bitmap::add_offset(None, 5.0).is_none());
    assert_eq!(bitmap::add_offset(Some(&bitmap), 1.0).unwrap().to_vec(), [1, 2]);
}

#[test]
fn null_propagation() {
    let b = Bitmap::of(&[1, 2, 3]);
    let some = Some(&b);

    assert!(bitmap::and(some, None).is_none());
    assert!(bitmap::and(None, some).is_none());
    assert_eq!(bitmap::or(some, None).unwrap(), b);
    assert_eq!(bitmap::or(None, some).unwrap(), b);
    assert_eq!(bitmap::xor(None, some).unwrap(), b);
    assert_eq!(bitmap::andnot(some, None).unwrap(), b);
    assert!(bitmap::andnot(None, some).is_none());
    assert!(bitmap::or(None, None).is_none());

    assert!(bitmap::jaccard_index(None, None).is_nan());
    assert_eq!(bitmap::jaccard_index(some, None), 0.0);

    assert_eq!(bitmap::flip_range(None, 2.0, 5.0).unwrap().to_vec(), [2, 3, 4]);
    assert_eq!(bitmap::flip_range(some, 2.0, 5.0).unwrap().to_vec(), [1, 4]);
    assert!(bitmap::flip_range(None, 5.0, 2.0).is_none());
}

#[test]
fn empty_bitmaps_jaccard_is_nan() {
    let empty = Bitmap::create();
    assert!(empty.jaccard_index(&Bitmap::create()).is_nan());
}

#[test]
fn range_operations_on_domain_edges() {
    let mut bitmap = Bitmap::create();
    assert!(bitmap.add_range(4294967290.0, f64::INFINITY));
    assert_eq!(bitmap.cardinality(), 6);
    assert!(bitmap.contains(u32::MAX));
    assert!(bitmap.contains_range(4294967290.0, 4294967296.0));
    assert_eq!(bitmap.range_cardinality(0.0, f64::INFINITY), 6);

    assert!(!bitmap.add_range(f64::NAN, 10.0));
    assert!(!bitmap.add_range(10.0, -1.0));
    assert!(!bitmap.remove_range(4294967296.0, f64::INFINITY));

    assert!(bitmap.remove_range(4294967294.5, 1e300));
    assert_eq!(bitmap.maximum(), Some(4294967294));

    assert!(bitmap.flip_range_inplace(0.0, 2.0));
    assert_eq!(bitmap.minimum(), Some(0));
    assert!(bitmap.intersects_range(0.5, 1.5));
    assert!(!bitmap.intersects_range(2.0, 100.0));
}

#[test]
fn slice_by_position() {
    let bitmap = Bitmap::of(&[1, 2, 3, 4, 5]);
    assert_eq!(bitmap.slice_to_vec(0.0, 5.0), [1, 2, 3, 4, 5]);
    assert_eq!(bitmap.slice_to_vec(1.0, 3.0), [2, 3]);
    assert_eq!(bitmap.slice_to_vec(-2.0, 5.0), [4, 5]);
    assert_eq!(bitmap.slice_to_vec(2.0, -1.0), [3, 4]);
    assert_eq!(bitmap.slice_to_vec(-3.0, -1.0), [3, 4]);
    assert_eq!(bitmap.slice_to_vec(2.0, 100.0), [3, 4, 5]);
    assert_eq!(bitmap.slice_to_vec(f64::NEG_INFINITY, 1.9), [1]);
    assert!(bitmap.slice_to_vec(6.0, 10.0).is_empty());
    assert!(bitmap.slice_to_vec(3.0, 2.0).is_empty());
    assert!(bitmap.slice_to_vec(0.0, f64::NAN).is_empty());

    assert!(Bitmap::create().slice_to_vec(0.0, 100.0).is_empty());
    assert!(None::<&Bitmap>.slice_to_vec(0.0, 100.0).is_empty());
    assert_eq!(Some(&bitmap).slice_to_vec(3.0, f64::INFINITY), [4, 5]);
}

#[test]
fn seek_after_mutation_restarts_at_minimum() {
    let mut bitmap = Bitmap::of(&[1, 5, 9]);
    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.next(Some(&bitmap), 0), Some(1));
    assert_eq!(iter.next(Some(&bitmap), 0), Some(5));

    bitmap.add(2);
    assert_eq!(iter.seek_min(Some(&bitmap), 1, 2.0), Some(2));
    assert_eq!(iter.next(Some(&bitmap), 1), Some(2));
    assert_eq!(iter.next(Some(&bitmap), 1), Some(5));
}

#[test]
fn seek_to_non_finite_minimum_ends_iteration() {
    let bitmap = Bitmap::of(&[1, 5, 9]);

    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.seek_min(Some(&bitmap), 0, f64::NAN), None);
    assert!(iter.is_exhausted());
    assert_eq!(iter.next(Some(&bitmap), 0), None);

    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.next(Some(&bitmap), 0), Some(1));
    assert_eq!(iter.seek_min(Some(&bitmap), 0, f64::NEG_INFINITY), None);
    assert_eq!(iter.state(), IteratorState::Exhausted);

    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.seek_min(Some(&bitmap), 0, f64::INFINITY), None);
    assert!(iter.is_exhausted());

    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.seek_min(Some(&bitmap), 0, -3.0), Some(1));
}

#[test]
fn cloned_iterators_are_independent() {
    let bitmap = Bitmap::of(&[1, 2, 3]);
    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.next(Some(&bitmap), 0), Some(1));

    let mut copy = iter.clone();
    assert_eq!(copy.next(Some(&bitmap), 0), Some(2));
    assert_eq!(copy.next(Some(&bitmap), 0), Some(3));
    assert_eq!(iter.next(Some(&bitmap), 0), Some(2));
}

#[test]
fn iterator_follows_a_replaced_bitmap() {
    let mut bitmap = Bitmap::of(&[1, 2, 3, 4]);
    let mut iter = VersionedIterator::new(Some(&bitmap), 0, 0.0);
    assert_eq!(iter.next(Some(&bitmap), 0), Some(1));

    // Unchanged version, but the engine bitmap was swapped out
    let data = Bitmap::of(&[2, 10]).serialize::<Native>();
    bitmap.deserialize_in_place::<Native>(&data).unwrap();
    assert_eq!(iter.next(Some(&bitmap), 0), Some(2));
    assert_eq!(iter.next(Some(&bitmap), 0), Some(10));

    let other = Bitmap::of(&[11, 12]);
    assert_eq!(iter.next(Some(&other), 0), Some(11));
    assert_eq!(iter.next(None, 0), None);
    assert!(iter.is_exhausted());
}

#[test]
fn new_bulk_session_invalidates_previous() {
    let source = Bitmap::from_range(0.0, 100.0, 1.0).unwrap();
    let mut target = Bitmap::create();
    let mut channel = BulkChannel::with_capacity(8);

    let mut read = channel.begin_read(Some(&source), f64::INFINITY).unwrap();
    assert_eq!(read.drain(&mut channel), Ok(8));

    let mut add = channel.begin_add(&mut target);
    assert_eq!(read.drain(&mut channel), Err(Error::SessionInvalidated));

    add.apply(&channel, 8).unwrap();
    assert_eq!(
        add.apply(&channel, 9),
        Err(Error::ChunkOverflow { count: 9, capacity: 8 })
    );

    // A rejected begin still takes over the channel
    assert!(channel.begin_read(None, 10.0).is_none());
    assert_eq!(add.apply(&channel, 1), Err(Error::SessionInvalidated));
    drop(add);

    assert_eq!(target.to_vec(), (0..8).collect::<Vec<_>>());
}

#[test]
fn bulk_read_rejects_bad_counts() {
    let bitmap = Bitmap::of(&[1, 2]);
    let mut channel = BulkChannel::new();
    assert!(channel.begin_read(Some(&bitmap), 0.0).is_none());
    assert!(channel.begin_read(Some(&bitmap), 0.9).is_none());
    assert!(channel.begin_read(Some(&bitmap), f64::NAN).is_none());

    let mut session = channel.begin_read(Some(&bitmap), 1.5).unwrap();
    assert_eq!(session.remaining(), 1);
    assert_eq!(session.drain(&mut channel), Ok(1));
    assert_eq!(channel.buffer()[0], 1);
    assert_eq!(session.drain(&mut channel), Ok(0));
}

#[test]
fn drain_from_only_moves_forward() {
    let bitmap = Bitmap::from_range(0.0, 20.0, 1.0).unwrap();
    let mut channel = BulkChannel::with_capacity(4);

    let mut session = channel.begin_read(Some(&bitmap), f64::INFINITY).unwrap();
    assert_eq!(session.drain(&mut channel), Ok(4));
    assert_eq!(channel.buffer(), [0, 1, 2, 3]);
    assert_eq!(session.drain_from(&mut channel, 1.0), Ok(4));
    assert_eq!(channel.buffer(), [4, 5, 6, 7]);
    assert_eq!(session.drain_from(&mut channel, 0.0), Ok(4));
    assert_eq!(channel.buffer(), [8, 9, 10, 11]);
    assert_eq!(session.drain_from(&mut channel, 13.5), Ok(4));
    assert_eq!(channel.buffer(), [14, 15, 16, 17]);
    assert_eq!(session.drain(&mut channel), Ok(2));
    assert_eq!(&channel.buffer()[..2], [18, 19]);
    assert_eq!(session.drain(&mut channel), Ok(0));
}

#[test]
fn drain_from_non_finite_minimum_ends_session() {
    let bitmap = Bitmap::of(&[1, 5, 9]);
    let mut channel = BulkChannel::new();

    for minimum in [f64::NAN, f64::NEG_INFINITY, f64::INFINITY] {
        let mut session = channel.begin_read(Some(&bitmap), 10.0).unwrap();
        assert_eq!(session.drain_from(&mut channel, minimum), Ok(0));
        assert_eq!(session.remaining(), 0);
        assert_eq!(session.drain(&mut channel), Ok(0));
    }
}

#[test]
fn bulk_remove() {
    let mut bitmap = Bitmap::from_range(0.0, 10.0, 1.0).unwrap();
    let mut channel = BulkChannel::with_capacity(3);

    let mut session = channel.begin_remove(&mut bitmap);
    channel.buffer_mut().copy_from_slice(&[9, 0, 42]);
    session.apply(&channel, 3).unwrap();
    channel.buffer_mut()[0] = 5;
    session.apply(&channel, 1).unwrap();
    drop(session);

    assert_eq!(bitmap.to_vec(), [1, 2, 3, 4, 6, 7, 8]);
}

#[test]
fn failed_deserialize_leaves_target_untouched() {
    let mut bitmap = Bitmap::of(&[1, 2, 3]);
    assert_eq!(bitmap.deserialize_in_place::<Native>(&[7]), Err(Error::UnknownFormat(7)));
    assert!(bitmap.deserialize_in_place::<Portable>(&[1, 2, 3, 4, 5]).is_err());
    assert!(bitmap.deserialize_in_place::<Uint32Array>(&[1, 2, 3, 4, 5]).is_err());
    assert_eq!(bitmap.to_vec(), [1, 2, 3]);
}

#[test]
fn serialization_of_missing_bitmap() {
    let missing: Option<&Bitmap> = None;
    let data = missing.serialize::<Native>();
    assert!(Bitmap::try_deserialize::<Native>(&data).unwrap().is_empty());
    assert!(Bitmap::try_deserialize::<Portable>(&[]).unwrap().is_empty());
}

/// Elements of the normalized form of `[minimum, maximum)`.
fn model_range(minimum: f64, maximum: f64) -> Option<std::ops::RangeInclusive<u32>> {
    NormalizedRange::new(minimum, maximum).map(|range| range.first()..=range.last())
}

fn bound() -> impl Strategy<Value = f64> {
    prop_oneof![
        -20.0..5000.0f64,
        (-20i32..5000).prop_map(f64::from),
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

#[derive(Debug, Clone)]
enum Step {
    Add(u32),
    Remove(u32),
    AddRange(f64, f64),
    Next,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u32..500).prop_map(Step::Add),
        (0u32..500).prop_map(Step::Remove),
        (0.0..500.0f64, 0.0..500.0f64).prop_map(|(a, b)| Step::AddRange(a, b)),
        Just(Step::Next),
        Just(Step::Next),
    ]
}

proptest! {
    #[test]
    fn bitmap_cardinality_roundtrip(
        indices in prop::collection::vec(proptest::num::u32::ANY, 1..3000)
    ) {
        let original: Bitmap = indices.iter().copied().collect();
        let reference: RoaringBitmap = indices.iter().copied().collect();

        prop_assert_eq!(original.cardinality(), reference.len());
        prop_assert_eq!(original.to_vec(), reference.iter().collect::<Vec<_>>());
    }

    #[test]
    fn normalize_is_idempotent(minimum in bound(), maximum in bound()) {
        if let Some(range) = NormalizedRange::new(minimum, maximum) {
            prop_assert_eq!(NormalizedRange::new(range.start() as f64, range.end() as f64), Some(range));
            prop_assert!(range.start() < range.end());
            prop_assert!(range.end() <= 1 << 32);
        }
    }

    #[test]
    fn test_bitmap_serialization_roundtrip(
        indices in prop::collection::vec(proptest::num::u32::ANY, 0..3000),
        runs in prop::collection::vec((0u32..1 << 20, 1u32..70_000), 0..4)
    ) {
        let mut original: Bitmap = indices.iter().copied().collect();
        for (start, len) in runs {
            original.add_range(f64::from(start), f64::from(start) + f64::from(len));
        }

        let portable = original.serialize::<Portable>();
        prop_assert_eq!(Bitmap::try_deserialize::<Portable>(&portable).unwrap(), original.clone());

        let native = original.serialize::<Native>();
        prop_assert_eq!(native.len(), original.get_serialized_size_in_bytes::<Native>());
        prop_assert_eq!(Bitmap::try_deserialize::<Native>(&native).unwrap(), original.clone());
        if native[0] == 1 {
            prop_assert!(native.len() - 1 < roaring_bridge::serialization::NATIVE_SIZE_CEILING);
            prop_assert!(native.len() - 1 < original.get_serialized_size_in_bytes::<Portable>());
        }

        let array = original.serialize::<Uint32Array>();
        prop_assert_eq!(Bitmap::try_deserialize::<Uint32Array>(&array).unwrap(), original);
    }

    #[test]
    fn truncated_native_input_is_rejected(
        indices in prop::collection::vec(proptest::num::u32::ANY, 1..200),
        cut in 1usize..8
    ) {
        let bitmap = Bitmap::of(&indices);
        let data = bitmap.serialize::<Native>();
        let cut = cut.min(data.len() - 1);
        prop_assert!(Bitmap::try_deserialize::<Native>(&data[..data.len() - cut]).is_err());
    }

    #[test]
    fn binary_ops_match_reference(
        a in prop::collection::vec(0u32..10_000, 0..500),
        b in prop::collection::vec(0u32..10_000, 0..500)
    ) {
        let (x, y) = (Bitmap::of(&a), Bitmap::of(&b));
        let (rx, ry): (RoaringBitmap, RoaringBitmap) = (a.iter().copied().collect(), b.iter().copied().collect());

        prop_assert_eq!((&x & &y).to_vec(), (&rx & &ry).iter().collect::<Vec<_>>());
        prop_assert_eq!((&x | &y).to_vec(), (&rx | &ry).iter().collect::<Vec<_>>());
        prop_assert_eq!((&x ^ &y).to_vec(), (&rx ^ &ry).iter().collect::<Vec<_>>());
        prop_assert_eq!((&x - &y).to_vec(), (&rx - &ry).iter().collect::<Vec<_>>());
        prop_assert_eq!(x.or_cardinality(&y), (&rx | &ry).len());
        prop_assert_eq!(x.intersects(&y), !rx.is_disjoint(&ry));
        prop_assert_eq!(x.is_subset(&y), rx.is_subset(&ry));

        let empty = Bitmap::create();
        prop_assert!(bitmap::and(Some(&x), None).is_none());
        prop_assert!(x.and(&empty).is_empty());
        prop_assert_eq!(bitmap::or(Some(&x), None).unwrap(), x.clone());
        prop_assert_eq!(bitmap::andnot(Some(&x), None).unwrap(), x.clone());
        prop_assert!(bitmap::andnot(None, Some(&x)).is_none());
    }

    #[test]
    fn range_ops_match_model(
        indices in prop::collection::vec(0u32..5000, 0..300),
        minimum in bound(),
        maximum in bound()
    ) {
        let bitmap = Bitmap::of(&indices);
        let model: BTreeSet<u32> = indices.iter().copied().collect();
        let range = model_range(minimum, maximum);
        let inside: BTreeSet<u32> = match &range {
            Some(range) => model.range(range.clone()).copied().collect(),
            None => BTreeSet::new(),
        };

        prop_assert_eq!(bitmap.range_cardinality(minimum, maximum), inside.len() as u64);
        prop_assert_eq!(bitmap.intersects_range(minimum, maximum), !inside.is_empty());
        prop_assert_eq!(
            bitmap.range_to_vec(minimum, maximum, f64::INFINITY),
            inside.iter().copied().collect::<Vec<_>>()
        );

        let mut added = bitmap.clone();
        let changed = added.add_range(minimum, maximum);
        prop_assert_eq!(changed, range.is_some());
        prop_assert_eq!(added.contains_range(minimum, maximum), range.is_some());

        let mut removed = bitmap.clone();
        removed.remove_range(minimum, maximum);
        prop_assert_eq!(removed.cardinality(), (model.len() - inside.len()) as u64);

        let flipped = bitmap.flip_range(minimum, maximum);
        prop_assert_eq!(flipped.is_some(), range.is_some());
        if let (Some(flipped), Some(range)) = (flipped, NormalizedRange::new(minimum, maximum)) {
            let outside = (model.len() - inside.len()) as u64;
            prop_assert_eq!(flipped.cardinality(), outside + range.len() - inside.len() as u64);
        }
    }

    #[test]
    fn slice_matches_vec_slice(
        indices in prop::collection::vec(0u32..100_000, 0..500),
        start in -600i64..600,
        end in -600i64..600
    ) {
        let bitmap = Bitmap::of(&indices);
        let values = bitmap.to_vec();
        let len = values.len() as i64;
        let resolve = |index: i64| (if index < 0 { (index + len).max(0) } else { index.min(len) }) as usize;
        let (from, to) = (resolve(start), resolve(end));
        let expected = if from < to { values[from..to].to_vec() } else { Vec::new() };
        prop_assert_eq!(bitmap.slice_to_vec(start as f64, end as f64), expected);
    }

    #[test]
    fn rank_select_match_model(indices in prop::collection::vec(0u32..100_000, 1..500), probe in -600.0..600.0f64) {
        let bitmap = Bitmap::of(&indices);
        let sorted: Vec<u32> = indices.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let len = sorted.len() as f64;

        let expected = (probe > -1.0).then(|| sorted.get(probe as usize).copied()).flatten();
        prop_assert_eq!(bitmap.select(probe), expected);

        let signed = probe.trunc();
        let position = if signed < 0.0 { signed + len } else { signed };
        let expected = (position >= 0.0).then(|| sorted.get(position as usize).copied()).flatten();
        prop_assert_eq!(bitmap.at(probe), expected);

        for (index, &value) in sorted.iter().enumerate() {
            prop_assert_eq!(bitmap.index_of(f64::from(value)), Some(index as u64));
            prop_assert_eq!(bitmap.select(index as f64), Some(value));
        }
    }

    #[test]
    fn iterator_continues_monotonically_under_mutation(
        initial in prop::collection::vec(0u32..500, 0..100),
        steps in prop::collection::vec(step(), 1..60),
        bump_version in any::<bool>()
    ) {
        let mut bitmap = Bitmap::of(&initial);
        let mut model: BTreeSet<u32> = initial.iter().copied().collect();
        let mut version = 0u64;
        let mut iter = VersionedIterator::new(Some(&bitmap), version, 0.0);
        let mut last: Option<u32> = None;

        for step in steps {
            match step {
                Step::Add(value) => {
                    bitmap.add(value);
                    model.insert(value);
                }
                Step::Remove(value) => {
                    bitmap.remove(value);
                    model.remove(&value);
                }
                Step::AddRange(minimum, maximum) => {
                    bitmap.add_range(minimum, maximum);
                    if let Some(range) = model_range(minimum, maximum) {
                        model.extend(range);
                    }
                }
                Step::Next => {
                    let expected = if iter.is_exhausted() {
                        None
                    } else {
                        let from = last.map_or(0, |v| v + 1);
                        model.range(from..).next().copied()
                    };
                    let value = iter.next(Some(&bitmap), version);
                    prop_assert_eq!(value, expected);
                    if let Some(value) = value {
                        prop_assert!(last.map_or(true, |last| value > last));
                        last = Some(value);
                    }
                    continue;
                }
            }
            if bump_version {
                version += 1;
            }
        }
    }

    #[test]
    fn bulk_read_matches_to_vec(
        indices in prop::collection::vec(proptest::num::u32::ANY, 0..2000),
        capacity in 1usize..300,
        max_count in 1.0..3000.0f64,
        minimum in prop::option::of(0.0..4294967296.0f64)
    ) {
        let bitmap = Bitmap::of(&indices);
        let mut channel = BulkChannel::with_capacity(capacity);
        let mut session = channel.begin_read(Some(&bitmap), max_count).unwrap();

        let mut expected = bitmap.to_vec();
        let mut read = Vec::new();
        let mut n = match minimum {
            Some(minimum) => {
                expected.retain(|&v| f64::from(v) >= minimum.ceil());
                session.drain_from(&mut channel, minimum).unwrap()
            }
            None => session.drain(&mut channel).unwrap(),
        };
        expected.truncate(max_count as usize);
        while n > 0 {
            prop_assert!(n <= capacity);
            read.extend_from_slice(&channel.buffer()[..n]);
            n = session.drain(&mut channel).unwrap();
        }
        prop_assert_eq!(read, expected);
        prop_assert_eq!(session.drain(&mut channel), Ok(0));
    }

    #[test]
    fn bulk_add_matches_add_many(
        chunks in prop::collection::vec(prop::collection::vec(proptest::num::u32::ANY, 0..64), 0..10)
    ) {
        let mut bitmap = Bitmap::create();
        let mut expected = Bitmap::create();
        let mut channel = BulkChannel::with_capacity(64);

        let mut session = channel.begin_add(&mut bitmap);
        for chunk in &chunks {
            channel.buffer_mut()[..chunk.len()].copy_from_slice(chunk);
            session.apply(&channel, chunk.len()).unwrap();
            expected.add_many(chunk);
        }
        drop(session);

        prop_assert_eq!(bitmap, expected);
    }

    #[test]
    fn optimize_converges(
        indices in prop::collection::vec(0u32..200_000, 0..2000),
        runs in prop::collection::vec((0u32..200_000, 1u32..5_000), 0..8)
    ) {
        let mut bitmap = Bitmap::of(&indices);
        for (start, len) in runs {
            bitmap.add_range(f64::from(start), f64::from(start + len));
        }
        let before = bitmap.clone();

        bitmap.optimize();
        prop_assert!(!bitmap.optimize());
        prop_assert_eq!(bitmap, before);
    }
}
