#![no_main]

use crate::arbitrary_ops::*;
use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roaring_bridge::{Bitmap, BulkChannel, Native, Portable};

mod arbitrary_ops;

fuzz_target!(|input: FuzzInput| {
    let mut channel = BulkChannel::with_capacity(usize::from(input.channel_capacity));
    let mut lhs = Bitmap::create();
    let mut rhs = Bitmap::create();

    for op in &input.lhs_ops {
        op.on_roaring(&mut lhs, &mut channel);
    }
    for op in &input.rhs_ops {
        op.on_roaring(&mut rhs, &mut channel);
    }

    for op in &input.comp_ops {
        op.on_roaring(&mut lhs, &rhs);
    }

    for op in &input.view_ops {
        op.on_roaring(&rhs, &mut channel);
        op.on_roaring(&lhs, &mut channel);
    }

    check_iteration(&mut lhs, &input.iter_ops, &mut channel);

    check_serialized(&lhs);
    check_serialized(&rhs);
});

fn check_serialized(bitmap: &Bitmap) {
    let native = bitmap.serialize::<Native>();
    assert_eq!(native.len(), bitmap.get_serialized_size_in_bytes::<Native>());
    assert_eq!(Bitmap::try_deserialize::<Native>(&native).unwrap(), *bitmap);

    let portable = bitmap.serialize::<Portable>();
    assert_eq!(Bitmap::try_deserialize::<Portable>(&portable).unwrap(), *bitmap);
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    channel_capacity: u8,
    lhs_ops: Vec<MutableBitmapOperation>,
    rhs_ops: Vec<MutableBitmapOperation>,
    comp_ops: Vec<BitmapCompOperation>,
    view_ops: Vec<ReadBitmapOp>,
    iter_ops: Vec<IterOperation>,
}
