#![no_main]

use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use roaring_bridge::{Bitmap, Deserializer, Native, Portable, Uint32Array};

fn check_bitmap<D: Deserializer>(input: &[u8]) {
    let mut target = Bitmap::of(&[1, 2, 3]);
    let bitmap = Bitmap::try_deserialize::<D>(input);
    let in_place = target.deserialize_in_place::<D>(input);
    assert_eq!(bitmap.is_ok(), in_place.is_ok());

    match bitmap {
        Ok(mut bitmap) => {
            bitmap.internal_validate().unwrap();
            assert_eq!(bitmap, target);

            let start_cardinality = bitmap.cardinality();
            let mut new_cardinality = start_cardinality;
            for i in 100..1000 {
                if bitmap.add_checked(i) {
                    new_cardinality += 1;
                }
            }
            assert_eq!(
                new_cardinality,
                bitmap.cardinality(),
                "Cardinality mismatch in {}",
                std::any::type_name::<D>()
            );

            let data = bitmap.serialize::<Native>();
            assert_eq!(Bitmap::try_deserialize::<Native>(&data).unwrap(), bitmap);
        }
        // A failed decode leaves the target alone
        Err(_) => assert_eq!(target.to_vec(), [1, 2, 3]),
    }
}

#[derive(Arbitrary, Debug)]
enum Format {
    Portable,
    Native,
    Uint32Array,
}

fuzz_target!(|input: (Format, &[u8])| {
    let (format, input) = input;
    match format {
        Format::Portable => check_bitmap::<Portable>(input),
        Format::Native => check_bitmap::<Native>(input),
        Format::Uint32Array => check_bitmap::<Uint32Array>(input),
    }
});
