use std::ffi::c_char;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{trace, warn};

use crate::{Bitmap, Error, Result};

pub trait Serializer {
    fn serialize_into<'a>(bitmap: &Bitmap, dst: &'a mut Vec<u8>) -> &'a [u8];
    fn get_serialized_size_in_bytes(bitmap: &Bitmap) -> usize;
}

pub trait Deserializer {
    fn try_deserialize(buffer: &[u8]) -> Result<Bitmap>;
}

/// Largest uint32-array payload, in bytes, that [`Native`] will produce.
///
/// Bitmaps whose array encoding would reach this size always use the
/// container encoding, which bounds the allocation a decoder has to make for
/// the array form.
pub const NATIVE_SIZE_CEILING: usize = 0x00FF_FFFF;

/// Marker byte of a [`Native`] payload holding a count and a raw element array
const MARKER_ARRAY_UINT32: u8 = 1;
/// Marker byte of a [`Native`] payload holding a [`Portable`] container
const MARKER_CONTAINER: u8 = 2;

/// The `Portable` format is the engine's self-describing container layout.
///
/// It's defined here: <https://github.com/RoaringBitmap/RoaringFormatSpec>
pub enum Portable {}

impl Serializer for Portable {
    /// Serializes a bitmap to a slice of bytes in portable format.
    /// See [`Bitmap::serialize_into`] for examples.
    #[doc(alias = "roaring_bitmap_portable_serialize")]
    fn serialize_into<'a>(bitmap: &Bitmap, dst: &'a mut Vec<u8>) -> &'a [u8] {
        let len = Self::get_serialized_size_in_bytes(bitmap);
        let start = dst.len();
        dst.resize(start + len, 0);

        let written = unsafe {
            ffi::roaring_bitmap_portable_serialize(bitmap.as_ptr(), dst[start..].as_mut_ptr().cast::<c_char>())
        };
        debug_assert_eq!(written, len);

        &dst[start..]
    }

    /// Computes the serialized size in bytes of the Bitmap in portable format.
    /// See [`Bitmap::get_serialized_size_in_bytes`] for examples.
    #[doc(alias = "roaring_bitmap_portable_size_in_bytes")]
    fn get_serialized_size_in_bytes(bitmap: &Bitmap) -> usize {
        unsafe { ffi::roaring_bitmap_portable_size_in_bytes(bitmap.as_ptr()) }
    }
}

impl Deserializer for Portable {
    /// Given a serialized bitmap as slice of bytes in portable format, returns a `Bitmap` instance.
    /// See [`Bitmap::try_deserialize`] for examples.
    ///
    /// The whole buffer must be consumed by the bitmap, and the decoded
    /// bitmap must pass [`Bitmap::internal_validate`].
    #[doc(alias = "roaring_bitmap_portable_deserialize_safe")]
    fn try_deserialize(buffer: &[u8]) -> Result<Bitmap> {
        if buffer.is_empty() {
            return Ok(Bitmap::create());
        }

        // portable_deserialize_size does some amount of checks, and returns zero if data cannot be valid
        let expected =
            unsafe { ffi::roaring_bitmap_portable_deserialize_size(buffer.as_ptr().cast::<c_char>(), buffer.len()) };
        if expected == 0 {
            warn!(len = buffer.len(), "rejected malformed portable bitmap");
            return Err(Error::InvalidData);
        }
        if expected != buffer.len() {
            warn!(expected, found = buffer.len(), "rejected portable bitmap with trailing bytes");
            return Err(Error::InvalidSize {
                expected,
                found: buffer.len(),
            });
        }

        let bitmap = unsafe {
            Bitmap::try_take_heap(ffi::roaring_bitmap_portable_deserialize_safe(
                buffer.as_ptr().cast::<c_char>(),
                buffer.len(),
            ))
        }
        .ok_or(Error::Allocation)?;

        if let Err(reason) = bitmap.internal_validate() {
            warn!(reason, "rejected inconsistent portable bitmap");
            return Err(Error::InvalidData);
        }
        Ok(bitmap)
    }
}

/// The `Native` format picks, per bitmap, the smaller of two encodings and
/// prefixes it with a marker byte:
///
/// * `1`: a little-endian `u32` element count followed by the sorted
///   elements as little-endian `u32`s; small for sparse bitmaps,
/// * `2`: the [`Portable`] encoding.
///
/// The array encoding is only chosen when it is strictly smaller than the
/// portable one and strictly below [`NATIVE_SIZE_CEILING`].
///
/// # Examples
///
/// ```
/// use roaring_bridge::{Bitmap, Native};
///
/// let sparse = Bitmap::of(&[1, 1_000_000]);
/// assert_eq!(sparse.serialize::<Native>(), [1, 2, 0, 0, 0, 1, 0, 0, 0, 64, 66, 15, 0]);
///
/// let dense = Bitmap::from_range(0.0, 100_000.0, 1.0).unwrap();
/// assert_eq!(dense.serialize::<Native>()[0], 2);
/// ```
pub enum Native {}

impl Native {
    /// Size of the marker-less array encoding, or `None` if it is not chosen.
    fn array_size(bitmap: &Bitmap) -> Option<usize> {
        let cardinality = usize::try_from(bitmap.cardinality()).ok()?;
        let size = cardinality.checked_mul(4)?.checked_add(4)?;
        Self::prefers_array(size, Portable::get_serialized_size_in_bytes(bitmap)).then_some(size)
    }

    #[inline]
    fn prefers_array(array_size: usize, portable_size: usize) -> bool {
        array_size < NATIVE_SIZE_CEILING && array_size < portable_size
    }
}

impl Serializer for Native {
    /// Serializes a bitmap to a slice of bytes in native format.
    /// See [`Bitmap::serialize_into`] for examples.
    fn serialize_into<'a>(bitmap: &Bitmap, dst: &'a mut Vec<u8>) -> &'a [u8] {
        let start = dst.len();
        match Self::array_size(bitmap) {
            Some(size) => {
                trace!(size, "serializing bitmap as uint32 array");
                dst.reserve(1 + size);
                dst.push(MARKER_ARRAY_UINT32);
                // array_size only accepts sizes below the ceiling
                let count = (size / 4 - 1) as u32;
                let mut header = [0; 4];
                LittleEndian::write_u32(&mut header, count);
                dst.extend_from_slice(&header);
                Uint32Array::serialize_into(bitmap, dst);
            }
            None => {
                trace!("serializing bitmap as portable container");
                dst.push(MARKER_CONTAINER);
                Portable::serialize_into(bitmap, dst);
            }
        }
        &dst[start..]
    }

    /// Computes the serialized size in bytes of the Bitmap in native format.
    /// See [`Bitmap::get_serialized_size_in_bytes`] for examples.
    fn get_serialized_size_in_bytes(bitmap: &Bitmap) -> usize {
        1 + Self::array_size(bitmap).unwrap_or_else(|| Portable::get_serialized_size_in_bytes(bitmap))
    }
}

/// A [`Native`] payload, split by its marker byte.
enum Encoding<'a> {
    Array { count: usize, elements: &'a [u8] },
    Container(&'a [u8]),
}

impl<'a> Encoding<'a> {
    fn parse(buffer: &'a [u8]) -> Result<Option<Self>> {
        let Some((&marker, payload)) = buffer.split_first() else {
            return Ok(None);
        };
        match marker {
            MARKER_ARRAY_UINT32 => {
                if payload.len() < 4 {
                    return Err(Error::InvalidSize {
                        expected: 5,
                        found: buffer.len(),
                    });
                }
                let (header, elements) = payload.split_at(4);
                let count = LittleEndian::read_u32(header) as usize;
                if count.checked_mul(4) != Some(elements.len()) {
                    return Err(Error::InvalidSize {
                        expected: count.saturating_mul(4).saturating_add(5),
                        found: buffer.len(),
                    });
                }
                Ok(Some(Encoding::Array { count, elements }))
            }
            MARKER_CONTAINER => Ok(Some(Encoding::Container(payload))),
            marker => Err(Error::UnknownFormat(marker)),
        }
    }
}

impl Deserializer for Native {
    /// Given a serialized bitmap as slice of bytes in native format, returns a `Bitmap` instance.
    /// See [`Bitmap::try_deserialize`] for examples.
    ///
    /// An empty buffer is the empty bitmap. Input is never partially consumed:
    /// the array count must match the payload length exactly.
    fn try_deserialize(buffer: &[u8]) -> Result<Bitmap> {
        let encoding = Encoding::parse(buffer).inspect_err(|err| warn!(%err, "rejected native bitmap"))?;
        match encoding {
            None => Ok(Bitmap::create()),
            Some(Encoding::Array { count, elements }) => {
                trace!(count, "deserializing uint32 array");
                decode_array(elements)
            }
            Some(Encoding::Container(payload)) => {
                trace!(len = payload.len(), "deserializing portable container");
                Portable::try_deserialize(payload)
            }
        }
    }
}

/// The `Uint32Array` format is the bare list of elements in ascending order,
/// each a little-endian `u32`, with no marker and no count.
///
/// Any list of elements decodes, sorted or not, with or without duplicates.
///
/// # Examples
///
/// ```
/// use roaring_bridge::{Bitmap, Error, Uint32Array};
///
/// let bitmap = Bitmap::try_deserialize::<Uint32Array>(&[3, 0, 0, 0, 1, 0, 0, 0]).unwrap();
/// assert_eq!(bitmap.to_vec(), [1, 3]);
///
/// assert_eq!(
///     Bitmap::try_deserialize::<Uint32Array>(&[1, 0, 0]),
///     Err(Error::InvalidSize { expected: 0, found: 3 }),
/// );
/// ```
pub enum Uint32Array {}

impl Serializer for Uint32Array {
    #[doc(alias = "roaring_bitmap_to_uint32_array")]
    fn serialize_into<'a>(bitmap: &Bitmap, dst: &'a mut Vec<u8>) -> &'a [u8] {
        let elements = bitmap.to_vec();
        let start = dst.len();
        dst.resize(start + elements.len() * 4, 0);
        LittleEndian::write_u32_into(&elements, &mut dst[start..]);
        &dst[start..]
    }

    fn get_serialized_size_in_bytes(bitmap: &Bitmap) -> usize {
        bitmap.cardinality() as usize * 4
    }
}

impl Deserializer for Uint32Array {
    fn try_deserialize(buffer: &[u8]) -> Result<Bitmap> {
        if buffer.len() % 4 != 0 {
            warn!(len = buffer.len(), "rejected uint32 array with partial element");
            return Err(Error::InvalidSize {
                expected: buffer.len() - buffer.len() % 4,
                found: buffer.len(),
            });
        }
        decode_array(buffer)
    }
}

fn decode_array(bytes: &[u8]) -> Result<Bitmap> {
    debug_assert_eq!(bytes.len() % 4, 0);
    let mut elements = vec![0; bytes.len() / 4];
    LittleEndian::read_u32_into(bytes, &mut elements);
    Bitmap::try_of(&elements).ok_or(Error::Allocation)
}
