//! Host bridge for [CRoaring](https://github.com/RoaringBitmap/CRoaring) bitmaps.
//!
//! Hosts that only speak IEEE doubles, hold iterators across mutations, and
//! move elements through a single shared buffer can drive a roaring bitmap
//! through this crate without marshalling every element.
//!
//! # Example
//!
//! ```rust
//! use roaring_bridge::{Bitmap, BulkChannel, Native, VersionedIterator};
//!
//! let mut bitmap = Bitmap::from_range(0.0, 10.0, 2.0).unwrap();
//! assert_eq!(bitmap.to_vec(), [0, 2, 4, 6, 8]);
//!
//! // Ranges are given as doubles and normalized before reaching the engine
//! assert!(bitmap.add_range(99.5, 102.0));
//! assert_eq!(bitmap.range_cardinality(0.0, f64::INFINITY), 7);
//!
//! // Iterators survive mutation as long as the caller bumps the version
//! let mut version = 0;
//! let mut iter = VersionedIterator::new(Some(&bitmap), version, 0.0);
//! assert_eq!(iter.next(Some(&bitmap), version), Some(0));
//! bitmap.remove(2);
//! version += 1;
//! assert_eq!(iter.next(Some(&bitmap), version), Some(4));
//!
//! // Bulk transfer through one shared buffer
//! let mut channel = BulkChannel::with_capacity(4);
//! let mut session = channel.begin_add(&mut bitmap);
//! channel.buffer_mut()[..3].copy_from_slice(&[7, 5, 7]);
//! session.apply(&channel, 3).unwrap();
//! drop(session);
//! assert!(bitmap.contains(5) && bitmap.contains(7));
//!
//! // Serialization picks the smaller encoding on its own
//! let data = bitmap.serialize::<Native>();
//! assert_eq!(Bitmap::try_deserialize::<Native>(&data).unwrap(), bitmap);
//! ```

pub mod bitmap;
pub mod bulk;
pub mod error;
pub mod iter;
pub mod range;
pub mod serialization;

pub use bitmap::{Bitmap, Statistics};
pub use bulk::{BulkAddSession, BulkChannel, BulkReadSession, BulkRemoveSession};
pub use error::{Error, Result};
pub use iter::{IteratorState, VersionedIterator};
pub use range::NormalizedRange;
pub use serialization::{Deserializer, Native, Portable, Serializer, Uint32Array};
