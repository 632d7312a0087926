//! Runtime support for code generated by `wiregen`.
//!
//! Generated bundles refer to this crate as `::wiregen_wire`. It provides the
//! wire primitives every generated type is built from:
//!
//!  1) [`Encoder`] / [`Decoder`] over 8-byte aligned, zero-padded buffers,
//!  2) the [`Layout`], [`Encode`] and [`Decode`] traits with impls for
//!     primitives, strings, vectors, arrays, handles and protocol endpoints,
//!  3) envelopes for tables and unions, including [`UnknownData`],
//!  4) transactional [`Message`]s with a 16-byte header,
//!  5) the [`Transport`] / [`AsyncTransport`] traits and an in-process
//!     [`local_pair`].
//!
//! ```
//! use wiregen_wire::{decode, encode};
//!
//! let value: Vec<String> = vec!["hello".into(), "wire".into()];
//! let (bytes, handles) = encode(&value).unwrap();
//! assert_eq!(bytes.len() % 8, 0);
//! assert_eq!(decode::<Vec<String>>(&bytes, &handles).unwrap(), value);
//! ```

pub mod buffer;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod handle;
pub mod message;
pub mod transport;

pub use buffer::*;
pub use codec::*;
pub use envelope::*;
pub use error::Error;
pub use handle::*;
pub use message::*;
pub use transport::*;
