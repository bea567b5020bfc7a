//! # `slimidx`: Compact index structures in Rust
//!
//! `slimidx` contains small, read-mostly index structures meant to be built once
//! from sorted input, persisted, and queried many times.
//!
//! ## Data structures
//!
//! - [`CompactedArray`]
//!   - Sparse array keyed by `u32` indices, answering lookups in constant time
//!     with per-bucket bitmaps and prefix counts.
//! - [`Trie`]
//!   - Radix tree over byte strings answering predecessor, exact and successor
//!     lookups in one descent. It can be squashed into a smaller index, or built
//!     over `[start, end]` ranges with [`Trie::new_range`].
//!
//! ## Serialization
//!
//! All structures implement [`Serializable`]. The [`codec`] module wraps a
//! [`CompactedArray`] in a versioned header and reads or writes it on streams
//! or at fixed offsets of a file ([`codec::marshal_at`]). Transfers tolerate
//! transports that move fewer bytes than requested (see [`io`]).
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use slimidx::{codec, CompactedArray, Trie};
//!
//! let trie = Trie::new(&["apple", "banana", "cherry"], vec![0, 1, 2])?;
//! let r = trie.search("blueberry");
//! assert_eq!((r.lt, r.eq, r.gt), (Some(&1), None, Some(&2)));
//!
//! let array = CompactedArray::new(&[3, 70, 1000], vec![30u32, 700, 10000])?;
//! let mut bytes = vec![];
//! codec::marshal(&mut bytes, &array)?;
//!
//! let mut other = CompactedArray::new_empty();
//! codec::unmarshal(&bytes[..], &mut other)?;
//! assert_eq!(other.get(70), Some(&700));
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitation
//!
//! This library is designed to run on 64-bit machines.
#![deny(missing_docs)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("`target_pointer_width` must be 64");

pub mod broadword;
pub mod codec;
pub mod compacted_array;
pub mod error;
pub mod io;
pub mod serial;
pub mod trie;
pub mod version;

pub use codec::{marshal, marshal_at, unmarshal, unmarshal_at, Header};
pub use compacted_array::CompactedArray;
pub use error::{BuildError, CodecError, TransferError};
pub use serial::Serializable;
pub use trie::{Branch, SearchResult, Trie};
