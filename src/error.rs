//! Error kinds reported by construction and serialization.
//!
//! Fallible operations in this crate return [`anyhow::Result`]. The kinds
//! below stay reachable through [`anyhow::Error::downcast_ref`] even after
//! context such as the offending key has been attached.
//!
//! ```
//! use slimidx::{BuildError, Trie};
//!
//! let e = Trie::new(&["b", "a"], vec![1, 2]).unwrap_err();
//! assert_eq!(e.downcast_ref::<BuildError>(), Some(&BuildError::KeyOutOfOrder));
//! assert_eq!(e.to_string(), "key: a");
//! ```
use std::io;

use thiserror::Error;

/// Validation failures while building a [`Trie`](crate::Trie) or a
/// [`CompactedArray`](crate::CompactedArray).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// The same key was inserted twice.
    #[error("keys can not be duplicate")]
    DuplicateKey,
    /// The values argument is not an ordered collection.
    ///
    /// The typed constructors of this crate take a `Vec` and never report it;
    /// it is kept so that front-ends accepting dynamic input share the kind.
    #[error("values must be in a sequence")]
    ValuesNotSequence,
    /// Range starts and ends differ in count.
    #[error("length of starts and ends not equal")]
    RangeLengthMismatch,
    /// Keys and values differ in count.
    #[error("length of keys and values not equal")]
    KeyValueLengthMismatch,
    /// Keys are not in strictly ascending order.
    #[error("keys not ascending sorted")]
    KeyOutOfOrder,
}

/// Format violations found while decoding a serialized structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A version string does not fit in the fixed-width version field.
    #[error("version {version:?} exceeds {max} bytes")]
    VersionTooLong {
        /// The rejected version string.
        version: String,
        /// Width of the version field.
        max: usize,
    },
    /// The header declares a width other than the one this codec writes.
    #[error("header size must be {expected}, but got {actual}")]
    HeaderSizeMismatch {
        /// Width written by this codec.
        expected: u64,
        /// Width found in the header.
        actual: u64,
    },
    /// The payload ended before the declared data size was consumed.
    #[error("payload declares {declared} bytes, but only {consumed} were decoded")]
    PayloadSizeMismatch {
        /// Data size recorded in the header.
        declared: u64,
        /// Bytes the decoder consumed.
        consumed: u64,
    },
    /// A decoded array whose bitmaps, offsets and elements disagree.
    #[error("corrupted array: {reason}")]
    CorruptedArray {
        /// The violated relation.
        reason: &'static str,
    },
}

/// A transfer that could not move the requested number of bytes.
///
/// Short transfers without an error are retried; this is only reported once
/// the transport fails or reaches its end.
#[derive(Error, Debug)]
#[error("{op} moved {moved} of {wanted} bytes")]
pub struct TransferError {
    /// `"read"` or `"write"`.
    pub op: &'static str,
    /// Number of bytes requested.
    pub wanted: usize,
    /// Number of bytes actually moved before the failure.
    pub moved: usize,
    /// The terminal transport error.
    #[source]
    pub source: io::Error,
}

impl TransferError {
    /// Returns the kind of the underlying transport error.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
