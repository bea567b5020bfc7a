//! Utilities for serialization.
#![cfg(target_pointer_width = "64")]

pub mod primitive;

use std::io::{Read, Write};

use anyhow::Result;

/// Upper bound on elements reserved up front when decoding a length prefix.
///
/// A corrupted prefix must not turn into a huge allocation before the
/// stream proves it actually holds that many items.
const MAX_PREALLOC: usize = 1 << 16;

/// Trait to serialize/deserialize data structures.
///
/// All integers are written in little-endian order, and every transfer is
/// completed in full even on transports that move a few bytes per call
/// (see [`crate::io`]).
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use slimidx::Serializable;
///
/// let words: Vec<u64> = vec![7, 0, u64::MAX];
///
/// let mut bytes = vec![];
/// let size = words.serialize_into(&mut bytes)?;
/// let other = Vec::<u64>::deserialize_from(&bytes[..])?;
///
/// assert_eq!(words, other);
/// assert_eq!(size, bytes.len());
/// assert_eq!(size, words.size_in_bytes());
/// # Ok(())
/// # }
/// ```
pub trait Serializable: Sized {
    /// Serializes the data structure into the writer,
    /// returning the number of serialized bytes.
    ///
    /// # Arguments
    ///
    /// - `writer`: [`Write`] variable.
    fn serialize_into<W: Write>(&self, writer: W) -> Result<usize>;

    /// Deserializes the data structure from the reader.
    ///
    /// # Arguments
    ///
    /// - `reader`: [`Read`] variable.
    fn deserialize_from<R: Read>(reader: R) -> Result<Self>;

    /// Returns the number of bytes to serialize the data structure.
    fn size_in_bytes(&self) -> usize;

    /// Returns the size of a primitive type in bytes (if the type is so).
    fn size_of() -> Option<usize> {
        None
    }
}

/// A vector is written as a `u64` item count followed by the items.
impl<S> Serializable for Vec<S>
where
    S: Serializable,
{
    fn serialize_into<W: Write>(&self, mut writer: W) -> Result<usize> {
        let mut mem = (self.len() as u64).serialize_into(&mut writer)?;
        for x in self {
            mem += x.serialize_into(&mut writer)?;
        }
        Ok(mem)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let len = usize::try_from(u64::deserialize_from(&mut reader)?)?;
        let mut vec = Self::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            vec.push(S::deserialize_from(&mut reader)?);
        }
        Ok(vec)
    }

    fn size_in_bytes(&self) -> usize {
        S::size_of().map_or_else(
            || u64::size_of().unwrap() + self.iter().fold(0, |acc, x| acc + x.size_in_bytes()),
            |m| u64::size_of().unwrap() + m * self.len(),
        )
    }
}
