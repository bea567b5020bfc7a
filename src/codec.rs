//! Versioned container format persisting a [`CompactedArray`] to a stream or a file region.
//!
//! # Layout
//!
//! A serialized array is a fixed-width header followed by the payload.
//! All integers are little-endian.
//!
//! ```text
//! version:     [u8; 16]  [0..16]   producer semver, NUL-padded ASCII
//! header_size: u64       [16..24]  always 32
//! data_size:   u64       [24..32]  payload width in bytes
//! cnt:         u64                 number of elements
//! bitmaps:     u64 len + u64 words
//! offsets:     u64 len + u64 offsets
//! elts:        u64 len + elements  each as wide as the element type
//! ```
//!
//! Decoding is strict about the header: a header width other than
//! [`HEADER_SIZE`] is rejected, and the payload must decode to exactly
//! `data_size` bytes. The version is parsed but never checked; it is
//! returned so that callers can decide on compatibility.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use slimidx::{codec, version, CompactedArray};
//!
//! let a = CompactedArray::new(&[10, 20, 30], vec![1u32, 2, 3])?;
//!
//! let mut bytes = vec![];
//! let size = codec::marshal(&mut bytes, &a)?;
//! assert_eq!(size, bytes.len());
//! assert_eq!(size, codec::marshal_size(&a));
//!
//! let mut other = CompactedArray::new_empty();
//! let header = codec::unmarshal(&bytes[..], &mut other)?;
//! assert_eq!(header.version(), version::VERSION);
//! assert_eq!(a, other);
//! # Ok(())
//! # }
//! ```
#![cfg(target_pointer_width = "64")]

use std::borrow::Cow;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::CodecError;
use crate::io::{read_fully, write_fully, AtReader, AtWriter, ReadAt, Tally, WriteAt};
use crate::version::{MAX_LEN, VERSION};
use crate::{CompactedArray, Serializable};

/// Width in bytes of a serialized [`Header`].
pub const HEADER_SIZE: usize = 2 * std::mem::size_of::<u64>() + MAX_LEN;

/// Fixed-width header preceding every serialized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    version: [u8; MAX_LEN],
    header_size: u64,
    data_size: u64,
}

impl Header {
    /// Creates a header with arbitrary fields.
    ///
    /// # Errors
    ///
    /// An error with kind [`CodecError::VersionTooLong`] is returned if `version`
    /// is longer than [`MAX_LEN`] bytes.
    pub fn new(version: &str, header_size: u64, data_size: u64) -> Result<Self> {
        if version.len() > MAX_LEN {
            return Err(CodecError::VersionTooLong {
                version: version.to_string(),
                max: MAX_LEN,
            }
            .into());
        }
        let mut buf = [0; MAX_LEN];
        buf[..version.len()].copy_from_slice(version.as_bytes());
        Ok(Self {
            version: buf,
            header_size,
            data_size,
        })
    }

    /// Creates a header stamped with the current [`VERSION`] and [`HEADER_SIZE`].
    pub fn with_data_size(data_size: u64) -> Self {
        let mut version = [0; MAX_LEN];
        version[..VERSION.len()].copy_from_slice(VERSION.as_bytes());
        Self {
            version,
            header_size: HEADER_SIZE as u64,
            data_size,
        }
    }

    /// Gets the version string, without its NUL padding.
    pub fn version(&self) -> Cow<'_, str> {
        let len = self
            .version
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_LEN);
        String::from_utf8_lossy(&self.version[..len])
    }

    /// Gets the raw, NUL-padded version field.
    pub const fn version_bytes(&self) -> &[u8; MAX_LEN] {
        &self.version
    }

    /// Gets the width of the header in bytes.
    pub const fn header_size(&self) -> u64 {
        self.header_size
    }

    /// Gets the width of the payload following the header in bytes.
    pub const fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Gets the width of the header and the payload together.
    pub const fn total_size(&self) -> u64 {
        self.header_size + self.data_size
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0; HEADER_SIZE];
        buf[..MAX_LEN].copy_from_slice(&self.version);
        LittleEndian::write_u64(&mut buf[MAX_LEN..MAX_LEN + 8], self.header_size);
        LittleEndian::write_u64(&mut buf[MAX_LEN + 8..], self.data_size);
        buf
    }

    fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut version = [0; MAX_LEN];
        version.copy_from_slice(&buf[..MAX_LEN]);
        Self {
            version,
            header_size: LittleEndian::read_u64(&buf[MAX_LEN..MAX_LEN + 8]),
            data_size: LittleEndian::read_u64(&buf[MAX_LEN + 8..]),
        }
    }
}

/// Writes `header`, returning the number of bytes written ([`HEADER_SIZE`]).
pub fn marshal_header<W: Write>(mut writer: W, header: &Header) -> Result<usize> {
    Ok(write_fully(&mut writer, &header.to_bytes())?)
}

/// Reads a header.
///
/// Only the header is read; its fields are not validated here.
pub fn unmarshal_header<R: Read>(mut reader: R) -> Result<Header> {
    let mut buf = [0; HEADER_SIZE];
    read_fully(&mut reader, &mut buf)?;
    Ok(Header::from_bytes(&buf))
}

/// Returns the width of a serialized header, i.e., [`HEADER_SIZE`].
pub const fn header_size() -> usize {
    HEADER_SIZE
}

/// Returns the number of bytes [`marshal()`] writes for `array`.
pub fn marshal_size<E: Serializable>(array: &CompactedArray<E>) -> usize {
    HEADER_SIZE + array.size_in_bytes()
}

/// Writes `array` with a fresh header, returning the number of bytes written.
///
/// # Errors
///
/// A [`TransferError`](crate::TransferError) if the writer fails before everything
/// is written, with the number of bytes written in total attached as context.
pub fn marshal<W, E>(writer: W, array: &CompactedArray<E>) -> Result<usize>
where
    W: Write,
    E: Serializable,
{
    let total = marshal_size(array);
    let mut writer = Tally::new(writer);
    let mem = write_array(&mut writer, array)
        .with_context(|| format!("marshal wrote {} of {total} bytes", writer.moved()))?;
    debug!(bytes = mem, elements = array.len(), "marshaled array");
    Ok(mem)
}

fn write_array<W, E>(mut writer: W, array: &CompactedArray<E>) -> Result<usize>
where
    W: Write,
    E: Serializable,
{
    let header = Header::with_data_size(array.size_in_bytes() as u64);
    let mut mem = marshal_header(&mut writer, &header)?;
    mem += array.serialize_into(&mut writer)?;
    Ok(mem)
}

/// Reads an array written by [`marshal()`] into `array`, returning its header.
///
/// `array` is replaced only when the whole array was decoded and validated.
///
/// # Errors
///
/// An error is returned if
///
///  - the header width is not [`HEADER_SIZE`] ([`CodecError::HeaderSizeMismatch`]),
///  - the payload decodes to fewer bytes than declared ([`CodecError::PayloadSizeMismatch`]),
///  - the decoded bitmaps, offsets and elements disagree ([`CodecError::CorruptedArray`]), or
///  - the reader fails or ends early, including a payload running past its
///    declared size ([`TransferError`](crate::TransferError)).
///
/// The number of bytes read in total is attached as context.
pub fn unmarshal<R, E>(reader: R, array: &mut CompactedArray<E>) -> Result<Header>
where
    R: Read,
    E: Serializable,
{
    let mut reader = Tally::new(reader);
    let (header, decoded) = read_array(&mut reader)
        .with_context(|| format!("unmarshal read {} bytes", reader.moved()))?;
    debug!(
        version = %header.version(),
        bytes = header.total_size(),
        elements = decoded.len(),
        "unmarshaled array"
    );
    *array = decoded;
    Ok(header)
}

fn read_array<R, E>(mut reader: R) -> Result<(Header, CompactedArray<E>)>
where
    R: Read,
    E: Serializable,
{
    let header = unmarshal_header(&mut reader)?;
    if header.header_size != HEADER_SIZE as u64 {
        return Err(CodecError::HeaderSizeMismatch {
            expected: HEADER_SIZE as u64,
            actual: header.header_size,
        }
        .into());
    }

    let mut payload = reader.take(header.data_size);
    let decoded = CompactedArray::deserialize_from(&mut payload)?;
    if payload.limit() != 0 {
        return Err(CodecError::PayloadSizeMismatch {
            declared: header.data_size,
            consumed: header.data_size - payload.limit(),
        }
        .into());
    }
    Ok((header, decoded))
}

/// Writes `array` with a fresh header starting at byte `offset` of `sink`,
/// returning the number of bytes written.
///
/// Only `offset..offset + marshal_size(array)` is touched, so arrays can share
/// one file at disjoint offsets, and may be written concurrently.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use slimidx::{codec, CompactedArray};
///
/// let a = CompactedArray::new(&[1, 2], vec![10u64, 20])?;
/// let b = CompactedArray::new(&[3], vec![30u64])?;
///
/// let file = tempfile::tempfile()?;
/// let size = codec::marshal_at(&file, 0, &a)?;
/// codec::marshal_at(&file, size as u64, &b)?;
///
/// let mut other = CompactedArray::new_empty();
/// codec::unmarshal_at(&file, size as u64, &mut other)?;
/// assert_eq!(b, other);
/// # Ok(())
/// # }
/// ```
pub fn marshal_at<W, E>(sink: &W, offset: u64, array: &CompactedArray<E>) -> Result<usize>
where
    W: WriteAt + ?Sized,
    E: Serializable,
{
    let mem = marshal(AtWriter::new(sink, offset), array)
        .with_context(|| format!("failed to marshal array at offset {offset}"))?;
    debug!(offset, bytes = mem, "marshaled array at offset");
    Ok(mem)
}

/// Reads an array written by [`marshal_at()`] starting at byte `offset` of `source`,
/// returning its header.
///
/// # Errors
///
/// Same as [`unmarshal()`].
pub fn unmarshal_at<R, E>(source: &R, offset: u64, array: &mut CompactedArray<E>) -> Result<Header>
where
    R: ReadAt + ?Sized,
    E: Serializable,
{
    let header = unmarshal(AtReader::new(source, offset), array)
        .with_context(|| format!("failed to unmarshal array at offset {offset}"))?;
    debug!(offset, bytes = header.total_size(), "unmarshaled array at offset");
    Ok(header)
}
