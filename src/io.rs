//! Transfer loops and positional transports.
//!
//! Every byte count requested by the codec is satisfied in full: a transport
//! that moves fewer bytes than asked is called again for the remainder, and an
//! [`io::ErrorKind::Interrupted`] error is retried. Only a terminal error or the
//! end of the transport stops a transfer, reported as a [`TransferError`].
#![cfg(target_pointer_width = "64")]

use std::fs::File;
use std::io::{self, Read, Write};

use tracing::trace;

use crate::error::TransferError;

/// Writes the whole of `buf`, returning `buf.len()`.
///
/// # Errors
///
/// A [`TransferError`] with the number of bytes written so far if the writer
/// fails or stops accepting bytes.
pub fn write_fully<W>(writer: &mut W, buf: &[u8]) -> Result<usize, TransferError>
where
    W: Write + ?Sized,
{
    let mut moved = 0;
    while moved < buf.len() {
        match writer.write(&buf[moved..]) {
            Ok(0) => {
                return Err(TransferError {
                    op: "write",
                    wanted: buf.len(),
                    moved,
                    source: io::ErrorKind::WriteZero.into(),
                })
            }
            Ok(n) => {
                moved += n;
                if moved < buf.len() {
                    trace!(moved, wanted = buf.len(), "short write, retrying");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => {
                return Err(TransferError {
                    op: "write",
                    wanted: buf.len(),
                    moved,
                    source,
                })
            }
        }
    }
    Ok(moved)
}

/// Fills the whole of `buf`, returning `buf.len()`.
///
/// # Errors
///
/// A [`TransferError`] with the number of bytes read so far if the reader
/// fails or reaches its end first.
pub fn read_fully<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, TransferError>
where
    R: Read + ?Sized,
{
    let wanted = buf.len();
    let mut moved = 0;
    while moved < wanted {
        match reader.read(&mut buf[moved..]) {
            Ok(0) => {
                return Err(TransferError {
                    op: "read",
                    wanted,
                    moved,
                    source: io::ErrorKind::UnexpectedEof.into(),
                })
            }
            Ok(n) => {
                moved += n;
                if moved < wanted {
                    trace!(moved, wanted, "short read, retrying");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => {
                return Err(TransferError {
                    op: "read",
                    wanted,
                    moved,
                    source,
                })
            }
        }
    }
    Ok(moved)
}

/// Interface for reading at an absolute byte offset without a shared cursor.
pub trait ReadAt {
    /// Reads into `buf` starting at `offset`, returning the number of bytes read.
    /// May read fewer bytes than requested.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Interface for writing at an absolute byte offset without a shared cursor.
///
/// Callers writing concurrently must target disjoint byte ranges.
pub trait WriteAt {
    /// Writes `buf` starting at `offset`, returning the number of bytes written.
    /// May write fewer bytes than requested.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

impl<T> ReadAt for &T
where
    T: ReadAt + ?Sized,
{
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<T> WriteAt for &T
where
    T: WriteAt + ?Sized,
{
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        (**self).write_at(buf, offset)
    }
}

impl ReadAt for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl WriteAt for File {
    #[cfg(unix)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_write(self, buf, offset)
    }
}

/// Sequential [`Write`] view over a [`WriteAt`] sink, starting at a fixed offset.
pub struct AtWriter<'a, W: ?Sized> {
    sink: &'a W,
    pos: u64,
}

impl<'a, W> AtWriter<'a, W>
where
    W: WriteAt + ?Sized,
{
    /// Creates a writer whose first byte lands at `offset`.
    pub const fn new(sink: &'a W, offset: u64) -> Self {
        Self { sink, pos: offset }
    }

    /// Gets the offset the next byte will be written at.
    pub const fn position(&self) -> u64 {
        self.pos
    }
}

impl<W> Write for AtWriter<'_, W>
where
    W: WriteAt + ?Sized,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.sink.write_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sequential [`Read`] view over a [`ReadAt`] source, starting at a fixed offset.
pub struct AtReader<'a, R: ?Sized> {
    source: &'a R,
    pos: u64,
}

impl<'a, R> AtReader<'a, R>
where
    R: ReadAt + ?Sized,
{
    /// Creates a reader whose first byte comes from `offset`.
    pub const fn new(source: &'a R, offset: u64) -> Self {
        Self { source, pos: offset }
    }

    /// Gets the offset the next byte will be read from.
    pub const fn position(&self) -> u64 {
        self.pos
    }
}

impl<R> Read for AtReader<'_, R>
where
    R: ReadAt + ?Sized,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Pass-through transport counting the bytes moved through it.
pub(crate) struct Tally<T> {
    inner: T,
    moved: u64,
}

impl<T> Tally<T> {
    pub(crate) const fn new(inner: T) -> Self {
        Self { inner, moved: 0 }
    }

    pub(crate) const fn moved(&self) -> u64 {
        self.moved
    }
}

impl<W: Write> Write for Tally<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.moved += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<R: Read> Read for Tally<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.moved += n as u64;
        Ok(n)
    }
}
