//! Backends and the primitive codec.
//!
//! A backend is a random-access byte region with a cursor. The protocol layers
//! above it only need the raw operations; the scalar encodings are provided
//! methods so every backend shares one wire representation.

use std::fmt;
use std::io;

use crate::error::{ParcelError, Result};
use crate::format::NULL_LENGTH;

/// An opaque handle token.
///
/// The protocol carries handles without interpreting them; what a token refers to
/// (a descriptor, a remote object, a slot in a table) is owned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Wraps a raw token.
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// Returns the raw token.
    pub const fn token(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

/// Storage a parcel is written to or read from.
///
/// Implementors provide positional raw I/O; the primitive codec (`write_i32`,
/// `read_string`, ...) is built on top as provided methods.
pub trait ParcelBackend: fmt::Debug {
    /// Current cursor position.
    fn position(&self) -> usize;

    /// Moves the cursor. Positions past `len()` are rejected.
    fn set_position(&mut self, pos: usize) -> Result<()>;

    /// Total number of bytes in the backend.
    fn len(&self) -> usize;

    /// Returns true if the backend holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes between the cursor and the end.
    fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    /// Writes `bytes` at the cursor, overwriting or extending, and advances.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Fills `buf` from the cursor and advances.
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()>;

    // --- Primitive codec ---

    /// Writes a boolean as an i32 (0 or 1).
    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_i32(i32::from(value))
    }

    /// Writes a little-endian i32.
    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes a little-endian i64.
    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes an IEEE-754 f32.
    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes an IEEE-754 f64.
    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes a length-prefixed byte buffer; `None` is encoded as length -1.
    fn write_byte_array(&mut self, value: Option<&[u8]>) -> Result<()> {
        match value {
            None => self.write_i32(NULL_LENGTH),
            Some(bytes) => {
                self.write_i32(length_prefix(bytes.len())?)?;
                self.write_raw(bytes)
            }
        }
    }

    /// Writes a length-prefixed UTF-8 string; `None` is encoded as length -1.
    fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        self.write_byte_array(value.map(str::as_bytes))
    }

    /// Writes a presence flag followed by the handle token.
    fn write_handle(&mut self, value: Option<Handle>) -> Result<()> {
        match value {
            None => self.write_bool(false),
            Some(handle) => {
                self.write_bool(true)?;
                self.write_raw(&handle.token().to_le_bytes())
            }
        }
    }

    /// Reads a boolean written by [`ParcelBackend::write_bool`].
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i32()? != 0)
    }

    /// Reads a little-endian i32.
    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Reads a little-endian i64.
    fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Reads an IEEE-754 f32.
    fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    /// Reads an IEEE-754 f64.
    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads a length-prefixed byte buffer.
    fn read_byte_array(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        let len = usize::try_from(len).map_err(|_| ParcelError::Malformed {
            what: "byte array length",
            value: i64::from(len),
        })?;
        if len > self.remaining() {
            return Err(ParcelError::Format(format!(
                "Byte array of {len} bytes exceeds the {} remaining",
                self.remaining()
            )));
        }
        let mut buf = vec![0u8; len];
        self.read_raw(&mut buf)?;
        Ok(Some(buf))
    }

    /// Reads a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<Option<String>> {
        match self.read_byte_array()? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| ParcelError::Format(format!("Invalid UTF-8 string: {e}"))),
        }
    }

    /// Reads a handle written by [`ParcelBackend::write_handle`].
    fn read_handle(&mut self) -> Result<Option<Handle>> {
        if !self.read_bool()? {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(Some(Handle::new(u64::from_le_bytes(buf))))
    }
}

/// Converts a collection length to its i32 wire prefix.
pub(crate) fn length_prefix(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| ParcelError::InvalidUsage(format!("Length {len} does not fit the wire format")))
}

fn eof(wanted: usize, available: usize) -> ParcelError {
    ParcelError::from(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("wanted {wanted} bytes, {available} available"),
    ))
}

/// A growable in-memory backend. Supports both writing and reading.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend positioned at the start of `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the backend and returns its bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ParcelBackend for MemoryBackend {
    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(ParcelError::Format(format!(
                "Position {pos} past end of buffer ({})",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        let src = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| eof(buf.len(), self.data.len().saturating_sub(self.pos)))?;
        buf.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }
}

/// A read-only backend over borrowed bytes (a buffer or a memory-mapped file).
#[derive(Debug, Clone)]
pub struct SliceBackend<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceBackend<'a> {
    /// Creates a backend positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ParcelBackend for SliceBackend<'_> {
    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(ParcelError::Format(format!(
                "Position {pos} past end of buffer ({})",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn write_raw(&mut self, _bytes: &[u8]) -> Result<()> {
        Err(ParcelError::from(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "slice backend is read-only",
        )))
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        let src = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| eof(buf.len(), self.data.len().saturating_sub(self.pos)))?;
        buf.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }
}
