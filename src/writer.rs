//! The write side of the field index protocol.
//!
//! A [`ParcelWriter`] is one scope: the root parcel or a sub-parcel opened for a
//! nested versioned object. Every value lives inside a field; the writer patches
//! each field's length when the next field starts or the scope closes, so readers
//! can skip fields they do not know.

use std::collections::BTreeSet;

use tracing::trace;

use crate::api::ParcelOptions;
use crate::error::{ParcelError, Result};
use crate::field::ParcelField;
use crate::format::SCOPE_END;
use crate::io::{Handle, ParcelBackend};

/// Lifecycle of a writer or reader scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParcelState {
    /// Created, nothing written or read yet.
    Idle,
    /// At least one field has been opened for writing.
    Writing,
    /// At least one field has been located for reading.
    Reading,
    /// The close marker has been written or consumed.
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct OpenField {
    id: u32,
    header_pos: usize,
    payload_start: usize,
}

/// Write-mode cursor over a backend.
///
/// Sub-parcels are created with [`ParcelWriter::nested`], which borrows the parent
/// mutably: the parent cannot be written while a child is open.
///
/// ```compile_fail
/// use vparcel::{MemoryBackend, ParcelOptions, ParcelWriter};
///
/// let options = ParcelOptions::new();
/// let mut backend = MemoryBackend::new();
/// let mut parent = ParcelWriter::new(&mut backend, &options);
/// parent.set_output_field(1).unwrap();
/// parent
///     .nested(|child| {
///         parent.write_i32(7)?; // parent is mutably borrowed by `nested`
///         child.write_value(&1i32, 1)
///     })
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct ParcelWriter<'p> {
    backend: &'p mut dyn ParcelBackend,
    options: &'p ParcelOptions,
    depth: usize,
    state: ParcelState,
    current: Option<OpenField>,
    written: BTreeSet<u32>,
}

impl<'p> ParcelWriter<'p> {
    /// Creates a root writer appending at the backend's cursor.
    pub fn new(backend: &'p mut dyn ParcelBackend, options: &'p ParcelOptions) -> Self {
        Self::scoped(backend, options, 0)
    }

    fn scoped(backend: &'p mut dyn ParcelBackend, options: &'p ParcelOptions, depth: usize) -> Self {
        Self {
            backend,
            options,
            depth,
            state: ParcelState::Idle,
            current: None,
            written: BTreeSet::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ParcelState {
        self.state
    }

    /// Nesting depth; the root scope is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Options this writer was created with.
    pub fn options(&self) -> &'p ParcelOptions {
        self.options
    }

    /// Field currently receiving values, if any.
    pub fn current_field(&self) -> Option<u32> {
        self.current.map(|f| f.id)
    }

    /// Starts field `field_id`. The previous field, if any, is closed first.
    ///
    /// # Errors
    /// `InvalidUsage` if the id was already written in this scope, does not fit
    /// a non-negative i32, or the scope is closed.
    pub fn set_output_field(&mut self, field_id: u32) -> Result<()> {
        self.ensure_open()?;
        let wire_id = i32::try_from(field_id).map_err(|_| {
            ParcelError::InvalidUsage(format!("Field id {field_id} exceeds i32::MAX"))
        })?;
        self.close_field()?;
        if !self.written.insert(field_id) {
            return Err(ParcelError::InvalidUsage(format!(
                "Field {field_id} already written in this scope"
            )));
        }

        let header_pos = self.backend.position();
        self.backend.write_i32(wire_id)?;
        self.backend.write_i32(0)?; // length, patched by close_field
        self.current = Some(OpenField {
            id: field_id,
            header_pos,
            payload_start: self.backend.position(),
        });
        self.state = ParcelState::Writing;
        Ok(())
    }

    /// Closes the current field by patching its length. No-op if none is open.
    pub fn close_field(&mut self) -> Result<()> {
        let Some(field) = self.current.take() else {
            return Ok(());
        };
        let end = self.backend.position();
        let len = i32::try_from(end - field.payload_start).map_err(|_| {
            ParcelError::InvalidUsage(format!("Field {} exceeds the maximum field size", field.id))
        })?;
        self.backend.set_position(field.header_pos + 4)?;
        self.backend.write_i32(len)?;
        self.backend.set_position(end)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ParcelState::Closed {
            return Err(ParcelError::InvalidUsage("Write to a closed parcel".into()));
        }
        Ok(())
    }

    fn ensure_field(&self) -> Result<()> {
        self.ensure_open()?;
        if self.current.is_none() {
            return Err(ParcelError::InvalidUsage(
                "Value written outside of a field; call set_output_field first".into(),
            ));
        }
        Ok(())
    }

    // --- Positional primitive writes (inside the current field) ---

    /// Writes a boolean into the current field.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_bool(value)
    }

    /// Writes an i32 into the current field.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_i32(value)
    }

    /// Writes an i64 into the current field.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_i64(value)
    }

    /// Writes an f32 into the current field.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_f32(value)
    }

    /// Writes an f64 into the current field.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_f64(value)
    }

    /// Writes a nullable string into the current field.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_string(value)
    }

    /// Writes a nullable byte buffer into the current field.
    pub fn write_byte_array(&mut self, value: Option<&[u8]>) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_byte_array(value)
    }

    /// Writes `len` bytes of `bytes` starting at `offset` as a byte buffer.
    ///
    /// # Errors
    /// `InvalidUsage` if the range is out of bounds.
    pub fn write_byte_slice(&mut self, bytes: &[u8], offset: usize, len: usize) -> Result<()> {
        let slice = offset
            .checked_add(len)
            .and_then(|end| bytes.get(offset..end))
            .ok_or_else(|| {
                ParcelError::InvalidUsage(format!(
                    "Range {offset}+{len} outside byte buffer of {}",
                    bytes.len()
                ))
            })?;
        self.write_byte_array(Some(slice))
    }

    /// Writes a nullable handle into the current field.
    pub fn write_handle(&mut self, value: Option<Handle>) -> Result<()> {
        self.ensure_field()?;
        self.backend.write_handle(value)
    }

    // --- Field-tagged writes ---

    /// Writes `value` as field `field_id`.
    pub fn write_value<T: ParcelField>(&mut self, value: &T, field_id: u32) -> Result<()> {
        self.set_output_field(field_id)?;
        value.write_to(self)
    }

    // --- Scoping ---

    /// Opens a sub-parcel inside the current field, runs `body` on it and closes it.
    ///
    /// # Errors
    /// `InvalidUsage` if no field is open, the nesting limit is exceeded or `body`
    /// closed the sub-parcel itself; any error returned by `body`.
    pub fn nested<R, F>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce(&mut ParcelWriter<'_>) -> Result<R>,
    {
        self.ensure_field()?;
        let depth = self.depth + 1;
        if depth > self.options.max_depth() {
            return Err(ParcelError::InvalidUsage(format!(
                "Nesting depth {depth} exceeds the configured maximum of {}",
                self.options.max_depth()
            )));
        }

        trace!(depth, parent_field = ?self.current_field(), "opening sub-parcel");
        let mut sub = ParcelWriter::scoped(&mut *self.backend, self.options, depth);
        let out = body(&mut sub)?;
        sub.close()?;
        trace!(depth, "closed sub-parcel");
        Ok(out)
    }

    /// Closes the last field and writes the scope close marker. Later writes
    /// fail with `InvalidUsage`.
    ///
    /// # Errors
    /// `InvalidUsage` if the scope is already closed.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.close_field()?;
        self.backend.write_i32(SCOPE_END)?;
        self.state = ParcelState::Closed;
        Ok(())
    }

    /// Closes the scope and consumes the writer.
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }
}
