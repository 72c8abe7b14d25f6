//! The read side of the field index protocol.
//!
//! A [`ParcelReader`] locates fields lazily: it scans field headers forward only as
//! far as needed and remembers every header it passes, so fields can be probed in
//! any order. A probe for a field that is not present leaves the cursor where it
//! was and the caller falls back to its default.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::api::ParcelOptions;
use crate::error::{ParcelError, Result};
use crate::field::ParcelField;
use crate::format::{FIELD_HEADER_SIZE, SCOPE_END};
use crate::io::{Handle, ParcelBackend};
use crate::registry::CodecRegistry;
use crate::writer::ParcelState;

#[derive(Debug, Clone, Copy)]
struct FieldSpan {
    payload_start: usize,
    end: usize,
}

/// Index of the fields of one scope, filled as the scan advances.
#[derive(Debug)]
struct ScopeIndex {
    scan_pos: usize,
    limit: usize,
    fields: HashMap<u32, FieldSpan>,
    /// Position just past the close marker (or `limit` for an unterminated root).
    end: Option<usize>,
}

/// Read-mode cursor over a backend.
#[derive(Debug)]
pub struct ParcelReader<'p> {
    backend: &'p mut dyn ParcelBackend,
    options: &'p ParcelOptions,
    depth: usize,
    state: ParcelState,
    scope: ScopeIndex,
    field_end: Option<usize>,
}

impl<'p> ParcelReader<'p> {
    /// Creates a root reader over the whole backend, starting at its cursor.
    pub fn new(backend: &'p mut dyn ParcelBackend, options: &'p ParcelOptions) -> Self {
        let start = backend.position();
        let limit = backend.len();
        Self::scoped(backend, options, 0, start, limit)
    }

    fn scoped(
        backend: &'p mut dyn ParcelBackend,
        options: &'p ParcelOptions,
        depth: usize,
        start: usize,
        limit: usize,
    ) -> Self {
        Self {
            backend,
            options,
            depth,
            state: ParcelState::Idle,
            scope: ScopeIndex {
                scan_pos: start,
                limit,
                fields: HashMap::new(),
                end: None,
            },
            field_end: None,
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

    /// Options this reader was created with.
    pub fn options(&self) -> &'p ParcelOptions {
        self.options
    }

    /// Registry used to resolve companion codecs and native creators.
    pub fn registry(&self) -> &'p CodecRegistry {
        self.options.registry()
    }

    /// Moves the cursor to the payload of `field_id`.
    ///
    /// Returns `false` when the scope holds no such field; the cursor is then left
    /// untouched.
    pub fn read_field(&mut self, field_id: u32) -> Result<bool> {
        self.ensure_open()?;
        if let Some(span) = self.scope.fields.get(&field_id).copied() {
            return self.enter(span).map(|()| true);
        }

        let resume = self.backend.position();
        while let Some((id, span)) = self.scan_next()? {
            if id == field_id {
                return self.enter(span).map(|()| true);
            }
        }
        self.backend.set_position(resume)?;
        Ok(false)
    }

    fn enter(&mut self, span: FieldSpan) -> Result<()> {
        self.backend.set_position(span.payload_start)?;
        self.field_end = Some(span.end);
        self.state = ParcelState::Reading;
        Ok(())
    }

    /// Reads the next field header of this scope into the index.
    fn scan_next(&mut self) -> Result<Option<(u32, FieldSpan)>> {
        if self.scope.end.is_some() {
            return Ok(None);
        }
        let pos = self.scope.scan_pos;
        if pos >= self.scope.limit {
            if self.depth > 0 {
                return Err(ParcelError::Format(
                    "Sub-parcel ended without a close marker".into(),
                ));
            }
            self.scope.end = Some(self.scope.limit);
            return Ok(None);
        }
        if self.scope.limit - pos < 4 {
            return Err(ParcelError::Format(format!(
                "Truncated field header at offset {pos}"
            )));
        }

        self.backend.set_position(pos)?;
        let raw_id = self.backend.read_i32()?;
        if raw_id == SCOPE_END {
            self.scope.end = Some(pos + 4);
            return Ok(None);
        }
        let id = u32::try_from(raw_id).map_err(|_| ParcelError::Malformed {
            what: "field id",
            value: i64::from(raw_id),
        })?;
        if self.scope.limit - pos < FIELD_HEADER_SIZE {
            return Err(ParcelError::Format(format!(
                "Truncated field header at offset {pos}"
            )));
        }
        let raw_len = self.backend.read_i32()?;
        let len = usize::try_from(raw_len).map_err(|_| ParcelError::Malformed {
            what: "field length",
            value: i64::from(raw_len),
        })?;
        let payload_start = pos + FIELD_HEADER_SIZE;
        let end = payload_start + len;
        if end > self.scope.limit {
            return Err(ParcelError::Format(format!(
                "Field {id} overruns its scope ({end} > {})",
                self.scope.limit
            )));
        }

        let span = FieldSpan { payload_start, end };
        self.scope.fields.entry(id).or_insert(span);
        self.scope.scan_pos = end;
        Ok(Some((id, span)))
    }

    /// Scans to the close marker and returns the position just past it.
    fn scope_end(&mut self) -> Result<usize> {
        let mut skipped = 0usize;
        while self.scan_next()?.is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(depth = self.depth, skipped, "skipped fields never probed by the reader");
        }
        // scan_next only returns None once `end` is set.
        self.scope
            .end
            .ok_or_else(|| ParcelError::Format("Scope end not found".into()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ParcelState::Closed {
            return Err(ParcelError::InvalidUsage("Read from a closed parcel".into()));
        }
        Ok(())
    }

    fn ensure_field(&self) -> Result<usize> {
        self.ensure_open()?;
        self.field_end.ok_or_else(|| {
            ParcelError::InvalidUsage("Value read outside of a field; call read_field first".into())
        })
    }

    fn check_overrun(&self, field_end: usize) -> Result<()> {
        let pos = self.backend.position();
        if pos > field_end {
            return Err(ParcelError::Format(format!(
                "Read past end of field ({pos} > {field_end})"
            )));
        }
        Ok(())
    }

    // --- Positional primitive reads (inside the current field) ---

    /// Reads a boolean from the current field.
    pub fn read_bool(&mut self) -> Result<bool> {
        let end = self.ensure_field()?;
        let value = self.backend.read_bool()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads an i32 from the current field.
    pub fn read_i32(&mut self) -> Result<i32> {
        let end = self.ensure_field()?;
        let value = self.backend.read_i32()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads an i64 from the current field.
    pub fn read_i64(&mut self) -> Result<i64> {
        let end = self.ensure_field()?;
        let value = self.backend.read_i64()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads an f32 from the current field.
    pub fn read_f32(&mut self) -> Result<f32> {
        let end = self.ensure_field()?;
        let value = self.backend.read_f32()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads an f64 from the current field.
    pub fn read_f64(&mut self) -> Result<f64> {
        let end = self.ensure_field()?;
        let value = self.backend.read_f64()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads a nullable string from the current field.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let end = self.ensure_field()?;
        let value = self.backend.read_string()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads a nullable byte buffer from the current field.
    pub fn read_byte_array(&mut self) -> Result<Option<Vec<u8>>> {
        let end = self.ensure_field()?;
        let value = self.backend.read_byte_array()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    /// Reads a nullable handle from the current field.
    pub fn read_handle(&mut self) -> Result<Option<Handle>> {
        let end = self.ensure_field()?;
        let value = self.backend.read_handle()?;
        self.check_overrun(end)?;
        Ok(value)
    }

    // --- Field-tagged reads ---

    /// Reads field `field_id`, or returns `default` if the stream does not hold it.
    pub fn read_value<T: ParcelField>(&mut self, default: T, field_id: u32) -> Result<T> {
        if self.read_field(field_id)? {
            T::read_from(self)
        } else {
            Ok(default)
        }
    }

    /// Like [`ParcelReader::read_value`], building the default only on a miss.
    pub fn read_value_or_else<T, F>(&mut self, field_id: u32, default: F) -> Result<T>
    where
        T: ParcelField,
        F: FnOnce() -> T,
    {
        if self.read_field(field_id)? {
            T::read_from(self)
        } else {
            Ok(default())
        }
    }

    // --- Scoping ---

    /// Opens the sub-parcel starting at the cursor, runs `body` on it, then moves
    /// the cursor past the sub-parcel's close marker. Fields `body` never probed
    /// are skipped.
    ///
    /// # Errors
    /// `InvalidUsage` outside of a field or if `body` closed the sub-parcel itself;
    /// `Format` if the nesting limit is exceeded or the sub-parcel is not
    /// terminated inside the current field.
    pub fn nested<R, F>(&mut self, body: F) -> Result<R>
    where
        F: FnOnce(&mut ParcelReader<'_>) -> Result<R>,
    {
        let field_end = self.ensure_field()?;
        let depth = self.depth + 1;
        if depth > self.options.max_depth() {
            return Err(ParcelError::Format(format!(
                "Nesting depth {depth} exceeds the configured maximum of {}",
                self.options.max_depth()
            )));
        }

        let start = self.backend.position();
        trace!(depth, start, "opening sub-parcel");
        let (out, end) = {
            let mut sub = ParcelReader::scoped(&mut *self.backend, self.options, depth, start, field_end);
            let out = body(&mut sub)?;
            sub.close()?;
            (out, sub.scope_end()?)
        };
        self.backend.set_position(end)?;
        trace!(depth, end, "closed sub-parcel");
        Ok(out)
    }

    /// Checks that the scope is well formed up to its close marker and closes it.
    /// Later reads fail with `InvalidUsage`.
    ///
    /// # Errors
    /// `InvalidUsage` if the scope is already closed; `Format` if the scope is
    /// malformed.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.scope_end()?;
        self.field_end = None;
        self.state = ParcelState::Closed;
        Ok(())
    }

    /// Closes the scope and consumes the reader.
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }
}
