//! The high-level entry points.
//!
//! [`VParcel`] writes and reads a root versioned object with default options;
//! [`ParcelOptions`] (built through [`VParcel::builder`]) offers the same entry
//! points with a registry and serialization flags of the caller's choosing.
//!
//! ```rust
//! use vparcel::{VParcel, VersionedParcelable};
//!
//! #[derive(Debug, Default, PartialEq, VersionedParcelable)]
//! #[parcel(package = "com.example")]
//! struct Account {
//!     #[parcel(id = 1)]
//!     id: i64,
//!     #[parcel(id = 2)]
//!     owner: Option<String>,
//! }
//!
//! let account = Account { id: 7, owner: Some("ada".into()) };
//! let bytes = VParcel::to_bytes(&account).unwrap();
//! let back: Account = VParcel::from_bytes(&bytes).unwrap();
//! assert_eq!(back, account);
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::debug;

use crate::error::{ParcelError, Result};
use crate::format::{FILE_HEADER_SIZE, FileHeader, ROOT_FIELD};
use crate::io::{MemoryBackend, SliceBackend};
use crate::reader::ParcelReader;
use crate::registry::CodecRegistry;
use crate::versioned::VersionedParcelable;
use crate::writer::ParcelWriter;

/// Default limit on sub-parcel nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Settings shared by every scope of one parcel.
#[derive(Debug, Clone)]
pub struct ParcelOptions {
    registry: Arc<CodecRegistry>,
    allow_serialization: bool,
    ignore_native_objects: bool,
    max_depth: usize,
}

impl Default for ParcelOptions {
    fn default() -> Self {
        Self {
            registry: Arc::new(CodecRegistry::new()),
            allow_serialization: true,
            ignore_native_objects: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParcelOptions {
    /// Default options: empty registry, serialization allowed, native objects
    /// kept, nesting limited to [`DEFAULT_MAX_DEPTH`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry used for polymorphic reads.
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Whether the generic fallback may be written.
    pub fn allow_serialization(&self) -> bool {
        self.allow_serialization
    }

    /// Whether native objects are replaced by null on write.
    pub fn ignore_native_objects(&self) -> bool {
        self.ignore_native_objects
    }

    /// Maximum sub-parcel nesting depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Encodes `value` as the root object of a new parcel.
    pub fn to_bytes<T: VersionedParcelable>(&self, value: &T) -> Result<Vec<u8>> {
        self.write_with(|parcel| {
            parcel.set_output_field(ROOT_FIELD)?;
            parcel.write_versioned_object(Some(value))
        })
    }

    /// Decodes the root object of `bytes`.
    ///
    /// # Errors
    /// `Format` if the parcel holds no root object.
    pub fn from_bytes<T: VersionedParcelable>(&self, bytes: &[u8]) -> Result<T> {
        self.read_with(bytes, |parcel| {
            if !parcel.read_field(ROOT_FIELD)? {
                return Err(ParcelError::Format("Parcel has no root object".into()));
            }
            parcel
                .read_versioned_object::<T>()?
                .ok_or_else(|| ParcelError::Format("Root object is null".into()))
        })
    }

    /// Runs `body` on a fresh root writer and returns the finished bytes.
    pub fn write_with<F>(&self, body: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut ParcelWriter<'_>) -> Result<()>,
    {
        let mut backend = MemoryBackend::new();
        let mut writer = ParcelWriter::new(&mut backend, self);
        body(&mut writer)?;
        writer.finish()?;
        Ok(backend.into_inner())
    }

    /// Runs `body` on a root reader over `bytes`, then checks that the rest of
    /// the root scope is well formed.
    pub fn read_with<R, F>(&self, bytes: &[u8], body: F) -> Result<R>
    where
        F: FnOnce(&mut ParcelReader<'_>) -> Result<R>,
    {
        let mut backend = SliceBackend::new(bytes);
        let mut reader = ParcelReader::new(&mut backend, self);
        let out = body(&mut reader)?;
        reader.finish()?;
        Ok(out)
    }

    /// Writes `value` to a file: a [`FileHeader`] followed by the parcel.
    pub fn save<T, P>(&self, path: P, value: &T) -> Result<()>
    where
        T: VersionedParcelable,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let payload = self.to_bytes(value)?;
        let header = FileHeader::for_payload(&payload);

        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&header.to_bytes())?;
        out.write_all(&payload)?;
        out.flush()?;
        debug!(path = %path.display(), bytes = payload.len(), "parcel saved");
        Ok(())
    }

    /// Reads the root object of a file written by [`ParcelOptions::save`].
    ///
    /// # Errors
    /// `Format` on a bad header, a length mismatch or a checksum mismatch.
    pub fn load<T, P>(&self, path: P) -> Result<T>
    where
        T: VersionedParcelable,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() < FILE_HEADER_SIZE as u64 {
            return Err(ParcelError::Format("File smaller than header".into()));
        }

        // Safety: the map is read-only and dropped before returning; a concurrent
        // writer truncating the file is outside what this API supports.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        let header = FileHeader::from_bytes(&mmap)?;
        let payload = mmap
            .get(FILE_HEADER_SIZE..)
            .ok_or_else(|| ParcelError::Format("File smaller than header".into()))?;
        header.verify(payload)?;
        debug!(path = %path.display(), bytes = payload.len(), "parcel loaded");
        self.from_bytes(payload)
    }
}

/// Builder for [`ParcelOptions`].
#[derive(Debug, Default)]
pub struct ParcelOptionsBuilder {
    options: ParcelOptions,
}

impl ParcelOptionsBuilder {
    /// Sets the registry used for polymorphic reads.
    pub fn registry(mut self, registry: impl Into<Arc<CodecRegistry>>) -> Self {
        self.options.registry = registry.into();
        self
    }

    /// Allows or forbids writing through the generic fallback.
    pub fn allow_serialization(mut self, allow: bool) -> Self {
        self.options.allow_serialization = allow;
        self
    }

    /// Replaces native objects by null on write instead of flattening them.
    pub fn ignore_native_objects(mut self, ignore: bool) -> Self {
        self.options.ignore_native_objects = ignore;
        self
    }

    /// Limits sub-parcel nesting.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = depth;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> ParcelOptions {
        self.options
    }
}

/// The main entry point, using default options.
#[derive(Debug)]
pub struct VParcel;

impl VParcel {
    /// Starts configuring custom options.
    ///
    /// ```rust
    /// use vparcel::{CodecRegistry, VParcel};
    ///
    /// let options = VParcel::builder()
    ///     .registry(CodecRegistry::new())
    ///     .allow_serialization(false)
    ///     .max_depth(8)
    ///     .build();
    /// assert!(!options.allow_serialization());
    /// ```
    pub fn builder() -> ParcelOptionsBuilder {
        ParcelOptionsBuilder::default()
    }

    /// See [`ParcelOptions::to_bytes`].
    pub fn to_bytes<T: VersionedParcelable>(value: &T) -> Result<Vec<u8>> {
        ParcelOptions::default().to_bytes(value)
    }

    /// See [`ParcelOptions::from_bytes`].
    pub fn from_bytes<T: VersionedParcelable>(bytes: &[u8]) -> Result<T> {
        ParcelOptions::default().from_bytes(bytes)
    }

    /// See [`ParcelOptions::write_with`].
    pub fn write_with<F>(body: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&mut ParcelWriter<'_>) -> Result<()>,
    {
        ParcelOptions::default().write_with(body)
    }

    /// See [`ParcelOptions::read_with`].
    pub fn read_with<R, F>(bytes: &[u8], body: F) -> Result<R>
    where
        F: FnOnce(&mut ParcelReader<'_>) -> Result<R>,
    {
        ParcelOptions::default().read_with(bytes, body)
    }

    /// See [`ParcelOptions::save`].
    pub fn save<T, P>(path: P, value: &T) -> Result<()>
    where
        T: VersionedParcelable,
        P: AsRef<Path>,
    {
        ParcelOptions::default().save(path, value)
    }

    /// See [`ParcelOptions::load`].
    pub fn load<T, P>(path: P) -> Result<T>
    where
        T: VersionedParcelable,
        P: AsRef<Path>,
    {
        ParcelOptions::default().load(path)
    }
}
