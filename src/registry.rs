//! Lookup of companion codecs and native creators by identity.
//!
//! Reads that already know the concrete type never touch the registry. It is only
//! consulted for polymorphic reads: a `dyn VersionedObject`, a native object
//! stored under a creator the caller did not name, or a subtype stored where a
//! supertype's field was declared.
//!
//! The registry is filled once, before any parcel is read, and then shared
//! immutably through [`ParcelOptions`](crate::ParcelOptions). There is no
//! process-wide state.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{ParcelError, Result};
use crate::native::{NativeObject, NativeParcelable};
use crate::reader::ParcelReader;
use crate::versioned::{Parcelizer, VersionedObject, VersionedParcelable};

type VersionedDecodeFn = fn(&mut ParcelReader<'_>) -> Result<Box<dyn VersionedObject>>;
type NativeDecodeFn = fn(&mut ParcelReader<'_>) -> Result<Box<dyn NativeObject>>;

/// The decode entry point of one companion codec.
#[derive(Debug, Clone, Copy)]
pub struct VersionedCodec {
    identity: &'static str,
    type_name: &'static str,
    decode: VersionedDecodeFn,
}

impl VersionedCodec {
    /// Companion identity this codec answers to.
    pub fn identity(&self) -> &'static str {
        self.identity
    }

    /// Rust type the codec produces.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Decodes an object from its sub-parcel.
    pub fn decode(&self, parcel: &mut ParcelReader<'_>) -> Result<Box<dyn VersionedObject>> {
        (self.decode)(parcel)
    }
}

/// The factory of one native object type.
#[derive(Debug, Clone, Copy)]
pub struct NativeCodec {
    creator: &'static str,
    type_name: &'static str,
    decode: NativeDecodeFn,
}

impl NativeCodec {
    /// Creator name this codec answers to.
    pub fn creator(&self) -> &'static str {
        self.creator
    }

    /// Rust type the codec produces.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Rebuilds an object from the cursor.
    pub fn decode(&self, parcel: &mut ParcelReader<'_>) -> Result<Box<dyn NativeObject>> {
        (self.decode)(parcel)
    }
}

fn decode_versioned<T: VersionedParcelable>(
    parcel: &mut ParcelReader<'_>,
) -> Result<Box<dyn VersionedObject>> {
    let object = T::Parcelizer::read(parcel)?;
    Ok(Box::new(object))
}

fn decode_native<T: NativeParcelable>(parcel: &mut ParcelReader<'_>) -> Result<Box<dyn NativeObject>> {
    let object = T::create_from_parcel(parcel)?;
    Ok(Box::new(object))
}

/// Registry of companion codecs and native creators.
///
/// ```rust
/// use vparcel::{CodecRegistry, VersionedParcelable};
///
/// #[derive(Debug, Default, PartialEq, VersionedParcelable)]
/// #[parcel(package = "com.example")]
/// struct Point {
///     #[parcel(id = 1)]
///     x: i32,
/// }
///
/// let mut registry = CodecRegistry::new();
/// registry.register_versioned::<Point>();
/// assert!(registry.versioned("com.example.PointParcelizer").is_ok());
/// ```
#[derive(Debug, Default, Clone)]
pub struct CodecRegistry {
    versioned: HashMap<&'static str, VersionedCodec>,
    native: HashMap<&'static str, NativeCodec>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the companion codec of `T` under its identity. A previous codec
    /// with the same identity is replaced.
    pub fn register_versioned<T: VersionedParcelable>(&mut self) -> &mut Self {
        let codec = VersionedCodec {
            identity: T::Parcelizer::NAME,
            type_name: std::any::type_name::<T>(),
            decode: decode_versioned::<T>,
        };
        debug!(identity = codec.identity, ty = codec.type_name, "registered companion codec");
        if let Some(previous) = self.versioned.insert(codec.identity, codec) {
            warn!(
                identity = codec.identity,
                replaced = previous.type_name,
                "companion codec registered twice"
            );
        }
        self
    }

    /// Registers the creator of native type `T`.
    pub fn register_native<T: NativeParcelable>(&mut self) -> &mut Self {
        let codec = NativeCodec {
            creator: T::CREATOR,
            type_name: std::any::type_name::<T>(),
            decode: decode_native::<T>,
        };
        debug!(creator = codec.creator, ty = codec.type_name, "registered native creator");
        if let Some(previous) = self.native.insert(codec.creator, codec) {
            warn!(
                creator = codec.creator,
                replaced = previous.type_name,
                "native creator registered twice"
            );
        }
        self
    }

    /// Looks up a companion codec.
    ///
    /// # Errors
    /// `UnknownCodec` carrying the identity when none is registered.
    pub fn versioned(&self, identity: &str) -> Result<VersionedCodec> {
        self.versioned
            .get(identity)
            .copied()
            .ok_or_else(|| ParcelError::UnknownCodec(identity.to_string()))
    }

    /// Looks up a native creator.
    ///
    /// # Errors
    /// `UnknownCodec` carrying the creator name when none is registered.
    pub fn native(&self, creator: &str) -> Result<NativeCodec> {
        self.native
            .get(creator)
            .copied()
            .ok_or_else(|| ParcelError::UnknownCodec(creator.to_string()))
    }

    /// Number of registered companion codecs.
    pub fn versioned_len(&self) -> usize {
        self.versioned.len()
    }

    /// Number of registered native creators.
    pub fn native_len(&self) -> usize {
        self.native.len()
    }
}
