//! Versioned objects and their companion codecs.
//!
//! A versioned object is a type whose fields are written by a companion
//! [`Parcelizer`], normally generated by `#[derive(VersionedParcelable)]`. On the
//! wire the object is its companion's identity string followed by a sub-parcel
//! holding the fields:
//!
//! `[ "<package>.<Type>Parcelizer" ] [ field ... SCOPE_END ]`
//!
//! Reads resolve the companion statically when the caller names the type, and
//! through the [`CodecRegistry`](crate::CodecRegistry) otherwise.

use std::any::{Any, type_name};
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{ParcelError, Result};
use crate::reader::ParcelReader;
use crate::writer::ParcelWriter;

/// The companion codec of a versioned type `T`.
pub trait Parcelizer<T> {
    /// Companion identity, `<package>.<Type>Parcelizer`.
    const NAME: &'static str;

    /// Writes the fields of `value` into its sub-parcel.
    fn write(value: &T, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Rebuilds a value from its sub-parcel, defaulting fields that are absent.
    fn read(parcel: &mut ParcelReader<'_>) -> Result<T>;
}

/// A type with a companion codec.
pub trait VersionedParcelable: Any + Debug + Send + Sync + Sized {
    /// The companion codec.
    type Parcelizer: Parcelizer<Self>;
}

/// Object-safe view of a [`VersionedParcelable`], used for values whose concrete
/// type is only known at runtime.
pub trait VersionedObject: Any + Debug + Send + Sync {
    /// Identity of the companion codec.
    fn parcelizer_name(&self) -> &'static str;

    /// Writes the object's fields through its companion.
    fn write_fields(&self, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting an owned box.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Upcast for downcasting a shared pointer.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: VersionedParcelable> VersionedObject for T {
    fn parcelizer_name(&self) -> &'static str {
        T::Parcelizer::NAME
    }

    fn write_fields(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        T::Parcelizer::write(self, parcel)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl dyn VersionedObject {
    /// Returns the object as `T` if that is its concrete type.
    pub fn downcast_ref<T: VersionedParcelable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Returns the companion identity of `T`.
pub fn companion_identity<T: VersionedParcelable>() -> &'static str {
    T::Parcelizer::NAME
}

fn check_identity(identity: &str) -> Result<()> {
    if identity.is_empty() {
        return Err(ParcelError::UnknownCodec(
            "Companion identity is empty; the type was not compiled with versioning support"
                .into(),
        ));
    }
    Ok(())
}

impl ParcelWriter<'_> {
    /// Writes a versioned object (or its null) at the cursor.
    ///
    /// # Errors
    /// `UnknownCodec` if the companion identity is empty.
    pub fn write_versioned_object<T: VersionedParcelable>(&mut self, value: Option<&T>) -> Result<()> {
        match value {
            None => self.write_string(None),
            Some(object) => {
                check_identity(T::Parcelizer::NAME)?;
                self.write_string(Some(T::Parcelizer::NAME))?;
                self.nested(|sub| T::Parcelizer::write(object, sub))
            }
        }
    }

    /// Writes a versioned object whose concrete type is only known at runtime.
    pub fn write_dyn_versioned(&mut self, value: Option<&dyn VersionedObject>) -> Result<()> {
        match value {
            None => self.write_string(None),
            Some(object) => {
                let identity = object.parcelizer_name();
                check_identity(identity)?;
                self.write_string(Some(identity))?;
                self.nested(|sub| object.write_fields(sub))
            }
        }
    }
}

impl ParcelReader<'_> {
    /// Reads a versioned object of type `T` at the cursor.
    ///
    /// When the stored identity is not `T`'s own companion, the registry resolves
    /// it; the decoded object must then still be a `T`.
    ///
    /// # Errors
    /// `UnknownCodec` if the identity is unregistered or decodes to another type.
    pub fn read_versioned_object<T: VersionedParcelable>(&mut self) -> Result<Option<T>> {
        let Some(identity) = self.read_string()? else {
            return Ok(None);
        };
        if identity == T::Parcelizer::NAME {
            return self.nested(|sub| T::Parcelizer::read(sub)).map(Some);
        }

        let codec = self.registry().versioned(&identity)?;
        let object = self.nested(|sub| codec.decode(sub))?;
        object
            .into_any()
            .downcast::<T>()
            .map(|object| Some(*object))
            .map_err(|_| {
                ParcelError::UnknownCodec(format!(
                    "{identity} does not decode to {}",
                    type_name::<T>()
                ))
            })
    }

    /// Reads a versioned object of any registered type.
    ///
    /// # Errors
    /// `UnknownCodec` if the identity is not registered.
    pub fn read_dyn_versioned(&mut self) -> Result<Option<Arc<dyn VersionedObject>>> {
        let Some(identity) = self.read_string()? else {
            return Ok(None);
        };
        let codec = self.registry().versioned(&identity)?;
        let object = self.nested(|sub| codec.decode(sub))?;
        Ok(Some(Arc::from(object)))
    }
}
