//! Platform-native objects.
//!
//! A native object flattens itself positionally into the current field, after a
//! creator string that names the factory able to rebuild it. Unlike versioned
//! objects there is no sub-parcel and no field index: reader and writer must agree
//! on the exact layout.

use std::any::{Any, type_name};
use std::fmt::Debug;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ParcelError, Result};
use crate::reader::ParcelReader;
use crate::writer::ParcelWriter;

/// A type that writes itself flat into a parcel.
pub trait NativeParcelable: Any + Debug + Send + Sync + Sized {
    /// Name of the factory that rebuilds this type. Registered creators are looked
    /// up by this string.
    const CREATOR: &'static str;

    /// Writes the object's contents at the cursor.
    fn write_to_parcel(&self, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Rebuilds the object from the cursor.
    fn create_from_parcel(parcel: &mut ParcelReader<'_>) -> Result<Self>;
}

/// Object-safe view of a [`NativeParcelable`].
pub trait NativeObject: Any + Debug + Send + Sync {
    /// Creator name written ahead of the contents.
    fn creator(&self) -> &'static str;

    /// Writes the object's contents.
    fn write_contents(&self, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting an owned box.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: NativeParcelable> NativeObject for T {
    fn creator(&self) -> &'static str {
        T::CREATOR
    }

    fn write_contents(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        self.write_to_parcel(parcel)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn NativeObject {
    /// Returns the object as `T` if that is its concrete type.
    pub fn downcast_ref<T: NativeParcelable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl ParcelWriter<'_> {
    /// Writes a native object (or its null) at the cursor.
    ///
    /// With `ignore_native_objects` set, a null is written in place of the object.
    pub fn write_native_object<T: NativeParcelable>(&mut self, value: Option<&T>) -> Result<()> {
        self.write_dyn_native(value.map(|object| object as &dyn NativeObject))
    }

    /// Writes a native object whose concrete type is only known at runtime.
    pub fn write_dyn_native(&mut self, value: Option<&dyn NativeObject>) -> Result<()> {
        let Some(object) = value else {
            return self.write_string(None);
        };
        if self.options().ignore_native_objects() {
            debug!(creator = object.creator(), "native object dropped");
            return self.write_string(None);
        }
        self.write_string(Some(object.creator()))?;
        object.write_contents(self)
    }
}

impl ParcelReader<'_> {
    /// Reads a native object of type `T` at the cursor.
    ///
    /// # Errors
    /// `UnknownCodec` if the stored creator belongs to another type and is not
    /// registered, or rebuilds something other than a `T`.
    pub fn read_native_object<T: NativeParcelable>(&mut self) -> Result<Option<T>> {
        let Some(creator) = self.read_string()? else {
            return Ok(None);
        };
        if creator == T::CREATOR {
            return T::create_from_parcel(self).map(Some);
        }
        let codec = self.registry().native(&creator)?;
        codec
            .decode(self)?
            .into_any()
            .downcast::<T>()
            .map(|object| Some(*object))
            .map_err(|_| {
                ParcelError::UnknownCodec(format!(
                    "{creator} does not create {}",
                    type_name::<T>()
                ))
            })
    }

    /// Reads a native object through its registered creator.
    pub fn read_dyn_native(&mut self) -> Result<Option<Arc<dyn NativeObject>>> {
        let Some(creator) = self.read_string()? else {
            return Ok(None);
        };
        let codec = self.registry().native(&creator)?;
        Ok(Some(Arc::from(codec.decode(self)?)))
    }
}
