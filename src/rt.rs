//! Runtime utilities for generated code (Macros).
//! Do not use directly.

use crate::error::Result;
use crate::field::unexpected_null;
use crate::format::TypeTag;
use crate::reader::ParcelReader;
use crate::value::expect_tag;
use crate::versioned::VersionedParcelable;
use crate::writer::ParcelWriter;

/// Writes a versioned struct as a non-null field or element.
pub fn write_versioned<T: VersionedParcelable>(value: &T, parcel: &mut ParcelWriter<'_>) -> Result<()> {
    parcel.write_versioned_object(Some(value))
}

/// Writes an optional versioned struct.
pub fn write_versioned_nullable<T: VersionedParcelable>(
    value: Option<&T>,
    parcel: &mut ParcelWriter<'_>,
) -> Result<()> {
    parcel.write_versioned_object(value)
}

/// Reads a versioned struct that must not be null.
pub fn read_versioned<T: VersionedParcelable>(parcel: &mut ParcelReader<'_>) -> Result<T> {
    parcel
        .read_versioned_object::<T>()?
        .ok_or_else(unexpected_null::<T>)
}

/// Reads an optional versioned struct.
pub fn read_versioned_nullable<T: VersionedParcelable>(parcel: &mut ParcelReader<'_>) -> Result<Option<T>> {
    parcel.read_versioned_object::<T>()
}

/// Reads a versioned struct as a collection element recorded with `tag`.
pub fn read_versioned_element<T: VersionedParcelable>(
    tag: TypeTag,
    parcel: &mut ParcelReader<'_>,
) -> Result<T> {
    expect_tag::<T>(TypeTag::VersionedObject, tag)?;
    read_versioned(parcel)
}
