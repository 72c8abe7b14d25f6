//! The generic-object fallback.
//!
//! Values that are neither versioned nor native objects can still travel through a
//! parcel if they implement serde's traits. They are written as their Rust type
//! name followed by a byte buffer holding the bincode encoding:
//!
//! `[ type_name: string ] [ payload: byte buffer ]`
//!
//! This path carries no field index, so it is not schema-tolerant: producer and
//! consumer must agree on the type's serde layout.

use std::any::type_name;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ParcelError, Result};
use crate::field::{NullableField, ParcelField, non_null_field, unexpected_null};
use crate::format::TypeTag;
use crate::reader::ParcelReader;
use crate::value::ListElement;
use crate::writer::ParcelWriter;

/// A serialized value together with the name of the type that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerializedBlob {
    type_name: String,
    bytes: Vec<u8>,
}

impl SerializedBlob {
    /// Serializes `value` with the standard bincode configuration.
    ///
    /// # Errors
    /// `Serialization`, prefixed with the type name.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        let name = type_name::<T>();
        let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| ParcelError::Serialization(format!("{name}: {e}")))?;
        Ok(Self {
            type_name: name.to_string(),
            bytes,
        })
    }

    /// Wraps an already-encoded payload.
    pub fn from_parts(type_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            bytes,
        }
    }

    /// Decodes the payload as `T`.
    ///
    /// # Errors
    /// `Serialization` if the recorded type name is not `T`'s, the payload does
    /// not decode, or bytes are left over.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let expected = type_name::<T>();
        if self.type_name != expected {
            return Err(ParcelError::Serialization(format!(
                "{}: recorded type does not match requested {expected}",
                self.type_name
            )));
        }
        let (value, consumed) =
            bincode::serde::decode_from_slice::<T, _>(&self.bytes, bincode::config::standard())
                .map_err(|e| ParcelError::Serialization(format!("{}: {e}", self.type_name)))?;
        if consumed != self.bytes.len() {
            return Err(ParcelError::Serialization(format!(
                "{}: {} trailing bytes",
                self.type_name,
                self.bytes.len() - consumed
            )));
        }
        Ok(value)
    }

    /// Name of the type the payload was produced from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The encoded payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Carries a serde value as a parcel field or collection element.
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use vparcel::{Serialized, VParcel};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Legacy {
///     name: String,
/// }
///
/// let bytes = VParcel::write_with(|parcel| {
///     parcel.write_value(&Serialized(Legacy { name: "old".into() }), 3)
/// })
/// .unwrap();
/// let back: Serialized<Legacy> = VParcel::read_with(&bytes, |parcel| {
///     parcel.read_value_or_else(3, || Serialized(Legacy { name: String::new() }))
/// })
/// .unwrap();
/// assert_eq!(back.0.name, "old");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Serialized<T>(pub T);

impl<T> Serialized<T> {
    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> NullableField for Serialized<T> {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_serializable(value.map(|wrapped| &wrapped.0))
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        Ok(parcel.read_serializable::<T>()?.map(Serialized))
    }
}

impl<T: Serialize + DeserializeOwned> ParcelField for Serialized<T> {
    fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        Self::write_nullable(Some(self), parcel)
    }

    fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
        Self::read_nullable(parcel)?.ok_or_else(unexpected_null::<Self>)
    }
}

impl<T: Serialize + DeserializeOwned> ListElement for Serialized<T> {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Serializable
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        self.write_to(parcel)
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        crate::value::expect_tag::<Self>(TypeTag::Serializable, tag)?;
        Self::read_from(parcel)
    }
}

impl NullableField for SerializedBlob {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_blob(value)
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_blob()
    }
}

non_null_field!(SerializedBlob);

impl ParcelWriter<'_> {
    /// Writes `value` through the generic fallback.
    ///
    /// # Errors
    /// `InvalidUsage` when serialization is disabled in the options;
    /// `Serialization` if encoding fails.
    pub fn write_serializable<T: Serialize>(&mut self, value: Option<&T>) -> Result<()> {
        match value {
            None => self.write_string(None),
            Some(value) => {
                let blob = SerializedBlob::encode(value)?;
                self.write_blob(Some(&blob))
            }
        }
    }

    /// Writes an already-encoded generic value.
    pub fn write_blob(&mut self, blob: Option<&SerializedBlob>) -> Result<()> {
        let Some(blob) = blob else {
            return self.write_string(None);
        };
        if !self.options().allow_serialization() {
            return Err(ParcelError::InvalidUsage(format!(
                "Serialization is disabled; cannot write {}",
                blob.type_name
            )));
        }
        self.write_string(Some(&blob.type_name))?;
        self.write_byte_array(Some(&blob.bytes))
    }
}

impl ParcelReader<'_> {
    /// Reads a generic value and decodes it as `T`.
    pub fn read_serializable<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.read_blob()? {
            None => Ok(None),
            Some(blob) => blob.decode().map(Some),
        }
    }

    /// Reads a generic value without decoding it.
    ///
    /// # Errors
    /// `Serialization` if a type name is present but its payload is null.
    pub fn read_blob(&mut self) -> Result<Option<SerializedBlob>> {
        let Some(type_name) = self.read_string()? else {
            return Ok(None);
        };
        let bytes = self.read_byte_array()?.ok_or_else(|| {
            ParcelError::Serialization(format!("{type_name}: payload is missing"))
        })?;
        Ok(Some(SerializedBlob { type_name, bytes }))
    }
}
