//! Polymorphic values and tagged collections.
//!
//! Every collection element belongs to one wire category, its [`TypeTag`]. A list
//! or array records the tag of its first element once and encodes all elements
//! through that category's codec:
//!
//! | Tag | Element encoding |
//! |---|---|
//! | VersionedObject | identity string, sub-parcel |
//! | NativeObject | creator string, flat contents |
//! | Serializable | type name, byte buffer |
//! | Text | string |
//! | Handle | presence flag, token |
//!
//! Collections must be homogeneous. The writer checks every element against the
//! first and refuses mixed input with `ParcelError::MixedCollection` before any
//! byte of the collection is written.

use std::any::type_name;
use std::sync::Arc;

use crate::error::{ParcelError, Result};
use crate::field::{NullableField, ParcelField, read_length, unexpected_null, with_capacity};
use crate::format::{NULL_LENGTH, TypeTag};
use crate::generic::SerializedBlob;
use crate::io::{Handle, length_prefix};
use crate::native::NativeObject;
use crate::reader::ParcelReader;
use crate::versioned::VersionedObject;
use crate::writer::ParcelWriter;

/// A type that can be an element of a tagged list or array.
pub trait ListElement: Sized {
    /// Wire category of this element.
    fn type_tag(&self) -> TypeTag;

    /// Writes the element through its category's codec.
    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Reads one element of a collection recorded with `tag`.
    ///
    /// # Errors
    /// `UnsupportedValueType` if this type cannot hold elements of `tag`.
    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self>;
}

/// Fails unless `found` is the category `T` is read from.
pub fn expect_tag<T>(expected: TypeTag, found: TypeTag) -> Result<()> {
    if expected != found {
        return Err(ParcelError::UnsupportedValueType(format!(
            "{} cannot be read from {found} elements",
            type_name::<T>()
        )));
    }
    Ok(())
}

/// A value of any wire category.
#[derive(Debug, Clone)]
pub enum ParcelValue {
    /// An object with a registered companion codec.
    Versioned(Arc<dyn VersionedObject>),
    /// A platform-native object with a registered creator.
    Native(Arc<dyn NativeObject>),
    /// An opaque generic payload.
    Serialized(SerializedBlob),
    /// A string.
    Text(String),
    /// An opaque handle.
    Handle(Handle),
}

impl TypeTag {
    /// Classifies a value.
    ///
    /// Categories are checked in the order text, native, versioned, serializable,
    /// handle, so the first rule a value satisfies decides its encoding.
    pub fn of(value: &ParcelValue) -> Self {
        match value {
            ParcelValue::Text(_) => Self::Text,
            ParcelValue::Native(_) => Self::NativeObject,
            ParcelValue::Versioned(_) => Self::VersionedObject,
            ParcelValue::Serialized(_) => Self::Serializable,
            ParcelValue::Handle(_) => Self::Handle,
        }
    }
}

impl ParcelValue {
    /// Wire category of this value.
    pub fn type_tag(&self) -> TypeTag {
        TypeTag::of(self)
    }

    /// Returns the text, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the handle, if this is a `Handle` value.
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Self::Handle(handle) => Some(*handle),
            _ => None,
        }
    }
}

impl From<String> for ParcelValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ParcelValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Handle> for ParcelValue {
    fn from(value: Handle) -> Self {
        Self::Handle(value)
    }
}

impl From<SerializedBlob> for ParcelValue {
    fn from(value: SerializedBlob) -> Self {
        Self::Serialized(value)
    }
}

impl From<Arc<dyn VersionedObject>> for ParcelValue {
    fn from(value: Arc<dyn VersionedObject>) -> Self {
        Self::Versioned(value)
    }
}

impl From<Arc<dyn NativeObject>> for ParcelValue {
    fn from(value: Arc<dyn NativeObject>) -> Self {
        Self::Native(value)
    }
}

impl ListElement for ParcelValue {
    fn type_tag(&self) -> TypeTag {
        TypeTag::of(self)
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        match self {
            Self::Versioned(object) => object.write_element(parcel),
            Self::Native(object) => object.write_element(parcel),
            Self::Serialized(blob) => blob.write_element(parcel),
            Self::Text(text) => text.write_element(parcel),
            Self::Handle(handle) => handle.write_element(parcel),
        }
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        Ok(match tag {
            TypeTag::VersionedObject => Self::Versioned(ListElement::read_element(tag, parcel)?),
            TypeTag::NativeObject => Self::Native(ListElement::read_element(tag, parcel)?),
            TypeTag::Serializable => Self::Serialized(ListElement::read_element(tag, parcel)?),
            TypeTag::Text => Self::Text(ListElement::read_element(tag, parcel)?),
            TypeTag::Handle => Self::Handle(ListElement::read_element(tag, parcel)?),
        })
    }
}

impl ListElement for String {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Text
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_string(Some(self.as_str()))
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        expect_tag::<Self>(TypeTag::Text, tag)?;
        parcel.read_string()?.ok_or_else(unexpected_null::<Self>)
    }
}

impl ListElement for Handle {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Handle
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_handle(Some(*self))
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        expect_tag::<Self>(TypeTag::Handle, tag)?;
        parcel.read_handle()?.ok_or_else(unexpected_null::<Self>)
    }
}

impl ListElement for SerializedBlob {
    fn type_tag(&self) -> TypeTag {
        TypeTag::Serializable
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_blob(Some(self))
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        expect_tag::<Self>(TypeTag::Serializable, tag)?;
        parcel.read_blob()?.ok_or_else(unexpected_null::<Self>)
    }
}

impl ListElement for Arc<dyn VersionedObject> {
    fn type_tag(&self) -> TypeTag {
        TypeTag::VersionedObject
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_dyn_versioned(Some(&**self))
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        expect_tag::<Self>(TypeTag::VersionedObject, tag)?;
        parcel.read_dyn_versioned()?.ok_or_else(unexpected_null::<Self>)
    }
}

impl ListElement for Arc<dyn NativeObject> {
    fn type_tag(&self) -> TypeTag {
        TypeTag::NativeObject
    }

    fn write_element(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_dyn_native(Some(&**self))
    }

    fn read_element(tag: TypeTag, parcel: &mut ParcelReader<'_>) -> Result<Self> {
        expect_tag::<Self>(TypeTag::NativeObject, tag)?;
        parcel.read_dyn_native()?.ok_or_else(unexpected_null::<Self>)
    }
}

impl ParcelWriter<'_> {
    /// Writes a tagged list at the cursor. `None` is written as the null count.
    ///
    /// # Errors
    /// `MixedCollection` if an element's tag differs from the first element's;
    /// `InvalidUsage` for native elements while native objects are ignored, since
    /// a list element cannot be null. Nothing is written in either case.
    pub fn write_list<T: ListElement>(&mut self, items: Option<&[T]>) -> Result<()> {
        let Some(items) = items else {
            return self.write_i32(NULL_LENGTH);
        };
        let tag = match items.first() {
            None => return self.write_i32(0),
            Some(first) => first.type_tag(),
        };
        for (index, item) in items.iter().enumerate().skip(1) {
            let found = item.type_tag();
            if found != tag {
                return Err(ParcelError::MixedCollection {
                    expected: tag,
                    found,
                    index,
                });
            }
        }
        if tag == TypeTag::NativeObject && self.options().ignore_native_objects() {
            return Err(ParcelError::InvalidUsage(
                "Native list elements cannot be written while native objects are ignored".into(),
            ));
        }

        self.write_i32(length_prefix(items.len())?)?;
        self.write_i32(tag.as_i32())?;
        for item in items {
            item.write_element(self)?;
        }
        Ok(())
    }

    /// Writes a tagged array at the cursor; same encoding as a list.
    pub fn write_array<T: ListElement>(&mut self, items: Option<&[T]>) -> Result<()> {
        self.write_list(items)
    }
}

impl ParcelReader<'_> {
    /// Reads a tagged list at the cursor.
    pub fn read_list<T: ListElement>(&mut self) -> Result<Option<Vec<T>>> {
        let Some(len) = read_length(self)? else {
            return Ok(None);
        };
        let mut items = with_capacity(len);
        if len == 0 {
            return Ok(Some(items));
        }
        let tag = TypeTag::from_i32(self.read_i32()?)?;
        for _ in 0..len {
            items.push(T::read_element(tag, self)?);
        }
        Ok(Some(items))
    }

    /// Reads a tagged array at the cursor.
    pub fn read_array<T: ListElement>(&mut self) -> Result<Option<Box<[T]>>> {
        Ok(self.read_list()?.map(Vec::into_boxed_slice))
    }
}

impl<T: ListElement> NullableField for Vec<T> {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_list(value.map(Vec::as_slice))
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_list()
    }
}

impl<T: ListElement> ParcelField for Vec<T> {
    fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_list(Some(self.as_slice()))
    }

    fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
        parcel.read_list()?.ok_or_else(unexpected_null::<Self>)
    }
}

impl<T: ListElement> NullableField for Box<[T]> {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_array(value.map(|items| &items[..]))
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_array()
    }
}

impl<T: ListElement> ParcelField for Box<[T]> {
    fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_array(Some(&self[..]))
    }

    fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
        parcel.read_array()?.ok_or_else(unexpected_null::<Self>)
    }
}
