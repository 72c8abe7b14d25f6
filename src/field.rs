//! Field value codecs.
//!
//! [`ParcelField`] is the contract between a generated companion codec and the
//! parcel: one implementation per Rust type that may appear as a field. Types with
//! a null encoding (strings, buffers, arrays, nested objects) implement
//! [`NullableField`], which makes `Option<T>` a field type as well.
//!
//! # Encodings
//!
//! | Rust type | Wire |
//! |---|---|
//! | `bool`, `i32`, `u8` | i32 (`u8` is masked to 8 bits on read) |
//! | `i64`, `f32`, `f64` | fixed width |
//! | `String`, `Vec<u8>` | length-prefixed, -1 = null |
//! | `Vec<bool/char/i32/i64/f32/f64>` | length-prefixed, untagged |
//! | `Vec<T: ListElement>`, `Box<[T]>` | count, type tag, elements |
//! | [`Size`], [`SizeF`] | presence bool, then width and height |
//! | [`SparseBoolArray`] | count, then (key, bool) pairs in key order |
//! | [`Handle`] | presence bool, then token |

use std::any::type_name;
use std::collections::BTreeMap;

use crate::error::{ParcelError, Result};
use crate::format::NULL_LENGTH;
use crate::io::{Handle, length_prefix};
use crate::reader::ParcelReader;
use crate::writer::ParcelWriter;

/// Upper bound on capacity reserved up front from an untrusted length prefix.
const PREALLOC_LIMIT: usize = 4 * 1024;

/// A type that can be written into, and read back from, the payload of a field.
pub trait ParcelField: Sized {
    /// Writes the value at the writer's cursor (inside the current field).
    fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Reads a value from the reader's cursor (inside the current field).
    fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self>;
}

/// A field type whose encoding has a distinguished null.
pub trait NullableField: Sized {
    /// Writes `value`, or the type's null encoding for `None`.
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()>;

    /// Reads a value, returning `None` for the null encoding.
    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>>;
}

impl<T: NullableField> ParcelField for Option<T> {
    fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        T::write_nullable(self.as_ref(), parcel)
    }

    fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
        T::read_nullable(parcel)
    }
}

/// Error for a null read into a non-optional field of type `T`.
pub fn unexpected_null<T>() -> ParcelError {
    ParcelError::Format(format!(
        "Null value for non-optional {}; declare the field as Option",
        type_name::<T>()
    ))
}

/// Reads a collection length prefix: `None` for -1, an error for other negatives.
pub(crate) fn read_length(parcel: &mut ParcelReader<'_>) -> Result<Option<usize>> {
    let len = parcel.read_i32()?;
    if len == NULL_LENGTH {
        return Ok(None);
    }
    usize::try_from(len)
        .map(Some)
        .map_err(|_| ParcelError::Malformed {
            what: "collection length",
            value: i64::from(len),
        })
}

pub(crate) fn with_capacity<T>(len: usize) -> Vec<T> {
    Vec::with_capacity(len.min(PREALLOC_LIMIT))
}

/// Implements `ParcelField` for a `NullableField` type, rejecting null on read.
macro_rules! non_null_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl ParcelField for $t {
                fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
                    <$t as NullableField>::write_nullable(Some(self), parcel)
                }

                fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
                    <$t as NullableField>::read_nullable(parcel)?
                        .ok_or_else(unexpected_null::<$t>)
                }
            }
        )*
    };
}
pub(crate) use non_null_field;

// --- Scalars ---

macro_rules! scalar_field {
    ($($t:ty => $write:ident, $read:ident);* $(;)?) => {
        $(
            impl ParcelField for $t {
                fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
                    parcel.$write(*self)
                }

                fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
                    parcel.$read()
                }
            }
        )*
    };
}

scalar_field! {
    bool => write_bool, read_bool;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl ParcelField for u8 {
    fn write_to(&self, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_i32(i32::from(*self))
    }

    fn read_from(parcel: &mut ParcelReader<'_>) -> Result<Self> {
        Ok((parcel.read_i32()? & 0xFF) as u8)
    }
}

// --- Strings, buffers, handles ---

impl NullableField for String {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_string(value.map(String::as_str))
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_string()
    }
}

impl NullableField for Vec<u8> {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_byte_array(value.map(Vec::as_slice))
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_byte_array()
    }
}

impl NullableField for Handle {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_handle(value.copied())
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_handle()
    }
}

non_null_field!(String, Vec<u8>, Handle);

// --- Fixed-size primitive arrays ---

macro_rules! primitive_array {
    ($($t:ty => |$wp:ident, $wv:ident| $write:expr, |$rp:ident| $read:expr);* $(;)?) => {
        $(
            impl NullableField for Vec<$t> {
                fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
                    let Some(items) = value else {
                        return parcel.write_i32(NULL_LENGTH);
                    };
                    parcel.write_i32(length_prefix(items.len())?)?;
                    for item in items {
                        let ($wp, $wv): (&mut ParcelWriter<'_>, $t) = (&mut *parcel, *item);
                        $write?;
                    }
                    Ok(())
                }

                fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
                    let Some(len) = read_length(parcel)? else {
                        return Ok(None);
                    };
                    let mut items = with_capacity(len);
                    for _ in 0..len {
                        let $rp: &mut ParcelReader<'_> = &mut *parcel;
                        items.push($read?);
                    }
                    Ok(Some(items))
                }
            }

            non_null_field!(Vec<$t>);
        )*
    };
}

primitive_array! {
    bool => |p, v| p.write_i32(i32::from(v)), |p| p.read_i32().map(|v| v != 0);
    char => |p, v| p.write_i32(v as i32), |p| read_char(p);
    i32 => |p, v| p.write_i32(v), |p| p.read_i32();
    i64 => |p, v| p.write_i64(v), |p| p.read_i64();
    f32 => |p, v| p.write_f32(v), |p| p.read_f32();
    f64 => |p, v| p.write_f64(v), |p| p.read_f64();
}

fn read_char(parcel: &mut ParcelReader<'_>) -> Result<char> {
    let raw = parcel.read_i32()?;
    u32::try_from(raw)
        .ok()
        .and_then(char::from_u32)
        .ok_or(ParcelError::Malformed {
            what: "char code point",
            value: i64::from(raw),
        })
}

// --- Sizes ---

/// An integer width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl Size {
    /// Creates a size.
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// A floating-point width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizeF {
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl SizeF {
    /// Creates a size.
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl NullableField for Size {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_bool(value.is_some())?;
        if let Some(size) = value {
            parcel.write_i32(size.width)?;
            parcel.write_i32(size.height)?;
        }
        Ok(())
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        if !parcel.read_bool()? {
            return Ok(None);
        }
        let width = parcel.read_i32()?;
        let height = parcel.read_i32()?;
        Ok(Some(Self { width, height }))
    }
}

impl NullableField for SizeF {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_bool(value.is_some())?;
        if let Some(size) = value {
            parcel.write_f32(size.width)?;
            parcel.write_f32(size.height)?;
        }
        Ok(())
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        if !parcel.read_bool()? {
            return Ok(None);
        }
        let width = parcel.read_f32()?;
        let height = parcel.read_f32()?;
        Ok(Some(Self { width, height }))
    }
}

non_null_field!(Size, SizeF);

// --- Sparse boolean map ---

/// A sparse integer-keyed set of flags, iterated in key order.
pub type SparseBoolArray = BTreeMap<i32, bool>;

impl NullableField for SparseBoolArray {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        let Some(map) = value else {
            return parcel.write_i32(NULL_LENGTH);
        };
        parcel.write_i32(length_prefix(map.len())?)?;
        for (key, flag) in map {
            parcel.write_i32(*key)?;
            parcel.write_bool(*flag)?;
        }
        Ok(())
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        let Some(len) = read_length(parcel)? else {
            return Ok(None);
        };
        let mut map = SparseBoolArray::new();
        for _ in 0..len {
            let key = parcel.read_i32()?;
            let flag = parcel.read_bool()?;
            map.insert(key, flag);
        }
        Ok(Some(map))
    }
}

non_null_field!(SparseBoolArray);
