//! Centralized error handling for vparcel.
//!
//! Every failure in the protocol is reported through [`ParcelError`] and propagated
//! with `?`. Nothing at this layer retries or recovers: once a writer or reader has
//! returned an error, the parcel it belongs to must be discarded.
//!
//! ## Error Categories
//!
//! - **Backend faults** ([`ParcelError::Io`]): the underlying sink/source failed.
//! - **Unsupported values** ([`ParcelError::UnsupportedValueType`]): a value of a
//!   category the requested Rust type cannot hold.
//! - **Unknown companion codecs** ([`ParcelError::UnknownCodec`]): an identity string
//!   that no registered `Parcelizer` answers to.
//! - **Unclassified exceptions** ([`ParcelError::UnclassifiedException`]): an error
//!   handed to the exception codec that has no wire representation. The original
//!   error is carried untouched.
//! - **Malformed streams** ([`ParcelError::Malformed`], [`ParcelError::Format`]):
//!   unexpected tags, codes, lengths or truncated data.
//!
//! ## Usage
//!
//! ```rust
//! use vparcel::{ParcelError, VParcel};
//!
//! match VParcel::read_with(&[0xFF, 0xFF, 0xFF, 0x7F], |parcel| parcel.read_field(1)) {
//!     Ok(found) => println!("field present: {found}"),
//!     Err(ParcelError::Format(msg)) => eprintln!("corrupt parcel: {msg}"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::format::TypeTag;

/// A specialized `Result` type for vparcel operations.
pub type Result<T> = std::result::Result<T, ParcelError>;

/// The master error enum covering all failure domains of the protocol.
///
/// The type is `Clone`: I/O errors and unclassified exceptions are wrapped in `Arc`
/// so an error can be stored or handed to several owners without losing its source.
#[derive(Debug, Clone)]
pub enum ParcelError {
    /// The backend failed to read or write (truncated buffer, full disk, read-only
    /// backend).
    Io(Arc<io::Error>),

    /// A value belongs to a category that the requested type cannot encode or
    /// decode. The string names the offending Rust type.
    UnsupportedValueType(String),

    /// No companion codec answers to the given identity, or the codec that did
    /// answer produced a different type than the one requested.
    UnknownCodec(String),

    /// An error handed to the exception codec that maps to none of the known
    /// exception kinds. Nothing was written; the original error is returned as-is.
    UnclassifiedException(Arc<dyn std::error::Error + Send + Sync>),

    /// A discriminator read from the stream (type tag, exception code, length) has
    /// a value this implementation does not understand.
    Malformed {
        /// What was being decoded, e.g. `"type tag"`.
        what: &'static str,
        /// The offending raw value.
        value: i64,
    },

    /// A collection mixes elements of more than one type tag. Only homogeneous
    /// collections have a defined encoding.
    MixedCollection {
        /// Tag derived from the first element.
        expected: TypeTag,
        /// Tag of the element that broke homogeneity.
        found: TypeTag,
        /// Index of that element.
        index: usize,
    },

    /// The generic (serde) fallback failed. The message starts with the recorded
    /// type name.
    Serialization(String),

    /// The byte layout is invalid: truncated fields, missing close markers, bad
    /// file header or checksum.
    Format(String),

    /// The caller broke the writer/reader protocol (value written outside a field,
    /// duplicate field id, nesting too deep, disabled feature).
    InvalidUsage(String),
}

impl fmt::Display for ParcelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Backend Error: {e}"),
            Self::UnsupportedValueType(s) => write!(f, "Unsupported Value Type: {s}"),
            Self::UnknownCodec(s) => write!(f, "Unknown Companion Codec: {s}"),
            Self::UnclassifiedException(e) => write!(f, "Unclassified Exception: {e}"),
            Self::Malformed { what, value } => write!(f, "Malformed Stream: unexpected {what} {value}"),
            Self::MixedCollection {
                expected,
                found,
                index,
            } => write!(
                f,
                "Mixed Collection: element {index} is {found}, collection is {expected}"
            ),
            Self::Serialization(s) => write!(f, "Serialization Error: {s}"),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::InvalidUsage(s) => write!(f, "Invalid Usage: {s}"),
        }
    }
}

impl std::error::Error for ParcelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::UnclassifiedException(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ParcelError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
