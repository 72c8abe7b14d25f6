//! # vparcel
//!
//! A versioned, self-describing object serialization protocol. Typed object graphs
//! are written field by field into a byte backend and read back by code that may
//! be older or newer than the producer.
//!
//! ## Overview
//!
//! Every value in a parcel belongs to a numbered field. A reader probes the fields
//! it knows; fields it never asks for are skipped, and fields the producer never
//! wrote resolve to the reader's defaults. That single rule is the compatibility
//! mechanism: schemas evolve by adding fields with new ids and retiring old ids,
//! never by reusing them.
//!
//! ### Key Features
//!
//! *   **Field-indexed scopes:** each field carries its length, so unknown fields
//!     cost a seek, not a decode.
//! *   **Companion codecs:** `#[derive(VersionedParcelable)]` generates a
//!     `<Type>Parcelizer` whose identity, `<package>.<Type>Parcelizer`, is written
//!     ahead of the object's sub-parcel.
//! *   **Polymorphic values:** strings, native objects, versioned objects, serde
//!     values and opaque handles share one tagged collection encoding
//!     ([`ParcelValue`], [`TypeTag`]).
//! *   **Exceptions as data:** a closed set of exception kinds round-trips through
//!     [`ParcelException`]; anything else is handed back, never degraded.
//! *   **Files:** [`VParcel::save`] adds a checksummed header; [`VParcel::load`]
//!     memory-maps the file and validates it before decoding.
//!
//! ## Architecture
//!
//! ```text
//! VParcel / ParcelOptions          facade, configuration, files
//!   └─ versioned / native          companion dispatch, CodecRegistry
//!       └─ value / field           tagged collections, field codecs
//!           └─ ParcelWriter/Reader  field index protocol, sub-parcels
//!               └─ ParcelBackend    primitive codec
//! ```
//!
//! Sub-parcels are closures: [`ParcelWriter::nested`] and [`ParcelReader::nested`]
//! borrow the parent mutably for the lifetime of the child and close the child
//! before returning, so a parent can never be written while a child is open.
//!
//! ## Usage Patterns
//!
//! ### Schema Evolution
//!
//! ```rust
//! use vparcel::{VParcel, VersionedParcelable};
//!
//! #[derive(Debug, Default, VersionedParcelable)]
//! #[parcel(package = "com.example")]
//! struct Profile {
//!     #[parcel(id = 1)]
//!     name: String,
//!     #[parcel(id = 2)]
//!     age: i32,
//! }
//!
//! // A later version of the same type: field 2 retired, field 3 added.
//! mod v2 {
//!     use vparcel::VersionedParcelable;
//!
//!     #[derive(Debug, Default, VersionedParcelable)]
//!     #[parcel(package = "com.example")]
//!     pub struct Profile {
//!         #[parcel(id = 1)]
//!         pub name: String,
//!         #[parcel(id = 3, default = 10)]
//!         pub level: i32,
//!     }
//! }
//!
//! let bytes = VParcel::to_bytes(&Profile { name: "ada".into(), age: 36 }).unwrap();
//! let newer: v2::Profile = VParcel::from_bytes(&bytes).unwrap();
//! assert_eq!(newer.name, "ada");
//! assert_eq!(newer.level, 10);
//! ```
//!
//! ### Manual Fields
//!
//! ```rust
//! use vparcel::VParcel;
//!
//! let bytes = VParcel::write_with(|parcel| {
//!     parcel.write_value(&42i32, 1)?;
//!     parcel.write_value(&Some("hello".to_string()), 2)
//! })
//! .unwrap();
//!
//! let (answer, missing) = VParcel::read_with(&bytes, |parcel| {
//!     Ok((parcel.read_value(0i32, 1)?, parcel.read_value(-1i64, 9)?))
//! })
//! .unwrap();
//! assert_eq!((answer, missing), (42, -1));
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** the only `unsafe` block maps a file for
//!   [`VParcel::load`].
//! * **No Panics:** no `unwrap()` or `panic!()` in the library (enforced by clippy
//!   lints).
//! * **Comprehensive Errors:** all failures are a [`ParcelError`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod error;
pub mod exception;
pub mod field;
pub mod format;
pub mod generic;
pub mod inspector;
pub mod io;
pub mod native;
pub mod reader;
pub mod registry;
pub mod value;
pub mod versioned;
pub mod writer;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

/// Internal re-exports for downstream macros and tooling.
#[doc(hidden)]
pub mod internal {
    pub use bincode;
    pub use serde;
}

// --- RE-EXPORTS ---

pub use api::{ParcelOptions, ParcelOptionsBuilder, VParcel};
pub use error::{ParcelError, Result};
pub use exception::ParcelException;
pub use field::{NullableField, ParcelField, Size, SizeF, SparseBoolArray};
pub use format::{ROOT_FIELD, TypeTag};
pub use generic::{Serialized, SerializedBlob};
pub use inspector::{DebugReport, ParcelInspector};
pub use io::{Handle, MemoryBackend, ParcelBackend, SliceBackend};
pub use native::{NativeObject, NativeParcelable};
pub use reader::ParcelReader;
pub use registry::CodecRegistry;
pub use value::{ListElement, ParcelValue};
pub use versioned::{Parcelizer, VersionedObject, VersionedParcelable, companion_identity};
pub use writer::{ParcelState, ParcelWriter};

// Re-export the derive macro so it is accessible as `vparcel::VersionedParcelable`
pub use vparcel_derive::VersionedParcelable;
