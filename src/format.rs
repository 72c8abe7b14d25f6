//! Defines the physical binary layout of vparcel streams and files.
//!
//! # Scope Layout
//! A scope (the root parcel or one nested sub-parcel) is a sequence of fields
//! terminated by a close marker:
//!
//! `[Field] [Field] ... [SCOPE_END]`
//!
//! ## Field Anatomy
//! `[ field_id: i32 ] [ payload_len: i32 ] [ payload ]`
//!
//! The length lets a reader skip fields it never asks for, which is what makes old
//! readers tolerate new producers.
//!
//! ## Sub-object Anatomy
//! Inside a field payload, a versioned object is written as
//! `[ identity: string ] [ nested scope ... SCOPE_END ]`, or as a single null string.
//!
//! ## Collection Anatomy
//! `[ count: i32 | -1 ] [ type_tag: i32 ] [ element ] * count`. The tag is present
//! only when `count > 0`.
//!
//! # File Layout
//! Files produced by [`crate::VParcel::save`] prefix the root scope with a
//! [`FileHeader`]:
//!
//! `[ Magic(4) ] [ Version(2) ] [ Flags(2) ] [ PayloadLen(8) ] [ Checksum(8) ] [ Root Scope ]`

use std::fmt;
use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::error::{ParcelError, Result};

/// Magic bytes identifying a parcel file: "VPCL".
pub const MAGIC_BYTES: [u8; 4] = *b"VPCL";

/// Current file format version.
pub const FORMAT_VERSION: u16 = 1;

/// Magic(4) + Version(2) + Flags(2) + PayloadLen(8) + Checksum(8) = 24
pub const FILE_HEADER_SIZE: usize = 24;

/// Length prefix that encodes a null string, byte buffer or collection.
pub const NULL_LENGTH: i32 = -1;

/// Marker closing a scope. Field ids are never negative, so it cannot collide.
pub const SCOPE_END: i32 = -1;

/// Size of a field header: id(4) + length(4).
pub const FIELD_HEADER_SIZE: usize = 8;

/// Field id under which the facade stores the root object.
pub const ROOT_FIELD: u32 = 0;

/// Suffix appended to a type name to form its companion codec identity.
pub const COMPANION_SUFFIX: &str = "Parcelizer";

/// Wire category of a polymorphic value.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// An object with a companion `Parcelizer`.
    VersionedObject = 1,
    /// A platform-native object that flattens itself positionally.
    NativeObject = 2,
    /// An object encoded through the generic serde fallback.
    Serializable = 3,
    /// A UTF-8 string.
    Text = 4,
    /// An opaque handle.
    Handle = 5,
}

impl TypeTag {
    /// Returns the wire discriminator.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decodes a wire discriminator.
    ///
    /// # Errors
    /// Returns `ParcelError::Malformed` for values outside 1..=5.
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::VersionedObject),
            2 => Ok(Self::NativeObject),
            3 => Ok(Self::Serializable),
            4 => Ok(Self::Text),
            5 => Ok(Self::Handle),
            other => Err(ParcelError::Malformed {
                what: "type tag",
                value: i64::from(other),
            }),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VersionedObject => "versioned-object",
            Self::NativeObject => "native-object",
            Self::Serializable => "serializable",
            Self::Text => "string",
            Self::Handle => "handle",
        };
        write!(f, "{name}({})", self.as_i32())
    }
}

/// Computes the payload checksum stored in the file header.
pub fn checksum(payload: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(payload);
    hasher.finish()
}

/// The header at the start of a parcel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Always [`MAGIC_BYTES`].
    pub magic: [u8; 4],
    /// Format version, see [`FORMAT_VERSION`].
    pub version: u16,
    /// Reserved, written as zero.
    pub flags: u16,
    /// Length of the root scope that follows the header.
    pub payload_len: u64,
    /// xxHash64 of the root scope bytes.
    pub checksum: u64,
}

impl FileHeader {
    /// Creates the header describing `payload`.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: MAGIC_BYTES,
            version: FORMAT_VERSION,
            flags: 0,
            payload_len: payload.len() as u64,
            checksum: checksum(payload),
        }
    }

    /// Serializes the header (Little Endian).
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parses and validates a header from the start of `bytes`.
    ///
    /// # Errors
    /// Returns `ParcelError::Format` on short input, wrong magic or an unsupported
    /// version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..FILE_HEADER_SIZE)
            .ok_or_else(|| ParcelError::Format("File smaller than header".into()))?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        if magic != MAGIC_BYTES {
            return Err(ParcelError::Format("Invalid Magic Bytes".into()));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != FORMAT_VERSION {
            return Err(ParcelError::Format(format!(
                "Unsupported version: {version}"
            )));
        }

        let flags = u16::from_le_bytes([header[6], header[7]]);
        let mut payload_len = [0u8; 8];
        payload_len.copy_from_slice(&header[8..16]);
        let mut checksum = [0u8; 8];
        checksum.copy_from_slice(&header[16..24]);

        Ok(Self {
            magic,
            version,
            flags,
            payload_len: u64::from_le_bytes(payload_len),
            checksum: u64::from_le_bytes(checksum),
        })
    }

    /// Checks that `payload` is the one this header describes.
    ///
    /// # Errors
    /// Returns `ParcelError::Format` on a length or checksum mismatch.
    pub fn verify(&self, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 != self.payload_len {
            return Err(ParcelError::Format(format!(
                "Payload length {} does not match header ({})",
                payload.len(),
                self.payload_len
            )));
        }
        let actual = checksum(payload);
        if actual != self.checksum {
            return Err(ParcelError::Format(format!(
                "Checksum mismatch: header {:#018x}, payload {actual:#018x}",
                self.checksum
            )));
        }
        Ok(())
    }
}
