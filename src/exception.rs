//! Exceptions as parcel data.
//!
//! A closed set of exception kinds travels as a small negative code followed by
//! the message:
//!
//! `[ code: i32 ]` where 0 means "no exception", otherwise
//! `[ code ] [ message: string ] [ extra ]`
//!
//! The extra part is the error code for [`ParcelException::ServiceSpecific`] and
//! the embedded native object for [`ParcelException::Native`]; other kinds have
//! none.
//!
//! Errors outside the closed set are never degraded into a generic record:
//! [`ParcelWriter::write_error`] hands them back untouched inside
//! [`ParcelError::UnclassifiedException`].

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::{ParcelError, Result};
use crate::field::{NullableField, ParcelField, non_null_field, unexpected_null};
use crate::native::NativeObject;
use crate::reader::ParcelReader;
use crate::writer::ParcelWriter;

/// Code of [`ParcelException::Security`].
pub const EX_SECURITY: i32 = -1;
/// Code of [`ParcelException::BadParcelable`].
pub const EX_BAD_PARCELABLE: i32 = -2;
/// Code of [`ParcelException::IllegalArgument`].
pub const EX_ILLEGAL_ARGUMENT: i32 = -3;
/// Code of [`ParcelException::NullPointer`].
pub const EX_NULL_POINTER: i32 = -4;
/// Code of [`ParcelException::IllegalState`].
pub const EX_ILLEGAL_STATE: i32 = -5;
/// Code of [`ParcelException::NetworkOnMainThread`].
pub const EX_NETWORK_MAIN_THREAD: i32 = -6;
/// Code of [`ParcelException::UnsupportedOperation`].
pub const EX_UNSUPPORTED_OPERATION: i32 = -7;
/// Code of [`ParcelException::ServiceSpecific`].
pub const EX_SERVICE_SPECIFIC: i32 = -8;
/// Code of [`ParcelException::Native`].
pub const EX_NATIVE: i32 = -9;

/// Written in place of a code when there is no exception.
const EX_NONE: i32 = 0;

/// An exception kind that can be carried through a parcel.
#[derive(Debug, Clone)]
pub enum ParcelException {
    /// A permission check failed.
    Security(Option<String>),
    /// A parcel could not be unmarshalled.
    BadParcelable(Option<String>),
    /// An argument was rejected.
    IllegalArgument(Option<String>),
    /// A required value was missing.
    NullPointer(Option<String>),
    /// The callee was in the wrong state.
    IllegalState(Option<String>),
    /// Network access attempted from a thread that forbids it.
    NetworkOnMainThread(Option<String>),
    /// The operation is not implemented.
    UnsupportedOperation(Option<String>),
    /// A service-defined failure identified by its own error code.
    ServiceSpecific {
        /// The service's error code.
        error_code: i32,
        /// Message, if any.
        message: Option<String>,
    },
    /// An exception that is itself a native object and is carried whole.
    Native {
        /// Message, if any.
        message: Option<String>,
        /// The exception object.
        payload: Arc<dyn NativeObject>,
    },
}

impl ParcelException {
    /// Wire code of this kind.
    pub fn code(&self) -> i32 {
        match self {
            Self::Security(_) => EX_SECURITY,
            Self::BadParcelable(_) => EX_BAD_PARCELABLE,
            Self::IllegalArgument(_) => EX_ILLEGAL_ARGUMENT,
            Self::NullPointer(_) => EX_NULL_POINTER,
            Self::IllegalState(_) => EX_ILLEGAL_STATE,
            Self::NetworkOnMainThread(_) => EX_NETWORK_MAIN_THREAD,
            Self::UnsupportedOperation(_) => EX_UNSUPPORTED_OPERATION,
            Self::ServiceSpecific { .. } => EX_SERVICE_SPECIFIC,
            Self::Native { .. } => EX_NATIVE,
        }
    }

    /// The message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Security(m)
            | Self::BadParcelable(m)
            | Self::IllegalArgument(m)
            | Self::NullPointer(m)
            | Self::IllegalState(m)
            | Self::NetworkOnMainThread(m)
            | Self::UnsupportedOperation(m)
            | Self::ServiceSpecific { message: m, .. }
            | Self::Native { message: m, .. } => m.as_deref(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Security(_) => "SecurityException",
            Self::BadParcelable(_) => "BadParcelableException",
            Self::IllegalArgument(_) => "IllegalArgumentException",
            Self::NullPointer(_) => "NullPointerException",
            Self::IllegalState(_) => "IllegalStateException",
            Self::NetworkOnMainThread(_) => "NetworkOnMainThreadException",
            Self::UnsupportedOperation(_) => "UnsupportedOperationException",
            Self::ServiceSpecific { .. } => "ServiceSpecificException",
            Self::Native { .. } => "NativeException",
        }
    }

    /// Rebuilds the simple kinds from their code. `ServiceSpecific` and `Native`
    /// carry extra data and are built by the reader.
    fn from_code(code: i32, message: Option<String>) -> Option<Self> {
        Some(match code {
            EX_SECURITY => Self::Security(message),
            EX_BAD_PARCELABLE => Self::BadParcelable(message),
            EX_ILLEGAL_ARGUMENT => Self::IllegalArgument(message),
            EX_NULL_POINTER => Self::NullPointer(message),
            EX_ILLEGAL_STATE => Self::IllegalState(message),
            EX_NETWORK_MAIN_THREAD => Self::NetworkOnMainThread(message),
            EX_UNSUPPORTED_OPERATION => Self::UnsupportedOperation(message),
            _ => return None,
        })
    }
}

impl fmt::Display for ParcelException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if let Self::ServiceSpecific { error_code, .. } = self {
            write!(f, "({error_code})")?;
        }
        if let Some(message) = self.message() {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl Error for ParcelException {}

impl ParcelWriter<'_> {
    /// Writes an exception record (or "no exception") at the cursor.
    ///
    /// # Errors
    /// `InvalidUsage` for a native exception when native objects are ignored,
    /// since the record could not be read back.
    pub fn write_exception_record(&mut self, exception: Option<&ParcelException>) -> Result<()> {
        let Some(exception) = exception else {
            return self.write_i32(EX_NONE);
        };
        if matches!(exception, ParcelException::Native { .. }) && self.options().ignore_native_objects() {
            return Err(ParcelError::InvalidUsage(
                "Native exception cannot be written while native objects are ignored".into(),
            ));
        }

        self.write_i32(exception.code())?;
        self.write_string(exception.message())?;
        match exception {
            ParcelException::ServiceSpecific { error_code, .. } => self.write_i32(*error_code),
            ParcelException::Native { payload, .. } => self.write_dyn_native(Some(&**payload)),
            _ => Ok(()),
        }
    }

    /// Writes `exception` as field `field_id`; `None` records "no exception".
    pub fn write_exception(&mut self, exception: Option<&ParcelException>, field_id: u32) -> Result<()> {
        self.set_output_field(field_id)?;
        self.write_exception_record(exception)
    }

    /// Writes an arbitrary error as field `field_id`.
    ///
    /// # Errors
    /// If `error` is not a [`ParcelException`], nothing is written (the field is
    /// not even opened) and the error comes back unchanged as
    /// `ParcelError::UnclassifiedException`.
    pub fn write_error(&mut self, error: Box<dyn Error + Send + Sync>, field_id: u32) -> Result<()> {
        match error.downcast::<ParcelException>() {
            Ok(exception) => self.write_exception(Some(&*exception), field_id),
            Err(original) => Err(ParcelError::UnclassifiedException(Arc::from(original))),
        }
    }
}

impl ParcelReader<'_> {
    /// Reads an exception record at the cursor.
    ///
    /// # Errors
    /// `Malformed` for a code outside the known set.
    pub fn read_exception_record(&mut self) -> Result<Option<ParcelException>> {
        let code = self.read_i32()?;
        if code == EX_NONE {
            return Ok(None);
        }
        let message = self.read_string()?;
        let exception = match code {
            EX_SERVICE_SPECIFIC => ParcelException::ServiceSpecific {
                error_code: self.read_i32()?,
                message,
            },
            EX_NATIVE => {
                let payload = self.read_dyn_native()?.ok_or_else(|| {
                    ParcelError::Format("Native exception record has no payload".into())
                })?;
                ParcelException::Native { message, payload }
            }
            other => ParcelException::from_code(other, message).ok_or(ParcelError::Malformed {
                what: "exception code",
                value: i64::from(other),
            })?,
        };
        Ok(Some(exception))
    }

    /// Reads the exception in field `field_id`. A missing field or a "no
    /// exception" record yields `default`.
    pub fn read_exception(
        &mut self,
        default: Option<ParcelException>,
        field_id: u32,
    ) -> Result<Option<ParcelException>> {
        if !self.read_field(field_id)? {
            return Ok(default);
        }
        Ok(self.read_exception_record()?.or(default))
    }
}

impl NullableField for ParcelException {
    fn write_nullable(value: Option<&Self>, parcel: &mut ParcelWriter<'_>) -> Result<()> {
        parcel.write_exception_record(value)
    }

    fn read_nullable(parcel: &mut ParcelReader<'_>) -> Result<Option<Self>> {
        parcel.read_exception_record()
    }
}

non_null_field!(ParcelException);
