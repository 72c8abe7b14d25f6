#![allow(missing_docs)]

use std::error::Error;
use std::sync::Arc;

use vparcel::exception::{EX_ILLEGAL_STATE, EX_NATIVE, EX_SERVICE_SPECIFIC};
use vparcel::{
    CodecRegistry, NativeParcelable, ParcelError, ParcelException, ParcelOptions, ParcelReader,
    ParcelWriter, VParcel,
};

#[derive(Debug, PartialEq)]
struct RemoteFault {
    code: i32,
    detail: String,
}

impl NativeParcelable for RemoteFault {
    const CREATOR: &'static str = "test.exceptions.RemoteFault";

    fn write_to_parcel(&self, parcel: &mut ParcelWriter<'_>) -> vparcel::Result<()> {
        parcel.write_i32(self.code)?;
        parcel.write_string(Some(&self.detail))
    }

    fn create_from_parcel(parcel: &mut ParcelReader<'_>) -> vparcel::Result<Self> {
        Ok(Self {
            code: parcel.read_i32()?,
            detail: parcel.read_string()?.unwrap_or_default(),
        })
    }
}

fn options_with_fault() -> ParcelOptions {
    let mut registry = CodecRegistry::new();
    registry.register_native::<RemoteFault>();
    VParcel::builder().registry(registry).build()
}

fn all_kinds() -> Vec<ParcelException> {
    let msg = |s: &str| Some(s.to_string());
    vec![
        ParcelException::Security(msg("denied")),
        ParcelException::BadParcelable(msg("bad")),
        ParcelException::IllegalArgument(msg("arg")),
        ParcelException::NullPointer(None),
        ParcelException::IllegalState(msg("state")),
        ParcelException::NetworkOnMainThread(msg("main thread")),
        ParcelException::UnsupportedOperation(msg("nope")),
        ParcelException::ServiceSpecific {
            error_code: 404,
            message: msg("missing"),
        },
        ParcelException::Native {
            message: msg("remote"),
            payload: Arc::new(RemoteFault {
                code: 7,
                detail: "stack".into(),
            }),
        },
    ]
}

#[test]
fn test_every_kind_round_trips() -> vparcel::Result<()> {
    let options = options_with_fault();
    let kinds = all_kinds();

    let bytes = options.write_with(|parcel| {
        for (i, exception) in kinds.iter().enumerate() {
            parcel.write_exception(Some(exception), i as u32 + 1)?;
        }
        Ok(())
    })?;

    let back = options.read_with(&bytes, |parcel| {
        let mut out = Vec::new();
        for i in 0..kinds.len() {
            out.push(parcel.read_exception(None, i as u32 + 1)?);
        }
        Ok(out)
    })?;

    for (expected, actual) in kinds.iter().zip(back) {
        let actual = actual.unwrap();
        assert_eq!(actual.code(), expected.code());
        assert_eq!(actual.message(), expected.message());
    }
    Ok(())
}

#[test]
fn test_codes_are_stable() {
    let codes: Vec<i32> = all_kinds().iter().map(ParcelException::code).collect();
    assert_eq!(codes, vec![-1, -2, -3, -4, -5, -6, -7, -8, -9]);
}

#[test]
fn test_record_layout() -> vparcel::Result<()> {
    let exception = ParcelException::IllegalState(Some("boom".into()));
    let bytes = VParcel::write_with(|parcel| parcel.write_exception(Some(&exception), 1))?;

    let mut expected = Vec::new();
    expected.extend_from_slice(&1i32.to_le_bytes());
    expected.extend_from_slice(&12i32.to_le_bytes());
    expected.extend_from_slice(&EX_ILLEGAL_STATE.to_le_bytes());
    expected.extend_from_slice(&4i32.to_le_bytes());
    expected.extend_from_slice(b"boom");
    expected.extend_from_slice(&(-1i32).to_le_bytes());
    assert_eq!(bytes, expected);
    Ok(())
}

#[test]
fn test_service_specific_keeps_error_code() -> vparcel::Result<()> {
    let exception = ParcelException::ServiceSpecific {
        error_code: -12,
        message: None,
    };
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&exception, 2))?;
    let back = VParcel::read_with(&bytes, |parcel| parcel.read_value(None::<ParcelException>, 2))?;

    match back {
        Some(ParcelException::ServiceSpecific {
            error_code,
            message,
        }) => {
            assert_eq!(error_code, -12);
            assert_eq!(message, None);
        }
        other => panic!("expected service specific exception, got {other:?}"),
    }
    assert_eq!(exception.code(), EX_SERVICE_SPECIFIC);
    Ok(())
}

#[test]
fn test_native_payload_is_rebuilt() -> vparcel::Result<()> {
    let options = options_with_fault();
    let exception = all_kinds().pop().unwrap();
    assert_eq!(exception.code(), EX_NATIVE);

    let bytes = options.write_with(|parcel| parcel.write_exception(Some(&exception), 1))?;
    let back = options.read_with(&bytes, |parcel| parcel.read_exception(None, 1))?;

    let Some(ParcelException::Native { message, payload }) = back else {
        panic!("expected native exception");
    };
    assert_eq!(message.as_deref(), Some("remote"));
    let fault = payload.downcast_ref::<RemoteFault>().unwrap();
    assert_eq!(
        fault,
        &RemoteFault {
            code: 7,
            detail: "stack".into()
        }
    );
    Ok(())
}

#[test]
fn test_native_exception_needs_registered_creator() -> vparcel::Result<()> {
    let exception = all_kinds().pop().unwrap();
    let bytes = VParcel::write_with(|parcel| parcel.write_exception(Some(&exception), 1))?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_exception(None, 1));
    match result {
        Err(ParcelError::UnknownCodec(name)) => assert_eq!(name, RemoteFault::CREATOR),
        other => panic!("expected unknown creator, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_native_exception_rejected_when_natives_ignored() {
    let options = VParcel::builder().ignore_native_objects(true).build();
    let exception = all_kinds().pop().unwrap();
    let result = options.write_with(|parcel| parcel.write_exception(Some(&exception), 1));
    assert!(matches!(result, Err(ParcelError::InvalidUsage(_))));
}

#[test]
fn test_native_record_without_payload_is_rejected() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        parcel.write_i32(EX_NATIVE)?;
        parcel.write_string(Some("lost"))?;
        parcel.write_string(None)
    })?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_exception(None, 1));
    assert!(matches!(result, Err(ParcelError::Format(_))));
    Ok(())
}

#[test]
fn test_unclassified_error_is_returned_untouched() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        let error: Box<dyn Error + Send + Sync> = Box::new(std::io::Error::other("disk on fire"));
        match parcel.write_error(error, 1) {
            Err(ParcelError::UnclassifiedException(original)) => {
                assert_eq!(original.to_string(), "disk on fire");
                assert!(original.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("expected unclassified exception, got {other:?}"),
        }
        // The field was never opened, so its id is still free.
        parcel.write_value(&5i32, 1)
    })?;

    let value = VParcel::read_with(&bytes, |parcel| parcel.read_value(0i32, 1))?;
    assert_eq!(value, 5);
    Ok(())
}

#[test]
fn test_classified_error_is_written() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        let error: Box<dyn Error + Send + Sync> =
            Box::new(ParcelException::IllegalArgument(Some("negative".into())));
        parcel.write_error(error, 3)
    })?;
    let back = VParcel::read_with(&bytes, |parcel| parcel.read_exception(None, 3))?.unwrap();
    assert_eq!(back.to_string(), "IllegalArgumentException: negative");
    Ok(())
}

#[test]
fn test_no_exception_and_missing_field_yield_default() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_exception(None, 1))?;
    assert_eq!(&bytes[8..12], &0i32.to_le_bytes());

    let fallback = || Some(ParcelException::NullPointer(Some("fallback".into())));
    VParcel::read_with(&bytes, |parcel| {
        let recorded_none = parcel.read_exception(fallback(), 1)?.unwrap();
        assert_eq!(recorded_none.message(), Some("fallback"));
        let missing = parcel.read_exception(fallback(), 2)?.unwrap();
        assert_eq!(missing.code(), -4);
        assert!(parcel.read_exception(None, 1)?.is_none());
        Ok(())
    })
}

#[test]
fn test_unknown_code_is_malformed() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        parcel.write_i32(-42)?;
        parcel.write_string(Some("from the future"))
    })?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_exception(None, 1));
    assert!(matches!(
        result,
        Err(ParcelError::Malformed {
            what: "exception code",
            value: -42
        })
    ));
    Ok(())
}

#[test]
fn test_display() {
    let service = ParcelException::ServiceSpecific {
        error_code: 12,
        message: Some("quota".into()),
    };
    assert_eq!(service.to_string(), "ServiceSpecificException(12): quota");
    assert_eq!(
        ParcelException::NetworkOnMainThread(None).to_string(),
        "NetworkOnMainThreadException"
    );
}
