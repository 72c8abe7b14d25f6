#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use vparcel::{
    Handle, ParcelException, ParcelInspector, ROOT_FIELD, Serialized, Size, SparseBoolArray,
    VParcel, VersionedParcelable,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Opaque {
    blob: Vec<u8>,
}

#[derive(Debug, Default, Clone, PartialEq, VersionedParcelable)]
#[parcel(package = "test.macro")]
struct Tag {
    #[parcel(id = 1)]
    name: String,
}

#[derive(Debug, Default, Clone, PartialEq, VersionedParcelable)]
#[parcel(package = "test.macro")]
struct Everything {
    #[parcel(id = 1)]
    flag: bool,
    #[parcel(id = 2)]
    byte: u8,
    #[parcel(id = 3)]
    count: i32,
    #[parcel(id = 4)]
    big: i64,
    #[parcel(id = 5)]
    ratio: f32,
    #[parcel(id = 6)]
    precise: f64,
    #[parcel(id = 7)]
    text: String,
    #[parcel(id = 8)]
    maybe_text: Option<String>,
    #[parcel(id = 9)]
    raw: Vec<u8>,
    #[parcel(id = 10)]
    letters: Vec<char>,
    #[parcel(id = 11)]
    tags: Vec<Tag>,
    #[parcel(id = 12)]
    primary: Option<Tag>,
    #[parcel(id = 13)]
    handle: Option<Handle>,
    #[parcel(id = 14)]
    size: Size,
    #[parcel(id = 15)]
    flags: SparseBoolArray,
    #[parcel(id = 16)]
    opaque: Option<Serialized<Opaque>>,
    #[parcel(id = 17)]
    names: Box<[String]>,
    #[parcel(id = 100)]
    far_away: i32,
}

#[derive(Debug, Clone, VersionedParcelable)]
#[parcel(package = "test.macro")]
struct WithDefaults {
    #[parcel(id = 1, default = 8080)]
    port: i32,
    #[parcel(id = 2, default = String::from("localhost"))]
    host: String,
    #[parcel(skip)]
    cache: Vec<u64>,
    #[parcel(skip, default = 3)]
    retries: u32,
}

#[derive(Debug, Default, VersionedParcelable)]
#[parcel(package = "test.macro")]
struct Empty {}

#[derive(Debug, Default, VersionedParcelable)]
#[parcel(package = "test.macro")]
struct Failure {
    #[parcel(id = 1)]
    error: Option<ParcelException>,
}

fn everything() -> Everything {
    let mut flags = SparseBoolArray::new();
    flags.insert(4, true);
    Everything {
        flag: true,
        byte: 0xAB,
        count: -5,
        big: 1 << 40,
        ratio: 0.75,
        precise: -1e-9,
        text: "text".into(),
        maybe_text: None,
        raw: vec![0, 255],
        letters: vec!['x', 'y'],
        tags: vec![
            Tag { name: "a".into() },
            Tag { name: "b".into() },
        ],
        primary: Some(Tag {
            name: "main".into(),
        }),
        handle: Some(Handle::new(77)),
        size: Size::new(3, 4),
        flags,
        opaque: Some(Serialized(Opaque { blob: vec![1, 2] })),
        names: vec!["n".to_string()].into_boxed_slice(),
        far_away: 9,
    }
}

#[test]
fn test_all_field_kinds_round_trip() -> vparcel::Result<()> {
    let value = everything();
    let bytes = VParcel::to_bytes(&value)?;
    let back: Everything = VParcel::from_bytes(&bytes)?;
    assert_eq!(back, value);
    Ok(())
}

#[test]
fn test_fields_are_written_in_declaration_order() -> vparcel::Result<()> {
    let bytes = VParcel::to_bytes(&everything())?;
    let report = ParcelInspector::inspect_bytes(&bytes)?;
    let root = &report.root.fields[0];
    let object = root.nested.as_ref().unwrap();
    let ids: Vec<u32> = object.fields.iter().map(|f| f.id).collect();
    let mut expected: Vec<u32> = (1..=17).collect();
    expected.push(100);
    assert_eq!(ids, expected);
    Ok(())
}

#[test]
fn test_defaults_for_absent_fields() -> vparcel::Result<()> {
    // A WithDefaults object whose sub-parcel holds no fields at all.
    let identity = vparcel::companion_identity::<WithDefaults>();
    let bytes = VParcel::write_with(|parcel| {
        parcel.set_output_field(ROOT_FIELD)?;
        parcel.write_string(Some(identity))?;
        parcel.nested(|_| Ok(()))
    })?;

    let back: WithDefaults = VParcel::from_bytes(&bytes)?;
    assert_eq!(back.port, 8080);
    assert_eq!(back.host, "localhost");
    assert!(back.cache.is_empty());
    assert_eq!(back.retries, 3);
    Ok(())
}

#[test]
fn test_empty_struct() -> vparcel::Result<()> {
    let bytes = VParcel::to_bytes(&Empty {})?;
    let report = ParcelInspector::inspect_bytes(&bytes)?;
    let object = report.root.fields[0].nested.as_ref().unwrap();
    assert!(object.fields.is_empty());
    assert!(object.terminated);
    let _: Empty = VParcel::from_bytes(&bytes)?;
    Ok(())
}

#[test]
fn test_skipped_fields_are_not_written() -> vparcel::Result<()> {
    let value = WithDefaults {
        port: 1,
        host: "h".into(),
        cache: vec![1, 2, 3],
        retries: 10,
    };
    let bytes = VParcel::to_bytes(&value)?;
    let report = ParcelInspector::inspect_bytes(&bytes)?;
    let object = report.root.fields[0].nested.as_ref().unwrap();
    assert_eq!(object.fields.len(), 2);

    let back: WithDefaults = VParcel::from_bytes(&bytes)?;
    assert_eq!(back.port, 1);
    assert_eq!(back.host, "h");
    assert!(back.cache.is_empty());
    assert_eq!(back.retries, 3);
    Ok(())
}

#[test]
fn test_null_nested_object() -> vparcel::Result<()> {
    let value = Everything {
        primary: None,
        opaque: None,
        ..everything()
    };
    let back: Everything = VParcel::from_bytes(&VParcel::to_bytes(&value)?)?;
    assert_eq!(back.primary, None);
    assert_eq!(back.opaque, None);
    Ok(())
}

#[test]
fn test_exception_field() -> vparcel::Result<()> {
    let value = Failure {
        error: Some(ParcelException::UnsupportedOperation(Some("later".into()))),
    };
    let back: Failure = VParcel::from_bytes(&VParcel::to_bytes(&value)?)?;
    let error = back.error.unwrap();
    assert_eq!(error.code(), -7);
    assert_eq!(error.message(), Some("later"));

    let back: Failure = VParcel::from_bytes(&VParcel::to_bytes(&Failure::default())?)?;
    assert!(back.error.is_none());
    Ok(())
}

#[test]
fn test_generated_parcelizer_is_a_unit_type() {
    let parcelizer = EverythingParcelizer;
    let copy = parcelizer;
    assert_eq!(format!("{copy:?}"), "EverythingParcelizer");
    assert_eq!(
        vparcel::companion_identity::<Everything>(),
        "test.macro.EverythingParcelizer"
    );
}
