#![allow(missing_docs)]

use vparcel::{
    Handle, ParcelError, ParcelValue, Size, SizeF, SparseBoolArray, TypeTag, VParcel,
};

#[test]
fn test_primitive_arrays() -> vparcel::Result<()> {
    let flags = vec![true, false, true];
    let letters = vec!['a', 'é', '字', '🦀'];
    let ints = vec![i32::MIN, -1, 0, i32::MAX];
    let longs = vec![i64::MIN, 42, i64::MAX];
    let floats = vec![0.5f32, -1.25, f32::MAX];
    let doubles = vec![std::f64::consts::PI, -0.0, 1e300];

    let bytes = VParcel::write_with(|parcel| {
        parcel.write_value(&flags, 1)?;
        parcel.write_value(&letters, 2)?;
        parcel.write_value(&ints, 3)?;
        parcel.write_value(&longs, 4)?;
        parcel.write_value(&floats, 5)?;
        parcel.write_value(&doubles, 6)
    })?;

    VParcel::read_with(&bytes, |parcel| {
        assert_eq!(parcel.read_value(Vec::<bool>::new(), 1)?, flags);
        assert_eq!(parcel.read_value(Vec::<char>::new(), 2)?, letters);
        assert_eq!(parcel.read_value(Vec::<i32>::new(), 3)?, ints);
        assert_eq!(parcel.read_value(Vec::<i64>::new(), 4)?, longs);
        assert_eq!(parcel.read_value(Vec::<f32>::new(), 5)?, floats);
        assert_eq!(parcel.read_value(Vec::<f64>::new(), 6)?, doubles);
        Ok(())
    })
}

#[test]
fn test_primitive_array_is_untagged() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&vec![7i32, 8], 1))?;
    // header(8) + count(4) + 2 * i32 + close marker(4)
    assert_eq!(bytes.len(), 8 + 4 + 8 + 4);
    assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
    assert_eq!(&bytes[12..16], &7i32.to_le_bytes());
    Ok(())
}

#[test]
fn test_invalid_char_is_malformed() -> vparcel::Result<()> {
    // A lone surrogate is a valid i32 but not a char.
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&vec![0x41i32, 0xD800], 1))?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_value(Vec::<char>::new(), 1));
    assert!(matches!(
        result,
        Err(ParcelError::Malformed {
            what: "char code point",
            value: 0xD800
        })
    ));
    Ok(())
}

#[test]
fn test_byte_values_and_slices() -> vparcel::Result<()> {
    let source = [1u8, 2, 3, 4, 5];
    let bytes = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        parcel.write_byte_slice(&source, 1, 3)?;
        parcel.write_value(&0x1FFi32, 2)?;
        parcel.write_value(&200u8, 3)
    })?;

    VParcel::read_with(&bytes, |parcel| {
        assert_eq!(parcel.read_value(Vec::<u8>::new(), 1)?, vec![2, 3, 4]);
        // Only the low 8 bits of the stored i32 survive.
        assert_eq!(parcel.read_value(0u8, 2)?, 0xFF);
        assert_eq!(parcel.read_value(0u8, 3)?, 200);
        Ok(())
    })
}

#[test]
fn test_byte_slice_out_of_range() {
    let source = [0u8; 4];
    let result = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        parcel.write_byte_slice(&source, 3, 2)
    });
    assert!(matches!(result, Err(ParcelError::InvalidUsage(_))));

    let result = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        parcel.write_byte_slice(&source, usize::MAX, 2)
    });
    assert!(matches!(result, Err(ParcelError::InvalidUsage(_))));
}

#[test]
fn test_nullable_strings_and_buffers() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        parcel.write_value(&None::<String>, 1)?;
        parcel.write_value(&Some(String::new()), 2)?;
        parcel.write_value(&None::<Vec<u8>>, 3)?;
        parcel.write_value(&Some(Vec::<u8>::new()), 4)
    })?;

    VParcel::read_with(&bytes, |parcel| {
        assert_eq!(parcel.read_value(Some("x".to_string()), 1)?, None);
        assert_eq!(parcel.read_value(None::<String>, 2)?, Some(String::new()));
        assert_eq!(parcel.read_value(Some(vec![1u8]), 3)?, None);
        assert_eq!(parcel.read_value(None::<Vec<u8>>, 4)?, Some(Vec::<u8>::new()));
        Ok(())
    })
}

#[test]
fn test_null_into_non_optional_field_is_rejected() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&None::<String>, 1))?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_value(String::new(), 1));
    match result {
        Err(ParcelError::Format(msg)) => assert!(msg.contains("Option")),
        other => panic!("expected null rejection, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_sizes() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        parcel.write_value(&Size::new(640, 480), 1)?;
        parcel.write_value(&SizeF::new(1.5, -2.0), 2)?;
        parcel.write_value(&None::<Size>, 3)
    })?;

    VParcel::read_with(&bytes, |parcel| {
        assert_eq!(parcel.read_value(Size::default(), 1)?, Size::new(640, 480));
        assert_eq!(parcel.read_value(SizeF::default(), 2)?, SizeF::new(1.5, -2.0));
        assert_eq!(parcel.read_value(Some(Size::new(1, 1)), 3)?, None);
        Ok(())
    })
}

#[test]
fn test_sparse_bool_array() -> vparcel::Result<()> {
    let mut flags = SparseBoolArray::new();
    flags.insert(1000, true);
    flags.insert(-3, false);
    flags.insert(7, true);

    let bytes = VParcel::write_with(|parcel| parcel.write_value(&flags, 1))?;
    // Pairs are written in key order.
    assert_eq!(&bytes[12..16], &(-3i32).to_le_bytes());

    let back = VParcel::read_with(&bytes, |parcel| parcel.read_value(SparseBoolArray::new(), 1))?;
    assert_eq!(back, flags);
    Ok(())
}

#[test]
fn test_string_and_handle_lists() -> vparcel::Result<()> {
    let names = vec!["alpha".to_string(), "beta".to_string()];
    let handles: Box<[Handle]> = vec![Handle::new(3), Handle::new(u64::MAX)].into_boxed_slice();

    let bytes = VParcel::write_with(|parcel| {
        parcel.write_value(&names, 1)?;
        parcel.write_value(&handles, 2)
    })?;
    // count, then the tag of the first element
    assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
    assert_eq!(&bytes[12..16], &TypeTag::Text.as_i32().to_le_bytes());

    VParcel::read_with(&bytes, |parcel| {
        assert_eq!(parcel.read_value(Vec::<String>::new(), 1)?, names);
        let empty: Box<[Handle]> = Box::new([]);
        assert_eq!(parcel.read_value(empty, 2)?, handles);
        Ok(())
    })
}

#[test]
fn test_empty_list_has_no_tag() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&Vec::<String>::new(), 1))?;
    // header(8) + count(4) + close marker(4)
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[8..12], &0i32.to_le_bytes());

    let back = VParcel::read_with(&bytes, |parcel| {
        parcel.read_value(vec!["default".to_string()], 1)
    })?;
    assert!(back.is_empty());
    Ok(())
}

#[test]
fn test_null_list() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&None::<Vec<String>>, 1))?;
    assert_eq!(&bytes[8..12], &(-1i32).to_le_bytes());

    VParcel::read_with(&bytes, |parcel| {
        assert_eq!(parcel.read_value(Some(vec!["x".to_string()]), 1)?, None);
        assert!(parcel.read_value(Vec::<String>::new(), 1).is_err());
        Ok(())
    })
}

#[test]
fn test_mixed_collection_writes_nothing() -> vparcel::Result<()> {
    let mixed = vec![
        ParcelValue::from("text"),
        ParcelValue::from(Handle::new(1)),
        ParcelValue::from("more text"),
    ];

    let bytes = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        match parcel.write_list(Some(mixed.as_slice())) {
            Err(ParcelError::MixedCollection {
                expected,
                found,
                index,
            }) => {
                assert_eq!(expected, TypeTag::Text);
                assert_eq!(found, TypeTag::Handle);
                assert_eq!(index, 1);
            }
            other => panic!("expected mixed collection error, got {other:?}"),
        }
        parcel.write_i32(77)
    })?;

    // The field holds only what was written after the rejected list.
    let marker = VParcel::read_with(&bytes, |parcel| {
        parcel.read_field(1)?;
        parcel.read_i32()
    })?;
    assert_eq!(marker, 77);
    Ok(())
}

#[test]
fn test_heterogeneous_values_of_one_category() -> vparcel::Result<()> {
    let texts = vec![ParcelValue::from("a"), ParcelValue::from(String::from("b"))];
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&texts, 1))?;

    // A list of ParcelValue can be read back as the concrete element type.
    let back = VParcel::read_with(&bytes, |parcel| parcel.read_value(Vec::<String>::new(), 1))?;
    assert_eq!(back, vec!["a".to_string(), "b".to_string()]);

    let values = VParcel::read_with(&bytes, |parcel| {
        parcel.read_value(Vec::<ParcelValue>::new(), 1)
    })?;
    assert_eq!(values[1].as_text(), Some("b"));
    assert_eq!(values[0].type_tag(), TypeTag::Text);
    assert_eq!(values[0].as_handle(), None);
    Ok(())
}

#[test]
fn test_element_type_mismatch_is_unsupported() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&vec!["a".to_string()], 1))?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_value(Vec::<Handle>::new(), 1));
    assert!(matches!(result, Err(ParcelError::UnsupportedValueType(_))));
    Ok(())
}

#[test]
fn test_unknown_type_tag_is_malformed() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| {
        parcel.set_output_field(1)?;
        parcel.write_i32(1)?;
        parcel.write_i32(42)?;
        parcel.write_string(Some("payload"))
    })?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_value(Vec::<String>::new(), 1));
    assert!(matches!(
        result,
        Err(ParcelError::Malformed {
            what: "type tag",
            value: 42
        })
    ));
    Ok(())
}

#[test]
fn test_negative_collection_length_is_malformed() -> vparcel::Result<()> {
    let bytes = VParcel::write_with(|parcel| parcel.write_value(&-2i32, 1))?;
    let result = VParcel::read_with(&bytes, |parcel| parcel.read_value(Vec::<i32>::new(), 1));
    assert!(matches!(
        result,
        Err(ParcelError::Malformed {
            what: "collection length",
            value: -2
        })
    ));
    Ok(())
}

#[test]
fn test_type_tag_display_and_codes() -> vparcel::Result<()> {
    for code in 1..=5 {
        assert_eq!(TypeTag::from_i32(code)?.as_i32(), code);
    }
    assert!(TypeTag::from_i32(0).is_err());
    assert_eq!(TypeTag::Handle.to_string(), "handle(5)");
    Ok(())
}
