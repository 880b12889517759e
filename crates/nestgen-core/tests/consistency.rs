use nestgen_core::validation::{
    INVALID_LAYOUT, INVALID_TYPE, VALUE_FORM_MISMATCH, VALUE_TYPE_MISMATCH,
};
use nestgen_core::{
    DType, Field, Form, IndexWidth, ListIndex, ListLayout, OptionLayout, OptionMask, Scalars,
    Type, Value, ValueField, check_consistency,
};

fn int32s(values: Vec<i64>) -> Value {
    Value::Numpy {
        dtype: DType::Int32,
        data: Scalars::Int(values),
    }
}

fn list_of_int32() -> Value {
    Value::List {
        index: ListIndex::Offsets {
            width: IndexWidth::I64,
            offsets: vec![0, 2, 2, 3],
        },
        content: Box::new(int32s(vec![1, 2, 3])),
    }
}

#[test]
fn matching_triple_is_consistent() {
    let value = list_of_int32();
    let ty = Type::list(Type::leaf(DType::Int32));
    let form = Form::canonical(&ty);
    assert_eq!(check_consistency(Some(&ty), Some(&form), Some(&value)), Ok(()));
}

#[test]
fn duplicate_field_type_is_an_invalid_type() {
    let ty = Type::Record {
        fields: vec![
            Field {
                name: "a".to_string(),
                ty: Type::leaf(DType::Bool),
            },
            Field {
                name: "a".to_string(),
                ty: Type::leaf(DType::Bool),
            },
        ],
    };
    let violation = check_consistency(Some(&ty), None, None).unwrap_err();
    assert_eq!(violation.code, INVALID_TYPE);
}

#[test]
fn layout_difference_is_a_value_form_mismatch() {
    let value = list_of_int32();
    let form = Form::list(
        ListLayout::StartsStops {
            width: IndexWidth::I64,
        },
        Form::numpy(DType::Int32),
    );
    let violation = check_consistency(None, Some(&form), Some(&value)).unwrap_err();
    assert_eq!(violation.code, VALUE_FORM_MISMATCH);
    assert_eq!(violation.path, "$");
}

#[test]
fn field_order_matters() {
    let value = Value::Record {
        length: 1,
        fields: vec![
            ValueField {
                name: "y".to_string(),
                value: int32s(vec![1]),
            },
            ValueField {
                name: "x".to_string(),
                value: int32s(vec![2]),
            },
        ],
    };
    let ty = Type::record([
        ("x", Type::leaf(DType::Int32)),
        ("y", Type::leaf(DType::Int32)),
    ])
    .unwrap();
    let violation = check_consistency(Some(&ty), None, Some(&value)).unwrap_err();
    assert_eq!(violation.code, VALUE_TYPE_MISMATCH);
}

#[test]
fn broken_buffers_are_rejected_before_comparison() {
    let value = Value::Option {
        mask: OptionMask::BitMasked {
            valid_when: true,
            lsb_order: true,
            length: 9,
            mask: vec![0xff],
        },
        content: Box::new(int32s(vec![0; 9])),
    };
    let ty = Type::option(Type::leaf(DType::Int32)).unwrap();
    let violation = check_consistency(Some(&ty), None, Some(&value)).unwrap_err();
    assert_eq!(violation.code, INVALID_LAYOUT);
}

#[test]
fn union_index_must_point_into_its_variant() {
    let value = Value::Union {
        index_width: IndexWidth::I32,
        tags: vec![0, 1],
        index: vec![0, 1],
        variants: vec![
            int32s(vec![5]),
            Value::Option {
                mask: OptionMask::from_validity(OptionLayout::Unmasked, &[true]),
                content: Box::new(int32s(vec![6])),
            },
        ],
    };
    let violation = check_consistency(None, None, Some(&value)).unwrap_err();
    assert_eq!(violation.code, INVALID_LAYOUT);
    assert!(violation.message.contains("variant 1"));
}
