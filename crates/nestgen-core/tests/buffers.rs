use std::collections::BTreeMap;

use nestgen_core::{
    Buffer, DType, Error, IndexWidth, ListIndex, OptionLayout, OptionMask, Scalars,
    StringEncoding, Value, ValueField, from_buffers, to_buffers,
};

fn sample() -> Value {
    Value::Record {
        length: 2,
        fields: vec![
            ValueField {
                name: "n".to_string(),
                value: Value::Option {
                    mask: OptionMask::from_validity(
                        OptionLayout::BitMasked {
                            valid_when: false,
                            lsb_order: false,
                        },
                        &[true, false],
                    ),
                    content: Box::new(Value::Numpy {
                        dtype: DType::Float64,
                        data: Scalars::Float(vec![1.5, f64::NAN]),
                    }),
                },
            },
            ValueField {
                name: "s".to_string(),
                value: Value::String {
                    encoding: StringEncoding::Utf8,
                    index: ListIndex::Offsets {
                        width: IndexWidth::I32,
                        offsets: vec![0, 3, 5],
                    },
                    bytes: "héllo".as_bytes()[..5].to_vec(),
                },
            },
        ],
    }
}

#[test]
fn exported_buffers_materialize_the_same_layout() {
    let value = sample();
    let set = to_buffers(&value);
    let back = set.materialize().expect("materialize");
    assert_eq!(back.form(), value.form());
    assert_eq!(back.len(), 2);
    assert_eq!(back.null_count(), 0);
    assert!(back.has_nulls());
}

#[test]
fn wrong_top_level_length_is_rejected() {
    let set = to_buffers(&sample());
    let err = from_buffers(&set.form, 3, &set.buffers).unwrap_err();
    assert!(matches!(err, Error::InvalidBuffers(_)));
}

#[test]
fn invalid_utf8_is_rejected_on_materialization() {
    let value = Value::String {
        encoding: StringEncoding::Utf8,
        index: ListIndex::Offsets {
            width: IndexWidth::I64,
            offsets: vec![0, 1],
        },
        bytes: vec![0xc3],
    };
    let set = to_buffers(&value);
    let err = set.materialize().unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)));
}

#[test]
fn mistyped_buffer_is_rejected() {
    let set = to_buffers(&sample());
    let mut buffers: BTreeMap<String, Buffer> = set.buffers.clone();
    buffers.insert("node1-mask".to_string(), Buffer::Index(vec![0]));
    let err = from_buffers(&set.form, set.length, &buffers).unwrap_err();
    assert!(err.to_string().contains("node1-mask"));
}

#[test]
fn overflowing_list_length_is_rejected() {
    let value = Value::List {
        index: ListIndex::Offsets {
            width: IndexWidth::I64,
            offsets: vec![0, 2],
        },
        content: Box::new(Value::Numpy {
            dtype: DType::Int32,
            data: Scalars::Int(vec![1, 2]),
        }),
    };
    let set = to_buffers(&value);
    let mut buffers: BTreeMap<String, Buffer> = set.buffers.clone();
    buffers.insert("node0-length".to_string(), Buffer::Length(usize::MAX));
    let err = from_buffers(&set.form, 1, &buffers).unwrap_err();
    assert!(matches!(err, Error::InvalidBuffers(_)));
    assert!(err.to_string().contains("node0-length"));
}
