use nestgen_core::{DType, Form, IndexWidth, ListLayout, TimeUnit, Type};

#[test]
fn serializes_type_deterministically() {
    let ty = Type::list(Type::leaf(DType::Int32));
    let json = serde_json::to_string(&ty).expect("serialize type");
    assert_eq!(
        json,
        r#"{"kind":"list","content":{"kind":"leaf","dtype":"int32"}}"#
    );
}

#[test]
fn timed_dtypes_serialize_with_unit() {
    let ty = Type::leaf(DType::Datetime64(TimeUnit::Micro));
    let json = serde_json::to_string(&ty).expect("serialize type");
    assert_eq!(json, r#"{"kind":"leaf","dtype":"datetime64[us]"}"#);
}

#[test]
fn negative_regular_size_is_rejected_on_load() {
    let raw = r#"{"kind":"regular","size":-1,"content":{"kind":"leaf","dtype":"bool"}}"#;
    assert!(serde_json::from_str::<Type>(raw).is_err());
}

#[test]
fn form_round_trips_through_json() {
    let form = Form::list(
        ListLayout::StartsStops {
            width: IndexWidth::U32,
        },
        Form::regular(Form::numpy(DType::Complex64), 2),
    );
    let json = serde_json::to_value(&form).expect("serialize form");
    assert_eq!(json["class"], "list");
    assert_eq!(json["layout"]["repr"], "starts_stops");
    assert_eq!(json["layout"]["width"], "u32");
    let back: Form = serde_json::from_value(json).expect("deserialize form");
    assert_eq!(back, form);
}

#[test]
fn form_json_schema_names_every_class() {
    let schema = schemars::schema_for!(Form);
    let json = serde_json::to_string(&schema).expect("serialize json schema");
    for class in ["numpy", "list", "regular", "option", "record", "union", "string"] {
        assert!(json.contains(&format!("\"{class}\"")), "missing class {class}");
    }
}
